//! Instance assembler

use super::compiler::CompiledInstance;
use super::model::{ProvisioningConfig, Scope};
use super::reference::resolve_machine_type_url;
use super::request::InstanceRequest;

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Compose the compiled fragments into one insert request
pub fn assemble(config: &ProvisioningConfig, scope: &Scope, compiled: CompiledInstance) -> InstanceRequest {
    InstanceRequest {
        name: config.instance_name.clone(),
        machine_type: resolve_machine_type_url(config.machine.machine_type.trim(), &scope.zone),
        description: non_empty(&config.advanced.description),
        min_cpu_platform: non_empty(&config.machine.min_cpu_platform),
        disks: compiled.disks,
        network_interfaces: vec![compiled.network_interface],
        scheduling: compiled.scheduling,
        metadata: compiled.metadata,
        tags: compiled.tags,
        labels: compiled.labels,
        service_accounts: compiled.service_accounts,
        guest_accelerators: compiled.accelerators,
        resource_policies: compiled.resource_policies,
        shielded_instance_config: compiled.shielded,
        confidential_instance_config: compiled.confidential,
        display_device: compiled.display,
        deletion_protection: config.advanced.deletion_protection,
        can_ip_forward: config.advanced.can_ip_forward,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provision::compiler::compile_resolved;
    use crate::provision::disks::BootSource;
    use crate::provision::network::ResolvedAddresses;
    use crate::testing::minimal_config;

    #[test]
    fn test_minimal_request_shape() {
        let config = minimal_config();
        let scope = config.scope("proj");
        let compiled = compile_resolved(
            &config,
            &scope,
            BootSource::Image("projects/debian-cloud/global/images/debian-12".to_string()),
            &ResolvedAddresses::default(),
            &[],
        );
        let request = assemble(&config, &scope, compiled);

        assert_eq!(request.name, "my-vm-01");
        assert_eq!(request.machine_type, "zones/us-central1-a/machineTypes/e2-medium");
        assert_eq!(request.disks.len(), 1);
        assert!(request.boot_disk().is_some());
        assert_eq!(request.network_interfaces.len(), 1);
        assert!(request.description.is_none());

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["scheduling"]["provisioningModel"], "STANDARD");
        assert!(value.get("guestAccelerators").is_none());
    }
}
