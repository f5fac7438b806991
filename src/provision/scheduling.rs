//! Scheduling block, guest accelerators and resource policies

use super::model::{
    AcceleratorConfig as AcceleratorSpec, HostMaintenance, NodeAffinityConfig,
    ProvisioningConfig, ProvisioningModel, Scope,
};
use super::reference::{resolve_accelerator_type_url, resolve_resource_policy_url};
use super::request::{AcceleratorConfig, NodeAffinity, Scheduling};
use tracing::debug;

/// Accelerators with a type and a count of at least one
pub fn build_accelerators(accelerators: &[AcceleratorSpec], scope: &Scope) -> Vec<AcceleratorConfig> {
    accelerators
        .iter()
        .filter(|a| !a.accelerator_type.trim().is_empty() && a.count >= 1)
        .map(|a| AcceleratorConfig {
            accelerator_type: resolve_accelerator_type_url(
                a.accelerator_type.trim(),
                &scope.project,
                &scope.zone,
            ),
            accelerator_count: a.count,
        })
        .collect()
}

/// Affinity rules with a key and at least one non-empty value
pub fn build_node_affinities(affinities: &[NodeAffinityConfig]) -> Vec<NodeAffinity> {
    affinities
        .iter()
        .filter_map(|a| {
            let key = a.key.trim();
            let values: Vec<String> = a
                .values
                .iter()
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect();
            if key.is_empty() || values.is_empty() {
                return None;
            }
            let operator = match a.operator.trim() {
                "" => "IN".to_string(),
                op => op.to_uppercase(),
            };
            Some(NodeAffinity {
                key: key.to_string(),
                operator,
                values,
            })
        })
        .collect()
}

/// SPOT always runs preemptible, terminates on host maintenance and never
/// restarts. Accelerators and confidential VMs cannot live-migrate.
pub fn build_scheduling(config: &ProvisioningConfig, has_accelerators: bool) -> Scheduling {
    let management = &config.management;
    let confidential = config.security.confidential_vm_type.is_some();
    let node_affinities = build_node_affinities(&config.advanced.node_affinities);
    let min_node_cpus = config.advanced.min_node_cpus.filter(|n| *n > 0);

    match config.machine.provisioning_model {
        ProvisioningModel::Spot => Scheduling {
            preemptible: true,
            on_host_maintenance: HostMaintenance::Terminate.as_str().to_string(),
            automatic_restart: false,
            provisioning_model: ProvisioningModel::Spot.as_str().to_string(),
            instance_termination_action: Some("STOP".to_string()),
            node_affinities,
            min_node_cpus,
        },
        ProvisioningModel::Standard => {
            let mut on_host_maintenance = management.on_host_maintenance;
            if (has_accelerators || confidential) && on_host_maintenance != HostMaintenance::Terminate {
                debug!("Forcing TERMINATE host maintenance for accelerator or confidential VM");
                on_host_maintenance = HostMaintenance::Terminate;
            }
            Scheduling {
                preemptible: false,
                on_host_maintenance: on_host_maintenance.as_str().to_string(),
                automatic_restart: management.automatic_restart,
                provisioning_model: ProvisioningModel::Standard.as_str().to_string(),
                instance_termination_action: None,
                node_affinities,
                min_node_cpus,
            }
        },
    }
}

/// Maintenance policy first, then the advanced policies, qualified and deduplicated
pub fn build_resource_policies(config: &ProvisioningConfig, scope: &Scope) -> Vec<String> {
    let mut policies: Vec<String> = Vec::new();
    let candidates = config
        .management
        .maintenance_policy
        .iter()
        .chain(config.advanced.resource_policies.iter());

    for policy in candidates {
        let policy = policy.trim();
        if policy.is_empty() {
            continue;
        }
        let url = resolve_resource_policy_url(policy, &scope.project, &scope.region);
        if !policies.contains(&url) {
            policies.push(url);
        }
    }
    policies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provision::model::ConfidentialVmType;
    use crate::testing::minimal_config;

    fn scope() -> Scope {
        Scope::new("proj", "us-central1", "us-central1-a")
    }

    #[test]
    fn test_spot_overrides_management_settings() {
        let mut config = minimal_config();
        config.machine.provisioning_model = ProvisioningModel::Spot;
        config.management.automatic_restart = true;
        config.management.on_host_maintenance = HostMaintenance::Migrate;

        let scheduling = build_scheduling(&config, false);
        assert!(scheduling.preemptible);
        assert!(!scheduling.automatic_restart);
        assert_eq!(scheduling.on_host_maintenance, "TERMINATE");
        assert_eq!(scheduling.provisioning_model, "SPOT");
        assert_eq!(scheduling.instance_termination_action.as_deref(), Some("STOP"));
    }

    #[test]
    fn test_standard_passes_through() {
        let mut config = minimal_config();
        config.management.automatic_restart = false;
        let scheduling = build_scheduling(&config, false);
        assert!(!scheduling.preemptible);
        assert!(!scheduling.automatic_restart);
        assert_eq!(scheduling.on_host_maintenance, "MIGRATE");
        assert!(scheduling.instance_termination_action.is_none());
    }

    #[test]
    fn test_gpu_and_confidential_terminate_on_maintenance() {
        let config = minimal_config();
        assert_eq!(build_scheduling(&config, true).on_host_maintenance, "TERMINATE");

        let mut config = minimal_config();
        config.security.confidential_vm_type = Some(ConfidentialVmType::SevSnp);
        assert_eq!(build_scheduling(&config, false).on_host_maintenance, "TERMINATE");
    }

    #[test]
    fn test_accelerator_filtering() {
        let specs = vec![
            AcceleratorSpec {
                accelerator_type: "nvidia-tesla-t4".to_string(),
                count: 2,
            },
            AcceleratorSpec {
                accelerator_type: "nvidia-l4".to_string(),
                count: 0,
            },
            AcceleratorSpec {
                accelerator_type: " ".to_string(),
                count: 1,
            },
        ];
        let accelerators = build_accelerators(&specs, &scope());
        assert_eq!(accelerators.len(), 1);
        assert_eq!(
            accelerators[0].accelerator_type,
            "projects/proj/zones/us-central1-a/acceleratorTypes/nvidia-tesla-t4"
        );
        assert_eq!(accelerators[0].accelerator_count, 2);
    }

    #[test]
    fn test_node_affinity_filtering() {
        let affinities = vec![
            NodeAffinityConfig {
                key: "compute.googleapis.com/node-group-name".to_string(),
                operator: String::new(),
                values: vec!["".to_string(), "group-a".to_string()],
            },
            NodeAffinityConfig {
                key: "".to_string(),
                operator: "IN".to_string(),
                values: vec!["x".to_string()],
            },
            NodeAffinityConfig {
                key: "env".to_string(),
                operator: "not_in".to_string(),
                values: vec![" ".to_string()],
            },
        ];
        let built = build_node_affinities(&affinities);
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].operator, "IN");
        assert_eq!(built[0].values, vec!["group-a"]);
    }

    #[test]
    fn test_maintenance_policy_comes_first() {
        let mut config = minimal_config();
        config.management.maintenance_policy = Some("weekly-window".to_string());
        config.advanced.resource_policies = vec![
            "placement".to_string(),
            "projects/proj/regions/us-central1/resourcePolicies/weekly-window".to_string(),
            "".to_string(),
        ];

        assert_eq!(
            build_resource_policies(&config, &scope()),
            vec![
                "projects/proj/regions/us-central1/resourcePolicies/weekly-window",
                "projects/proj/regions/us-central1/resourcePolicies/placement",
            ]
        );
    }
}
