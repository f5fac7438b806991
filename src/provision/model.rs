//! Provisioning configuration
//!
//! The user-editable description of one VM. It deserializes from the same
//! camelCase JSON/YAML the workflow forms produce. Fields that only make
//! sense for one choice of a discriminator live inside that enum variant.

use super::firewall::FirewallRule;
use super::reference::region_from_zone;
use crate::error::{ProvisionError, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProvisioningModel {
    #[default]
    Standard,
    Spot,
}

impl ProvisioningModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::Spot => "SPOT",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvisioningConfig {
    pub instance_name: String,
    /// Defaults to the catalog client's project
    pub project: Option<String>,
    /// Derived from the zone when absent
    pub region: Option<String>,
    pub zone: String,
    #[serde(flatten)]
    pub machine: MachineConfig,
    pub boot_disk: BootDiskConfig,
    pub additional_disks: Vec<AdditionalDisk>,
    /// Number of local NVMe SSDs, at most 8
    pub local_ssd_count: i64,
    pub networking: NetworkingConfig,
    pub security: SecurityConfig,
    pub identity: IdentityConfig,
    pub management: ManagementConfig,
    pub advanced: AdvancedConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MachineConfig {
    /// Informational only (`e2`, `n2`, ...); the machine type decides
    pub machine_family: Option<String>,
    pub machine_type: String,
    pub provisioning_model: ProvisioningModel,
    pub min_cpu_platform: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BootDiskConfig {
    pub source: Option<BootDiskSource>,
    pub disk_type: Option<String>,
    pub size_gb: Option<i64>,
    pub auto_delete: bool,
    pub device_name: Option<String>,
    /// Customer-managed encryption key
    pub kms_key: Option<String>,
    /// Snapshot-schedule resource policy, new boot disks only
    pub snapshot_schedule: Option<String>,
}

impl Default for BootDiskConfig {
    fn default() -> Self {
        Self {
            source: None,
            disk_type: None,
            size_gb: None,
            auto_delete: true,
            device_name: None,
            kms_key: None,
            snapshot_schedule: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImageSelector {
    Name(String),
    Family(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "sourceType",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum BootDiskSource {
    PublicImage {
        image_project: String,
        image: ImageSelector,
    },
    /// Image owned by the instance's project (or a qualified path)
    CustomImage { image: String },
    Snapshot { snapshot: String },
    /// Attach an existing disk as boot disk
    ExistingDisk { disk: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "mode",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum AdditionalDisk {
    Existing {
        disk: String,
        #[serde(default)]
        read_only: bool,
        #[serde(default)]
        auto_delete: bool,
        #[serde(default)]
        device_name: Option<String>,
    },
    New {
        /// Defaults to `<instance>-disk-<n>`
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        size_gb: Option<i64>,
        #[serde(default)]
        disk_type: Option<String>,
        #[serde(default = "default_true")]
        auto_delete: bool,
        #[serde(default)]
        kms_key: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InternalIp {
    #[default]
    Ephemeral,
    /// IP literal or the name of a reserved internal address
    Static { address: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExternalIp {
    #[serde(rename = "none")]
    Disabled,
    #[default]
    Ephemeral,
    /// IP literal or the name of a reserved external address
    Static { address: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkingConfig {
    pub network: Option<String>,
    pub subnetwork: Option<String>,
    /// `GVNIC` or `VIRTIO_NET`
    pub nic_type: Option<String>,
    /// `IPV4_ONLY` or `IPV4_IPV6`
    pub stack_type: Option<String>,
    /// `PREMIUM` or `STANDARD`
    pub network_tier: Option<String>,
    pub internal_ip: InternalIp,
    pub external_ip: ExternalIp,
    pub tags: Vec<String>,
    pub firewall_rules: Vec<FirewallRuleConfig>,
}

/// Firewall rule in compact form, e.g. `allow: "tcp:22,tcp:80,icmp"`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FirewallRuleConfig {
    pub name: String,
    pub allow: String,
    /// Comma-separated CIDRs
    pub source_ranges: String,
    pub target_tag: String,
    /// Defaults to the instance's network
    pub network: Option<String>,
    pub priority: Option<u32>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidentialVmType {
    Sev,
    SevSnp,
    Tdx,
}

impl ConfidentialVmType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sev => "SEV",
            Self::SevSnp => "SEV_SNP",
            Self::Tdx => "TDX",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShieldedVmConfig {
    pub secure_boot: bool,
    pub vtpm: bool,
    pub integrity_monitoring: bool,
}

impl Default for ShieldedVmConfig {
    fn default() -> Self {
        Self {
            secure_boot: false,
            vtpm: true,
            integrity_monitoring: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecurityConfig {
    pub shielded_vm: Option<ShieldedVmConfig>,
    pub confidential_vm_type: Option<ConfidentialVmType>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentityConfig {
    /// Service account email, or `default`
    pub service_account: Option<String>,
    pub scopes: Vec<String>,
    pub enable_os_login: Option<bool>,
    pub block_project_ssh_keys: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HostMaintenance {
    Migrate,
    Terminate,
}

impl HostMaintenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Migrate => "MIGRATE",
            Self::Terminate => "TERMINATE",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManagementConfig {
    pub metadata: Vec<KeyValue>,
    pub startup_script: Option<String>,
    pub shutdown_script: Option<String>,
    pub automatic_restart: bool,
    pub on_host_maintenance: HostMaintenance,
    /// Maintenance resource policy, placed first in the policy list
    pub maintenance_policy: Option<String>,
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self {
            metadata: Vec::new(),
            startup_script: None,
            shutdown_script: None,
            automatic_restart: true,
            on_host_maintenance: HostMaintenance::Migrate,
            maintenance_policy: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AcceleratorConfig {
    pub accelerator_type: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeAffinityConfig {
    pub key: String,
    /// `IN` or `NOT_IN`; `IN` when empty
    pub operator: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdvancedConfig {
    pub accelerators: Vec<AcceleratorConfig>,
    pub node_affinities: Vec<NodeAffinityConfig>,
    pub resource_policies: Vec<String>,
    pub labels: Vec<KeyValue>,
    pub min_node_cpus: Option<i64>,
    pub enable_display: bool,
    pub enable_serial_port: Option<bool>,
    pub description: Option<String>,
    pub deletion_protection: bool,
    pub can_ip_forward: bool,
}

/// Project and location one provisioning call works in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub project: String,
    pub region: String,
    pub zone: String,
}

impl Scope {
    pub fn new(project: &str, region: &str, zone: &str) -> Self {
        Self {
            project: project.to_string(),
            region: region.to_string(),
            zone: zone.to_string(),
        }
    }
}

/// `^[a-z][-a-z0-9]{0,61}[a-z0-9]?$`
///
/// A trailing hyphen only fits inside the `{0,61}` run, so it is accepted up
/// to 62 characters and rejected at 63.
pub fn is_valid_instance_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.len() > 63 {
        return false;
    }
    if !bytes[0].is_ascii_lowercase() {
        return false;
    }
    if bytes.len() == 63 && bytes[62] == b'-' {
        return false;
    }
    bytes
        .iter()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl ProvisioningConfig {
    /// Load a configuration from a `.json`, `.yaml` or `.yml` file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid YAML in {}", path.display())),
            _ => serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON in {}", path.display())),
        }
    }

    /// Check everything that can be checked without calling the provider
    pub fn validate(&self) -> Result<()> {
        if self.instance_name.is_empty() {
            return Err(ProvisionError::validation("instance name is required"));
        }
        if !is_valid_instance_name(&self.instance_name) {
            return Err(ProvisionError::validation(format!(
                "instance name '{}' must be 1-63 lowercase letters, digits or hyphens and start with a letter",
                self.instance_name
            )));
        }
        if self.zone.trim().is_empty() {
            return Err(ProvisionError::validation("zone is required"));
        }
        if self.machine.machine_type.trim().is_empty() {
            return Err(ProvisionError::validation("machine type is required"));
        }
        if self.boot_disk.source.is_none() {
            return Err(ProvisionError::validation(
                "boot disk source (image, snapshot or disk) is required",
            ));
        }
        if let Some(source) = &self.boot_disk.source {
            validate_boot_source(source)?;
        }
        for rule in &self.networking.firewall_rules {
            FirewallRule::from_config(rule)?;
        }
        Ok(())
    }

    /// Resolve project and region defaults
    pub fn scope(&self, default_project: &str) -> Scope {
        let zone = self.zone.trim();
        let project = non_empty(&self.project).unwrap_or(default_project);
        let region = non_empty(&self.region)
            .map(|r| r.to_string())
            .unwrap_or_else(|| region_from_zone(zone));
        Scope::new(project, &region, zone)
    }
}

fn validate_boot_source(source: &BootDiskSource) -> Result<()> {
    let missing = match source {
        BootDiskSource::PublicImage {
            image_project,
            image,
        } => {
            let name = match image {
                ImageSelector::Name(n) | ImageSelector::Family(n) => n,
            };
            image_project.trim().is_empty() || name.trim().is_empty()
        },
        BootDiskSource::CustomImage { image } => image.trim().is_empty(),
        BootDiskSource::Snapshot { snapshot } => snapshot.trim().is_empty(),
        BootDiskSource::ExistingDisk { disk } => disk.trim().is_empty(),
    };
    if missing {
        return Err(ProvisionError::validation(
            "boot disk source is missing its image, snapshot or disk",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::minimal_config;
    use serde_json::json;

    #[test]
    fn test_instance_name_rules() {
        assert!(is_valid_instance_name("a"));
        assert!(is_valid_instance_name("my-vm-01"));
        assert!(is_valid_instance_name(&format!("a{}", "b".repeat(62))));
        assert!(!is_valid_instance_name(&format!("a{}", "b".repeat(63))));
        assert!(!is_valid_instance_name(""));
        assert!(!is_valid_instance_name("1vm"));
        assert!(!is_valid_instance_name("My-vm"));
        assert!(!is_valid_instance_name("vm_1"));
        assert!(is_valid_instance_name("vm-"));
        assert!(is_valid_instance_name(&format!("a{}-", "b".repeat(60))));
        assert!(!is_valid_instance_name(&format!("a{}-", "b".repeat(61))));
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = minimal_config();
        assert_eq!(config.machine.machine_type, "e2-medium");
        assert_eq!(config.machine.provisioning_model, ProvisioningModel::Standard);
        assert!(config.boot_disk.auto_delete);
        assert_eq!(config.networking.external_ip, ExternalIp::Ephemeral);
        assert_eq!(config.networking.internal_ip, InternalIp::Ephemeral);
        assert!(config.management.automatic_restart);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        let mut config = minimal_config();
        config.instance_name = "Bad_Name".to_string();
        assert!(config.validate().unwrap_err().is_validation());

        let mut config = minimal_config();
        config.zone = " ".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("zone"));

        let mut config = minimal_config();
        config.machine.machine_type.clear();
        assert!(config.validate().unwrap_err().to_string().contains("machine type"));

        let mut config = minimal_config();
        config.boot_disk.source = None;
        assert!(config.validate().unwrap_err().to_string().contains("boot disk"));
    }

    #[test]
    fn test_scope_defaults() {
        let config = minimal_config();
        assert_eq!(
            config.scope("client-project"),
            Scope::new("client-project", "us-central1", "us-central1-a")
        );

        let mut config = minimal_config();
        config.project = Some("other".to_string());
        config.region = Some("us-central1".to_string());
        assert_eq!(config.scope("client-project").project, "other");
    }

    #[test]
    fn test_sum_types_deserialize() {
        let disks: Vec<AdditionalDisk> = serde_json::from_value(json!([
            {"mode": "existing", "disk": "data-1", "readOnly": true},
            {"mode": "new", "sizeGb": 50, "diskType": "pd-ssd"}
        ]))
        .unwrap();
        assert!(matches!(&disks[0], AdditionalDisk::Existing { read_only: true, .. }));
        assert!(matches!(
            &disks[1],
            AdditionalDisk::New { size_gb: Some(50), auto_delete: true, .. }
        ));

        let external: ExternalIp = serde_json::from_value(json!({"type": "none"})).unwrap();
        assert_eq!(external, ExternalIp::Disabled);
        let external: ExternalIp =
            serde_json::from_value(json!({"type": "static", "address": "web-ip"})).unwrap();
        assert_eq!(
            external,
            ExternalIp::Static {
                address: "web-ip".to_string()
            }
        );
    }

    #[test]
    fn test_yaml_config() {
        let yaml = r#"
instanceName: batch-worker
zone: europe-west1-b
machineType: n2-standard-4
provisioningModel: SPOT
bootDisk:
  source:
    sourceType: snapshot
    snapshot: golden-snap
  sizeGb: 50
networking:
  externalIp:
    type: none
"#;
        let config: ProvisioningConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.machine.provisioning_model, ProvisioningModel::Spot);
        assert_eq!(config.networking.external_ip, ExternalIp::Disabled);
        assert!(config.validate().is_ok());
    }
}
