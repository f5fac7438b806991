//! Compute Engine `Instance` insert payload
//!
//! Serializes to the JSON body of `POST projects/<p>/zones/<z>/instances`.
//! Empty collections and unset options are left out of the body.

use crate::resource::types::AllowedRule;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRequest {
    pub name: String,
    pub machine_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_cpu_platform: Option<String>,
    /// Boot disk first
    pub disks: Vec<AttachedDisk>,
    pub network_interfaces: Vec<NetworkInterface>,
    pub scheduling: Scheduling,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub service_accounts: Vec<ServiceAccount>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub guest_accelerators: Vec<AcceleratorConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource_policies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shielded_instance_config: Option<ShieldedInstanceConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidential_instance_config: Option<ConfidentialInstanceConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_device: Option<DisplayDevice>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub deletion_protection: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub can_ip_forward: bool,
}

impl InstanceRequest {
    pub fn boot_disk(&self) -> Option<&AttachedDisk> {
        self.disks.first().filter(|d| d.boot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiskKind {
    Persistent,
    Scratch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiskMode {
    ReadWrite,
    ReadOnly,
}

/// Local SSDs are always attached over NVMe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiskInterface {
    Nvme,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedDisk {
    pub boot: bool,
    pub auto_delete: bool,
    #[serde(rename = "type")]
    pub kind: DiskKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<DiskMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface: Option<DiskInterface>,
    /// Existing disk to attach
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    /// Parameters for a disk created together with the instance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initialize_params: Option<InitializeParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_encryption_key: Option<EncryptionKey>,
}

impl AttachedDisk {
    /// A persistent disk with everything optional unset
    pub fn persistent(boot: bool, auto_delete: bool) -> Self {
        Self {
            boot,
            auto_delete,
            kind: DiskKind::Persistent,
            mode: None,
            interface: None,
            source: None,
            device_name: None,
            initialize_params: None,
            disk_encryption_key: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_snapshot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_size_gb: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource_policies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionKey {
    pub kms_key_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnetwork: Option<String>,
    #[serde(rename = "networkIP", skip_serializing_if = "Option::is_none")]
    pub network_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nic_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub access_configs: Vec<AccessConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "natIP", skip_serializing_if = "Option::is_none")]
    pub nat_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_tier: Option<String>,
}

impl AccessConfig {
    pub fn one_to_one_nat(nat_ip: Option<String>, network_tier: Option<String>) -> Self {
        Self {
            name: "External NAT".to_string(),
            kind: "ONE_TO_ONE_NAT".to_string(),
            nat_ip,
            network_tier,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scheduling {
    pub preemptible: bool,
    pub on_host_maintenance: String,
    pub automatic_restart: bool,
    pub provisioning_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_termination_action: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub node_affinities: Vec<NodeAffinity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_node_cpus: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAffinity {
    pub key: String,
    pub operator: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataItem {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub items: Vec<MetadataItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Tags {
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceAccount {
    pub email: String,
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceleratorConfig {
    pub accelerator_type: String,
    pub accelerator_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShieldedInstanceConfig {
    pub enable_secure_boot: bool,
    pub enable_vtpm: bool,
    pub enable_integrity_monitoring: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidentialInstanceConfig {
    pub confidential_instance_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayDevice {
    pub enable_display: bool,
}

/// `POST projects/<p>/global/firewalls` payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallRequest {
    pub name: String,
    pub network: String,
    pub direction: String,
    pub priority: u32,
    pub allowed: Vec<AllowedRule>,
    pub source_ranges: Vec<String>,
    pub target_tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
