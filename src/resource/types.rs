//! Catalog entry types
//!
//! Read-only projections of Compute Engine list responses. Field names follow
//! the API (camelCase); int64 values arrive as JSON strings and are accepted
//! either way.

use serde::{Deserialize, Deserializer, Serialize};

/// Last path segment of a resource URL
/// e.g., ".../projects/my-project/zones/us-central1-a" -> "us-central1-a"
pub fn short_name(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrString {
    Int(u64),
    Str(String),
}

pub(crate) fn de_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<IntOrString>::deserialize(deserializer)? {
        None => Ok(0),
        Some(IntOrString::Int(n)) => Ok(n),
        Some(IntOrString::Str(s)) if s.is_empty() => Ok(0),
        Some(IntOrString::Str(s)) => s.parse().map_err(serde::de::Error::custom),
    }
}

pub(crate) fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<IntOrString>::deserialize(deserializer)? {
        None => String::new(),
        Some(IntOrString::Int(n)) => n.to_string(),
        Some(IntOrString::Str(s)) => s,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Region {
    pub name: String,
    pub self_link: String,
    pub status: String,
    pub description: String,
    /// Zone URLs as returned by the API
    pub zones: Vec<String>,
}

impl Region {
    pub fn zone_names(&self) -> impl Iterator<Item = &str> {
        self.zones.iter().map(|z| short_name(z))
    }
}

/// Zones are derived from their region's zone list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub name: String,
    pub region: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MachineType {
    pub name: String,
    pub description: String,
    pub self_link: String,
    pub guest_cpus: u32,
    #[serde(deserialize_with = "de_u64")]
    pub memory_mb: u64,
    pub zone: String,
    pub is_shared_cpu: bool,
    /// Filled in by the catalog from the pricing table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_monthly_cost: Option<String>,
}

impl MachineType {
    pub fn memory_gb(&self) -> f64 {
        self.memory_mb as f64 / 1024.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Deprecation {
    pub state: String,
    pub replacement: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Image {
    pub name: String,
    pub self_link: String,
    pub family: String,
    pub description: String,
    pub status: String,
    pub architecture: String,
    #[serde(deserialize_with = "de_u64")]
    pub disk_size_gb: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<Deprecation>,
}

impl Image {
    /// DEPRECATED, OBSOLETE and DELETED images are hidden from listings
    pub fn is_deprecated(&self) -> bool {
        self.deprecated
            .as_ref()
            .is_some_and(|d| !d.state.is_empty() && d.state != "ACTIVE")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiskType {
    pub name: String,
    pub description: String,
    pub self_link: String,
    pub zone: String,
    pub valid_disk_size: String,
    #[serde(deserialize_with = "de_u64")]
    pub default_disk_size_gb: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Disk {
    pub name: String,
    pub self_link: String,
    pub zone: String,
    pub status: String,
    #[serde(rename = "type")]
    pub disk_type: String,
    #[serde(deserialize_with = "de_u64")]
    pub size_gb: u64,
    /// Instances the disk is attached to
    pub users: Vec<String>,
}

impl Disk {
    pub fn is_attached(&self) -> bool {
        !self.users.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    pub name: String,
    pub self_link: String,
    pub status: String,
    pub source_disk: String,
    #[serde(deserialize_with = "de_u64")]
    pub disk_size_gb: u64,
    #[serde(deserialize_with = "de_u64")]
    pub storage_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResourcePolicyKind {
    SnapshotSchedule,
    InstanceSchedule,
    GroupPlacement,
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourcePolicy {
    pub name: String,
    pub self_link: String,
    pub region: String,
    pub description: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_schedule_policy: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_schedule_policy: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_placement_policy: Option<serde_json::Value>,
}

impl ResourcePolicy {
    pub fn kind(&self) -> ResourcePolicyKind {
        if self.snapshot_schedule_policy.is_some() {
            ResourcePolicyKind::SnapshotSchedule
        } else if self.instance_schedule_policy.is_some() {
            ResourcePolicyKind::InstanceSchedule
        } else if self.group_placement_policy.is_some() {
            ResourcePolicyKind::GroupPlacement
        } else {
            ResourcePolicyKind::Other
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Network {
    pub name: String,
    pub self_link: String,
    pub description: String,
    pub auto_create_subnetworks: bool,
    pub subnetworks: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Subnetwork {
    pub name: String,
    pub self_link: String,
    pub network: String,
    pub region: String,
    pub ip_cidr_range: String,
    pub stack_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Address {
    pub name: String,
    pub self_link: String,
    pub address: String,
    pub address_type: String,
    pub status: String,
    pub region: String,
    pub network_tier: String,
}

impl Address {
    /// RESERVED addresses are free to attach, IN_USE ones are not
    pub fn is_available(&self) -> bool {
        self.status == "RESERVED"
    }
}

/// One allow entry of a firewall rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedRule {
    #[serde(rename = "IPProtocol")]
    pub ip_protocol: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Firewall {
    pub name: String,
    pub self_link: String,
    pub network: String,
    pub direction: String,
    pub priority: u32,
    pub source_ranges: Vec<String>,
    pub target_tags: Vec<String>,
    pub allowed: Vec<AllowedRule>,
    pub disabled: bool,
}
