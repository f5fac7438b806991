//! Provisioning result
//!
//! Flattens the instance as the provider reports it after creation.

use super::model::Scope;
use crate::error::{ProvisionError, Result};
use crate::gcp::client::CatalogClient;
use crate::resource::types::short_name;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningResult {
    pub id: String,
    pub self_link: String,
    pub status: String,
    pub zone: String,
    pub name: String,
    pub machine_type: String,
    pub internal_ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_ip: Option<String>,
}

impl ProvisioningResult {
    /// Flat key/value view; `externalIp` is absent rather than empty
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::from([
            ("id".to_string(), self.id.clone()),
            ("selfLink".to_string(), self.self_link.clone()),
            ("status".to_string(), self.status.clone()),
            ("zone".to_string(), self.zone.clone()),
            ("name".to_string(), self.name.clone()),
            ("machineType".to_string(), self.machine_type.clone()),
            ("internalIp".to_string(), self.internal_ip.clone()),
        ]);
        if let Some(ip) = &self.external_ip {
            map.insert("externalIp".to_string(), ip.clone());
        }
        map
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Project a raw instance. Only the first network interface is read.
pub fn project_instance(instance: &Value, fallback_zone: &str) -> ProvisioningResult {
    let id = match instance.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    let zone = match short_name(str_field(instance, "zone")) {
        "" => fallback_zone.to_string(),
        zone => zone.to_string(),
    };

    let nic = instance
        .get("networkInterfaces")
        .and_then(Value::as_array)
        .and_then(|nics| nics.first());
    let internal_ip = nic.map(|n| str_field(n, "networkIP")).unwrap_or("").to_string();
    let external_ip = nic
        .and_then(|n| n.get("accessConfigs"))
        .and_then(Value::as_array)
        .and_then(|configs| {
            configs
                .iter()
                .map(|c| str_field(c, "natIP"))
                .find(|ip| !ip.is_empty())
        })
        .map(str::to_string);

    ProvisioningResult {
        id,
        self_link: str_field(instance, "selfLink").to_string(),
        status: str_field(instance, "status").to_string(),
        zone,
        name: str_field(instance, "name").to_string(),
        machine_type: short_name(str_field(instance, "machineType")).to_string(),
        internal_ip,
        external_ip,
    }
}

/// Read the created instance back
pub async fn fetch_instance(client: &dyn CatalogClient, scope: &Scope, name: &str) -> Result<Value> {
    let path = format!(
        "projects/{}/zones/{}/instances/{}",
        scope.project, scope.zone, name
    );
    client
        .get(&path)
        .await
        .map_err(|source| ProvisionError::InstanceFetch {
            name: name.to_string(),
            source,
        })
}
