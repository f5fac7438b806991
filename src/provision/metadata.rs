//! Metadata items, labels and network tags

use super::model::{KeyValue, ProvisioningConfig};
use super::request::{Metadata, MetadataItem, Tags};
use std::collections::BTreeMap;

/// Ordered metadata items where setting an existing key replaces its value
#[derive(Debug, Default)]
pub struct MetadataBuilder {
    items: Vec<MetadataItem>,
}

impl MetadataBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: &str) -> &mut Self {
        let key = key.trim();
        if key.is_empty() {
            return self;
        }
        match self.items.iter_mut().find(|item| item.key == key) {
            Some(item) => item.value = value.to_string(),
            None => self.items.push(MetadataItem {
                key: key.to_string(),
                value: value.to_string(),
            }),
        }
        self
    }

    /// `TRUE`/`FALSE`, only when the flag was set
    pub fn set_flag(&mut self, key: &str, flag: Option<bool>) -> &mut Self {
        match flag {
            Some(true) => self.set(key, "TRUE"),
            Some(false) => self.set(key, "FALSE"),
            None => self,
        }
    }

    pub fn build(self) -> Option<Metadata> {
        if self.items.is_empty() {
            None
        } else {
            Some(Metadata { items: self.items })
        }
    }
}

pub fn build_metadata(config: &ProvisioningConfig) -> Option<Metadata> {
    let management = &config.management;
    let mut builder = MetadataBuilder::new();

    for KeyValue { key, value } in &management.metadata {
        builder.set(key, value);
    }
    if let Some(script) = management.startup_script.as_deref().filter(|s| !s.trim().is_empty()) {
        builder.set("startup-script", script);
    }
    if let Some(script) = management.shutdown_script.as_deref().filter(|s| !s.trim().is_empty()) {
        builder.set("shutdown-script", script);
    }
    builder
        .set_flag("block-project-ssh-keys", config.identity.block_project_ssh_keys)
        .set_flag("enable-oslogin", config.identity.enable_os_login)
        .set_flag("serial-port-enable", config.advanced.enable_serial_port);

    builder.build()
}

/// Labels keyed by name; the first occurrence of a key wins
pub fn build_labels(labels: &[KeyValue]) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for label in labels {
        let key = label.key.trim();
        if key.is_empty() {
            continue;
        }
        map.entry(key.to_string())
            .or_insert_with(|| label.value.trim().to_string());
    }
    map
}

/// Network tags in first-seen order without duplicates
pub fn build_tags<'a>(tags: impl IntoIterator<Item = &'a String>) -> Option<Tags> {
    let mut items: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !items.iter().any(|t| t == tag) {
            items.push(tag.to_string());
        }
    }
    if items.is_empty() {
        None
    } else {
        Some(Tags { items })
    }
}
