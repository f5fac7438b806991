//! The instance's network interface

use super::model::{ExternalIp, InternalIp, NetworkingConfig, Scope};
use super::reference::{resolve_network_url, resolve_subnetwork_url};
use super::request::{AccessConfig, NetworkInterface};

pub const DEFAULT_NETWORK: &str = "default";

/// Static addresses after reserved-address names were looked up.
/// `None` falls back to the configured value as a literal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAddresses {
    pub internal: Option<String>,
    pub external: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Exactly one interface. Neither network nor subnetwork set means the
/// `default` network.
pub fn build_network_interface(
    config: &NetworkingConfig,
    scope: &Scope,
    addresses: &ResolvedAddresses,
) -> NetworkInterface {
    let network = non_empty(&config.network);
    let subnetwork = non_empty(&config.subnetwork);

    let network = match (network, subnetwork) {
        (Some(network), _) => Some(resolve_network_url(network, &scope.project)),
        (None, None) => Some(resolve_network_url(DEFAULT_NETWORK, &scope.project)),
        (None, Some(_)) => None,
    };
    let subnetwork =
        subnetwork.map(|s| resolve_subnetwork_url(s, &scope.project, &scope.region));

    let network_ip = match &config.internal_ip {
        InternalIp::Ephemeral => None,
        InternalIp::Static { address } => addresses
            .internal
            .clone()
            .or_else(|| Some(address.trim().to_string())),
    };

    let network_tier = non_empty(&config.network_tier).map(str::to_string);
    let access_configs = match &config.external_ip {
        ExternalIp::Disabled => Vec::new(),
        ExternalIp::Ephemeral => vec![AccessConfig::one_to_one_nat(None, network_tier)],
        ExternalIp::Static { address } => {
            let nat_ip = addresses
                .external
                .clone()
                .unwrap_or_else(|| address.trim().to_string());
            vec![AccessConfig::one_to_one_nat(Some(nat_ip), network_tier)]
        },
    };

    NetworkInterface {
        network,
        subnetwork,
        network_ip,
        nic_type: non_empty(&config.nic_type).map(str::to_string),
        stack_type: non_empty(&config.stack_type).map(str::to_string),
        access_configs,
    }
}
