//! Firewall rules for the instance's network tags
//!
//! Rules are written in a compact form (`tcp:22,tcp:80,icmp`) and created
//! before the instance. A rule that already exists counts as created.

use super::model::FirewallRuleConfig;
use super::reference::resolve_network_url;
use super::request::FirewallRequest;
use crate::error::{ProvisionError, Result};
use crate::gcp::client::CatalogClient;
use crate::resource::types::AllowedRule;
use tracing::{debug, info};

pub const DEFAULT_FIREWALL_PRIORITY: u32 = 1000;
pub const DEFAULT_FIREWALL_NETWORK: &str = "default";

/// A validated firewall rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirewallRule {
    pub name: String,
    pub allowed: Vec<AllowedRule>,
    pub source_ranges: Vec<String>,
    pub target_tag: String,
    pub network: Option<String>,
    pub priority: u32,
    pub description: Option<String>,
}

/// Parse `proto[:port][,proto[:port]...]`.
///
/// Entries are grouped by protocol in first-seen order. An entry without a
/// port opens every port of its protocol.
pub fn parse_allow_rules(allow: &str) -> Result<Vec<AllowedRule>> {
    // (protocol, ports); None = all ports
    let mut groups: Vec<(String, Option<Vec<String>>)> = Vec::new();

    for entry in allow.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (protocol, port) = match entry.split_once(':') {
            Some((protocol, port)) => (protocol.trim(), Some(port.trim())),
            None => (entry, None),
        };
        if protocol.is_empty() {
            return Err(ProvisionError::validation(format!(
                "firewall rule entry '{}' has no protocol",
                entry
            )));
        }
        if port.is_some_and(str::is_empty) {
            return Err(ProvisionError::validation(format!(
                "firewall rule entry '{}' has an empty port",
                entry
            )));
        }

        let protocol = protocol.to_lowercase();
        let index = match groups.iter().position(|(p, _)| *p == protocol) {
            Some(index) => index,
            None => {
                groups.push((protocol, Some(Vec::new())));
                groups.len() - 1
            },
        };
        let ports = &mut groups[index].1;
        match port {
            None => *ports = None,
            Some(port) => {
                if let Some(list) = ports {
                    if !list.iter().any(|p| p == port) {
                        list.push(port.to_string());
                    }
                }
            },
        }
    }

    Ok(groups
        .into_iter()
        .map(|(ip_protocol, ports)| AllowedRule {
            ip_protocol,
            ports: ports.unwrap_or_default(),
        })
        .collect())
}

fn split_ranges(ranges: &str) -> Vec<String> {
    ranges
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

impl FirewallRule {
    pub fn from_config(config: &FirewallRuleConfig) -> Result<Self> {
        let name = config.name.trim();
        if name.is_empty() {
            return Err(ProvisionError::validation("firewall rule name is required"));
        }
        let allowed = parse_allow_rules(&config.allow)?;
        if allowed.is_empty() {
            return Err(ProvisionError::validation(format!(
                "firewall rule {} needs at least one allow entry",
                name
            )));
        }
        let source_ranges = split_ranges(&config.source_ranges);
        if source_ranges.is_empty() {
            return Err(ProvisionError::validation(format!(
                "firewall rule {} needs at least one source range",
                name
            )));
        }
        let target_tag = config.target_tag.trim();
        if target_tag.is_empty() {
            return Err(ProvisionError::validation(format!(
                "firewall rule {} needs a target tag",
                name
            )));
        }

        Ok(Self {
            name: name.to_string(),
            allowed,
            source_ranges,
            target_tag: target_tag.to_string(),
            network: config
                .network
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            priority: config.priority.unwrap_or(DEFAULT_FIREWALL_PRIORITY),
            description: config.description.clone(),
        })
    }

    /// Insert payload; the rule's own network wins over `default_network`
    pub fn to_request(&self, project: &str, default_network: &str) -> FirewallRequest {
        let network = self.network.as_deref().unwrap_or(default_network);
        FirewallRequest {
            name: self.name.clone(),
            network: resolve_network_url(network, project),
            direction: "INGRESS".to_string(),
            priority: self.priority,
            allowed: self.allowed.clone(),
            source_ranges: self.source_ranges.clone(),
            target_tags: vec![self.target_tag.clone()],
            description: self.description.clone(),
        }
    }
}

/// Status prefix the transport puts on a 409 response
const CONFLICT_STATUS: &str = "api request failed: 409";

/// Matches the provider's conflict response for an existing resource: the
/// transport's 409 status or the phrase "already exists". Digits elsewhere in
/// the message do not count.
pub fn is_already_exists(err: &anyhow::Error) -> bool {
    let message = format!("{:#}", err).to_lowercase();
    message.contains("already exists") || message.contains(CONFLICT_STATUS)
}

/// Create every rule and return the target tags, deduplicated in order
pub async fn ensure_firewall_rules(
    client: &dyn CatalogClient,
    project: &str,
    default_network: &str,
    rules: &[FirewallRule],
) -> Result<Vec<String>> {
    let path = format!("projects/{}/global/firewalls", project);
    let mut tags: Vec<String> = Vec::new();

    for rule in rules {
        let request = rule.to_request(project, default_network);
        let body = serde_json::to_value(&request)
            .map_err(|e| ProvisionError::decode("firewall request", e))?;

        match client.post(&path, &body).await {
            Ok(_) => info!("Created firewall rule {}", rule.name),
            Err(e) if is_already_exists(&e) => {
                debug!("Firewall rule {} already exists", rule.name);
            },
            Err(e) => {
                return Err(ProvisionError::provider(
                    format!("create firewall rule {}", rule.name),
                    e,
                ));
            },
        }

        if !tags.contains(&rule.target_tag) {
            tags.push(rule.target_tag.clone());
        }
    }
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeClient;
    use serde_json::json;

    fn rule_config(name: &str, allow: &str, tag: &str) -> FirewallRuleConfig {
        FirewallRuleConfig {
            name: name.to_string(),
            allow: allow.to_string(),
            source_ranges: "0.0.0.0/0".to_string(),
            target_tag: tag.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_grammar_groups_by_protocol() {
        let rules = parse_allow_rules("tcp:22, udp:53,tcp:80,icmp,TCP:22").unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0].ip_protocol, "tcp");
        assert_eq!(rules[0].ports, vec!["22", "80"]);
        assert_eq!(rules[1].ip_protocol, "udp");
        assert_eq!(rules[1].ports, vec!["53"]);
        assert_eq!(rules[2].ip_protocol, "icmp");
        assert!(rules[2].ports.is_empty());
    }

    #[test]
    fn test_portless_entry_opens_all_ports() {
        let rules = parse_allow_rules("tcp:443,tcp,tcp:8080").unwrap();
        assert_eq!(rules.len(), 1);
        assert!(rules[0].ports.is_empty());
    }

    #[test]
    fn test_grammar_errors() {
        assert!(parse_allow_rules(":22").is_err());
        assert!(parse_allow_rules("tcp:").is_err());
        assert!(parse_allow_rules(" , ").unwrap().is_empty());
    }

    #[test]
    fn test_rule_validation() {
        assert!(FirewallRule::from_config(&rule_config("", "tcp:22", "ssh")).is_err());
        assert!(FirewallRule::from_config(&rule_config("allow-ssh", "", "ssh")).is_err());
        assert!(FirewallRule::from_config(&rule_config("allow-ssh", "tcp:22", " ")).is_err());

        let mut config = rule_config("allow-ssh", "tcp:22", "ssh");
        config.source_ranges = " , ".to_string();
        assert!(FirewallRule::from_config(&config).is_err());

        let rule = FirewallRule::from_config(&rule_config("allow-ssh", "tcp:22", "ssh")).unwrap();
        assert_eq!(rule.priority, DEFAULT_FIREWALL_PRIORITY);
    }

    #[test]
    fn test_request_uses_rule_network() {
        let mut config = rule_config("allow-web", "tcp:80", "web");
        config.network = Some("prod-vpc".to_string());
        let request = FirewallRule::from_config(&config)
            .unwrap()
            .to_request("proj", "default");
        assert_eq!(request.network, "projects/proj/global/networks/prod-vpc");
        assert_eq!(request.direction, "INGRESS");

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["allowed"][0]["IPProtocol"], "tcp");
        assert_eq!(value["sourceRanges"], json!(["0.0.0.0/0"]));
    }

    #[test]
    fn test_already_exists_detection() {
        assert!(is_already_exists(&anyhow::anyhow!(
            "API request failed: 409 Conflict - The resource 'x' already exists"
        )));
        assert!(is_already_exists(
            &anyhow::anyhow!("Already Exists").context("create firewall")
        ));
        assert!(!is_already_exists(&anyhow::anyhow!("API request failed: 403 Forbidden")));
        assert!(is_already_exists(&anyhow::anyhow!("API request failed: 409 Conflict")));
    }

    #[test]
    fn test_conflict_digits_in_message_are_not_a_conflict() {
        assert!(!is_already_exists(&anyhow::anyhow!(
            "API request failed: 403 Forbidden - Required 'compute.firewalls.create' permission for 'projects/740940912'"
        )));
        assert!(!is_already_exists(&anyhow::anyhow!(
            "API request failed: 400 Bad Request - Invalid value for field 'resource.priority': '4096'"
        )));
    }

    #[tokio::test]
    async fn test_existing_rule_still_yields_tag() {
        let client = FakeClient::new("proj");
        client.on_post_error(
            "projects/proj/global/firewalls",
            "API request failed: 409 Conflict - The resource 'allow-ssh' already exists",
        );
        let rules = vec![
            FirewallRule::from_config(&rule_config("allow-ssh", "tcp:22", "ssh")).unwrap(),
            FirewallRule::from_config(&rule_config("allow-ssh-2", "tcp:2222", "ssh")).unwrap(),
        ];

        let tags = ensure_firewall_rules(&client, "proj", "default", &rules)
            .await
            .unwrap();
        assert_eq!(tags, vec!["ssh"]);
        assert_eq!(client.posts().len(), 2);
    }

    #[tokio::test]
    async fn test_other_errors_propagate() {
        let client = FakeClient::new("proj");
        client.on_post_error(
            "projects/proj/global/firewalls",
            "API request failed: 403 Forbidden - Required 'compute.firewalls.create' permission",
        );
        let rules = vec![FirewallRule::from_config(&rule_config("allow-ssh", "tcp:22", "ssh")).unwrap()];

        let err = ensure_firewall_rules(&client, "proj", "default", &rules)
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Provider { .. }));
        assert!(err.to_string().contains("compute.firewalls.create"));
    }
}
