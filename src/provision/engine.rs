//! Provisioning engine
//!
//! validate -> resolve references -> firewall rules -> compile -> assemble ->
//! insert -> poll -> fetch -> project. Every provider lookup happens before the
//! first mutating call. Nothing is rolled back: a failure after the insert was
//! accepted leaves the instance in place and is reported as an error.

use super::assembler::assemble;
use super::compiler::{compile, compile_resolved, resolve_addresses, resolve_boot_source};
use super::firewall::{ensure_firewall_rules, FirewallRule, DEFAULT_FIREWALL_NETWORK};
use super::model::{ProvisioningConfig, Scope};
use super::operation::{insert_instance, OperationPoller};
use super::request::InstanceRequest;
use super::result::{fetch_instance, project_instance, ProvisioningResult};
use crate::cancel::CancelSignal;
use crate::error::{ProvisionError, Result};
use crate::gcp::client::CatalogClient;
use crate::resource::catalog::Catalog;
use std::sync::Arc;
use tracing::info;

pub struct Provisioner {
    catalog: Arc<Catalog>,
    poller: OperationPoller,
}

impl Provisioner {
    pub fn new(catalog: Arc<Catalog>, poller: OperationPoller) -> Self {
        Self { catalog, poller }
    }

    fn client(&self) -> &dyn CatalogClient {
        self.catalog.client().as_ref()
    }

    fn firewall_rules(config: &ProvisioningConfig) -> Result<Vec<FirewallRule>> {
        config
            .networking
            .firewall_rules
            .iter()
            .map(FirewallRule::from_config)
            .collect()
    }

    /// Network the firewall rules attach to by default: the configured
    /// network, else the VPC of the configured subnetwork, else `default`
    async fn firewall_network(
        &self,
        config: &ProvisioningConfig,
        scope: &Scope,
        rules: &[FirewallRule],
    ) -> Result<String> {
        let non_empty = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        if let Some(network) = non_empty(&config.networking.network) {
            return Ok(network);
        }
        let subnetwork = non_empty(&config.networking.subnetwork);
        match subnetwork {
            Some(subnetwork) if rules.iter().any(|r| r.network.is_none()) => {
                self.catalog
                    .resolve_subnetwork_network(&scope.project, &scope.region, &subnetwork)
                    .await
            },
            _ => Ok(DEFAULT_FIREWALL_NETWORK.to_string()),
        }
    }

    /// Build the insert request without creating anything. Firewall target
    /// tags are included as if the rules existed.
    pub async fn plan(&self, config: &ProvisioningConfig) -> Result<InstanceRequest> {
        config.validate()?;
        let scope = config.scope(self.catalog.default_project());
        let tags: Vec<String> = Self::firewall_rules(config)?
            .into_iter()
            .map(|r| r.target_tag)
            .collect();

        let compiled = compile(&self.catalog, config, &scope, &tags).await?;
        Ok(assemble(config, &scope, compiled))
    }

    pub async fn provision(
        &self,
        config: &ProvisioningConfig,
        cancel: &CancelSignal,
    ) -> Result<ProvisioningResult> {
        config.validate()?;
        let scope = config.scope(self.catalog.default_project());
        info!(
            "Provisioning {} in {}/{}",
            config.instance_name, scope.project, scope.zone
        );

        let rules = Self::firewall_rules(config)?;
        let boot_source = resolve_boot_source(&self.catalog, config, &scope).await?;
        let addresses = resolve_addresses(&self.catalog, config, &scope).await?;
        let firewall_network = self.firewall_network(config, &scope, &rules).await?;

        let tags = ensure_firewall_rules(self.client(), &scope.project, &firewall_network, &rules)
            .await?;
        if !rules.is_empty() {
            self.catalog.forget_firewalls(&scope.project).await;
        }

        let compiled = compile_resolved(config, &scope, boot_source, &addresses, &tags);
        let request = assemble(config, &scope, compiled);

        if cancel.is_cancelled() {
            return Err(ProvisionError::Cancelled(format!(
                "insert of {}",
                config.instance_name
            )));
        }

        let operation = insert_instance(self.client(), &scope, &request).await?;
        if !operation.check()? {
            self.poller
                .wait(self.client(), &scope, &operation.name, cancel)
                .await?;
        }

        let instance = fetch_instance(self.client(), &scope, &request.name).await?;
        let result = project_instance(&instance, &scope.zone);
        info!("Instance {} is {}", result.name, result.status);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::testing::{minimal_config, FakeClient};
    use serde_json::json;

    const FAMILY: &str = "projects/debian-cloud/global/images/family/debian-12";
    const INSERT: &str = "projects/proj/zones/us-central1-a/instances";
    const FIREWALLS: &str = "projects/proj/global/firewalls";

    fn engine(client: Arc<FakeClient>) -> Provisioner {
        let catalog = Arc::new(Catalog::new(client));
        Provisioner::new(catalog, OperationPoller::new(Arc::new(ManualClock::default())))
    }

    fn scripted() -> Arc<FakeClient> {
        let client = FakeClient::new("proj");
        client.on_get(
            FAMILY,
            json!({"name": "debian-12-v1", "selfLink": "projects/debian-cloud/global/images/debian-12-v1"}),
        );
        Arc::new(client)
    }

    #[tokio::test]
    async fn test_invalid_config_makes_no_calls() {
        let client = scripted();
        let mut config = minimal_config();
        config.instance_name = "-bad".to_string();

        let err = engine(client.clone())
            .provision(&config, &CancelSignal::never())
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(client.get_count(), 0);
        assert!(client.posts().is_empty());
    }

    #[tokio::test]
    async fn test_plan_does_not_insert() {
        let client = scripted();
        let request = engine(client.clone()).plan(&minimal_config()).await.unwrap();
        assert_eq!(
            request.boot_disk().unwrap().initialize_params.as_ref().unwrap().source_image.as_deref(),
            Some("projects/debian-cloud/global/images/debian-12-v1")
        );
        assert!(client.posts().is_empty());
    }

    #[tokio::test]
    async fn test_insert_done_immediately_skips_polling() {
        let client = scripted();
        client.on_post(INSERT, json!({"name": "op-1", "status": "DONE"}));
        client.on_get(
            "projects/proj/zones/us-central1-a/instances/my-vm-01",
            json!({"id": "1", "name": "my-vm-01", "status": "RUNNING",
                   "networkInterfaces": [{"networkIP": "10.0.0.9"}]}),
        );

        let result = engine(client.clone())
            .provision(&minimal_config(), &CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(result.internal_ip, "10.0.0.9");
        assert!(!client.gets().iter().any(|p| p.contains("/operations/")));
    }

    fn with_firewall_rule(mut config: ProvisioningConfig) -> ProvisioningConfig {
        config.networking.firewall_rules = vec![crate::provision::model::FirewallRuleConfig {
            name: "allow-http".to_string(),
            allow: "tcp:80".to_string(),
            source_ranges: "0.0.0.0/0".to_string(),
            target_tag: "http-server".to_string(),
            ..Default::default()
        }];
        config
    }

    #[tokio::test]
    async fn test_failed_lookup_creates_no_firewall_rule() {
        let client = Arc::new(FakeClient::new("proj"));
        client.on_get_error(
            FAMILY,
            "API request failed: 404 Not Found - The resource 'debian-12' was not found",
        );
        client.on_post(FIREWALLS, json!({"name": "op-fw", "status": "DONE"}));

        let err = engine(client.clone())
            .provision(&with_firewall_rule(minimal_config()), &CancelSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Resolution { kind: "image family", .. }));
        assert!(client.posts().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_static_address_creates_no_firewall_rule() {
        let client = scripted();
        client.on_post(FIREWALLS, json!({"name": "op-fw", "status": "DONE"}));
        let mut config = with_firewall_rule(minimal_config());
        config.networking.external_ip = crate::provision::model::ExternalIp::Static {
            address: "missing-ip".to_string(),
        };

        let err = engine(client.clone())
            .provision(&config, &CancelSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Resolution { kind: "address", .. }));
        assert!(client.posts().is_empty());
    }

    #[tokio::test]
    async fn test_subnetwork_only_rules_attach_to_its_network() {
        let client = scripted();
        client.on_get(
            "projects/proj/regions/us-central1/subnetworks/app-subnet",
            json!({"name": "app-subnet", "network": "projects/proj/global/networks/prod-vpc"}),
        );
        client.on_post(FIREWALLS, json!({"name": "op-fw", "status": "DONE"}));
        client.on_post(INSERT, json!({"name": "op-1", "status": "DONE"}));
        client.on_get(
            "projects/proj/zones/us-central1-a/instances/my-vm-01",
            json!({"id": "1", "name": "my-vm-01", "status": "RUNNING"}),
        );
        let mut config = with_firewall_rule(minimal_config());
        config.networking.subnetwork = Some("app-subnet".to_string());

        engine(client.clone())
            .provision(&config, &CancelSignal::never())
            .await
            .unwrap();

        let posts = client.posts();
        let (_, firewall) = posts
            .iter()
            .find(|(path, _)| path == FIREWALLS)
            .expect("firewall rule was created");
        assert_eq!(firewall["network"], "projects/proj/global/networks/prod-vpc");
    }
}
