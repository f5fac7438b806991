//! Resource catalog
//!
//! Per-kind listers used to populate provisioning choices. Every lister reads
//! through its own [`ResourceCache`] under `<kind>:<project>[:<scope>]` and
//! falls back to the pagination walker on a miss.

use super::cache::{cache_key, ResourceCache, DEFAULT_TTL};
use super::fetcher::fetch_all;
use super::types::{
    short_name, Address, Disk, DiskType, Firewall, Image, MachineType, Network, Region,
    ResourcePolicy, Snapshot, Subnetwork, Zone,
};
use crate::clock::{Clock, SystemClock};
use crate::error::{ProvisionError, Result};
use crate::gcp::CatalogClient;
use crate::pricing::{estimate_monthly_cost, format_monthly_estimate};
use crate::provision::model::ProvisioningModel;
use crate::provision::reference::{image_family_path, region_from_zone, resolve_subnetwork_url};
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// Provider-owned projects that publish public images
pub const PUBLIC_IMAGE_PROJECTS: &[&str] = &[
    "centos-cloud",
    "cos-cloud",
    "debian-cloud",
    "fedora-coreos-cloud",
    "rhel-cloud",
    "rocky-linux-cloud",
    "suse-cloud",
    "ubuntu-os-cloud",
    "ubuntu-os-pro-cloud",
    "windows-cloud",
];

pub fn is_public_image_project(project: &str) -> bool {
    PUBLIC_IMAGE_PROJECTS.contains(&project)
}

struct CatalogCaches {
    regions: ResourceCache<Vec<Region>>,
    zones: ResourceCache<Vec<Zone>>,
    machine_types: ResourceCache<Vec<MachineType>>,
    disk_types: ResourceCache<Vec<DiskType>>,
    images: ResourceCache<Vec<Image>>,
    disks: ResourceCache<Vec<Disk>>,
    snapshots: ResourceCache<Vec<Snapshot>>,
    resource_policies: ResourceCache<Vec<ResourcePolicy>>,
    networks: ResourceCache<Vec<Network>>,
    subnetworks: ResourceCache<Vec<Subnetwork>>,
    addresses: ResourceCache<Vec<Address>>,
    firewalls: ResourceCache<Vec<Firewall>>,
}

impl CatalogCaches {
    fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            regions: ResourceCache::new(clock.clone(), ttl),
            zones: ResourceCache::new(clock.clone(), ttl),
            machine_types: ResourceCache::new(clock.clone(), ttl),
            disk_types: ResourceCache::new(clock.clone(), ttl),
            images: ResourceCache::new(clock.clone(), ttl),
            disks: ResourceCache::new(clock.clone(), ttl),
            snapshots: ResourceCache::new(clock.clone(), ttl),
            resource_policies: ResourceCache::new(clock.clone(), ttl),
            networks: ResourceCache::new(clock.clone(), ttl),
            subnetworks: ResourceCache::new(clock.clone(), ttl),
            addresses: ResourceCache::new(clock.clone(), ttl),
            firewalls: ResourceCache::new(clock, ttl),
        }
    }
}

/// Cached view of a project's Compute Engine resources
pub struct Catalog {
    client: Arc<dyn CatalogClient>,
    caches: CatalogCaches,
}

impl Catalog {
    pub fn new(client: Arc<dyn CatalogClient>) -> Self {
        Self::with_clock(client, Arc::new(SystemClock), DEFAULT_TTL)
    }

    pub fn with_clock(client: Arc<dyn CatalogClient>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            client,
            caches: CatalogCaches::new(clock, ttl),
        }
    }

    pub fn client(&self) -> &Arc<dyn CatalogClient> {
        &self.client
    }

    /// Project to use when the caller passes none
    pub fn default_project(&self) -> &str {
        self.client.project_id()
    }

    async fn cached_list<T>(
        &self,
        cache: &ResourceCache<Vec<T>>,
        key: String,
        path: String,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Clone + Send + Sync,
    {
        if let Some(items) = cache.get(&key).await {
            tracing::debug!("Catalog cache hit for {}", key);
            return Ok(items);
        }

        let items: Vec<T> = fetch_all(self.client.as_ref(), &path).await?;
        cache.set(key, items.clone()).await;
        Ok(items)
    }

    pub async fn list_regions(&self, project: &str) -> Result<Vec<Region>> {
        self.cached_list(
            &self.caches.regions,
            cache_key("regions", project, None),
            format!("projects/{}/regions", project),
        )
        .await
    }

    /// Zones derived from the region list, optionally limited to one region
    pub async fn list_zones(&self, project: &str, region: Option<&str>) -> Result<Vec<Zone>> {
        let key = cache_key("zones", project, region);
        if let Some(zones) = self.caches.zones.get(&key).await {
            return Ok(zones);
        }

        let zones: Vec<Zone> = self
            .list_regions(project)
            .await?
            .iter()
            .filter(|r| region.map_or(true, |wanted| r.name == wanted))
            .flat_map(|r| {
                r.zone_names().map(|zone| Zone {
                    name: zone.to_string(),
                    region: r.name.clone(),
                })
            })
            .collect();

        self.caches.zones.set(key, zones.clone()).await;
        Ok(zones)
    }

    /// Machine types of a zone, decorated with a standard-model monthly estimate
    pub async fn list_machine_types(&self, project: &str, zone: &str) -> Result<Vec<MachineType>> {
        let key = cache_key("machineTypes", project, Some(zone));
        if let Some(types) = self.caches.machine_types.get(&key).await {
            return Ok(types);
        }

        let region = region_from_zone(zone);
        let mut types: Vec<MachineType> = fetch_all(
            self.client.as_ref(),
            &format!("projects/{}/zones/{}/machineTypes", project, zone),
        )
        .await?;
        for machine in &mut types {
            let cost = estimate_monthly_cost(
                &region,
                ProvisioningModel::Standard,
                f64::from(machine.guest_cpus),
                machine.memory_gb(),
            );
            machine.estimated_monthly_cost = Some(format_monthly_estimate(cost));
        }

        self.caches.machine_types.set(key, types.clone()).await;
        Ok(types)
    }

    pub async fn list_disk_types(&self, project: &str, zone: &str) -> Result<Vec<DiskType>> {
        self.cached_list(
            &self.caches.disk_types,
            cache_key("diskTypes", project, Some(zone)),
            format!("projects/{}/zones/{}/diskTypes", project, zone),
        )
        .await
    }

    async fn list_active_images(&self, kind: &str, project: &str) -> Result<Vec<Image>> {
        let images = self
            .cached_list(
                &self.caches.images,
                cache_key(kind, project, None),
                format!("projects/{}/global/images", project),
            )
            .await?;
        Ok(images.into_iter().filter(|i| !i.is_deprecated()).collect())
    }

    /// Public images of a provider image project. Unknown projects yield nothing.
    pub async fn list_public_images(&self, image_project: &str) -> Result<Vec<Image>> {
        if !is_public_image_project(image_project) {
            tracing::debug!("{} is not a public image project", image_project);
            return Ok(Vec::new());
        }
        self.list_active_images("publicImages", image_project).await
    }

    /// Custom images owned by the project
    pub async fn list_custom_images(&self, project: &str) -> Result<Vec<Image>> {
        self.list_active_images("images", project).await
    }

    /// Distinct image families of a public image project, sorted
    pub async fn list_image_families(&self, image_project: &str) -> Result<Vec<String>> {
        let families: BTreeSet<String> = self
            .list_public_images(image_project)
            .await?
            .into_iter()
            .map(|i| i.family)
            .filter(|f| !f.is_empty())
            .collect();
        Ok(families.into_iter().collect())
    }

    pub async fn list_disks(&self, project: &str, zone: &str) -> Result<Vec<Disk>> {
        self.cached_list(
            &self.caches.disks,
            cache_key("disks", project, Some(zone)),
            format!("projects/{}/zones/{}/disks", project, zone),
        )
        .await
    }

    pub async fn list_snapshots(&self, project: &str) -> Result<Vec<Snapshot>> {
        self.cached_list(
            &self.caches.snapshots,
            cache_key("snapshots", project, None),
            format!("projects/{}/global/snapshots", project),
        )
        .await
    }

    pub async fn list_resource_policies(
        &self,
        project: &str,
        region: &str,
    ) -> Result<Vec<ResourcePolicy>> {
        self.cached_list(
            &self.caches.resource_policies,
            cache_key("resourcePolicies", project, Some(region)),
            format!("projects/{}/regions/{}/resourcePolicies", project, region),
        )
        .await
    }

    pub async fn list_networks(&self, project: &str) -> Result<Vec<Network>> {
        self.cached_list(
            &self.caches.networks,
            cache_key("networks", project, None),
            format!("projects/{}/global/networks", project),
        )
        .await
    }

    pub async fn list_subnetworks(&self, project: &str, region: &str) -> Result<Vec<Subnetwork>> {
        self.cached_list(
            &self.caches.subnetworks,
            cache_key("subnetworks", project, Some(region)),
            format!("projects/{}/regions/{}/subnetworks", project, region),
        )
        .await
    }

    pub async fn list_addresses(&self, project: &str, region: &str) -> Result<Vec<Address>> {
        self.cached_list(
            &self.caches.addresses,
            cache_key("addresses", project, Some(region)),
            format!("projects/{}/regions/{}/addresses", project, region),
        )
        .await
    }

    /// Drop the cached firewall listing after rules were created
    pub async fn forget_firewalls(&self, project: &str) {
        if self
            .caches
            .firewalls
            .invalidate(&cache_key("firewalls", project, None))
            .await
        {
            tracing::debug!("Dropped cached firewalls of {}", project);
        }
    }

    pub async fn list_firewalls(&self, project: &str) -> Result<Vec<Firewall>> {
        self.cached_list(
            &self.caches.firewalls,
            cache_key("firewalls", project, None),
            format!("projects/{}/global/firewalls", project),
        )
        .await
    }

    /// Latest image of a family, as a self link. Not cached: families move.
    pub async fn resolve_image_family(&self, image_project: &str, family: &str) -> Result<String> {
        let path = image_family_path(family, image_project);
        let resolution_error = |reason: String| ProvisionError::Resolution {
            kind: "image family",
            reference: family.to_string(),
            reason,
        };

        let response = self
            .client
            .get(&path)
            .await
            .map_err(|e| resolution_error(format!("{:#}", e)))?;
        let image: Image = serde_json::from_value(response)
            .map_err(|e| ProvisionError::decode(format!("image family {}", family), e))?;

        if image.self_link.is_empty() {
            return Err(resolution_error("response has no selfLink".to_string()));
        }
        tracing::debug!("Image family {} resolved to {}", family, short_name(&image.self_link));
        Ok(image.self_link)
    }

    /// Literal IP for an address value: IP literals pass through, anything
    /// else names a reserved regional address.
    pub async fn resolve_address(&self, project: &str, region: &str, value: &str) -> Result<String> {
        let value = value.trim();
        if value.parse::<IpAddr>().is_ok() {
            return Ok(value.to_string());
        }

        let name = short_name(value);
        let resolution_error = |reason: String| ProvisionError::Resolution {
            kind: "address",
            reference: value.to_string(),
            reason,
        };
        if name.is_empty() {
            return Err(resolution_error("empty address name".to_string()));
        }

        let response = self
            .client
            .get(&format!("projects/{}/regions/{}/addresses/{}", project, region, name))
            .await
            .map_err(|e| resolution_error(format!("{:#}", e)))?;
        let address: Address = serde_json::from_value(response)
            .map_err(|e| ProvisionError::decode(format!("address {}", name), e))?;

        if address.address.is_empty() {
            return Err(resolution_error("reserved address has no IP".to_string()));
        }
        Ok(address.address)
    }

    /// VPC network URL a subnetwork belongs to. Short names are looked up in
    /// `region`; qualified paths and self links are fetched as given.
    pub async fn resolve_subnetwork_network(
        &self,
        project: &str,
        region: &str,
        subnetwork: &str,
    ) -> Result<String> {
        let resolution_error = |reason: String| ProvisionError::Resolution {
            kind: "subnetwork",
            reference: subnetwork.to_string(),
            reason,
        };

        let reference = subnetwork.trim();
        let response = if reference.starts_with("https://") {
            self.client.get_url(reference).await
        } else {
            self.client
                .get(&resolve_subnetwork_url(reference, project, region))
                .await
        }
        .map_err(|e| resolution_error(format!("{:#}", e)))?;
        let subnet: Subnetwork = serde_json::from_value(response)
            .map_err(|e| ProvisionError::decode(format!("subnetwork {}", reference), e))?;

        if subnet.network.is_empty() {
            return Err(resolution_error("subnetwork has no network".to_string()));
        }
        tracing::debug!("Subnetwork {} is in network {}", reference, short_name(&subnet.network));
        Ok(subnet.network)
    }
}
