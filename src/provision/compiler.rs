//! Configuration compiler
//!
//! Resolves the references that need the provider (image families, reserved
//! address names) through the [`Catalog`], then maps each configuration
//! section to its request fragment.

use super::disks::{build_additional_disks, build_boot_disk, build_local_ssd_disks, BootSource};
use super::identity::{build_confidential_config, build_service_accounts, build_shielded_config};
use super::metadata::{build_labels, build_metadata, build_tags};
use super::model::{
    BootDiskSource, ExternalIp, ImageSelector, InternalIp, ProvisioningConfig, Scope,
};
use super::network::{build_network_interface, ResolvedAddresses};
use super::reference::{resolve_disk_url, resolve_image_url, resolve_snapshot_url};
use super::request::{
    AcceleratorConfig, AttachedDisk, ConfidentialInstanceConfig, DisplayDevice, Metadata,
    NetworkInterface, Scheduling, ServiceAccount, ShieldedInstanceConfig, Tags,
};
use super::scheduling::{build_accelerators, build_resource_policies, build_scheduling};
use crate::error::{ProvisionError, Result};
use crate::resource::catalog::Catalog;
use std::collections::BTreeMap;
use tracing::debug;

/// Every request fragment of one instance
#[derive(Debug, Clone)]
pub struct CompiledInstance {
    /// Boot disk, additional disks, then local SSDs
    pub disks: Vec<AttachedDisk>,
    pub network_interface: NetworkInterface,
    pub scheduling: Scheduling,
    pub resource_policies: Vec<String>,
    pub metadata: Option<Metadata>,
    pub labels: BTreeMap<String, String>,
    pub tags: Option<Tags>,
    pub service_accounts: Vec<ServiceAccount>,
    pub accelerators: Vec<AcceleratorConfig>,
    pub shielded: Option<ShieldedInstanceConfig>,
    pub confidential: Option<ConfidentialInstanceConfig>,
    pub display: Option<DisplayDevice>,
}

/// Qualify the boot disk source. Image families are looked up in the catalog.
pub async fn resolve_boot_source(
    catalog: &Catalog,
    config: &ProvisioningConfig,
    scope: &Scope,
) -> Result<BootSource> {
    let source = config
        .boot_disk
        .source
        .as_ref()
        .ok_or_else(|| ProvisionError::validation("boot disk source is required"))?;

    let resolved = match source {
        BootDiskSource::PublicImage {
            image_project,
            image: ImageSelector::Family(family),
        } => BootSource::Image(
            catalog
                .resolve_image_family(image_project.trim(), family.trim())
                .await?,
        ),
        BootDiskSource::PublicImage {
            image_project,
            image: ImageSelector::Name(name),
        } => BootSource::Image(resolve_image_url(name, image_project.trim())),
        BootDiskSource::CustomImage { image } => {
            BootSource::Image(resolve_image_url(image, &scope.project))
        },
        BootDiskSource::Snapshot { snapshot } => {
            BootSource::Snapshot(resolve_snapshot_url(snapshot, &scope.project))
        },
        BootDiskSource::ExistingDisk { disk } => {
            BootSource::ExistingDisk(resolve_disk_url(disk, &scope.project, &scope.zone))
        },
    };
    debug!("Boot source for {}: {:?}", config.instance_name, resolved);
    Ok(resolved)
}

/// Look up static addresses given by reserved-address name
pub async fn resolve_addresses(
    catalog: &Catalog,
    config: &ProvisioningConfig,
    scope: &Scope,
) -> Result<ResolvedAddresses> {
    let mut addresses = ResolvedAddresses::default();
    if let InternalIp::Static { address } = &config.networking.internal_ip {
        addresses.internal = Some(
            catalog
                .resolve_address(&scope.project, &scope.region, address)
                .await?,
        );
    }
    if let ExternalIp::Static { address } = &config.networking.external_ip {
        addresses.external = Some(
            catalog
                .resolve_address(&scope.project, &scope.region, address)
                .await?,
        );
    }
    Ok(addresses)
}

/// Map a configuration to request fragments with its references already resolved
pub fn compile_resolved(
    config: &ProvisioningConfig,
    scope: &Scope,
    boot_source: BootSource,
    addresses: &ResolvedAddresses,
    firewall_tags: &[String],
) -> CompiledInstance {
    let mut disks = vec![build_boot_disk(&config.boot_disk, boot_source, scope)];
    disks.extend(build_additional_disks(
        &config.additional_disks,
        &config.instance_name,
        scope,
    ));
    disks.extend(build_local_ssd_disks(
        config.local_ssd_count,
        &scope.project,
        &scope.zone,
    ));

    let accelerators = build_accelerators(&config.advanced.accelerators, scope);
    let scheduling = build_scheduling(config, !accelerators.is_empty());

    CompiledInstance {
        disks,
        network_interface: build_network_interface(&config.networking, scope, addresses),
        scheduling,
        resource_policies: build_resource_policies(config, scope),
        metadata: build_metadata(config),
        labels: build_labels(&config.advanced.labels),
        tags: build_tags(config.networking.tags.iter().chain(firewall_tags)),
        service_accounts: build_service_accounts(&config.identity),
        accelerators,
        shielded: build_shielded_config(&config.security),
        confidential: build_confidential_config(&config.security),
        display: config.advanced.enable_display.then_some(DisplayDevice {
            enable_display: true,
        }),
    }
}

pub async fn compile(
    catalog: &Catalog,
    config: &ProvisioningConfig,
    scope: &Scope,
    firewall_tags: &[String],
) -> Result<CompiledInstance> {
    let boot_source = resolve_boot_source(catalog, config, scope).await?;
    let addresses = resolve_addresses(catalog, config, scope).await?;
    Ok(compile_resolved(
        config,
        scope,
        boot_source,
        &addresses,
        firewall_tags,
    ))
}
