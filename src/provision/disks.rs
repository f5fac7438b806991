//! Boot, additional and local SSD disks

use super::model::{AdditionalDisk, BootDiskConfig, Scope};
use super::reference::{
    resolve_disk_type_url, resolve_disk_url, resolve_resource_policy_url,
};
use super::request::{
    AttachedDisk, DiskInterface, DiskKind, DiskMode, EncryptionKey, InitializeParams,
};
use crate::resource::types::short_name;
use tracing::warn;

pub const DEFAULT_DISK_TYPE: &str = "pd-balanced";
pub const DEFAULT_DISK_SIZE_GB: i64 = 10;
pub const LOCAL_SSD_TYPE: &str = "local-ssd";
pub const MAX_LOCAL_SSDS: i64 = 8;

const BOOT_DISK_TYPES: &[&str] = &["pd-balanced", "pd-ssd", "pd-standard"];

/// Boot disk source after short names and image families were resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootSource {
    Image(String),
    Snapshot(String),
    ExistingDisk(String),
}

pub fn is_allowed_boot_disk_type(disk_type: &str) -> bool {
    BOOT_DISK_TYPES.contains(&disk_type)
}

fn disk_size(size_gb: Option<i64>) -> i64 {
    match size_gb {
        Some(size) if size >= 1 => size,
        _ => DEFAULT_DISK_SIZE_GB,
    }
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn encryption_key(kms_key: &Option<String>) -> Option<EncryptionKey> {
    trimmed(kms_key).map(|kms_key_name| EncryptionKey { kms_key_name })
}

/// Boot disk type, falling back to `pd-balanced` for anything not bootable
pub fn boot_disk_type(disk_type: Option<&str>) -> &str {
    let Some(requested) = disk_type.map(str::trim).filter(|t| !t.is_empty()) else {
        return DEFAULT_DISK_TYPE;
    };
    let name = short_name(requested);
    if is_allowed_boot_disk_type(name) {
        name
    } else {
        warn!(
            "Boot disk type '{}' is not supported, using {}",
            requested, DEFAULT_DISK_TYPE
        );
        DEFAULT_DISK_TYPE
    }
}

pub fn build_boot_disk(config: &BootDiskConfig, source: BootSource, scope: &Scope) -> AttachedDisk {
    let mut disk = AttachedDisk::persistent(true, config.auto_delete);
    disk.device_name = trimmed(&config.device_name);
    disk.disk_encryption_key = encryption_key(&config.kms_key);

    let (source_image, source_snapshot) = match source {
        BootSource::ExistingDisk(path) => {
            disk.source = Some(path);
            disk.mode = Some(DiskMode::ReadWrite);
            return disk;
        },
        BootSource::Image(image) => (Some(image), None),
        BootSource::Snapshot(snapshot) => (None, Some(snapshot)),
    };

    let disk_type = boot_disk_type(config.disk_type.as_deref());
    let resource_policies = trimmed(&config.snapshot_schedule)
        .map(|p| vec![resolve_resource_policy_url(&p, &scope.project, &scope.region)])
        .unwrap_or_default();

    disk.initialize_params = Some(InitializeParams {
        disk_name: None,
        source_image,
        source_snapshot,
        disk_size_gb: Some(disk_size(config.size_gb)),
        disk_type: Some(resolve_disk_type_url(disk_type, &scope.project, &scope.zone)),
        resource_policies,
    });
    disk
}

/// Additional disks in configuration order. New disks without a name are
/// called `<instance>-disk-<n>`, counting from 1.
pub fn build_additional_disks(
    disks: &[AdditionalDisk],
    instance_name: &str,
    scope: &Scope,
) -> Vec<AttachedDisk> {
    disks
        .iter()
        .enumerate()
        .map(|(index, disk)| match disk {
            AdditionalDisk::Existing {
                disk,
                read_only,
                auto_delete,
                device_name,
            } => {
                let mut attached = AttachedDisk::persistent(false, *auto_delete);
                attached.source = Some(resolve_disk_url(disk, &scope.project, &scope.zone));
                attached.mode = Some(if *read_only {
                    DiskMode::ReadOnly
                } else {
                    DiskMode::ReadWrite
                });
                attached.device_name = trimmed(device_name);
                attached
            },
            AdditionalDisk::New {
                name,
                size_gb,
                disk_type,
                auto_delete,
                kms_key,
            } => {
                let disk_type = trimmed(disk_type).unwrap_or_else(|| DEFAULT_DISK_TYPE.to_string());
                if short_name(&disk_type) == LOCAL_SSD_TYPE {
                    return local_ssd(scope, None);
                }
                let name = trimmed(name)
                    .unwrap_or_else(|| format!("{}-disk-{}", instance_name, index + 1));

                let mut attached = AttachedDisk::persistent(false, *auto_delete);
                attached.disk_encryption_key = encryption_key(kms_key);
                attached.initialize_params = Some(InitializeParams {
                    disk_name: Some(name),
                    disk_size_gb: Some(disk_size(*size_gb)),
                    disk_type: Some(resolve_disk_type_url(
                        &disk_type,
                        &scope.project,
                        &scope.zone,
                    )),
                    ..Default::default()
                });
                attached
            },
        })
        .collect()
}

fn local_ssd(scope: &Scope, device_name: Option<String>) -> AttachedDisk {
    AttachedDisk {
        boot: false,
        auto_delete: true,
        kind: DiskKind::Scratch,
        mode: None,
        interface: Some(DiskInterface::Nvme),
        source: None,
        device_name,
        initialize_params: Some(InitializeParams {
            disk_type: Some(resolve_disk_type_url(
                LOCAL_SSD_TYPE,
                &scope.project,
                &scope.zone,
            )),
            ..Default::default()
        }),
        disk_encryption_key: None,
    }
}

/// `count` scratch NVMe disks named `local-ssd-<i>`, at most eight
pub fn build_local_ssd_disks(count: i64, project: &str, zone: &str) -> Vec<AttachedDisk> {
    if count > MAX_LOCAL_SSDS {
        warn!("Requested {} local SSDs, capping at {}", count, MAX_LOCAL_SSDS);
    }
    let scope = Scope::new(project, "", zone);
    (0..count.clamp(0, MAX_LOCAL_SSDS))
        .map(|i| local_ssd(&scope, Some(format!("local-ssd-{}", i))))
        .collect()
}
