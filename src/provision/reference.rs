//! Resource references
//!
//! User configuration names provider resources either by short name
//! (`debian-12`, `my-subnet`) or by an already qualified path
//! (`projects/p/global/images/debian-12`, or a full self link). A
//! [`ResourceRef`] records which one it is, and the `resolve_*_url` helpers
//! qualify short names against a project and location.

/// A resource named by short name, or by a path that is used as-is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceRef {
    Unresolved(String),
    Resolved(String),
}

impl ResourceRef {
    /// Values containing a path separator are treated as already qualified
    /// and kept verbatim. Only short names are trimmed.
    pub fn parse(value: &str) -> Self {
        if value.contains('/') {
            Self::Resolved(value.to_string())
        } else {
            Self::Unresolved(value.trim().to_string())
        }
    }

    /// Qualify a short name with `qualify`; resolved paths pass through
    pub fn resolve_with(self, qualify: impl FnOnce(&str) -> String) -> String {
        match self {
            Self::Unresolved(name) => qualify(&name),
            Self::Resolved(path) => path,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Unresolved(s) | Self::Resolved(s) => s,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

/// Region a zone belongs to: `us-central1-a` -> `us-central1`
pub fn region_from_zone(zone: &str) -> String {
    match zone.rsplit_once('-') {
        Some((region, _)) if !region.is_empty() => region.to_string(),
        _ => zone.to_string(),
    }
}

pub fn resolve_image_url(image: &str, project: &str) -> String {
    ResourceRef::parse(image)
        .resolve_with(|name| format!("projects/{}/global/images/{}", project, name))
}

pub fn image_family_path(family: &str, project: &str) -> String {
    ResourceRef::parse(family)
        .resolve_with(|name| format!("projects/{}/global/images/family/{}", project, name))
}

pub fn resolve_snapshot_url(snapshot: &str, project: &str) -> String {
    ResourceRef::parse(snapshot)
        .resolve_with(|name| format!("projects/{}/global/snapshots/{}", project, name))
}

pub fn resolve_disk_url(disk: &str, project: &str, zone: &str) -> String {
    ResourceRef::parse(disk)
        .resolve_with(|name| format!("projects/{}/zones/{}/disks/{}", project, zone, name))
}

/// Qualify a disk type. Without a project or zone the input is returned unchanged.
pub fn resolve_disk_type_url(disk_type: &str, project: &str, zone: &str) -> String {
    if project.is_empty() || zone.is_empty() {
        return disk_type.to_string();
    }
    ResourceRef::parse(disk_type)
        .resolve_with(|name| format!("projects/{}/zones/{}/diskTypes/{}", project, zone, name))
}

pub fn resolve_network_url(network: &str, project: &str) -> String {
    ResourceRef::parse(network)
        .resolve_with(|name| format!("projects/{}/global/networks/{}", project, name))
}

pub fn resolve_subnetwork_url(subnetwork: &str, project: &str, region: &str) -> String {
    ResourceRef::parse(subnetwork).resolve_with(|name| {
        format!("projects/{}/regions/{}/subnetworks/{}", project, region, name)
    })
}

pub fn resolve_resource_policy_url(policy: &str, project: &str, region: &str) -> String {
    ResourceRef::parse(policy).resolve_with(|name| {
        format!("projects/{}/regions/{}/resourcePolicies/{}", project, region, name)
    })
}

pub fn resolve_machine_type_url(machine_type: &str, zone: &str) -> String {
    ResourceRef::parse(machine_type)
        .resolve_with(|name| format!("zones/{}/machineTypes/{}", zone, name))
}

pub fn resolve_accelerator_type_url(accelerator: &str, project: &str, zone: &str) -> String {
    ResourceRef::parse(accelerator).resolve_with(|name| {
        format!("projects/{}/zones/{}/acceleratorTypes/{}", project, zone, name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_classifies_by_separator() {
        assert_eq!(
            ResourceRef::parse(" debian-12 "),
            ResourceRef::Unresolved("debian-12".to_string())
        );
        let full = ResourceRef::parse("projects/p/global/images/debian-12");
        assert!(full.is_resolved());
        assert_eq!(full.as_str(), "projects/p/global/images/debian-12");
    }

    #[test]
    fn test_qualified_paths_are_kept_verbatim() {
        let padded = " projects/p/global/images/x ";
        assert_eq!(resolve_image_url(padded, "q"), padded);
        assert_eq!(ResourceRef::parse(padded).as_str(), padded);
    }

    #[test]
    fn test_region_from_zone() {
        assert_eq!(region_from_zone("us-central1-a"), "us-central1");
        assert_eq!(region_from_zone("europe-west4-b"), "europe-west4");
        assert_eq!(region_from_zone("nodash"), "nodash");
    }

    #[test]
    fn test_short_names_are_qualified() {
        assert_eq!(
            resolve_image_url("my-image", "p1"),
            "projects/p1/global/images/my-image"
        );
        assert_eq!(
            resolve_snapshot_url("snap-1", "p1"),
            "projects/p1/global/snapshots/snap-1"
        );
        assert_eq!(
            resolve_disk_url("data", "p1", "us-central1-a"),
            "projects/p1/zones/us-central1-a/disks/data"
        );
        assert_eq!(
            resolve_disk_type_url("pd-ssd", "p1", "us-central1-a"),
            "projects/p1/zones/us-central1-a/diskTypes/pd-ssd"
        );
        assert_eq!(
            resolve_network_url("default", "p1"),
            "projects/p1/global/networks/default"
        );
        assert_eq!(
            resolve_subnetwork_url("sub-a", "p1", "us-central1"),
            "projects/p1/regions/us-central1/subnetworks/sub-a"
        );
        assert_eq!(
            resolve_machine_type_url("e2-medium", "us-central1-a"),
            "zones/us-central1-a/machineTypes/e2-medium"
        );
        assert_eq!(
            image_family_path("debian-12", "debian-cloud"),
            "projects/debian-cloud/global/images/family/debian-12"
        );
    }

    #[test]
    fn test_disk_type_without_scope_is_unchanged() {
        assert_eq!(resolve_disk_type_url("pd-ssd", "", "us-central1-a"), "pd-ssd");
        assert_eq!(resolve_disk_type_url("pd-ssd", "p1", ""), "pd-ssd");
    }
}
