//! Service account and shielded/confidential VM settings

use super::model::{IdentityConfig, SecurityConfig};
use super::request::{ConfidentialInstanceConfig, ServiceAccount, ShieldedInstanceConfig};

pub const DEFAULT_SERVICE_ACCOUNT: &str = "default";
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Trimmed, non-blank scopes in input order
pub fn normalize_oauth_scopes(scopes: &[String]) -> Vec<String> {
    scopes
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// One service account when an email or any scope was configured
pub fn build_service_accounts(identity: &IdentityConfig) -> Vec<ServiceAccount> {
    let email = identity
        .service_account
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let scopes = normalize_oauth_scopes(&identity.scopes);

    if email.is_none() && scopes.is_empty() {
        return Vec::new();
    }
    vec![ServiceAccount {
        email: email.unwrap_or(DEFAULT_SERVICE_ACCOUNT).to_string(),
        scopes: if scopes.is_empty() {
            vec![CLOUD_PLATFORM_SCOPE.to_string()]
        } else {
            scopes
        },
    }]
}

pub fn build_shielded_config(security: &SecurityConfig) -> Option<ShieldedInstanceConfig> {
    security.shielded_vm.map(|s| ShieldedInstanceConfig {
        enable_secure_boot: s.secure_boot,
        enable_vtpm: s.vtpm,
        enable_integrity_monitoring: s.integrity_monitoring,
    })
}

pub fn build_confidential_config(security: &SecurityConfig) -> Option<ConfidentialInstanceConfig> {
    security
        .confidential_vm_type
        .map(|t| ConfidentialInstanceConfig {
            confidential_instance_type: t.as_str().to_string(),
        })
}
