//! Compute Engine VM provisioning engine
//!
//! Turns a declarative [`provision::ProvisioningConfig`] into a running
//! Compute Engine instance, waits for the zone operation to finish and
//! returns a flattened [`provision::ProvisioningResult`]. The same crate
//! serves the cached resource catalog used to populate those configurations.
//!
//! # Module Structure
//!
//! - [`gcp`] - Catalog client boundary, authentication and HTTP transport
//! - [`resource`] - Read-through TTL cache, pagination walker and catalog listers
//! - [`provision`] - Configuration compiler, firewall ensurer, poller and engine
//! - [`pricing`] - Monthly cost estimates for machine types
//! - [`clock`] / [`cancel`] - Time and cancellation seams used by the poller and cache
//! - [`config`] - Persistent CLI settings

pub mod cancel;
pub mod clock;
pub mod config;
pub mod error;
pub mod gcp;
pub mod pricing;
pub mod provision;
pub mod resource;

#[cfg(test)]
mod testing;

pub use error::{ProvisionError, Result};
