//! Resource catalog layer
//!
//! Read-only access to the Compute Engine resources a provisioning
//! configuration refers to.
//!
//! # Architecture
//!
//! - [`cache`] - Generic read-through TTL cache with lazy eviction
//! - [`fetcher`] - Pagination walker over `{items, nextPageToken}` responses
//! - [`types`] - Typed catalog entries (regions, machine types, images, ...)
//! - [`catalog`] - One cached lister per resource kind, plus reference resolution
//!
//! # Example
//!
//! ```ignore
//! use gce_provisioner::resource::Catalog;
//!
//! async fn list_vm_shapes(catalog: &Catalog) -> gce_provisioner::Result<()> {
//!     for machine in catalog.list_machine_types("my-project", "us-central1-a").await? {
//!         println!("{} {:?}", machine.name, machine.estimated_monthly_cost);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod catalog;
pub mod fetcher;
pub mod types;

pub use cache::{cache_key, ResourceCache, DEFAULT_TTL};
pub use catalog::{is_public_image_project, Catalog, PUBLIC_IMAGE_PROJECTS};
pub use fetcher::fetch_all;
pub use types::*;
