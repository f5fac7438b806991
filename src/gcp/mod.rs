//! GCP API interaction module
//!
//! The provisioning engine only talks to the provider through the
//! [`client::CatalogClient`] trait. [`client::GcpClient`] is the production
//! implementation: it adds the Compute Engine base URL, bearer tokens and
//! error translation on top of plain `GET`/`POST` calls.
//!
//! # Module Structure
//!
//! - [`auth`] - GCP authentication using Application Default Credentials
//! - [`client`] - Catalog client trait and the Compute Engine client
//! - [`http`] - HTTP utilities for REST API calls
//!
//! # Example
//!
//! ```ignore
//! use gce_provisioner::gcp::client::{CatalogClient, GcpClient};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = GcpClient::new("my-project").await?;
//!     let regions = client.get("projects/my-project/regions").await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;

pub use client::{CatalogClient, GcpClient};
