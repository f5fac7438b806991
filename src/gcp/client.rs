//! GCP Client
//!
//! [`CatalogClient`] is the only capability the engine needs from the
//! provider: relative-path `GET`/`POST`, absolute-URL `GET`, and the default
//! project. [`GcpClient`] implements it against the Compute Engine v1 API.

use super::auth::GcpCredentials;
use super::http::GcpHttpClient;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use url::Url;

/// Compute Engine v1 REST root
pub const COMPUTE_BASE_URL: &str = "https://compute.googleapis.com/compute/v1/";

/// Provider access used by the catalog and the provisioning engine.
///
/// Paths are relative resource paths such as
/// `projects/<p>/zones/<z>/instances`. Non-2xx responses must surface as
/// errors whose text contains the status code and provider message.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn get(&self, path: &str) -> Result<Value>;

    async fn get_url(&self, url: &str) -> Result<Value>;

    async fn post(&self, path: &str, body: &Value) -> Result<Value>;

    /// Project used when a configuration does not name one
    fn project_id(&self) -> &str;
}

#[derive(Clone)]
enum TokenSource {
    Adc(GcpCredentials),
    Static(String),
}

impl TokenSource {
    async fn token(&self) -> Result<String> {
        match self {
            TokenSource::Adc(credentials) => credentials.get_token().await,
            TokenSource::Static(token) => Ok(token.clone()),
        }
    }
}

/// Fall back to the credentials' own project when none was configured
async fn project_or_credentials(project_id: &str, credentials: &GcpCredentials) -> String {
    if !project_id.is_empty() {
        return project_id.to_string();
    }
    credentials.project_id().await.unwrap_or_default()
}

/// Compute Engine client
#[derive(Clone)]
pub struct GcpClient {
    tokens: TokenSource,
    http: GcpHttpClient,
    base_url: Url,
    project_id: String,
}

impl GcpClient {
    /// Create a client using Application Default Credentials
    pub async fn new(project_id: &str) -> Result<Self> {
        let credentials = GcpCredentials::new()
            .await
            .context("Failed to initialize GCP credentials")?;

        let project_id = project_or_credentials(project_id, &credentials).await;
        Self::build(TokenSource::Adc(credentials), &project_id, COMPUTE_BASE_URL)
    }

    /// Create a client with ADC against a non-default API root
    pub async fn with_base_url(project_id: &str, base_url: &str) -> Result<Self> {
        let credentials = GcpCredentials::new()
            .await
            .context("Failed to initialize GCP credentials")?;

        let project_id = project_or_credentials(project_id, &credentials).await;
        Self::build(TokenSource::Adc(credentials), &project_id, base_url)
    }

    /// Create a client that always sends the given bearer token
    pub fn with_static_token(project_id: &str, base_url: &str, token: &str) -> Result<Self> {
        Self::build(TokenSource::Static(token.to_string()), project_id, base_url)
    }

    fn build(tokens: TokenSource, project_id: &str, base_url: &str) -> Result<Self> {
        // Url::join drops the last segment unless the base ends with '/'
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized)
            .with_context(|| format!("Invalid API base URL: {}", base_url))?;

        Ok(Self {
            tokens,
            http: GcpHttpClient::new()?,
            base_url,
            project_id: project_id.to_string(),
        })
    }

    /// Build an absolute Compute Engine URL from a relative resource path
    pub fn compute_url(&self, path: &str) -> Result<String> {
        let url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .with_context(|| format!("Invalid resource path: {}", path))?;
        Ok(url.to_string())
    }
}

#[async_trait]
impl CatalogClient for GcpClient {
    async fn get(&self, path: &str) -> Result<Value> {
        let url = self.compute_url(path)?;
        self.get_url(&url).await
    }

    async fn get_url(&self, url: &str) -> Result<Value> {
        let token = self.tokens.token().await?;
        self.http.get(url, &token).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let url = self.compute_url(path)?;
        let token = self.tokens.token().await?;
        self.http.post(&url, &token, body).await
    }

    fn project_id(&self) -> &str {
        &self.project_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_url_joins_relative_paths() {
        let client =
            GcpClient::with_static_token("my-project", "https://example.test/compute/v1", "t")
                .unwrap();

        assert_eq!(
            client
                .compute_url("projects/my-project/zones/us-central1-a/instances?pageToken=abc")
                .unwrap(),
            "https://example.test/compute/v1/projects/my-project/zones/us-central1-a/instances?pageToken=abc"
        );
        assert_eq!(
            client.compute_url("/projects/p/regions").unwrap(),
            "https://example.test/compute/v1/projects/p/regions"
        );
        assert_eq!(client.project_id(), "my-project");
    }
}
