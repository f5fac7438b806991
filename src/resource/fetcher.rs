//! Pagination walker
//!
//! Follows `nextPageToken` until the provider stops returning one and
//! concatenates every page's `items` into one list.

use crate::error::{ProvisionError, Result};
use crate::gcp::CatalogClient;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// One page of a Compute Engine list response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Append the page token to a resource path
pub fn page_path(path: &str, page_token: Option<&str>) -> String {
    match page_token {
        None => path.to_string(),
        Some(token) => {
            let separator = if path.contains('?') { '&' } else { '?' };
            format!(
                "{}{}pageToken={}",
                path,
                separator,
                urlencoding::encode(token)
            )
        },
    }
}

/// Fetch all pages under `path` (auto-paginate)
pub async fn fetch_all<T>(client: &dyn CatalogClient, path: &str) -> Result<Vec<T>>
where
    T: DeserializeOwned,
{
    let mut all_items = Vec::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let request_path = page_path(path, page_token.as_deref());
        let response = client
            .get(&request_path)
            .await
            .map_err(|e| ProvisionError::provider(format!("list {}", path), e))?;

        let page = decode_page::<T>(response, path)?;
        pages += 1;
        all_items.extend(page.items);

        match page.next_page_token {
            Some(token) if !token.is_empty() => {
                if page_token.as_deref() == Some(token.as_str()) {
                    tracing::warn!("Provider repeated page token for {}, stopping", path);
                    break;
                }
                page_token = Some(token);
            },
            _ => break,
        }
    }

    tracing::debug!("Fetched {} items from {} in {} pages", all_items.len(), path, pages);
    Ok(all_items)
}

fn decode_page<T: DeserializeOwned>(response: Value, path: &str) -> Result<Page<T>> {
    // Empty collections come back as `{}` or no body at all
    if response.is_null() {
        return Ok(Page {
            items: Vec::new(),
            next_page_token: None,
        });
    }
    serde_json::from_value(response).map_err(|e| ProvisionError::decode(format!("page of {}", path), e))
}
