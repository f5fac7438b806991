//! Instance insert and zone operation polling

use super::model::Scope;
use super::request::InstanceRequest;
use crate::cancel::CancelSignal;
use crate::clock::{to_chrono, Clock, SystemClock};
use crate::error::{ProvisionError, Result};
use crate::gcp::client::CatalogClient;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OperationErrorItem {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OperationErrors {
    pub errors: Vec<OperationErrorItem>,
}

/// A zone operation as returned by insert and `operations.get`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Operation {
    pub name: String,
    pub status: String,
    pub target_link: String,
    pub self_link: String,
    pub zone: String,
    pub error: Option<OperationErrors>,
}

impl Operation {
    /// `Ok(true)` once the operation finished successfully, `Ok(false)` while
    /// it is still pending
    pub fn check(&self) -> Result<bool> {
        match self.status.as_str() {
            "DONE" => match self.error.as_ref().and_then(|e| e.errors.first()) {
                Some(first) => {
                    let message = if first.message.is_empty() {
                        first.code.clone()
                    } else {
                        first.message.clone()
                    };
                    Err(ProvisionError::OperationFailed(message))
                },
                None => Ok(true),
            },
            "PENDING" | "RUNNING" => Ok(false),
            other => Err(ProvisionError::UnexpectedOperationStatus {
                operation: self.name.clone(),
                status: other.to_string(),
            }),
        }
    }
}

fn parse_operation(value: serde_json::Value) -> Result<Operation> {
    serde_json::from_value(value).map_err(|e| ProvisionError::decode("operation", e))
}

/// Submit the instance insert. A fresh `requestId` lets the provider
/// deduplicate a retried submission.
pub async fn insert_instance(
    client: &dyn CatalogClient,
    scope: &Scope,
    request: &InstanceRequest,
) -> Result<Operation> {
    let path = format!(
        "projects/{}/zones/{}/instances?requestId={}",
        scope.project,
        scope.zone,
        uuid::Uuid::new_v4()
    );
    let body =
        serde_json::to_value(request).map_err(|e| ProvisionError::decode("instance request", e))?;

    info!("Inserting instance {} in {}", request.name, scope.zone);
    let response = client
        .post(&path, &body)
        .await
        .map_err(|e| ProvisionError::provider(format!("insert instance {}", request.name), e))?;

    let operation = parse_operation(response)?;
    if operation.name.is_empty() {
        return Err(ProvisionError::provider(
            format!("insert instance {}", request.name),
            anyhow::anyhow!("response carries no operation name"),
        ));
    }
    Ok(operation)
}

/// Polls a zone operation on a fixed interval until it is done, the deadline
/// passes, or the caller cancels.
pub struct OperationPoller {
    clock: Arc<dyn Clock>,
    interval: Duration,
    timeout: Duration,
}

impl Default for OperationPoller {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl OperationPoller {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn wait(
        &self,
        client: &dyn CatalogClient,
        scope: &Scope,
        operation: &str,
        cancel: &CancelSignal,
    ) -> Result<Operation> {
        let path = format!(
            "projects/{}/zones/{}/operations/{}",
            scope.project, scope.zone, operation
        );
        let deadline = self.clock.now() + to_chrono(self.timeout);
        let mut polls = 0u32;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(ProvisionError::Cancelled(operation.to_string()));
                }
                _ = self.clock.sleep(self.interval) => {}
            }

            if self.clock.now() > deadline {
                return Err(ProvisionError::OperationTimeout(operation.to_string()));
            }

            polls += 1;
            let response = client
                .get(&path)
                .await
                .map_err(|e| ProvisionError::provider(format!("poll operation {}", operation), e))?;
            let current = parse_operation(response)?;
            debug!("Operation {} poll {}: {}", operation, polls, current.status);

            if current.check()? {
                info!("Operation {} done after {} polls", operation, polls);
                return Ok(current);
            }
        }
    }
}
