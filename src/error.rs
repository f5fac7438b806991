//! Engine error types

use thiserror::Error;

/// Structured provisioning failures.
///
/// Validation and resolution errors are raised before the instance insert is
/// submitted. `InstanceFetch` is only produced after the zone operation
/// finished successfully, so callers can tell "created but unverifiable"
/// apart from "never created".
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("invalid configuration: {0}")]
    Validation(String),

    #[error("cannot resolve {kind} '{reference}': {reason}")]
    Resolution {
        kind: &'static str,
        reference: String,
        reason: String,
    },

    #[error("{context}: {source}")]
    Provider {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("operation failed: {0}")]
    OperationFailed(String),

    #[error("timeout waiting for operation {0}")]
    OperationTimeout(String),

    #[error("unexpected status '{status}' for operation {operation}")]
    UnexpectedOperationStatus { operation: String, status: String },

    #[error("cancelled while waiting for operation {0}")]
    Cancelled(String),

    #[error("instance {name} was created but could not be read back: {source}")]
    InstanceFetch {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to decode {what}: {source}")]
    Decode {
        what: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ProvisionError>;

impl ProvisionError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn provider(context: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Provider {
            context: context.into(),
            source,
        }
    }

    pub fn decode(what: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            what: what.into(),
            source,
        }
    }

    /// True for failures reported before anything was sent to the provider
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
