//! Error taxonomy shared by the store, the tool executor, and the stream loop.
//!
//! Tool-level failures ([`GatewayError::Validation`], [`GatewayError::Upstream`],
//! [`GatewayError::UnknownTool`], [`GatewayError::Storage`]) are reported back to the
//! model as `tool_result.error` strings. Only [`GatewayError::Backend`] and
//! [`GatewayError::Internal`] terminate a stream.

use thiserror::Error;

/// Result alias used throughout the library.
pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed caller or model input (missing field, bad enum value).
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing credential or misconfigured backend. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Backing store unreachable or the write failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// A remote tool endpoint was unreachable or answered with a non-200 status.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// The model named a tool that is not in the registry.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// The model stream failed mid-flight.
    #[error("backend error: {0}")]
    Backend(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether this error may be surfaced to the model as a tool result
    /// instead of ending the stream.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Storage(_) | Self::Upstream(_) | Self::UnknownTool(_)
        )
    }
}

impl From<rusqlite::Error> for GatewayError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        Self::Upstream(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("serialization failed: {err}"))
    }
}

impl From<tokio::task::JoinError> for GatewayError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking task failed: {err}"))
    }
}
