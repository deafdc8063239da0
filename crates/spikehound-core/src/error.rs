//! Error types for Spikehound Core
//!
//! Most failures in this crate are data, not errors: a failed procedure is
//! an `Error` result, a failed action is an `Error` outcome, a failed queue
//! attempt is a [`QueueOutcome`](spikehound_model::QueueOutcome). The types
//! here cover what collaborators report and the few conditions that do
//! surface to a caller:
//! - Caller cancellation
//! - Invalid configuration
//! - Unauthenticated or unparseable interactions

use spikehound_security::SignatureError;

/// Top-level error surfaced by the pipeline, intake and workflow
#[derive(Debug, thiserror::Error)]
pub enum SpikehoundError {
    /// The caller's cancellation token fired
    #[error("operation cancelled")]
    Cancelled,

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Interaction ingestion failed
    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// Background investigation could not be scheduled
    #[error("schedule error: {0}")]
    Schedule(#[from] ScheduleError),
}

impl SpikehoundError {
    /// Check for caller cancellation
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Failure reported by a pluggable procedure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcedureError {
    /// The procedure could not produce a result
    #[error("{0}")]
    Failed(String),

    /// The procedure observed cancellation and stopped
    #[error("cancelled")]
    Cancelled,
}

impl ProcedureError {
    /// Create failure error
    #[inline]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Failure reported by an action executor
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    /// The action failed
    #[error("{0}")]
    Failed(String),

    /// Executor observed cancellation; aborts the batch when the caller cancelled
    #[error("cancelled")]
    Cancelled,
}

impl ExecutorError {
    /// Create failure error
    #[inline]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Failure handing a request to a scheduler
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    /// Scheduler refused or failed the handoff
    #[error("handoff failed: {0}")]
    Handoff(String),

    /// Scheduler is shutting down
    #[error("scheduler unavailable")]
    Unavailable,
}

/// Notification delivery failure; logged and never surfaced
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// HTTP transport failure
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Webhook URL could not be parsed
    #[error("invalid webhook url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Sink-specific failure
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Configuration loading failure
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

/// Inbound interaction could not be turned into a decision
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    /// Signature check failed
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] SignatureError),

    /// Body is not in the expected shape
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// Action id is not one of the known decisions
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// Interaction type this service does not handle
    #[error("unsupported interaction type: {0}")]
    UnsupportedType(i64),
}

impl IngestError {
    /// Whether the caller should answer 401 rather than 400
    #[inline]
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}
