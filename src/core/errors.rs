use thiserror::Error;

/// Unified error type for the tandem toolkit
#[derive(Debug, Error)]
pub enum TandemError {
    /// A bounded put waited for a free slot until its timeout elapsed
    #[error("Channel full: capacity {capacity} reached (waited {waited_ms}ms)")]
    Full { capacity: usize, waited_ms: u64 },

    /// A bounded get waited for an item until its timeout elapsed, or the
    /// channel was already closed and drained
    #[error("Channel empty (waited {waited_ms}ms)")]
    Empty { waited_ms: u64 },

    /// Put attempted after the channel was closed for producers
    #[error("Channel closed for producers")]
    Closed,

    /// A work unit reported a failure; recorded in the outcome map, never
    /// propagated to sibling units
    #[error("Work unit failed: {unit_id} - {reason}")]
    WorkUnit { unit_id: String, reason: String },

    /// A bounded wait outside the channel expired
    #[error("Operation timed out: {operation} (timeout: {timeout_ms}ms)")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Acquisition request named a resource index outside the set
    #[error("Resource index out of range: {index} (set holds {count})")]
    UnknownResource { index: usize, count: usize },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },

    /// Validation errors
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// Generic internal errors (join failures and the like)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl TandemError {
    /// Create a full-channel error
    pub fn full(capacity: usize, waited_ms: u64) -> Self {
        Self::Full {
            capacity,
            waited_ms,
        }
    }

    /// Create an empty-channel error
    pub fn empty(waited_ms: u64) -> Self {
        Self::Empty { waited_ms }
    }

    /// Create a work-unit failure
    pub fn work_unit<S: Into<String>, M: Into<String>>(unit_id: S, reason: M) -> Self {
        Self::WorkUnit {
            unit_id: unit_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(operation: S, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create an unknown-resource error
    pub fn unknown_resource(index: usize, count: usize) -> Self {
        Self::UnknownResource { index, count }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
            field: None,
        }
    }

    /// Create a configuration error naming the offending field
    pub fn configuration_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Configuration {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this error indicates a transient condition the caller may
    /// retry; repeated occurrences usually mean a capacity or timeout is
    /// configured too small
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Full { .. } | Self::Empty { .. })
    }

    /// Check if error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Full { .. } | Self::Empty { .. } | Self::Timeout { .. } => true,
            Self::WorkUnit { .. } => true, // isolated to one unit
            Self::Closed
            | Self::UnknownResource { .. }
            | Self::Configuration { .. }
            | Self::Validation { .. }
            | Self::Internal { .. } => false,
        }
    }

    /// Get error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Full { .. } => "full",
            Self::Empty { .. } => "empty",
            Self::Closed => "closed",
            Self::WorkUnit { .. } => "work_unit",
            Self::Timeout { .. } => "timeout",
            Self::UnknownResource { .. } => "unknown_resource",
            Self::Configuration { .. } => "configuration",
            Self::Validation { .. } => "validation",
            Self::Internal { .. } => "internal",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, TandemError>;

impl From<tokio::task::JoinError> for TandemError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::internal(format!("execution context join failed: {err}"))
    }
}
