use thiserror::Error;

/// Main error type covering every failure mode in the workflow pipeline
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Schema validation failed: {0}")]
    SchemaValidation(String),

    #[error("Batch {batch_type} returned {got} results for {expected} inputs")]
    BatchLengthMismatch {
        batch_type: String,
        expected: usize,
        got: usize,
    },

    #[error("Input validation failed: {0}")]
    Validation(String),

    #[error("Operation timed out after {timeout_ms}ms: {context}")]
    Timeout { timeout_ms: u64, context: String },

    #[error("Operation cancelled: {context}")]
    Cancelled { context: String },

    #[error("All providers failed: {0}")]
    AllProvidersFailed(String),

    #[error("Parsing error: {0}")]
    Parsing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

/// Result type alias for the entire application
pub type Result<T> = std::result::Result<T, WorkflowError>;

impl WorkflowError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a provider-unavailable error
    pub fn provider_unavailable(message: impl Into<String>) -> Self {
        Self::ProviderUnavailable(message.into())
    }

    /// Create a schema validation error
    pub fn schema_validation(message: impl Into<String>) -> Self {
        Self::SchemaValidation(message.into())
    }

    /// Create an input validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an operation timeout error
    pub fn operation_timeout(timeout_ms: u64, context: impl Into<String>) -> Self {
        Self::Timeout {
            timeout_ms,
            context: context.into(),
        }
    }

    /// Create an operation cancelled error
    pub fn operation_cancelled(context: impl Into<String>) -> Self {
        Self::Cancelled {
            context: context.into(),
        }
    }

    /// Create a batch length mismatch error
    pub fn batch_length_mismatch(batch_type: impl Into<String>, expected: usize, got: usize) -> Self {
        Self::BatchLengthMismatch {
            batch_type: batch_type.into(),
            expected,
            got,
        }
    }

    /// Whether a retry wrapper may re-attempt the failed operation.
    ///
    /// Validation, schema-mismatch, and configuration errors propagate
    /// immediately; only transient provider failures and per-call timeouts
    /// are worth a second attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable(_) | Self::Timeout { .. } | Self::Http(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(WorkflowError::provider_unavailable("daemon down").is_retryable());
        assert!(WorkflowError::operation_timeout(30_000, "critic call").is_retryable());
        assert!(!WorkflowError::schema_validation("missing field").is_retryable());
        assert!(!WorkflowError::validation("empty idea").is_retryable());
        assert!(!WorkflowError::config("bad preset").is_retryable());
        assert!(!WorkflowError::operation_cancelled("user abort").is_retryable());
    }

    #[test]
    fn test_batch_length_mismatch_message() {
        let err = WorkflowError::batch_length_mismatch("advocate", 3, 2);
        let msg = err.to_string();
        assert!(msg.contains("advocate"));
        assert!(msg.contains('3'));
        assert!(msg.contains('2'));
    }
}
