//! Error types and result handling for the NetHeal pipeline

use thiserror::Error;

/// Result type alias for NetHeal operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for NetHeal pipeline operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Correlation error: {0}")]
    Correlation(String),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("Remediation error: {0}")]
    Remediation(String),

    #[error("Safety check failed: {0}")]
    SafetyCheck(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl Error {
    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::Timeout(_) | Error::Store(_) | Error::Execution(_)
        )
    }

    /// Get error category for metrics
    pub fn category(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "configuration",
            Error::Network(_) => "network",
            Error::Parse(_) => "parse",
            Error::Store(_) => "store",
            Error::Correlation(_) => "correlation",
            Error::Analysis(_) => "analysis",
            Error::Remediation(_) => "remediation",
            Error::SafetyCheck(_) => "safety",
            Error::Execution(_) => "execution",
            Error::Timeout(_) => "timeout",
            Error::NotFound(_) => "not_found",
            Error::InvalidInput(_) => "input",
            Error::Serialization(_) => "serialization",
            Error::Internal(_) => "internal",
            Error::Generic(_) => "generic",
        }
    }
}
