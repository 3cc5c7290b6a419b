//! Error types for the routing core.
//!
//! None of these escape `Router::route_query`; they exist so each component can report
//! what went wrong before recovering locally.

/// Failure reported by a mini-app adapter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdapterError {
    #[error("capability not supported: {0}")]
    Unsupported(&'static str),

    #[error("adapter failed: {0}")]
    Failed(String),

    #[error("adapter timed out")]
    Timeout,
}

impl AdapterError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// Failure reported by the semantic similarity service.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SimilarityError {
    #[error("similarity service unavailable")]
    Unavailable,

    #[error("similarity request failed: {0}")]
    Request(String),

    #[error("invalid similarity response: {0}")]
    InvalidResponse(String),

    #[error("similarity request timed out")]
    Timeout,
}

pub type SimilarityResult<T> = Result<T, SimilarityError>;

/// Configuration loading / validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Source(#[from] config::ConfigError),

    #[error("failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
