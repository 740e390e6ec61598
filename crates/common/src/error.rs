use thiserror::Error;

/// Common error types used across the aggregator.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Registration error: {0}")]
    Registration(String),

    #[error("Provider '{provider}' failed to initialize: {reason}")]
    Initialization { provider: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Aggregation service has been stopped")]
    Stopped,
}

impl AppError {
    /// True for errors caused by the caller's input rather than by a provider.
    pub fn is_registration(&self) -> bool {
        matches!(self, AppError::Registration(_))
    }
}
