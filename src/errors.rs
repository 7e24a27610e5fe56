// Error handling module
// Один тип ошибки на весь конвейер, HTTP-слой сам решает, что показать клиенту

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or out-of-range input. Never retried.
    #[error("{0}")]
    Validation(String),

    /// Daily or storage limit hit; terminal for the request.
    #[error("{message}")]
    QuotaExceeded { limit: u64, message: String },

    /// Absent or not owned by the caller. Both cases look the same.
    #[error("{0} not found")]
    NotFound(String),

    /// Every synthesis backend failed, or the filter-graph executor did.
    #[error("{0}")]
    ProviderFailure(String),

    /// A DSP/ML capability that has no backing implementation wired in.
    #[error("{0} is not available")]
    Unimplemented(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Audio processing error: {0}")]
    AudioProcessing(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn quota_exceeded(limit: u64, message: impl Into<String>) -> Self {
        AppError::QuotaExceeded {
            limit,
            message: message.into(),
        }
    }

    /// Ошибки, о которых клиент должен узнать дословно
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::Validation(_)
                | AppError::QuotaExceeded { .. }
                | AppError::NotFound(_)
                | AppError::ProviderFailure(_)
                | AppError::Unimplemented(_)
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;
