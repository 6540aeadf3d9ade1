use thiserror::Error;

pub type SpotliftResult<T> = Result<T, SpotliftError>;

#[derive(Error, Debug)]
pub enum SpotliftError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Historical data fetch failed: {0}")]
    ExternalFetch(String),

    #[error("Analysis timed out after {0} ms")]
    Timeout(u64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl SpotliftError {
    /// Whether the error only degrades the result instead of making it unavailable.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientData(_) | Self::ExternalFetch(_) | Self::Timeout(_)
        )
    }
}
