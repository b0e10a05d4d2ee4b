use thiserror::Error;

pub type Result<T> = std::result::Result<T, SettleError>;

#[derive(Error, Debug)]
pub enum SettleError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Store error: {0}")]
    Store(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for SettleError {
    fn from(e: rocksdb::Error) -> Self {
        Self::Store(e.to_string())
    }
}

/// The slip extractor's own error channel, kept separate from [`SettleError`]
/// so the caller can decide which failures warrant suggesting a retry.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Inference backend error: {0}")]
    Backend(String),
    #[error("Malformed extraction output: {0}")]
    Malformed(String),
    #[error("Inference call timed out")]
    Timeout,
}
