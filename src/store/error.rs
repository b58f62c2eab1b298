use std::path::PathBuf;

/// Failures every store backend may report. "Not found" is not among them:
/// a missing association or nonce is an ordinary return value.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing medium failed; nothing can be concluded about the record.
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted record could not be decoded.
    #[error("corrupted record at {location}: {reason}")]
    Corrupted { location: String, reason: String },

    #[error("randomness source unavailable: {0}")]
    Randomness(String),

    #[error("invalid association: {0}")]
    InvalidAssociation(String),

    #[error("invalid store configuration: {0}")]
    Config(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
