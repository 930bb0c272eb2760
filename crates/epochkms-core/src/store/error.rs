use thiserror::Error;

/// Errors reported by a key store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Underlying I/O or database failure
    #[error("storage I/O error: {0}")]
    Io(String),

    /// Path cannot be mapped onto the backing store
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath {
        /// The rejected path
        path: String,
        /// Why it was rejected
        reason: String,
    },

    /// Create-only write reported existing data that a read-back could not
    /// find
    #[error("object at {path} vanished after create-only write reported it exists")]
    Vanished {
        /// Path that was expected to hold data
        path: String,
    },
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
