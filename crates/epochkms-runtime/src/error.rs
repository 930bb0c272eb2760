//! Runtime error types.

use std::fmt;

use epochkms_core::{ConfigError, KeyError, StoreError};

/// Errors that can occur in the runtime and CLI.
#[derive(Debug)]
pub enum RuntimeError {
    /// Configuration file could not be read or parsed.
    ///
    /// Fatal for the invocation. Fix the file and retry.
    Config(String),

    /// Configuration parsed but describes an unusable key scheme.
    InvalidConfig(ConfigError),

    /// Opening the durable store failed.
    ///
    /// Usually a permissions problem or a redb file held by another process.
    Store(StoreError),

    /// A key operation failed (tampered payload, expired key, store outage).
    Key(KeyError),

    /// Reading input or writing output failed.
    Io(String),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::InvalidConfig(err) => write!(f, "invalid configuration: {err}"),
            Self::Store(err) => write!(f, "store error: {err}"),
            Self::Key(err) => write!(f, "key operation failed: {err}"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidConfig(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Key(err) => Some(err),
            Self::Config(_) | Self::Io(_) => None,
        }
    }
}

impl From<ConfigError> for RuntimeError {
    fn from(err: ConfigError) -> Self {
        Self::InvalidConfig(err)
    }
}

impl From<StoreError> for RuntimeError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<KeyError> for RuntimeError {
    fn from(err: KeyError) -> Self {
        Self::Key(err)
    }
}

impl From<std::io::Error> for RuntimeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn key_errors_keep_their_source() {
        let err = RuntimeError::from(KeyError::AuthenticationFailure);

        assert!(err.to_string().starts_with("key operation failed"));
        assert!(err.source().is_some());
    }

    #[test]
    fn io_errors_become_messages() {
        let err = RuntimeError::from(std::io::Error::other("pipe closed"));

        assert_eq!(err.to_string(), "I/O error: pipe closed");
        assert!(err.source().is_none());
    }
}
