//! Error types for key lifecycle and payload operations

use epochkms_crypto::CryptoError;
use thiserror::Error;

use crate::store::StoreError;

/// Errors returned by key lookup, encryption, signing and their text/JSON
/// variants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// Key id does not parse under the configured template, or is not in
    /// canonical form
    #[error("malformed key id {id:?}")]
    MalformedId {
        /// The rejected id (lossily decoded if not UTF-8)
        id: String,
    },

    /// Key id names a window that starts after the current time
    #[error("key id {id} is from the future")]
    FutureId {
        /// The rejected id
        id: String,
    },

    /// Key id is older than the configured maximum age
    #[error("key id {id} has expired")]
    Expired {
        /// The rejected id
        id: String,
    },

    /// Key id is valid but the store holds no material for it
    #[error("no key stored for id {id}")]
    KeyNotFound {
        /// The missing id
        id: String,
    },

    /// Input is structurally invalid (e.g. too short for its wire format)
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// What was wrong with the input
        reason: String,
    },

    /// Ciphertext tag or MAC did not verify
    #[error("authentication failed")]
    AuthenticationFailure,

    /// Key store failed; the operation may succeed on retry
    #[error("key store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// Secure randomness could not be obtained for this call
    #[error("randomness unavailable: {0}")]
    RandomnessUnavailable(#[from] RandomnessError),

    /// Stored key bytes have the wrong length
    #[error("corrupt key at {path}: {length} bytes")]
    CorruptKey {
        /// Storage path of the corrupt key
        path: String,
        /// Length that was found
        length: usize,
    },

    /// Text or JSON input could not be decoded
    #[error("decode failed: {reason}")]
    Decode {
        /// Decoder error message
        reason: String,
    },

    /// A value could not be encoded to JSON
    #[error("encode failed: {reason}")]
    Encode {
        /// Encoder error message
        reason: String,
    },

    /// Invariant violation inside a primitive
    #[error("internal error: {reason}")]
    Internal {
        /// Description of the violation
        reason: String,
    },
}

impl KeyError {
    /// Returns true if retrying the same call may succeed.
    ///
    /// Only store failures are transient. Every other error is a property of
    /// the input, the configuration, or the calling request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    /// Returns true if the error rejects the key id carried by a payload.
    pub fn is_key_id_rejection(&self) -> bool {
        matches!(
            self,
            Self::MalformedId { .. }
                | Self::FutureId { .. }
                | Self::Expired { .. }
                | Self::KeyNotFound { .. }
        )
    }
}

impl From<CryptoError> for KeyError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::AuthenticationFailed => Self::AuthenticationFailure,
            CryptoError::InvalidKeyLength { .. } | CryptoError::SealFailed { .. } => {
                Self::Internal { reason: err.to_string() }
            },
        }
    }
}

/// The entropy source could not fill a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct RandomnessError {
    /// Source-specific failure description
    pub reason: String,
}

impl RandomnessError {
    /// Create from any displayable source error.
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// Configuration rejected at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Rotation period is below the allowed minimum
    #[error("rotation period {seconds}s is shorter than the minimum {minimum}s")]
    RotationPeriodTooShort {
        /// Configured period in seconds
        seconds: u64,
        /// Minimum allowed period in seconds
        minimum: u64,
    },

    /// Maximum age does not exceed the rotation period
    #[error("max age {max_age}s must exceed rotation period {rotation}s")]
    MaxAgeNotAfterRotation {
        /// Configured maximum age in seconds
        max_age: u64,
        /// Configured rotation period in seconds
        rotation: u64,
    },

    /// Key id template is unusable
    #[error("invalid key id format {format:?}: {reason}")]
    InvalidKeyIdFormat {
        /// The rejected template
        format: String,
        /// Why it was rejected
        reason: String,
    },

    /// Storage namespace is unusable
    #[error("invalid key namespace {namespace:?}: {reason}")]
    InvalidNamespace {
        /// The rejected namespace
        namespace: String,
        /// Why it was rejected
        reason: &'static str,
    },
}
