//! Error types for symmetric primitives

use thiserror::Error;

/// Errors from sealing, opening, signing and verifying
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Authentication tag or MAC did not verify (tamper or wrong key)
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Key material had the wrong length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length
        expected: usize,
        /// Actual key length
        actual: usize,
    },

    /// The AEAD refused to seal the plaintext
    ///
    /// Only reachable for plaintexts beyond the cipher's length limit.
    #[error("seal failed: {reason}")]
    SealFailed {
        /// Reason reported by the primitive
        reason: String,
    },
}

impl CryptoError {
    /// Returns true if this error means the input was forged or corrupted.
    pub fn is_tamper(&self) -> bool {
        matches!(self, Self::AuthenticationFailed)
    }
}
