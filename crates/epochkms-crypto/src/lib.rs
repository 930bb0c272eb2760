//! epochkms Cryptographic Primitives
//!
//! Symmetric building blocks for the epochkms key manager. Pure functions
//! with deterministic outputs: callers provide nonces, so every operation can
//! be replayed in tests.
//!
//! # Key Layout
//!
//! One rotation window owns one 96-byte block of key material. The block is
//! split into two disjoint sub-keys that are never used for anything else:
//!
//! ```text
//! KeyMaterial (96 bytes)
//! ├── [0, 32)  → XChaCha20-Poly1305 key   (seal / open)
//! └── [32, 96) → HMAC-SHA-512 key         (sign / verify)
//! ```
//!
//! # Security
//!
//! Confidentiality and integrity:
//! - XChaCha20-Poly1305 seals payloads; a failed tag rejects the whole
//!   ciphertext and no plaintext is released
//! - 24-byte nonces are large enough to be drawn at random for every call
//!
//! Authenticity:
//! - HMAC-SHA-512 tags are compared in constant time
//!
//! Hygiene:
//! - Key material is zeroized on drop and redacted from `Debug` output

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod aead;
pub mod error;
pub mod mac;
pub mod material;

pub use aead::{NONCE_SIZE, TAG_SIZE, open, seal};
pub use error::CryptoError;
pub use mac::{MAC_SIZE, sign, verify};
pub use material::{ENCRYPTION_KEY_SIZE, KEY_MATERIAL_SIZE, KeyMaterial, SIGNING_KEY_SIZE};
