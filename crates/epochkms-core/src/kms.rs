//! Payload protection facade
//!
//! [`Kms`] ties the key manager to the symmetric primitives and the wire
//! framing. Every operation has an `_at` variant taking an explicit `now`;
//! the plain variants read the clock from the environment.
//!
//! Three layers, each a thin wrapper over the one below:
//!
//! - bytes: [`Kms::encrypt`], [`Kms::decrypt`], [`Kms::sign`], [`Kms::verify`]
//! - text: padded URL-safe base64 for cookies and query parameters
//! - JSON: any `serde` value, serialized then protected as text

use base64ct::{Base64Url, Encoding};
use chrono::{DateTime, Utc};
use epochkms_crypto::{NONCE_SIZE, open, seal, sign, verify};
use serde::{Serialize, de::DeserializeOwned};
use tracing::warn;

use crate::{
    config::KmsConfig,
    env::Environment,
    error::{ConfigError, KeyError},
    key_id::KeyId,
    lifecycle::{KeyAccess, KeyManager},
    store::KeyStore,
    wire,
};

/// Encrypts, decrypts, signs and verifies payloads with time-windowed keys.
///
/// Explicitly owned: independent instances in one process share nothing
/// except a store they were both given.
pub struct Kms<S: KeyStore, E: Environment> {
    keys: KeyManager<S, E>,
}

impl<S: KeyStore, E: Environment> Kms<S, E> {
    /// Validate `config` and build an instance with an empty key cache.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] from [`KmsConfig::validate`].
    pub fn new(store: S, env: E, config: &KmsConfig) -> Result<Self, ConfigError> {
        Ok(Self { keys: KeyManager::new(store, env, config)? })
    }

    /// The underlying key manager.
    pub fn keys(&self) -> &KeyManager<S, E> {
        &self.keys
    }

    /// Id of the current window.
    pub fn current_key_id(&self) -> KeyId {
        self.keys.current_key_id(self.keys.env().now())
    }

    /// Encrypt `plaintext` under the current window's key.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, KeyError> {
        self.encrypt_at(self.keys.env().now(), plaintext)
    }

    /// Encrypt `plaintext` under the key of the window containing `now`.
    ///
    /// Output is `key id ‖ nonce ‖ ciphertext ‖ tag` with a fresh random
    /// nonce per call.
    ///
    /// # Errors
    ///
    /// - `RandomnessUnavailable`: no entropy for the nonce or a new key
    /// - `StoreUnavailable`, `CorruptKey`: key resolution failed
    /// - `Internal`: the AEAD refused the input
    pub fn encrypt_at(&self, now: DateTime<Utc>, plaintext: &[u8]) -> Result<Vec<u8>, KeyError> {
        let key_id = self.keys.current_key_id(now);
        let key = self.keys.get_or_create_key(key_id.as_str(), now, KeyAccess::Create)?;

        let mut nonce = [0u8; NONCE_SIZE];
        self.keys.env().random_bytes(&mut nonce)?;

        let sealed = seal(&key, &nonce, plaintext)?;
        Ok(wire::encode_encrypted(&key_id, &nonce, &sealed))
    }

    /// Decrypt a payload produced by [`Kms::encrypt`].
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, KeyError> {
        self.decrypt_at(self.keys.env().now(), data)
    }

    /// Decrypt a payload as of `now`.
    ///
    /// No plaintext is returned unless the tag verifies.
    ///
    /// # Errors
    ///
    /// - `InvalidInput`: shorter than key id plus nonce
    /// - `MalformedId`, `FutureId`, `Expired`, `KeyNotFound`: key id rejected
    /// - `AuthenticationFailure`: tag mismatch
    /// - `StoreUnavailable`, `CorruptKey`: key resolution failed
    pub fn decrypt_at(&self, now: DateTime<Utc>, data: &[u8]) -> Result<Vec<u8>, KeyError> {
        let frame = wire::decode_encrypted(data, self.keys.scheme().width())?;
        let key = self.keys.get_or_create_key(frame.key_id, now, KeyAccess::ExistingOnly)?;

        open(&key, frame.nonce, frame.sealed).map_err(|e| {
            warn!(key_id = frame.key_id, "decryption failed authentication");
            KeyError::from(e)
        })
    }

    /// Sign `payload` under the current window's key.
    pub fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, KeyError> {
        self.sign_at(self.keys.env().now(), payload)
    }

    /// Sign `payload` under the key of the window containing `now`.
    ///
    /// Output is `key id ‖ mac ‖ payload`; the payload stays readable.
    ///
    /// # Errors
    ///
    /// - `RandomnessUnavailable`: no entropy for a new key
    /// - `StoreUnavailable`, `CorruptKey`: key resolution failed
    pub fn sign_at(&self, now: DateTime<Utc>, payload: &[u8]) -> Result<Vec<u8>, KeyError> {
        let key_id = self.keys.current_key_id(now);
        let key = self.keys.get_or_create_key(key_id.as_str(), now, KeyAccess::Create)?;

        let mac = sign(&key, payload);
        Ok(wire::encode_signed(&key_id, &mac, payload))
    }

    /// Verify a payload produced by [`Kms::sign`] and return the payload.
    pub fn verify(&self, data: &[u8]) -> Result<Vec<u8>, KeyError> {
        self.verify_at(self.keys.env().now(), data)
    }

    /// Verify a signed payload as of `now`.
    ///
    /// # Errors
    ///
    /// - `InvalidInput`: shorter than key id plus mac
    /// - `MalformedId`, `FutureId`, `Expired`, `KeyNotFound`: key id rejected
    /// - `AuthenticationFailure`: mac mismatch
    /// - `StoreUnavailable`, `CorruptKey`: key resolution failed
    pub fn verify_at(&self, now: DateTime<Utc>, data: &[u8]) -> Result<Vec<u8>, KeyError> {
        let frame = wire::decode_signed(data, self.keys.scheme().width())?;
        let key = self.keys.get_or_create_key(frame.key_id, now, KeyAccess::ExistingOnly)?;

        verify(&key, frame.payload, frame.mac).map_err(|e| {
            warn!(key_id = frame.key_id, "signature failed verification");
            KeyError::from(e)
        })?;

        Ok(frame.payload.to_vec())
    }

    /// [`Kms::encrypt`] rendered as base64 text.
    pub fn encrypt_text(&self, plaintext: &[u8]) -> Result<String, KeyError> {
        self.encrypt_text_at(self.keys.env().now(), plaintext)
    }

    /// [`Kms::encrypt_at`] rendered as base64 text.
    pub fn encrypt_text_at(&self, now: DateTime<Utc>, plaintext: &[u8]) -> Result<String, KeyError> {
        self.encrypt_at(now, plaintext).map(|data| Base64Url::encode_string(&data))
    }

    /// Decode base64 text and [`Kms::decrypt`] it.
    pub fn decrypt_text(&self, text: &str) -> Result<Vec<u8>, KeyError> {
        self.decrypt_text_at(self.keys.env().now(), text)
    }

    /// Decode base64 text and [`Kms::decrypt_at`] it.
    ///
    /// # Errors
    ///
    /// `Decode` if `text` is not padded URL-safe base64, otherwise as
    /// [`Kms::decrypt_at`].
    pub fn decrypt_text_at(&self, now: DateTime<Utc>, text: &str) -> Result<Vec<u8>, KeyError> {
        self.decrypt_at(now, &decode_text(text)?)
    }

    /// [`Kms::sign`] rendered as base64 text.
    pub fn sign_text(&self, payload: &[u8]) -> Result<String, KeyError> {
        self.sign_text_at(self.keys.env().now(), payload)
    }

    /// [`Kms::sign_at`] rendered as base64 text.
    pub fn sign_text_at(&self, now: DateTime<Utc>, payload: &[u8]) -> Result<String, KeyError> {
        self.sign_at(now, payload).map(|data| Base64Url::encode_string(&data))
    }

    /// Decode base64 text and [`Kms::verify`] it.
    pub fn verify_text(&self, text: &str) -> Result<Vec<u8>, KeyError> {
        self.verify_text_at(self.keys.env().now(), text)
    }

    /// Decode base64 text and [`Kms::verify_at`] it.
    ///
    /// # Errors
    ///
    /// `Decode` if `text` is not padded URL-safe base64, otherwise as
    /// [`Kms::verify_at`].
    pub fn verify_text_at(&self, now: DateTime<Utc>, text: &str) -> Result<Vec<u8>, KeyError> {
        self.verify_at(now, &decode_text(text)?)
    }

    /// Serialize `value` to JSON and encrypt it as text.
    pub fn encrypt_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, KeyError> {
        self.encrypt_json_at(self.keys.env().now(), value)
    }

    /// Serialize `value` to JSON and encrypt it as text as of `now`.
    ///
    /// # Errors
    ///
    /// `Encode` if `value` cannot be serialized, otherwise as
    /// [`Kms::encrypt_at`].
    pub fn encrypt_json_at<T: Serialize + ?Sized>(
        &self,
        now: DateTime<Utc>,
        value: &T,
    ) -> Result<String, KeyError> {
        self.encrypt_text_at(now, &encode_json(value)?)
    }

    /// Decrypt text and deserialize the JSON inside.
    pub fn decrypt_json<T: DeserializeOwned>(&self, text: &str) -> Result<T, KeyError> {
        self.decrypt_json_at(self.keys.env().now(), text)
    }

    /// Decrypt text as of `now` and deserialize the JSON inside.
    ///
    /// Authentication happens before deserialization, so malformed JSON
    /// surfaces as `Decode` only for authentic payloads.
    pub fn decrypt_json_at<T: DeserializeOwned>(
        &self,
        now: DateTime<Utc>,
        text: &str,
    ) -> Result<T, KeyError> {
        decode_json(&self.decrypt_text_at(now, text)?)
    }

    /// Serialize `value` to JSON and sign it as text.
    pub fn sign_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, KeyError> {
        self.sign_json_at(self.keys.env().now(), value)
    }

    /// Serialize `value` to JSON and sign it as text as of `now`.
    pub fn sign_json_at<T: Serialize + ?Sized>(
        &self,
        now: DateTime<Utc>,
        value: &T,
    ) -> Result<String, KeyError> {
        self.sign_text_at(now, &encode_json(value)?)
    }

    /// Verify text and deserialize the JSON inside.
    pub fn verify_json<T: DeserializeOwned>(&self, text: &str) -> Result<T, KeyError> {
        self.verify_json_at(self.keys.env().now(), text)
    }

    /// Verify text as of `now` and deserialize the JSON inside.
    pub fn verify_json_at<T: DeserializeOwned>(
        &self,
        now: DateTime<Utc>,
        text: &str,
    ) -> Result<T, KeyError> {
        decode_json(&self.verify_text_at(now, text)?)
    }
}

fn decode_text(text: &str) -> Result<Vec<u8>, KeyError> {
    Base64Url::decode_vec(text).map_err(|e| KeyError::Decode { reason: e.to_string() })
}

fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, KeyError> {
    serde_json::to_vec(value).map_err(|e| KeyError::Encode { reason: e.to_string() })
}

fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, KeyError> {
    serde_json::from_slice(bytes).map_err(|e| KeyError::Decode { reason: e.to_string() })
}
