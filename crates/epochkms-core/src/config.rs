//! Key manager configuration
//!
//! Every field has a default, so an empty JSON object is a valid config.
//! Durations are whole seconds on the wire.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, key_id::KeyIdScheme};

/// Default rotation period (30 days).
pub const DEFAULT_ROTATION_PERIOD: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Default maximum key age (90 days).
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(90 * 24 * 60 * 60);

/// Shortest accepted rotation period (5 minutes).
pub const MIN_ROTATION_PERIOD: Duration = Duration::from_secs(5 * 60);

/// Default key id template, rendering 13 characters such as `20250101_0000`.
pub const DEFAULT_KEY_ID_FORMAT: &str = "%Y%m%d_%H%M";

/// Default storage prefix for key objects.
pub const DEFAULT_KEY_NAMESPACE: &str = ".keys";

/// Configuration for a [`crate::KeyManager`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KmsConfig {
    /// Length of one key window
    #[serde(rename = "rotation_period_secs", with = "whole_seconds")]
    pub rotation_period: Duration,

    /// How long after its window starts a key is still accepted
    #[serde(rename = "max_age_secs", with = "whole_seconds")]
    pub max_age: Duration,

    /// `strftime` template that renders a window start into a key id
    pub key_id_format: String,

    /// Storage path prefix under which keys are written
    pub key_namespace: String,
}

impl Default for KmsConfig {
    fn default() -> Self {
        Self {
            rotation_period: DEFAULT_ROTATION_PERIOD,
            max_age: DEFAULT_MAX_AGE,
            key_id_format: DEFAULT_KEY_ID_FORMAT.to_owned(),
            key_namespace: DEFAULT_KEY_NAMESPACE.to_owned(),
        }
    }
}

impl KmsConfig {
    /// Check every field and build the key id scheme they describe.
    ///
    /// # Errors
    ///
    /// - `InvalidNamespace`: empty namespace or one with a `..` segment
    /// - `RotationPeriodTooShort`, `MaxAgeNotAfterRotation`,
    ///   `InvalidKeyIdFormat`: see [`KeyIdScheme::new`]
    pub fn validate(&self) -> Result<KeyIdScheme, ConfigError> {
        validate_namespace(&self.key_namespace)?;
        KeyIdScheme::new(self.rotation_period, self.max_age, &self.key_id_format)
    }

    /// Parse a JSON config document, filling omitted fields with defaults.
    ///
    /// Does not validate; call [`KmsConfig::validate`] afterwards.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn validate_namespace(namespace: &str) -> Result<(), ConfigError> {
    let reject = |reason| ConfigError::InvalidNamespace { namespace: namespace.to_owned(), reason };

    if namespace.trim_matches('/').is_empty() {
        return Err(reject("must not be empty"));
    }
    if namespace.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(reject("must not contain `..` segments"));
    }

    Ok(())
}

mod whole_seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
