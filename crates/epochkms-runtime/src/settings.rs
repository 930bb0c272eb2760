//! Configuration loading
//!
//! Layers, lowest first: built-in defaults, an optional JSON file, then
//! flag or `EPOCHKMS_*` environment overrides.

use std::{fs, path::Path, time::Duration};

use clap::Args;
use epochkms_core::{KeyIdScheme, KmsConfig};
use tracing::debug;

use crate::error::RuntimeError;

/// Per-field overrides taken from flags or the environment.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Rotation period in seconds
    #[arg(long, env = "EPOCHKMS_ROTATION_PERIOD_SECS")]
    pub rotation_period_secs: Option<u64>,

    /// Maximum key age in seconds
    #[arg(long, env = "EPOCHKMS_MAX_AGE_SECS")]
    pub max_age_secs: Option<u64>,

    /// strftime template for key ids
    #[arg(long, env = "EPOCHKMS_KEY_ID_FORMAT")]
    pub key_id_format: Option<String>,

    /// Store path prefix for key objects
    #[arg(long, env = "EPOCHKMS_KEY_NAMESPACE")]
    pub key_namespace: Option<String>,
}

impl ConfigOverrides {
    /// Replace every field of `config` that has an override.
    #[must_use]
    pub fn apply(&self, mut config: KmsConfig) -> KmsConfig {
        if let Some(secs) = self.rotation_period_secs {
            config.rotation_period = Duration::from_secs(secs);
        }
        if let Some(secs) = self.max_age_secs {
            config.max_age = Duration::from_secs(secs);
        }
        if let Some(format) = &self.key_id_format {
            config.key_id_format.clone_from(format);
        }
        if let Some(namespace) = &self.key_namespace {
            config.key_namespace.clone_from(namespace);
        }
        config
    }
}

/// Read the config file at `path`, or the defaults when there is none.
///
/// The result is not validated; see [`resolve`].
pub fn load(path: Option<&Path>) -> Result<KmsConfig, RuntimeError> {
    let Some(path) = path else {
        return Ok(KmsConfig::default());
    };

    let text = fs::read_to_string(path)
        .map_err(|e| RuntimeError::Config(format!("{}: {e}", path.display())))?;
    let config = KmsConfig::from_json(&text)
        .map_err(|e| RuntimeError::Config(format!("{}: {e}", path.display())))?;

    debug!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Load, override and validate in one step.
pub fn resolve(
    path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<(KmsConfig, KeyIdScheme), RuntimeError> {
    let config = overrides.apply(load(path)?);
    let scheme = config.validate()?;
    Ok((config, scheme))
}
