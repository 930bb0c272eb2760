//! Production Environment implementation using the system clock and OS RNG.
//!
//! # Capabilities
//!
//! - Real wall-clock time (`chrono::Utc::now`)
//! - OS cryptographic RNG (getrandom). Truly random, not reproducible
//!
//! Unlike a simulation environment, RNG failure is reported to the calling
//! request instead of being hidden; the next call tries the OS again.

use chrono::{DateTime, Utc};
use epochkms_core::{Environment, RandomnessError};

/// Production environment using the system clock and cryptographic RNG.
///
/// # Security
///
/// The RNG uses getrandom which provides OS-level cryptographic randomness
/// (e.g., `getrandom(2)` on Linux, `BCryptGenRandom` on Windows). Suitable
/// for key material and nonces.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), RandomnessError> {
        getrandom::fill(buffer).map_err(|e| RandomnessError::new(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn system_env_time_is_current() {
        let now = SystemEnv::new().now();
        assert!(now > Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn system_env_random_bytes_are_random() {
        let env = SystemEnv::new();

        let mut bytes1 = [0u8; 32];
        let mut bytes2 = [0u8; 32];

        env.random_bytes(&mut bytes1).unwrap();
        env.random_bytes(&mut bytes2).unwrap();

        // Extremely unlikely to be equal if random
        assert_ne!(bytes1, bytes2, "Random bytes should differ");
    }

    #[test]
    fn system_env_fills_key_sized_buffer() {
        let env = SystemEnv::new();

        let mut bytes = [0u8; 96];
        env.random_bytes(&mut bytes).unwrap();

        let non_zero_count = bytes.iter().filter(|&&b| b != 0).count();
        assert!(non_zero_count > 48, "Most bytes should be non-zero");
    }
}
