//! Simulated environment: virtual clock and seeded randomness.
//!
//! Time only moves when a test moves it, and the RNG is a seeded ChaCha20
//! stream, so a run is reproducible from its seed. Randomness can be switched
//! off to exercise the entropy-failure path.

#![allow(clippy::disallowed_types, reason = "Locking simulation state")]

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use epochkms_core::{Environment, RandomnessError};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Deterministic [`Environment`] for simulation.
///
/// Clones share clock, RNG and failure switch, so every instance in a
/// cluster sees the same time.
#[derive(Clone)]
pub struct SimEnv {
    state: Arc<Mutex<SimState>>,
}

struct SimState {
    now: DateTime<Utc>,
    rng: ChaCha20Rng,
    randomness_failing: bool,
}

impl SimEnv {
    /// Seeded environment starting at 2025-01-01T00:00:00Z.
    pub fn with_seed(seed: u64) -> Self {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().unwrap_or(DateTime::UNIX_EPOCH);
        Self::starting_at(seed, start)
    }

    /// Seeded environment starting at `now`.
    pub fn starting_at(seed: u64, now: DateTime<Utc>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                now,
                rng: ChaCha20Rng::seed_from_u64(seed),
                randomness_failing: false,
            })),
        }
    }

    /// Move the clock to `now`. May move backwards.
    pub fn set_now(&self, now: DateTime<Utc>) {
        self.state().now = now;
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: TimeDelta) {
        let mut state = self.state();
        state.now = state.now + delta;
    }

    /// Make every following `random_bytes` call fail (or succeed again).
    pub fn set_randomness_failing(&self, failing: bool) {
        self.state().randomness_failing = failing;
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Environment for SimEnv {
    fn now(&self) -> DateTime<Utc> {
        self.state().now
    }

    fn random_bytes(&self, buffer: &mut [u8]) -> Result<(), RandomnessError> {
        let mut state = self.state();
        if state.randomness_failing {
            return Err(RandomnessError::new("simulated entropy failure"));
        }
        state.rng.fill_bytes(buffer);
        Ok(())
    }
}
