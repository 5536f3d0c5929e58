//! Simulation environment.
//!
//! Time comes from tokio's clock, which tests pause (`start_paused = true`) so
//! timers advance virtually and instantly. Randomness comes from a seeded
//! ChaCha RNG, so the same seed produces the same envelope ids.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use chatlink_core::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::time::Instant;

/// Wall-clock epoch of every simulation (2023-11-14T22:13:20Z).
pub const SIM_EPOCH_MS: u64 = 1_700_000_000_000;

/// Deterministic environment for simulation.
#[derive(Debug, Clone)]
pub struct SimEnv {
    rng: Arc<Mutex<ChaCha8Rng>>,
    started: Instant,
}

impl SimEnv {
    /// Environment seeded with `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self { rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))), started: Instant::now() }
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl Environment for SimEnv {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }

    fn wall_clock_ms(&self) -> u64 {
        let elapsed = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        SIM_EPOCH_MS.saturating_add(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn same_seed_same_ids() {
        let a = SimEnv::with_seed(7);
        let b = SimEnv::with_seed(7);
        assert_eq!(a.random_u128(), b.random_u128());
        assert_ne!(a.random_u128(), SimEnv::with_seed(8).random_u128());
    }

    #[tokio::test(start_paused = true)]
    async fn wall_clock_follows_virtual_time() {
        let env = SimEnv::with_seed(1);
        assert_eq!(env.wall_clock_ms(), SIM_EPOCH_MS);

        env.sleep(Duration::from_secs(3)).await;
        assert_eq!(env.wall_clock_ms(), SIM_EPOCH_MS + 3_000);
    }
}
