//! Environment abstraction for deterministic testing.
//!
//! Decouples connection logic from system resources (time, randomness). The
//! simulation harness plugs in a paused tokio clock and a seeded RNG; the
//! application plugs in the system clock and OS entropy.

use std::time::Duration;

/// Clock, entropy and sleeping for the connection state machines.
///
/// Implementations must keep `now()` monotonic and must not fail outside of
/// broken setups (exhausted OS entropy, a simulation clock that was never
/// started).
pub trait Environment: Clone + Send + Sync + 'static {
    /// Monotonic instant. `std::time::Instant` in production,
    /// `tokio::time::Instant` under a paused simulation clock.
    type Instant: Copy + Ord + Send + Sync + std::fmt::Debug + std::ops::Sub<Output = Duration>;

    /// Current monotonic time; never earlier than a previous call.
    fn now(&self) -> Self::Instant;

    /// Wait for `duration`. Drivers await this, state machines never do.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fill `buffer` with random bytes. A seeded environment replays the same
    /// bytes for the same seed.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Unix epoch milliseconds for envelope timestamps. Timers use
    /// [`Environment::now`] instead.
    fn wall_clock_ms(&self) -> u64;

    /// Random `u64` built from [`Environment::random_bytes`].
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Random `u128`, the source of envelope ids.
    fn random_u128(&self) -> u128 {
        let mut bytes = [0u8; 16];
        self.random_bytes(&mut bytes);
        u128::from_be_bytes(bytes)
    }
}

/// Environments for unit tests.
pub mod test_utils {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicU64, Ordering},
        },
        time::{Duration, Instant},
    };

    use super::Environment;

    /// Wall-clock value reported by [`MockEnv`].
    pub const MOCK_WALL_CLOCK_MS: u64 = 1_700_000_000_000;

    /// Deterministic environment over the real monotonic clock.
    ///
    /// Randomness is a counter, so ids are unique and predictable. Tests
    /// drive time by passing explicit instants rather than sleeping.
    #[derive(Debug, Clone, Default)]
    pub struct MockEnv {
        counter: Arc<AtomicU64>,
    }

    impl MockEnv {
        /// Create a mock environment.
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl Environment for MockEnv {
        type Instant = Instant;

        fn now(&self) -> Instant {
            Instant::now()
        }

        fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            async {}
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            let seed = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
            for (chunk, byte) in buffer.iter_mut().zip(seed.to_be_bytes().iter().cycle()) {
                *chunk = *byte;
            }
        }

        fn wall_clock_ms(&self) -> u64 {
            MOCK_WALL_CLOCK_MS
        }
    }
}
