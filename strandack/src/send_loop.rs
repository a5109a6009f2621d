//! Send cadence for one client instance.
//!
//! The loop itself is a small piece of state: whether it is running, and how
//! long to wait before the next tick. The client event loop owns the actual
//! sleep and calls `FrameSession::send_next` on each tick.
//!
//! Jitter is drawn uniformly from `[0, jitter]` and added to the cadence.
//! The RNG is seedable so tests can assert exact tick times.

use std::time::Duration;

use rand::distr::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Tick scheduling state for one client instance.
pub struct SendLoop {
    cadence: Duration,
    jitter: Option<Uniform<u64>>,
    rng: StdRng,
    running: bool,
}

impl SendLoop {
    /// Create a stopped loop. `seed` fixes the jitter sequence; `None` seeds
    /// from the thread RNG.
    pub fn new(cadence: Duration, jitter: Duration, seed: Option<u64>) -> Self {
        let jitter_nanos = u64::try_from(jitter.as_nanos()).unwrap_or(u64::MAX);
        let jitter = if jitter_nanos == 0 {
            None
        } else {
            Uniform::new_inclusive(0, jitter_nanos).ok()
        };
        let seed = seed.unwrap_or_else(rand::random::<u64>);
        Self {
            cadence,
            jitter,
            rng: StdRng::seed_from_u64(seed),
            running: false,
        }
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    /// Halt future ticks. Frames already pending are not affected.
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    /// Delay until the next tick: cadence plus a fresh jitter sample.
    pub fn next_delay(&mut self) -> Duration {
        match &self.jitter {
            Some(dist) => self.cadence + Duration::from_nanos(dist.sample(&mut self.rng)),
            None => self.cadence,
        }
    }
}
