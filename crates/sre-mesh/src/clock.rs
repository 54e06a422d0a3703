//! Time sources for the mesh.
//!
//! Wires only ever see a `Duration` since the mesh started; the clock decides
//! where that comes from and how idle waits are spent.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

pub trait Clock: Send + Sync {
    /// Time elapsed since the clock's origin
    fn now(&self) -> Duration;

    /// Block the calling thread for `duration`
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `Instant`
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual clock that only moves when told to. Sleeping advances it, so a
/// mesh driven by it never blocks. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    pub fn set(&self, to: Duration) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let observer = clock.clone();
        clock.advance(Duration::from_millis(250));
        observer.sleep(Duration::from_millis(750));
        assert_eq!(clock.now(), Duration::from_secs(1));
        clock.set(Duration::ZERO);
        assert_eq!(observer.now(), Duration::ZERO);
    }

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock::new();
        let before = clock.now();
        clock.sleep(Duration::from_millis(1));
        assert!(clock.now() > before);
    }
}
