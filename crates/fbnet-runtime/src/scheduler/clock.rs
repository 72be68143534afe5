//! Clocks measuring latency and driving timers.

use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};

use crate::value::Duration;

/// Time source shared by contexts and the timer handler.
pub trait Clock: Send + Sync + 'static {
    /// Time elapsed since the clock's origin.
    fn now(&self) -> Duration;

    /// Block until the given deadline.
    fn sleep_until(&self, deadline: Duration);

    /// Wake any sleepers (best-effort).
    fn wake(&self) {}

    /// Undo a previous [`Clock::wake`] so later sleeps block again.
    fn reset_wake(&self) {}
}

/// Monotonic clock based on `std::time::Instant`.
#[derive(Debug, Clone)]
pub struct StdClock {
    start: std::time::Instant,
}

impl StdClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now(&self) -> Duration {
        Duration::from(self.start.elapsed())
    }

    fn sleep_until(&self, deadline: Duration) {
        let delta = deadline.saturating_sub(self.now());
        if delta.as_nanos() <= 0 {
            return;
        }
        thread::sleep(delta.to_std());
    }
}

#[derive(Debug)]
struct ManualState {
    now: Duration,
    sleep_calls: u64,
    interrupted: bool,
}

/// Deterministic clock advanced by hand.
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<(Mutex<ManualState>, Condvar)>,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new((
                Mutex::new(ManualState {
                    now: Duration::ZERO,
                    sleep_calls: 0,
                    interrupted: false,
                }),
                Condvar::new(),
            )),
        }
    }

    /// Advance time by `delta`, returning the new time.
    pub fn advance(&self, delta: Duration) -> Duration {
        let (lock, cvar) = &*self.inner;
        let mut state = lock.lock();
        state.now = Duration::from_nanos(state.now.as_nanos().saturating_add(delta.as_nanos()));
        cvar.notify_all();
        state.now
    }

    pub fn set_time(&self, time: Duration) {
        let (lock, cvar) = &*self.inner;
        lock.lock().now = time;
        cvar.notify_all();
    }

    /// Number of `sleep_until` calls issued to this clock.
    #[must_use]
    pub fn sleep_calls(&self) -> u64 {
        self.inner.0.lock().sleep_calls
    }

    /// Release sleepers so they can exit.
    pub fn interrupt(&self) {
        let (lock, cvar) = &*self.inner;
        lock.lock().interrupted = true;
        cvar.notify_all();
    }

    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.inner.0.lock().interrupted
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.inner.0.lock().now
    }

    fn sleep_until(&self, deadline: Duration) {
        let (lock, cvar) = &*self.inner;
        let mut state = lock.lock();
        state.sleep_calls = state.sleep_calls.saturating_add(1);
        while !state.interrupted && state.now.as_nanos() < deadline.as_nanos() {
            cvar.wait(&mut state);
        }
    }

    fn wake(&self) {
        self.interrupt();
    }

    fn reset_wake(&self) {
        self.inner.0.lock().interrupted = false;
    }
}
