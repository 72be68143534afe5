//! Timer boundary: platform tick hand-off and timed stimuli.
//!
//! A platform tick source posts a single-slot [`Notification`]; the
//! handler thread consumes it and runs [`TimerHandler::process_tick`],
//! which routes `Trigger::External` stimuli to instances whose timed
//! entry became due. The tick source never calls into the scheduler.

#![allow(missing_docs)]

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::error::RuntimeError;
use crate::fb::Trigger;
use crate::interface::StimulusKey;
use crate::scheduler::{Clock, StimulusSink};
use crate::value::Duration;

/// Default platform tick period.
pub const DEFAULT_TICK: Duration = Duration::from_millis(10);

/// Platform timer capability.
pub trait TimerHal {
    fn enable_handler(&mut self) -> Result<(), RuntimeError>;
    fn disable_handler(&mut self);
    fn set_priority(&mut self, priority: u8);
    fn priority(&self) -> u8;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    pub tick: Duration,
    pub priority: u8,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            priority: 0,
        }
    }
}

/// Single-slot post-then-wake hand-off. Repeated posts coalesce.
#[derive(Debug, Default)]
pub struct Notification {
    posted: Mutex<bool>,
    cvar: Condvar,
}

impl Notification {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&self) {
        *self.posted.lock() = true;
        self.cvar.notify_one();
    }

    /// Consume a pending post, waiting up to `timeout` for one.
    pub fn wait(&self, timeout: std::time::Duration) -> bool {
        let mut posted = self.posted.lock();
        if !*posted {
            let _ = self.cvar.wait_for(&mut posted, timeout);
        }
        std::mem::take(&mut *posted)
    }

    pub fn try_take(&self) -> bool {
        std::mem::take(&mut *self.posted.lock())
    }
}

#[derive(Debug, Clone, Copy)]
struct TimedEntry {
    period: Option<Duration>,
    due: Duration,
}

/// Registry of periodic and one-shot timed stimuli.
pub struct TimerHandler {
    clock: Arc<dyn Clock>,
    sink: Arc<dyn StimulusSink>,
    entries: Mutex<FxHashMap<StimulusKey, TimedEntry>>,
}

impl fmt::Debug for TimerHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandler")
            .field("entries", &self.entries.lock().len())
            .finish()
    }
}

impl TimerHandler {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, sink: Arc<dyn StimulusSink>) -> Self {
        Self {
            clock,
            sink,
            entries: Mutex::new(FxHashMap::default()),
        }
    }

    /// Fire `owner` every `period`, first one period from now.
    pub fn register_periodic(
        &self,
        owner: impl Into<StimulusKey>,
        period: Duration,
    ) -> Result<(), RuntimeError> {
        if period.as_nanos() <= 0 {
            return Err(RuntimeError::Fault(
                format!("timer period must be positive, got {}ns", period.as_nanos()).into(),
            ));
        }
        self.insert(owner.into(), Some(period), period);
        Ok(())
    }

    /// Fire `owner` once after `delay`; replaces any existing entry.
    pub fn register_once(&self, owner: impl Into<StimulusKey>, delay: Duration) {
        self.insert(owner.into(), None, delay);
    }

    fn insert(&self, owner: StimulusKey, period: Option<Duration>, delay: Duration) {
        let now = self.clock.now();
        let due = now.checked_add(delay).unwrap_or(Duration::from_nanos(i64::MAX));
        self.entries.lock().insert(owner, TimedEntry { period, due });
    }

    pub fn unregister(&self, owner: impl Into<StimulusKey>) -> bool {
        self.entries.lock().remove(&owner.into()).is_some()
    }

    #[must_use]
    pub fn is_registered(&self, owner: impl Into<StimulusKey>) -> bool {
        self.entries.lock().contains_key(&owner.into())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Route one stimulus per due entry, earliest first; returns the count.
    ///
    /// A periodic entry that fell several periods behind fires once and
    /// resumes on its original phase.
    pub fn process_tick(&self) -> usize {
        let now = self.clock.now();
        let mut due = Vec::new();
        {
            let mut entries = self.entries.lock();
            entries.retain(|owner, entry| {
                if entry.due > now {
                    return true;
                }
                due.push((entry.due, *owner));
                match entry.period {
                    Some(period) => {
                        let behind = now.as_nanos() - entry.due.as_nanos();
                        let skipped = behind / period.as_nanos() + 1;
                        let next = entry
                            .due
                            .as_nanos()
                            .saturating_add(skipped.saturating_mul(period.as_nanos()));
                        entry.due = Duration::from_nanos(next);
                        true
                    }
                    None => false,
                }
            });
        }
        due.sort_unstable();
        for (_, owner) in &due {
            if let Err(error) = self.sink.post(owner.instance, Trigger::External(owner.path)) {
                warn!(target_instance = %owner, %error, "timer stimulus dropped");
            }
        }
        due.len()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// Thread-based [`TimerHal`]: a tick thread posts, a handler thread consumes.
pub struct StdTimerHandler {
    handler: Arc<TimerHandler>,
    config: TimerConfig,
    notification: Arc<Notification>,
    stop: Arc<AtomicBool>,
    threads: Vec<thread::JoinHandle<()>>,
}

impl fmt::Debug for StdTimerHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdTimerHandler")
            .field("config", &self.config)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl StdTimerHandler {
    #[must_use]
    pub fn new(handler: Arc<TimerHandler>, config: TimerConfig) -> Self {
        Self {
            handler,
            config,
            notification: Arc::new(Notification::new()),
            stop: Arc::new(AtomicBool::new(false)),
            threads: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.threads.is_empty()
    }

    #[must_use]
    pub fn handler(&self) -> &Arc<TimerHandler> {
        &self.handler
    }
}

impl TimerHal for StdTimerHandler {
    fn enable_handler(&mut self) -> Result<(), RuntimeError> {
        if self.is_enabled() {
            return Ok(());
        }
        self.stop.store(false, Ordering::SeqCst);
        self.handler.clock.reset_wake();
        let period = self.config.tick.max(Duration::from_millis(1));
        let tick = period.to_std();

        let stop = self.stop.clone();
        let notification = self.notification.clone();
        let clock = self.handler.clock.clone();
        let ticker = thread::Builder::new()
            .name("fbnet-timer-tick".into())
            .spawn(move || {
                // paced on absolute deadlines so ticks do not drift
                let mut next = clock.now();
                while !stop.load(Ordering::SeqCst) {
                    let Some(due) = next.checked_add(period) else {
                        break;
                    };
                    next = due;
                    clock.sleep_until(next);
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }
                    notification.post();
                }
            })
            .map_err(|err| RuntimeError::ThreadSpawn(err.to_string().into()))?;
        self.threads.push(ticker);

        let stop = self.stop.clone();
        let notification = self.notification.clone();
        let handler = self.handler.clone();
        let consumer = thread::Builder::new()
            .name("fbnet-timer".into())
            .spawn(move || loop {
                if notification.wait(tick) {
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }
                    handler.process_tick();
                } else if stop.load(Ordering::SeqCst) {
                    break;
                }
            });
        match consumer {
            Ok(join) => self.threads.push(join),
            Err(err) => {
                self.disable_handler();
                return Err(RuntimeError::ThreadSpawn(err.to_string().into()));
            }
        }
        debug!(tick_ns = self.config.tick.as_nanos(), priority = self.config.priority, "timer handler enabled");
        Ok(())
    }

    fn disable_handler(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        self.stop.store(true, Ordering::SeqCst);
        self.notification.post();
        self.handler.clock.wake();
        for join in self.threads.drain(..) {
            if join.join().is_err() {
                warn!("timer thread panicked");
            }
        }
        debug!("timer handler disabled");
    }

    /// Recorded for the platform; std threads have no portable priority.
    fn set_priority(&mut self, priority: u8) {
        self.config.priority = priority;
    }

    fn priority(&self) -> u8 {
        self.config.priority
    }
}

impl Drop for StdTimerHandler {
    fn drop(&mut self) {
        self.disable_handler();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::FbId;
    use crate::scheduler::ManualClock;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<FbId>>);

    impl StimulusSink for Recorder {
        fn post(&self, target: FbId, _trigger: Trigger) -> Result<(), RuntimeError> {
            self.0.lock().push(target);
            Ok(())
        }
    }

    #[test]
    fn notification_coalesces_posts() {
        let note = Notification::new();
        note.post();
        note.post();
        assert!(note.try_take());
        assert!(!note.try_take());
        assert!(!note.wait(std::time::Duration::from_millis(1)));
    }

    #[test]
    fn periodic_and_one_shot_entries() {
        let clock = ManualClock::new();
        let sink = Arc::new(Recorder::default());
        let timers = TimerHandler::new(Arc::new(clock.clone()), sink.clone());
        timers.register_periodic(FbId(1), Duration::from_millis(10)).unwrap();
        timers.register_once(FbId(2), Duration::from_millis(15));

        clock.advance(Duration::from_millis(9));
        assert_eq!(timers.process_tick(), 0);
        clock.advance(Duration::from_millis(1));
        assert_eq!(timers.process_tick(), 1);
        clock.advance(Duration::from_millis(10));
        assert_eq!(timers.process_tick(), 2);
        assert_eq!(*sink.0.lock(), vec![FbId(1), FbId(2), FbId(1)]);
        assert!(!timers.is_registered(FbId(2)));
        assert!(timers.unregister(FbId(1)));
        assert!(timers.is_empty());
    }

    #[test]
    fn lagging_periodic_entry_fires_once() {
        let clock = ManualClock::new();
        let sink = Arc::new(Recorder::default());
        let timers = TimerHandler::new(Arc::new(clock.clone()), sink.clone());
        timers.register_periodic(FbId(0), Duration::from_millis(10)).unwrap();
        clock.advance(Duration::from_millis(35));
        assert_eq!(timers.process_tick(), 1);
        clock.advance(Duration::from_millis(4));
        assert_eq!(timers.process_tick(), 0);
        clock.advance(Duration::from_millis(1));
        assert_eq!(timers.process_tick(), 1);
    }

    #[test]
    fn tick_thread_follows_the_clock() {
        let clock = ManualClock::new();
        let sink = Arc::new(Recorder::default());
        let timers = Arc::new(TimerHandler::new(Arc::new(clock.clone()), sink.clone()));
        timers.register_periodic(FbId(3), Duration::from_millis(10)).unwrap();
        let mut hal = StdTimerHandler::new(
            timers,
            TimerConfig {
                tick: Duration::from_millis(5),
                priority: 2,
            },
        );
        hal.enable_handler().unwrap();
        assert_eq!(hal.priority(), 2);

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while sink.0.lock().is_empty() && std::time::Instant::now() < deadline {
            clock.set_time(Duration::from_millis(clock.now().as_millis() + 5));
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert_eq!(sink.0.lock().first(), Some(&FbId(3)));
        assert!(clock.sleep_calls() > 0);

        hal.disable_handler();
        assert!(!hal.is_enabled());
    }

    #[test]
    fn reenabled_tick_thread_sleeps_again() {
        let clock = ManualClock::new();
        let sink = Arc::new(Recorder::default());
        let timers = Arc::new(TimerHandler::new(Arc::new(clock.clone()), sink.clone()));
        let mut hal = StdTimerHandler::new(timers.clone(), TimerConfig::default());
        hal.enable_handler().unwrap();
        hal.disable_handler();
        assert!(clock.is_interrupted());

        hal.enable_handler().unwrap();
        assert!(!clock.is_interrupted());
        std::thread::sleep(std::time::Duration::from_millis(20));
        let settled = clock.sleep_calls();
        std::thread::sleep(std::time::Duration::from_millis(20));
        // frozen time: the ticker stays parked instead of spinning
        assert_eq!(clock.sleep_calls(), settled);

        timers.register_periodic(FbId(4), Duration::from_millis(10)).unwrap();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while sink.0.lock().is_empty() && std::time::Instant::now() < deadline {
            clock.set_time(Duration::from_millis(clock.now().as_millis() + 10));
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert_eq!(sink.0.lock().first(), Some(&FbId(4)));
        hal.disable_handler();
    }

    #[test]
    fn rejects_non_positive_period() {
        let timers = TimerHandler::new(Arc::new(ManualClock::new()), Arc::new(Recorder::default()));
        assert!(timers.register_periodic(FbId(0), Duration::ZERO).is_err());
    }
}
