//! Monitoring channel for advisory timing violations and faults.

#![allow(missing_docs)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use smol_str::SmolStr;

use crate::error::RuntimeError;
use crate::value::Duration;

/// Default number of buffered status events.
pub const DEFAULT_STATUS_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    /// Completion later than `deadline` after the stimulus was enqueued.
    DeadlineMissed {
        instance: SmolStr,
        latency: Duration,
        deadline: Duration,
    },
    WcetExceeded {
        instance: SmolStr,
        elapsed: Duration,
        budget: Duration,
    },
    /// Activation sooner than the minimum inter-arrival time.
    InterArrivalViolation {
        instance: SmolStr,
        interval: Duration,
        minimum: Duration,
    },
    /// Per-event runtime error of one instance.
    ExecutionFault {
        instance: SmolStr,
        error: RuntimeError,
    },
    /// The context stopped dispatching; its pending work was discarded.
    ContextFaulted {
        context: SmolStr,
        error: RuntimeError,
        discarded: usize,
    },
}

impl StatusEvent {
    /// Instance the event refers to, if any.
    #[must_use]
    pub fn instance(&self) -> Option<&str> {
        match self {
            Self::DeadlineMissed { instance, .. }
            | Self::WcetExceeded { instance, .. }
            | Self::InterArrivalViolation { instance, .. }
            | Self::ExecutionFault { instance, .. } => Some(instance),
            Self::ContextFaulted { .. } => None,
        }
    }
}

/// Non-blocking producer side of the status channel.
#[derive(Debug, Clone)]
pub struct StatusSink {
    tx: Sender<StatusEvent>,
    dropped: Arc<AtomicU64>,
}

impl StatusSink {
    /// Publish an event; a full channel drops it and bumps the counter.
    pub fn emit(&self, event: StatusEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Events lost to a full channel.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Bounded status channel.
#[must_use]
pub fn status_channel(capacity: usize) -> (StatusSink, Receiver<StatusEvent>) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    (
        StatusSink {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        },
        rx,
    )
}
