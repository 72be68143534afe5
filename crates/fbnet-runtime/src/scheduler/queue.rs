//! Bounded FIFO ready queue of one execution context.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::error::RuntimeError;
use crate::fb::Trigger;
use crate::interface::FbId;
use crate::value::Duration;

/// Default ready queue bound.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Pending execution of one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkItem {
    pub target: FbId,
    pub trigger: Trigger,
    /// Clock reading when the item entered the queue.
    pub enqueued_at: Duration,
}

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<WorkItem>,
    busy: bool,
    closed: bool,
    overflow: bool,
}

/// Multi-producer queue drained by a single context.
///
/// `busy` covers the window between popping an item and finishing it, so
/// the queue only reports idle once the routed follow-up work is visible.
#[derive(Debug)]
pub struct ReadyQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
    capacity: usize,
}

impl ReadyQueue {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            ready: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Append at the tail; a full queue marks the overflow for its owner.
    pub fn push(&self, item: WorkItem) -> Result<(), RuntimeError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(RuntimeError::ContextStopped);
        }
        if state.items.len() >= self.capacity {
            state.overflow = true;
            self.ready.notify_one();
            return Err(RuntimeError::ReentrancyOverflow {
                capacity: self.capacity,
            });
        }
        state.items.push_back(item);
        self.ready.notify_one();
        Ok(())
    }

    /// Pop the head and mark the queue busy until [`ReadyQueue::finish`].
    pub fn try_pop(&self) -> Option<WorkItem> {
        let mut state = self.state.lock();
        let item = state.items.pop_front()?;
        state.busy = true;
        Some(item)
    }

    pub fn finish(&self) {
        self.state.lock().busy = false;
    }

    /// Block until work, overflow or close, or until `timeout` passes.
    pub fn wait_ready(&self, timeout: std::time::Duration) -> bool {
        let mut state = self.state.lock();
        if state.items.is_empty() && !state.closed && !state.overflow {
            let _ = self.ready.wait_for(&mut state, timeout);
        }
        !state.items.is_empty() || state.overflow
    }

    /// Consume the overflow flag.
    pub fn take_overflow(&self) -> bool {
        std::mem::take(&mut self.state.lock().overflow)
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        let state = self.state.lock();
        state.items.is_empty() && !state.busy
    }

    /// Reject further pushes and discard pending items.
    pub fn close(&self) -> usize {
        let mut state = self.state.lock();
        state.closed = true;
        let discarded = state.items.len();
        state.items.clear();
        self.ready.notify_all();
        discarded
    }

}
