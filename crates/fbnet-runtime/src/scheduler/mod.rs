//! Event-chain scheduling across execution contexts.
//!
//! Every stimulus, whether a propagated output event, an injected event,
//! a timer expiry or an I/O indication, becomes a [`WorkItem`] routed to
//! the ready queue of the context owning its target instance. Contexts
//! drain their queue breadth-first; follow-up events go to the tail.

#![allow(missing_docs)]

mod clock;
mod context;
mod executor;
mod queue;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use smol_str::SmolStr;

pub use clock::{Clock, ManualClock, StdClock};
pub use context::{ContextState, ExecutionContext};
pub use executor::{Executor, RunningNetwork};
pub use queue::{ReadyQueue, WorkItem, DEFAULT_QUEUE_CAPACITY};

use crate::error::RuntimeError;
use crate::fb::{FunctionBlock, Services, Trigger};
use crate::graph::ConnectionGraph;
use crate::interface::{ContextId, FbId};
use crate::status::{StatusSink, DEFAULT_STATUS_CAPACITY};

/// Scheduler sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub queue_capacity: usize,
    pub status_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            status_capacity: DEFAULT_STATUS_CAPACITY,
        }
    }
}

/// Entry point for stimuli produced outside the dispatch loop.
pub trait StimulusSink: Send + Sync {
    fn post(&self, target: FbId, trigger: Trigger) -> Result<(), RuntimeError>;
}

/// Maps instances to the ready queue of their owning context.
pub struct Router {
    owners: Vec<ContextId>,
    queues: Vec<Arc<ReadyQueue>>,
    clock: Arc<dyn Clock>,
    activity: AtomicU64,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("owners", &self.owners)
            .field("queues", &self.queues.len())
            .field("activity", &self.activity())
            .finish()
    }
}

impl Router {
    #[must_use]
    pub fn new(owners: Vec<ContextId>, queues: Vec<Arc<ReadyQueue>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            owners,
            queues,
            clock,
            activity: AtomicU64::new(0),
        }
    }

    /// Enqueue a work item at the tail of the owner's queue.
    pub fn route(&self, target: FbId, trigger: Trigger) -> Result<(), RuntimeError> {
        let queue = self
            .owner(target)
            .and_then(|context| self.queues.get(usize::from(context.0)))
            .ok_or_else(|| RuntimeError::UnknownInstance(target.to_string().into()))?;
        self.activity.fetch_add(1, Ordering::SeqCst);
        queue.push(WorkItem {
            target,
            trigger,
            enqueued_at: self.clock.now(),
        })
    }

    #[must_use]
    pub fn owner(&self, target: FbId) -> Option<ContextId> {
        self.owners.get(target.index()).copied()
    }

    #[must_use]
    pub fn queue(&self, context: ContextId) -> Option<&Arc<ReadyQueue>> {
        self.queues.get(usize::from(context.0))
    }

    /// Monotonic count of routed items.
    #[must_use]
    pub fn activity(&self) -> u64 {
        self.activity.load(Ordering::SeqCst)
    }

    /// Snapshot: every queue empty and no item mid-dispatch.
    #[must_use]
    pub fn all_idle(&self) -> bool {
        let before = self.activity();
        self.queues.iter().all(|queue| queue.is_idle()) && self.activity() == before
    }
}

impl StimulusSink for Router {
    fn post(&self, target: FbId, trigger: Trigger) -> Result<(), RuntimeError> {
        self.route(target, trigger)
    }
}

/// State shared by every context of one running network.
pub(crate) struct NetworkCore {
    pub(crate) instances: Vec<Arc<Mutex<FunctionBlock>>>,
    pub(crate) names: IndexMap<SmolStr, FbId>,
    pub(crate) graph: ConnectionGraph,
    pub(crate) router: Arc<Router>,
    pub(crate) services: Services,
    pub(crate) status: StatusSink,
    pub(crate) clock: Arc<dyn Clock>,
}

impl NetworkCore {
    pub(crate) fn lookup(&self, name: &str) -> Result<FbId, RuntimeError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| RuntimeError::UnknownInstance(name.into()))
    }
}
