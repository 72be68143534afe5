//! Execution contexts: serial dispatch of one ready queue.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use smol_str::SmolStr;
use tracing::{error, trace, warn};

use super::{NetworkCore, ReadyQueue, WorkItem};
use crate::error::RuntimeError;
use crate::fb::{ExecEnv, RealTimeConstraints, Trigger};
use crate::graph::{Endpoint, EventPort};
use crate::interface::{ContextId, EventId, FbId};
use crate::status::StatusEvent;
use crate::value::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextState {
    #[default]
    Idle,
    Dispatching,
    /// Shut down; pending work was discarded.
    Stopped,
    /// Resource exhaustion; the queue no longer accepts work.
    Faulted,
}

/// Owner of a disjoint partition of instances and their ready queue.
#[derive(Clone)]
pub struct ExecutionContext {
    id: ContextId,
    name: SmolStr,
    queue: Arc<ReadyQueue>,
    state: Arc<Mutex<ContextState>>,
    last_error: Arc<Mutex<Option<RuntimeError>>>,
    core: Arc<NetworkCore>,
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .field("pending", &self.queue.len())
            .finish()
    }
}

impl ExecutionContext {
    pub(crate) fn new(
        id: ContextId,
        name: SmolStr,
        queue: Arc<ReadyQueue>,
        core: Arc<NetworkCore>,
    ) -> Self {
        Self {
            id,
            name,
            queue,
            state: Arc::new(Mutex::new(ContextState::Idle)),
            last_error: Arc::new(Mutex::new(None)),
            core,
        }
    }

    #[must_use]
    pub fn id(&self) -> ContextId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &SmolStr {
        &self.name
    }

    #[must_use]
    pub fn state(&self) -> ContextState {
        *self.state.lock()
    }

    #[must_use]
    pub fn queue(&self) -> &Arc<ReadyQueue> {
        &self.queue
    }

    /// Error that faulted the context.
    #[must_use]
    pub fn last_error(&self) -> Option<RuntimeError> {
        self.last_error.lock().clone()
    }

    /// Drain the ready queue breadth-first; returns the items executed.
    ///
    /// A stopped or faulted context executes nothing.
    pub fn dispatch_pending(&self) -> usize {
        {
            let mut state = self.state.lock();
            if matches!(*state, ContextState::Stopped | ContextState::Faulted) {
                return 0;
            }
            *state = ContextState::Dispatching;
        }
        let mut executed = 0usize;
        loop {
            if self.queue.take_overflow() {
                self.fault(RuntimeError::ReentrancyOverflow {
                    capacity: self.queue.capacity(),
                });
                return executed;
            }
            let Some(item) = self.queue.try_pop() else {
                break;
            };
            let fatal = self.dispatch(item);
            self.queue.finish();
            executed += 1;
            if let Some(error) = fatal {
                self.fault(error);
                return executed;
            }
        }
        let mut state = self.state.lock();
        if *state == ContextState::Dispatching {
            *state = ContextState::Idle;
        }
        executed
    }

    pub(crate) fn stop(&self) -> usize {
        let discarded = self.queue.close();
        let mut state = self.state.lock();
        if *state != ContextState::Faulted {
            *state = ContextState::Stopped;
        }
        discarded
    }

    // Returns an error fatal to this context.
    fn dispatch(&self, item: WorkItem) -> Option<RuntimeError> {
        let core = &*self.core;
        let Some(instance) = core.instances.get(item.target.index()) else {
            warn!(context = %self.name, target = %item.target, "work item for unknown instance");
            return None;
        };
        let mut fb = instance.lock();
        let scope = fb.name().clone();
        let env = ExecEnv::new(item.target, &core.services)
            .with_scope(&scope)
            .with_status(&core.status);
        trace!(context = %self.name, instance = %fb.name(), trigger = ?item.trigger, "dispatch");
        let started = core.clock.now();
        let previous = fb.activate(started);
        let result = fb.execute(item.trigger, &env);
        let finished = core.clock.now();
        let mut fatal = None;
        let fired = match result {
            Ok(fired) => fired,
            Err(error) => {
                warn!(context = %self.name, instance = %fb.name(), %error, "execution fault");
                core.status.emit(StatusEvent::ExecutionFault {
                    instance: fb.name().clone(),
                    error: error.clone(),
                });
                if error.is_context_fatal() {
                    fatal = Some(error.clone());
                }
                fb.record_fault(error).into_iter().collect()
            }
        };
        if let Some(constraints) = fb.realtime() {
            let timing = Timing {
                enqueued_at: item.enqueued_at,
                previous,
                started,
                finished,
            };
            self.check_timing(fb.name(), constraints, timing);
        }
        drop(fb);
        if fatal.is_none() {
            for event in fired {
                self.propagate(item.target, event);
            }
        }
        fatal
    }

    fn propagate(&self, source: FbId, event: EventId) {
        let core = &*self.core;
        for dst in core.graph.event_destinations(EventPort::fb(source, event)) {
            let Endpoint::Fb(target) = dst.endpoint else {
                continue;
            };
            if let Err(error) = core.router.route(target, Trigger::Event(dst.event)) {
                warn!(context = %self.name, from = %source, to = %dst, %error, "event hand-off failed");
            }
        }
    }

    fn check_timing(&self, instance: &SmolStr, constraints: RealTimeConstraints, timing: Timing) {
        let status = &self.core.status;
        if let (Some(minimum), Some(previous)) = (constraints.min_interarrival, timing.previous) {
            let interval = timing.started.saturating_sub(previous);
            if interval < minimum {
                warn!(context = %self.name, %instance, interval_ns = interval.as_nanos(), "inter-arrival violation");
                status.emit(StatusEvent::InterArrivalViolation {
                    instance: instance.clone(),
                    interval,
                    minimum,
                });
            }
        }
        if let Some(deadline) = constraints.deadline {
            let latency = timing.finished.saturating_sub(timing.enqueued_at);
            if latency > deadline {
                warn!(context = %self.name, %instance, latency_ns = latency.as_nanos(), "deadline missed");
                status.emit(StatusEvent::DeadlineMissed {
                    instance: instance.clone(),
                    latency,
                    deadline,
                });
            }
        }
        if let Some(budget) = constraints.wcet {
            let elapsed = timing.finished.saturating_sub(timing.started);
            if elapsed > budget {
                warn!(context = %self.name, %instance, elapsed_ns = elapsed.as_nanos(), "execution time budget exceeded");
                status.emit(StatusEvent::WcetExceeded {
                    instance: instance.clone(),
                    elapsed,
                    budget,
                });
            }
        }
    }

    fn fault(&self, error: RuntimeError) {
        let discarded = self.queue.close();
        *self.state.lock() = ContextState::Faulted;
        *self.last_error.lock() = Some(error.clone());
        error!(context = %self.name, %error, discarded, "execution context faulted");
        self.core.status.emit(StatusEvent::ContextFaulted {
            context: self.name.clone(),
            error,
            discarded,
        });
    }
}

#[derive(Clone, Copy)]
struct Timing {
    enqueued_at: Duration,
    previous: Option<Duration>,
    started: Duration,
    finished: Duration,
}
