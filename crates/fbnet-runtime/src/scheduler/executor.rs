//! Network execution: deterministic single-thread driving and one OS
//! thread per context.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::Receiver;
use indexmap::IndexMap;
use parking_lot::Mutex;
use smol_str::SmolStr;
use tracing::{debug, info, warn};

use super::{
    Clock, ContextState, ExecutionContext, NetworkCore, ReadyQueue, Router, SchedulerConfig,
    StimulusSink,
};
use crate::error::RuntimeError;
use crate::fb::{FunctionBlock, Services, Trigger};
use crate::interface::{ContextId, FbId, FbInterface, MemberPath};
use crate::io::IoMapper;
use crate::network::{split_path, Network};
use crate::status::{status_channel, StatusEvent};
use crate::timer::{StdTimerHandler, TimerConfig, TimerHal, TimerHandler};
use crate::value::Value;

/// Poll period of an idle context thread.
const IDLE_POLL: std::time::Duration = std::time::Duration::from_millis(50);

/// A locked network with its contexts, driven from the calling thread.
pub struct Executor {
    core: Arc<NetworkCore>,
    contexts: Vec<ExecutionContext>,
    context_names: IndexMap<SmolStr, ContextId>,
    placement: Vec<ContextId>,
    interfaces: Vec<Arc<FbInterface>>,
    io: Arc<IoMapper>,
    timer: Arc<TimerHandler>,
    status: Receiver<StatusEvent>,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("contexts", &self.contexts)
            .field("instances", &self.core.names.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Executor {
    pub(crate) fn new(network: Network, config: &SchedulerConfig, clock: Arc<dyn Clock>) -> Self {
        let Network {
            contexts: context_names,
            instances,
            placement,
            names,
            mut graph,
            io,
        } = network;
        graph.lock();

        let queues: Vec<Arc<ReadyQueue>> = context_names
            .values()
            .map(|_| Arc::new(ReadyQueue::new(config.queue_capacity)))
            .collect();
        let router = Arc::new(Router::new(placement.clone(), queues.clone(), clock.clone()));
        let sink: Arc<dyn StimulusSink> = router.clone();
        io.attach_sink(sink.clone());
        let timer = Arc::new(TimerHandler::new(clock.clone(), sink));

        let interfaces = instances
            .iter()
            .map(|fb| Arc::clone(fb.interface()))
            .collect();
        let instances = instances
            .into_iter()
            .enumerate()
            .map(|(index, mut fb)| {
                fb.wire(FbId(u32::try_from(index).unwrap_or(u32::MAX)), &graph);
                Arc::new(Mutex::new(fb))
            })
            .collect();
        let (status_sink, status) = status_channel(config.status_capacity);
        let core = Arc::new(NetworkCore {
            instances,
            names,
            graph,
            router,
            services: Services {
                timer: Some(timer.clone()),
                io: Some(io.clone()),
            },
            status: status_sink,
            clock,
        });
        let contexts = context_names
            .iter()
            .zip(&queues)
            .map(|((name, id), queue)| {
                ExecutionContext::new(*id, name.clone(), queue.clone(), core.clone())
            })
            .collect::<Vec<_>>();
        info!(
            contexts = contexts.len(),
            instances = core.instances.len(),
            event_edges = core.graph.event_edge_count(),
            data_edges = core.graph.data_edge_count(),
            "network locked for execution"
        );
        Self {
            core,
            contexts,
            context_names,
            placement,
            interfaces,
            io,
            timer,
            status,
        }
    }

    /// One dispatch pass over every context; returns the items executed.
    pub fn step(&self) -> usize {
        self.contexts
            .iter()
            .map(ExecutionContext::dispatch_pending)
            .sum()
    }

    /// Dispatch until no context has pending work.
    ///
    /// Event cycles without a terminating guard never become idle.
    pub fn run_until_idle(&self) -> usize {
        let mut total = 0;
        loop {
            let executed = self.step();
            if executed == 0 {
                return total;
            }
            total += executed;
        }
    }

    /// Route an input event given as `INSTANCE.EVENT`.
    pub fn inject(&self, path: &str) -> Result<(), RuntimeError> {
        let (instance, port) = split_path(path)?;
        let id = self.core.lookup(instance)?;
        let event = self.interfaces[id.index()]
            .event_input(port)
            .ok_or_else(|| RuntimeError::UnknownPort(path.into()))?;
        self.core.router.route(id, Trigger::Event(event))
    }

    /// Route an external indication to an instance.
    pub fn indicate(&self, instance: &str) -> Result<(), RuntimeError> {
        let id = self.core.lookup(instance)?;
        self.core.router.route(id, Trigger::External(MemberPath::ROOT))
    }

    pub fn post(&self, target: FbId, trigger: Trigger) -> Result<(), RuntimeError> {
        self.core.router.route(target, trigger)
    }

    pub fn set_input(&self, path: &str, value: &Value) -> Result<(), RuntimeError> {
        let (instance, port) = split_path(path)?;
        self.instance(instance)?.lock().set_input(port, value)
    }

    pub fn input(&self, path: &str) -> Result<Value, RuntimeError> {
        let (instance, port) = split_path(path)?;
        self.instance(instance)?
            .lock()
            .input(port)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownPort(path.into()))
    }

    pub fn output(&self, path: &str) -> Result<Value, RuntimeError> {
        let (instance, port) = split_path(path)?;
        self.instance(instance)?
            .lock()
            .output(port)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownPort(path.into()))
    }

    /// Inspect an instance under its execution lock.
    pub fn with_instance<R>(
        &self,
        name: &str,
        inspect: impl FnOnce(&FunctionBlock) -> R,
    ) -> Result<R, RuntimeError> {
        Ok(inspect(&self.instance(name)?.lock()))
    }

    fn instance(&self, name: &str) -> Result<&Arc<Mutex<FunctionBlock>>, RuntimeError> {
        let id = self.core.lookup(name)?;
        Ok(&self.core.instances[id.index()])
    }

    #[must_use]
    pub fn contexts(&self) -> &[ExecutionContext] {
        &self.contexts
    }

    #[must_use]
    pub fn context(&self, name: &str) -> Option<&ExecutionContext> {
        let id = self.context_names.get(name)?;
        self.contexts.get(usize::from(id.0))
    }

    #[must_use]
    pub fn context_state(&self, name: &str) -> Option<ContextState> {
        self.context(name).map(ExecutionContext::state)
    }

    /// Context owning an instance.
    #[must_use]
    pub fn owner(&self, instance: &str) -> Option<&SmolStr> {
        let id = self.core.names.get(instance)?;
        let context = self.placement.get(id.index())?;
        self.context_names
            .get_index(usize::from(context.0))
            .map(|(name, _)| name)
    }

    #[must_use]
    pub fn status(&self) -> &Receiver<StatusEvent> {
        &self.status
    }

    /// Take every buffered status event.
    #[must_use]
    pub fn drain_status(&self) -> Vec<StatusEvent> {
        self.status.try_iter().collect()
    }

    #[must_use]
    pub fn dropped_status(&self) -> u64 {
        self.core.status.dropped()
    }

    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.core.clock
    }

    #[must_use]
    pub fn io(&self) -> &Arc<IoMapper> {
        &self.io
    }

    #[must_use]
    pub fn timer(&self) -> &Arc<TimerHandler> {
        &self.timer
    }

    /// Run one timer tick at the current clock time.
    pub fn tick_timers(&self) -> usize {
        self.timer.process_tick()
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.core.router.all_idle()
    }

    /// Spawn one scheduling thread per context.
    pub fn spawn(self) -> Result<RunningNetwork, RuntimeError> {
        let workers = Workers::spawn(&self.contexts)?;
        Ok(RunningNetwork {
            executor: self,
            workers,
            timer: None,
        })
    }

    /// Spawn contexts plus the platform timer threads.
    pub fn spawn_with_timer(self, config: TimerConfig) -> Result<RunningNetwork, RuntimeError> {
        let mut timer = StdTimerHandler::new(self.timer.clone(), config);
        timer.enable_handler()?;
        let mut running = self.spawn()?;
        running.timer = Some(timer);
        Ok(running)
    }

    /// Unlock the structure for editing; the executor must be quiesced.
    pub fn into_network(self) -> Result<Network, RuntimeError> {
        let Self {
            core,
            contexts,
            context_names,
            placement,
            io,
            timer,
            ..
        } = self;
        drop(contexts);
        timer.clear();
        drop(timer);
        io.detach_sink();
        let core = Arc::try_unwrap(core).map_err(|_| RuntimeError::NetworkRunning)?;
        let NetworkCore {
            instances,
            names,
            mut graph,
            ..
        } = core;
        let instances = instances
            .into_iter()
            .map(|fb| {
                Arc::try_unwrap(fb)
                    .map(Mutex::into_inner)
                    .map_err(|_| RuntimeError::NetworkRunning)
            })
            .collect::<Result<Vec<_>, _>>()?;
        graph.unlock();
        Ok(Network {
            contexts: context_names,
            instances,
            placement,
            names,
            graph,
            io,
        })
    }
}

/// Context threads and their stop flag.
struct Workers {
    stop: Arc<AtomicBool>,
    contexts: Vec<ExecutionContext>,
    threads: Vec<thread::JoinHandle<()>>,
}

impl Workers {
    fn spawn(contexts: &[ExecutionContext]) -> Result<Self, RuntimeError> {
        let mut workers = Self {
            stop: Arc::new(AtomicBool::new(false)),
            contexts: contexts.to_vec(),
            threads: Vec::with_capacity(contexts.len()),
        };
        for context in contexts {
            let context = context.clone();
            let stop = workers.stop.clone();
            let spawned = thread::Builder::new()
                .name(format!("fbnet-ctx-{}", context.name()))
                .spawn(move || {
                    debug!(context = %context.name(), "context thread started");
                    while !stop.load(Ordering::SeqCst) {
                        if context.queue().wait_ready(IDLE_POLL) {
                            context.dispatch_pending();
                        }
                        if matches!(context.state(), ContextState::Faulted | ContextState::Stopped) {
                            break;
                        }
                    }
                    debug!(context = %context.name(), "context thread exiting");
                });
            match spawned {
                Ok(join) => workers.threads.push(join),
                Err(err) => {
                    workers.shutdown();
                    return Err(RuntimeError::ThreadSpawn(err.to_string().into()));
                }
            }
        }
        Ok(workers)
    }

    fn shutdown(&mut self) -> usize {
        if self.threads.is_empty() {
            return 0;
        }
        self.stop.store(true, Ordering::SeqCst);
        let discarded = self.contexts.iter().map(ExecutionContext::stop).sum();
        for join in self.threads.drain(..) {
            if join.join().is_err() {
                warn!("context thread panicked");
            }
        }
        info!(discarded, "network stopped");
        discarded
    }
}

impl Drop for Workers {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Network executing on its own threads.
pub struct RunningNetwork {
    executor: Executor,
    workers: Workers,
    timer: Option<StdTimerHandler>,
}

impl fmt::Debug for RunningNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunningNetwork")
            .field("executor", &self.executor)
            .field("threads", &self.workers.threads.len())
            .field("timer", &self.timer)
            .finish()
    }
}

impl RunningNetwork {
    pub fn inject(&self, path: &str) -> Result<(), RuntimeError> {
        self.executor.inject(path)
    }

    pub fn indicate(&self, instance: &str) -> Result<(), RuntimeError> {
        self.executor.indicate(instance)
    }

    pub fn post(&self, target: FbId, trigger: Trigger) -> Result<(), RuntimeError> {
        self.executor.post(target, trigger)
    }

    pub fn set_input(&self, path: &str, value: &Value) -> Result<(), RuntimeError> {
        self.executor.set_input(path, value)
    }

    pub fn input(&self, path: &str) -> Result<Value, RuntimeError> {
        self.executor.input(path)
    }

    pub fn output(&self, path: &str) -> Result<Value, RuntimeError> {
        self.executor.output(path)
    }

    pub fn with_instance<R>(
        &self,
        name: &str,
        inspect: impl FnOnce(&FunctionBlock) -> R,
    ) -> Result<R, RuntimeError> {
        self.executor.with_instance(name, inspect)
    }

    #[must_use]
    pub fn context_state(&self, name: &str) -> Option<ContextState> {
        self.executor.context_state(name)
    }

    #[must_use]
    pub fn status(&self) -> &Receiver<StatusEvent> {
        self.executor.status()
    }

    #[must_use]
    pub fn io(&self) -> &Arc<IoMapper> {
        self.executor.io()
    }

    /// Wait until every queue is drained, up to `timeout`.
    pub fn wait_idle(&self, timeout: std::time::Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if self.executor.is_idle() {
                return true;
            }
            if std::time::Instant::now() >= deadline {
                return false;
            }
            thread::sleep(std::time::Duration::from_millis(1));
        }
    }

    /// Stop timers and contexts; pending work items are discarded and
    /// in-flight executions finish.
    pub fn stop(self) -> Executor {
        let Self {
            executor,
            mut workers,
            timer,
        } = self;
        drop(timer);
        workers.shutdown();
        executor
    }
}
