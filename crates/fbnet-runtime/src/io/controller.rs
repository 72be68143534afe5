//! Device controller lifecycle and configuration.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use tracing::{debug, info, warn};

use super::{HandleDescriptor, IoHandle, IoMapper, LoopbackController};
use crate::error::RuntimeError;
use crate::timer::Notification;

/// Default period between two `run_loop` calls.
pub const DEFAULT_UPDATE_INTERVAL: std::time::Duration = std::time::Duration::from_millis(40);

/// Key/value configuration of one controller, applied before `init`.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub kind: SmolStr,
    pub update_interval: std::time::Duration,
    pub params: IndexMap<SmolStr, toml::Value>,
}

impl ControllerConfig {
    #[must_use]
    pub fn new(kind: impl Into<SmolStr>) -> Self {
        Self {
            kind: kind.into(),
            update_interval: DEFAULT_UPDATE_INTERVAL,
            params: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_update_interval(mut self, interval: std::time::Duration) -> Self {
        self.update_interval = interval;
        self
    }

    pub fn param_str(&self, key: &str) -> Result<Option<&str>, RuntimeError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(toml::Value::String(text)) => Ok(Some(text)),
            Some(_) => Err(self.invalid(key, "a string")),
        }
    }

    pub fn param_list(&self, key: &str) -> Result<Vec<SmolStr>, RuntimeError> {
        match self.params.get(key) {
            None => Ok(Vec::new()),
            Some(toml::Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(SmolStr::new)
                        .ok_or_else(|| self.invalid(key, "a list of strings"))
                })
                .collect(),
            Some(_) => Err(self.invalid(key, "a list of strings")),
        }
    }

    fn invalid(&self, key: &str, expected: &str) -> RuntimeError {
        RuntimeError::InvalidConfig(
            format!("io.controller '{}': '{key}' must be {expected}", self.kind).into(),
        )
    }
}

/// Owner of the physical side of a set of handles.
///
/// Lifecycle: `set_config`, `init`, repeated `run_loop`, `de_init`.
pub trait DeviceController: Send {
    fn kind(&self) -> &str;

    fn set_config(&mut self, config: &ControllerConfig) -> Result<(), RuntimeError>;

    fn init(&mut self, mapper: &IoMapper) -> Result<(), RuntimeError>;

    /// One poll cycle.
    fn run_loop(&mut self) -> Result<(), RuntimeError>;

    fn de_init(&mut self, mapper: &IoMapper);

    fn init_handle(
        &mut self,
        mapper: &IoMapper,
        descriptor: HandleDescriptor,
    ) -> Result<Arc<IoHandle>, RuntimeError> {
        mapper.register_handle(descriptor)
    }
}

/// Configured controller ready to run.
pub struct ControllerRunner {
    controller: Box<dyn DeviceController>,
    config: ControllerConfig,
}

impl fmt::Debug for ControllerRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerRunner")
            .field("kind", &self.controller.kind())
            .field("config", &self.config)
            .finish()
    }
}

impl ControllerRunner {
    /// Apply `config` to the controller.
    pub fn new(
        mut controller: Box<dyn DeviceController>,
        config: ControllerConfig,
    ) -> Result<Self, RuntimeError> {
        controller.set_config(&config)?;
        Ok(Self { controller, config })
    }

    #[must_use]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Initialize on the calling thread, then poll on a dedicated one.
    pub fn spawn(self, mapper: Arc<IoMapper>) -> Result<ControllerHandle, RuntimeError> {
        let Self {
            mut controller,
            config,
        } = self;
        controller.init(&mapper)?;
        let kind = SmolStr::new(controller.kind());
        info!(controller = %kind, interval = ?config.update_interval, "I/O controller started");

        let stop = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notification::new());
        let stop_thread = stop.clone();
        let wake_thread = wake.clone();
        let interval = config.update_interval;
        let thread_kind = kind.clone();
        let join = thread::Builder::new()
            .name(format!("fbnet-io-{kind}"))
            .spawn(move || {
                while !stop_thread.load(Ordering::SeqCst) {
                    if let Err(error) = controller.run_loop() {
                        warn!(controller = %thread_kind, %error, "I/O cycle failed");
                    }
                    wake_thread.wait(interval);
                }
                controller.de_init(&mapper);
                debug!(controller = %thread_kind, "I/O controller de-initialized");
            })
            .map_err(|err| RuntimeError::ThreadSpawn(err.to_string().into()))?;
        Ok(ControllerHandle {
            kind,
            stop,
            wake,
            join: Some(join),
        })
    }
}

/// Running controller thread.
#[derive(Debug)]
pub struct ControllerHandle {
    kind: SmolStr,
    stop: Arc<AtomicBool>,
    wake: Arc<Notification>,
    join: Option<thread::JoinHandle<()>>,
}

impl ControllerHandle {
    #[must_use]
    pub fn kind(&self) -> &SmolStr {
        &self.kind
    }

    /// Stop polling, run `de_init` and join the thread.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(join) = self.join.take() else {
            return;
        };
        self.stop.store(true, Ordering::SeqCst);
        self.wake.post();
        if join.join().is_err() {
            warn!(controller = %self.kind, "I/O controller thread panicked");
        }
    }
}

impl Drop for ControllerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

type ControllerCreate = fn() -> Box<dyn DeviceController>;

/// Controller kinds available to configuration.
pub struct ControllerRegistry {
    entries: FxHashMap<SmolStr, ControllerCreate>,
}

impl Default for ControllerRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl ControllerRegistry {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register("loopback", create_loopback);
        registry.register_alias("sim", "loopback");
        registry
    }

    pub fn register(&mut self, kind: &str, create: ControllerCreate) {
        self.entries.insert(normalize_kind(kind), create);
    }

    pub fn register_alias(&mut self, alias: &str, target: &str) {
        if let Some(create) = self.entries.get(&normalize_kind(target)).copied() {
            self.entries.insert(normalize_kind(alias), create);
        }
    }

    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.entries.contains_key(&normalize_kind(kind))
    }

    /// Create and configure the controller named by `config.kind`.
    pub fn build(&self, config: ControllerConfig) -> Result<ControllerRunner, RuntimeError> {
        let create = self.entries.get(&normalize_kind(&config.kind)).ok_or_else(|| {
            RuntimeError::InvalidConfig(
                format!("unsupported io.controller kind '{}'", config.kind).into(),
            )
        })?;
        ControllerRunner::new(create(), config)
    }
}

fn create_loopback() -> Box<dyn DeviceController> {
    Box::new(LoopbackController::default())
}

fn normalize_kind(kind: &str) -> SmolStr {
    kind.trim().to_ascii_lowercase().replace('_', "-").into()
}
