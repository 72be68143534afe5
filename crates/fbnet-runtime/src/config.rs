//! Runtime and network configuration loading.

#![allow(missing_docs)]

use std::path::Path;

use fbnet_types::{ElementaryType, TypeFamily};
use indexmap::IndexMap;
use serde::Deserialize;
use smol_str::SmolStr;
use tracing::debug;

use crate::error::RuntimeError;
use crate::fb::RealTimeConstraints;
use crate::io::ControllerConfig;
use crate::library::FbTypeRegistry;
use crate::network::Network;
use crate::scheduler::SchedulerConfig;
use crate::status::DEFAULT_STATUS_CAPACITY;
use crate::timer::TimerConfig;
use crate::value::{from_literal, parse_typed, Duration, Value};

/// Context created when a network file declares none.
pub const DEFAULT_CONTEXT: &str = "main";

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub name: SmolStr,
    pub log_level: SmolStr,
    pub scheduler: SchedulerConfig,
    pub timer: TimerConfig,
    pub controllers: Vec<ControllerConfig>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            name: SmolStr::new("fbnet"),
            log_level: SmolStr::new("info"),
            scheduler: SchedulerConfig::default(),
            timer: TimerConfig::default(),
            controllers: Vec::new(),
        }
    }
}

impl RuntimeConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|err| RuntimeError::InvalidConfig(format!("runtime.toml: {err}").into()))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, RuntimeError> {
        let raw: RuntimeToml = toml::from_str(text)
            .map_err(|err| RuntimeError::InvalidConfig(format!("runtime.toml: {err}").into()))?;
        raw.into_config()
    }
}

/// Declarative network: contexts, instances and connections.
#[derive(Debug, Clone, Default)]
pub struct NetworkConfig {
    pub contexts: Vec<SmolStr>,
    pub instances: Vec<InstanceConfig>,
    pub event_connections: Vec<ConnectionConfig>,
    pub data_connections: Vec<ConnectionConfig>,
}

#[derive(Debug, Clone)]
pub struct InstanceConfig {
    pub name: SmolStr,
    pub type_name: SmolStr,
    pub context: SmolStr,
    pub inputs: IndexMap<SmolStr, toml::Value>,
    pub realtime: Option<RealTimeConstraints>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub from: SmolStr,
    pub to: SmolStr,
}

impl NetworkConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|err| RuntimeError::InvalidConfig(format!("network.toml: {err}").into()))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, RuntimeError> {
        let raw: NetworkToml = toml::from_str(text)
            .map_err(|err| RuntimeError::InvalidConfig(format!("network.toml: {err}").into()))?;
        raw.into_config()
    }

    /// Instantiate every declared instance and bind every connection.
    ///
    /// Bind errors reject the whole network.
    pub fn build(&self, library: &FbTypeRegistry) -> Result<Network, RuntimeError> {
        let mut network = Network::new();
        if self.contexts.is_empty() {
            network.add_context(DEFAULT_CONTEXT)?;
        }
        for context in &self.contexts {
            network.add_context(context)?;
        }
        for instance in &self.instances {
            network.create_instance(library, &instance.type_name, &instance.name, &instance.context)?;
            let interface = library
                .interface(&instance.type_name)
                .ok_or_else(|| RuntimeError::UnknownFbType(instance.type_name.clone()))?;
            for (port, raw) in &instance.inputs {
                let decl = interface
                    .data_inputs
                    .iter()
                    .find(|decl| decl.name == *port)
                    .ok_or_else(|| {
                        RuntimeError::UnknownPort(format!("{}.{port}", instance.name).into())
                    })?;
                let value = input_value(decl.initial.type_tag(), raw)?;
                network.set_input(&format!("{}.{port}", instance.name), &value)?;
            }
            if instance.realtime.is_some() {
                network.set_realtime(&instance.name, instance.realtime)?;
            }
        }
        for connection in &self.event_connections {
            network.connect_event(&connection.from, &connection.to)?;
        }
        for connection in &self.data_connections {
            network.connect_data(&connection.from, &connection.to)?;
        }
        debug!(
            instances = network.len(),
            event_edges = network.graph().event_edge_count(),
            data_edges = network.graph().data_edge_count(),
            "network built"
        );
        Ok(network)
    }
}

// Unprefixed text is read as a literal of the port's own type.
fn input_value(ty: ElementaryType, raw: &toml::Value) -> Result<Value, RuntimeError> {
    match raw {
        toml::Value::Boolean(flag) => Ok(Value::Bool(*flag)),
        toml::Value::Integer(int) => parse_typed(ty, &int.to_string()),
        toml::Value::Float(float) => parse_typed(ty, &float.to_string()),
        toml::Value::String(text) => match ty.family() {
            TypeFamily::String if !text.trim_start().starts_with(['\'', '"']) => {
                Ok(if ty == ElementaryType::String {
                    Value::from(text.as_str())
                } else {
                    Value::WString(text.clone())
                })
            }
            _ if text.contains('#') || !ty.is_scalar() => from_literal(text),
            _ => parse_typed(ty, text),
        },
        other => Err(RuntimeError::InvalidConfig(
            format!("unsupported input value '{other}'").into(),
        )),
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuntimeToml {
    runtime: Option<RuntimeSection>,
    scheduler: Option<SchedulerSection>,
    timer: Option<TimerSection>,
    io: Option<IoSection>,
}

#[derive(Debug, Deserialize)]
struct RuntimeSection {
    name: Option<String>,
    log_level: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SchedulerSection {
    queue_capacity: Option<usize>,
    status_capacity: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct TimerSection {
    tick_ms: Option<u64>,
    priority: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct IoSection {
    controller: Option<Vec<ControllerSection>>,
}

#[derive(Debug, Deserialize)]
struct ControllerSection {
    kind: String,
    update_interval_ms: Option<u64>,
    params: Option<IndexMap<String, toml::Value>>,
}

impl RuntimeToml {
    fn into_config(self) -> Result<RuntimeConfig, RuntimeError> {
        let defaults = RuntimeConfig::default();
        let runtime = self.runtime.unwrap_or(RuntimeSection {
            name: None,
            log_level: None,
        });
        let scheduler = self.scheduler.unwrap_or(SchedulerSection {
            queue_capacity: None,
            status_capacity: None,
        });
        let queue_capacity = scheduler
            .queue_capacity
            .unwrap_or(defaults.scheduler.queue_capacity);
        if queue_capacity == 0 {
            return Err(RuntimeError::InvalidConfig(
                "scheduler.queue_capacity must be greater than zero".into(),
            ));
        }
        let status_capacity = scheduler.status_capacity.unwrap_or(DEFAULT_STATUS_CAPACITY);
        if status_capacity == 0 {
            return Err(RuntimeError::InvalidConfig(
                "scheduler.status_capacity must be greater than zero".into(),
            ));
        }

        let timer = self.timer.unwrap_or(TimerSection {
            tick_ms: None,
            priority: None,
        });
        let tick = match timer.tick_ms {
            Some(0) => {
                return Err(RuntimeError::InvalidConfig(
                    "timer.tick_ms must be greater than zero".into(),
                ))
            }
            Some(ms) => Duration::from_millis(i64::try_from(ms).map_err(|_| {
                RuntimeError::InvalidConfig(format!("timer.tick_ms out of range: {ms}").into())
            })?),
            None => defaults.timer.tick,
        };

        let controllers = self
            .io
            .and_then(|io| io.controller)
            .unwrap_or_default()
            .into_iter()
            .map(ControllerSection::into_config)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RuntimeConfig {
            name: runtime.name.map_or(defaults.name, SmolStr::new),
            log_level: runtime.log_level.map_or(defaults.log_level, SmolStr::new),
            scheduler: SchedulerConfig {
                queue_capacity,
                status_capacity,
            },
            timer: TimerConfig {
                tick,
                priority: timer.priority.unwrap_or(defaults.timer.priority),
            },
            controllers,
        })
    }
}

impl ControllerSection {
    fn into_config(self) -> Result<ControllerConfig, RuntimeError> {
        let kind = self.kind.trim();
        if kind.is_empty() {
            return Err(RuntimeError::InvalidConfig(
                "io.controller.kind must not be empty".into(),
            ));
        }
        let mut config = ControllerConfig::new(kind);
        match self.update_interval_ms {
            Some(0) => {
                return Err(RuntimeError::InvalidConfig(
                    format!("io.controller '{kind}': update_interval_ms must be greater than zero")
                        .into(),
                ))
            }
            Some(ms) => {
                config = config.with_update_interval(std::time::Duration::from_millis(ms));
            }
            None => {}
        }
        for (key, value) in self.params.unwrap_or_default() {
            config = config.with_param(&key, value);
        }
        Ok(config)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NetworkToml {
    context: Option<Vec<ContextSection>>,
    fb: Option<Vec<FbSection>>,
    connection: Option<ConnectionsSection>,
}

#[derive(Debug, Deserialize)]
struct ContextSection {
    name: String,
}

#[derive(Debug, Deserialize)]
struct FbSection {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
    context: Option<String>,
    inputs: Option<IndexMap<String, toml::Value>>,
    realtime: Option<RealtimeSection>,
}

#[derive(Debug, Deserialize)]
struct RealtimeSection {
    deadline_us: Option<u64>,
    min_interarrival_us: Option<u64>,
    wcet_us: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ConnectionsSection {
    event: Option<Vec<ConnectionSection>>,
    data: Option<Vec<ConnectionSection>>,
}

#[derive(Debug, Deserialize)]
struct ConnectionSection {
    from: String,
    to: String,
}

impl NetworkToml {
    fn into_config(self) -> Result<NetworkConfig, RuntimeError> {
        let contexts = self
            .context
            .unwrap_or_default()
            .into_iter()
            .map(|context| SmolStr::new(context.name.trim()))
            .collect::<Vec<_>>();
        let instances = self
            .fb
            .unwrap_or_default()
            .into_iter()
            .map(|fb| {
                let realtime = fb.realtime.map(RealtimeSection::into_constraints).transpose()?;
                Ok(InstanceConfig {
                    name: SmolStr::new(fb.name.trim()),
                    type_name: SmolStr::new(fb.type_name.trim()),
                    context: fb
                        .context
                        .map_or_else(|| SmolStr::new(DEFAULT_CONTEXT), SmolStr::new),
                    inputs: fb
                        .inputs
                        .unwrap_or_default()
                        .into_iter()
                        .map(|(port, value)| (SmolStr::new(port), value))
                        .collect(),
                    realtime,
                })
            })
            .collect::<Result<Vec<_>, RuntimeError>>()?;
        let (event, data) = self
            .connection
            .map(|section| (section.event, section.data))
            .unwrap_or_default();
        Ok(NetworkConfig {
            contexts,
            instances,
            event_connections: connections(event),
            data_connections: connections(data),
        })
    }
}

impl RealtimeSection {
    fn into_constraints(self) -> Result<RealTimeConstraints, RuntimeError> {
        Ok(RealTimeConstraints {
            deadline: micros(self.deadline_us, "deadline_us")?,
            min_interarrival: micros(self.min_interarrival_us, "min_interarrival_us")?,
            wcet: micros(self.wcet_us, "wcet_us")?,
        })
    }
}

fn micros(value: Option<u64>, key: &str) -> Result<Option<Duration>, RuntimeError> {
    value
        .map(|us| {
            i64::try_from(us).map(Duration::from_micros).map_err(|_| {
                RuntimeError::InvalidConfig(format!("fb.realtime.{key} out of range: {us}").into())
            })
        })
        .transpose()
}

fn connections(raw: Option<Vec<ConnectionSection>>) -> Vec<ConnectionConfig> {
    raw.unwrap_or_default()
        .into_iter()
        .map(|connection| ConnectionConfig {
            from: SmolStr::new(connection.from.trim()),
            to: SmolStr::new(connection.to.trim()),
        })
        .collect()
}
