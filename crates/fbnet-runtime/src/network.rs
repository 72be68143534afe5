//! Network construction: contexts, instances and connections by name.

#![allow(missing_docs)]

use std::sync::Arc;

use indexmap::IndexMap;
use smol_str::SmolStr;
use tracing::debug;

use crate::error::RuntimeError;
use crate::fb::{FunctionBlock, RealTimeConstraints};
use crate::graph::{ConnectionGraph, DataPort, EventPort};
use crate::interface::{ContextId, DataId, FbId};
use crate::io::IoMapper;
use crate::library::FbTypeRegistry;
use crate::scheduler::{Clock, Executor, RunningNetwork, SchedulerConfig};
use crate::value::Value;

/// Split `INSTANCE.PORT`.
pub fn split_path(path: &str) -> Result<(&str, &str), RuntimeError> {
    path.split_once('.')
        .map(|(instance, port)| (instance.trim(), port.trim()))
        .filter(|(instance, port)| !instance.is_empty() && !port.is_empty())
        .ok_or_else(|| RuntimeError::UnknownPort(path.into()))
}

/// Network under construction; structure is mutable until execution.
#[derive(Debug, Default)]
pub struct Network {
    pub(crate) contexts: IndexMap<SmolStr, ContextId>,
    pub(crate) instances: Vec<FunctionBlock>,
    pub(crate) placement: Vec<ContextId>,
    pub(crate) names: IndexMap<SmolStr, FbId>,
    pub(crate) graph: ConnectionGraph,
    pub(crate) io: Arc<IoMapper>,
}

impl Network {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn io(&self) -> &Arc<IoMapper> {
        &self.io
    }

    #[must_use]
    pub fn graph(&self) -> &ConnectionGraph {
        &self.graph
    }

    pub fn add_context(&mut self, name: &str) -> Result<ContextId, RuntimeError> {
        if self.contexts.contains_key(name) {
            return Err(RuntimeError::InvalidConfig(
                format!("duplicate execution context '{name}'").into(),
            ));
        }
        let id = ContextId(u16::try_from(self.contexts.len()).map_err(|_| {
            RuntimeError::InvalidConfig("too many execution contexts".into())
        })?);
        self.contexts.insert(name.into(), id);
        Ok(id)
    }

    #[must_use]
    pub fn context_names(&self) -> Vec<SmolStr> {
        self.contexts.keys().cloned().collect()
    }

    /// Place an instance in a context for its whole lifetime.
    pub fn add_instance(&mut self, context: &str, fb: FunctionBlock) -> Result<FbId, RuntimeError> {
        let context = *self
            .contexts
            .get(context)
            .ok_or_else(|| RuntimeError::UnknownContext(context.into()))?;
        if self.names.contains_key(fb.name()) {
            return Err(RuntimeError::DuplicateInstance(fb.name().clone()));
        }
        let id = FbId(u32::try_from(self.instances.len()).map_err(|_| {
            RuntimeError::InvalidConfig("too many instances".into())
        })?);
        debug!(instance = %fb.name(), ty = %fb.interface().type_name, %id, "instance added");
        self.names.insert(fb.name().clone(), id);
        self.instances.push(fb);
        self.placement.push(context);
        Ok(id)
    }

    /// Instantiate a library type.
    pub fn create_instance(
        &mut self,
        library: &FbTypeRegistry,
        type_name: &str,
        name: &str,
        context: &str,
    ) -> Result<FbId, RuntimeError> {
        let fb = library.create(type_name, name)?;
        self.add_instance(context, fb)
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<FbId> {
        self.names.get(name).copied()
    }

    #[must_use]
    pub fn instance(&self, name: &str) -> Option<&FunctionBlock> {
        self.lookup(name).and_then(|id| self.instances.get(id.index()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Connect `A.EO` to `B.EI`.
    pub fn connect_event(&mut self, src: &str, dst: &str) -> Result<(), RuntimeError> {
        let from = self.event_port(src, true)?;
        let to = self.event_port(dst, false)?;
        self.graph
            .bind_event(from, to)
            .map_err(|err| relabel(err, src, dst))
    }

    pub fn disconnect_event(&mut self, src: &str, dst: &str) -> Result<(), RuntimeError> {
        let from = self.event_port(src, true)?;
        let to = self.event_port(dst, false)?;
        self.graph
            .unbind_event(from, to)
            .map_err(|err| relabel(err, src, dst))
    }

    /// Connect data output `A.OUT` to data input `B.IN`.
    pub fn connect_data(&mut self, src: &str, dst: &str) -> Result<(), RuntimeError> {
        let (from, from_value) = self.data_port(src, true)?;
        let (to, to_value) = self.data_port(dst, false)?;
        self.graph
            .bind_data(from, &from_value, to, &to_value)
            .map_err(|err| relabel(err, src, dst))
    }

    pub fn disconnect_data(&mut self, src: &str, dst: &str) -> Result<(), RuntimeError> {
        let (from, _) = self.data_port(src, true)?;
        let (to, _) = self.data_port(dst, false)?;
        self.graph
            .unbind_data(from, to)
            .map_err(|err| relabel(err, src, dst))
    }

    /// Set an unconnected or initial data input value.
    pub fn set_input(&mut self, path: &str, value: &Value) -> Result<(), RuntimeError> {
        let (instance, port) = split_path(path)?;
        self.instance_mut(instance)?.set_input(port, value)
    }

    pub fn set_realtime(
        &mut self,
        instance: &str,
        constraints: Option<RealTimeConstraints>,
    ) -> Result<(), RuntimeError> {
        self.instance_mut(instance)?.set_realtime(constraints);
        Ok(())
    }

    /// Lock the graph and hand everything to a deterministic executor.
    #[must_use]
    pub fn into_executor(self, config: &SchedulerConfig, clock: Arc<dyn Clock>) -> Executor {
        Executor::new(self, config, clock)
    }

    /// Spawn one scheduling thread per context.
    pub fn start(
        self,
        config: &SchedulerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<RunningNetwork, RuntimeError> {
        self.into_executor(config, clock).spawn()
    }

    fn instance_mut(&mut self, name: &str) -> Result<&mut FunctionBlock, RuntimeError> {
        let id = self
            .lookup(name)
            .ok_or_else(|| RuntimeError::UnknownInstance(name.into()))?;
        Ok(&mut self.instances[id.index()])
    }

    fn resolve(&self, path: &str) -> Result<(FbId, &FunctionBlock, SmolStr), RuntimeError> {
        let (instance, port) = split_path(path)?;
        let id = self
            .lookup(instance)
            .ok_or_else(|| RuntimeError::UnknownInstance(instance.into()))?;
        Ok((id, &self.instances[id.index()], port.into()))
    }

    // Sources are outputs, destinations inputs.
    fn event_port(&self, path: &str, source: bool) -> Result<EventPort, RuntimeError> {
        let (id, fb, port) = self.resolve(path)?;
        let interface = fb.interface();
        let event = if source {
            interface.event_output(&port)
        } else {
            interface.event_input(&port)
        };
        event
            .map(|event| EventPort::fb(id, event))
            .ok_or_else(|| RuntimeError::UnknownPort(path.into()))
    }

    fn data_port(&self, path: &str, source: bool) -> Result<(DataPort, Value), RuntimeError> {
        let (id, fb, port) = self.resolve(path)?;
        let interface = fb.interface();
        let decls = if source {
            &interface.data_outputs
        } else {
            &interface.data_inputs
        };
        let index = decls
            .iter()
            .position(|decl| decl.name == port)
            .ok_or_else(|| RuntimeError::UnknownPort(path.into()))?;
        let data = u16::try_from(index)
            .map(DataId)
            .map_err(|_| RuntimeError::UnknownPort(path.into()))?;
        Ok((DataPort::fb(id, data), decls[index].initial.clone()))
    }
}

fn relabel(error: RuntimeError, src: &str, dst: &str) -> RuntimeError {
    let label = || SmolStr::from(format!("{src} -> {dst}"));
    match error {
        RuntimeError::DuplicateConnection(_) => RuntimeError::DuplicateConnection(label()),
        RuntimeError::NotConnected(_) => RuntimeError::NotConnected(label()),
        RuntimeError::DataInputTaken(_) => RuntimeError::DataInputTaken(dst.into()),
        other => other,
    }
}
