//! Function block instances.
//!
//! An instance owns its port values and one of three behaviors: a basic
//! execution control chart, a composite sub-network, or a service
//! collaborator. Executing an input event refreshes the event's WITH
//! inputs, runs the behavior and publishes the WITH outputs of every
//! fired output event.

#![allow(missing_docs)]

mod basic;
mod composite;
mod service;

use std::sync::Arc;

use smol_str::SmolStr;

pub use basic::*;
pub use composite::*;
pub use service::*;

use crate::error::RuntimeError;
use crate::graph::{ConnectionGraph, DataPort, DataSlot};
use crate::interface::{DataId, EventId, FbId, FbInterface, MemberPath, StimulusKey};
use crate::status::StatusSink;
use crate::value::{assign, Duration, Value};

/// What caused an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// An input event arrived through the connection graph or injection.
    Event(EventId),
    /// A timer or I/O indication for the service at this member path.
    External(MemberPath),
}

/// Advisory timing metadata for time-sensitive instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RealTimeConstraints {
    /// Maximum time from stimulus arrival to completion.
    pub deadline: Option<Duration>,
    /// Minimum time between two activations.
    pub min_interarrival: Option<Duration>,
    /// Worst-case execution time budget.
    pub wcet: Option<Duration>,
}

/// Behavior variant.
pub enum FbKind {
    Basic(BasicFb),
    Composite(Box<CompositeFb>),
    Service(ServiceFb),
}

impl std::fmt::Debug for FbKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic(fb) => f.debug_tuple("Basic").field(&fb.state_name()).finish(),
            Self::Composite(fb) => f.debug_tuple("Composite").field(&fb.len()).finish(),
            Self::Service(_) => f.write_str("Service"),
        }
    }
}

/// Per-execution environment handed down by the scheduler.
///
/// Composites narrow it for each member: `path` and `scope` then name the
/// member relative to the top-level `instance`.
#[derive(Clone, Copy)]
pub struct ExecEnv<'a> {
    pub instance: FbId,
    pub path: MemberPath,
    /// Qualified instance name used in diagnostics.
    pub scope: &'a str,
    pub services: &'a Services,
    pub status: Option<&'a StatusSink>,
}

impl<'a> ExecEnv<'a> {
    #[must_use]
    pub fn new(instance: FbId, services: &'a Services) -> Self {
        Self {
            instance,
            path: MemberPath::ROOT,
            scope: "",
            services,
            status: None,
        }
    }

    #[must_use]
    pub fn with_scope(mut self, scope: &'a str) -> Self {
        self.scope = scope;
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: &'a StatusSink) -> Self {
        self.status = Some(status);
        self
    }

    /// Key under which a service at this position registers stimuli.
    #[must_use]
    pub fn key(&self) -> StimulusKey {
        StimulusKey {
            instance: self.instance,
            path: self.path,
        }
    }
}

/// Executable function block instance.
#[derive(Debug)]
pub struct FunctionBlock {
    name: SmolStr,
    interface: Arc<FbInterface>,
    inputs: Vec<Value>,
    outputs: Vec<Value>,
    kind: FbKind,
    input_slots: Vec<Option<DataSlot>>,
    output_slots: Vec<Option<DataSlot>>,
    realtime: Option<RealTimeConstraints>,
    last_activation: Option<Duration>,
    fault: Option<RuntimeError>,
}

impl FunctionBlock {
    fn new(name: impl Into<SmolStr>, interface: Arc<FbInterface>, kind: FbKind) -> Self {
        Self {
            name: name.into(),
            inputs: interface.initial_inputs(),
            outputs: interface.initial_outputs(),
            input_slots: vec![None; interface.data_inputs.len()],
            output_slots: vec![None; interface.data_outputs.len()],
            interface,
            kind,
            realtime: None,
            last_activation: None,
            fault: None,
        }
    }

    /// Instance driven by an execution control chart.
    #[must_use]
    pub fn basic(name: impl Into<SmolStr>, interface: Arc<FbInterface>, ecc: Arc<Ecc>) -> Self {
        let kind = FbKind::Basic(BasicFb::new(ecc));
        Self::new(name, interface, kind)
    }

    /// Instance delegating to an internal sub-network.
    #[must_use]
    pub fn composite(
        name: impl Into<SmolStr>,
        interface: Arc<FbInterface>,
        network: CompositeFb,
    ) -> Self {
        Self::new(name, interface, FbKind::Composite(Box::new(network)))
    }

    /// Instance forwarding to an external collaborator.
    #[must_use]
    pub fn service(
        name: impl Into<SmolStr>,
        interface: Arc<FbInterface>,
        handler: Box<dyn ServiceHandler>,
    ) -> Self {
        Self::new(name, interface, FbKind::Service(ServiceFb::new(handler)))
    }

    #[must_use]
    pub fn with_realtime(mut self, constraints: RealTimeConstraints) -> Self {
        self.realtime = Some(constraints);
        self
    }

    pub fn set_realtime(&mut self, constraints: Option<RealTimeConstraints>) {
        self.realtime = constraints;
    }

    #[must_use]
    pub fn name(&self) -> &SmolStr {
        &self.name
    }

    #[must_use]
    pub fn interface(&self) -> &Arc<FbInterface> {
        &self.interface
    }

    #[must_use]
    pub fn kind(&self) -> &FbKind {
        &self.kind
    }

    #[must_use]
    pub fn realtime(&self) -> Option<RealTimeConstraints> {
        self.realtime
    }

    /// Active ECC state for basic instances.
    #[must_use]
    pub fn state_name(&self) -> Option<&str> {
        match &self.kind {
            FbKind::Basic(fb) => Some(fb.state_name()),
            _ => None,
        }
    }

    /// Internal variable of a basic instance.
    #[must_use]
    pub fn var(&self, name: &str) -> Option<&Value> {
        match &self.kind {
            FbKind::Basic(fb) => fb.var(name),
            _ => None,
        }
    }

    /// Last per-event error, cleared by the next successful execution.
    #[must_use]
    pub fn fault(&self) -> Option<&RuntimeError> {
        self.fault.as_ref()
    }

    #[must_use]
    pub fn input(&self, name: &str) -> Option<&Value> {
        let id = self.interface.data_input(name)?;
        self.inputs.get(usize::from(id.0))
    }

    #[must_use]
    pub fn output(&self, name: &str) -> Option<&Value> {
        let id = self.interface.data_output(name)?;
        self.outputs.get(usize::from(id.0))
    }

    /// Set a data input, keeping its declared type.
    pub fn set_input(&mut self, name: &str, value: &Value) -> Result<(), RuntimeError> {
        let id = self
            .interface
            .data_input(name)
            .ok_or_else(|| RuntimeError::UnknownPort(name.into()))?;
        assign(&mut self.inputs[usize::from(id.0)], value)
    }

    /// Resolve the data slots this instance reads and publishes.
    pub fn wire(&mut self, id: FbId, graph: &ConnectionGraph) {
        for (index, slot) in self.input_slots.iter_mut().enumerate() {
            *slot = data_id(index).and_then(|data| graph.input_slot(DataPort::fb(id, data)));
        }
        for (index, slot) in self.output_slots.iter_mut().enumerate() {
            *slot = data_id(index).and_then(|data| graph.source_slot(DataPort::fb(id, data)));
        }
    }

    /// Run one trigger and return the fired output events in order.
    pub fn execute(
        &mut self,
        trigger: Trigger,
        env: &ExecEnv<'_>,
    ) -> Result<Vec<EventId>, RuntimeError> {
        if let Trigger::Event(event) = trigger {
            if usize::from(event.0) >= self.interface.event_inputs.len() {
                return Err(RuntimeError::UnknownPort(format!("{}.e{}", self.name, event.0).into()));
            }
            self.refresh_inputs(event)?;
        }
        let mut ports = PortValues {
            interface: &self.interface,
            inputs: &self.inputs,
            outputs: &mut self.outputs,
        };
        let fired = match &mut self.kind {
            FbKind::Basic(fb) => fb.run(trigger, &mut ports)?,
            FbKind::Composite(fb) => fb.run(trigger, &mut ports, env)?,
            FbKind::Service(fb) => fb.run(trigger, &mut ports, env)?,
        };
        for event in &fired {
            self.publish_outputs(*event);
        }
        self.fault = None;
        Ok(fired)
    }

    /// Record a failed execution; returns the error event to fire.
    pub fn record_fault(&mut self, error: RuntimeError) -> Option<EventId> {
        self.fault = Some(error);
        let event = self.interface.error_event?;
        self.publish_outputs(event);
        Some(event)
    }

    /// Store the activation time, returning the previous one.
    pub(crate) fn activate(&mut self, now: Duration) -> Option<Duration> {
        self.last_activation.replace(now)
    }

    fn refresh_inputs(&mut self, event: EventId) -> Result<(), RuntimeError> {
        for data in self.interface.input_with(event) {
            let index = usize::from(data.0);
            if let Some(slot) = &self.input_slots[index] {
                let value = slot.lock().clone();
                assign(&mut self.inputs[index], &value)?;
            }
        }
        Ok(())
    }

    fn publish_outputs(&self, event: EventId) {
        for data in self.interface.output_with(event) {
            let index = usize::from(data.0);
            if let Some(slot) = &self.output_slots[index] {
                *slot.lock() = self.outputs[index].clone();
            }
        }
    }
}

fn data_id(index: usize) -> Option<DataId> {
    u16::try_from(index).ok().map(DataId)
}

/// Borrowed port values of an executing instance.
pub struct PortValues<'a> {
    pub interface: &'a FbInterface,
    pub inputs: &'a [Value],
    pub outputs: &'a mut [Value],
}

impl PortValues<'_> {
    pub fn input(&self, name: &str) -> Result<&Value, RuntimeError> {
        self.interface
            .data_input(name)
            .map(|id| &self.inputs[usize::from(id.0)])
            .ok_or_else(|| RuntimeError::UnknownPort(name.into()))
    }

    pub fn output(&self, name: &str) -> Result<&Value, RuntimeError> {
        self.interface
            .data_output(name)
            .map(|id| &self.outputs[usize::from(id.0)])
            .ok_or_else(|| RuntimeError::UnknownPort(name.into()))
    }

    /// Assign an output, converting implicitly to its declared type.
    pub fn set_output(&mut self, name: &str, value: &Value) -> Result<(), RuntimeError> {
        let id = self
            .interface
            .data_output(name)
            .ok_or_else(|| RuntimeError::UnknownPort(name.into()))?;
        assign(&mut self.outputs[usize::from(id.0)], value)
    }

    #[must_use]
    pub fn event_output(&self, name: &str) -> Option<EventId> {
        self.interface.event_output(name)
    }
}
