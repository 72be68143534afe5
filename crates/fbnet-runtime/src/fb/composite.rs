//! Composite function blocks: an owned sub-network drained synchronously.
//!
//! The composite's own ports appear inside the sub-network as
//! [`Endpoint::Boundary`]. An input event enqueues the boundary event's
//! inner destinations and the nested queue is drained breadth-first.
//! Inner events reaching a boundary output event capture the WITH-listed
//! boundary outputs at that moment and are reported as fired.
//!
//! Members run with the composite's environment extended by their member
//! index, so a nested service registers timers and I/O observers under a
//! [`StimulusKey`](crate::interface::StimulusKey) of its own. The resulting
//! `Trigger::External(path)` reaches the top-level composite, which peels
//! one step per level until the service itself runs.

use std::collections::VecDeque;

use indexmap::IndexMap;
use smol_str::SmolStr;

use super::{ExecEnv, FunctionBlock, PortValues, Trigger};
use crate::error::RuntimeError;
use crate::graph::{ConnectionGraph, DataPort, DataSlot, Endpoint, EventPort};
use crate::interface::{DataId, EventId, FbId, FbInterface};
use crate::status::StatusEvent;
use crate::value::{assign, Value};

/// Bound on inner work items per outer trigger.
pub const COMPOSITE_QUEUE_LIMIT: usize = 4096;

/// Sub-network under construction.
#[derive(Debug, Default)]
pub struct CompositeBuilder {
    members: Vec<FunctionBlock>,
    names: IndexMap<SmolStr, FbId>,
    graph: ConnectionGraph,
}

impl CompositeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member instance.
    pub fn member(&mut self, fb: FunctionBlock) -> Result<FbId, RuntimeError> {
        if self.names.contains_key(fb.name()) {
            return Err(RuntimeError::DuplicateInstance(fb.name().clone()));
        }
        let id = FbId(u32::try_from(self.members.len()).map_err(|_| {
            RuntimeError::InvalidConfig("too many composite members".into())
        })?);
        self.names.insert(fb.name().clone(), id);
        self.members.push(fb);
        Ok(id)
    }

    /// Connect events by `INSTANCE.PORT`; a bare `PORT` names the boundary.
    pub fn connect_event(
        &mut self,
        interface: &FbInterface,
        src: &str,
        dst: &str,
    ) -> Result<(), RuntimeError> {
        let src = self.event_port(interface, src, true)?;
        let dst = self.event_port(interface, dst, false)?;
        self.graph.bind_event(src, dst)
    }

    /// Connect data by `INSTANCE.PORT`; a bare `PORT` names the boundary.
    pub fn connect_data(
        &mut self,
        interface: &FbInterface,
        src: &str,
        dst: &str,
    ) -> Result<(), RuntimeError> {
        let (src, src_value) = self.data_port(interface, src, true)?;
        let (dst, dst_value) = self.data_port(interface, dst, false)?;
        self.graph.bind_data(src, &src_value, dst, &dst_value)
    }

    /// Lock the sub-network and wire its members.
    pub fn build(mut self, interface: &FbInterface) -> Result<CompositeFb, RuntimeError> {
        self.graph.lock();
        for (index, member) in self.members.iter_mut().enumerate() {
            let id = FbId(u32::try_from(index).unwrap_or(u32::MAX));
            member.wire(id, &self.graph);
        }
        let input_slots = (0..interface.data_inputs.len())
            .map(|index| {
                data_id(index).and_then(|data| self.graph.source_slot(DataPort::boundary(data)))
            })
            .collect();
        let output_slots = (0..interface.data_outputs.len())
            .map(|index| {
                data_id(index).and_then(|data| self.graph.input_slot(DataPort::boundary(data)))
            })
            .collect();
        Ok(CompositeFb {
            members: self.members,
            names: self.names,
            graph: self.graph,
            input_slots,
            output_slots,
        })
    }

    // Sources are boundary inputs or member outputs; destinations the reverse.
    fn event_port(
        &self,
        interface: &FbInterface,
        text: &str,
        source: bool,
    ) -> Result<EventPort, RuntimeError> {
        let unknown = || RuntimeError::UnknownPort(text.into());
        match text.split_once('.') {
            None => {
                let event = if source {
                    interface.event_input(text)
                } else {
                    interface.event_output(text)
                };
                event.map(EventPort::boundary).ok_or_else(unknown)
            }
            Some((instance, port)) => {
                let id = self.lookup(instance)?;
                let member = self.members[id.index()].interface();
                let event = if source {
                    member.event_output(port)
                } else {
                    member.event_input(port)
                };
                event.map(|event| EventPort::fb(id, event)).ok_or_else(unknown)
            }
        }
    }

    fn data_port(
        &self,
        interface: &FbInterface,
        text: &str,
        source: bool,
    ) -> Result<(DataPort, Value), RuntimeError> {
        let unknown = || RuntimeError::UnknownPort(text.into());
        match text.split_once('.') {
            None => {
                let decls = if source {
                    &interface.data_inputs
                } else {
                    &interface.data_outputs
                };
                let index = decls.iter().position(|decl| decl.name == text).ok_or_else(unknown)?;
                let data = data_id(index).ok_or_else(unknown)?;
                Ok((DataPort::boundary(data), decls[index].initial.clone()))
            }
            Some((instance, port)) => {
                let id = self.lookup(instance)?;
                let member = self.members[id.index()].interface();
                let decls = if source {
                    &member.data_outputs
                } else {
                    &member.data_inputs
                };
                let index = decls.iter().position(|decl| decl.name == port).ok_or_else(unknown)?;
                let data = data_id(index).ok_or_else(unknown)?;
                Ok((DataPort::fb(id, data), decls[index].initial.clone()))
            }
        }
    }

    fn lookup(&self, instance: &str) -> Result<FbId, RuntimeError> {
        self.names
            .get(instance)
            .copied()
            .ok_or_else(|| RuntimeError::UnknownInstance(instance.into()))
    }
}

/// Runtime state of a composite instance.
#[derive(Debug)]
pub struct CompositeFb {
    members: Vec<FunctionBlock>,
    names: IndexMap<SmolStr, FbId>,
    graph: ConnectionGraph,
    input_slots: Vec<Option<DataSlot>>,
    output_slots: Vec<Option<DataSlot>>,
}

impl CompositeFb {
    #[must_use]
    pub fn builder() -> CompositeBuilder {
        CompositeBuilder::new()
    }

    /// Number of member instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[must_use]
    pub fn member(&self, name: &str) -> Option<&FunctionBlock> {
        let id = self.names.get(name)?;
        self.members.get(id.index())
    }

    /// Run a boundary input event, or forward a timer or I/O stimulus to
    /// the member at the head of its path, then drain the inner queue.
    pub(crate) fn run(
        &mut self,
        trigger: Trigger,
        ports: &mut PortValues<'_>,
        env: &ExecEnv<'_>,
    ) -> Result<Vec<EventId>, RuntimeError> {
        let mut queue: VecDeque<(FbId, EventId)> = VecDeque::new();
        let mut fired = Vec::new();
        match trigger {
            Trigger::Event(event) => {
                for (index, slot) in self.input_slots.iter().enumerate() {
                    if let Some(slot) = slot {
                        *slot.lock() = ports.inputs[index].clone();
                    }
                }
                self.route(EventPort::boundary(event), &mut queue, &mut fired, ports)?;
            }
            Trigger::External(path) => {
                // an indication for the composite itself has no receiver
                let Some((id, rest)) = path.split_first() else {
                    return Ok(fired);
                };
                if id.index() >= self.members.len() {
                    tracing::warn!(scope = %env.scope, member = %id, "stimulus for unknown member");
                    return Ok(fired);
                }
                let outputs = self.execute_member(id, Trigger::External(rest), env)?;
                for output in outputs {
                    self.route(EventPort::fb(id, output), &mut queue, &mut fired, ports)?;
                }
            }
        }
        let mut processed = 0usize;
        while let Some((id, inner_event)) = queue.pop_front() {
            processed += 1;
            if processed > COMPOSITE_QUEUE_LIMIT {
                return Err(RuntimeError::ReentrancyOverflow {
                    capacity: COMPOSITE_QUEUE_LIMIT,
                });
            }
            let outputs = self.execute_member(id, Trigger::Event(inner_event), env)?;
            for output in outputs {
                self.route(EventPort::fb(id, output), &mut queue, &mut fired, ports)?;
            }
        }
        Ok(fired)
    }

    // A member fault is reported and turned into its error event; only
    // addressing failures propagate to the composite.
    fn execute_member(
        &mut self,
        id: FbId,
        trigger: Trigger,
        env: &ExecEnv<'_>,
    ) -> Result<Vec<EventId>, RuntimeError> {
        let member = &mut self.members[id.index()];
        let scope = if env.scope.is_empty() {
            member.name().to_string()
        } else {
            format!("{}.{}", env.scope, member.name())
        };
        let child = ExecEnv {
            instance: env.instance,
            path: env.path.child(id)?,
            scope: &scope,
            services: env.services,
            status: env.status,
        };
        match member.execute(trigger, &child) {
            Ok(outputs) => Ok(outputs),
            Err(error) => {
                tracing::warn!(member = %scope, %error, "composite member fault");
                if let Some(status) = env.status {
                    status.emit(StatusEvent::ExecutionFault {
                        instance: scope.as_str().into(),
                        error: error.clone(),
                    });
                }
                Ok(member.record_fault(error).into_iter().collect())
            }
        }
    }

    fn route(
        &self,
        src: EventPort,
        queue: &mut VecDeque<(FbId, EventId)>,
        fired: &mut Vec<EventId>,
        ports: &mut PortValues<'_>,
    ) -> Result<(), RuntimeError> {
        for dst in self.graph.event_destinations(src) {
            match dst.endpoint {
                Endpoint::Fb(id) => queue.push_back((id, dst.event)),
                Endpoint::Boundary => {
                    for data in ports.interface.output_with(dst.event) {
                        let index = usize::from(data.0);
                        if let Some(slot) = &self.output_slots[index] {
                            let value = slot.lock().clone();
                            assign(&mut ports.outputs[index], &value)?;
                        }
                    }
                    fired.push(dst.event);
                }
            }
        }
        Ok(())
    }
}

fn data_id(index: usize) -> Option<DataId> {
    u16::try_from(index).ok().map(DataId)
}
