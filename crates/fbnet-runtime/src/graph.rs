//! Connection graph between function block ports.
//!
//! Event connections fan out to an ordered destination list that is fixed
//! at bind time. Data connections own one shared value slot per source
//! port: the source publishes into it, each destination reads from it.

#![allow(missing_docs)]

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::RuntimeError;
use crate::interface::{DataId, EventId, FbId};
use crate::value::{check_connection, Value};

/// Owner of a port: an instance, or the enclosing composite's interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Fb(FbId),
    Boundary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventPort {
    pub endpoint: Endpoint,
    pub event: EventId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataPort {
    pub endpoint: Endpoint,
    pub data: DataId,
}

impl EventPort {
    #[must_use]
    pub fn fb(fb: FbId, event: EventId) -> Self {
        Self {
            endpoint: Endpoint::Fb(fb),
            event,
        }
    }

    #[must_use]
    pub fn boundary(event: EventId) -> Self {
        Self {
            endpoint: Endpoint::Boundary,
            event,
        }
    }
}

impl DataPort {
    #[must_use]
    pub fn fb(fb: FbId, data: DataId) -> Self {
        Self {
            endpoint: Endpoint::Fb(fb),
            data,
        }
    }

    #[must_use]
    pub fn boundary(data: DataId) -> Self {
        Self {
            endpoint: Endpoint::Boundary,
            data,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fb(id) => write!(f, "{id}"),
            Self::Boundary => f.write_str("boundary"),
        }
    }
}

impl fmt::Display for EventPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.e{}", self.endpoint, self.event.0)
    }
}

impl fmt::Display for DataPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.d{}", self.endpoint, self.data.0)
    }
}

/// Shared value cell of one data connection source.
pub type DataSlot = Arc<Mutex<Value>>;

#[derive(Debug)]
struct DataConnection {
    slot: DataSlot,
    destinations: Vec<DataPort>,
}

#[derive(Debug, Default)]
pub struct ConnectionGraph {
    event_edges: IndexMap<EventPort, Vec<EventPort>>,
    data_edges: IndexMap<DataPort, DataConnection>,
    writers: FxHashMap<DataPort, DataPort>,
    locked: bool,
}

impl ConnectionGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Freeze the structure for execution.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// Allow structural mutation again; all contexts must be quiesced.
    pub fn unlock(&mut self) {
        self.locked = false;
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    fn ensure_unlocked(&self) -> Result<(), RuntimeError> {
        if self.locked {
            Err(RuntimeError::NetworkRunning)
        } else {
            Ok(())
        }
    }

    /// Append `dst` to the ordered destination list of `src`.
    pub fn bind_event(&mut self, src: EventPort, dst: EventPort) -> Result<(), RuntimeError> {
        self.ensure_unlocked()?;
        let destinations = self.event_edges.entry(src).or_default();
        if destinations.contains(&dst) {
            return Err(RuntimeError::DuplicateConnection(
                format!("{src} -> {dst}").into(),
            ));
        }
        destinations.push(dst);
        Ok(())
    }

    /// Remove exactly one event edge.
    pub fn unbind_event(&mut self, src: EventPort, dst: EventPort) -> Result<(), RuntimeError> {
        self.ensure_unlocked()?;
        let missing = || RuntimeError::NotConnected(format!("{src} -> {dst}").into());
        let destinations = self.event_edges.get_mut(&src).ok_or_else(missing)?;
        let position = destinations
            .iter()
            .position(|port| *port == dst)
            .ok_or_else(missing)?;
        destinations.remove(position);
        if destinations.is_empty() {
            self.event_edges.shift_remove(&src);
        }
        Ok(())
    }

    /// Connect a data output to a data input.
    ///
    /// `src_value` and `dst_value` carry the declared port types; the
    /// source type must be implicitly castable to the destination type.
    pub fn bind_data(
        &mut self,
        src: DataPort,
        src_value: &Value,
        dst: DataPort,
        dst_value: &Value,
    ) -> Result<(), RuntimeError> {
        self.ensure_unlocked()?;
        if let Some(writer) = self.writers.get(&dst) {
            let label = format!("{src} -> {dst}").into();
            return Err(if *writer == src {
                RuntimeError::DuplicateConnection(label)
            } else {
                RuntimeError::DataInputTaken(dst.to_string().into())
            });
        }
        check_connection(src_value, dst_value)?;
        self.data_edges
            .entry(src)
            .or_insert_with(|| DataConnection {
                slot: Arc::new(Mutex::new(src_value.clone())),
                destinations: Vec::new(),
            })
            .destinations
            .push(dst);
        self.writers.insert(dst, src);
        Ok(())
    }

    /// Remove exactly one data edge.
    pub fn unbind_data(&mut self, src: DataPort, dst: DataPort) -> Result<(), RuntimeError> {
        self.ensure_unlocked()?;
        let missing = || RuntimeError::NotConnected(format!("{src} -> {dst}").into());
        if self.writers.get(&dst) != Some(&src) {
            return Err(missing());
        }
        let connection = self.data_edges.get_mut(&src).ok_or_else(missing)?;
        connection.destinations.retain(|port| *port != dst);
        if connection.destinations.is_empty() {
            self.data_edges.shift_remove(&src);
        }
        self.writers.remove(&dst);
        Ok(())
    }

    /// Ordered destinations of an output event.
    #[must_use]
    pub fn event_destinations(&self, src: EventPort) -> &[EventPort] {
        self.event_edges.get(&src).map_or(&[], Vec::as_slice)
    }

    /// Slot a data output publishes into, if connected.
    #[must_use]
    pub fn source_slot(&self, src: DataPort) -> Option<DataSlot> {
        self.data_edges.get(&src).map(|conn| conn.slot.clone())
    }

    /// Slot a data input reads from, if connected.
    #[must_use]
    pub fn input_slot(&self, dst: DataPort) -> Option<DataSlot> {
        let src = self.writers.get(&dst)?;
        self.source_slot(*src)
    }

    /// Number of event edges.
    #[must_use]
    pub fn event_edge_count(&self) -> usize {
        self.event_edges.values().map(Vec::len).sum()
    }

    /// Number of data edges.
    #[must_use]
    pub fn data_edge_count(&self) -> usize {
        self.writers.len()
    }
}
