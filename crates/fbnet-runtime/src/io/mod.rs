//! I/O boundary: handles bridging external signals into data ports.
//!
//! Device controllers own the physical side and register one
//! [`IoHandle`] per signal with the [`IoMapper`]. Service instances attach
//! an observer to a handle; an external change the observer cares about
//! becomes a `Trigger::External` stimulus for the observer's instance.

#![allow(missing_docs)]

mod controller;
mod loopback;

use std::fmt;
use std::sync::Arc;

use fbnet_types::ElementaryType;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use smol_str::SmolStr;
use tracing::{debug, warn};

pub use controller::*;
pub use loopback::LoopbackController;

use crate::error::RuntimeError;
use crate::fb::Trigger;
use crate::interface::StimulusKey;
use crate::scheduler::StimulusSink;
use crate::value::{assign, default_value, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoDirection {
    Input,
    Output,
}

impl IoDirection {
    pub fn parse(text: &str) -> Result<Self, RuntimeError> {
        match text.trim().to_ascii_lowercase().as_str() {
            "input" | "in" => Ok(Self::Input),
            "output" | "out" => Ok(Self::Output),
            _ => Err(RuntimeError::InvalidConfig(
                format!("invalid I/O direction '{text}'").into(),
            )),
        }
    }
}

/// Identity of a handle: description id, direction and elementary type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandleDescriptor {
    pub id: SmolStr,
    pub direction: IoDirection,
    pub ty: ElementaryType,
}

impl HandleDescriptor {
    #[must_use]
    pub fn new(id: impl Into<SmolStr>, direction: IoDirection, ty: ElementaryType) -> Self {
        Self {
            id: id.into(),
            direction,
            ty,
        }
    }
}

/// Receiver of handle changes on behalf of one instance.
pub trait IoObserver: Send {
    fn owner(&self) -> StimulusKey;

    /// Return `true` to request an indication for the owner.
    fn on_change(&mut self, value: &Value) -> bool;
}

/// Observer requesting an indication on every change.
#[derive(Debug, Clone, Copy)]
pub struct IndicationObserver {
    owner: StimulusKey,
}

impl IndicationObserver {
    #[must_use]
    pub fn new(owner: impl Into<StimulusKey>) -> Self {
        Self {
            owner: owner.into(),
        }
    }
}

impl IoObserver for IndicationObserver {
    fn owner(&self) -> StimulusKey {
        self.owner
    }

    fn on_change(&mut self, _value: &Value) -> bool {
        true
    }
}

type SinkSlot = Arc<RwLock<Option<Arc<dyn StimulusSink>>>>;

/// One external signal.
pub struct IoHandle {
    descriptor: HandleDescriptor,
    value: Mutex<Value>,
    observer: Mutex<Option<Box<dyn IoObserver>>>,
    sink: SinkSlot,
}

impl fmt::Debug for IoHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoHandle")
            .field("descriptor", &self.descriptor)
            .field("value", &*self.value.lock())
            .field("observed", &self.has_observer())
            .finish()
    }
}

impl IoHandle {
    #[must_use]
    pub fn descriptor(&self) -> &HandleDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn id(&self) -> &SmolStr {
        &self.descriptor.id
    }

    #[must_use]
    pub fn direction(&self) -> IoDirection {
        self.descriptor.direction
    }

    #[must_use]
    pub fn read(&self) -> Value {
        self.value.lock().clone()
    }

    /// Store a value, converting implicitly to the handle type.
    pub fn write(&self, value: &Value) -> Result<(), RuntimeError> {
        assign(&mut self.value.lock(), value)
    }

    /// Attach the single observer.
    pub fn on_observer(&self, observer: Box<dyn IoObserver>) -> Result<(), RuntimeError> {
        let mut slot = self.observer.lock();
        if slot.is_some() {
            return Err(RuntimeError::ObserverAttached(self.descriptor.id.clone()));
        }
        *slot = Some(observer);
        Ok(())
    }

    pub fn drop_observer(&self) -> bool {
        self.observer.lock().take().is_some()
    }

    #[must_use]
    pub fn has_observer(&self) -> bool {
        self.observer.lock().is_some()
    }

    /// External change: store the value and notify the observer.
    ///
    /// Returns whether an indication was routed.
    pub fn on_change(&self, value: &Value) -> Result<bool, RuntimeError> {
        self.write(value)?;
        let current = self.read();
        let mut observer = self.observer.lock();
        let Some(observer) = observer.as_mut() else {
            return Ok(false);
        };
        if !observer.on_change(&current) {
            return Ok(false);
        }
        let owner = observer.owner();
        let Some(sink) = self.sink.read().clone() else {
            warn!(handle = %self.descriptor.id, "indication without a running network");
            return Ok(false);
        };
        sink.post(owner.instance, Trigger::External(owner.path))?;
        Ok(true)
    }
}

/// Registry of live handles.
#[derive(Default)]
pub struct IoMapper {
    handles: RwLock<IndexMap<SmolStr, Arc<IoHandle>>>,
    sink: SinkSlot,
}

impl fmt::Debug for IoMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoMapper")
            .field("handles", &self.handles.read().keys().collect::<Vec<_>>())
            .field("attached", &self.sink.read().is_some())
            .finish()
    }
}

impl IoMapper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route indications into a running network.
    pub fn attach_sink(&self, sink: Arc<dyn StimulusSink>) {
        *self.sink.write() = Some(sink);
    }

    pub fn detach_sink(&self) {
        *self.sink.write() = None;
    }

    pub fn register_handle(&self, descriptor: HandleDescriptor) -> Result<Arc<IoHandle>, RuntimeError> {
        let mut handles = self.handles.write();
        if handles.contains_key(&descriptor.id) {
            return Err(RuntimeError::HandleExists(descriptor.id));
        }
        let value = default_value(descriptor.ty)?;
        let handle = Arc::new(IoHandle {
            value: Mutex::new(value),
            observer: Mutex::new(None),
            sink: self.sink.clone(),
            descriptor,
        });
        debug!(handle = %handle.descriptor.id, direction = ?handle.descriptor.direction, ty = %handle.descriptor.ty, "I/O handle registered");
        handles.insert(handle.descriptor.id.clone(), handle.clone());
        Ok(handle)
    }

    pub fn deregister_handle(&self, id: &str) -> Result<Arc<IoHandle>, RuntimeError> {
        let handle = self
            .handles
            .write()
            .shift_remove(id)
            .ok_or_else(|| RuntimeError::UnknownHandle(id.into()))?;
        handle.drop_observer();
        debug!(handle = %id, "I/O handle deregistered");
        Ok(handle)
    }

    #[must_use]
    pub fn handle(&self, id: &str) -> Option<Arc<IoHandle>> {
        self.handles.read().get(id).cloned()
    }

    #[must_use]
    pub fn handles(&self) -> Vec<Arc<IoHandle>> {
        self.handles.read().values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.read().is_empty()
    }
}
