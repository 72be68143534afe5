//! Timer- and I/O-driven service function blocks.

use std::sync::Arc;

use smol_str::SmolStr;

use super::FbTypeRegistry;
use crate::error::RuntimeError;
use crate::fb::{FunctionBlock, ServiceHandler, ServiceIo};
use crate::interface::{EventId, FbInterface};
use crate::io::{IndicationObserver, IoDirection, IoHandle};
use crate::value::{Duration, Value};

pub(super) fn register(registry: &mut FbTypeRegistry) -> Result<(), RuntimeError> {
    let cycle = FbInterface::builder("E_CYCLE")
        .event_input("START", &["DT"])
        .event_input("STOP", &[])
        .event_output("EO", &[])
        .data_input("DT", Value::Time(Duration::ZERO))
        .build_shared()?;
    registry.register(cycle, |name, interface| {
        FunctionBlock::service(name, Arc::clone(interface), Box::new(Cycle::default()))
    })?;

    let delay = FbInterface::builder("E_DELAY")
        .event_input("START", &["DT"])
        .event_input("STOP", &[])
        .event_output("EO", &[])
        .data_input("DT", Value::Time(Duration::ZERO))
        .build_shared()?;
    registry.register(delay, |name, interface| {
        FunctionBlock::service(name, Arc::clone(interface), Box::new(Delay::default()))
    })?;

    let ix = FbInterface::builder("IX")
        .event_input("INIT", &["QI", "PARAMS"])
        .event_input("REQ", &["QI"])
        .event_output("INITO", &["QO", "STATUS"])
        .event_output("CNF", &["QO", "STATUS", "IN"])
        .event_output("IND", &["QO", "STATUS", "IN"])
        .data_input("QI", Value::Bool(false))
        .data_input("PARAMS", Value::from(""))
        .data_output("QO", Value::Bool(false))
        .data_output("STATUS", Value::from(""))
        .data_output("IN", Value::Bool(false))
        .build_shared()?;
    registry.register(ix, |name, interface| {
        FunctionBlock::service(name, Arc::clone(interface), Box::new(InputService::default()))
    })?;

    let qx = FbInterface::builder("QX")
        .event_input("INIT", &["QI", "PARAMS"])
        .event_input("REQ", &["QI", "OUT"])
        .event_output("INITO", &["QO", "STATUS"])
        .event_output("CNF", &["QO", "STATUS"])
        .data_input("QI", Value::Bool(false))
        .data_input("PARAMS", Value::from(""))
        .data_input("OUT", Value::Bool(false))
        .data_output("QO", Value::Bool(false))
        .data_output("STATUS", Value::from(""))
        .build_shared()?;
    registry.register(qx, |name, interface| {
        FunctionBlock::service(name, Arc::clone(interface), Box::new(OutputService::default()))
    })
}

fn interval(io: &ServiceIo<'_, '_>) -> Result<Duration, RuntimeError> {
    io.input("DT")?
        .as_duration()
        .ok_or_else(|| RuntimeError::UnknownPort("DT".into()))
}

/// Periodic EO every DT while started.
#[derive(Debug, Default)]
struct Cycle {
    active: bool,
}

impl ServiceHandler for Cycle {
    fn on_event(
        &mut self,
        event: EventId,
        io: &mut ServiceIo<'_, '_>,
    ) -> Result<Option<EventId>, RuntimeError> {
        let name = io.event_name(event).map(SmolStr::new);
        match name.as_deref() {
            Some("START") => {
                let period = interval(io)?;
                io.timer()?.register_periodic(io.key(), period)?;
                self.active = true;
            }
            Some("STOP") => {
                io.timer()?.unregister(io.key());
                self.active = false;
            }
            _ => {}
        }
        Ok(None)
    }

    fn on_external(&mut self, io: &mut ServiceIo<'_, '_>) -> Result<Option<EventId>, RuntimeError> {
        if !self.active {
            return Ok(None);
        }
        io.event("EO").map(Some)
    }
}

/// Single EO after DT; START while pending is ignored.
#[derive(Debug, Default)]
struct Delay {
    pending: bool,
}

impl ServiceHandler for Delay {
    fn on_event(
        &mut self,
        event: EventId,
        io: &mut ServiceIo<'_, '_>,
    ) -> Result<Option<EventId>, RuntimeError> {
        let name = io.event_name(event).map(SmolStr::new);
        match name.as_deref() {
            Some("START") if !self.pending => {
                let delay = interval(io)?;
                io.timer()?.register_once(io.key(), delay);
                self.pending = true;
            }
            Some("STOP") => {
                io.timer()?.unregister(io.key());
                self.pending = false;
            }
            _ => {}
        }
        Ok(None)
    }

    fn on_external(&mut self, io: &mut ServiceIo<'_, '_>) -> Result<Option<EventId>, RuntimeError> {
        if !std::mem::take(&mut self.pending) {
            return Ok(None);
        }
        io.event("EO").map(Some)
    }
}

fn lookup_handle(
    io: &ServiceIo<'_, '_>,
    direction: IoDirection,
) -> Result<Arc<IoHandle>, RuntimeError> {
    let id = io.input("PARAMS")?.as_str().unwrap_or_default().trim().to_owned();
    let handle = io
        .io()?
        .handle(&id)
        .ok_or_else(|| RuntimeError::UnknownHandle(id.as_str().into()))?;
    if handle.direction() != direction {
        return Err(RuntimeError::Io(
            format!("handle '{id}' has direction {:?}", handle.direction()).into(),
        ));
    }
    Ok(handle)
}

fn report(io: &mut ServiceIo<'_, '_>, result: Result<(), RuntimeError>) -> Result<(), RuntimeError> {
    match result {
        Ok(()) => {
            io.set_output("QO", &Value::Bool(true))?;
            io.set_output("STATUS", &Value::from("OK"))
        }
        Err(error) => {
            io.set_output("QO", &Value::Bool(false))?;
            io.set_output("STATUS", &Value::from(error.to_string().as_str()))
        }
    }
}

/// Boolean input bound to an I/O handle; changes raise IND.
#[derive(Debug, Default)]
struct InputService {
    handle: Option<Arc<IoHandle>>,
}

impl InputService {
    fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.drop_observer();
        }
    }

    fn sample(&self, io: &mut ServiceIo<'_, '_>) -> Result<(), RuntimeError> {
        let handle = self
            .handle
            .as_ref()
            .ok_or_else(|| RuntimeError::Io("not initialized".into()))?;
        io.set_output("IN", &handle.read())
    }
}

impl ServiceHandler for InputService {
    fn on_event(
        &mut self,
        event: EventId,
        io: &mut ServiceIo<'_, '_>,
    ) -> Result<Option<EventId>, RuntimeError> {
        let name = io.event_name(event).map(SmolStr::new);
        match name.as_deref() {
            Some("INIT") => {
                self.release();
                let result = if io.input("QI")?.as_bool() == Some(true) {
                    lookup_handle(io, IoDirection::Input).and_then(|handle| {
                        handle.on_observer(Box::new(IndicationObserver::new(io.key())))?;
                        self.handle = Some(handle);
                        Ok(())
                    })
                } else {
                    Err(RuntimeError::Io("QI is FALSE".into()))
                };
                report(io, result)?;
                io.event("INITO").map(Some)
            }
            Some("REQ") => {
                let result = self.sample(io);
                report(io, result)?;
                io.event("CNF").map(Some)
            }
            _ => Ok(None),
        }
    }

    fn on_external(&mut self, io: &mut ServiceIo<'_, '_>) -> Result<Option<EventId>, RuntimeError> {
        if self.handle.is_none() {
            return Ok(None);
        }
        let result = self.sample(io);
        report(io, result)?;
        io.event("IND").map(Some)
    }
}

impl Drop for InputService {
    fn drop(&mut self) {
        self.release();
    }
}

/// Boolean output written to an I/O handle on REQ.
#[derive(Debug, Default)]
struct OutputService {
    handle: Option<Arc<IoHandle>>,
}

impl ServiceHandler for OutputService {
    fn on_event(
        &mut self,
        event: EventId,
        io: &mut ServiceIo<'_, '_>,
    ) -> Result<Option<EventId>, RuntimeError> {
        let name = io.event_name(event).map(SmolStr::new);
        match name.as_deref() {
            Some("INIT") => {
                self.handle = None;
                let result = if io.input("QI")?.as_bool() == Some(true) {
                    lookup_handle(io, IoDirection::Output).map(|handle| {
                        self.handle = Some(handle);
                    })
                } else {
                    Err(RuntimeError::Io("QI is FALSE".into()))
                };
                report(io, result)?;
                io.event("INITO").map(Some)
            }
            Some("REQ") => {
                let value = io.input("OUT")?.clone();
                let result = self
                    .handle
                    .as_ref()
                    .ok_or_else(|| RuntimeError::Io("not initialized".into()))
                    .and_then(|handle| handle.write(&value));
                report(io, result)?;
                io.event("CNF").map(Some)
            }
            _ => Ok(None),
        }
    }
}
