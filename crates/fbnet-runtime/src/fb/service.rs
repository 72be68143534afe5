//! Service function blocks forwarding to external collaborators.

use std::fmt;
use std::sync::Arc;

use super::{ExecEnv, PortValues, Trigger};
use crate::error::RuntimeError;
use crate::interface::{EventId, StimulusKey};
use crate::io::IoMapper;
use crate::timer::TimerHandler;
use crate::value::Value;

/// Runtime collaborators reachable from service instances.
#[derive(Clone, Default)]
pub struct Services {
    pub timer: Option<Arc<TimerHandler>>,
    pub io: Option<Arc<IoMapper>>,
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("timer", &self.timer.is_some())
            .field("io", &self.io.is_some())
            .finish()
    }
}

/// View handed to a [`ServiceHandler`] for one execution.
pub struct ServiceIo<'p, 'a> {
    key: StimulusKey,
    ports: &'p mut PortValues<'a>,
    services: &'p Services,
}

impl ServiceIo<'_, '_> {
    /// Key timer and I/O stimuli for this service are registered under.
    #[must_use]
    pub fn key(&self) -> StimulusKey {
        self.key
    }

    pub fn input(&self, name: &str) -> Result<&Value, RuntimeError> {
        self.ports.input(name)
    }

    pub fn output(&self, name: &str) -> Result<&Value, RuntimeError> {
        self.ports.output(name)
    }

    pub fn set_output(&mut self, name: &str, value: &Value) -> Result<(), RuntimeError> {
        self.ports.set_output(name, value)
    }

    /// Resolve an output event by name.
    pub fn event(&self, name: &str) -> Result<EventId, RuntimeError> {
        self.ports
            .event_output(name)
            .ok_or_else(|| RuntimeError::UnknownPort(name.into()))
    }

    /// Name of the triggering input event.
    #[must_use]
    pub fn event_name(&self, event: EventId) -> Option<&str> {
        self.ports
            .interface
            .event_inputs
            .get(usize::from(event.0))
            .map(|decl| decl.name.as_str())
    }

    pub fn timer(&self) -> Result<&Arc<TimerHandler>, RuntimeError> {
        self.services
            .timer
            .as_ref()
            .ok_or_else(|| RuntimeError::Fault("no timer handler attached".into()))
    }

    pub fn io(&self) -> Result<&Arc<IoMapper>, RuntimeError> {
        self.services
            .io
            .as_ref()
            .ok_or_else(|| RuntimeError::Io("no I/O mapper attached".into()))
    }
}

/// External collaborator behind a service instance.
///
/// Each call maps the stimulus to at most one output event.
pub trait ServiceHandler: Send {
    /// Handle an input event after its WITH inputs were refreshed.
    fn on_event(
        &mut self,
        event: EventId,
        io: &mut ServiceIo<'_, '_>,
    ) -> Result<Option<EventId>, RuntimeError>;

    /// Handle a timer or I/O indication.
    fn on_external(&mut self, io: &mut ServiceIo<'_, '_>) -> Result<Option<EventId>, RuntimeError> {
        let _ = io;
        Ok(None)
    }
}

pub struct ServiceFb {
    handler: Box<dyn ServiceHandler>,
}

impl ServiceFb {
    #[must_use]
    pub fn new(handler: Box<dyn ServiceHandler>) -> Self {
        Self { handler }
    }

    pub(crate) fn run(
        &mut self,
        trigger: Trigger,
        ports: &mut PortValues<'_>,
        env: &ExecEnv<'_>,
    ) -> Result<Vec<EventId>, RuntimeError> {
        let mut io = ServiceIo {
            key: env.key(),
            ports,
            services: env.services,
        };
        let fired = match trigger {
            Trigger::Event(event) => self.handler.on_event(event, &mut io)?,
            Trigger::External(_) => self.handler.on_external(&mut io)?,
        };
        Ok(fired.into_iter().collect())
    }
}
