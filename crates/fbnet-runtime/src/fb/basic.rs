//! Basic function blocks: execution control charts (ECC).
//!
//! The active state's outgoing transitions are evaluated in declaration
//! order and the first one whose event and guard both match fires. The
//! triggering event is consumed by that first transition; event-less
//! transitions keep firing from the new state until none matches.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use smol_str::SmolStr;

use super::{PortValues, Trigger};
use crate::error::RuntimeError;
use crate::interface::{EventId, FbInterface};
use crate::value::{assign, Value};

/// Default bound on transitions taken for one trigger.
pub const DEFAULT_ECC_STEP_LIMIT: usize = 64;

/// Algorithm body: reads inputs, updates variables and outputs.
pub type Algorithm =
    Arc<dyn Fn(&mut AlgorithmContext<'_, '_>) -> Result<(), RuntimeError> + Send + Sync>;

/// Transition guard over the current inputs, outputs and variables.
pub type Guard = Arc<dyn Fn(&GuardContext<'_>) -> bool + Send + Sync>;

/// Entry action of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EccAction {
    pub algorithm: Option<usize>,
    pub output: Option<EventId>,
}

#[derive(Debug, Clone)]
pub struct EccState {
    pub name: SmolStr,
    pub actions: Vec<EccAction>,
}

#[derive(Clone)]
pub struct EccTransition {
    pub from: usize,
    pub to: usize,
    pub event: Option<EventId>,
    pub guard: Option<Guard>,
}

impl fmt::Debug for EccTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EccTransition")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("event", &self.event)
            .field("guarded", &self.guard.is_some())
            .finish()
    }
}

/// Immutable chart shared by all instances of a basic FB type.
pub struct Ecc {
    states: Vec<EccState>,
    transitions: Vec<EccTransition>,
    algorithms: Vec<(SmolStr, Algorithm)>,
    vars: IndexMap<SmolStr, Value>,
    step_limit: usize,
}

impl fmt::Debug for Ecc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ecc")
            .field("states", &self.states)
            .field("transitions", &self.transitions)
            .field("algorithms", &self.algorithms.iter().map(|(name, _)| name).collect::<Vec<_>>())
            .field("vars", &self.vars)
            .field("step_limit", &self.step_limit)
            .finish()
    }
}

impl Ecc {
    /// Start a chart for `interface`; the first declared state is initial.
    #[must_use]
    pub fn builder(interface: &Arc<FbInterface>) -> EccBuilder {
        EccBuilder {
            interface: Arc::clone(interface),
            states: Vec::new(),
            transitions: Vec::new(),
            algorithms: Vec::new(),
            vars: IndexMap::new(),
            step_limit: DEFAULT_ECC_STEP_LIMIT,
        }
    }

    #[must_use]
    pub fn states(&self) -> &[EccState] {
        &self.states
    }

    #[must_use]
    pub fn transitions(&self) -> &[EccTransition] {
        &self.transitions
    }

    #[must_use]
    pub fn step_limit(&self) -> usize {
        self.step_limit
    }
}

type PendingAction = (Option<SmolStr>, Option<SmolStr>);
type PendingTransition = (SmolStr, SmolStr, Option<SmolStr>, Option<Guard>);

/// Name-based chart builder.
pub struct EccBuilder {
    interface: Arc<FbInterface>,
    states: Vec<(SmolStr, Vec<PendingAction>)>,
    transitions: Vec<PendingTransition>,
    algorithms: Vec<(SmolStr, Algorithm)>,
    vars: IndexMap<SmolStr, Value>,
    step_limit: usize,
}

impl EccBuilder {
    /// State without entry actions.
    #[must_use]
    pub fn state(mut self, name: &str) -> Self {
        self.states.push((name.into(), Vec::new()));
        self
    }

    /// State with `(algorithm, output event)` entry actions.
    #[must_use]
    pub fn state_with(mut self, name: &str, actions: &[(Option<&str>, Option<&str>)]) -> Self {
        let actions = actions
            .iter()
            .map(|(alg, out)| (alg.map(SmolStr::new), out.map(SmolStr::new)))
            .collect();
        self.states.push((name.into(), actions));
        self
    }

    #[must_use]
    pub fn algorithm<F>(mut self, name: &str, body: F) -> Self
    where
        F: Fn(&mut AlgorithmContext<'_, '_>) -> Result<(), RuntimeError> + Send + Sync + 'static,
    {
        let body: Algorithm = Arc::new(body);
        self.algorithms.push((name.into(), body));
        self
    }

    /// Internal variable with its initial value.
    #[must_use]
    pub fn var(mut self, name: &str, initial: Value) -> Self {
        self.vars.insert(name.into(), initial);
        self
    }

    /// Transition on an input event, or event-less when `event` is `None`.
    #[must_use]
    pub fn transition(mut self, from: &str, to: &str, event: Option<&str>) -> Self {
        self.transitions
            .push((from.into(), to.into(), event.map(SmolStr::new), None));
        self
    }

    #[must_use]
    pub fn guarded<G>(mut self, from: &str, to: &str, event: Option<&str>, guard: G) -> Self
    where
        G: Fn(&GuardContext<'_>) -> bool + Send + Sync + 'static,
    {
        let guard: Guard = Arc::new(guard);
        self.transitions
            .push((from.into(), to.into(), event.map(SmolStr::new), Some(guard)));
        self
    }

    #[must_use]
    pub fn step_limit(mut self, limit: usize) -> Self {
        self.step_limit = limit.max(1);
        self
    }

    pub fn build(self) -> Result<Ecc, RuntimeError> {
        let unknown = |name: &SmolStr| RuntimeError::UnknownPort(name.clone());
        let state_index = |name: &SmolStr| {
            self.states
                .iter()
                .position(|(state, _)| state == name)
                .ok_or_else(|| unknown(name))
        };
        if self.states.is_empty() {
            return Err(RuntimeError::InvalidConfig("ECC has no states".into()));
        }
        let mut states = Vec::with_capacity(self.states.len());
        for (name, actions) in &self.states {
            let actions = actions
                .iter()
                .map(|(alg, out)| {
                    let algorithm = alg
                        .as_ref()
                        .map(|alg| {
                            self.algorithms
                                .iter()
                                .position(|(name, _)| name == alg)
                                .ok_or_else(|| unknown(alg))
                        })
                        .transpose()?;
                    let output = out
                        .as_ref()
                        .map(|out| self.interface.event_output(out).ok_or_else(|| unknown(out)))
                        .transpose()?;
                    Ok::<_, RuntimeError>(EccAction { algorithm, output })
                })
                .collect::<Result<Vec<_>, _>>()?;
            states.push(EccState {
                name: name.clone(),
                actions,
            });
        }
        let mut transitions = Vec::with_capacity(self.transitions.len());
        for (from, to, event, guard) in &self.transitions {
            let event = event
                .as_ref()
                .map(|event| self.interface.event_input(event).ok_or_else(|| unknown(event)))
                .transpose()?;
            transitions.push(EccTransition {
                from: state_index(from)?,
                to: state_index(to)?,
                event,
                guard: guard.clone(),
            });
        }
        Ok(Ecc {
            states,
            transitions,
            algorithms: self.algorithms,
            vars: self.vars,
            step_limit: self.step_limit,
        })
    }
}

/// Read-only view for guards.
pub struct GuardContext<'a> {
    ports: &'a PortValues<'a>,
    vars: &'a IndexMap<SmolStr, Value>,
}

impl GuardContext<'_> {
    pub fn input(&self, name: &str) -> Result<&Value, RuntimeError> {
        self.ports.input(name)
    }

    pub fn output(&self, name: &str) -> Result<&Value, RuntimeError> {
        self.ports.output(name)
    }

    pub fn var(&self, name: &str) -> Result<&Value, RuntimeError> {
        self.vars
            .get(name)
            .ok_or_else(|| RuntimeError::UnknownPort(name.into()))
    }

    /// Boolean input, `false` when missing or not BOOL.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.input(name).ok().and_then(Value::as_bool).unwrap_or(false)
    }
}

/// Mutable view for algorithms.
pub struct AlgorithmContext<'p, 'a> {
    ports: &'p mut PortValues<'a>,
    vars: &'p mut IndexMap<SmolStr, Value>,
}

impl AlgorithmContext<'_, '_> {
    pub fn input(&self, name: &str) -> Result<&Value, RuntimeError> {
        self.ports.input(name)
    }

    pub fn output(&self, name: &str) -> Result<&Value, RuntimeError> {
        self.ports.output(name)
    }

    pub fn var(&self, name: &str) -> Result<&Value, RuntimeError> {
        self.vars
            .get(name)
            .ok_or_else(|| RuntimeError::UnknownPort(name.into()))
    }

    pub fn set_output(&mut self, name: &str, value: &Value) -> Result<(), RuntimeError> {
        self.ports.set_output(name, value)
    }

    pub fn set_var(&mut self, name: &str, value: &Value) -> Result<(), RuntimeError> {
        let slot = self
            .vars
            .get_mut(name)
            .ok_or_else(|| RuntimeError::UnknownPort(name.into()))?;
        assign(slot, value)
    }
}

/// Runtime state of one basic instance.
#[derive(Debug)]
pub struct BasicFb {
    ecc: Arc<Ecc>,
    state: usize,
    vars: IndexMap<SmolStr, Value>,
}

impl BasicFb {
    #[must_use]
    pub fn new(ecc: Arc<Ecc>) -> Self {
        Self {
            vars: ecc.vars.clone(),
            ecc,
            state: 0,
        }
    }

    #[must_use]
    pub fn state_name(&self) -> &str {
        &self.ecc.states[self.state].name
    }

    #[must_use]
    pub fn var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub(crate) fn run(
        &mut self,
        trigger: Trigger,
        ports: &mut PortValues<'_>,
    ) -> Result<Vec<EventId>, RuntimeError> {
        let ecc = Arc::clone(&self.ecc);
        let mut pending = match trigger {
            Trigger::Event(event) => Some(event),
            Trigger::External(_) => None,
        };
        let mut fired = Vec::new();
        let mut failure = None;
        let mut steps = 0usize;
        loop {
            let next = {
                let view = GuardContext {
                    ports: &*ports,
                    vars: &self.vars,
                };
                ecc.transitions.iter().find(|transition| {
                    transition.from == self.state
                        && transition.event.map_or(true, |event| pending == Some(event))
                        && transition.guard.as_ref().map_or(true, |guard| guard(&view))
                })
            };
            let Some(transition) = next else {
                break;
            };
            steps += 1;
            if steps > ecc.step_limit {
                return Err(RuntimeError::EccLoop {
                    limit: ecc.step_limit,
                });
            }
            pending = None;
            self.state = transition.to;
            // After a failed algorithm the chart settles without running actions.
            if failure.is_some() {
                continue;
            }
            for action in &ecc.states[self.state].actions {
                if let Some(index) = action.algorithm {
                    let mut ctx = AlgorithmContext {
                        ports: &mut *ports,
                        vars: &mut self.vars,
                    };
                    if let Err(error) = (ecc.algorithms[index].1)(&mut ctx) {
                        failure = Some(error);
                        break;
                    }
                }
                if let Some(event) = action.output {
                    fired.push(event);
                }
            }
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(fired),
        }
    }
}
