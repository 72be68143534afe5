//! Function block interfaces: event and data port declarations.

#![allow(missing_docs)]

use std::fmt;
use std::sync::Arc;

use smol_str::SmolStr;

use crate::error::RuntimeError;
use crate::value::Value;

/// Index of an event port within its direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub u16);

/// Index of a data port within its direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataId(pub u16);

/// Function block instance id, dense within one network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FbId(pub u32);

/// Execution context id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub u16);

impl FbId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fb{}", self.0)
    }
}

/// Deepest composite nesting a timer or I/O stimulus can be routed through.
pub const MAX_MEMBER_DEPTH: usize = 8;

/// Member indices leading from a top-level instance down to a nested one.
///
/// Unused steps stay zero so equality and hashing only see the live prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MemberPath {
    depth: u8,
    steps: [u32; MAX_MEMBER_DEPTH],
}

impl MemberPath {
    /// The top-level instance itself.
    pub const ROOT: Self = Self {
        depth: 0,
        steps: [0; MAX_MEMBER_DEPTH],
    };

    #[must_use]
    pub fn is_root(self) -> bool {
        self.depth == 0
    }

    #[must_use]
    pub fn depth(self) -> usize {
        usize::from(self.depth)
    }

    /// Path one level further down, through composite member `member`.
    pub fn child(self, member: FbId) -> Result<Self, RuntimeError> {
        let depth = self.depth();
        if depth >= MAX_MEMBER_DEPTH {
            return Err(RuntimeError::InvalidConfig(
                format!("composite nesting deeper than {MAX_MEMBER_DEPTH}").into(),
            ));
        }
        let mut next = self;
        next.steps[depth] = member.0;
        next.depth += 1;
        Ok(next)
    }

    /// First member step and the remaining path below it.
    #[must_use]
    pub fn split_first(self) -> Option<(FbId, Self)> {
        let depth = self.depth();
        if depth == 0 {
            return None;
        }
        let mut rest = Self::ROOT;
        rest.steps[..depth - 1].copy_from_slice(&self.steps[1..depth]);
        rest.depth = self.depth - 1;
        Some((FbId(self.steps[0]), rest))
    }
}

impl fmt::Display for MemberPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps[..self.depth()] {
            write!(f, "/{step}")?;
        }
        Ok(())
    }
}

/// Registration key of a timer or I/O stimulus: the top-level instance the
/// scheduler dispatches to plus the member path below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StimulusKey {
    pub instance: FbId,
    pub path: MemberPath,
}

impl From<FbId> for StimulusKey {
    fn from(instance: FbId) -> Self {
        Self {
            instance,
            path: MemberPath::ROOT,
        }
    }
}

impl fmt::Display for StimulusKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.instance, self.path)
    }
}

/// Event port with its WITH list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDecl {
    pub name: SmolStr,
    pub with: Vec<DataId>,
}

/// Data port with its declared type carried by the initial value.
#[derive(Debug, Clone, PartialEq)]
pub struct DataDecl {
    pub name: SmolStr,
    pub initial: Value,
}

/// Port declarations of a function block type.
#[derive(Debug, Clone, PartialEq)]
pub struct FbInterface {
    pub type_name: SmolStr,
    pub event_inputs: Vec<EventDecl>,
    pub event_outputs: Vec<EventDecl>,
    pub data_inputs: Vec<DataDecl>,
    pub data_outputs: Vec<DataDecl>,
    /// Output event fired when executing an input event fails.
    pub error_event: Option<EventId>,
}

impl FbInterface {
    #[must_use]
    pub fn builder(type_name: impl Into<SmolStr>) -> InterfaceBuilder {
        InterfaceBuilder {
            type_name: type_name.into(),
            event_inputs: Vec::new(),
            event_outputs: Vec::new(),
            data_inputs: Vec::new(),
            data_outputs: Vec::new(),
            error_event: None,
        }
    }

    #[must_use]
    pub fn event_input(&self, name: &str) -> Option<EventId> {
        find(&self.event_inputs, |decl| decl.name == name).map(EventId)
    }

    #[must_use]
    pub fn event_output(&self, name: &str) -> Option<EventId> {
        find(&self.event_outputs, |decl| decl.name == name).map(EventId)
    }

    #[must_use]
    pub fn data_input(&self, name: &str) -> Option<DataId> {
        find(&self.data_inputs, |decl| decl.name == name).map(DataId)
    }

    #[must_use]
    pub fn data_output(&self, name: &str) -> Option<DataId> {
        find(&self.data_outputs, |decl| decl.name == name).map(DataId)
    }

    /// WITH list of an input event.
    #[must_use]
    pub fn input_with(&self, event: EventId) -> &[DataId] {
        self.event_inputs
            .get(usize::from(event.0))
            .map_or(&[], |decl| decl.with.as_slice())
    }

    /// WITH list of an output event.
    #[must_use]
    pub fn output_with(&self, event: EventId) -> &[DataId] {
        self.event_outputs
            .get(usize::from(event.0))
            .map_or(&[], |decl| decl.with.as_slice())
    }

    /// Initial values for all data inputs.
    #[must_use]
    pub fn initial_inputs(&self) -> Vec<Value> {
        self.data_inputs.iter().map(|decl| decl.initial.clone()).collect()
    }

    /// Initial values for all data outputs.
    #[must_use]
    pub fn initial_outputs(&self) -> Vec<Value> {
        self.data_outputs.iter().map(|decl| decl.initial.clone()).collect()
    }
}

fn find<T>(items: &[T], pred: impl Fn(&T) -> bool) -> Option<u16> {
    items
        .iter()
        .position(pred)
        .and_then(|index| u16::try_from(index).ok())
}

/// Builder resolving WITH lists by name.
#[derive(Debug, Clone)]
pub struct InterfaceBuilder {
    type_name: SmolStr,
    event_inputs: Vec<(SmolStr, Vec<SmolStr>)>,
    event_outputs: Vec<(SmolStr, Vec<SmolStr>)>,
    data_inputs: Vec<DataDecl>,
    data_outputs: Vec<DataDecl>,
    error_event: Option<SmolStr>,
}

impl InterfaceBuilder {
    #[must_use]
    pub fn event_input(mut self, name: &str, with: &[&str]) -> Self {
        self.event_inputs.push((name.into(), with.iter().map(|w| SmolStr::new(w)).collect()));
        self
    }

    #[must_use]
    pub fn event_output(mut self, name: &str, with: &[&str]) -> Self {
        self.event_outputs.push((name.into(), with.iter().map(|w| SmolStr::new(w)).collect()));
        self
    }

    #[must_use]
    pub fn data_input(mut self, name: &str, initial: Value) -> Self {
        self.data_inputs.push(DataDecl {
            name: name.into(),
            initial,
        });
        self
    }

    #[must_use]
    pub fn data_output(mut self, name: &str, initial: Value) -> Self {
        self.data_outputs.push(DataDecl {
            name: name.into(),
            initial,
        });
        self
    }

    /// Declare an output event as the error path.
    #[must_use]
    pub fn error_event(mut self, name: &str) -> Self {
        self.error_event = Some(name.into());
        self
    }

    pub fn build(self) -> Result<FbInterface, RuntimeError> {
        let resolve = |events: Vec<(SmolStr, Vec<SmolStr>)>, data: &[DataDecl]| {
            events
                .into_iter()
                .map(|(name, with)| {
                    let with = with
                        .iter()
                        .map(|port| {
                            find(data, |decl| decl.name == *port)
                                .map(DataId)
                                .ok_or_else(|| RuntimeError::UnknownPort(port.clone()))
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok::<_, RuntimeError>(EventDecl { name, with })
                })
                .collect::<Result<Vec<_>, _>>()
        };
        let event_inputs = resolve(self.event_inputs, &self.data_inputs)?;
        let event_outputs = resolve(self.event_outputs, &self.data_outputs)?;
        let error_event = match self.error_event {
            Some(name) => Some(
                find(&event_outputs, |decl| decl.name == name)
                    .map(EventId)
                    .ok_or(RuntimeError::UnknownPort(name))?,
            ),
            None => None,
        };
        Ok(FbInterface {
            type_name: self.type_name,
            event_inputs,
            event_outputs,
            data_inputs: self.data_inputs,
            data_outputs: self.data_outputs,
            error_event,
        })
    }

    /// Build and wrap in an `Arc` for sharing between instances.
    pub fn build_shared(self) -> Result<Arc<FbInterface>, RuntimeError> {
        self.build().map(Arc::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_path_walks_down_and_back() {
        let path = MemberPath::ROOT.child(FbId(2)).unwrap().child(FbId(5)).unwrap();
        assert_eq!(path.depth(), 2);
        assert_eq!(path.to_string(), "/2/5");

        let (first, rest) = path.split_first().unwrap();
        assert_eq!(first, FbId(2));
        assert_eq!(rest, MemberPath::ROOT.child(FbId(5)).unwrap());
        let (second, rest) = rest.split_first().unwrap();
        assert_eq!(second, FbId(5));
        assert!(rest.is_root());
        assert_eq!(rest, MemberPath::ROOT);
        assert!(rest.split_first().is_none());
    }

    #[test]
    fn member_path_depth_is_bounded() {
        let mut path = MemberPath::ROOT;
        for step in 0..MAX_MEMBER_DEPTH {
            path = path.child(FbId(u32::try_from(step).unwrap())).unwrap();
        }
        assert!(matches!(path.child(FbId(0)), Err(RuntimeError::InvalidConfig(_))));
    }

    #[test]
    fn sibling_members_get_distinct_keys() {
        let first = StimulusKey {
            instance: FbId(1),
            path: MemberPath::ROOT.child(FbId(0)).unwrap(),
        };
        let second = StimulusKey {
            instance: FbId(1),
            path: MemberPath::ROOT.child(FbId(1)).unwrap(),
        };
        assert_ne!(first, second);
        assert_ne!(first, StimulusKey::from(FbId(1)));
    }
}
