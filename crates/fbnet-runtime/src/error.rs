//! Runtime errors.

#![allow(missing_docs)]

use fbnet_types::ElementaryType;
use smol_str::SmolStr;
use thiserror::Error;

/// Errors raised while building or executing a function block network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// Bind-time connection between incompatible port types.
    #[error("cannot connect {from} to {to}")]
    TypeError {
        from: ElementaryType,
        to: ElementaryType,
    },

    /// Array index outside the declared bounds.
    #[error("array index {index} out of bounds [{lower}..{upper}]")]
    RangeError { index: i64, lower: i64, upper: i64 },

    /// Malformed literal text.
    #[error("invalid literal '{0}'")]
    ParseError(SmolStr),

    /// Illegal runtime value conversion.
    #[error("cannot convert {from} to {to}")]
    ConversionError {
        from: ElementaryType,
        to: ElementaryType,
    },

    /// The edge is already bound.
    #[error("connection {0} already exists")]
    DuplicateConnection(SmolStr),

    /// The ready queue bound was exceeded.
    #[error("ready queue overflow (capacity {capacity})")]
    ReentrancyOverflow { capacity: usize },

    /// Array bounds with `upper < lower - 1`.
    #[error("invalid array bounds [{lower}..{upper}]")]
    InvalidBounds { lower: i64, upper: i64 },

    /// Bounds of a fixed array cannot change.
    #[error("array has fixed bounds")]
    FixedBounds,

    /// The edge to unbind does not exist.
    #[error("connection {0} does not exist")]
    NotConnected(SmolStr),

    /// The destination data input already has a writer.
    #[error("data input {0} already has a writer")]
    DataInputTaken(SmolStr),

    /// Structural mutation attempted while the network executes.
    #[error("network is running")]
    NetworkRunning,

    #[error("unknown function block instance '{0}'")]
    UnknownInstance(SmolStr),

    #[error("unknown port '{0}'")]
    UnknownPort(SmolStr),

    #[error("unknown function block type '{0}'")]
    UnknownFbType(SmolStr),

    #[error("unknown execution context '{0}'")]
    UnknownContext(SmolStr),

    /// An instance name is already in use.
    #[error("duplicate instance '{0}'")]
    DuplicateInstance(SmolStr),

    /// Value kind not supported in this position.
    #[error("unsupported type {0}")]
    UnsupportedType(ElementaryType),

    /// Struct values of different types.
    #[error("struct type mismatch: expected {expected}, got {got}")]
    StructMismatch { expected: SmolStr, got: SmolStr },

    /// ECC kept firing event-less transitions past its step limit.
    #[error("execution control chart exceeded {limit} steps")]
    EccLoop { limit: usize },

    /// Algorithm or service reported a failure.
    #[error("function block fault: {0}")]
    Fault(SmolStr),

    /// The I/O handle already has an observer.
    #[error("I/O handle '{0}' already has an observer")]
    ObserverAttached(SmolStr),

    #[error("unknown I/O handle '{0}'")]
    UnknownHandle(SmolStr),

    #[error("I/O handle '{0}' already registered")]
    HandleExists(SmolStr),

    /// I/O controller failure.
    #[error("I/O controller error: {0}")]
    Io(SmolStr),

    /// Execution context no longer accepts work.
    #[error("execution context stopped")]
    ContextStopped,

    /// Thread spawn failure.
    #[error("thread spawn failed: {0}")]
    ThreadSpawn(SmolStr),

    /// Invalid configuration.
    #[error("invalid config: {0}")]
    InvalidConfig(SmolStr),
}

impl RuntimeError {
    /// Errors fatal to the owning execution context.
    #[must_use]
    pub fn is_context_fatal(&self) -> bool {
        matches!(self, Self::ReentrancyOverflow { .. })
    }
}
