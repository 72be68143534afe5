//! `fbnet-runtime` - Event-driven IEC 61131-3 function block network runtime.
//!
//! - **Values**: typed scalars, windowed arrays and the literal format
//! - **Networks**: typed event and data connections between FB instances
//! - **Scheduling**: FIFO event chains per execution context
//! - **Boundaries**: timer and I/O handle collaborators
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use fbnet_runtime::library::FbTypeRegistry;
//! use fbnet_runtime::scheduler::{SchedulerConfig, StdClock};
//! use fbnet_runtime::Network;
//!
//! let library = FbTypeRegistry::standard().unwrap();
//! let mut network = Network::new();
//! network.add_context("main").unwrap();
//! network.create_instance(&library, "E_SPLIT", "SPLIT", "main").unwrap();
//! network.create_instance(&library, "E_CTU", "COUNT", "main").unwrap();
//! network.connect_event("SPLIT.EO1", "COUNT.CU").unwrap();
//! network.connect_event("SPLIT.EO2", "COUNT.CU").unwrap();
//!
//! let executor = network.into_executor(&SchedulerConfig::default(), Arc::new(StdClock::new()));
//! executor.inject("SPLIT.EI").unwrap();
//! executor.run_until_idle();
//! assert_eq!(executor.output("COUNT.CV").unwrap(), fbnet_runtime::Value::UInt(2));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// Runtime and network configuration files.
pub mod config;
/// Runtime errors.
pub mod error;
/// Function block instances and their variants.
pub mod fb;
/// Event and data connections.
pub mod graph;
/// Port declarations and identifiers.
pub mod interface;
/// I/O handle boundary and device controllers.
pub mod io;
/// Standard function block types.
pub mod library;
/// Network construction.
pub mod network;
/// Event chain scheduling and execution contexts.
pub mod scheduler;
/// Monitoring status events.
pub mod status;
/// Timer boundary.
pub mod timer;
/// Values, arrays and literals.
pub mod value;

pub use error::RuntimeError;
pub use fb::{FunctionBlock, RealTimeConstraints, Trigger};
pub use interface::{ContextId, DataId, EventId, FbId, FbInterface, MemberPath, StimulusKey};
pub use network::Network;
pub use scheduler::{Executor, RunningNetwork};
pub use status::StatusEvent;
pub use value::{Duration, Value};
