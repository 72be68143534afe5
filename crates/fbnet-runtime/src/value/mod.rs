//! Runtime values, conversions and the literal text format.

#![allow(missing_docs)]

mod array;
mod cast;
mod defaults;
mod duration;
mod literal;
mod types;

pub use array::*;
pub use cast::{assign, cast_explicit, cast_implicit, check_connection, semantic_eq};
pub use defaults::*;
pub use duration::*;
pub use literal::*;
pub use types::*;
