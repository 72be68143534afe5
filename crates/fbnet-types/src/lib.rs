//! `fbnet-types` - Elementary IEC 61131-3 types and the cast lattice.
//!
//! - **Elementary types**: dense type tags with family and size metadata
//! - **Cast lattice**: the identity/implicit/explicit conversion table
//! - **Registry**: explicit name and struct metadata store
//!
//! # Example
//!
//! ```
//! use fbnet_types::{CastRule, ElementaryType, resolve};
//!
//! assert_eq!(resolve(ElementaryType::Int, ElementaryType::DInt), CastRule::Implicit);
//! assert_eq!(resolve(ElementaryType::DInt, ElementaryType::Int), CastRule::ExplicitOnly);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// Elementary type tags.
#[allow(missing_docs)]
pub mod elementary;
/// Cast lattice and castable-type resolution.
#[allow(missing_docs)]
pub mod lattice;
/// Type name registry.
#[allow(missing_docs)]
pub mod registry;

pub use elementary::{ElementaryType, TypeFamily};
pub use lattice::{castable_type, castable_type_duration_mixed, resolve, CastLattice, CastRule};
pub use registry::{RegistryError, StructDef, TypeInfo, TypeRegistry};
