//! Explicit type registry.
//!
//! Holds name and size metadata for elementary types and user struct
//! definitions. Created once at startup and torn down with
//! [`TypeRegistry::clear`].

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use thiserror::Error;

use crate::elementary::ElementaryType;

/// Registry errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("type '{0}' is already registered")]
    Duplicate(SmolStr),
    #[error("struct '{name}' field '{field}' must be a scalar elementary type")]
    InvalidField { name: SmolStr, field: SmolStr },
    #[error("struct '{0}' has no fields")]
    EmptyStruct(SmolStr),
}

/// Struct type definition with ordered scalar fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDef {
    pub name: SmolStr,
    pub fields: IndexMap<SmolStr, ElementaryType>,
}

impl StructDef {
    #[must_use]
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<SmolStr>, ty: ElementaryType) -> Self {
        self.fields.insert(name.into(), ty);
        self
    }

    /// Sum of the fixed-size field sizes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.fields.values().map(|ty| ty.size_bytes()).sum()
    }
}

/// Registered type metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub name: SmolStr,
    pub tag: ElementaryType,
    pub size: usize,
    pub def: Option<StructDef>,
}

/// Name-keyed type registry.
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    types: FxHashMap<SmolStr, TypeInfo>,
}

impl TypeRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with every elementary type.
    #[must_use]
    pub fn with_elementary() -> Self {
        let mut registry = Self::new();
        for ty in ElementaryType::ALL {
            let name = SmolStr::new(ty.name());
            registry.types.insert(
                name.clone(),
                TypeInfo {
                    name,
                    tag: ty,
                    size: ty.size_bytes(),
                    def: None,
                },
            );
        }
        registry
    }

    /// Register a struct definition.
    pub fn register_struct(&mut self, def: StructDef) -> Result<(), RegistryError> {
        if def.fields.is_empty() {
            return Err(RegistryError::EmptyStruct(def.name));
        }
        if let Some((field, _)) = def.fields.iter().find(|(_, ty)| !ty.is_scalar()) {
            return Err(RegistryError::InvalidField {
                name: def.name.clone(),
                field: field.clone(),
            });
        }
        let key = key(&def.name);
        if self.types.contains_key(&key) {
            return Err(RegistryError::Duplicate(def.name));
        }
        self.types.insert(
            key,
            TypeInfo {
                name: def.name.clone(),
                tag: ElementaryType::Struct,
                size: def.size_bytes(),
                def: Some(def),
            },
        );
        Ok(())
    }

    /// Case-insensitive lookup.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TypeInfo> {
        self.types.get(&key(name))
    }

    #[must_use]
    pub fn struct_def(&self, name: &str) -> Option<&StructDef> {
        self.get(name).and_then(|info| info.def.as_ref())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Drop every registration.
    pub fn clear(&mut self) {
        self.types.clear();
    }
}

fn key(name: &str) -> SmolStr {
    SmolStr::new(name.to_ascii_uppercase())
}
