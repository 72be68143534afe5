//! Standard function block types.

#![allow(missing_docs)]

mod events;
mod services;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::error::RuntimeError;
use crate::fb::{Ecc, FunctionBlock};
use crate::interface::FbInterface;

/// Instance constructor of one FB type.
pub type FbFactory = Arc<dyn Fn(&str, &Arc<FbInterface>) -> FunctionBlock + Send + Sync>;

#[derive(Clone)]
struct FbType {
    interface: Arc<FbInterface>,
    factory: FbFactory,
}

/// FB type name to constructor map, keyed case-insensitively.
#[derive(Clone, Default)]
pub struct FbTypeRegistry {
    types: IndexMap<SmolStr, FbType>,
}

impl fmt::Debug for FbTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.types.values().map(|ty| &ty.interface.type_name))
            .finish()
    }
}

impl FbTypeRegistry {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the event, conversion, timer and I/O types.
    pub fn standard() -> Result<Self, RuntimeError> {
        let mut registry = Self::empty();
        events::register(&mut registry)?;
        services::register(&mut registry)?;
        Ok(registry)
    }

    pub fn register<F>(&mut self, interface: Arc<FbInterface>, factory: F) -> Result<(), RuntimeError>
    where
        F: Fn(&str, &Arc<FbInterface>) -> FunctionBlock + Send + Sync + 'static,
    {
        let key = key(&interface.type_name);
        if self.types.contains_key(&key) {
            return Err(RuntimeError::InvalidConfig(
                format!("FB type '{}' already registered", interface.type_name).into(),
            ));
        }
        let factory: FbFactory = Arc::new(factory);
        self.types.insert(key, FbType { interface, factory });
        Ok(())
    }

    /// Register a basic type; every instance shares the chart.
    pub fn register_basic(&mut self, interface: Arc<FbInterface>, ecc: Ecc) -> Result<(), RuntimeError> {
        let ecc = Arc::new(ecc);
        self.register(interface, move |name, interface| {
            FunctionBlock::basic(name, Arc::clone(interface), Arc::clone(&ecc))
        })
    }

    pub fn create(&self, type_name: &str, instance: &str) -> Result<FunctionBlock, RuntimeError> {
        let ty = self
            .types
            .get(&key(type_name))
            .ok_or_else(|| RuntimeError::UnknownFbType(type_name.into()))?;
        Ok((ty.factory)(instance, &ty.interface))
    }

    #[must_use]
    pub fn interface(&self, type_name: &str) -> Option<&Arc<FbInterface>> {
        self.types.get(&key(type_name)).map(|ty| &ty.interface)
    }

    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(&key(type_name))
    }

    /// Registered type names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &SmolStr> {
        self.types.values().map(|ty| &ty.interface.type_name)
    }
}

fn key(name: &str) -> SmolStr {
    name.trim().to_ascii_uppercase().into()
}
