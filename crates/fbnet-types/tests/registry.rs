use fbnet_types::{ElementaryType, RegistryError, StructDef, TypeRegistry};

#[test]
fn elementary_types_are_preregistered() {
    let registry = TypeRegistry::with_elementary();
    assert_eq!(registry.len(), ElementaryType::COUNT);
    let info = registry.get("dint").expect("DINT registered");
    assert_eq!(info.tag, ElementaryType::DInt);
    assert_eq!(info.size, 4);
    assert_eq!(registry.get("LREAL").map(|info| info.size), Some(8));
    assert_eq!(registry.get("BOOL").map(|info| info.size), Some(1));
}

#[test]
fn structs_register_once() {
    let mut registry = TypeRegistry::with_elementary();
    let def = StructDef::new("Point")
        .field("X", ElementaryType::Int)
        .field("Y", ElementaryType::Int);
    registry.register_struct(def.clone()).expect("register");
    assert_eq!(registry.get("POINT").map(|info| info.size), Some(4));
    assert_eq!(registry.struct_def("point"), Some(&def));
    assert_eq!(
        registry.register_struct(def),
        Err(RegistryError::Duplicate("Point".into()))
    );
}

#[test]
fn struct_fields_must_be_scalar() {
    let mut registry = TypeRegistry::new();
    let err = registry
        .register_struct(StructDef::new("Bad").field("A", ElementaryType::Array))
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidField { .. }));
    assert_eq!(
        registry.register_struct(StructDef::new("Empty")),
        Err(RegistryError::EmptyStruct("Empty".into()))
    );
}

#[test]
fn clear_tears_down_registrations() {
    let mut registry = TypeRegistry::with_elementary();
    registry.clear();
    assert!(registry.is_empty());
    assert!(registry.get("INT").is_none());
}
