use fbnet_types::{ElementaryType, StructDef};
use indexmap::IndexMap;
use smol_str::SmolStr;

use super::{Duration, StructValue, Value};
use crate::error::RuntimeError;

/// Zero value of a scalar elementary type.
pub fn default_value(ty: ElementaryType) -> Result<Value, RuntimeError> {
    Ok(match ty {
        ElementaryType::Bool => Value::Bool(false),
        ElementaryType::Byte => Value::Byte(0),
        ElementaryType::Word => Value::Word(0),
        ElementaryType::DWord => Value::DWord(0),
        ElementaryType::LWord => Value::LWord(0),
        ElementaryType::USInt => Value::USInt(0),
        ElementaryType::UInt => Value::UInt(0),
        ElementaryType::UDInt => Value::UDInt(0),
        ElementaryType::ULInt => Value::ULInt(0),
        ElementaryType::SInt => Value::SInt(0),
        ElementaryType::Int => Value::Int(0),
        ElementaryType::DInt => Value::DInt(0),
        ElementaryType::LInt => Value::LInt(0),
        ElementaryType::Real => Value::Real(0.0),
        ElementaryType::LReal => Value::LReal(0.0),
        ElementaryType::Char => Value::Char(0),
        ElementaryType::WChar => Value::WChar(0),
        ElementaryType::String => Value::String(SmolStr::default()),
        ElementaryType::WString => Value::WString(String::new()),
        ElementaryType::Time => Value::Time(Duration::ZERO),
        ElementaryType::LTime => Value::LTime(Duration::ZERO),
        ElementaryType::Array | ElementaryType::Struct => {
            return Err(RuntimeError::UnsupportedType(ty))
        }
    })
}

/// Default struct value with every field zeroed.
pub fn default_struct(def: &StructDef) -> Result<StructValue, RuntimeError> {
    let mut fields = IndexMap::with_capacity(def.fields.len());
    for (name, ty) in &def.fields {
        fields.insert(name.clone(), default_value(*ty)?);
    }
    Ok(StructValue {
        type_name: def.name.clone(),
        fields,
    })
}
