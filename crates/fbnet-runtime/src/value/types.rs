use fbnet_types::ElementaryType;
use indexmap::IndexMap;
use smol_str::SmolStr;

use super::{ArrayValue, Duration};

/// Runtime value tagged with its elementary type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Byte(u8),
    Word(u16),
    DWord(u32),
    LWord(u64),
    USInt(u8),
    UInt(u16),
    UDInt(u32),
    ULInt(u64),
    SInt(i8),
    Int(i16),
    DInt(i32),
    LInt(i64),
    Real(f32),
    LReal(f64),
    Char(u8),
    WChar(u16),
    String(SmolStr),
    WString(String),
    Time(Duration),
    LTime(Duration),
    Array(ArrayValue),
    Struct(StructValue),
}

/// Struct value with ordered fields.
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    pub type_name: SmolStr,
    pub fields: IndexMap<SmolStr, Value>,
}

impl StructValue {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

impl Value {
    /// Elementary type tag of this value.
    #[must_use]
    pub fn type_tag(&self) -> ElementaryType {
        match self {
            Self::Bool(_) => ElementaryType::Bool,
            Self::Byte(_) => ElementaryType::Byte,
            Self::Word(_) => ElementaryType::Word,
            Self::DWord(_) => ElementaryType::DWord,
            Self::LWord(_) => ElementaryType::LWord,
            Self::USInt(_) => ElementaryType::USInt,
            Self::UInt(_) => ElementaryType::UInt,
            Self::UDInt(_) => ElementaryType::UDInt,
            Self::ULInt(_) => ElementaryType::ULInt,
            Self::SInt(_) => ElementaryType::SInt,
            Self::Int(_) => ElementaryType::Int,
            Self::DInt(_) => ElementaryType::DInt,
            Self::LInt(_) => ElementaryType::LInt,
            Self::Real(_) => ElementaryType::Real,
            Self::LReal(_) => ElementaryType::LReal,
            Self::Char(_) => ElementaryType::Char,
            Self::WChar(_) => ElementaryType::WChar,
            Self::String(_) => ElementaryType::String,
            Self::WString(_) => ElementaryType::WString,
            Self::Time(_) => ElementaryType::Time,
            Self::LTime(_) => ElementaryType::LTime,
            Self::Array(_) => ElementaryType::Array,
            Self::Struct(_) => ElementaryType::Struct,
        }
    }

    /// Integer payload widened to `i128`, booleans as 0/1.
    #[must_use]
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Self::Bool(v) => Some(i128::from(v)),
            Self::USInt(v) => Some(i128::from(v)),
            Self::UInt(v) => Some(i128::from(v)),
            Self::UDInt(v) => Some(i128::from(v)),
            Self::ULInt(v) => Some(i128::from(v)),
            Self::SInt(v) => Some(i128::from(v)),
            Self::Int(v) => Some(i128::from(v)),
            Self::DInt(v) => Some(i128::from(v)),
            Self::LInt(v) => Some(i128::from(v)),
            _ => None,
        }
    }

    /// Raw bits of a bit-string payload.
    #[must_use]
    pub fn as_bits(&self) -> Option<u64> {
        match *self {
            Self::Byte(v) => Some(u64::from(v)),
            Self::Word(v) => Some(u64::from(v)),
            Self::DWord(v) => Some(u64::from(v)),
            Self::LWord(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_duration(&self) -> Option<Duration> {
        match *self {
            Self::Time(v) | Self::LTime(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// Text of a STRING value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self {
            Self::Array(array) => Some(array),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i16> for Value {
    fn from(value: i16) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::DInt(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::LInt(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Self::ULInt(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::LReal(value)
    }
}

impl From<Duration> for Value {
    fn from(value: Duration) -> Self {
        Self::Time(value)
    }
}

impl From<ArrayValue> for Value {
    fn from(value: ArrayValue) -> Self {
        Self::Array(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.into())
    }
}
