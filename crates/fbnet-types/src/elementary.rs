//! Elementary type tags and their families.

use std::fmt;

/// Elementary IEC 61131-3 type tag.
///
/// The discriminant is the dense ordinal used to index the cast table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ElementaryType {
    Bool = 0,
    Byte,
    Word,
    DWord,
    LWord,
    USInt,
    UInt,
    UDInt,
    ULInt,
    SInt,
    Int,
    DInt,
    LInt,
    Real,
    LReal,
    Char,
    WChar,
    String,
    WString,
    Time,
    LTime,
    Array,
    Struct,
}

/// Coarse grouping of elementary types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeFamily {
    Bool,
    BitString,
    Unsigned,
    Signed,
    Float,
    Char,
    String,
    Duration,
    Aggregate,
}

impl ElementaryType {
    /// Number of type tags.
    pub const COUNT: usize = 23;

    /// All tags in ordinal order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Bool,
        Self::Byte,
        Self::Word,
        Self::DWord,
        Self::LWord,
        Self::USInt,
        Self::UInt,
        Self::UDInt,
        Self::ULInt,
        Self::SInt,
        Self::Int,
        Self::DInt,
        Self::LInt,
        Self::Real,
        Self::LReal,
        Self::Char,
        Self::WChar,
        Self::String,
        Self::WString,
        Self::Time,
        Self::LTime,
        Self::Array,
        Self::Struct,
    ];

    #[must_use]
    pub const fn ordinal(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn from_ordinal(ordinal: usize) -> Option<Self> {
        Self::ALL.get(ordinal).copied()
    }

    /// Canonical IEC name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "BOOL",
            Self::Byte => "BYTE",
            Self::Word => "WORD",
            Self::DWord => "DWORD",
            Self::LWord => "LWORD",
            Self::USInt => "USINT",
            Self::UInt => "UINT",
            Self::UDInt => "UDINT",
            Self::ULInt => "ULINT",
            Self::SInt => "SINT",
            Self::Int => "INT",
            Self::DInt => "DINT",
            Self::LInt => "LINT",
            Self::Real => "REAL",
            Self::LReal => "LREAL",
            Self::Char => "CHAR",
            Self::WChar => "WCHAR",
            Self::String => "STRING",
            Self::WString => "WSTRING",
            Self::Time => "TIME",
            Self::LTime => "LTIME",
            Self::Array => "ARRAY",
            Self::Struct => "STRUCT",
        }
    }

    /// Case-insensitive lookup by IEC name or literal prefix alias.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase();
        let ty = match upper.as_str() {
            "T" => Self::Time,
            "LT" => Self::LTime,
            other => return Self::ALL.iter().copied().find(|ty| ty.name() == other),
        };
        Some(ty)
    }

    #[must_use]
    pub const fn family(self) -> TypeFamily {
        match self {
            Self::Bool => TypeFamily::Bool,
            Self::Byte | Self::Word | Self::DWord | Self::LWord => TypeFamily::BitString,
            Self::USInt | Self::UInt | Self::UDInt | Self::ULInt => TypeFamily::Unsigned,
            Self::SInt | Self::Int | Self::DInt | Self::LInt => TypeFamily::Signed,
            Self::Real | Self::LReal => TypeFamily::Float,
            Self::Char | Self::WChar => TypeFamily::Char,
            Self::String | Self::WString => TypeFamily::String,
            Self::Time | Self::LTime => TypeFamily::Duration,
            Self::Array | Self::Struct => TypeFamily::Aggregate,
        }
    }

    /// Width in bits for fixed-size scalars.
    #[must_use]
    pub const fn bit_width(self) -> Option<u32> {
        match self {
            Self::Bool => Some(1),
            Self::Byte | Self::USInt | Self::SInt | Self::Char => Some(8),
            Self::Word | Self::UInt | Self::Int | Self::WChar => Some(16),
            Self::DWord | Self::UDInt | Self::DInt | Self::Real => Some(32),
            Self::LWord | Self::ULInt | Self::LInt | Self::LReal | Self::Time | Self::LTime => {
                Some(64)
            }
            Self::String | Self::WString | Self::Array | Self::Struct => None,
        }
    }

    /// Storage size in bytes; variable-size types report zero.
    #[must_use]
    pub const fn size_bytes(self) -> usize {
        match self.bit_width() {
            Some(1) => 1,
            Some(bits) => bits as usize / 8,
            None => 0,
        }
    }

    #[must_use]
    pub const fn is_bit_string(self) -> bool {
        matches!(self.family(), TypeFamily::BitString)
    }

    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self.family(), TypeFamily::Unsigned | TypeFamily::Signed)
    }

    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self.family(), TypeFamily::Float)
    }

    /// ANY_NUM: integers and floats.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    #[must_use]
    pub const fn is_duration(self) -> bool {
        matches!(self.family(), TypeFamily::Duration)
    }

    /// Scalar types may be array elements and data port types.
    #[must_use]
    pub const fn is_scalar(self) -> bool {
        !matches!(self.family(), TypeFamily::Aggregate)
    }

    /// True for the 64-bit types gated behind the `wide-types` feature.
    #[must_use]
    pub const fn is_wide(self) -> bool {
        matches!(
            self,
            Self::LWord | Self::ULInt | Self::LInt | Self::LReal | Self::LTime
        )
    }
}

impl fmt::Display for ElementaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_are_dense() {
        for (index, ty) in ElementaryType::ALL.iter().enumerate() {
            assert_eq!(ty.ordinal(), index);
            assert_eq!(ElementaryType::from_ordinal(index), Some(*ty));
        }
        assert_eq!(ElementaryType::from_ordinal(ElementaryType::COUNT), None);
    }

    #[test]
    fn names_resolve_case_insensitively() {
        assert_eq!(ElementaryType::from_name("udint"), Some(ElementaryType::UDInt));
        assert_eq!(ElementaryType::from_name("T"), Some(ElementaryType::Time));
        assert_eq!(ElementaryType::from_name("lt"), Some(ElementaryType::LTime));
        assert_eq!(ElementaryType::from_name("DATE"), None);
    }
}
