//! Value conversions driven by the cast lattice.

use fbnet_types::{castable_type, resolve, CastRule, ElementaryType, TypeFamily};

use super::Value;
use crate::error::RuntimeError;

/// Convert along an identity or implicit edge. Never loses information.
pub fn cast_implicit(value: &Value, to: ElementaryType) -> Result<Value, RuntimeError> {
    let from = value.type_tag();
    match resolve(from, to) {
        CastRule::Identity => Ok(value.clone()),
        CastRule::Implicit => convert(value, to),
        CastRule::ExplicitOnly | CastRule::Invalid => {
            Err(RuntimeError::ConversionError { from, to })
        }
    }
}

/// Convert along any lattice edge, accepting narrowing.
///
/// Bit-string targets keep the low bits. Integer targets are range
/// checked, floats round half to even. DWORD/REAL and LWORD/LREAL
/// reinterpret the bit pattern.
pub fn cast_explicit(value: &Value, to: ElementaryType) -> Result<Value, RuntimeError> {
    let from = value.type_tag();
    match resolve(from, to) {
        CastRule::Identity => Ok(value.clone()),
        CastRule::Implicit | CastRule::ExplicitOnly => convert(value, to),
        CastRule::Invalid => Err(RuntimeError::ConversionError { from, to }),
    }
}

/// Assign `src` into `dst` in place, keeping the destination type.
pub fn assign(dst: &mut Value, src: &Value) -> Result<(), RuntimeError> {
    match (dst, src) {
        (Value::Array(target), Value::Array(source)) => target.assign(source),
        (Value::Array(_), other) => Err(RuntimeError::ConversionError {
            from: other.type_tag(),
            to: ElementaryType::Array,
        }),
        (Value::Struct(target), Value::Struct(source)) => {
            if target.type_name != source.type_name {
                return Err(RuntimeError::StructMismatch {
                    expected: target.type_name.clone(),
                    got: source.type_name.clone(),
                });
            }
            for (name, field) in &mut target.fields {
                if let Some(value) = source.fields.get(name) {
                    assign(field, value)?;
                }
            }
            Ok(())
        }
        (dst, src) => {
            *dst = cast_implicit(src, dst.type_tag())?;
            Ok(())
        }
    }
}

/// Compare decoded values after converting both to their castable type.
#[must_use]
pub fn semantic_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(left), Value::Array(right)) => {
            left.lower() == right.lower()
                && left.upper() == right.upper()
                && left
                    .elements()
                    .iter()
                    .zip(right.elements())
                    .all(|(l, r)| semantic_eq(l, r))
        }
        (Value::Struct(left), Value::Struct(right)) => {
            left.type_name == right.type_name
                && left.fields.len() == right.fields.len()
                && left
                    .fields
                    .iter()
                    .all(|(name, l)| right.fields.get(name).is_some_and(|r| semantic_eq(l, r)))
        }
        _ => {
            let Some(common) = castable_type(a.type_tag(), b.type_tag()) else {
                return false;
            };
            match (cast_implicit(a, common), cast_implicit(b, common)) {
                (Ok(l), Ok(r)) => l == r,
                _ => false,
            }
        }
    }
}

/// Bind-time compatibility of a source port value with a destination port.
pub fn check_connection(src: &Value, dst: &Value) -> Result<(), RuntimeError> {
    match (src, dst) {
        (Value::Array(s), Value::Array(d)) => {
            check_rule(s.element_type(), d.element_type())
        }
        (Value::Struct(s), Value::Struct(d)) if s.type_name != d.type_name => {
            Err(RuntimeError::TypeError {
                from: ElementaryType::Struct,
                to: ElementaryType::Struct,
            })
        }
        _ => check_rule(src.type_tag(), dst.type_tag()),
    }
}

fn check_rule(from: ElementaryType, to: ElementaryType) -> Result<(), RuntimeError> {
    if resolve(from, to).is_implicit() {
        Ok(())
    } else {
        Err(RuntimeError::TypeError { from, to })
    }
}

fn convert(value: &Value, to: ElementaryType) -> Result<Value, RuntimeError> {
    let from = value.type_tag();
    let fail = || RuntimeError::ConversionError { from, to };
    match to.family() {
        TypeFamily::BitString => {
            let bits = match *value {
                Value::Real(v) if to == ElementaryType::DWord => u64::from(v.to_bits()),
                Value::LReal(v) if to == ElementaryType::LWord => v.to_bits(),
                _ => match (value.as_bits(), value.as_i128()) {
                    (Some(bits), _) => bits,
                    // two's complement truncation
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    (None, Some(int)) => int as u64,
                    (None, None) => return Err(fail()),
                },
            };
            Ok(bits_to_value(bits, to))
        }
        TypeFamily::Unsigned | TypeFamily::Signed => {
            let int = if let Some(bits) = value.as_bits() {
                reinterpret_bits(bits, to)
            } else if let Some(int) = value.as_i128() {
                int
            } else {
                match *value {
                    Value::Real(v) => float_to_int(f64::from(v)).ok_or_else(fail)?,
                    Value::LReal(v) => float_to_int(v).ok_or_else(fail)?,
                    _ => return Err(fail()),
                }
            };
            int_to_value(int, to).ok_or_else(fail)
        }
        TypeFamily::Float => {
            let float = match *value {
                Value::DWord(bits) if to == ElementaryType::Real => {
                    return Ok(Value::Real(f32::from_bits(bits)));
                }
                Value::LWord(bits) if to == ElementaryType::LReal => {
                    return Ok(Value::LReal(f64::from_bits(bits)));
                }
                Value::Real(v) => f64::from(v),
                Value::LReal(v) => v,
                _ => {
                    #[allow(clippy::cast_precision_loss)]
                    let float = value.as_i128().ok_or_else(fail)? as f64;
                    float
                }
            };
            if to == ElementaryType::Real {
                #[allow(clippy::cast_possible_truncation)]
                let narrowed = float as f32;
                if float.is_finite() && !narrowed.is_finite() {
                    return Err(fail());
                }
                Ok(Value::Real(narrowed))
            } else {
                Ok(Value::LReal(float))
            }
        }
        TypeFamily::Char => match (value, to) {
            (Value::Char(c), ElementaryType::WChar) => Ok(Value::WChar(u16::from(*c))),
            (Value::WChar(c), ElementaryType::Char) => {
                u8::try_from(*c).map(Value::Char).map_err(|_| fail())
            }
            _ => Err(fail()),
        },
        TypeFamily::Duration => {
            let duration = value.as_duration().ok_or_else(fail)?;
            Ok(if to == ElementaryType::LTime {
                Value::LTime(duration)
            } else {
                Value::Time(duration)
            })
        }
        TypeFamily::Bool | TypeFamily::String | TypeFamily::Aggregate => Err(fail()),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn bits_to_value(bits: u64, to: ElementaryType) -> Value {
    match to {
        ElementaryType::Byte => Value::Byte(bits as u8),
        ElementaryType::Word => Value::Word(bits as u16),
        ElementaryType::DWord => Value::DWord(bits as u32),
        _ => Value::LWord(bits),
    }
}

/// Bit pattern read as an integer of the target width.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn reinterpret_bits(bits: u64, to: ElementaryType) -> i128 {
    match to {
        ElementaryType::USInt => i128::from(bits as u8),
        ElementaryType::UInt => i128::from(bits as u16),
        ElementaryType::UDInt => i128::from(bits as u32),
        ElementaryType::ULInt => i128::from(bits),
        ElementaryType::SInt => i128::from(bits as u8 as i8),
        ElementaryType::Int => i128::from(bits as u16 as i16),
        ElementaryType::DInt => i128::from(bits as u32 as i32),
        _ => i128::from(bits as i64),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn float_to_int(value: f64) -> Option<i128> {
    if !value.is_finite() {
        return None;
    }
    let rounded = value.round_ties_even();
    // beyond the 64-bit range every target rejects it anyway
    if rounded.abs() > 2f64.powi(65) {
        return None;
    }
    Some(rounded as i128)
}

/// Range-checked integer construction.
pub(crate) fn int_to_value(int: i128, to: ElementaryType) -> Option<Value> {
    Some(match to {
        ElementaryType::USInt => Value::USInt(u8::try_from(int).ok()?),
        ElementaryType::UInt => Value::UInt(u16::try_from(int).ok()?),
        ElementaryType::UDInt => Value::UDInt(u32::try_from(int).ok()?),
        ElementaryType::ULInt => Value::ULInt(u64::try_from(int).ok()?),
        ElementaryType::SInt => Value::SInt(i8::try_from(int).ok()?),
        ElementaryType::Int => Value::Int(i16::try_from(int).ok()?),
        ElementaryType::DInt => Value::DInt(i32::try_from(int).ok()?),
        ElementaryType::LInt => Value::LInt(i64::try_from(int).ok()?),
        _ => return None,
    })
}

/// Common element type of a sequence of scalar values.
pub(crate) fn common_type(values: &[Value]) -> Option<ElementaryType> {
    let mut iter = values.iter().map(Value::type_tag);
    let first = iter.next()?;
    iter.try_fold(first, |acc, ty| castable_type(acc, ty))
}

