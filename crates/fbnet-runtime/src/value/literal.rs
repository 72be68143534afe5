//! Literal text format.
//!
//! Parsing accepts an optional `TYPE#` prefix, `2#`/`8#`/`16#` integer
//! bases, `_` digit separators, `TRUE`/`FALSE`, duration literals with
//! `d h m s ms us ns` components and quoted strings with `$` escapes.
//! Formatting is canonical and typed, so `from_literal(&to_literal(v))`
//! yields `v` for boolean, integer, bit-string and duration values.

use std::fmt::{self, Write as _};
use std::str::FromStr;

use fbnet_types::{ElementaryType, TypeFamily};

use super::cast::{cast_implicit, int_to_value};
use super::{ArrayKind, ArrayValue, Duration, Value};
use crate::error::RuntimeError;

const DURATION_UNITS: [(&str, i64); 7] = [
    ("d", Duration::NANOS_PER_DAY),
    ("h", Duration::NANOS_PER_HOUR),
    ("m", Duration::NANOS_PER_MIN),
    ("s", Duration::NANOS_PER_SEC),
    ("ms", Duration::NANOS_PER_MILLI),
    ("us", Duration::NANOS_PER_MICRO),
    ("ns", 1),
];

/// Deepest bracket or parenthesis nesting accepted in a literal.
pub const MAX_LITERAL_NESTING: usize = 32;

/// Parse literal text, inferring the type when no prefix is given.
///
/// Untyped integers become DINT, LINT or ULINT (the first that fits),
/// untyped decimals LREAL.
pub fn from_literal(text: &str) -> Result<Value, RuntimeError> {
    let text = text.trim();
    let err = || RuntimeError::ParseError(text.into());
    if text.is_empty() {
        return Err(err());
    }
    if text.starts_with('[') {
        let elements = split_array(text)?
            .into_iter()
            .map(from_literal)
            .collect::<Result<Vec<_>, _>>()?;
        return ArrayValue::untyped(elements)
            .map(Value::Array)
            .map_err(|_| err());
    }
    if text.starts_with('\'') {
        return parse_typed(ElementaryType::String, text);
    }
    if text.starts_with('"') {
        return parse_typed(ElementaryType::WString, text);
    }
    if let Some((prefix, body)) = text.split_once('#') {
        if !prefix.is_empty() && prefix.bytes().all(|b| b.is_ascii_digit()) {
            return parse_integer(text).and_then(untyped_int).ok_or_else(err);
        }
        let ty = type_prefix(prefix).ok_or_else(err)?;
        return parse_typed(ty, body);
    }
    match text.to_ascii_uppercase().as_str() {
        "TRUE" => return Ok(Value::Bool(true)),
        "FALSE" => return Ok(Value::Bool(false)),
        _ => {}
    }
    if let Some(int) = parse_integer(text) {
        return untyped_int(int).ok_or_else(err);
    }
    let unsigned = text.trim_start_matches(['+', '-']);
    if unsigned.starts_with(|c: char| c.is_ascii_digit())
        && unsigned.contains(['.', 'e', 'E'])
    {
        return parse_float(text).map(Value::LReal).ok_or_else(err);
    }
    Err(err())
}

/// Parse the body of a literal whose type is already known.
pub fn parse_typed(ty: ElementaryType, body: &str) -> Result<Value, RuntimeError> {
    let body = body.trim();
    let err = || RuntimeError::ParseError(format!("{ty}#{body}").into());
    match ty.family() {
        TypeFamily::Bool => match body.to_ascii_uppercase().as_str() {
            "TRUE" | "1" => Ok(Value::Bool(true)),
            "FALSE" | "0" => Ok(Value::Bool(false)),
            _ => Err(err()),
        },
        TypeFamily::BitString => {
            let int = parse_integer(body).ok_or_else(err)?;
            let value = match ty {
                ElementaryType::Byte => u8::try_from(int).map(Value::Byte).ok(),
                ElementaryType::Word => u16::try_from(int).map(Value::Word).ok(),
                ElementaryType::DWord => u32::try_from(int).map(Value::DWord).ok(),
                _ => u64::try_from(int).map(Value::LWord).ok(),
            };
            value.ok_or_else(err)
        }
        TypeFamily::Unsigned | TypeFamily::Signed => parse_integer(body)
            .and_then(|int| int_to_value(int, ty))
            .ok_or_else(err),
        TypeFamily::Float => {
            let float = parse_float(body).ok_or_else(err)?;
            if ty == ElementaryType::Real {
                #[allow(clippy::cast_possible_truncation)]
                let narrowed = float as f32;
                if float.is_finite() && !narrowed.is_finite() {
                    return Err(err());
                }
                Ok(Value::Real(narrowed))
            } else {
                Ok(Value::LReal(float))
            }
        }
        TypeFamily::Char => {
            let (quote, max) = if ty == ElementaryType::Char {
                ('\'', u32::from(u8::MAX))
            } else {
                ('"', u32::from(u16::MAX))
            };
            let codes = unquote(body, quote).ok_or_else(err)?;
            let &[code] = codes.as_slice() else {
                return Err(err());
            };
            if code > max {
                return Err(err());
            }
            #[allow(clippy::cast_possible_truncation)]
            let value = if ty == ElementaryType::Char {
                Value::Char(code as u8)
            } else {
                Value::WChar(code as u16)
            };
            Ok(value)
        }
        TypeFamily::String => {
            let quote = if ty == ElementaryType::String { '\'' } else { '"' };
            let text = unquote(body, quote)
                .and_then(|codes| codes.into_iter().map(char::from_u32).collect::<Option<String>>())
                .ok_or_else(err)?;
            Ok(if ty == ElementaryType::String {
                Value::String(text.into())
            } else {
                Value::WString(text)
            })
        }
        TypeFamily::Duration => {
            let duration = parse_duration(body).ok_or_else(err)?;
            Ok(if ty == ElementaryType::LTime {
                Value::LTime(duration)
            } else {
                Value::Time(duration)
            })
        }
        TypeFamily::Aggregate => Err(err()),
    }
}

/// Parse a bracketed array literal for a known element type.
pub fn parse_array(
    kind: ArrayKind,
    element_type: ElementaryType,
    text: &str,
) -> Result<ArrayValue, RuntimeError> {
    let elements = split_array(text.trim())?
        .into_iter()
        .map(|element| parse_element(element_type, element))
        .collect::<Result<Vec<_>, _>>()?;
    ArrayValue::from_values(kind, element_type, elements)
}

fn parse_element(ty: ElementaryType, text: &str) -> Result<Value, RuntimeError> {
    let prefixed = text
        .split_once('#')
        .is_some_and(|(prefix, _)| type_prefix(prefix).is_some());
    if prefixed {
        let value = from_literal(text)?;
        cast_implicit(&value, ty)
    } else {
        parse_typed(ty, text)
    }
}

/// Canonical literal text.
#[must_use]
pub fn to_literal(value: &Value) -> String {
    let mut out = String::new();
    let _ = write_literal(&mut out, value);
    out
}

fn write_literal(out: &mut impl fmt::Write, value: &Value) -> fmt::Result {
    match value {
        Value::Bool(v) => out.write_str(if *v { "TRUE" } else { "FALSE" }),
        Value::Byte(v) => write!(out, "BYTE#16#{v:02X}"),
        Value::Word(v) => write!(out, "WORD#16#{v:04X}"),
        Value::DWord(v) => write!(out, "DWORD#16#{v:08X}"),
        Value::LWord(v) => write!(out, "LWORD#16#{v:016X}"),
        Value::USInt(v) => write!(out, "USINT#{v}"),
        Value::UInt(v) => write!(out, "UINT#{v}"),
        Value::UDInt(v) => write!(out, "UDINT#{v}"),
        Value::ULInt(v) => write!(out, "ULINT#{v}"),
        Value::SInt(v) => write!(out, "SINT#{v}"),
        Value::Int(v) => write!(out, "INT#{v}"),
        Value::DInt(v) => write!(out, "DINT#{v}"),
        Value::LInt(v) => write!(out, "LINT#{v}"),
        Value::Real(v) => write!(out, "REAL#{v}"),
        Value::LReal(v) => write!(out, "LREAL#{v}"),
        Value::Char(v) => {
            out.write_str("CHAR#")?;
            out.write_str(&quote([u32::from(*v)], '\'', 2))
        }
        Value::WChar(v) => {
            out.write_str("WCHAR#")?;
            out.write_str(&quote([u32::from(*v)], '"', 4))
        }
        Value::String(v) => out.write_str(&quote(v.chars().map(u32::from), '\'', 2)),
        Value::WString(v) => out.write_str(&quote(v.chars().map(u32::from), '"', 4)),
        Value::Time(v) => write_duration(out, "T#", *v),
        Value::LTime(v) => write_duration(out, "LT#", *v),
        Value::Array(array) => {
            out.write_char('[')?;
            for (index, element) in array.elements().iter().enumerate() {
                if index > 0 {
                    out.write_str(", ")?;
                }
                write_literal(out, element)?;
            }
            out.write_char(']')
        }
        Value::Struct(value) => {
            out.write_char('(')?;
            for (index, (name, field)) in value.fields.iter().enumerate() {
                if index > 0 {
                    out.write_str(", ")?;
                }
                write!(out, "{name} := ")?;
                write_literal(out, field)?;
            }
            out.write_char(')')
        }
    }
}

fn write_duration(out: &mut impl fmt::Write, prefix: &str, duration: Duration) -> fmt::Result {
    out.write_str(prefix)?;
    let nanos = duration.as_nanos();
    if nanos == 0 {
        return out.write_str("0s");
    }
    if nanos < 0 {
        out.write_char('-')?;
    }
    let mut rest = nanos.unsigned_abs();
    for (unit, per) in DURATION_UNITS {
        let per = per.unsigned_abs();
        let count = rest / per;
        if count > 0 {
            write!(out, "{count}{unit}")?;
            rest %= per;
        }
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_literal(f, self)
    }
}

impl FromStr for Value {
    type Err = RuntimeError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        from_literal(text)
    }
}

fn type_prefix(prefix: &str) -> Option<ElementaryType> {
    ElementaryType::from_name(prefix).filter(|ty| ty.is_scalar())
}

fn untyped_int(int: i128) -> Option<Value> {
    [
        ElementaryType::DInt,
        ElementaryType::LInt,
        ElementaryType::ULInt,
    ]
    .into_iter()
    .find_map(|ty| int_to_value(int, ty))
}

fn split_sign(text: &str) -> (bool, &str) {
    if let Some(rest) = text.strip_prefix('-') {
        (true, rest)
    } else {
        (false, text.strip_prefix('+').unwrap_or(text))
    }
}

fn parse_integer(text: &str) -> Option<i128> {
    let (negative, rest) = split_sign(text.trim());
    let (radix, digits) = match rest.split_once('#') {
        Some((base, digits)) => {
            let radix = base.parse::<u32>().ok().filter(|b| matches!(b, 2 | 8 | 16))?;
            (radix, digits)
        }
        None => (10, rest),
    };
    if digits.starts_with('_') || digits.ends_with('_') {
        return None;
    }
    let cleaned: String = digits.chars().filter(|c| *c != '_').collect();
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    let magnitude = i128::try_from(u128::from_str_radix(&cleaned, radix).ok()?).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

fn parse_float(text: &str) -> Option<f64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != '_').collect();
    cleaned.parse::<f64>().ok()
}

fn parse_duration(body: &str) -> Option<Duration> {
    let lower = body.trim().to_ascii_lowercase();
    let (negative, rest) = split_sign(&lower);
    let bytes = rest.as_bytes();
    if bytes.is_empty() {
        return None;
    }
    let mut idx = 0usize;
    let mut total: i128 = 0;
    while idx < bytes.len() {
        let start = idx;
        while idx < bytes.len() && (bytes[idx].is_ascii_digit() || bytes[idx] == b'_') {
            idx += 1;
        }
        let whole: String = rest[start..idx].chars().filter(|c| *c != '_').collect();
        if whole.is_empty() {
            return None;
        }
        let mut fraction = String::new();
        if idx < bytes.len() && bytes[idx] == b'.' {
            idx += 1;
            while idx < bytes.len() && bytes[idx].is_ascii_digit() {
                fraction.push(char::from(bytes[idx]));
                idx += 1;
            }
            if fraction.is_empty() {
                return None;
            }
        }
        let unit_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_alphabetic() {
            idx += 1;
        }
        let unit = &rest[unit_start..idx];
        let per = DURATION_UNITS
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, per)| i128::from(*per))?;
        let whole = whole.parse::<i128>().ok()?;
        total = total.checked_add(whole.checked_mul(per)?)?;
        if !fraction.is_empty() {
            fraction.truncate(18);
            let scale = 10i128.pow(u32::try_from(fraction.len()).ok()?);
            let digits = fraction.parse::<i128>().ok()?;
            total = total.checked_add(digits.checked_mul(per)? / scale)?;
        }
        while idx < bytes.len() && bytes[idx] == b'_' {
            idx += 1;
        }
    }
    if negative {
        total = -total;
    }
    i64::try_from(total).ok().map(Duration::from_nanos)
}

/// Decode a quoted literal into code points.
fn unquote(body: &str, quote: char) -> Option<Vec<u32>> {
    let inner = body.strip_prefix(quote)?.strip_suffix(quote)?;
    let hex_digits = if quote == '\'' { 2 } else { 4 };
    let mut codes = Vec::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == quote {
            return None;
        }
        if c != '$' {
            codes.push(u32::from(c));
            continue;
        }
        let next = chars.next()?;
        let code = match next.to_ascii_uppercase() {
            '$' => u32::from('$'),
            '\'' => u32::from('\''),
            '"' => u32::from('"'),
            'L' | 'N' => u32::from('\n'),
            'P' => 0x0C,
            'R' => u32::from('\r'),
            'T' => u32::from('\t'),
            h if h.is_ascii_hexdigit() => {
                let mut hex = String::from(h);
                for _ in 1..hex_digits {
                    let digit = chars.next().filter(char::is_ascii_hexdigit)?;
                    hex.push(digit);
                }
                u32::from_str_radix(&hex, 16).ok()?
            }
            _ => return None,
        };
        codes.push(code);
    }
    Some(codes)
}

fn quote(codes: impl IntoIterator<Item = u32>, quote: char, hex_digits: usize) -> String {
    let mut out = String::new();
    out.push(quote);
    for code in codes {
        match char::from_u32(code) {
            Some('$') => out.push_str("$$"),
            Some(c) if c == quote => {
                out.push('$');
                out.push(c);
            }
            Some('\n') => out.push_str("$N"),
            Some('\r') => out.push_str("$R"),
            Some('\t') => out.push_str("$T"),
            Some('\u{0C}') => out.push_str("$P"),
            Some(c) if !c.is_control() => out.push(c),
            _ => {
                let _ = write!(out, "${code:0hex_digits$X}");
            }
        }
    }
    out.push(quote);
    out
}

/// Split `[a, b, c]` on top-level commas.
///
/// Rejects nesting deeper than [`MAX_LITERAL_NESTING`] before any element
/// is parsed, which also bounds the recursion of nested array elements.
fn split_array(text: &str) -> Result<Vec<&str>, RuntimeError> {
    let err = || RuntimeError::ParseError(text.into());
    let inner = text
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(err)?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quoted: Option<char> = None;
    let mut escaped = false;
    let mut start = 0usize;
    for (idx, c) in inner.char_indices() {
        if let Some(q) = quoted {
            if escaped {
                escaped = false;
            } else if c == '$' {
                escaped = true;
            } else if c == q {
                quoted = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quoted = Some(c),
            '[' | '(' => {
                depth += 1;
                if depth >= MAX_LITERAL_NESTING {
                    return Err(err());
                }
            }
            ']' | ')' => depth = depth.checked_sub(1).ok_or_else(err)?,
            ',' if depth == 0 => {
                parts.push(inner[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    if quoted.is_some() || depth != 0 {
        return Err(err());
    }
    parts.push(inner[start..].trim());
    if parts.iter().any(|part| part.is_empty()) {
        return Err(err());
    }
    Ok(parts)
}
