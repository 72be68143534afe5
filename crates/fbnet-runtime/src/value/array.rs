//! Array values with absolute indexing and windowed copy.

use fbnet_types::{resolve, ElementaryType};

use super::cast::{cast_implicit, common_type};
use super::defaults::default_value;
use super::Value;
use crate::error::RuntimeError;

/// Whether bounds may change after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    Fixed,
    Resizable,
}

/// One-dimensional array over an inclusive index range `[lower, upper]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    kind: ArrayKind,
    element_type: ElementaryType,
    lower: i64,
    upper: i64,
    elements: Vec<Value>,
}

impl ArrayValue {
    /// Default-initialized fixed array.
    pub fn fixed(
        element_type: ElementaryType,
        lower: i64,
        upper: i64,
    ) -> Result<Self, RuntimeError> {
        Self::filled(ArrayKind::Fixed, element_type, lower, upper)
    }

    /// Default-initialized resizable array.
    pub fn resizable(
        element_type: ElementaryType,
        lower: i64,
        upper: i64,
    ) -> Result<Self, RuntimeError> {
        Self::filled(ArrayKind::Resizable, element_type, lower, upper)
    }

    /// Array over `[0, N-1]` from an initializer sequence.
    pub fn from_values(
        kind: ArrayKind,
        element_type: ElementaryType,
        values: Vec<Value>,
    ) -> Result<Self, RuntimeError> {
        let upper = i64::try_from(values.len())
            .map_err(|_| RuntimeError::InvalidBounds { lower: 0, upper: -1 })?
            - 1;
        Self::with_initializer(kind, element_type, 0, upper, values)
    }

    /// Array over `[lower, upper]`; initializer element `i` lands at
    /// `lower + i`, the remainder is default-initialized.
    pub fn with_initializer(
        kind: ArrayKind,
        element_type: ElementaryType,
        lower: i64,
        upper: i64,
        values: Vec<Value>,
    ) -> Result<Self, RuntimeError> {
        let mut array = Self::filled(kind, element_type, lower, upper)?;
        if values.len() > array.elements.len() {
            return Err(RuntimeError::RangeError {
                index: upper.saturating_add(1),
                lower,
                upper,
            });
        }
        for (slot, value) in array.elements.iter_mut().zip(values) {
            *slot = cast_implicit(&value, element_type)?;
        }
        Ok(array)
    }

    /// Resizable array whose element type is inferred from its contents.
    pub fn untyped(values: Vec<Value>) -> Result<Self, RuntimeError> {
        let Some(element_type) = common_type(&values) else {
            let ty = values
                .first()
                .map_or(ElementaryType::Array, Value::type_tag);
            return Err(RuntimeError::UnsupportedType(ty));
        };
        Self::from_values(ArrayKind::Resizable, element_type, values)
    }

    /// Windowed copy-construction from `src` into `[lower, upper]`.
    ///
    /// The overlap of both ranges is copied with an implicit element cast,
    /// the rest of the destination is default-initialized.
    pub fn copy_from(
        kind: ArrayKind,
        element_type: ElementaryType,
        lower: i64,
        upper: i64,
        src: &ArrayValue,
    ) -> Result<Self, RuntimeError> {
        let mut array = Self::filled(kind, element_type, lower, upper)?;
        array.copy_window(src)?;
        Ok(array)
    }

    fn filled(
        kind: ArrayKind,
        element_type: ElementaryType,
        lower: i64,
        upper: i64,
    ) -> Result<Self, RuntimeError> {
        let len = span(lower, upper)?;
        let default = default_value(element_type)?;
        Ok(Self {
            kind,
            element_type,
            lower,
            upper,
            elements: vec![default; len],
        })
    }

    fn copy_window(&mut self, src: &ArrayValue) -> Result<(), RuntimeError> {
        if !resolve(src.element_type, self.element_type).is_implicit() {
            return Err(RuntimeError::ConversionError {
                from: src.element_type,
                to: self.element_type,
            });
        }
        let start = self.lower.max(src.lower);
        let end = self.upper.min(src.upper);
        for index in start..=end {
            let value = &src.elements[src.offset(index)];
            let converted = cast_implicit(value, self.element_type)?;
            let offset = self.offset(index);
            self.elements[offset] = converted;
        }
        Ok(())
    }

    #[must_use]
    pub fn kind(&self) -> ArrayKind {
        self.kind
    }

    #[must_use]
    pub fn element_type(&self) -> ElementaryType {
        self.element_type
    }

    #[must_use]
    pub fn lower(&self) -> i64 {
        self.lower
    }

    #[must_use]
    pub fn upper(&self) -> i64 {
        self.upper
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    #[must_use]
    pub fn elements(&self) -> &[Value] {
        &self.elements
    }

    /// `(index, value)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, &Value)> {
        (self.lower..=self.upper).zip(self.elements.iter())
    }

    /// Element at absolute `index`.
    pub fn get(&self, index: i64) -> Result<&Value, RuntimeError> {
        self.check_index(index)?;
        Ok(&self.elements[self.offset(index)])
    }

    pub fn get_mut(&mut self, index: i64) -> Result<&mut Value, RuntimeError> {
        self.check_index(index)?;
        let offset = self.offset(index);
        Ok(&mut self.elements[offset])
    }

    /// Store `value` at `index` after an implicit cast to the element type.
    pub fn set(&mut self, index: i64, value: &Value) -> Result<(), RuntimeError> {
        let converted = cast_implicit(value, self.element_type)?;
        *self.get_mut(index)? = converted;
        Ok(())
    }

    /// Change the bounds of a resizable array, keeping overlapping elements.
    pub fn resize(&mut self, lower: i64, upper: i64) -> Result<(), RuntimeError> {
        if self.kind == ArrayKind::Fixed {
            return Err(RuntimeError::FixedBounds);
        }
        let next = Self::filled(self.kind, self.element_type, lower, upper)?;
        let previous = std::mem::replace(self, next);
        self.copy_window(&previous)
    }

    /// Assignment semantics: a fixed array copies the window into its own
    /// bounds, a resizable array adopts the source bounds.
    pub fn assign(&mut self, src: &ArrayValue) -> Result<(), RuntimeError> {
        let (lower, upper) = match self.kind {
            ArrayKind::Fixed => (self.lower, self.upper),
            ArrayKind::Resizable => (src.lower, src.upper),
        };
        let mut next = Self::filled(self.kind, self.element_type, lower, upper)?;
        next.copy_window(src)?;
        *self = next;
        Ok(())
    }

    fn check_index(&self, index: i64) -> Result<(), RuntimeError> {
        if index < self.lower || index > self.upper {
            return Err(RuntimeError::RangeError {
                index,
                lower: self.lower,
                upper: self.upper,
            });
        }
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn offset(&self, index: i64) -> usize {
        (index - self.lower) as usize
    }
}

/// Upper bound on elements per array.
pub const MAX_ARRAY_LEN: usize = 1 << 24;

fn span(lower: i64, upper: i64) -> Result<usize, RuntimeError> {
    let len = i128::from(upper) - i128::from(lower) + 1;
    usize::try_from(len)
        .ok()
        .filter(|len| *len <= MAX_ARRAY_LEN)
        .ok_or(RuntimeError::InvalidBounds { lower, upper })
}
