//! Elementary cast lattice.
//!
//! The lattice is the enumerated implicit and explicit edge lists below,
//! expanded once into a dense `COUNT x COUNT` table indexed by type
//! ordinal. Edges touching 64-bit or floating types are gated behind the
//! `wide-types` and `float-types` features; a disabled edge resolves to
//! [`CastRule::Invalid`]. The tables are not assumed to be transitively
//! closed, see [`CastLattice::implicit_closure_gaps`].

use std::fmt::Write as _;

use once_cell::sync::Lazy;

use crate::elementary::ElementaryType;

use ElementaryType::{
    Bool, Byte, Char, DInt, DWord, Int, LInt, LReal, LTime, LWord, Real, SInt, Time, UDInt,
    UInt, ULInt, USInt, WChar, Word,
};

/// Conversion rule for an ordered `(from, to)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastRule {
    Identity,
    Implicit,
    ExplicitOnly,
    Invalid,
}

impl CastRule {
    /// Identity or implicit: value-safe without acknowledgment.
    #[must_use]
    pub const fn is_implicit(self) -> bool {
        matches!(self, Self::Identity | Self::Implicit)
    }

    /// Any conversion a caller may request explicitly.
    #[must_use]
    pub const fn allows_explicit(self) -> bool {
        !matches!(self, Self::Invalid)
    }

    const fn symbol(self) -> char {
        match self {
            Self::Identity => '=',
            Self::Implicit => 'i',
            Self::ExplicitOnly => 'e',
            Self::Invalid => '.',
        }
    }
}

/// Feature gate attached to an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    Always,
    Wide,
    Float,
    WideFloat,
}

impl Gate {
    const fn enabled(self) -> bool {
        let wide = cfg!(feature = "wide-types");
        let float = cfg!(feature = "float-types");
        match self {
            Self::Always => true,
            Self::Wide => wide,
            Self::Float => float,
            Self::WideFloat => wide && float,
        }
    }
}

use Gate::{Always as A, Float as F, Wide as W, WideFloat as WF};

type Edge = (ElementaryType, ElementaryType, Gate);

#[rustfmt::skip]
const IMPLICIT_EDGES: &[Edge] = &[
    // bit-string ladder
    (Bool, Byte, A), (Bool, Word, A), (Bool, DWord, A), (Bool, LWord, W),
    (Byte, Word, A), (Byte, DWord, A), (Byte, LWord, W),
    (Word, DWord, A), (Word, LWord, W),
    (DWord, LWord, W),
    // unsigned ladder and widening into signed/float
    (USInt, UInt, A), (USInt, UDInt, A), (USInt, ULInt, W),
    (USInt, Int, A), (USInt, DInt, A), (USInt, LInt, W),
    (USInt, Real, F), (USInt, LReal, WF),
    (UInt, UDInt, A), (UInt, ULInt, W), (UInt, DInt, A), (UInt, LInt, W),
    (UInt, Real, F), (UInt, LReal, WF),
    (UDInt, ULInt, W), (UDInt, LInt, W), (UDInt, LReal, WF),
    // signed ladder
    (SInt, Int, A), (SInt, DInt, A), (SInt, LInt, W), (SInt, Real, F), (SInt, LReal, WF),
    (Int, DInt, A), (Int, LInt, W), (Int, Real, F), (Int, LReal, WF),
    (DInt, LInt, W), (DInt, LReal, WF),
    // float
    (Real, LReal, WF),
    // durations and characters
    (Time, LTime, W),
    (Char, WChar, A),
];

#[rustfmt::skip]
const EXPLICIT_EDGES: &[Edge] = &[
    (Bool, USInt, A), (Bool, UInt, A), (Bool, UDInt, A), (Bool, ULInt, W),
    (Bool, SInt, A), (Bool, Int, A), (Bool, DInt, A), (Bool, LInt, W),

    (Byte, USInt, A), (Byte, UInt, A), (Byte, UDInt, A), (Byte, ULInt, W),
    (Byte, SInt, A), (Byte, Int, A), (Byte, DInt, A), (Byte, LInt, W),

    (Word, Byte, A),
    (Word, USInt, A), (Word, UInt, A), (Word, UDInt, A), (Word, ULInt, W),
    (Word, SInt, A), (Word, Int, A), (Word, DInt, A), (Word, LInt, W),

    (DWord, Byte, A), (DWord, Word, A),
    (DWord, USInt, A), (DWord, UInt, A), (DWord, UDInt, A), (DWord, ULInt, W),
    (DWord, SInt, A), (DWord, Int, A), (DWord, DInt, A), (DWord, LInt, W),
    (DWord, Real, F),

    (LWord, Byte, W), (LWord, Word, W), (LWord, DWord, W),
    (LWord, USInt, W), (LWord, UInt, W), (LWord, UDInt, W), (LWord, ULInt, W),
    (LWord, SInt, W), (LWord, Int, W), (LWord, DInt, W), (LWord, LInt, W),
    (LWord, LReal, WF),

    (USInt, SInt, A),
    (USInt, Byte, A), (USInt, Word, A), (USInt, DWord, A), (USInt, LWord, W),

    (UInt, USInt, A), (UInt, SInt, A), (UInt, Int, A),
    (UInt, Byte, A), (UInt, Word, A), (UInt, DWord, A), (UInt, LWord, W),

    (UDInt, USInt, A), (UDInt, UInt, A), (UDInt, SInt, A), (UDInt, Int, A), (UDInt, DInt, A),
    (UDInt, Byte, A), (UDInt, Word, A), (UDInt, DWord, A), (UDInt, LWord, W),
    (UDInt, Real, F),

    (ULInt, USInt, W), (ULInt, UInt, W), (ULInt, UDInt, W),
    (ULInt, SInt, W), (ULInt, Int, W), (ULInt, DInt, W), (ULInt, LInt, W),
    (ULInt, Byte, W), (ULInt, Word, W), (ULInt, DWord, W), (ULInt, LWord, W),
    (ULInt, Real, WF), (ULInt, LReal, WF),

    (SInt, USInt, A), (SInt, UInt, A), (SInt, UDInt, A), (SInt, ULInt, W),
    (SInt, Byte, A), (SInt, Word, A), (SInt, DWord, A), (SInt, LWord, W),

    (Int, SInt, A),
    (Int, USInt, A), (Int, UInt, A), (Int, UDInt, A), (Int, ULInt, W),
    (Int, Byte, A), (Int, Word, A), (Int, DWord, A), (Int, LWord, W),

    (DInt, SInt, A), (DInt, Int, A),
    (DInt, USInt, A), (DInt, UInt, A), (DInt, UDInt, A), (DInt, ULInt, W),
    (DInt, Byte, A), (DInt, Word, A), (DInt, DWord, A), (DInt, LWord, W),
    (DInt, Real, F),

    (LInt, SInt, W), (LInt, Int, W), (LInt, DInt, W),
    (LInt, USInt, W), (LInt, UInt, W), (LInt, UDInt, W), (LInt, ULInt, W),
    (LInt, Byte, W), (LInt, Word, W), (LInt, DWord, W), (LInt, LWord, W),
    (LInt, Real, WF), (LInt, LReal, WF),

    (Real, SInt, F), (Real, Int, F), (Real, DInt, F), (Real, LInt, WF),
    (Real, USInt, F), (Real, UInt, F), (Real, UDInt, F), (Real, ULInt, WF),
    (Real, DWord, F),

    (LReal, Real, WF),
    (LReal, SInt, WF), (LReal, Int, WF), (LReal, DInt, WF), (LReal, LInt, WF),
    (LReal, USInt, WF), (LReal, UInt, WF), (LReal, UDInt, WF), (LReal, ULInt, WF),
    (LReal, LWord, WF),

    (LTime, Time, W),
    (WChar, Char, A),
];

const N: usize = ElementaryType::COUNT;

/// Dense conversion table over all elementary type pairs.
#[derive(Debug, Clone)]
pub struct CastLattice {
    table: [[CastRule; N]; N],
}

static LATTICE: Lazy<CastLattice> = Lazy::new(CastLattice::build);

impl CastLattice {
    /// Expand the enabled edges into a fresh table.
    #[must_use]
    pub fn build() -> Self {
        let mut table = [[CastRule::Invalid; N]; N];
        for ty in ElementaryType::ALL {
            table[ty.ordinal()][ty.ordinal()] = CastRule::Identity;
        }
        for &(from, to, gate) in EXPLICIT_EDGES {
            if gate.enabled() {
                table[from.ordinal()][to.ordinal()] = CastRule::ExplicitOnly;
            }
        }
        for &(from, to, gate) in IMPLICIT_EDGES {
            if gate.enabled() {
                table[from.ordinal()][to.ordinal()] = CastRule::Implicit;
            }
        }
        Self { table }
    }

    /// Process-wide read-only lattice.
    #[must_use]
    pub fn global() -> &'static Self {
        &LATTICE
    }

    #[must_use]
    pub fn resolve(&self, from: ElementaryType, to: ElementaryType) -> CastRule {
        self.table[from.ordinal()][to.ordinal()]
    }

    /// The type both operands may be implicitly converted to.
    #[must_use]
    pub fn castable_type(&self, t: ElementaryType, u: ElementaryType) -> Option<ElementaryType> {
        if self.resolve(t, u).is_implicit() {
            Some(u)
        } else if self.resolve(u, t).is_implicit() {
            Some(t)
        } else {
            None
        }
    }

    /// Like [`Self::castable_type`] but with duration arithmetic rules.
    ///
    /// Two different duration types are ambiguous and rejected. A duration
    /// mixed with a numeric operand yields the duration type.
    #[must_use]
    pub fn castable_type_duration_mixed(
        &self,
        t: ElementaryType,
        u: ElementaryType,
    ) -> Option<ElementaryType> {
        match (t.is_duration(), u.is_duration()) {
            (true, true) => (t == u).then_some(t),
            (true, false) if u.is_numeric() => Some(t),
            (false, true) if t.is_numeric() => Some(u),
            _ => self.castable_type(t, u),
        }
    }

    /// Enabled implicit edges, identity excluded.
    #[must_use]
    pub fn implicit_edges(&self) -> Vec<(ElementaryType, ElementaryType)> {
        self.edges_with(CastRule::Implicit)
    }

    /// Enabled explicit-only edges.
    #[must_use]
    pub fn explicit_edges(&self) -> Vec<(ElementaryType, ElementaryType)> {
        self.edges_with(CastRule::ExplicitOnly)
    }

    fn edges_with(&self, rule: CastRule) -> Vec<(ElementaryType, ElementaryType)> {
        let mut edges = Vec::new();
        for from in ElementaryType::ALL {
            for to in ElementaryType::ALL {
                if self.resolve(from, to) == rule {
                    edges.push((from, to));
                }
            }
        }
        edges
    }

    /// Pairs reachable through a chain of implicit edges that are not
    /// themselves implicit. Empty when the implicit relation is closed.
    #[must_use]
    pub fn implicit_closure_gaps(&self) -> Vec<(ElementaryType, ElementaryType)> {
        let mut reach = [[false; N]; N];
        for (from, to) in self.implicit_edges() {
            reach[from.ordinal()][to.ordinal()] = true;
        }
        // Warshall
        for k in 0..N {
            for i in 0..N {
                if !reach[i][k] {
                    continue;
                }
                for j in 0..N {
                    if reach[k][j] {
                        reach[i][j] = true;
                    }
                }
            }
        }
        let mut gaps = Vec::new();
        for i in 0..N {
            for j in 0..N {
                if i != j && reach[i][j] && self.table[i][j] != CastRule::Implicit {
                    gaps.push((ElementaryType::ALL[i], ElementaryType::ALL[j]));
                }
            }
        }
        gaps
    }

    /// Text grid for the given rows and columns.
    ///
    /// `=` identity, `i` implicit, `e` explicit only, `.` invalid.
    #[must_use]
    pub fn render(&self, types: &[ElementaryType]) -> String {
        let width = types.iter().map(|ty| ty.name().len()).max().unwrap_or(0);
        let mut out = String::new();
        let _ = write!(out, "{:width$}", "");
        for ty in types {
            let _ = write!(out, " {}", &ty.name()[..1]);
        }
        out.push('\n');
        for &from in types {
            let _ = write!(out, "{:width$}", from.name());
            for &to in types {
                let _ = write!(out, " {}", self.resolve(from, to).symbol());
            }
            out.push('\n');
        }
        out
    }
}

/// Resolve a pair against the process-wide lattice.
#[must_use]
pub fn resolve(from: ElementaryType, to: ElementaryType) -> CastRule {
    CastLattice::global().resolve(from, to)
}

/// [`CastLattice::castable_type`] on the process-wide lattice.
#[must_use]
pub fn castable_type(t: ElementaryType, u: ElementaryType) -> Option<ElementaryType> {
    CastLattice::global().castable_type(t, u)
}

/// [`CastLattice::castable_type_duration_mixed`] on the process-wide lattice.
#[must_use]
pub fn castable_type_duration_mixed(
    t: ElementaryType,
    u: ElementaryType,
) -> Option<ElementaryType> {
    CastLattice::global().castable_type_duration_mixed(t, u)
}
