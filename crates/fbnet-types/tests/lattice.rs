use expect_test::expect;
use fbnet_types::{
    castable_type, castable_type_duration_mixed, resolve, CastLattice, CastRule, ElementaryType,
};

use ElementaryType::{
    Bool, Byte, DInt, DWord, Int, LInt, LReal, LTime, LWord, Real, SInt, Time, UDInt, UInt,
    ULInt, USInt, WChar, Word,
};

#[test]
fn identity_holds_for_every_type() {
    for ty in ElementaryType::ALL {
        assert_eq!(resolve(ty, ty), CastRule::Identity, "{ty}");
    }
}

#[test]
fn identity_only_on_diagonal() {
    let lattice = CastLattice::global();
    for from in ElementaryType::ALL {
        for to in ElementaryType::ALL {
            if from != to {
                assert_ne!(lattice.resolve(from, to), CastRule::Identity);
            }
        }
    }
}

#[test]
fn implicit_and_explicit_sets_are_disjoint() {
    let lattice = CastLattice::global();
    let implicit = lattice.implicit_edges();
    for edge in lattice.explicit_edges() {
        assert!(!implicit.contains(&edge), "{edge:?}");
    }
}

#[test]
fn implicit_relation_is_transitively_closed() {
    let gaps = CastLattice::global().implicit_closure_gaps();
    assert!(gaps.is_empty(), "derived implicit edges not enumerated: {gaps:?}");
}

#[test]
fn implicit_edges_never_narrow() {
    for (from, to) in CastLattice::global().implicit_edges() {
        let (Some(from_bits), Some(to_bits)) = (from.bit_width(), to.bit_width()) else {
            continue;
        };
        assert!(from_bits <= to_bits, "{from} -> {to}");
    }
}

#[test]
fn implicit_widening_follows_ladders() {
    assert_eq!(resolve(Byte, Word), CastRule::Implicit);
    assert_eq!(resolve(Word, DWord), CastRule::Implicit);
    assert_eq!(resolve(USInt, UDInt), CastRule::Implicit);
    assert_eq!(resolve(SInt, DInt), CastRule::Implicit);
    assert_eq!(resolve(UInt, DInt), CastRule::Implicit);
    assert_eq!(resolve(Bool, Word), CastRule::Implicit);
}

#[test]
fn narrowing_and_cross_family_need_explicit() {
    assert_eq!(resolve(DInt, Int), CastRule::ExplicitOnly);
    assert_eq!(resolve(UInt, Int), CastRule::ExplicitOnly);
    assert_eq!(resolve(SInt, USInt), CastRule::ExplicitOnly);
    assert_eq!(resolve(Word, Byte), CastRule::ExplicitOnly);
    assert_eq!(resolve(Int, Word), CastRule::ExplicitOnly);
    assert_eq!(resolve(Byte, Int), CastRule::ExplicitOnly);
}

#[test]
fn unrelated_families_are_invalid() {
    assert_eq!(resolve(Int, Bool), CastRule::Invalid);
    assert_eq!(resolve(Time, DInt), CastRule::Invalid);
    assert_eq!(resolve(ElementaryType::String, Int), CastRule::Invalid);
    assert_eq!(resolve(Byte, ElementaryType::Char), CastRule::Invalid);
    assert_eq!(resolve(ElementaryType::Array, Int), CastRule::Invalid);
}

#[cfg(all(feature = "wide-types", feature = "float-types"))]
#[test]
fn wide_and_float_edges_are_enabled_by_default() {
    assert_eq!(resolve(DWord, LWord), CastRule::Implicit);
    assert_eq!(resolve(DInt, LReal), CastRule::Implicit);
    assert_eq!(resolve(Int, Real), CastRule::Implicit);
    assert_eq!(resolve(DInt, Real), CastRule::ExplicitOnly);
    assert_eq!(resolve(UDInt, LReal), CastRule::Implicit);
    assert_eq!(resolve(UDInt, Real), CastRule::ExplicitOnly);
    assert_eq!(resolve(LReal, Real), CastRule::ExplicitOnly);
    assert_eq!(resolve(LInt, LReal), CastRule::ExplicitOnly);
    assert_eq!(resolve(Time, LTime), CastRule::Implicit);
    assert_eq!(resolve(LTime, Time), CastRule::ExplicitOnly);
}

#[cfg(not(feature = "wide-types"))]
#[test]
fn wide_edges_are_absent_without_feature() {
    assert_eq!(resolve(DWord, LWord), CastRule::Invalid);
    assert_eq!(resolve(LInt, LInt), CastRule::Identity);
}

#[test]
fn castable_type_prefers_destination() {
    assert_eq!(castable_type(Int, DInt), Some(DInt));
    assert_eq!(castable_type(DInt, Int), Some(DInt));
    assert_eq!(castable_type(Int, Int), Some(Int));
    assert_eq!(castable_type(SInt, USInt), None);
    assert_eq!(castable_type(Bool, Time), None);
}

#[test]
fn castable_type_duration_mixed_rules() {
    assert_eq!(castable_type_duration_mixed(Time, Time), Some(Time));
    assert_eq!(castable_type_duration_mixed(Time, LTime), None);
    assert_eq!(castable_type_duration_mixed(LTime, Time), None);
    assert_eq!(castable_type_duration_mixed(Time, DInt), Some(Time));
    assert_eq!(castable_type_duration_mixed(UInt, LTime), Some(LTime));
    assert_eq!(castable_type_duration_mixed(Time, Bool), None);
    assert_eq!(castable_type_duration_mixed(Int, DInt), Some(DInt));
    assert_eq!(castable_type_duration_mixed(WChar, Word), None);
}

#[cfg(feature = "float-types")]
#[test]
fn duration_mixed_accepts_floats() {
    assert_eq!(castable_type_duration_mixed(Real, Time), Some(Time));
}

#[test]
fn unsigned_signed_ladder_renders() {
    let rendered = CastLattice::global().render(&[Bool, Byte, Word, USInt, UInt, SInt, Int]);
    expect![[r#"
              B B W U U S I
        BOOL  = i i e e e e
        BYTE  . = i e e e e
        WORD  . e = e e e e
        USINT . e e = i e i
        UINT  . e e e = e e
        SINT  . e e e e = i
        INT   . e e e e e =
    "#]]
    .assert_eq(&rendered);
}

#[test]
fn every_integer_reaches_lint_or_ulint() {
    for ty in [USInt, UInt, UDInt] {
        if cfg!(feature = "wide-types") {
            assert_eq!(resolve(ty, ULInt), CastRule::Implicit);
        }
    }
    for ty in [SInt, Int, DInt] {
        if cfg!(feature = "wide-types") {
            assert_eq!(resolve(ty, LInt), CastRule::Implicit);
        }
    }
}
