use fbnet_runtime::error::RuntimeError;
use fbnet_runtime::value::{
    assign, parse_array, ArrayKind, ArrayValue, Duration, Value, MAX_ARRAY_LEN,
};
use fbnet_types::ElementaryType;

fn ints(values: impl IntoIterator<Item = i16>) -> Vec<Value> {
    values.into_iter().map(Value::Int).collect()
}

#[test]
fn initializer_sequence_starts_at_zero() {
    let array = ArrayValue::from_values(ArrayKind::Fixed, ElementaryType::Int, ints(0..=10))
        .unwrap();
    assert_eq!((array.lower(), array.upper()), (0, 10));
    assert_eq!(array.len(), 11);
    for (index, value) in array.iter() {
        assert_eq!(value, &Value::Int(i16::try_from(index).unwrap()));
    }
}

#[test]
fn negative_lower_bound() {
    let array =
        ArrayValue::with_initializer(ArrayKind::Fixed, ElementaryType::Int, -10, 0, ints([1, 2]))
            .unwrap();
    assert_eq!(array.get(-10).unwrap(), &Value::Int(1));
    assert_eq!(array.get(-9).unwrap(), &Value::Int(2));
    assert_eq!(array.get(0).unwrap(), &Value::Int(0));
    assert!(matches!(
        array.get(1),
        Err(RuntimeError::RangeError { index: 1, lower: -10, upper: 0 })
    ));
}

#[test]
fn windowed_copy_keeps_absolute_indices() {
    let src = ArrayValue::from_values(ArrayKind::Fixed, ElementaryType::Int, ints(1..=11))
        .unwrap();
    let dest = ArrayValue::copy_from(ArrayKind::Fixed, ElementaryType::DInt, 3, 12, &src)
        .unwrap();
    assert_eq!((dest.lower(), dest.upper()), (3, 12));
    for index in 3..=10 {
        let expected = i32::try_from(index + 1).unwrap();
        assert_eq!(dest.get(index).unwrap(), &Value::DInt(expected), "[{index}]");
    }
    assert_eq!(dest.get(11).unwrap(), &Value::DInt(0));
    assert_eq!(dest.get(12).unwrap(), &Value::DInt(0));
}

#[test]
fn disjoint_window_is_all_defaults() {
    let src = ArrayValue::from_values(ArrayKind::Fixed, ElementaryType::Int, ints([7, 8]))
        .unwrap();
    let dest =
        ArrayValue::copy_from(ArrayKind::Resizable, ElementaryType::Int, 5, 6, &src).unwrap();
    assert!(dest.elements().iter().all(|value| *value == Value::Int(0)));
}

#[test]
fn windowed_copy_rejects_narrowing_elements() {
    let src =
        ArrayValue::from_values(ArrayKind::Fixed, ElementaryType::DInt, vec![Value::DInt(1)])
            .unwrap();
    assert!(matches!(
        ArrayValue::copy_from(ArrayKind::Fixed, ElementaryType::Int, 0, 0, &src),
        Err(RuntimeError::ConversionError {
            from: ElementaryType::DInt,
            to: ElementaryType::Int
        })
    ));
}

#[test]
fn untyped_initializer_into_fixed_and_resizable() {
    let untyped = ArrayValue::untyped(vec![Value::SInt(1), Value::Int(2), Value::DInt(3)]).unwrap();
    assert_eq!(untyped.element_type(), ElementaryType::DInt);
    assert_eq!(untyped.kind(), ArrayKind::Resizable);

    let mut fixed = ArrayValue::fixed(ElementaryType::LInt, 1, 2).unwrap();
    fixed.assign(&untyped).unwrap();
    assert_eq!((fixed.lower(), fixed.upper()), (1, 2));
    assert_eq!(fixed.elements(), &[Value::LInt(2), Value::LInt(3)]);

    let mut resizable = ArrayValue::resizable(ElementaryType::LInt, 5, 5).unwrap();
    resizable.assign(&untyped).unwrap();
    assert_eq!((resizable.lower(), resizable.upper()), (0, 2));
    assert_eq!(
        resizable.elements(),
        &[Value::LInt(1), Value::LInt(2), Value::LInt(3)]
    );
}

#[test]
fn untyped_initializer_needs_a_common_type() {
    assert!(matches!(
        ArrayValue::untyped(vec![Value::Int(1), Value::Bool(true), Value::Time(Duration::ZERO)]),
        Err(RuntimeError::UnsupportedType(_))
    ));
}

#[test]
fn resize_keeps_overlap() {
    let mut array =
        ArrayValue::from_values(ArrayKind::Resizable, ElementaryType::Int, ints([10, 11, 12]))
            .unwrap();
    array.resize(1, 4).unwrap();
    assert_eq!(array.elements(), ints([11, 12, 0, 0]).as_slice());
}

#[test]
fn fixed_bounds_cannot_change() {
    let mut array = ArrayValue::fixed(ElementaryType::Int, 0, 3).unwrap();
    assert_eq!(array.resize(0, 7), Err(RuntimeError::FixedBounds));
    assert_eq!(array.len(), 4);
}

#[test]
fn bounds_validation() {
    let empty = ArrayValue::fixed(ElementaryType::Bool, 0, -1).unwrap();
    assert!(empty.is_empty());
    assert!(matches!(
        ArrayValue::fixed(ElementaryType::Bool, 5, 3),
        Err(RuntimeError::InvalidBounds { lower: 5, upper: 3 })
    ));
    let too_long = i64::try_from(MAX_ARRAY_LEN).unwrap();
    assert_eq!(
        ArrayValue::fixed(ElementaryType::Bool, 0, too_long),
        Err(RuntimeError::InvalidBounds {
            lower: 0,
            upper: too_long
        })
    );
    assert!(matches!(
        ArrayValue::with_initializer(ArrayKind::Fixed, ElementaryType::Int, 0, 1, ints([1, 2, 3])),
        Err(RuntimeError::RangeError { .. })
    ));
}

#[test]
fn bounds_at_the_top_of_the_index_range() {
    let top = i64::MAX;
    let mut src = ArrayValue::fixed(ElementaryType::Int, top - 2, top).unwrap();
    src.set(top - 1, &Value::Int(7)).unwrap();
    src.set(top, &Value::Int(8)).unwrap();
    assert_eq!(src.iter().count(), 3);
    assert_eq!(src.iter().last(), Some((top, &Value::Int(8))));

    let window =
        ArrayValue::copy_from(ArrayKind::Fixed, ElementaryType::DInt, top - 1, top, &src).unwrap();
    assert_eq!(window.elements(), &[Value::DInt(7), Value::DInt(8)]);

    let mut resizable = ArrayValue::resizable(ElementaryType::Int, top, top).unwrap();
    resizable.resize(top - 3, top).unwrap();
    assert_eq!(resizable.len(), 4);
}

#[test]
fn element_store_casts_implicitly() {
    let mut array = ArrayValue::fixed(ElementaryType::Int, 0, 1).unwrap();
    array.set(1, &Value::SInt(-3)).unwrap();
    assert_eq!(array.get(1).unwrap(), &Value::Int(-3));
    assert!(matches!(
        array.set(0, &Value::DInt(1)),
        Err(RuntimeError::ConversionError { .. })
    ));
    assert!(matches!(
        array.set(2, &Value::Int(1)),
        Err(RuntimeError::RangeError { index: 2, .. })
    ));
}

#[test]
fn array_assignment_through_values() {
    let mut dst = Value::Array(ArrayValue::fixed(ElementaryType::DInt, 0, 1).unwrap());
    let src = Value::Array(
        ArrayValue::from_values(ArrayKind::Fixed, ElementaryType::Int, ints([4, 5, 6])).unwrap(),
    );
    assign(&mut dst, &src).unwrap();
    let array = dst.as_array().unwrap();
    assert_eq!(array.elements(), &[Value::DInt(4), Value::DInt(5)]);

    assert!(matches!(
        assign(&mut dst, &Value::DInt(1)),
        Err(RuntimeError::ConversionError {
            to: ElementaryType::Array,
            ..
        })
    ));
}

#[test]
fn bracketed_literal_for_an_element_type() {
    let array = parse_array(ArrayKind::Fixed, ElementaryType::Int, "[1, -2, SINT#3, 16#10]").unwrap();
    assert_eq!(array.elements(), ints([1, -2, 3, 16]).as_slice());
    assert_eq!((array.lower(), array.upper()), (0, 3));

    let empty = parse_array(ArrayKind::Resizable, ElementaryType::Int, "[ ]").unwrap();
    assert_eq!(empty.len(), 0);

    assert!(parse_array(ArrayKind::Fixed, ElementaryType::Int, "[DINT#3]").is_err());
    assert!(parse_array(ArrayKind::Fixed, ElementaryType::Int, "[1,,2]").is_err());
    assert!(parse_array(ArrayKind::Fixed, ElementaryType::Int, "1, 2").is_err());
}
