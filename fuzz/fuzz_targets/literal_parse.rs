#![no_main]

use fbnet_runtime::value::{from_literal, semantic_eq, to_literal, Value};
use libfuzzer_sys::fuzz_target;

const MAX_LITERAL_BYTES: usize = 512;

// NaN never compares equal, so those values are checked on their text.
fn has_nan(value: &Value) -> bool {
    match value {
        Value::Real(v) => v.is_nan(),
        Value::LReal(v) => v.is_nan(),
        Value::Array(array) => array.elements().iter().any(has_nan),
        _ => false,
    }
}

fuzz_target!(|data: &[u8]| {
    let capped = &data[..data.len().min(MAX_LITERAL_BYTES)];
    let text = String::from_utf8_lossy(capped);
    let Ok(value) = from_literal(&text) else {
        return;
    };
    let printed = to_literal(&value);
    let reparsed = match from_literal(&printed) {
        Ok(reparsed) => reparsed,
        Err(err) => panic!("canonical text {printed:?} of {text:?} does not parse: {err}"),
    };
    if has_nan(&value) {
        assert_eq!(to_literal(&reparsed), printed);
    } else {
        assert!(
            semantic_eq(&value, &reparsed),
            "{text:?} printed as {printed:?} reparsed to {reparsed:?}"
        );
    }
});
