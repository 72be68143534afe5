#![no_main]

use fbnet_runtime::value::{cast_explicit, cast_implicit, from_literal, to_literal};
use fbnet_types::ElementaryType;
use libfuzzer_sys::fuzz_target;

const MAX_LITERAL_BYTES: usize = 256;

fuzz_target!(|data: &[u8]| {
    let Some((&seed, rest)) = data.split_first() else {
        return;
    };
    let Some(target) = ElementaryType::from_ordinal(usize::from(seed) % ElementaryType::COUNT) else {
        return;
    };
    let capped = &rest[..rest.len().min(MAX_LITERAL_BYTES)];
    let Ok(value) = from_literal(&String::from_utf8_lossy(capped)) else {
        return;
    };
    // an implicit cast that succeeds must agree with the explicit one
    if let Ok(widened) = cast_implicit(&value, target) {
        let explicit = cast_explicit(&value, target).ok();
        assert_eq!(explicit.as_ref().map(to_literal), Some(to_literal(&widened)));
    }
});
