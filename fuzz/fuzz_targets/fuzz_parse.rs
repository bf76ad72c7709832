#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    match fg_parser::parse(input) {
        Ok(tree) => {
            let _ = serde_json::to_string(&tree);
            let _ = fg_parser::build_graph(&tree);
        }
        Err(error) => {
            if let Some(span) = error.span() {
                assert!(span.start.byte <= input.len());
                assert!(span.end.byte <= input.len());
            }
        }
    }
});
