#![no_main]

use libfuzzer_sys::fuzz_target;
use lithos_finalize_engine::{FunctionRegistry, Template};
use lithos_finalize_helpers::{finalizer_helpers, DEFAULT_INDENT};
use once_cell::sync::Lazy;
use serde_json::json;

static REGISTRY: Lazy<FunctionRegistry> = Lazy::new(|| finalizer_helpers(DEFAULT_INDENT));

fuzz_target!(|data: &[u8]| {
    let source = match std::str::from_utf8(data) {
        Ok(src) => src,
        Err(_) => return,
    };

    if let Ok(template) =
        Template::parse_with_functions("fuzz-template-render", source, REGISTRY.clone())
    {
        let _ = template.render(&json!({"depth": 2, "target": "v", "field": "name", "default": 1}));
    }
});
