#![no_main]

use libfuzzer_sys::fuzz_target;
use lithos_finalize::{recursive_finalizer, Attribute};

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(schema) = Attribute::from_json_str(source) {
        let _ = recursive_finalizer(&schema, "v", 0);
    }
});
