#![no_main]

use libfuzzer_sys::fuzz_target;
use lithos_finalize_engine::{literal_value, Template};

fuzz_target!(|data: &[u8]| {
    if let Ok(source) = std::str::from_utf8(data) {
        let _ = Template::parse_str("fuzz-template", source);
        let _ = literal_value(source);
    }
});
