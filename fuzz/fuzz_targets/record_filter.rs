#![no_main]

use libfuzzer_sys::fuzz_target;
use sonda::filter::RecordFilter;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Parsing must never panic, whatever the input
        let _ = RecordFilter::from_expr(input);
    }
});
