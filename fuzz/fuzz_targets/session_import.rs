#![no_main]

use libfuzzer_sys::fuzz_target;
use sonda::{classify, json_output, CaptureConfig};

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(mut records) = json_output::parse_records(text) {
            classify::replay(&mut records, &CaptureConfig::default());
            let _ = sonda::table::render_table(&records);
            let _ = sonda::csv_output::to_csv(&records);
        }
    }
});
