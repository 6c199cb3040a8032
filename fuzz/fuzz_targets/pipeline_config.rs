#![no_main]

use libfuzzer_sys::fuzz_target;
use rowpass::csv_output::MemorySink;
use rowpass::pipeline::{build_chain, PipelineConfig};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok(config) = PipelineConfig::from_toml_str(input) {
            let _ = build_chain(&config, Box::new(MemorySink::new()));
        }
    }
});
