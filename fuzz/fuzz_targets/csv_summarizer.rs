#![no_main]

use libfuzzer_sys::fuzz_target;
use rowpass::csv_output::{feed_csv, MemorySink};
use rowpass::summarizer::{StatFlags, Summarizer};

fuzz_target!(|data: &[u8]| {
    let sink = MemorySink::new();
    let mut summarizer = Summarizer::new().with_next(Box::new(sink.clone()));
    summarizer.add_group("^[a-m]").unwrap();
    let every = StatFlags::ALL.iter().fold(StatFlags::NONE, |acc, &flag| acc | flag);
    summarizer.add_data("[n-z0-9]", every).unwrap();

    // Malformed tables must come back as errors, never as a panic
    if feed_csv(data, &mut summarizer).is_ok() {
        assert_eq!(sink.streams_ended(), 1);
    }
});
