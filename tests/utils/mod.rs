// Shared helpers for the integration tests

#![allow(dead_code)]

use rowpass::csv_output::{feed_csv, MemorySink};
use rowpass::pass::Stage;

/// Header plus rows rendered as CSV text
pub fn csv(rows: &[&[&str]]) -> String {
    let mut out = String::new();
    for row in rows {
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// Run `stage` over `input`, returning the collected output rows
pub fn run_stage<S: Stage>(mut stage: S, input: &str) -> rowpass::Result<Vec<Vec<String>>> {
    let sink = MemorySink::new();
    stage.set_next(Box::new(sink.clone()));
    feed_csv(input.as_bytes(), &mut stage)?;
    assert_eq!(sink.streams_ended(), 1, "stream end must be forwarded once");
    Ok(sink.rows())
}

/// `L{row}_C{col}` grid used by the reshape fixtures
pub fn label_grid(rows: usize, cols: usize) -> String {
    let mut out = String::new();
    for r in 0..rows {
        let cells: Vec<String> = (0..cols).map(|c| format!("L{}_C{}", r, c)).collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out
}
