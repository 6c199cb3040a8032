//! rowpass - streaming transformation passes over tabular data
//!
//! A table travels through a chain of [`pass::Pass`] stages as a header row
//! followed by data rows, one `process_token` per cell, one `process_line`
//! per row and a final `process_stream`. The stages in this crate are:
//!
//! - [`summarizer::Summarizer`]: group-by statistics (count, sum, min, max,
//!   average, variance, standard deviation, missing values)
//! - [`variance_analyzer::VarianceAnalyzer`]: one-way ANOVA per data column
//! - [`reshape::Stacker`], [`reshape::Splitter`], [`reshape::RowJoiner`]:
//!   pivots and joins
//!
//! Group keys live in an offset-addressed [`arena::ByteArena`], per-group
//! cells in a [`block_pool::BlockPool`], and buffered cell values in
//! copy-on-write [`token_queue::TokenQueue`]s.
//!
//! ```
//! use rowpass::csv_output::{feed_csv, MemorySink};
//! use rowpass::summarizer::{StatFlags, Summarizer};
//!
//! # fn main() -> rowpass::error::Result<()> {
//! let sink = MemorySink::new();
//! let mut summarizer = Summarizer::new().with_next(Box::new(sink.clone()));
//! summarizer.add_group("^city$")?;
//! summarizer.add_data("^temp$", StatFlags::AVERAGE)?;
//!
//! feed_csv("city,temp\noslo,4\nrome,18\noslo,6\n".as_bytes(), &mut summarizer)?;
//! assert_eq!(sink.to_csv(), "city,AVERAGE(temp)\noslo,5\nrome,18\n");
//! # Ok(())
//! # }
//! ```

pub mod arena;
pub mod block_pool;
pub mod cli;
pub mod csv_output;
pub mod error;
pub mod format;
pub mod group_table;
pub mod numeric;
pub mod pass;
pub mod pipeline;
pub mod reshape;
pub mod rules;
pub mod summarizer;
pub mod token_queue;
pub mod variance_analyzer;

pub use error::{PassError, Result};
