//! Pivoting stages
//!
//! - [`Stacker`]: columns to rows. Every "stack" column of a row becomes an
//!   output row of `(leave columns..., header name, value)`.
//! - [`Splitter`]: rows to columns. Rows are grouped by key and the values
//!   of the data columns are spread over one new column per distinct value
//!   of the split column.
//! - [`RowJoiner`]: full outer join of several streams on key columns.
//!
//! Splitter and joiner only know their final column set once every input
//! has ended, so they buffer every row until then. A row's values go into
//! one arena shared by the whole stage, and the per-group chains of rows
//! live in a [`BlockPool`].
//!
//! [`BlockPool`]: crate::block_pool::BlockPool

mod cell_store;
mod row_joiner;
mod splitter;
mod stacker;

pub use row_joiner::{JoinInput, RowJoiner};
pub use splitter::{SplitAction, Splitter};
pub use stacker::{StackAction, Stacker};
