// Rows to columns

use serde::Deserialize;
use tracing::{debug, info};

use super::cell_store::CellStore;
use crate::arena::check_token;
use crate::error::{PassError, Result};
use crate::group_table::GroupTable;
use crate::pass::{ColumnCursor, Downstream, Pass, Stage};
use crate::rules::{KeywordRules, RuleGate};
use crate::token_queue::TokenQueue;

/// What the splitter does with a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitAction {
    /// Part of the row key
    Group,
    /// Its values name the new columns
    Split,
    /// Its values fill the new columns
    Data,
    /// Dropped
    Remove,
}

#[derive(Debug, Default)]
struct SplitState {
    cursor: ColumnCursor,
    actions: Vec<SplitAction>,
    group_names: Vec<Vec<u8>>,
    data_names: Vec<Vec<u8>>,
    groups: GroupTable,
    splits: GroupTable,
    /// One record per data row, slotted by split value
    cells: CellStore,
    /// Data values of the current row
    row_data: TokenQueue,
}

/// Pivots the values of a split column into columns of their own
///
/// Rows sharing a group key collapse into one output row with a cell per
/// (split value, data column). Split values are ordered by first
/// appearance. A group that repeats a split value gets extra output rows;
/// combinations never seen are empty cells.
pub struct Splitter {
    rules: KeywordRules<SplitAction>,
    gate: RuleGate,
    state: SplitState,
    next: Downstream,
}

impl Default for Splitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Splitter {
    /// Splitter whose unmatched columns are group columns
    pub fn new() -> Self {
        Self {
            rules: KeywordRules::new(SplitAction::Group),
            gate: RuleGate::new("splitter"),
            state: SplitState::default(),
            next: Downstream::new("splitter"),
        }
    }

    pub fn add_keyword(&mut self, keyword: &str, action: SplitAction) -> Result<()> {
        self.gate.check()?;
        self.rules.add_keyword(keyword, action);
        Ok(())
    }

    pub fn add_rule(&mut self, pattern: &str, action: SplitAction) -> Result<()> {
        self.gate.check()?;
        self.rules.add_rule(pattern, action)
    }

    pub fn set_default(&mut self, action: SplitAction) -> Result<()> {
        self.gate.check()?;
        self.rules.set_default(action);
        Ok(())
    }

    pub fn with_next(mut self, next: Box<dyn Pass>) -> Self {
        self.next.set(next);
        self
    }

    pub fn group_count(&self) -> usize {
        self.state.groups.len()
    }

    /// Distinct split values seen so far
    pub fn split_count(&self) -> usize {
        self.state.splits.len()
    }

    pub fn reset(&mut self) {
        self.state = SplitState::default();
        self.gate.unlock();
    }

    fn header_token(&mut self, column: usize, token: &[u8]) {
        let action = self.rules.classify(token);
        match action {
            SplitAction::Group => self.state.group_names.push(token.to_vec()),
            SplitAction::Data => self.state.data_names.push(token.to_vec()),
            SplitAction::Split | SplitAction::Remove => {}
        }
        debug!(
            column,
            header = %String::from_utf8_lossy(token),
            ?action,
            "splitter column classified"
        );
        self.state.actions.push(action);
    }

    fn finish_header(&self) -> Result<()> {
        let split_columns = self
            .state
            .actions
            .iter()
            .filter(|&&action| action == SplitAction::Split)
            .count();
        if split_columns != 1 {
            return Err(PassError::Configuration(format!(
                "splitter needs exactly one split column, header has {}",
                split_columns
            )));
        }
        if self.state.data_names.is_empty() {
            return Err(PassError::Configuration(
                "splitter header has no data column".to_string(),
            ));
        }
        Ok(())
    }

    fn finish_row(&mut self) -> Result<()> {
        let state = &mut self.state;
        let (group, _) = state.groups.commit()?;
        let (split, _) = state.splits.commit()?;
        state.cells.push(group, split, &state.row_data)?;
        state.row_data.clear();
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let SplitState {
            cursor,
            group_names,
            data_names,
            groups,
            splits,
            mut cells,
            ..
        } = std::mem::take(&mut self.state);
        self.gate.unlock();

        if cursor.in_header() {
            return self.next.stream();
        }

        let mut row: Vec<Vec<u8>> = group_names;
        for (_, key) in splits.iter() {
            let value = key.parts().collect::<Vec<_>>().concat();
            for name in &data_names {
                if data_names.len() == 1 {
                    row.push(value.clone());
                } else {
                    let mut header = name.clone();
                    header.push(b'(');
                    header.extend_from_slice(&value);
                    header.push(b')');
                    row.push(header);
                }
            }
        }
        self.next.row(&row)?;

        let width = data_names.len();
        let mut emitted = 0usize;
        for (group, key) in groups.iter() {
            let depth = cells.arrange(group, splits.len());
            for line in 0..depth {
                for part in key.parts() {
                    self.next.token(part)?;
                }
                for split in 0..splits.len() {
                    match cells.cell(line, split) {
                        Some(values) => {
                            for value in values {
                                self.next.token(value)?;
                            }
                        }
                        None => {
                            for _ in 0..width {
                                self.next.token(b"")?;
                            }
                        }
                    }
                }
                self.next.line()?;
                emitted += 1;
            }
        }

        info!(
            groups = groups.len(),
            splits = splits.len(),
            buffered = cells.records(),
            value_bytes = cells.value_bytes(),
            arena_growths = cells.arena_growths(),
            blocks = cells.pool_stats().blocks,
            rows = emitted,
            "splitter flushed"
        );
        self.next.stream()
    }
}

impl Pass for Splitter {
    fn process_token(&mut self, token: &[u8]) -> Result<()> {
        self.next.ensure()?;
        self.gate.lock();
        let column = self.state.cursor.advance()?;
        check_token(token, column)?;

        if self.state.cursor.in_header() {
            self.header_token(column, token);
            return Ok(());
        }
        match self.state.actions[column] {
            SplitAction::Group => self.state.groups.push_part(token),
            SplitAction::Split => self.state.splits.push_part(token),
            SplitAction::Data => self.state.row_data.push(token),
            SplitAction::Remove => Ok(()),
        }
    }

    fn process_line(&mut self) -> Result<()> {
        self.next.ensure()?;
        self.gate.lock();
        if self.state.cursor.end_line()? {
            self.finish_header()
        } else {
            self.finish_row()
        }
    }

    fn process_stream(&mut self) -> Result<()> {
        self.flush()
    }
}

impl Stage for Splitter {
    fn set_next(&mut self, next: Box<dyn Pass>) {
        self.next.set(next);
    }
}
