// Full outer join of several streams on key columns

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, info};

use super::cell_store::CellStore;
use crate::arena::check_token;
use crate::error::{PassError, Result};
use crate::group_table::GroupTable;
use crate::pass::{ColumnCursor, Downstream, Pass};
use crate::rules::{RuleGate, RuleList};
use crate::token_queue::TokenQueue;

#[derive(Debug, Default)]
struct Source {
    cursor: ColumnCursor,
    /// Per column: the key part it supplies, `None` for a value column
    key_slots: Vec<Option<usize>>,
    key_names: Vec<Vec<u8>>,
    value_names: Vec<Vec<u8>>,
    /// Key parts of the current row, in join key order
    row_keys: Vec<Vec<u8>>,
    row_values: TokenQueue,
    ended: bool,
}

#[derive(Debug)]
struct JoinState {
    keys: RuleList<()>,
    gate: RuleGate,
    sources: Vec<Source>,
    /// Key names of the first source to finish its header
    key_names: Option<Vec<Vec<u8>>>,
    groups: GroupTable,
    cells: CellStore,
    next: Downstream,
}

/// Position in `reference` of each of `names`, if `names` is a permutation
/// of it
fn key_order(reference: &[Vec<u8>], names: &[Vec<u8>]) -> Option<Vec<usize>> {
    if reference.len() != names.len() {
        return None;
    }
    let mut taken = vec![false; reference.len()];
    names
        .iter()
        .map(|name| {
            let slot = (0..reference.len()).find(|&i| !taken[i] && reference[i] == *name)?;
            taken[slot] = true;
            Some(slot)
        })
        .collect()
}

impl JoinState {
    fn new(sources: usize) -> Self {
        Self {
            keys: RuleList::new(),
            gate: RuleGate::new("row joiner"),
            sources: (0..sources).map(|_| Source::default()).collect(),
            key_names: None,
            groups: GroupTable::new(),
            cells: CellStore::default(),
            next: Downstream::new("row joiner"),
        }
    }

    fn clear_stream(&mut self) {
        let count = self.sources.len();
        self.sources = (0..count).map(|_| Source::default()).collect();
        self.key_names = None;
        self.groups.clear();
        self.cells.clear();
        self.gate.unlock();
    }

    fn token(&mut self, source: usize, token: &[u8]) -> Result<()> {
        self.next.ensure()?;
        self.gate.lock();
        let keys = &self.keys;
        let input = &mut self.sources[source];
        if input.ended {
            return Err(PassError::Configuration(format!(
                "row joiner source {} received data after its stream ended",
                source
            )));
        }
        let column = input.cursor.advance()?;
        check_token(token, column)?;

        if input.cursor.in_header() {
            let is_key = keys.is_match(token);
            if is_key {
                input.key_slots.push(Some(input.key_names.len()));
                input.key_names.push(token.to_vec());
            } else {
                input.key_slots.push(None);
                input.value_names.push(token.to_vec());
            }
            debug!(
                source,
                column,
                header = %String::from_utf8_lossy(token),
                is_key,
                "row joiner column classified"
            );
            return Ok(());
        }

        match input.key_slots[column] {
            Some(slot) => {
                let part = &mut input.row_keys[slot];
                part.clear();
                part.extend_from_slice(token);
                Ok(())
            }
            None => input.row_values.push(token),
        }
    }

    fn line(&mut self, source: usize) -> Result<()> {
        self.next.ensure()?;
        self.gate.lock();
        if self.sources[source].ended {
            return Err(PassError::Configuration(format!(
                "row joiner source {} received a line after its stream ended",
                source
            )));
        }
        if self.sources[source].cursor.end_line()? {
            return self.finish_header(source);
        }

        let input = &mut self.sources[source];
        for part in &input.row_keys {
            self.groups.push_part(part)?;
        }
        let (group, _) = self.groups.commit()?;
        self.cells.push(group, source, &input.row_values)?;
        input.row_values.clear();
        Ok(())
    }

    /// Line the source's key columns up with the reference key names
    ///
    /// Keys are matched by name when both sources carry the same key names;
    /// otherwise by position among the key columns.
    fn finish_header(&mut self, source: usize) -> Result<()> {
        let input = &mut self.sources[source];
        let width = input.key_names.len();
        input.row_keys = vec![Vec::new(); width];

        if self.key_names.is_none() {
            self.key_names = Some(input.key_names.clone());
            return Ok(());
        }
        let reference = self.key_names.as_deref().unwrap_or_default();
        if reference.len() != width {
            return Err(PassError::SchemaMismatch(format!(
                "row joiner source {} has {} key columns, expected {}",
                source,
                width,
                reference.len()
            )));
        }
        match key_order(reference, &input.key_names) {
            Some(order) => {
                for slot in input.key_slots.iter_mut().flatten() {
                    *slot = order[*slot];
                }
            }
            None => debug!(source, "row joiner key names differ, matching by position"),
        }
        Ok(())
    }

    fn stream(&mut self, source: usize) -> Result<()> {
        if self.sources[source].ended {
            return Err(PassError::Configuration(format!(
                "row joiner source {} ended its stream twice",
                source
            )));
        }
        self.sources[source].ended = true;
        if self.sources.iter().all(|input| input.ended) {
            let flushed = self.flush();
            self.clear_stream();
            flushed
        } else {
            Ok(())
        }
    }

    fn flush(&mut self) -> Result<()> {
        if self.sources.iter().any(|input| !input.cursor.in_header()) {
            self.emit_rows()?;
        }
        self.next.stream()
    }

    fn emit_rows(&mut self) -> Result<()> {
        let mut header = self.key_names.clone().unwrap_or_default();
        for input in &self.sources {
            header.extend(input.value_names.iter().cloned());
        }
        self.next.row(&header)?;

        let widths: Vec<usize> = self.sources.iter().map(|s| s.value_names.len()).collect();
        let mut emitted = 0usize;
        for (group, key) in self.groups.iter() {
            let depth = self.cells.arrange(group, widths.len());
            for line in 0..depth {
                for part in key.parts() {
                    self.next.token(part)?;
                }
                for (source, &width) in widths.iter().enumerate() {
                    match self.cells.cell(line, source) {
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
            sources = self.sources.len(),
            keys = self.groups.len(),
            buffered = self.cells.records(),
            value_bytes = self.cells.value_bytes(),
            arena_growths = self.cells.arena_growths(),
            blocks = self.cells.pool_stats().blocks,
            rows = emitted,
            "row joiner flushed"
        );
        Ok(())
    }
}

/// Fan-in stage joining `N` streams on their key columns
///
/// Each source is fed through its own [`JoinInput`]. Key columns are picked
/// by the [`add_key`](RowJoiner::add_key) rules and must number the same in
/// every source. The first source to finish its header names the key; the
/// key columns of every other source are matched to those names, or by
/// position when the names differ. Output is produced once every source has
/// ended: the key columns, then every source's other columns in source
/// order, one row per key in discovery order. A source
/// without a row for a key contributes empty cells; a source with several
/// rows for a key yields several output rows.
#[derive(Clone)]
pub struct RowJoiner {
    state: Rc<RefCell<JoinState>>,
}

impl RowJoiner {
    pub fn new(sources: usize) -> Self {
        Self {
            state: Rc::new(RefCell::new(JoinState::new(sources.max(1)))),
        }
    }

    pub fn sources(&self) -> usize {
        self.state.borrow().sources.len()
    }

    /// Columns whose header matches `pattern` form the join key
    pub fn add_key(&mut self, pattern: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.gate.check()?;
        state.keys.add(pattern, ())
    }

    pub fn set_next(&mut self, next: Box<dyn Pass>) {
        self.state.borrow_mut().next.set(next);
    }

    pub fn with_next(mut self, next: Box<dyn Pass>) -> Self {
        self.set_next(next);
        self
    }

    /// Pass feeding source `source`
    pub fn input(&self, source: usize) -> Result<JoinInput> {
        let sources = self.sources();
        if source >= sources {
            return Err(PassError::Configuration(format!(
                "row joiner has {} sources, no source {}",
                sources, source
            )));
        }
        Ok(JoinInput {
            state: Rc::clone(&self.state),
            source,
        })
    }

    /// Discard partial input from every source
    pub fn reset(&mut self) {
        self.state.borrow_mut().clear_stream();
    }
}

/// One source of a [`RowJoiner`]
pub struct JoinInput {
    state: Rc<RefCell<JoinState>>,
    source: usize,
}

impl JoinInput {
    pub fn source(&self) -> usize {
        self.source
    }
}

impl Pass for JoinInput {
    fn process_token(&mut self, token: &[u8]) -> Result<()> {
        self.state.borrow_mut().token(self.source, token)
    }

    fn process_line(&mut self) -> Result<()> {
        self.state.borrow_mut().line(self.source)
    }

    fn process_stream(&mut self) -> Result<()> {
        self.state.borrow_mut().stream(self.source)
    }
}
