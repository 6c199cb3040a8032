// Columns to rows

use serde::Deserialize;
use tracing::{debug, info};

use crate::arena::{check_token, ByteArena, Span};
use crate::error::Result;
use crate::pass::{ColumnCursor, Downstream, Pass, Stage};
use crate::rules::{KeywordRules, RuleGate};
use crate::token_queue::TokenQueue;

/// What the stacker does with a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackAction {
    /// Repeated on every emitted row
    Leave,
    /// Turned into a (keyword, data) pair
    Stack,
    /// Dropped
    Remove,
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Leave,
    Stack(Span),
    Remove,
}

#[derive(Debug, Default)]
struct StackState {
    cursor: ColumnCursor,
    slots: Vec<Slot>,
    /// Header names of the stack columns
    names: ByteArena,
    /// Leave values of the current row
    leave: TokenQueue,
    /// Stack columns of the current row and their values
    stacked: Vec<Span>,
    values: TokenQueue,
    emitted: usize,
}

/// Unpivots "stack" columns into `keyword,data` rows
pub struct Stacker {
    rules: KeywordRules<StackAction>,
    gate: RuleGate,
    keyword_name: Vec<u8>,
    data_name: Vec<u8>,
    state: StackState,
    next: Downstream,
}

impl Default for Stacker {
    fn default() -> Self {
        Self::new()
    }
}

impl Stacker {
    /// Stacker whose unmatched columns are stacked
    pub fn new() -> Self {
        Self {
            rules: KeywordRules::new(StackAction::Stack),
            gate: RuleGate::new("stacker"),
            keyword_name: b"keyword".to_vec(),
            data_name: b"data".to_vec(),
            state: StackState::default(),
            next: Downstream::new("stacker"),
        }
    }

    /// Action for a column whose header is exactly `keyword`
    pub fn add_keyword(&mut self, keyword: &str, action: StackAction) -> Result<()> {
        self.gate.check()?;
        self.rules.add_keyword(keyword, action);
        Ok(())
    }

    /// Action for columns whose header matches `pattern`
    pub fn add_rule(&mut self, pattern: &str, action: StackAction) -> Result<()> {
        self.gate.check()?;
        self.rules.add_rule(pattern, action)
    }

    /// Action for columns no keyword or rule matches
    pub fn set_default(&mut self, action: StackAction) -> Result<()> {
        self.gate.check()?;
        self.rules.set_default(action);
        Ok(())
    }

    /// Names of the two synthesized output columns
    pub fn set_output_names(&mut self, keyword: &str, data: &str) -> Result<()> {
        self.gate.check()?;
        self.keyword_name = keyword.as_bytes().to_vec();
        self.data_name = data.as_bytes().to_vec();
        Ok(())
    }

    pub fn with_next(mut self, next: Box<dyn Pass>) -> Self {
        self.next.set(next);
        self
    }

    pub fn reset(&mut self) {
        self.state = StackState::default();
        self.gate.unlock();
    }

    fn header_token(&mut self, column: usize, token: &[u8]) -> Result<()> {
        let action = self.rules.classify(token);
        let slot = match action {
            StackAction::Leave => {
                self.next.token(token)?;
                Slot::Leave
            }
            StackAction::Stack => Slot::Stack(self.state.names.push_token(token)?),
            StackAction::Remove => Slot::Remove,
        };
        debug!(
            column,
            header = %String::from_utf8_lossy(token),
            ?action,
            "stacker column classified"
        );
        self.state.slots.push(slot);
        Ok(())
    }

    fn emit_row(&mut self) -> Result<()> {
        let state = &mut self.state;
        for &name in &state.stacked {
            for token in &state.leave {
                self.next.token(token)?;
            }
            self.next.token(state.names.token(name))?;
            match state.values.front() {
                Some(value) => self.next.token(value)?,
                None => self.next.token(b"")?,
            }
            state.values.pop();
            self.next.line()?;
            state.emitted += 1;
        }
        state.stacked.clear();
        state.leave.clear();
        state.values.clear();
        Ok(())
    }
}

impl Pass for Stacker {
    fn process_token(&mut self, token: &[u8]) -> Result<()> {
        self.next.ensure()?;
        self.gate.lock();
        let column = self.state.cursor.advance()?;
        check_token(token, column)?;

        if self.state.cursor.in_header() {
            return self.header_token(column, token);
        }
        match self.state.slots[column] {
            Slot::Leave => self.state.leave.push(token),
            Slot::Stack(name) => {
                self.state.stacked.push(name);
                self.state.values.push(token)
            }
            Slot::Remove => Ok(()),
        }
    }

    fn process_line(&mut self) -> Result<()> {
        self.next.ensure()?;
        self.gate.lock();
        if self.state.cursor.end_line()? {
            self.next.token(&self.keyword_name)?;
            self.next.token(&self.data_name)?;
            self.next.line()
        } else {
            self.emit_row()
        }
    }

    fn process_stream(&mut self) -> Result<()> {
        let state = std::mem::take(&mut self.state);
        self.gate.unlock();
        info!(
            rows = state.cursor.data_rows(),
            emitted = state.emitted,
            "stacker flushed"
        );
        self.next.stream()
    }
}

impl Stage for Stacker {
    fn set_next(&mut self, next: Box<dyn Pass>) {
        self.next.set(next);
    }
}
