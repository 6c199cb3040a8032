//! The streaming contract every stage implements
//!
//! A driver pushes one `process_token` per cell, one `process_line` per row
//! and a single `process_stream` at end of input. Each stage owns its
//! successor and forwards to it; the last stage is a sink.

use crate::error::{PassError, Result};

/// Three-method streaming interface
pub trait Pass {
    /// Accept the next cell of the current row
    fn process_token(&mut self, token: &[u8]) -> Result<()>;

    /// End of the current row; the column index resets to zero
    fn process_line(&mut self) -> Result<()>;

    /// End of input: flush buffered output, then forward exactly once
    fn process_stream(&mut self) -> Result<()>;
}

/// A pass that forwards to a single successor
pub trait Stage: Pass {
    /// Install the downstream pass, replacing any previous one
    fn set_next(&mut self, next: Box<dyn Pass>);
}

impl<P: Pass + ?Sized> Pass for Box<P> {
    fn process_token(&mut self, token: &[u8]) -> Result<()> {
        (**self).process_token(token)
    }

    fn process_line(&mut self) -> Result<()> {
        (**self).process_line()
    }

    fn process_stream(&mut self) -> Result<()> {
        (**self).process_stream()
    }
}

/// Chain stages in order in front of `sink`, returning the head of the chain
pub fn chain(stages: Vec<Box<dyn Stage>>, sink: Box<dyn Pass>) -> Box<dyn Pass> {
    let mut next = sink;
    for mut stage in stages.into_iter().rev() {
        stage.set_next(next);
        next = Box::new(stage);
    }
    next
}

/// Push a whole row through a pass
pub fn push_row<P, I, T>(pass: &mut P, tokens: I) -> Result<()>
where
    P: Pass + ?Sized,
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    for token in tokens {
        pass.process_token(token.as_ref())?;
    }
    pass.process_line()
}

/// Owned handle to a stage's successor
///
/// Every forward goes through here so a stage used before it is wired
/// fails with a configuration error instead of silently dropping rows.
pub struct Downstream {
    stage: &'static str,
    next: Option<Box<dyn Pass>>,
}

impl Downstream {
    pub fn new(stage: &'static str) -> Self {
        Self { stage, next: None }
    }

    pub fn set(&mut self, next: Box<dyn Pass>) {
        self.next = Some(next);
    }

    pub fn is_set(&self) -> bool {
        self.next.is_some()
    }

    /// Fail unless a successor is configured
    pub fn ensure(&self) -> Result<()> {
        if self.next.is_some() {
            Ok(())
        } else {
            Err(PassError::no_successor(self.stage))
        }
    }

    fn get(&mut self) -> Result<&mut (dyn Pass + 'static)> {
        let stage = self.stage;
        self.next
            .as_deref_mut()
            .ok_or_else(|| PassError::no_successor(stage))
    }

    pub fn token(&mut self, token: &[u8]) -> Result<()> {
        self.get()?.process_token(token)
    }

    pub fn line(&mut self) -> Result<()> {
        self.get()?.process_line()
    }

    pub fn stream(&mut self) -> Result<()> {
        self.get()?.process_stream()
    }

    /// Forward a complete row
    pub fn row<I, T>(&mut self, tokens: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let next = self.get()?;
        push_row(next, tokens)
    }
}

impl std::fmt::Debug for Downstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downstream")
            .field("stage", &self.stage)
            .field("connected", &self.next.is_some())
            .finish()
    }
}

/// Column-index bookkeeping for header-fixed row widths
///
/// The first row seen fixes the width; every later row must match it.
#[derive(Debug, Clone, Default)]
pub struct ColumnCursor {
    width: Option<usize>,
    column: usize,
    row: usize,
}

impl ColumnCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while the header row is being read
    pub fn in_header(&self) -> bool {
        self.width.is_none()
    }

    /// Header width, once the header row has ended
    pub fn width(&self) -> Option<usize> {
        self.width
    }

    /// Number of data rows completed so far
    pub fn data_rows(&self) -> usize {
        self.row
    }

    /// True if no token or line has been seen since the last reset
    pub fn is_pristine(&self) -> bool {
        self.width.is_none() && self.column == 0
    }

    /// Claim the column index for the next token
    pub fn advance(&mut self) -> Result<usize> {
        let column = self.column;
        if let Some(width) = self.width {
            if column >= width {
                return Err(PassError::SchemaMismatch(format!(
                    "row {} has more than the {} columns declared by the header",
                    self.row + 1,
                    width
                )));
            }
        }
        self.column += 1;
        Ok(column)
    }

    /// Close the current row; returns true if it was the header
    pub fn end_line(&mut self) -> Result<bool> {
        let seen = std::mem::take(&mut self.column);
        match self.width {
            None => {
                self.width = Some(seen);
                Ok(true)
            }
            Some(width) if width == seen => {
                self.row += 1;
                Ok(false)
            }
            Some(width) => Err(PassError::SchemaMismatch(format!(
                "row {} has {} columns, header declared {}",
                self.row + 1,
                seen,
                width
            ))),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
