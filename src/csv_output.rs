//! CSV at the two ends of a pipeline
//!
//! [`feed_csv`] drives a pass from line-oriented comma-separated text, and
//! [`CsvWriter`] / [`MemorySink`] terminate a chain.

use std::cell::RefCell;
use std::io::{BufRead, Write};
use std::rc::Rc;

use tracing::debug;

use crate::error::Result;
use crate::pass::Pass;

/// Drive `pass` with the rows of `reader`
///
/// Lines end at LF (a trailing CR is dropped) and cells are split on every
/// comma; quoting is not interpreted. `process_stream` is called exactly
/// once, also for empty input.
pub fn feed_csv<R, P>(mut reader: R, pass: &mut P) -> Result<()>
where
    R: BufRead,
    P: Pass + ?Sized,
{
    let mut line = Vec::new();
    let mut rows = 0usize;
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        for cell in line.split(|&b| b == b',') {
            pass.process_token(cell)?;
        }
        pass.process_line()?;
        rows += 1;
    }
    debug!(rows, "csv input exhausted");
    pass.process_stream()
}

/// Terminal pass writing comma-separated rows to `W`
///
/// Tokens are written verbatim; no quoting is applied.
#[derive(Debug)]
pub struct CsvWriter<W: Write> {
    out: W,
    at_line_start: bool,
    rows: usize,
}

impl<W: Write> CsvWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            at_line_start: true,
            rows: 0,
        }
    }

    /// Rows written so far
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Pass for CsvWriter<W> {
    fn process_token(&mut self, token: &[u8]) -> Result<()> {
        if !self.at_line_start {
            self.out.write_all(b",")?;
        }
        self.out.write_all(token)?;
        self.at_line_start = false;
        Ok(())
    }

    fn process_line(&mut self) -> Result<()> {
        self.out.write_all(b"\n")?;
        self.at_line_start = true;
        self.rows += 1;
        Ok(())
    }

    fn process_stream(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Captured {
    rows: Vec<Vec<Vec<u8>>>,
    current: Vec<Vec<u8>>,
    streams_ended: usize,
}

/// Terminal pass collecting rows in memory
///
/// Clones share the same buffer, so a test can keep one handle and give
/// the other to the chain.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Rc<RefCell<Captured>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed rows as raw bytes
    pub fn raw_rows(&self) -> Vec<Vec<Vec<u8>>> {
        self.inner.borrow().rows.clone()
    }

    /// Completed rows, lossily decoded
    pub fn rows(&self) -> Vec<Vec<String>> {
        self.inner
            .borrow()
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| String::from_utf8_lossy(cell).into_owned())
                    .collect()
            })
            .collect()
    }

    /// Completed rows rendered as CSV text
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        for row in self.rows() {
            out.push_str(&row.join(","));
            out.push('\n');
        }
        out
    }

    /// Number of `process_stream` calls received
    pub fn streams_ended(&self) -> usize {
        self.inner.borrow().streams_ended
    }

    pub fn clear(&self) {
        *self.inner.borrow_mut() = Captured::default();
    }
}

impl Pass for MemorySink {
    fn process_token(&mut self, token: &[u8]) -> Result<()> {
        self.inner.borrow_mut().current.push(token.to_vec());
        Ok(())
    }

    fn process_line(&mut self) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let row = std::mem::take(&mut inner.current);
        inner.rows.push(row);
        Ok(())
    }

    fn process_stream(&mut self) -> Result<()> {
        self.inner.borrow_mut().streams_ended += 1;
        Ok(())
    }
}
