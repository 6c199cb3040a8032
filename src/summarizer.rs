//! Streaming group-by aggregation
//!
//! The header row decides which columns form the group key and which
//! statistics each data column requests. Data rows update one cell per
//! (group, data column); nothing is forwarded until end of stream, when one
//! row per group is emitted in the order the groups were first seen.
//!
//! Output header: group column names, then `STAT(column)` for every
//! requested statistic, in the fixed order of [`StatFlags::ALL`].

use std::ops::{BitOr, BitOrAssign};

use tracing::{debug, info};

use crate::arena::check_token;
use crate::block_pool::{BlockPool, BlockPoolConfig, RowHandle};
use crate::error::Result;
use crate::format;
use crate::group_table::GroupTable;
use crate::pass::{ColumnCursor, Downstream, Pass, Stage};
use crate::rules::{ColumnRole, ColumnRules, RuleGate};

/// Set of statistics requested for a data column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StatFlags(u8);

impl StatFlags {
    pub const NONE: StatFlags = StatFlags(0);
    pub const MISSING: StatFlags = StatFlags(1);
    pub const COUNT: StatFlags = StatFlags(1 << 1);
    pub const SUM: StatFlags = StatFlags(1 << 2);
    pub const MIN: StatFlags = StatFlags(1 << 3);
    pub const MAX: StatFlags = StatFlags(1 << 4);
    pub const AVERAGE: StatFlags = StatFlags(1 << 5);
    pub const VARIANCE: StatFlags = StatFlags(1 << 6);
    pub const STDDEV: StatFlags = StatFlags(1 << 7);

    /// Every statistic, in output order
    pub const ALL: [StatFlags; 8] = [
        StatFlags::MISSING,
        StatFlags::COUNT,
        StatFlags::SUM,
        StatFlags::MIN,
        StatFlags::MAX,
        StatFlags::AVERAGE,
        StatFlags::VARIANCE,
        StatFlags::STDDEV,
    ];

    pub fn contains(self, other: StatFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Individual statistics in this set, in output order
    pub fn iter(self) -> impl Iterator<Item = StatFlags> {
        StatFlags::ALL
            .into_iter()
            .filter(move |&stat| self.contains(stat))
    }

    /// Header prefix of a single statistic
    pub fn name(self) -> &'static str {
        match self {
            StatFlags::MISSING => "MISSING",
            StatFlags::COUNT => "COUNT",
            StatFlags::SUM => "SUM",
            StatFlags::MIN => "MIN",
            StatFlags::MAX => "MAX",
            StatFlags::AVERAGE => "AVERAGE",
            StatFlags::VARIANCE => "VARIANCE",
            StatFlags::STDDEV => "STDDEV",
            _ => "STATS",
        }
    }

    /// Parse a statistic name, case-insensitively
    pub fn from_name(name: &str) -> Option<StatFlags> {
        let upper = name.trim().to_ascii_uppercase();
        match upper.as_str() {
            "MISSING" => Some(StatFlags::MISSING),
            "COUNT" => Some(StatFlags::COUNT),
            "SUM" => Some(StatFlags::SUM),
            "MIN" => Some(StatFlags::MIN),
            "MAX" => Some(StatFlags::MAX),
            "AVERAGE" | "MEAN" => Some(StatFlags::AVERAGE),
            "VARIANCE" => Some(StatFlags::VARIANCE),
            "STDDEV" | "STD_DEV" => Some(StatFlags::STDDEV),
            "ALL" => Some(StatFlags::ALL.into_iter().fold(StatFlags::NONE, |a, b| a | b)),
            _ => None,
        }
    }
}

impl BitOr for StatFlags {
    type Output = StatFlags;

    fn bitor(self, rhs: StatFlags) -> StatFlags {
        StatFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for StatFlags {
    fn bitor_assign(&mut self, rhs: StatFlags) {
        self.0 |= rhs.0;
    }
}

/// Running aggregate of one (group, data column) pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryCell {
    pub missing: u64,
    pub count: u64,
    pub sum: f64,
    pub sum_of_squares: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for SummaryCell {
    fn default() -> Self {
        Self {
            missing: 0,
            count: 0,
            sum: 0.0,
            sum_of_squares: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl SummaryCell {
    /// Fold one parsed value in; NaN counts as missing
    pub fn update(&mut self, value: f64) {
        if value.is_nan() {
            self.missing += 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.sum_of_squares += value * value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    pub fn average(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }

    /// Bessel-corrected variance, zero below two samples
    pub fn variance(&self) -> f64 {
        if self.count <= 1 {
            return 0.0;
        }
        let n = self.count as f64;
        ((self.sum_of_squares - self.sum * self.sum / n) / (n - 1.0)).max(0.0)
    }

    /// Text of a single statistic
    pub fn render(&self, stat: StatFlags) -> String {
        let has_values = self.count > 0;
        match stat {
            StatFlags::MISSING => format::integer(self.missing),
            StatFlags::COUNT => format::integer(self.count),
            StatFlags::SUM => format::real(self.sum),
            StatFlags::MIN if has_values => format::real(self.min),
            StatFlags::MAX if has_values => format::real(self.max),
            StatFlags::AVERAGE => self.average().map(format::real).unwrap_or_default(),
            StatFlags::VARIANCE => format::real(self.variance()),
            StatFlags::STDDEV => format::real(self.variance().sqrt()),
            _ => String::new(),
        }
    }
}

/// Parse a data token; anything unparseable is NaN
pub fn parse_value(token: &[u8]) -> f64 {
    std::str::from_utf8(token)
        .ok()
        .and_then(|text| text.trim().parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Group,
    Data(usize),
    Skip,
}

#[derive(Debug, Clone)]
struct DataColumn {
    name: Vec<u8>,
    flags: StatFlags,
}

/// Per-stream state, dropped wholesale at end of stream
#[derive(Debug, Default)]
struct SummaryState {
    cursor: ColumnCursor,
    slots: Vec<Slot>,
    data: Vec<DataColumn>,
    groups: GroupTable,
    rows: Vec<RowHandle>,
    row_values: Vec<f64>,
}

/// Group-by aggregation pass
pub struct Summarizer {
    rules: ColumnRules<StatFlags>,
    gate: RuleGate,
    pool_config: BlockPoolConfig,
    cells: BlockPool<SummaryCell>,
    state: SummaryState,
    next: Downstream,
}

impl Default for Summarizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Summarizer {
    pub fn new() -> Self {
        Self::with_pool_config(BlockPoolConfig::default())
    }

    pub fn with_pool_config(pool_config: BlockPoolConfig) -> Self {
        Self {
            rules: ColumnRules::new(),
            gate: RuleGate::new("summarizer"),
            cells: BlockPool::new(pool_config.clone()),
            pool_config,
            state: SummaryState::default(),
            next: Downstream::new("summarizer"),
        }
    }

    /// Columns whose header matches `pattern` become part of the group key
    pub fn add_group(&mut self, pattern: &str) -> Result<()> {
        self.gate.check()?;
        self.rules.add_group(pattern)
    }

    /// Columns whose header matches `pattern` request `flags`
    pub fn add_data(&mut self, pattern: &str, flags: StatFlags) -> Result<()> {
        self.gate.check()?;
        self.rules.add_data(pattern, flags)
    }

    /// Columns whose header matches `pattern` are never aggregated
    pub fn add_exception(&mut self, pattern: &str) -> Result<()> {
        self.gate.check()?;
        self.rules.add_exception(pattern)
    }

    /// Builder-style successor
    pub fn with_next(mut self, next: Box<dyn Pass>) -> Self {
        self.next.set(next);
        self
    }

    /// Number of groups seen in the current stream
    pub fn group_count(&self) -> usize {
        self.state.groups.len()
    }

    pub fn pool_stats(&self) -> crate::block_pool::PoolStats {
        self.cells.stats()
    }

    /// Discard any partial stream and accept rule changes again
    pub fn reset(&mut self) {
        self.state = SummaryState::default();
        self.cells = BlockPool::new(self.pool_config.clone());
        self.gate.unlock();
    }

    fn header_token(&mut self, column: usize, token: &[u8]) -> Result<()> {
        let slot = match self.rules.classify(token) {
            ColumnRole::Group => {
                self.next.token(token)?;
                Slot::Group
            }
            ColumnRole::Data(flags) => {
                self.state.data.push(DataColumn {
                    name: token.to_vec(),
                    flags,
                });
                Slot::Data(self.state.data.len() - 1)
            }
            ColumnRole::Ignored => Slot::Skip,
        };
        debug!(
            column,
            header = %String::from_utf8_lossy(token),
            role = ?slot,
            "summarizer column classified"
        );
        self.state.slots.push(slot);
        Ok(())
    }

    fn finish_header(&mut self) -> Result<()> {
        for column in &self.state.data {
            for stat in column.flags.iter() {
                let mut header = Vec::with_capacity(column.name.len() + 10);
                header.extend_from_slice(stat.name().as_bytes());
                header.push(b'(');
                header.extend_from_slice(&column.name);
                header.push(b')');
                self.next.token(&header)?;
            }
        }
        self.next.line()?;
        let width = self.state.data.len();
        self.state.row_values = vec![f64::NAN; width];
        Ok(())
    }

    fn finish_row(&mut self) -> Result<()> {
        let state = &mut self.state;
        let (group, fresh) = state.groups.commit()?;
        if fresh {
            let handle = self.cells.alloc_row(state.data.len(), SummaryCell::default());
            state.rows.push(handle);
        }
        let cells = self.cells.row_mut(state.rows[group]);
        for (cell, value) in cells.iter_mut().zip(state.row_values.iter_mut()) {
            cell.update(*value);
            *value = f64::NAN;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let state = std::mem::take(&mut self.state);
        let cells = std::mem::replace(&mut self.cells, BlockPool::new(self.pool_config.clone()));
        self.gate.unlock();

        if state.cursor.in_header() {
            // empty input: nothing to summarize
            return self.next.stream();
        }

        let mut row: Vec<Vec<u8>> = Vec::new();
        for (group, key) in state.groups.iter() {
            row.clear();
            row.extend(key.parts().map(<[u8]>::to_vec));
            let values = cells.row(state.rows[group]);
            for (column, cell) in state.data.iter().zip(values) {
                row.extend(column.flags.iter().map(|stat| cell.render(stat).into_bytes()));
            }
            self.next.row(&row)?;
        }

        info!(
            groups = state.groups.len(),
            rows = state.cursor.data_rows(),
            blocks = cells.stats().blocks,
            "summarizer flushed"
        );
        self.next.stream()
    }
}

impl Pass for Summarizer {
    fn process_token(&mut self, token: &[u8]) -> Result<()> {
        self.next.ensure()?;
        self.gate.lock();
        let column = self.state.cursor.advance()?;
        check_token(token, column)?;

        if self.state.cursor.in_header() {
            return self.header_token(column, token);
        }
        match self.state.slots[column] {
            Slot::Group => self.state.groups.push_part(token),
            Slot::Data(index) => {
                self.state.row_values[index] = parse_value(token);
                Ok(())
            }
            Slot::Skip => Ok(()),
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

impl Stage for Summarizer {
    fn set_next(&mut self, next: Box<dyn Pass>) {
        self.next.set(next);
    }
}
