//! One-way ANOVA per data keyword
//!
//! Group and data columns are chosen by the same regex rules as the
//! summarizer, but a data column is simply a treatment measurement: there
//! are no per-column statistic flags. At end of stream every data keyword
//! produces one row per group followed by a grand row carrying the pooled
//! F test.
//!
//! ```text
//! region,keyword,count,mean,std_dev,df_between,df_within,F,p
//! eu,latency,3,4,1,,,,
//! us,latency,3,7,1,,,,
//! ,latency,6,5.5,1.870829,1,4,13.5,0.021312
//! ```

use tracing::{debug, info};

use crate::arena::check_token;
use crate::block_pool::{BlockPool, BlockPoolConfig, PoolStats, RowHandle};
use crate::error::Result;
use crate::format;
use crate::group_table::GroupTable;
use crate::numeric::{one_way_anova, Anova, Moments};
use crate::pass::{ColumnCursor, Downstream, Pass, Stage};
use crate::rules::{ColumnRole, ColumnRules, RuleGate};
use crate::summarizer::parse_value;

/// Output columns following the group columns
pub const ANOVA_COLUMNS: [&str; 8] = [
    "keyword",
    "count",
    "mean",
    "std_dev",
    "df_between",
    "df_within",
    "F",
    "p",
];

#[derive(Debug, Clone, Copy)]
enum Slot {
    Group,
    Data(usize),
    Skip,
}

#[derive(Debug, Default)]
struct AnovaState {
    cursor: ColumnCursor,
    slots: Vec<Slot>,
    group_columns: usize,
    keywords: Vec<Vec<u8>>,
    groups: GroupTable,
    rows: Vec<RowHandle>,
    row_values: Vec<f64>,
}

/// Streaming one-way analysis of variance
pub struct VarianceAnalyzer {
    rules: ColumnRules<bool>,
    gate: RuleGate,
    pool_config: BlockPoolConfig,
    cells: BlockPool<Moments>,
    state: AnovaState,
    next: Downstream,
}

impl Default for VarianceAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl VarianceAnalyzer {
    pub fn new() -> Self {
        Self::with_pool_config(BlockPoolConfig::default())
    }

    pub fn with_pool_config(pool_config: BlockPoolConfig) -> Self {
        Self {
            rules: ColumnRules::new(),
            gate: RuleGate::new("variance analyzer"),
            cells: BlockPool::new(pool_config.clone()),
            pool_config,
            state: AnovaState::default(),
            next: Downstream::new("variance analyzer"),
        }
    }

    pub fn add_group(&mut self, pattern: &str) -> Result<()> {
        self.gate.check()?;
        self.rules.add_group(pattern)
    }

    /// Columns whose header matches `pattern` are treatment measurements
    pub fn add_data(&mut self, pattern: &str) -> Result<()> {
        self.gate.check()?;
        self.rules.add_data(pattern, true)
    }

    pub fn add_exception(&mut self, pattern: &str) -> Result<()> {
        self.gate.check()?;
        self.rules.add_exception(pattern)
    }

    pub fn with_next(mut self, next: Box<dyn Pass>) -> Self {
        self.next.set(next);
        self
    }

    pub fn group_count(&self) -> usize {
        self.state.groups.len()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.cells.stats()
    }

    pub fn reset(&mut self) {
        self.state = AnovaState::default();
        self.cells = BlockPool::new(self.pool_config.clone());
        self.gate.unlock();
    }

    fn header_token(&mut self, column: usize, token: &[u8]) -> Result<()> {
        let slot = match self.rules.classify(token) {
            ColumnRole::Group => {
                self.next.token(token)?;
                self.state.group_columns += 1;
                Slot::Group
            }
            ColumnRole::Data(_) => {
                self.state.keywords.push(token.to_vec());
                Slot::Data(self.state.keywords.len() - 1)
            }
            ColumnRole::Ignored => Slot::Skip,
        };
        debug!(
            column,
            header = %String::from_utf8_lossy(token),
            role = ?slot,
            "variance analyzer column classified"
        );
        self.state.slots.push(slot);
        Ok(())
    }

    fn finish_header(&mut self) -> Result<()> {
        for name in ANOVA_COLUMNS {
            self.next.token(name.as_bytes())?;
        }
        self.next.line()?;
        self.state.row_values = vec![f64::NAN; self.state.keywords.len()];
        Ok(())
    }

    fn finish_row(&mut self) -> Result<()> {
        let state = &mut self.state;
        let (group, fresh) = state.groups.commit()?;
        if fresh {
            let handle = self.cells.alloc_row(state.keywords.len(), Moments::default());
            state.rows.push(handle);
        }
        let cells = self.cells.row_mut(state.rows[group]);
        for (cell, value) in cells.iter_mut().zip(state.row_values.iter_mut()) {
            if !value.is_nan() {
                cell.push(*value);
            }
            *value = f64::NAN;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flush_with(|column| one_way_anova(column))
    }

    /// Emit every group, testing each keyword's groups with `analyze`
    ///
    /// Stage state is released before anything is emitted, so an error
    /// leaves the analyzer ready for a new stream.
    fn flush_with<F>(&mut self, analyze: F) -> Result<()>
    where
        F: Fn(&[Moments]) -> Result<Anova>,
    {
        let state = std::mem::take(&mut self.state);
        let cells = std::mem::replace(&mut self.cells, BlockPool::new(self.pool_config.clone()));
        self.gate.unlock();

        if state.cursor.in_header() {
            return self.next.stream();
        }

        let mut row: Vec<Vec<u8>> = Vec::with_capacity(state.group_columns + ANOVA_COLUMNS.len());
        for (index, keyword) in state.keywords.iter().enumerate() {
            let column: Vec<Moments> = state
                .rows
                .iter()
                .map(|&handle| cells.row(handle)[index])
                .collect();

            for ((_, key), moments) in state.groups.iter().zip(&column) {
                row.clear();
                row.extend(key.parts().map(<[u8]>::to_vec));
                row.push(keyword.clone());
                row.push(format::integer(moments.count).into_bytes());
                row.push(moments.mean().map(format::real).unwrap_or_default().into_bytes());
                row.push(
                    moments
                        .sample_std_dev()
                        .map(format::real)
                        .unwrap_or_default()
                        .into_bytes(),
                );
                row.resize(row.len() + 4, Vec::new());
                self.next.row(&row)?;
            }

            let anova = analyze(&column)?;
            row.clear();
            row.resize(state.group_columns, Vec::new());
            row.push(keyword.clone());
            row.push(format::integer(anova.total.count).into_bytes());
            row.push(anova.total.mean().map(format::real).unwrap_or_default().into_bytes());
            row.push(
                anova
                    .total
                    .sample_std_dev()
                    .map(format::real)
                    .unwrap_or_default()
                    .into_bytes(),
            );
            match anova.test {
                Some(test) => {
                    row.push(format::integer(test.df_between).into_bytes());
                    row.push(format::integer(test.df_within).into_bytes());
                    row.push(format::real(test.f).into_bytes());
                    row.push(format::real(test.p).into_bytes());
                }
                None => row.resize(row.len() + 4, Vec::new()),
            }
            debug!(
                keyword = %String::from_utf8_lossy(keyword),
                groups = anova.nonempty_groups,
                f = ?anova.test.map(|t| t.f),
                "anova computed"
            );
            self.next.row(&row)?;
        }

        info!(
            groups = state.groups.len(),
            keywords = state.keywords.len(),
            rows = state.cursor.data_rows(),
            "variance analyzer flushed"
        );
        self.next.stream()
    }
}

impl Pass for VarianceAnalyzer {
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

impl Stage for VarianceAnalyzer {
    fn set_next(&mut self, next: Box<dyn Pass>) {
        self.next.set(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_output::MemorySink;
    use crate::error::PassError;
    use crate::pass::push_row;

    fn analyze(analyzer: VarianceAnalyzer, rows: &[&[&str]]) -> Vec<Vec<String>> {
        let sink = MemorySink::new();
        let mut analyzer = analyzer.with_next(Box::new(sink.clone()));
        for row in rows {
            push_row(&mut analyzer, row.iter()).unwrap();
        }
        analyzer.process_stream().unwrap();
        assert_eq!(sink.streams_ended(), 1);
        sink.rows()
    }

    fn analyze_into(
        analyzer: &mut VarianceAnalyzer,
        sink: &MemorySink,
        rows: &[&[&str]],
    ) -> Vec<Vec<String>> {
        for row in rows {
            push_row(analyzer, row.iter()).unwrap();
        }
        analyzer.process_stream().unwrap();
        sink.rows()
    }

    fn analyzer() -> VarianceAnalyzer {
        let mut analyzer = VarianceAnalyzer::new();
        analyzer.add_group("^region$").unwrap();
        analyzer.add_data("^latency$").unwrap();
        analyzer
    }

    #[test]
    fn test_two_groups() {
        let rows = analyze(
            analyzer(),
            &[
                &["region", "latency"],
                &["eu", "3"],
                &["us", "6"],
                &["eu", "4"],
                &["us", "7"],
                &["eu", "5"],
                &["us", "8"],
            ],
        );
        assert_eq!(
            rows[0],
            vec!["region", "keyword", "count", "mean", "std_dev", "df_between", "df_within", "F", "p"]
        );
        assert_eq!(rows[1], vec!["eu", "latency", "3", "4", "1", "", "", "", ""]);
        assert_eq!(rows[2], vec!["us", "latency", "3", "7", "1", "", "", "", ""]);

        // SSTR = 13.5, SSE = 4, F = 13.5 / (4 / 4)
        let grand = &rows[3];
        assert_eq!(&grand[..7], &["", "latency", "6", "5.5", "1.870829", "1", "4"]);
        assert_eq!(grand[7], "13.5");
        let p: f64 = grand[8].parse().unwrap();
        assert!((p - 0.021_311_641_128_756_4).abs() < 1e-5, "p = {}", p);
        assert_eq!(rows.len(), 4);
    }

    #[test]
    fn test_single_group_has_blank_test() {
        let rows = analyze(analyzer(), &[&["region", "latency"], &["eu", "1"], &["eu", "3"]]);
        assert_eq!(rows[1], vec!["eu", "latency", "2", "2", "1.414214", "", "", "", ""]);
        assert_eq!(rows[2], vec!["", "latency", "2", "2", "1.414214", "", "", "", ""]);
    }

    #[test]
    fn test_equal_groups() {
        let rows = analyze(
            analyzer(),
            &[
                &["region", "latency"],
                &["a", "1"],
                &["a", "2"],
                &["a", "3"],
                &["b", "1"],
                &["b", "2"],
                &["b", "3"],
            ],
        );
        let grand = &rows[3];
        assert_eq!(grand[7], "0");
        assert_eq!(grand[8], "1");
    }

    #[test]
    fn test_perfect_separation_is_infinite() {
        let rows = analyze(
            analyzer(),
            &[&["region", "latency"], &["a", "1"], &["a", "1"], &["b", "5"], &["b", "5"]],
        );
        assert_eq!(rows[1][4], "0");
        let grand = &rows[3];
        assert_eq!(grand[7], "inf");
        assert_eq!(grand[8], "1");
    }

    #[test]
    fn test_missing_values_are_skipped() {
        let rows = analyze(
            analyzer(),
            &[&["region", "latency"], &["a", "x"], &["a", "2"], &["b", "-"]],
        );
        assert_eq!(rows[1], vec!["a", "latency", "1", "2", "", "", "", "", ""]);
        // empty group: blank mean and std_dev
        assert_eq!(rows[2], vec!["b", "latency", "0", "", "", "", "", "", ""]);
        assert_eq!(rows[3][2], "1");
        assert_eq!(rows[3][5], "");
    }

    #[test]
    fn test_multiple_keywords_in_column_order() {
        let mut analyzer = VarianceAnalyzer::new();
        analyzer.add_group("^g$").unwrap();
        analyzer.add_data("^m").unwrap();
        analyzer.add_exception("^m_ignored$").unwrap();
        let rows = analyze(
            analyzer,
            &[&["m2", "g", "m_ignored", "m1"], &["1", "a", "9", "2"], &["3", "b", "9", "4"]],
        );
        let keywords: Vec<&str> = rows[1..].iter().map(|r| r[1].as_str()).collect();
        assert_eq!(keywords, vec!["m2", "m2", "m2", "m1", "m1", "m1"]);
    }

    #[test]
    fn test_no_group_columns() {
        let mut analyzer = VarianceAnalyzer::new();
        analyzer.add_data("^v$").unwrap();
        let rows = analyze(analyzer, &[&["v"], &["1"], &["2"]]);
        assert_eq!(rows[0][0], "keyword");
        assert_eq!(rows[1], vec!["v", "2", "1.5", "0.707107", "", "", "", ""]);
        assert_eq!(rows[2], vec!["v", "2", "1.5", "0.707107", "", "", "", ""]);
    }

    #[test]
    fn test_empty_stream_and_reuse() {
        let rows = analyze(analyzer(), &[]);
        assert!(rows.is_empty());

        let sink = MemorySink::new();
        let mut analyzer = analyzer().with_next(Box::new(sink.clone()));
        push_row(&mut analyzer, ["region", "latency"]).unwrap();
        push_row(&mut analyzer, ["eu", "1"]).unwrap();
        analyzer.process_stream().unwrap();
        assert_eq!(analyzer.group_count(), 0);
        assert!(analyzer.add_group("^other$").is_ok());
    }

    #[test]
    fn test_numeric_error_in_flush_resets_stage() {
        let sink = MemorySink::new();
        let mut analyzer = analyzer().with_next(Box::new(sink.clone()));
        for row in [["region", "latency"], ["eu", "1"], ["us", "2"]] {
            push_row(&mut analyzer, row).unwrap();
        }
        assert_eq!(analyzer.group_count(), 2);

        let err = analyzer
            .flush_with(|_| Err(PassError::Numeric("betacf did not converge".to_string())))
            .unwrap_err();
        assert!(err.is_numeric());
        assert_eq!(sink.streams_ended(), 0);
        assert_eq!(analyzer.group_count(), 0);
        assert_eq!(analyzer.pool_stats().rows, 0);
        assert!(analyzer.add_exception("^note$").is_ok());

        sink.clear();
        let rows = analyze_into(&mut analyzer, &sink, &[&["region", "latency"], &["eu", "4"]]);
        assert_eq!(rows[1], vec!["eu", "latency", "1", "4", "", "", "", "", ""]);
        assert_eq!(sink.streams_ended(), 1);
    }

    #[test]
    fn test_configuration_errors() {
        let mut analyzer = VarianceAnalyzer::new();
        assert!(analyzer.add_data("(").unwrap_err().is_configuration());
        assert!(analyzer.process_line().unwrap_err().is_configuration());
    }

    #[test]
    fn test_reserved_byte_rejected() {
        let mut analyzer = analyzer().with_next(Box::new(MemorySink::new()));
        push_row(&mut analyzer, ["region", "latency"]).unwrap();
        let err = analyzer.process_token(b"e\x03u").unwrap_err();
        assert!(err.to_string().contains("reserved byte 0x03"));
    }
}
