//! CLI argument parsing for rowpass

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::pipeline::{ActionRule, DataRule, KeywordAction};
use crate::reshape::{SplitAction, StackAction};

#[derive(Parser, Debug)]
#[command(name = "rowpass")]
#[command(version)]
#[command(about = "Streaming group-by, ANOVA and pivot passes over CSV tables", long_about = None)]
pub struct Cli {
    /// Enable debug tracing output (to stderr)
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the stages listed in a TOML pipeline file
    Run {
        /// Pipeline description
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,

        #[command(flatten)]
        io: IoArgs,
    },

    /// Per-group statistics of the data columns
    Summarize {
        /// Header pattern of a group column (repeatable)
        #[arg(short, long = "group", value_name = "REGEX")]
        group: Vec<String>,

        /// Data columns and their statistics, e.g. '^sales$=count,average'
        #[arg(short, long = "data", value_name = "REGEX=STATS", value_parser = parse_data_rule, required = true)]
        data: Vec<DataRule>,

        /// Header pattern of a column never aggregated (repeatable)
        #[arg(short = 'x', long = "exception", value_name = "REGEX")]
        exception: Vec<String>,

        #[command(flatten)]
        io: IoArgs,
    },

    /// One-way ANOVA of each data column across groups
    Anova {
        #[arg(short, long = "group", value_name = "REGEX")]
        group: Vec<String>,

        /// Header pattern of a measurement column (repeatable)
        #[arg(short, long = "data", value_name = "REGEX", required = true)]
        data: Vec<String>,

        #[arg(short = 'x', long = "exception", value_name = "REGEX")]
        exception: Vec<String>,

        #[command(flatten)]
        io: IoArgs,
    },

    /// Turn columns into keyword/data rows
    Stack {
        /// Exact header and its action, e.g. 'id=leave' (repeatable)
        #[arg(short, long = "keyword", value_name = "NAME=ACTION", value_parser = parse_stack_keyword)]
        keyword: Vec<KeywordAction<StackAction>>,

        /// Header pattern and its action, tried in order, e.g. '^q[0-9]$=stack'
        #[arg(short, long = "rule", value_name = "REGEX=ACTION", value_parser = parse_stack_rule)]
        rule: Vec<ActionRule<StackAction>>,

        /// Action for columns nothing matches
        #[arg(long, value_name = "ACTION", value_parser = parse_stack_action, default_value = "stack")]
        default: StackAction,

        /// Name of the output column holding the stacked header
        #[arg(long, default_value = "keyword")]
        keyword_name: String,

        /// Name of the output column holding the stacked value
        #[arg(long, default_value = "data")]
        data_name: String,

        #[command(flatten)]
        io: IoArgs,
    },

    /// Spread the values of one column into new columns
    Split {
        /// Header pattern of the column whose values name the new columns
        #[arg(short, long = "split", value_name = "REGEX")]
        split: String,

        /// Header pattern of a column whose values fill the new columns
        #[arg(short, long = "data", value_name = "REGEX", required = true)]
        data: Vec<String>,

        /// Header pattern of a column to drop
        #[arg(short, long = "remove", value_name = "REGEX")]
        remove: Vec<String>,

        #[command(flatten)]
        io: IoArgs,
    },

    /// Full outer join of several CSV files on key columns
    Join {
        /// Header pattern of a key column (repeatable)
        #[arg(short, long = "key", value_name = "REGEX", required = true)]
        key: Vec<String>,

        /// Files to join, in output column order
        #[arg(required = true, value_name = "INPUT")]
        inputs: Vec<PathBuf>,

        /// Output file (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

/// Input and output of single-stream commands
#[derive(Args, Debug, Clone, Default)]
pub struct IoArgs {
    /// Input CSV file (default: stdin)
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

fn split_assignment<'a>(value: &'a str, what: &str) -> Result<(&'a str, &'a str), String> {
    value
        .rsplit_once('=')
        .filter(|(left, right)| !left.is_empty() && !right.is_empty())
        .ok_or_else(|| format!("expected {}, got '{}'", what, value))
}

fn parse_data_rule(value: &str) -> Result<DataRule, String> {
    let (pattern, stats) = split_assignment(value, "REGEX=STAT[,STAT...]")?;
    Ok(DataRule {
        pattern: pattern.to_string(),
        stats: stats.split(',').map(|s| s.trim().to_string()).collect(),
    })
}

fn parse_stack_action(value: &str) -> Result<StackAction, String> {
    match value.to_ascii_lowercase().as_str() {
        "leave" => Ok(StackAction::Leave),
        "stack" => Ok(StackAction::Stack),
        "remove" => Ok(StackAction::Remove),
        _ => Err(format!(
            "unknown action '{}' (expected leave, stack or remove)",
            value
        )),
    }
}

fn parse_stack_keyword(value: &str) -> Result<KeywordAction<StackAction>, String> {
    let (name, action) = split_assignment(value, "NAME=ACTION")?;
    Ok(KeywordAction {
        name: name.to_string(),
        action: parse_stack_action(action)?,
    })
}

fn parse_stack_rule(value: &str) -> Result<ActionRule<StackAction>, String> {
    let (pattern, action) = split_assignment(value, "REGEX=ACTION")?;
    Ok(ActionRule {
        pattern: pattern.to_string(),
        action: parse_stack_action(action)?,
    })
}

impl Command {
    /// Splitter rules of the `split` command, in priority order
    pub fn split_rules(split: &str, data: &[String], remove: &[String]) -> Vec<ActionRule<SplitAction>> {
        std::iter::once(ActionRule {
            pattern: split.to_string(),
            action: SplitAction::Split,
        })
        .chain(data.iter().map(|pattern| ActionRule {
            pattern: pattern.clone(),
            action: SplitAction::Data,
        }))
        .chain(remove.iter().map(|pattern| ActionRule {
            pattern: pattern.clone(),
            action: SplitAction::Remove,
        }))
        .collect()
    }
}
