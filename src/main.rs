use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use rowpass::cli::{Cli, Command, IoArgs};
use rowpass::csv_output::{feed_csv, CsvWriter};
use rowpass::pass::{Pass, Stage};
use rowpass::pipeline::{
    build_analyzer, build_chain, build_splitter, build_stacker, build_summarizer, AnovaConfig,
    PipelineConfig, SplitConfig, StackConfig, SummarizeConfig,
};
use rowpass::reshape::{RowJoiner, SplitAction};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn open_input(path: Option<&Path>) -> Result<Box<dyn BufRead>> {
    match path {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Pass>> {
    let out: Box<dyn Write> = match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout())),
    };
    Ok(Box::new(CsvWriter::new(out)))
}

/// Feed the input of `io` through `stage` into the output of `io`
fn run_stage<S: Stage>(mut stage: S, io: &IoArgs) -> Result<()> {
    stage.set_next(open_output(io.output.as_deref())?);
    let input = open_input(io.input.as_deref())?;
    feed_csv(input, &mut stage).context("Processing failed")
}

fn run_join(keys: &[String], inputs: &[PathBuf], output: Option<&Path>) -> Result<()> {
    let mut joiner = RowJoiner::new(inputs.len()).with_next(open_output(output)?);
    for pattern in keys {
        joiner.add_key(pattern)?;
    }
    for (source, path) in inputs.iter().enumerate() {
        let mut input = joiner.input(source)?;
        feed_csv(open_input(Some(path))?, &mut input)
            .with_context(|| format!("Failed to join {}", path.display()))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(args.debug);

    match args.command {
        Command::Run { config, io } => {
            let config = PipelineConfig::from_file(&config)?;
            let mut head = build_chain(&config, open_output(io.output.as_deref())?)?;
            let input = open_input(io.input.as_deref())?;
            feed_csv(input, &mut head).context("Processing failed")?;
        }
        Command::Summarize {
            group,
            data,
            exception,
            io,
        } => {
            let config = SummarizeConfig {
                group,
                data,
                exceptions: exception,
            };
            run_stage(build_summarizer(&config)?, &io)?;
        }
        Command::Anova {
            group,
            data,
            exception,
            io,
        } => {
            let config = AnovaConfig {
                group,
                data,
                exceptions: exception,
            };
            run_stage(build_analyzer(&config)?, &io)?;
        }
        Command::Stack {
            keyword,
            rule,
            default,
            keyword_name,
            data_name,
            io,
        } => {
            let config = StackConfig {
                default,
                keyword,
                rule,
                keyword_name,
                data_name,
            };
            run_stage(build_stacker(&config)?, &io)?;
        }
        Command::Split {
            split,
            data,
            remove,
            io,
        } => {
            let config = SplitConfig {
                default: SplitAction::Group,
                keyword: Vec::new(),
                rule: Command::split_rules(&split, &data, &remove),
            };
            run_stage(build_splitter(&config)?, &io)?;
        }
        Command::Join {
            key,
            inputs,
            output,
        } => {
            run_join(&key, &inputs, output.as_deref())?;
        }
    }

    Ok(())
}
