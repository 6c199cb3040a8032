//! Building stage chains from configuration
//!
//! A [`PipelineConfig`] lists stages in processing order; [`build_chain`]
//! instantiates each one with its rules and links them in front of a sink.

mod config;

pub use config::{
    ActionRule, AnovaConfig, DataRule, KeywordAction, PipelineConfig, SplitConfig, StackConfig,
    StageConfig, SummarizeConfig,
};

use tracing::debug;

use crate::error::Result;
use crate::pass::{chain, Pass, Stage};
use crate::reshape::{Splitter, Stacker};
use crate::summarizer::Summarizer;
use crate::variance_analyzer::VarianceAnalyzer;

/// Summarizer configured from `config`
pub fn build_summarizer(config: &SummarizeConfig) -> Result<Summarizer> {
    let mut summarizer = Summarizer::new();
    for pattern in &config.group {
        summarizer.add_group(pattern)?;
    }
    for rule in &config.data {
        summarizer.add_data(&rule.pattern, rule.flags()?)?;
    }
    for pattern in &config.exceptions {
        summarizer.add_exception(pattern)?;
    }
    Ok(summarizer)
}

pub fn build_analyzer(config: &AnovaConfig) -> Result<VarianceAnalyzer> {
    let mut analyzer = VarianceAnalyzer::new();
    for pattern in &config.group {
        analyzer.add_group(pattern)?;
    }
    for pattern in &config.data {
        analyzer.add_data(pattern)?;
    }
    for pattern in &config.exceptions {
        analyzer.add_exception(pattern)?;
    }
    Ok(analyzer)
}

pub fn build_stacker(config: &StackConfig) -> Result<Stacker> {
    let mut stacker = Stacker::new();
    stacker.set_default(config.default)?;
    for keyword in &config.keyword {
        stacker.add_keyword(&keyword.name, keyword.action)?;
    }
    for rule in &config.rule {
        stacker.add_rule(&rule.pattern, rule.action)?;
    }
    stacker.set_output_names(&config.keyword_name, &config.data_name)?;
    Ok(stacker)
}

pub fn build_splitter(config: &SplitConfig) -> Result<Splitter> {
    let mut splitter = Splitter::new();
    splitter.set_default(config.default)?;
    for keyword in &config.keyword {
        splitter.add_keyword(&keyword.name, keyword.action)?;
    }
    for rule in &config.rule {
        splitter.add_rule(&rule.pattern, rule.action)?;
    }
    Ok(splitter)
}

/// Instantiate one configured stage
pub fn build_stage(config: &StageConfig) -> Result<Box<dyn Stage>> {
    let stage: Box<dyn Stage> = match config {
        StageConfig::Summarize(config) => Box::new(build_summarizer(config)?),
        StageConfig::Anova(config) => Box::new(build_analyzer(config)?),
        StageConfig::Stack(config) => Box::new(build_stacker(config)?),
        StageConfig::Split(config) => Box::new(build_splitter(config)?),
    };
    Ok(stage)
}

/// Validate `config` and link its stages in front of `sink`
pub fn build_chain(config: &PipelineConfig, sink: Box<dyn Pass>) -> Result<Box<dyn Pass>> {
    config.validate()?;
    let stages = config
        .stage
        .iter()
        .map(build_stage)
        .collect::<Result<Vec<_>>>()?;
    debug!(
        stages = ?config.stage.iter().map(StageConfig::kind).collect::<Vec<_>>(),
        "pipeline built"
    );
    Ok(chain(stages, sink))
}
