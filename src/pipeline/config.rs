// TOML description of a pipeline
//
// ```toml
// [[stage]]
// kind = "summarize"
// group = ["^region$"]
// exceptions = ["^id$"]
//
// [[stage.data]]
// pattern = "^sales_"
// stats = ["count", "average", "stddev"]
//
// [[stage]]
// kind = "stack"
// default = "stack"
//
// [[stage.keyword]]
// name = "region"
// action = "leave"
// ```

use anyhow::{Context, Result as AnyResult};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{PassError, Result};
use crate::reshape::{SplitAction, StackAction};
use crate::summarizer::StatFlags;

/// Root of a pipeline file: stages in processing order
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PipelineConfig {
    #[serde(default)]
    pub stage: Vec<StageConfig>,
}

/// One stage, tagged by `kind`
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StageConfig {
    Summarize(SummarizeConfig),
    Anova(AnovaConfig),
    Stack(StackConfig),
    Split(SplitConfig),
}

/// Statistics requested for columns matching `pattern`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DataRule {
    pub pattern: String,
    pub stats: Vec<String>,
}

impl DataRule {
    /// Union of the named statistics
    pub fn flags(&self) -> Result<StatFlags> {
        let mut flags = StatFlags::NONE;
        for name in &self.stats {
            flags |= StatFlags::from_name(name).ok_or_else(|| {
                PassError::Configuration(format!(
                    "unknown statistic '{}' for pattern '{}'",
                    name, self.pattern
                ))
            })?;
        }
        Ok(flags)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SummarizeConfig {
    #[serde(default)]
    pub group: Vec<String>,
    #[serde(default)]
    pub data: Vec<DataRule>,
    #[serde(default)]
    pub exceptions: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AnovaConfig {
    #[serde(default)]
    pub group: Vec<String>,
    #[serde(default)]
    pub data: Vec<String>,
    #[serde(default)]
    pub exceptions: Vec<String>,
}

/// Action for columns whose header matches `pattern`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ActionRule<A> {
    pub pattern: String,
    pub action: A,
}

/// Action for the column whose header is exactly `name`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct KeywordAction<A> {
    pub name: String,
    pub action: A,
}

fn default_stack_action() -> StackAction {
    StackAction::Stack
}

fn default_split_action() -> SplitAction {
    SplitAction::Group
}

fn default_keyword_name() -> String {
    "keyword".to_string()
}

fn default_data_name() -> String {
    "data".to_string()
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StackConfig {
    #[serde(default = "default_stack_action")]
    pub default: StackAction,
    #[serde(default)]
    pub keyword: Vec<KeywordAction<StackAction>>,
    #[serde(default)]
    pub rule: Vec<ActionRule<StackAction>>,
    #[serde(default = "default_keyword_name")]
    pub keyword_name: String,
    #[serde(default = "default_data_name")]
    pub data_name: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SplitConfig {
    #[serde(default = "default_split_action")]
    pub default: SplitAction,
    #[serde(default)]
    pub keyword: Vec<KeywordAction<SplitAction>>,
    #[serde(default)]
    pub rule: Vec<ActionRule<SplitAction>>,
}

impl PipelineConfig {
    /// Load a pipeline from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AnyResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid pipeline file {}", path.display()))
    }

    /// Parse and validate a pipeline from TOML text
    pub fn from_toml_str(content: &str) -> AnyResult<Self> {
        let config: PipelineConfig = toml::from_str(content).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every stage carries the rules it needs
    pub fn validate(&self) -> Result<()> {
        if self.stage.is_empty() {
            return Err(PassError::Configuration(
                "pipeline has no stages".to_string(),
            ));
        }
        for (index, stage) in self.stage.iter().enumerate() {
            stage.validate().map_err(|err| match err {
                PassError::Configuration(message) => PassError::Configuration(format!(
                    "stage {} ({}): {}",
                    index + 1,
                    stage.kind(),
                    message
                )),
                other => other,
            })?;
        }
        Ok(())
    }
}

impl StageConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            StageConfig::Summarize(_) => "summarize",
            StageConfig::Anova(_) => "anova",
            StageConfig::Stack(_) => "stack",
            StageConfig::Split(_) => "split",
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            StageConfig::Summarize(config) => {
                if config.data.is_empty() {
                    return Err(PassError::Configuration(
                        "summarize needs at least one data rule".to_string(),
                    ));
                }
                for rule in &config.data {
                    if rule.flags()?.is_empty() {
                        return Err(PassError::Configuration(format!(
                            "data rule '{}' requests no statistic",
                            rule.pattern
                        )));
                    }
                }
                Ok(())
            }
            StageConfig::Anova(config) => {
                if config.data.is_empty() {
                    return Err(PassError::Configuration(
                        "anova needs at least one data pattern".to_string(),
                    ));
                }
                Ok(())
            }
            StageConfig::Stack(_) => Ok(()),
            StageConfig::Split(config) => {
                let names_split = config.default == SplitAction::Split
                    || config.keyword.iter().any(|k| k.action == SplitAction::Split)
                    || config.rule.iter().any(|r| r.action == SplitAction::Split);
                if !names_split {
                    return Err(PassError::Configuration(
                        "split needs a keyword or rule with action 'split'".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}
