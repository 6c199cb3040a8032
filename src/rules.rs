//! Header classification rules
//!
//! Each stage decides once, from the header row, what role every column
//! plays for the rest of the stream. Rules are ordered regex lists tested
//! against the raw header token; classification is a pure function of the
//! rule order and the token.

use std::collections::HashMap;
use std::ops::BitOr;

use regex::bytes::Regex;

use crate::error::{PassError, Result};

/// Ordered list of pattern -> value rules
#[derive(Debug, Clone)]
pub struct RuleList<T> {
    rules: Vec<(Regex, T)>,
}

impl<T> Default for RuleList<T> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<T> RuleList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `pattern` and append it; a bad pattern is a configuration error
    pub fn add(&mut self, pattern: &str, value: T) -> Result<()> {
        let regex = Regex::new(pattern).map_err(|e| PassError::bad_pattern(pattern, &e))?;
        self.rules.push((regex, value));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Value of the first rule matching `token`
    pub fn first_match(&self, token: &[u8]) -> Option<&T> {
        self.rules
            .iter()
            .find(|(regex, _)| regex.is_match(token))
            .map(|(_, value)| value)
    }

    /// Values of every rule matching `token`, in rule order
    pub fn matches<'a>(&'a self, token: &'a [u8]) -> impl Iterator<Item = &'a T> + 'a {
        self.rules
            .iter()
            .filter(move |(regex, _)| regex.is_match(token))
            .map(|(_, value)| value)
    }

    pub fn is_match(&self, token: &[u8]) -> bool {
        self.rules.iter().any(|(regex, _)| regex.is_match(token))
    }

    /// Source patterns, in rule order
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|(regex, _)| regex.as_str())
    }
}

/// Role of a column in the aggregation engines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole<F> {
    /// Part of the composite group key
    Group,
    /// Aggregated, with the combined flags of every matching data rule
    Data(F),
    /// Dropped from the output
    Ignored,
}

/// Group / data / exception rules shared by the aggregation engines
///
/// Group rules win outright. Otherwise every matching data rule ORs its
/// flags in, and a matching exception rule clears them again.
#[derive(Debug, Clone)]
pub struct ColumnRules<F> {
    group: RuleList<()>,
    data: RuleList<F>,
    exceptions: RuleList<()>,
}

impl<F> Default for ColumnRules<F> {
    fn default() -> Self {
        Self {
            group: RuleList::new(),
            data: RuleList::new(),
            exceptions: RuleList::new(),
        }
    }
}

impl<F> ColumnRules<F>
where
    F: Copy + Default + PartialEq + BitOr<Output = F>,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_group(&mut self, pattern: &str) -> Result<()> {
        self.group.add(pattern, ())
    }

    pub fn add_data(&mut self, pattern: &str, flags: F) -> Result<()> {
        self.data.add(pattern, flags)
    }

    pub fn add_exception(&mut self, pattern: &str) -> Result<()> {
        self.exceptions.add(pattern, ())
    }

    pub fn classify(&self, token: &[u8]) -> ColumnRole<F> {
        if self.group.is_match(token) {
            return ColumnRole::Group;
        }

        let flags = self
            .data
            .matches(token)
            .fold(F::default(), |acc, &flags| acc | flags);
        if flags == F::default() || self.exceptions.is_match(token) {
            ColumnRole::Ignored
        } else {
            ColumnRole::Data(flags)
        }
    }

    pub fn group_rules(&self) -> &RuleList<()> {
        &self.group
    }

    pub fn data_rules(&self) -> &RuleList<F> {
        &self.data
    }
}

/// Exact keyword first, then ordered regex rules, then a default
#[derive(Debug, Clone)]
pub struct KeywordRules<T> {
    exact: HashMap<Vec<u8>, T>,
    rules: RuleList<T>,
    default: T,
}

impl<T: Copy> KeywordRules<T> {
    pub fn new(default: T) -> Self {
        Self {
            exact: HashMap::new(),
            rules: RuleList::new(),
            default,
        }
    }

    pub fn add_keyword(&mut self, keyword: &str, value: T) {
        self.exact.insert(keyword.as_bytes().to_vec(), value);
    }

    pub fn add_rule(&mut self, pattern: &str, value: T) -> Result<()> {
        self.rules.add(pattern, value)
    }

    pub fn set_default(&mut self, value: T) {
        self.default = value;
    }

    pub fn default_value(&self) -> T {
        self.default
    }

    pub fn classify(&self, token: &[u8]) -> T {
        if let Some(&value) = self.exact.get(token) {
            return value;
        }
        self.rules.first_match(token).copied().unwrap_or(self.default)
    }
}

/// Refuses rule changes while a stream is in flight
#[derive(Debug, Clone)]
pub struct RuleGate {
    stage: &'static str,
    locked: bool,
}

impl RuleGate {
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            locked: false,
        }
    }

    /// Fail if streaming has started
    pub fn check(&self) -> Result<()> {
        if self.locked {
            Err(PassError::locked(self.stage))
        } else {
            Ok(())
        }
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }
}
