//! Match rules and the compiled rule set evaluated against every status.
//!
//! A [`Rule`] is the configured `(enabled, list, pattern)` triple. Before it is
//! evaluated it is compiled into a [`CompiledRule`], which pairs the rule with
//! a [`Matcher`]. Rules whose pattern cannot be compiled keep their slot in the
//! [`RuleSet`] but never match, so one bad pattern cannot disturb the others.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::RuleError;
use crate::feed::Status;

pub mod store;

pub use store::{RuleFile, RuleStore};

/// A configured match condition targeting one list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    pub enabled: bool,
    #[serde(alias = "slug")]
    pub list_id: String,
    #[serde(alias = "match_pattern")]
    pub pattern: String,
}

impl Default for Rule {
    fn default() -> Self {
        Self {
            enabled: true,
            list_id: String::new(),
            pattern: String::new(),
        }
    }
}

impl Rule {
    pub fn new(list_id: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            enabled: true,
            list_id: list_id.into(),
            pattern: pattern.into(),
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.enabled {
            f.write_str("[DISABLED]")?;
        }
        if !self.list_id.is_empty() {
            write!(f, " Slug={}", self.list_id)?;
        }
        if !self.pattern.is_empty() {
            write!(f, " MatchPattern={}", self.pattern)?;
        }
        Ok(())
    }
}

/// Capability to decide whether a status text matches.
pub trait Matcher: Send + Sync + fmt::Debug {
    fn is_match(&self, text: &str) -> bool;
}

/// Unanchored, case-sensitive regular expression search.
#[derive(Debug, Clone)]
pub struct RegexMatcher(Regex);

impl RegexMatcher {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self)
    }
}

impl Matcher for RegexMatcher {
    fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }
}

/// A rule paired with its matcher.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    rule: Rule,
    /// `None` when the rule could not be compiled; such a rule never matches.
    matcher: Option<Arc<dyn Matcher>>,
}

impl CompiledRule {
    /// Compile a rule using the regex matcher.
    pub fn compile(rule: Rule) -> Result<Self, RuleError> {
        if rule.list_id.trim().is_empty() {
            return Err(RuleError::MissingListId {
                pattern: rule.pattern.clone(),
            });
        }

        let matcher = RegexMatcher::new(&rule.pattern).map_err(|e| RuleError::InvalidPattern {
            list_id: rule.list_id.clone(),
            pattern: rule.pattern.clone(),
            details: e.to_string(),
        })?;

        Ok(Self::with_matcher(rule, Arc::new(matcher)))
    }

    /// Pair a rule with a caller-supplied match strategy.
    pub fn with_matcher(rule: Rule, matcher: Arc<dyn Matcher>) -> Self {
        Self {
            rule,
            matcher: Some(matcher),
        }
    }

    /// A rule that keeps its position but fails closed.
    pub fn inert(rule: Rule) -> Self {
        Self {
            rule,
            matcher: None,
        }
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn list_id(&self) -> &str {
        &self.rule.list_id
    }

    pub fn is_inert(&self) -> bool {
        self.matcher.is_none()
    }

    /// Evaluate this rule against a status. Disabled rules never match.
    pub fn is_match(&self, status: &Status) -> bool {
        if !self.rule.enabled {
            return false;
        }
        self.matcher
            .as_ref()
            .is_some_and(|matcher| matcher.is_match(&status.text))
    }
}

/// An immutable, versioned snapshot of the configured rules, in evaluation order.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    version: u64,
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(version: u64, rules: Vec<CompiledRule>) -> Self {
        Self { version, rules }
    }

    /// Compile every rule, keeping failed ones as inert entries.
    ///
    /// The returned errors describe each rule that failed to compile.
    pub fn compile(version: u64, rules: &[Rule]) -> (Self, Vec<RuleError>) {
        let mut compiled = Vec::with_capacity(rules.len());
        let mut errors = Vec::new();

        for rule in rules {
            match CompiledRule::compile(rule.clone()) {
                Ok(compiled_rule) => compiled.push(compiled_rule),
                Err(e) => {
                    errors.push(e);
                    compiled.push(CompiledRule::inert(rule.clone()));
                }
            }
        }

        (Self::new(version, compiled), errors)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
