//! Automation rules
//!
//! A [`RuleSpec`] is what the configuration file holds; [`AutomationRule`] is
//! the validated, compiled form the engine evaluates.

use std::time::Duration;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Rule `{name}`: pattern is empty")]
    EmptyPattern { name: String },

    #[error("Rule `{name}`: invalid pattern: {source}")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("Rule `{name}`: pattern `{pattern}` matches empty text and would fire on every chunk")]
    MatchesEmpty { name: String, pattern: String },
}

fn default_true() -> bool {
    true
}

/// Unvalidated rule as written in the configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    #[serde(default)]
    pub name: String,
    pub pattern: String,
    pub response: String,
    /// Fire at most once per session
    #[serde(default = "default_true")]
    pub once: bool,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl RuleSpec {
    /// A rule with the default options: fire once, case-insensitive, no delay
    pub fn new(pattern: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            pattern: pattern.into(),
            response: response.into(),
            once: true,
            case_sensitive: false,
            delay_ms: 0,
            is_active: true,
        }
    }

    /// Name for messages; falls back to the pattern
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.pattern
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireMode {
    Once,
    Repeatedly,
}

/// Compiled rule with its runtime "has fired" flag
#[derive(Debug, Clone)]
pub struct AutomationRule {
    name: String,
    regex: Regex,
    response: Vec<u8>,
    mode: FireMode,
    delay: Option<Duration>,
    active: bool,
    fired: bool,
}

impl AutomationRule {
    pub fn compile(spec: &RuleSpec) -> Result<Self, RuleError> {
        let name = spec.label().to_string();

        if spec.pattern.is_empty() {
            return Err(RuleError::EmptyPattern { name });
        }
        let regex = RegexBuilder::new(&spec.pattern)
            .case_insensitive(!spec.case_sensitive)
            .build()
            .map_err(|source| RuleError::InvalidPattern {
                name: name.clone(),
                source,
            })?;
        if regex.is_match("") {
            return Err(RuleError::MatchesEmpty {
                name,
                pattern: spec.pattern.clone(),
            });
        }
        Ok(Self {
            name,
            regex,
            response: spec.response.as_bytes().to_vec(),
            mode: if spec.once {
                FireMode::Once
            } else {
                FireMode::Repeatedly
            },
            delay: (spec.delay_ms > 0).then(|| Duration::from_millis(spec.delay_ms)),
            active: spec.is_active,
            fired: false,
        })
    }

    /// Compile a list, stopping at the first invalid rule
    pub fn compile_all(specs: &[RuleSpec]) -> Result<Vec<Self>, RuleError> {
        specs.iter().map(Self::compile).collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// Bytes to send when the rule fires. Empty for a rule that only
    /// consumes the prompt.
    pub fn response(&self) -> &[u8] {
        &self.response
    }

    pub fn mode(&self) -> FireMode {
        self.mode
    }

    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Active, and not a fire-once rule that already fired
    pub fn is_eligible(&self) -> bool {
        self.active && !(self.mode == FireMode::Once && self.fired)
    }

    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub(crate) fn mark_fired(&mut self) {
        self.fired = true;
    }

    pub(crate) fn rearm(&mut self) {
        self.fired = false;
    }
}
