//! Automation engine
//!
//! Watches the raw output stream through a [`MatchWindow`] and answers with
//! the response of the first eligible rule whose pattern matches. Rules are
//! evaluated in list order and evaluation stops at the first match.
//!
//! Two things keep a rule from triggering on its own echo: fire-once rules
//! are disarmed after firing, and the window is cleared on every match.

pub mod rule;
pub mod schedule;
pub mod window;

use std::time::Duration;

pub use rule::{AutomationRule, FireMode, RuleError, RuleSpec};
pub use schedule::{ResponseSchedule, ScheduledResponse};
pub use window::MatchWindow;

/// Input the engine wants written to the child
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseRequest {
    /// Name of the rule that fired
    pub rule: String,
    pub bytes: Vec<u8>,
    /// Send only after this much time has passed
    pub delay: Option<Duration>,
}

#[derive(Debug)]
pub struct AutomationEngine {
    rules: Vec<AutomationRule>,
    window: MatchWindow,
    fired_count: u64,
}

impl AutomationEngine {
    pub fn new(rules: Vec<AutomationRule>, window_capacity: usize) -> Self {
        Self {
            rules,
            window: MatchWindow::new(window_capacity),
            fired_count: 0,
        }
    }

    pub fn rules(&self) -> &[AutomationRule] {
        &self.rules
    }

    pub fn window(&self) -> &MatchWindow {
        &self.window
    }

    /// Responses produced since the engine was created or reset
    pub fn fired_count(&self) -> u64 {
        self.fired_count
    }

    /// Rules that can still fire
    pub fn armed_count(&self) -> usize {
        self.rules.iter().filter(|r| r.is_eligible()).count()
    }

    /// Feed a chunk of child output and evaluate the rules.
    pub fn observe(&mut self, chunk: &[u8]) -> Option<ResponseRequest> {
        self.window.push(chunk);

        let text = self.window.as_str();
        let Some(rule) = self
            .rules
            .iter_mut()
            .find(|rule| rule.is_eligible() && rule.matches(text))
        else {
            self.window.enforce_capacity();
            return None;
        };

        rule.mark_fired();
        self.window.clear();
        self.fired_count += 1;
        if rule.response().is_empty() {
            tracing::debug!("Rule `{}` fired with an empty response", rule.name());
            return None;
        }
        tracing::debug!(
            "Rule `{}` fired ({} bytes, delay {:?})",
            rule.name(),
            rule.response().len(),
            rule.delay()
        );

        Some(ResponseRequest {
            rule: rule.name().to_string(),
            bytes: rule.response().to_vec(),
            delay: rule.delay(),
        })
    }

    /// Swap in a new rule set. Every rule starts armed and the window is
    /// emptied.
    pub fn replace_rules(&mut self, rules: Vec<AutomationRule>) {
        tracing::info!("Loaded {} automation rules", rules.len());
        self.rules = rules;
        self.reset();
    }

    /// Re-arm every rule and forget the window contents.
    pub fn reset(&mut self) {
        for rule in &mut self.rules {
            rule.rearm();
        }
        self.window.reset();
        self.fired_count = 0;
    }
}
