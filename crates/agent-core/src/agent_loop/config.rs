//! Run configuration for the agent loop.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::AgentError;

/// Configuration for one agent session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Maximum steps before the session fails with `step_limit_exceeded`.
    /// Default: 50
    pub max_steps: u32,

    /// Timeout per driver call in milliseconds.
    /// Default: 30000
    pub step_timeout_ms: u64,

    /// Timeout per model call in milliseconds.
    /// Default: 60000
    pub planner_timeout_ms: u64,

    /// Additional attempts after a transient driver failure; a step makes at
    /// most `max_retries + 1` dispatch attempts.
    /// Default: 2
    pub max_retries: u32,

    /// Backoff between retry attempts in milliseconds, linear per attempt.
    /// Default: 500
    pub retry_backoff_ms: u64,

    /// Maximum serialized size of the history rendering, in characters.
    /// Default: 8000
    pub history_budget: usize,

    /// Consecutive hash-equal observations before the session fails with
    /// `stalled`.
    /// Default: 5
    pub stall_threshold: u32,

    /// Maximum elements rendered into a snapshot summary; the rest are
    /// replaced by an omission marker.
    /// Default: 200
    pub max_elements: usize,

    /// Maximum text length per element in the summary.
    /// Default: 80
    pub max_text_length: usize,

    /// Extra re-prompts allowed when the model reply does not parse.
    /// Default: 2
    pub max_plan_reprompts: u32,

    /// Attach a screenshot to every observation. Screenshot failures are
    /// logged and skipped, never fatal.
    /// Default: false
    pub capture_screenshots: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_steps: 50,
            step_timeout_ms: 30_000,
            planner_timeout_ms: 60_000,
            max_retries: 2,
            retry_backoff_ms: 500,
            history_budget: 8_000,
            stall_threshold: 5,
            max_elements: 200,
            max_text_length: 80,
            max_plan_reprompts: 2,
            capture_screenshots: false,
        }
    }
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Small limits and no backoff, for tests.
    pub fn minimal() -> Self {
        Self {
            max_steps: 10,
            step_timeout_ms: 5_000,
            planner_timeout_ms: 5_000,
            max_retries: 1,
            retry_backoff_ms: 0,
            history_budget: 2_000,
            stall_threshold: 3,
            max_elements: 50,
            max_text_length: 40,
            max_plan_reprompts: 1,
            capture_screenshots: false,
        }
    }

    /// Reject contract-violating configurations before any step runs.
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.max_steps == 0 {
            return Err(AgentError::invalid_config("max_steps must be positive"));
        }
        if self.history_budget == 0 {
            return Err(AgentError::invalid_config("history_budget must be positive"));
        }
        if self.stall_threshold == 0 {
            return Err(AgentError::invalid_config(
                "stall_threshold must be positive",
            ));
        }
        if self.max_elements == 0 {
            return Err(AgentError::invalid_config("max_elements must be positive"));
        }
        Ok(())
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub fn planner_timeout(&self) -> Duration {
        Duration::from_millis(self.planner_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Builder: set max steps.
    pub fn max_steps(mut self, steps: u32) -> Self {
        self.max_steps = steps;
        self
    }

    /// Builder: set retry count.
    pub fn retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Builder: set history budget in characters.
    pub fn history(mut self, budget: usize) -> Self {
        self.history_budget = budget;
        self
    }

    /// Builder: set stall threshold.
    pub fn stall(mut self, threshold: u32) -> Self {
        self.stall_threshold = threshold;
        self
    }

    /// Builder: set element budget for summaries.
    pub fn elements(mut self, count: usize) -> Self {
        self.max_elements = count;
        self
    }

    /// Builder: attach screenshots to observations.
    pub fn screenshots(mut self, enabled: bool) -> Self {
        self.capture_screenshots = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RunConfig::default().validate().is_ok());
        assert!(RunConfig::minimal().validate().is_ok());
    }

    #[test]
    fn zero_steps_rejected() {
        let config = RunConfig::default().max_steps(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_chains() {
        let config = RunConfig::new().max_steps(7).retries(0).stall(2);
        assert_eq!(config.max_steps, 7);
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.stall_threshold, 2);
    }
}
