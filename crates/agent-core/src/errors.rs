use thiserror::Error;

/// Errors emitted by the agent-core crate.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Raised when a run configuration is rejected at construction.
    #[error("invalid run configuration: {0}")]
    InvalidConfig(String),

    /// Raised when the model's reply cannot be parsed into a decision.
    #[error("unparseable planner output: {0}")]
    PlanParse(String),

    /// Raised by model clients on transport or provider failures.
    #[error("model call failed: {0}")]
    Model(String),
}

impl AgentError {
    /// Helper for configuration rejections.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Helper for parse failures.
    pub fn plan_parse(message: impl Into<String>) -> Self {
        Self::PlanParse(message.into())
    }

    /// Helper for model client failures.
    pub fn model(message: impl Into<String>) -> Self {
        Self::Model(message.into())
    }
}
