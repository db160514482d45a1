//! Error surface shared by every driver implementation.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// High-level error categories surfaced by the adapters.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterErrorKind {
    /// Backend unreachable or the connection dropped mid-call.
    #[error("transport failure")]
    Transport,
    /// A per-call deadline elapsed before the backend answered.
    #[error("backend call timed out")]
    Timeout,
    /// The referenced element no longer exists on the backend side.
    #[error("target element not found")]
    TargetNotFound,
    /// The element exists but cannot receive the action (disabled, hidden).
    #[error("target element not interactable")]
    NotInteractable,
    /// The backend answered with something the adapter cannot interpret.
    #[error("protocol violation")]
    Protocol,
    #[error("internal adapter error")]
    Internal,
}

/// Enriched error passed back to the agent layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub hint: Option<String>,
}

impl AdapterError {
    pub fn new(kind: AdapterErrorKind) -> Self {
        Self { kind, hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Transport and timeout failures are transient; the loop may retry them.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            AdapterErrorKind::Transport | AdapterErrorKind::Timeout
        )
    }
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(hint) = &self.hint {
            write!(f, ": {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for AdapterError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(AdapterError::new(AdapterErrorKind::Transport).is_transient());
        assert!(AdapterError::new(AdapterErrorKind::Timeout).is_transient());
        assert!(!AdapterError::new(AdapterErrorKind::TargetNotFound).is_transient());
        assert!(!AdapterError::new(AdapterErrorKind::NotInteractable).is_transient());
    }

    #[test]
    fn display_includes_hint() {
        let err = AdapterError::new(AdapterErrorKind::Protocol).with_hint("missing sessionId");
        assert_eq!(err.to_string(), "protocol violation: missing sessionId");
    }
}
