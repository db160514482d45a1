//! Core data types for the agent loop.

use app_adapter::ScrollDirection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One discrete operation the planner decides to perform next.
///
/// Element-targeting variants carry the interactive index the model saw in
/// the snapshot summary; the executor resolves it against the current
/// snapshot before anything reaches a driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AgentAction {
    Tap {
        index: u32,
    },
    EnterText {
        index: u32,
        text: String,
    },
    Scroll {
        direction: ScrollDirection,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<u32>,
    },
    Swipe {
        from: (f32, f32),
        to: (f32, f32),
        #[serde(default = "default_swipe_ms")]
        duration_ms: u64,
    },
    Drag {
        from: (f32, f32),
        to: (f32, f32),
        #[serde(default = "default_drag_ms")]
        duration_ms: u64,
    },
    LongPress {
        index: u32,
        #[serde(default = "default_hold_ms")]
        hold_ms: u64,
    },
    Wait {
        ms: u64,
    },
    /// Task is finished; `success` distinguishes achieved from abandoned.
    Done {
        success: bool,
        message: String,
    },
    /// The model judged the task impossible.
    Fail {
        reason: String,
    },
}

fn default_swipe_ms() -> u64 {
    300
}

fn default_drag_ms() -> u64 {
    600
}

fn default_hold_ms() -> u64 {
    800
}

impl AgentAction {
    /// `done` and `fail` terminate the session without touching a device.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentAction::Done { .. } | AgentAction::Fail { .. })
    }

    /// The interactive index this action targets, when it targets one.
    pub fn target_index(&self) -> Option<u32> {
        match self {
            AgentAction::Tap { index }
            | AgentAction::EnterText { index, .. }
            | AgentAction::LongPress { index, .. } => Some(*index),
            AgentAction::Scroll { index, .. } => *index,
            _ => None,
        }
    }

    /// Short human-readable rendering for history and logs.
    pub fn describe(&self) -> String {
        match self {
            AgentAction::Tap { index } => format!("tap [{index}]"),
            AgentAction::EnterText { index, text } => {
                format!("enter_text [{index}] {text:?}")
            }
            AgentAction::Scroll { direction, index } => match index {
                Some(index) => format!("scroll {direction:?} on [{index}]").to_lowercase(),
                None => format!("scroll {direction:?}").to_lowercase(),
            },
            AgentAction::Swipe { from, to, .. } => {
                format!(
                    "swipe ({:.0},{:.0})->({:.0},{:.0})",
                    from.0, from.1, to.0, to.1
                )
            }
            AgentAction::Drag { from, to, .. } => {
                format!(
                    "drag ({:.0},{:.0})->({:.0},{:.0})",
                    from.0, from.1, to.0, to.1
                )
            }
            AgentAction::LongPress { index, hold_ms } => {
                format!("long_press [{index}] {hold_ms}ms")
            }
            AgentAction::Wait { ms } => format!("wait {ms}ms"),
            AgentAction::Done { success, .. } => format!("done success={success}"),
            AgentAction::Fail { .. } => "fail".to_string(),
        }
    }
}

/// One planner reply: optional reasoning plus exactly one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDecision {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub action: AgentAction,
}

/// The executor's classification of what happened to one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// The driver applied the action.
    Applied,
    /// The referenced index is not in the current snapshot's interactive set.
    ElementNotFound,
    /// The reference was minted by an earlier snapshot; re-plan immediately.
    StaleReference,
    /// Transport or backend failure; eligible for bounded retry.
    DriverError { detail: String },
    /// The action was genuinely inapplicable (e.g. tap on a disabled
    /// element). Never silent: recorded so the planner sees it.
    NoOp,
}

impl ActionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ActionOutcome::Applied)
    }

    /// Short label for history rendering.
    pub fn label(&self) -> String {
        match self {
            ActionOutcome::Applied => "applied".to_string(),
            ActionOutcome::ElementNotFound => "element_not_found".to_string(),
            ActionOutcome::StaleReference => "stale_reference".to_string(),
            ActionOutcome::DriverError { detail } => format!("driver_error ({detail})"),
            ActionOutcome::NoOp => "no_op".to_string(),
        }
    }
}

/// One completed step, as the planner will see it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// 1-indexed step number.
    pub step: u32,
    pub at: DateTime<Utc>,
    /// Brief snapshot description at the time the action was chosen.
    pub snapshot_summary: String,
    pub action: AgentAction,
    pub outcome: ActionOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl HistoryEntry {
    /// Rendering used verbatim in planner prompts.
    pub fn render(&self) -> String {
        let mut line = format!(
            "step {}: {} -> {} [{}]",
            self.step,
            self.action.describe(),
            self.outcome.label(),
            self.snapshot_summary,
        );
        if let Some(reasoning) = &self.reasoning {
            line.push_str(&format!("\n  reasoning: {reasoning}"));
        }
        line
    }

    /// One-line rendering used when the entry is evicted into the
    /// summarized prefix.
    pub fn compressed(&self) -> String {
        format!(
            "step {}: {} -> {}",
            self.step,
            self.action.describe(),
            self.outcome.label()
        )
    }
}

/// Event emitted once per completed step, for a UI or logger to render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepEvent {
    pub step_index: u32,
    pub action: AgentAction,
    pub outcome: ActionOutcome,
    pub snapshot_summary: String,
}

/// Terminal result of one `run()` invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SessionResult {
    Succeeded { message: String },
    Failed { reason: String },
    Cancelled,
}

impl SessionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, SessionResult::Succeeded { .. })
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        SessionResult::Failed {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_json_shape() {
        let action: AgentAction =
            serde_json::from_str(r#"{"action":"tap","index":3}"#).unwrap();
        assert_eq!(action, AgentAction::Tap { index: 3 });
        assert_eq!(action.target_index(), Some(3));

        let action: AgentAction =
            serde_json::from_str(r#"{"action":"scroll","direction":"down"}"#).unwrap();
        assert_eq!(
            action,
            AgentAction::Scroll {
                direction: ScrollDirection::Down,
                index: None
            }
        );
    }

    #[test]
    fn swipe_and_long_press_defaults() {
        let action: AgentAction =
            serde_json::from_str(r#"{"action":"swipe","from":[100,800],"to":[100,200]}"#).unwrap();
        assert_eq!(
            action,
            AgentAction::Swipe {
                from: (100.0, 800.0),
                to: (100.0, 200.0),
                duration_ms: 300
            }
        );
        let action: AgentAction =
            serde_json::from_str(r#"{"action":"long_press","index":1}"#).unwrap();
        assert_eq!(
            action,
            AgentAction::LongPress {
                index: 1,
                hold_ms: 800
            }
        );
        let action: AgentAction =
            serde_json::from_str(r#"{"action":"drag","from":[50,500],"to":[50,100]}"#).unwrap();
        assert_eq!(
            action,
            AgentAction::Drag {
                from: (50.0, 500.0),
                to: (50.0, 100.0),
                duration_ms: 600
            }
        );
    }

    #[test]
    fn terminal_actions() {
        assert!(AgentAction::Done {
            success: true,
            message: "ok".into()
        }
        .is_terminal());
        assert!(AgentAction::Fail {
            reason: "impossible".into()
        }
        .is_terminal());
        assert!(!AgentAction::Wait { ms: 100 }.is_terminal());
    }

    #[test]
    fn history_entry_renders_reasoning() {
        let entry = HistoryEntry {
            step: 2,
            at: Utc::now(),
            snapshot_summary: "12 elements / 4 interactive / a1b2c3d4".into(),
            action: AgentAction::Tap { index: 1 },
            outcome: ActionOutcome::Applied,
            reasoning: Some("login button is visible".into()),
        };
        let rendered = entry.render();
        assert!(rendered.contains("step 2: tap [1] -> applied"));
        assert!(rendered.contains("reasoning: login button is visible"));
        assert_eq!(entry.compressed(), "step 2: tap [1] -> applied");
    }
}
