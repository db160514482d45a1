//! Prompt construction for the planner.
//!
//! Prompts are pure functions of their inputs: the same task, history and
//! snapshot always produce the same text, so planning calls replay exactly
//! in tests.

use apptap_core_types::AppMetadata;

use super::snapshot::Snapshot;

/// System prompt establishing the reply contract.
const SYSTEM_PROMPT: &str = r#"You are a mobile app automation agent. You observe the app's UI as an
indexed element tree and decide exactly one action per step.

Interactive elements are shown as [N]<Kind> with their text and key. Only
indices shown in the current UI state may be targeted; indices from earlier
steps are invalid. Elements marked (low confidence) have no stable text or
key; prefer other elements when possible. Elements marked (disabled) will
not accept input.

Reply with a single JSON object, no prose outside it:

{
  "reasoning": "<one or two sentences on why>",
  "action": { ... }
}

Available actions:
  {"action": "tap", "index": N}
  {"action": "enter_text", "index": N, "text": "..."}
  {"action": "scroll", "direction": "up"|"down"|"left"|"right", "index": N?}
  {"action": "swipe", "from": [x, y], "to": [x, y], "duration_ms": 300}
  {"action": "drag", "from": [x, y], "to": [x, y], "duration_ms": 600}
  {"action": "long_press", "index": N, "hold_ms": 800}
  {"action": "wait", "ms": 1000}
  {"action": "done", "success": true|false, "message": "..."}
  {"action": "fail", "reason": "..."}

Use "done" the moment the task is accomplished. Use "fail" only when the
task is genuinely impossible in this app."#;

pub fn format_system_prompt() -> String {
    SYSTEM_PROMPT.to_string()
}

/// User message carrying task, bounded history and the current UI state.
pub fn format_user_message(
    task: &str,
    history_rendering: &str,
    snapshot: &Snapshot,
    metadata: &AppMetadata,
) -> String {
    let mut message = String::new();
    message.push_str(&format!("TASK: {task}\n\n"));
    message.push_str(&format!(
        "APP: {} on {} (automation: {})\n",
        metadata.app_identifier, metadata.platform, metadata.automation_name
    ));
    message.push_str(&format!(
        "VIEWPORT: {}x{}\n\n",
        snapshot.viewport.width, snapshot.viewport.height
    ));
    if history_rendering.is_empty() {
        message.push_str("HISTORY: (first step)\n\n");
    } else {
        message.push_str(&format!("HISTORY:\n{history_rendering}\n\n"));
    }
    message.push_str(&format!(
        "CURRENT UI STATE ({}):\n{}\n",
        snapshot.brief(),
        snapshot.summary
    ));
    if snapshot.screenshot.is_some() {
        message.push_str("\nA screenshot of this state was captured.\n");
    }
    message.push_str("\nDecide the next action.");
    message
}

/// Nudge appended when the previous reply did not parse.
pub fn format_reparse_nudge(error: &str) -> String {
    format!(
        "Your previous reply could not be parsed ({error}). Reply again with \
only the JSON object described in the instructions."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_loop::snapshot::SnapshotBuilder;
    use app_adapter::RawTree;
    use apptap_core_types::{Platform, SnapshotEpoch, ViewportInfo};

    fn metadata() -> AppMetadata {
        AppMetadata {
            platform: Platform::Android,
            app_identifier: "com.demo".to_string(),
            device_name: None,
            automation_name: "UiAutomator2".to_string(),
        }
    }

    #[test]
    fn user_message_is_deterministic() {
        let raw = RawTree::empty(ViewportInfo::new(1080, 1920));
        let snapshot = SnapshotBuilder::new(50, 40).build(&raw, SnapshotEpoch(1));
        let first = format_user_message("log in", "step 1: tap [0] -> applied", &snapshot, &metadata());
        let second = format_user_message("log in", "step 1: tap [0] -> applied", &snapshot, &metadata());
        assert_eq!(first, second);
        assert!(first.contains("TASK: log in"));
        assert!(first.contains("0 interactive elements"));
    }

    #[test]
    fn first_step_has_no_history_block() {
        let raw = RawTree::empty(ViewportInfo::new(100, 100));
        let snapshot = SnapshotBuilder::new(50, 40).build(&raw, SnapshotEpoch(1));
        let message = format_user_message("do it", "", &snapshot, &metadata());
        assert!(message.contains("HISTORY: (first step)"));
    }

    #[test]
    fn system_prompt_names_every_action() {
        let prompt = format_system_prompt();
        for action in [
            "tap",
            "enter_text",
            "scroll",
            "swipe",
            "drag",
            "long_press",
            "wait",
            "done",
            "fail",
        ] {
            assert!(prompt.contains(action), "missing {action}");
        }
    }
}
