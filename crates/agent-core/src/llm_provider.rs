//! Model bridge: the client abstraction and the decision parser.
//!
//! The planner is stateless between calls. All continuity travels through
//! the rendered history argument, which makes every planning call
//! independently replayable against a scripted model.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::agent_loop::prompt::{format_reparse_nudge, format_system_prompt, format_user_message};
use crate::agent_loop::snapshot::Snapshot;
use crate::agent_loop::types::AgentDecision;
use crate::errors::AgentError;
use apptap_core_types::AppMetadata;

/// Minimal model contract: given a prompt, return raw text. Authentication
/// and vendor plumbing live outside the core.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, AgentError>;
}

/// Formats planning prompts and parses replies into decisions.
#[derive(Debug, Clone)]
pub struct Planner {
    /// Extra attempts when a reply does not parse.
    max_reprompts: u32,
    timeout: Duration,
}

impl Planner {
    pub fn new(max_reprompts: u32, timeout: Duration) -> Self {
        Self {
            max_reprompts,
            timeout,
        }
    }

    /// Produce exactly one decision, re-prompting a bounded number of times
    /// on malformed output. A model-call timeout counts as a failed attempt.
    pub async fn decide(
        &self,
        model: &dyn ModelClient,
        task: &str,
        history_rendering: &str,
        snapshot: &Snapshot,
        metadata: &AppMetadata,
    ) -> Result<AgentDecision, AgentError> {
        let system = format_system_prompt();
        let mut user = format_user_message(task, history_rendering, snapshot, metadata);

        let mut last_error = String::new();
        for attempt in 0..=self.max_reprompts {
            let reply = match tokio::time::timeout(self.timeout, model.complete(&system, &user))
                .await
            {
                Ok(Ok(reply)) => reply,
                Ok(Err(err)) => {
                    warn!(target: "agent-core", attempt, error = %err, "model call failed");
                    last_error = err.to_string();
                    continue;
                }
                Err(_) => {
                    warn!(target: "agent-core", attempt, "model call timed out");
                    last_error = "model call timed out".to_string();
                    continue;
                }
            };
            match parse_decision(&reply) {
                Ok(decision) => {
                    debug!(
                        target: "agent-core",
                        action = %decision.action.describe(),
                        "planner decided"
                    );
                    return Ok(decision);
                }
                Err(err) => {
                    warn!(target: "agent-core", attempt, error = %err, "unparseable reply");
                    last_error = err.to_string();
                    user.push_str("\n\n");
                    user.push_str(&format_reparse_nudge(&last_error));
                }
            }
        }
        Err(AgentError::plan_parse(last_error))
    }
}

/// Parse a model reply into one decision, tolerating fenced JSON and
/// surrounding prose.
pub fn parse_decision(reply: &str) -> Result<AgentDecision, AgentError> {
    let candidate = extract_json(reply)
        .ok_or_else(|| AgentError::plan_parse("no JSON object found in reply"))?;
    serde_json::from_str::<AgentDecision>(candidate)
        .map_err(|err| AgentError::plan_parse(format!("invalid decision JSON: {err}")))
}

/// Find the JSON object in a reply: a ```json fence if present, otherwise
/// the outermost braces.
fn extract_json(reply: &str) -> Option<&str> {
    let trimmed = reply.trim();
    if let Some(start) = trimmed.find("```") {
        let body = &trimmed[start + 3..];
        let body = body.strip_prefix("json").unwrap_or(body);
        if let Some(end) = body.find("```") {
            return Some(body[..end].trim());
        }
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

/// Deterministic model used for tests and offline development. Replies are
/// consumed in order; once the queue drains the last reply repeats.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: std::sync::Mutex<Vec<String>>,
    cursor: std::sync::Mutex<usize>,
    /// Every user prompt the model was shown, for assertions.
    prompts: std::sync::Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: std::sync::Mutex::new(replies.into_iter().map(str::to_string).collect()),
            cursor: std::sync::Mutex::new(0),
            prompts: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn complete(&self, _system: &str, user: &str) -> Result<String, AgentError> {
        self.prompts.lock().unwrap().push(user.to_string());
        let replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            return Err(AgentError::model("scripted model has no replies"));
        }
        let mut cursor = self.cursor.lock().unwrap();
        let reply = replies[(*cursor).min(replies.len() - 1)].clone();
        *cursor += 1;
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_loop::snapshot::SnapshotBuilder;
    use crate::agent_loop::types::AgentAction;
    use app_adapter::RawTree;
    use apptap_core_types::{Platform, SnapshotEpoch, ViewportInfo};

    fn metadata() -> AppMetadata {
        AppMetadata {
            platform: Platform::Flutter,
            app_identifier: "ws://demo".to_string(),
            device_name: None,
            automation_name: "DartVM".to_string(),
        }
    }

    fn empty_snapshot() -> Snapshot {
        SnapshotBuilder::new(50, 40).build(
            &RawTree::empty(ViewportInfo::new(100, 100)),
            SnapshotEpoch(1),
        )
    }

    #[test]
    fn parses_bare_json() {
        let decision =
            parse_decision(r#"{"reasoning":"go","action":{"action":"tap","index":2}}"#).unwrap();
        assert_eq!(decision.action, AgentAction::Tap { index: 2 });
        assert_eq!(decision.reasoning.as_deref(), Some("go"));
    }

    #[test]
    fn parses_fenced_json_with_prose() {
        let reply = "Sure, here is my decision:\n```json\n{\"action\":{\"action\":\"wait\",\"ms\":500}}\n```\nDone.";
        let decision = parse_decision(reply).unwrap();
        assert_eq!(decision.action, AgentAction::Wait { ms: 500 });
    }

    #[test]
    fn garbage_fails_to_parse() {
        assert!(parse_decision("I will tap the button now").is_err());
        assert!(parse_decision(r#"{"action":{"action":"teleport"}}"#).is_err());
    }

    #[tokio::test]
    async fn reprompts_then_succeeds() {
        let model = ScriptedModel::new(vec![
            "not json at all",
            r#"{"action":{"action":"tap","index":0}}"#,
        ]);
        let planner = Planner::new(2, Duration::from_secs(1));
        let snapshot = empty_snapshot();
        let decision = planner
            .decide(&model, "task", "", &snapshot, &metadata())
            .await
            .unwrap();
        assert_eq!(decision.action, AgentAction::Tap { index: 0 });
        // The re-prompt carried a nudge.
        let prompts = model.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("could not be parsed"));
    }

    #[tokio::test]
    async fn bounded_reprompts_surface_plan_parse() {
        let model = ScriptedModel::new(vec!["still not json"]);
        let planner = Planner::new(1, Duration::from_secs(1));
        let snapshot = empty_snapshot();
        let err = planner
            .decide(&model, "task", "", &snapshot, &metadata())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::PlanParse(_)));
        assert_eq!(model.prompts().len(), 2);
    }
}
