//! Session orchestration: the perceive-plan-act state machine.
//!
//! One step runs Planning -> Validating -> Executing -> Observing to
//! completion before the next begins; the suspension points are exactly the
//! driver calls and the model call, each under its own timeout. Cancellation
//! is checked at the top of every iteration and raced against every
//! suspension point.

use std::sync::Arc;
use std::time::Duration;

use apptap_core_types::{SessionId, SnapshotEpoch};
use chrono::Utc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::RunConfig;
use super::executor::ActionExecutor;
use super::history::HistoryManager;
use super::snapshot::{Snapshot, SnapshotBuilder};
use super::types::{ActionOutcome, AgentAction, HistoryEntry, SessionResult, StepEvent};
use crate::errors::AgentError;
use crate::llm_provider::{ModelClient, Planner};
use app_adapter::AppDriver;

/// One agent run against one app.
///
/// The session borrows the driver connection; it never opens or closes it.
/// Destroyed when `run` returns.
pub struct AgentSession {
    session_id: SessionId,
    driver: Arc<dyn AppDriver>,
    model: Arc<dyn ModelClient>,
    config: RunConfig,
    builder: SnapshotBuilder,
    planner: Planner,
    history: HistoryManager,
    cancel: CancellationToken,
    events: broadcast::Sender<StepEvent>,
    steps_taken: u32,
}

impl AgentSession {
    /// Build a session; contract-violating configurations are rejected here,
    /// before any step runs.
    pub fn new(
        driver: Arc<dyn AppDriver>,
        model: Arc<dyn ModelClient>,
        config: RunConfig,
    ) -> Result<Self, AgentError> {
        config.validate()?;
        let (events, _) = broadcast::channel(64);
        Ok(Self {
            session_id: SessionId::new(),
            builder: SnapshotBuilder::new(config.max_elements, config.max_text_length),
            planner: Planner::new(config.max_plan_reprompts, config.planner_timeout()),
            history: HistoryManager::new(config.history_budget),
            driver,
            model,
            config,
            cancel: CancellationToken::new(),
            events,
            steps_taken: 0,
        })
    }

    /// One event per completed step.
    pub fn subscribe(&self) -> broadcast::Receiver<StepEvent> {
        self.events.subscribe()
    }

    /// Token callers use to cancel the run from outside.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn steps_taken(&self) -> u32 {
        self.steps_taken
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    /// Drive the task to a terminal state. Expected operational failures
    /// come back as `SessionResult::Failed`, never as an error.
    pub async fn run(&mut self, task: &str) -> SessionResult {
        info!(
            target: "agent-core",
            session = %self.session_id,
            task,
            "session started"
        );
        let metadata = self.driver.metadata();
        let mut epoch = SnapshotEpoch::default();
        let mut snapshot = match self.observe(&mut epoch).await {
            Ok(snapshot) => snapshot,
            Err(result) => return self.finish(result),
        };
        let mut stalled_for: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return self.finish(SessionResult::Cancelled);
            }
            if self.steps_taken >= self.config.max_steps {
                return self.finish(SessionResult::failed("step_limit_exceeded"));
            }

            // Planning.
            let history_rendering = self.history.render();
            let decision = tokio::select! {
                _ = self.cancel.cancelled() => return self.finish(SessionResult::Cancelled),
                decision = self.planner.decide(
                    self.model.as_ref(),
                    task,
                    &history_rendering,
                    &snapshot,
                    &metadata,
                ) => match decision {
                    Ok(decision) => decision,
                    Err(err) => {
                        warn!(target: "agent-core", error = %err, "planner gave up");
                        return self.finish(SessionResult::failed("planner_unparseable"));
                    }
                },
            };

            // Terminal actions end the session without touching the device.
            match &decision.action {
                AgentAction::Done { success, message } => {
                    let result = if *success {
                        SessionResult::Succeeded {
                            message: message.clone(),
                        }
                    } else {
                        SessionResult::failed(message.clone())
                    };
                    return self.finish(result);
                }
                AgentAction::Fail { reason } => {
                    return self.finish(SessionResult::failed(reason.clone()));
                }
                _ => {}
            }

            // A wait is paced by the session itself: it races only the
            // cancellation signal, never the per-call driver timeout, so a
            // wait longer than the step timeout is not a driver failure.
            let outcome = if let AgentAction::Wait { ms } = &decision.action {
                tokio::select! {
                    _ = self.cancel.cancelled() => return self.finish(SessionResult::Cancelled),
                    _ = tokio::time::sleep(Duration::from_millis(*ms)) => ActionOutcome::Applied,
                }
            } else {
                match self.dispatch_with_retry(&snapshot, &decision.action).await {
                    Ok(outcome) => outcome,
                    Err(result) => return self.finish(result),
                }
            };

            // Observing: the step is complete, whatever its outcome.
            self.steps_taken += 1;
            self.record_step(&snapshot, &decision.action, &outcome, decision.reasoning);

            if matches!(outcome, ActionOutcome::DriverError { .. }) {
                return self.finish(SessionResult::failed("driver_unreachable"));
            }

            let next = match self.observe(&mut epoch).await {
                Ok(snapshot) => snapshot,
                Err(result) => return self.finish(result),
            };
            if next.content_hash == snapshot.content_hash {
                stalled_for += 1;
                debug!(target: "agent-core", stalled_for, "no observable change");
                if stalled_for >= self.config.stall_threshold {
                    return self.finish(SessionResult::failed("stalled"));
                }
            } else {
                stalled_for = 0;
            }
            snapshot = next;
        }
    }

    /// Validating + Executing, with bounded retry on driver errors.
    /// Stale references and no-ops are not retried: they feed straight
    /// back into planning.
    async fn dispatch_with_retry(
        &self,
        snapshot: &Snapshot,
        action: &AgentAction,
    ) -> Result<ActionOutcome, SessionResult> {
        let mut attempt: u32 = 0;
        loop {
            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => return Err(SessionResult::Cancelled),
                outcome = tokio::time::timeout(
                    self.config.step_timeout(),
                    ActionExecutor::execute(
                        self.driver.as_ref(),
                        snapshot,
                        snapshot.epoch,
                        action,
                        self.config.step_timeout(),
                    ),
                ) => match outcome {
                    Ok(outcome) => outcome,
                    Err(_) => ActionOutcome::DriverError {
                        detail: "step timed out".to_string(),
                    },
                },
            };
            match outcome {
                ActionOutcome::DriverError { ref detail } if attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(
                        target: "agent-core",
                        attempt,
                        detail = %detail,
                        "transient driver failure, backing off"
                    );
                    let backoff = self.config.retry_backoff() * attempt;
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err(SessionResult::Cancelled),
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
                outcome => return Ok(outcome),
            }
        }
    }

    /// Capture a fresh snapshot under the next epoch, retrying transient
    /// capture failures within the same bounds as action dispatch.
    async fn observe(&self, epoch: &mut SnapshotEpoch) -> Result<Snapshot, SessionResult> {
        let mut attempt: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(SessionResult::Cancelled);
            }
            let captured = tokio::select! {
                _ = self.cancel.cancelled() => return Err(SessionResult::Cancelled),
                captured = tokio::time::timeout(
                    self.config.step_timeout(),
                    self.driver.capture(self.config.step_timeout()),
                ) => captured,
            };
            let transient = match captured {
                Ok(Ok(raw)) => {
                    *epoch = epoch.next();
                    let mut snapshot = self.builder.build(&raw, *epoch);
                    if self.config.capture_screenshots {
                        match self.driver.screenshot(self.config.step_timeout()).await {
                            Ok(bytes) => snapshot = snapshot.with_screenshot(bytes),
                            Err(err) => {
                                warn!(target: "agent-core", error = %err, "screenshot failed")
                            }
                        }
                    }
                    return Ok(snapshot);
                }
                Ok(Err(err)) => {
                    warn!(target: "agent-core", error = %err, "capture failed");
                    err.is_transient()
                }
                Err(_) => {
                    warn!(target: "agent-core", "capture timed out");
                    true
                }
            };
            if !transient || attempt >= self.config.max_retries {
                return Err(SessionResult::failed("driver_unreachable"));
            }
            attempt += 1;
            let backoff = self.config.retry_backoff() * attempt;
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(SessionResult::Cancelled),
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }

    fn record_step(
        &mut self,
        snapshot: &Snapshot,
        action: &AgentAction,
        outcome: &ActionOutcome,
        reasoning: Option<String>,
    ) {
        let brief = snapshot.brief();
        self.history.push(HistoryEntry {
            step: self.steps_taken,
            at: Utc::now(),
            snapshot_summary: brief.clone(),
            action: action.clone(),
            outcome: outcome.clone(),
            reasoning,
        });
        // No subscribers is fine.
        let _ = self.events.send(StepEvent {
            step_index: self.steps_taken,
            action: action.clone(),
            outcome: outcome.clone(),
            snapshot_summary: brief,
        });
    }

    fn finish(&self, result: SessionResult) -> SessionResult {
        info!(
            target: "agent-core",
            session = %self.session_id,
            steps = self.steps_taken,
            result = ?result,
            "session terminated"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_provider::ScriptedModel;
    use app_adapter::{RawNode, RawTree, StubDriver};
    use apptap_core_types::ViewportInfo;
    use std::time::Duration;

    const TAP_0: &str = r#"{"reasoning":"tap the button","action":{"action":"tap","index":0}}"#;
    const DONE_OK: &str =
        r#"{"action":{"action":"done","success":true,"message":"logged in"}}"#;

    fn tree_with_button(label: &str, enabled: bool) -> RawTree {
        let mut root = RawNode::new("android.widget.FrameLayout");
        let mut button = RawNode::new("android.widget.Button");
        button.text = Some(label.to_string());
        button.interactive = true;
        button.enabled = enabled;
        root.children.push(button);
        RawTree::new(root, ViewportInfo::new(1080, 1920))
    }

    fn session(
        stub: &Arc<StubDriver>,
        model: &Arc<ScriptedModel>,
        config: RunConfig,
    ) -> AgentSession {
        AgentSession::new(stub.clone(), model.clone(), config).unwrap()
    }

    #[test]
    fn invalid_config_rejected_at_construction() {
        let stub = Arc::new(StubDriver::new());
        let model = Arc::new(ScriptedModel::new(vec![DONE_OK]));
        let err = AgentSession::new(stub, model, RunConfig::minimal().max_steps(0));
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn done_action_succeeds_and_emits_events() {
        let stub = Arc::new(StubDriver::new());
        stub.push_tree(tree_with_button("Log in", true));
        stub.push_tree(tree_with_button("Welcome", true));
        let model = Arc::new(ScriptedModel::new(vec![TAP_0, DONE_OK]));
        let mut session = session(&stub, &model, RunConfig::minimal());
        let mut events = session.subscribe();

        let result = session.run("log in").await;
        assert_eq!(
            result,
            SessionResult::Succeeded {
                message: "logged in".to_string()
            }
        );
        assert_eq!(session.steps_taken(), 1);

        let event = events.try_recv().unwrap();
        assert_eq!(event.step_index, 1);
        assert_eq!(event.outcome, ActionOutcome::Applied);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn step_limit_terminates_at_exactly_k() {
        let stub = Arc::new(StubDriver::new());
        // Distinct trees each observation so stall never fires first.
        for i in 0..10 {
            stub.push_tree(tree_with_button(&format!("label {i}"), true));
        }
        let model = Arc::new(ScriptedModel::new(vec![TAP_0]));
        let config = RunConfig::minimal().max_steps(3).stall(10);
        let mut session = session(&stub, &model, config);

        let result = session.run("never finishes").await;
        assert_eq!(result, SessionResult::failed("step_limit_exceeded"));
        assert_eq!(session.steps_taken(), 3);
        assert_eq!(stub.recorded().len(), 3);
    }

    #[tokio::test]
    async fn driver_errors_exhaust_after_max_retries_plus_one() {
        use app_adapter::{AdapterError, AdapterErrorKind};
        let stub = Arc::new(StubDriver::new());
        stub.push_tree(tree_with_button("Log in", true));
        for _ in 0..5 {
            stub.push_action_result(Err(AdapterError::new(AdapterErrorKind::Transport)));
        }
        let model = Arc::new(ScriptedModel::new(vec![TAP_0]));
        let config = RunConfig::minimal().retries(2);
        let mut session = session(&stub, &model, config);

        let result = session.run("tap it").await;
        assert_eq!(result, SessionResult::failed("driver_unreachable"));
        // Exactly max_retries + 1 dispatch attempts for the one step.
        assert_eq!(stub.recorded().len(), 3);
        assert_eq!(session.steps_taken(), 1);
    }

    #[tokio::test]
    async fn unchanged_screen_stalls() {
        let stub = Arc::new(StubDriver::new());
        // One tree, repeated forever by the stub.
        stub.push_tree(tree_with_button("Frozen", true));
        let model = Arc::new(ScriptedModel::new(vec![TAP_0]));
        let config = RunConfig::minimal().stall(2).max_steps(10);
        let mut session = session(&stub, &model, config);

        let result = session.run("make progress").await;
        assert_eq!(result, SessionResult::failed("stalled"));
        assert_eq!(session.steps_taken(), 2);
    }

    #[tokio::test]
    async fn pre_cancelled_session_does_nothing() {
        let stub = Arc::new(StubDriver::new());
        stub.push_tree(tree_with_button("Log in", true));
        let model = Arc::new(ScriptedModel::new(vec![TAP_0]));
        let mut session = session(&stub, &model, RunConfig::minimal());
        session.cancel_token().cancel();

        let result = session.run("log in").await;
        assert_eq!(result, SessionResult::Cancelled);
        assert!(stub.recorded().is_empty());
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn cancellation_during_execution_dispatches_nothing_further() {
        let stub = Arc::new(StubDriver::new());
        stub.push_tree(tree_with_button("Log in", true));
        let wait_long = r#"{"action":{"action":"wait","ms":60000}}"#;
        let model = Arc::new(ScriptedModel::new(vec![wait_long]));
        let config = RunConfig::minimal().max_steps(50);
        let mut session = session(&stub, &model, config);

        let cancel = session.cancel_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });
        let result = session.run("wait forever").await;
        assert_eq!(result, SessionResult::Cancelled);
        assert!(stub.recorded().is_empty());
    }

    #[tokio::test]
    async fn long_wait_is_not_a_driver_failure() {
        let stub = Arc::new(StubDriver::new());
        stub.push_tree(tree_with_button("Loading", true));
        stub.push_tree(tree_with_button("Ready", true));
        let wait = r#"{"action":{"action":"wait","ms":200}}"#;
        let model = Arc::new(ScriptedModel::new(vec![wait, DONE_OK]));
        // A wait longer than the per-call driver timeout still applies.
        let config = RunConfig {
            step_timeout_ms: 50,
            ..RunConfig::minimal()
        };
        let mut session = session(&stub, &model, config);

        let result = session.run("wait for the page").await;
        assert!(result.is_success());
        assert_eq!(session.steps_taken(), 1);
        let entries = session.history().entries();
        assert_eq!(entries[0].outcome, ActionOutcome::Applied);
    }

    #[tokio::test]
    async fn screenshots_attach_when_enabled() {
        use app_adapter::RecordedAction;
        let stub = Arc::new(StubDriver::new());
        stub.push_tree(tree_with_button("Log in", true));
        let model = Arc::new(ScriptedModel::new(vec![DONE_OK]));
        let config = RunConfig::minimal().screenshots(true);
        let mut session = session(&stub, &model, config);

        let result = session.run("log in").await;
        assert!(result.is_success());
        assert!(stub.recorded().contains(&RecordedAction::Screenshot));
        let prompts = model.prompts();
        assert!(prompts[0].contains("screenshot of this state"));
    }

    #[tokio::test]
    async fn disabled_element_records_no_op_and_replans() {
        let stub = Arc::new(StubDriver::new());
        stub.push_tree(tree_with_button("Log in", false));
        let model = Arc::new(ScriptedModel::new(vec![TAP_0, DONE_OK]));
        let mut session = session(&stub, &model, RunConfig::minimal());

        let result = session.run("tap the login button").await;
        assert!(result.is_success());
        let entries = session.history().entries();
        assert_eq!(entries[0].outcome, ActionOutcome::NoOp);
        // The driver was never touched for the disabled tap.
        assert!(stub.recorded().is_empty());
    }

    #[tokio::test]
    async fn empty_tree_still_produces_a_well_formed_prompt() {
        let stub = Arc::new(StubDriver::new());
        // Nothing queued: the stub serves an explicit empty tree.
        let model = Arc::new(ScriptedModel::new(vec![DONE_OK]));
        let mut session = session(&stub, &model, RunConfig::minimal());

        let result = session.run("wait out the splash screen").await;
        assert!(result.is_success());
        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("0 interactive elements"));
    }

    #[tokio::test]
    async fn unparseable_planner_fails_session() {
        let stub = Arc::new(StubDriver::new());
        stub.push_tree(tree_with_button("Log in", true));
        let model = Arc::new(ScriptedModel::new(vec!["I refuse to emit JSON"]));
        let mut session = session(&stub, &model, RunConfig::minimal());

        let result = session.run("log in").await;
        assert_eq!(result, SessionResult::failed("planner_unparseable"));
    }

    #[tokio::test]
    async fn fail_action_carries_model_reason() {
        let stub = Arc::new(StubDriver::new());
        stub.push_tree(tree_with_button("Log in", true));
        let fail = r#"{"action":{"action":"fail","reason":"no login form in this app"}}"#;
        let model = Arc::new(ScriptedModel::new(vec![fail]));
        let mut session = session(&stub, &model, RunConfig::minimal());

        let result = session.run("log in").await;
        assert_eq!(result, SessionResult::failed("no login form in this app"));
        assert_eq!(session.steps_taken(), 0);
    }

    #[tokio::test]
    async fn capture_failures_exhaust_to_driver_unreachable() {
        use app_adapter::{AdapterError, AdapterErrorKind};
        let stub = Arc::new(StubDriver::new());
        for _ in 0..5 {
            stub.push_capture_error(AdapterError::new(AdapterErrorKind::Transport));
        }
        let model = Arc::new(ScriptedModel::new(vec![DONE_OK]));
        let mut session = session(&stub, &model, RunConfig::minimal().retries(1));

        let result = session.run("anything").await;
        assert_eq!(result, SessionResult::failed("driver_unreachable"));
        assert!(model.prompts().is_empty());
    }
}
