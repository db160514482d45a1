//! Action execution: validate against the current snapshot, dispatch through
//! the driver, classify the outcome.

use std::time::Duration;

use app_adapter::{AdapterError, AdapterErrorKind, AppDriver, TargetRef};
use apptap_core_types::SnapshotEpoch;
use tracing::{debug, warn};

use super::resolver::ResolveError;
use super::snapshot::Snapshot;
use super::types::{ActionOutcome, AgentAction};

/// Dispatches validated actions through a driver.
///
/// Validation happens against the snapshot the action will run in, using the
/// epoch the action was planned against; a stale or unknown reference never
/// reaches the driver. `done` and `fail` never reach this layer at all, the
/// session short-circuits them.
pub struct ActionExecutor;

impl ActionExecutor {
    /// Execute one action against `snapshot`. `planned_at` is the epoch of
    /// the snapshot the planner saw when it chose this action.
    pub async fn execute(
        driver: &dyn AppDriver,
        snapshot: &Snapshot,
        planned_at: SnapshotEpoch,
        action: &AgentAction,
        deadline: Duration,
    ) -> ActionOutcome {
        // Even targetless actions honor epoch discipline: a decision planned
        // against an older snapshot is stale wholesale.
        if planned_at != snapshot.epoch {
            return ActionOutcome::StaleReference;
        }

        let result = match action {
            AgentAction::Tap { index } => match resolve_target(snapshot, *index, planned_at) {
                Ok(target) => driver.tap(&target, deadline).await,
                Err(outcome) => return outcome,
            },
            AgentAction::EnterText { index, text } => {
                match resolve_target(snapshot, *index, planned_at) {
                    Ok(target) => driver.enter_text(&target, text, deadline).await,
                    Err(outcome) => return outcome,
                }
            }
            AgentAction::Scroll { direction, index } => {
                let target = match index {
                    Some(index) => match resolve_target(snapshot, *index, planned_at) {
                        Ok(target) => Some(target),
                        Err(outcome) => return outcome,
                    },
                    None => None,
                };
                driver.scroll(*direction, target.as_ref(), deadline).await
            }
            AgentAction::Swipe {
                from,
                to,
                duration_ms,
            } => driver.swipe(*from, *to, *duration_ms, deadline).await,
            AgentAction::Drag {
                from,
                to,
                duration_ms,
            } => driver.drag_and_drop(*from, *to, *duration_ms, deadline).await,
            AgentAction::LongPress { index, hold_ms } => {
                match resolve_target(snapshot, *index, planned_at) {
                    Ok(target) => driver.long_press(&target, *hold_ms, deadline).await,
                    Err(outcome) => return outcome,
                }
            }
            // Waits and terminals never reach the driver: the session paces
            // a wait itself and short-circuits the terminals before dispatch.
            AgentAction::Wait { .. } | AgentAction::Done { .. } | AgentAction::Fail { .. } => {
                Ok(())
            }
        };

        match result {
            Ok(()) => ActionOutcome::Applied,
            Err(err) => classify(err),
        }
    }
}

/// Look up an interactive index, turning resolution failures into the
/// outcome the session records.
fn resolve_target(
    snapshot: &Snapshot,
    index: u32,
    planned_at: SnapshotEpoch,
) -> Result<TargetRef, ActionOutcome> {
    match snapshot.resolve(index, planned_at) {
        Ok(reference) => {
            if !reference.enabled {
                debug!(target: "agent-core", index, "action targets a disabled element");
                return Err(ActionOutcome::NoOp);
            }
            Ok(reference.target.clone())
        }
        Err(ResolveError::Stale) => Err(ActionOutcome::StaleReference),
        Err(ResolveError::NotFound) => Err(ActionOutcome::ElementNotFound),
    }
}

/// Map adapter failures onto executor outcomes.
fn classify(err: AdapterError) -> ActionOutcome {
    match err.kind {
        AdapterErrorKind::TargetNotFound => ActionOutcome::ElementNotFound,
        AdapterErrorKind::NotInteractable => ActionOutcome::NoOp,
        AdapterErrorKind::Transport
        | AdapterErrorKind::Timeout
        | AdapterErrorKind::Protocol
        | AdapterErrorKind::Internal => {
            warn!(target: "agent-core", error = %err, "driver call failed");
            ActionOutcome::DriverError {
                detail: err.to_string(),
            }
        }
    }
}
