//! Agent core for apptap.
//!
//! Ties a language model to a mobile app automation backend through a
//! perceive-plan-act loop: snapshots of the UI tree go to the model, the
//! model's decisions come back as validated actions, and a bounded history
//! carries continuity between steps.

pub mod agent_loop;
pub mod errors;
pub mod llm_provider;

pub use agent_loop::{
    ActionOutcome, AgentAction, AgentDecision, AgentSession, ElementRef, HistoryEntry,
    HistoryManager, ResolveError, RunConfig, SessionResult, Snapshot, SnapshotBuilder, StepEvent,
    UiElement,
};
pub use errors::AgentError;
pub use llm_provider::{parse_decision, ModelClient, Planner, ScriptedModel};
