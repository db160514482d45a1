//! Perceive-plan-act execution loop.
//!
//! The model is consulted at every step to decide the next action from the
//! current UI snapshot, rather than generating a whole plan upfront:
//!
//! ```text
//! while !terminated && steps < max:
//!     snapshot = observe()       // capture + canonicalize the UI tree
//!     decision = model.decide()  // exactly one action per step
//!     outcome  = execute()       // validate against snapshot, dispatch
//!     history.push(step)         // bounded planner context
//! ```
//!
//! # Key components
//!
//! - [`RunConfig`]: limits and timeouts for one session
//! - [`Snapshot`] / [`SnapshotBuilder`]: canonical indexed UI state
//! - [`ActionExecutor`]: validate-then-dispatch with outcome classification
//! - [`HistoryManager`]: bounded chronological step log
//! - [`AgentSession`]: the orchestrating state machine

pub mod config;
pub mod controller;
pub mod executor;
pub mod history;
pub mod prompt;
pub mod resolver;
pub mod snapshot;
pub mod types;

pub use config::RunConfig;
pub use controller::AgentSession;
pub use executor::ActionExecutor;
pub use history::HistoryManager;
pub use prompt::{format_system_prompt, format_user_message};
pub use resolver::ResolveError;
pub use snapshot::{ElementRef, Snapshot, SnapshotBuilder, UiElement};
pub use types::{
    ActionOutcome, AgentAction, AgentDecision, HistoryEntry, SessionResult, StepEvent,
};
