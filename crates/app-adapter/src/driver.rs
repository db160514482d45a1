//! The capability trait every automation backend implements.

use std::time::Duration;

use apptap_core_types::AppMetadata;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AdapterError;
use crate::raw::{RawTree, TargetRef};

/// Scroll direction, expressed from the user's point of view: `Down` reveals
/// content further down the page.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

/// Minimal capability surface the agent loop requires from a backend.
///
/// Contract notes shared by all implementations:
/// - `capture` always returns a fresh, internally consistent tree; a backend
///   reporting nothing yields an explicit empty tree, never an error.
/// - Action methods either succeed, fail with `TargetNotFound` /
///   `NotInteractable`, or fail with a transport-level error. They never
///   silently do nothing.
/// - Connection loss is reported as `Transport` and is not retried here;
///   retry policy lives in the agent loop.
#[async_trait]
pub trait AppDriver: Send + Sync {
    /// Capture the current UI tree together with viewport dimensions.
    async fn capture(&self, deadline: Duration) -> Result<RawTree, AdapterError>;

    /// Tap the referenced element.
    async fn tap(&self, target: &TargetRef, deadline: Duration) -> Result<(), AdapterError>;

    /// Replace the referenced element's text with `text`.
    async fn enter_text(
        &self,
        target: &TargetRef,
        text: &str,
        deadline: Duration,
    ) -> Result<(), AdapterError>;

    /// Scroll the referenced element, or the whole screen when `target` is
    /// `None`.
    async fn scroll(
        &self,
        direction: ScrollDirection,
        target: Option<&TargetRef>,
        deadline: Duration,
    ) -> Result<(), AdapterError>;

    /// Free-form swipe between two screen points.
    async fn swipe(
        &self,
        from: (f32, f32),
        to: (f32, f32),
        duration_ms: u64,
        deadline: Duration,
    ) -> Result<(), AdapterError>;

    /// Press at `from`, hold until the pointer is recognized as grabbing,
    /// then drag to `to` and release.
    async fn drag_and_drop(
        &self,
        from: (f32, f32),
        to: (f32, f32),
        duration_ms: u64,
        deadline: Duration,
    ) -> Result<(), AdapterError>;

    /// Press and hold the referenced element.
    async fn long_press(
        &self,
        target: &TargetRef,
        hold_ms: u64,
        deadline: Duration,
    ) -> Result<(), AdapterError>;

    /// PNG screenshot of the current screen.
    async fn screenshot(&self, deadline: Duration) -> Result<Vec<u8>, AdapterError>;

    /// Static description of the app and device behind this connection.
    fn metadata(&self) -> AppMetadata;
}
