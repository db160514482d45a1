//! Scripted in-memory driver for exercising the agent loop without a device.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use apptap_core_types::{AppMetadata, Platform, ViewportInfo};
use async_trait::async_trait;

use crate::driver::{AppDriver, ScrollDirection};
use crate::error::AdapterError;
use crate::raw::{RawTree, TargetRef};

/// One action the stub received, in dispatch order.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordedAction {
    Tap(TargetRef),
    EnterText(TargetRef, String),
    Scroll(ScrollDirection, Option<TargetRef>),
    Swipe((f32, f32), (f32, f32), u64),
    Drag((f32, f32), (f32, f32), u64),
    LongPress(TargetRef, u64),
    Screenshot,
}

/// Driver that replays scripted captures and records every action.
///
/// Captures are served from a queue; once the queue drains, the last tree is
/// repeated, which makes stall scenarios trivial to script. Action results
/// default to success unless a failure has been queued.
pub struct StubDriver {
    captures: Mutex<VecDeque<Result<RawTree, AdapterError>>>,
    last_tree: Mutex<Option<RawTree>>,
    action_results: Mutex<VecDeque<Result<(), AdapterError>>>,
    recorded: Mutex<Vec<RecordedAction>>,
    metadata: AppMetadata,
}

impl StubDriver {
    pub fn new() -> Self {
        Self {
            captures: Mutex::new(VecDeque::new()),
            last_tree: Mutex::new(None),
            action_results: Mutex::new(VecDeque::new()),
            recorded: Mutex::new(Vec::new()),
            metadata: AppMetadata {
                platform: Platform::Android,
                app_identifier: "com.example.stub".to_string(),
                device_name: Some("stub-device".to_string()),
                automation_name: "Stub".to_string(),
            },
        }
    }

    /// Queue the next tree `capture` will return.
    pub fn push_tree(&self, tree: RawTree) {
        self.captures.lock().unwrap().push_back(Ok(tree));
    }

    /// Queue a capture failure.
    pub fn push_capture_error(&self, err: AdapterError) {
        self.captures.lock().unwrap().push_back(Err(err));
    }

    /// Queue the result of the next action; unqueued actions succeed.
    pub fn push_action_result(&self, result: Result<(), AdapterError>) {
        self.action_results.lock().unwrap().push_back(result);
    }

    /// Every action dispatched so far, in order.
    pub fn recorded(&self) -> Vec<RecordedAction> {
        self.recorded.lock().unwrap().clone()
    }

    fn record(&self, action: RecordedAction) -> Result<(), AdapterError> {
        self.recorded.lock().unwrap().push(action);
        self.action_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }
}

impl Default for StubDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AppDriver for StubDriver {
    async fn capture(&self, _deadline: Duration) -> Result<RawTree, AdapterError> {
        let next = self.captures.lock().unwrap().pop_front();
        match next {
            Some(Ok(tree)) => {
                *self.last_tree.lock().unwrap() = Some(tree.clone());
                Ok(tree)
            }
            Some(Err(err)) => Err(err),
            None => {
                let last = self.last_tree.lock().unwrap().clone();
                Ok(last.unwrap_or_else(|| RawTree::empty(ViewportInfo::new(1080, 1920))))
            }
        }
    }

    async fn tap(&self, target: &TargetRef, _deadline: Duration) -> Result<(), AdapterError> {
        self.record(RecordedAction::Tap(target.clone()))
    }

    async fn enter_text(
        &self,
        target: &TargetRef,
        text: &str,
        _deadline: Duration,
    ) -> Result<(), AdapterError> {
        self.record(RecordedAction::EnterText(target.clone(), text.to_string()))
    }

    async fn scroll(
        &self,
        direction: ScrollDirection,
        target: Option<&TargetRef>,
        _deadline: Duration,
    ) -> Result<(), AdapterError> {
        self.record(RecordedAction::Scroll(direction, target.cloned()))
    }

    async fn swipe(
        &self,
        from: (f32, f32),
        to: (f32, f32),
        duration_ms: u64,
        _deadline: Duration,
    ) -> Result<(), AdapterError> {
        self.record(RecordedAction::Swipe(from, to, duration_ms))
    }

    async fn drag_and_drop(
        &self,
        from: (f32, f32),
        to: (f32, f32),
        duration_ms: u64,
        _deadline: Duration,
    ) -> Result<(), AdapterError> {
        self.record(RecordedAction::Drag(from, to, duration_ms))
    }

    async fn long_press(
        &self,
        target: &TargetRef,
        hold_ms: u64,
        _deadline: Duration,
    ) -> Result<(), AdapterError> {
        self.record(RecordedAction::LongPress(target.clone(), hold_ms))
    }

    async fn screenshot(&self, _deadline: Duration) -> Result<Vec<u8>, AdapterError> {
        self.record(RecordedAction::Screenshot)?;
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    fn metadata(&self) -> AppMetadata {
        self.metadata.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::RawNode;
    use apptap_core_types::ViewportInfo;

    #[tokio::test]
    async fn replays_queued_trees_then_repeats_last() {
        let stub = StubDriver::new();
        let viewport = ViewportInfo::new(100, 100);
        let mut first = RawTree::empty(viewport);
        first.root = RawNode::new("First");
        stub.push_tree(first);

        let tree = stub.capture(Duration::from_secs(1)).await.unwrap();
        assert_eq!(tree.root.kind, "First");
        // Queue drained, last tree repeats.
        let tree = stub.capture(Duration::from_secs(1)).await.unwrap();
        assert_eq!(tree.root.kind, "First");
    }

    #[tokio::test]
    async fn records_actions_in_order() {
        let stub = StubDriver::new();
        let target = TargetRef::Point { x: 1.0, y: 2.0 };
        stub.tap(&target, Duration::from_secs(1)).await.unwrap();
        stub.enter_text(&target, "hi", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(
            stub.recorded(),
            vec![
                RecordedAction::Tap(target.clone()),
                RecordedAction::EnterText(target, "hi".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn queued_action_failures_surface() {
        use crate::error::AdapterErrorKind;
        let stub = StubDriver::new();
        stub.push_action_result(Err(AdapterError::new(AdapterErrorKind::TargetNotFound)));
        let target = TargetRef::Point { x: 0.0, y: 0.0 };
        let err = stub.tap(&target, Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::TargetNotFound);
        assert!(stub.tap(&target, Duration::from_secs(1)).await.is_ok());
    }
}
