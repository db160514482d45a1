//! Dart VM service adapter for Flutter apps.
//!
//! One persistent WebSocket carries JSON-RPC both ways: requests are matched
//! to responses by id through a pending-call map, with a reader task pumping
//! the socket. UI trees come from the widget inspector's summary tree;
//! actions go through the `ext.flutter.driver` extension addressed by widget
//! finders. Inspector object handles do not survive widget rebuilds, so no
//! handle outlives the capture that produced it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use apptap_core_types::{AppMetadata, Platform, ViewportInfo};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use dashmap::DashMap;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Map, Value};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::driver::{AppDriver, ScrollDirection};
use crate::error::{AdapterError, AdapterErrorKind};
use crate::raw::{FlutterFinder, RawNode, RawTree, TargetRef};

/// Widget types that accept user input.
const FLUTTER_INTERACTIVE_TYPES: &[&str] = &[
    "GestureDetector",
    "InkWell",
    "InkResponse",
    "ElevatedButton",
    "TextButton",
    "OutlinedButton",
    "IconButton",
    "FloatingActionButton",
    "TextField",
    "TextFormField",
    "CupertinoTextField",
    "CupertinoButton",
    "Checkbox",
    "Radio",
    "Switch",
    "Slider",
    "DropdownButton",
    "ListTile",
    "PopupMenuButton",
    "BackButton",
    "CloseButton",
];

/// Layout plumbing collapsed out of the tree; their children are hoisted into
/// the parent so the agent only sees widgets worth reasoning about.
const FLUTTER_PLUMBING_TYPES: &[&str] = &[
    "Padding",
    "Align",
    "Center",
    "SizedBox",
    "ConstrainedBox",
    "DecoratedBox",
    "ColoredBox",
    "DefaultTextStyle",
    "Directionality",
    "MediaQuery",
    "Semantics",
    "RepaintBoundary",
    "KeyedSubtree",
    "Builder",
    "PhysicalModel",
    "AnimatedPhysicalModel",
    "Expanded",
    "Flexible",
];

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;
type PendingCalls = Arc<DashMap<u64, oneshot::Sender<Result<Value, AdapterError>>>>;

/// Connection settings for a Dart VM service endpoint.
#[derive(Clone, Debug)]
pub struct FlutterConfig {
    /// VM service WebSocket URI, e.g. `ws://127.0.0.1:50300/abc=/ws`.
    pub vm_service_uri: String,
    /// Pin a specific isolate; by default the first Flutter isolate reported
    /// by `getVM` is used.
    pub isolate_id: Option<String>,
    /// The VM service does not expose screen dimensions; captures report this
    /// configured viewport instead.
    pub viewport: ViewportInfo,
}

impl Default for FlutterConfig {
    fn default() -> Self {
        Self {
            vm_service_uri: "ws://127.0.0.1:50300/ws".to_string(),
            isolate_id: None,
            viewport: ViewportInfo::new(1080, 1920),
        }
    }
}

/// Dart VM service adapter over a persistent WebSocket.
pub struct FlutterDriver {
    sink: Mutex<WsSink>,
    pending: PendingCalls,
    next_id: AtomicU64,
    isolate_id: String,
    config: FlutterConfig,
    reader: JoinHandle<()>,
}

impl FlutterDriver {
    /// Connect to the VM service and resolve the target isolate.
    pub async fn connect(config: FlutterConfig) -> Result<Self, AdapterError> {
        let (socket, _) = connect_async(config.vm_service_uri.as_str())
            .await
            .map_err(|err| {
                AdapterError::new(AdapterErrorKind::Transport)
                    .with_hint(format!("vm service connect failed: {err}"))
            })?;
        let (sink, source) = socket.split();
        let pending: PendingCalls = Arc::new(DashMap::new());
        let reader = tokio::spawn(read_loop(source, Arc::clone(&pending)));

        let mut driver = Self {
            sink: Mutex::new(sink),
            pending,
            next_id: AtomicU64::new(1),
            isolate_id: String::new(),
            config,
            reader,
        };

        driver.isolate_id = match driver.config.isolate_id.clone() {
            Some(id) => id,
            None => driver.resolve_isolate(Duration::from_secs(10)).await?,
        };
        info!(
            target: "app-adapter",
            isolate = %driver.isolate_id,
            "vm service session established"
        );
        Ok(driver)
    }

    /// Issue one JSON-RPC call and wait for its matched response.
    async fn call(
        &self,
        method: &str,
        params: Value,
        deadline: Duration,
    ) -> Result<Value, AdapterError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        let frame = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        {
            let mut sink = self.sink.lock().await;
            if let Err(err) = sink.send(Message::Text(frame.to_string())).await {
                self.pending.remove(&id);
                return Err(AdapterError::new(AdapterErrorKind::Transport)
                    .with_hint(format!("vm service send failed: {err}")));
            }
        }

        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(AdapterError::new(AdapterErrorKind::Transport)
                .with_hint("vm service connection closed while awaiting reply")),
            Err(_) => {
                self.pending.remove(&id);
                Err(AdapterError::new(AdapterErrorKind::Timeout)
                    .with_hint(format!("{method} exceeded {deadline:?}")))
            }
        }
    }

    async fn resolve_isolate(&self, deadline: Duration) -> Result<String, AdapterError> {
        let vm = self.call("getVM", json!({}), deadline).await?;
        vm.pointer("/isolates")
            .and_then(Value::as_array)
            .and_then(|isolates| isolates.first())
            .and_then(|isolate| isolate.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                AdapterError::new(AdapterErrorKind::Protocol)
                    .with_hint("getVM reported no isolates")
            })
    }

    /// Dispatch one `ext.flutter.driver` command addressed by a finder.
    async fn driver_command(
        &self,
        command: &str,
        mut args: Map<String, Value>,
        deadline: Duration,
    ) -> Result<Value, AdapterError> {
        args.insert("command".into(), command.into());
        args.insert("isolateId".into(), self.isolate_id.clone().into());
        let reply = self
            .call("ext.flutter.driver", Value::Object(args), deadline)
            .await?;

        if reply
            .pointer("/isError")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            let message = reply
                .pointer("/response")
                .and_then(Value::as_str)
                .unwrap_or("driver extension reported an error")
                .to_string();
            let kind = if message.contains("Bad state: No element")
                || message.contains("finder")
            {
                AdapterErrorKind::TargetNotFound
            } else if message.to_lowercase().contains("timed out") {
                AdapterErrorKind::Timeout
            } else {
                AdapterErrorKind::Protocol
            };
            return Err(AdapterError::new(kind).with_hint(message));
        }
        Ok(reply)
    }

    fn finder_of<'a>(&self, target: &'a TargetRef) -> Result<&'a FlutterFinder, AdapterError> {
        match target {
            TargetRef::Finder(finder) => Ok(finder),
            other => Err(AdapterError::new(AdapterErrorKind::Protocol).with_hint(format!(
                "flutter backend cannot address target {other:?}"
            ))),
        }
    }
}

impl Drop for FlutterDriver {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl AppDriver for FlutterDriver {
    async fn capture(&self, deadline: Duration) -> Result<RawTree, AdapterError> {
        let reply = self
            .call(
                "ext.flutter.inspector.getRootWidgetSummaryTree",
                json!({
                    "isolateId": self.isolate_id,
                    "objectGroup": "apptap-capture",
                }),
                deadline,
            )
            .await?;
        let tree = match reply.get("result") {
            Some(root) if !root.is_null() => {
                let node = parse_summary_node(root);
                match node {
                    Some(root) => RawTree::new(root, self.config.viewport),
                    None => RawTree::empty(self.config.viewport),
                }
            }
            _ => RawTree::empty(self.config.viewport),
        };
        debug!(
            target: "app-adapter",
            nodes = tree.root.node_count(),
            "captured widget summary tree"
        );
        Ok(tree)
    }

    async fn tap(&self, target: &TargetRef, deadline: Duration) -> Result<(), AdapterError> {
        let finder = self.finder_of(target)?;
        self.driver_command("tap", finder.to_arguments(), deadline)
            .await
            .map(|_| ())
    }

    async fn enter_text(
        &self,
        target: &TargetRef,
        text: &str,
        deadline: Duration,
    ) -> Result<(), AdapterError> {
        // enter_text types into whichever field has focus; tap first to move
        // focus to the target.
        let finder = self.finder_of(target)?;
        self.driver_command("tap", finder.to_arguments(), deadline)
            .await?;
        let mut args = Map::new();
        args.insert("text".into(), text.into());
        self.driver_command("enter_text", args, deadline)
            .await
            .map(|_| ())
    }

    async fn scroll(
        &self,
        direction: ScrollDirection,
        target: Option<&TargetRef>,
        deadline: Duration,
    ) -> Result<(), AdapterError> {
        let finder = match target {
            Some(target) => self.finder_of(target)?.clone(),
            None => FlutterFinder::ByType("Scrollable".to_string()),
        };
        let distance = (self.config.viewport.height as f32 * 0.4).round() as i64;
        // Finger delta is opposite to the direction content should reveal.
        let (dx, dy) = match direction {
            ScrollDirection::Down => (0, -distance),
            ScrollDirection::Up => (0, distance),
            ScrollDirection::Right => (-distance, 0),
            ScrollDirection::Left => (distance, 0),
        };
        let mut args = finder.to_arguments();
        args.insert("dx".into(), dx.into());
        args.insert("dy".into(), dy.into());
        args.insert("duration".into(), 300_000.into());
        args.insert("frequency".into(), 60.into());
        self.driver_command("scroll", args, deadline).await.map(|_| ())
    }

    async fn swipe(
        &self,
        from: (f32, f32),
        to: (f32, f32),
        duration_ms: u64,
        deadline: Duration,
    ) -> Result<(), AdapterError> {
        // The driver extension has no point-based gesture; express the swipe
        // as a scroll delta on the nearest Scrollable.
        let mut args = FlutterFinder::ByType("Scrollable".to_string()).to_arguments();
        args.insert("dx".into(), ((to.0 - from.0).round() as i64).into());
        args.insert("dy".into(), ((to.1 - from.1).round() as i64).into());
        args.insert("duration".into(), (duration_ms * 1000).into());
        args.insert("frequency".into(), 60.into());
        self.driver_command("scroll", args, deadline).await.map(|_| ())
    }

    async fn drag_and_drop(
        &self,
        from: (f32, f32),
        to: (f32, f32),
        duration_ms: u64,
        deadline: Duration,
    ) -> Result<(), AdapterError> {
        // The driver extension's scroll is already a timed pointer drag;
        // stretching it out slowly enough makes the framework treat it as a
        // grab-and-move rather than a fling.
        self.swipe(from, to, duration_ms.max(600), deadline).await
    }

    async fn long_press(
        &self,
        target: &TargetRef,
        hold_ms: u64,
        deadline: Duration,
    ) -> Result<(), AdapterError> {
        // A zero-delta scroll held for the duration is the driver extension's
        // long-press idiom.
        let finder = self.finder_of(target)?;
        let mut args = finder.to_arguments();
        args.insert("dx".into(), 0.into());
        args.insert("dy".into(), 0.into());
        args.insert("duration".into(), (hold_ms * 1000).into());
        args.insert("frequency".into(), 60.into());
        self.driver_command("scroll", args, deadline).await.map(|_| ())
    }

    async fn screenshot(&self, deadline: Duration) -> Result<Vec<u8>, AdapterError> {
        let reply = self.call("_flutter.screenshot", json!({}), deadline).await?;
        let encoded = reply
            .pointer("/screenshot")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AdapterError::new(AdapterErrorKind::Protocol)
                    .with_hint("screenshot response missing image data")
            })?;
        BASE64.decode(encoded.trim()).map_err(|err| {
            AdapterError::new(AdapterErrorKind::Protocol)
                .with_hint(format!("screenshot not valid base64: {err}"))
        })
    }

    fn metadata(&self) -> AppMetadata {
        AppMetadata {
            platform: Platform::Flutter,
            app_identifier: self.config.vm_service_uri.clone(),
            device_name: None,
            automation_name: "DartVM".to_string(),
        }
    }
}

/// Pump the socket, routing responses by id to their waiting callers. On
/// stream end every pending call fails with a transport error.
async fn read_loop(mut source: WsSource, pending: PendingCalls) {
    while let Some(message) = source.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(err) => {
                warn!(target: "app-adapter", error = %err, "vm service read failed");
                break;
            }
        };
        let frame: Value = match serde_json::from_str(&text) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(target: "app-adapter", error = %err, "undecodable vm service frame");
                continue;
            }
        };
        let Some(id) = frame.get("id").and_then(Value::as_u64) else {
            // Notifications (stream events) are not subscribed to.
            continue;
        };
        let Some((_, tx)) = pending.remove(&id) else {
            continue;
        };
        let result = if let Some(error) = frame.get("error") {
            let message = error
                .pointer("/message")
                .and_then(Value::as_str)
                .unwrap_or("vm service error")
                .to_string();
            Err(AdapterError::new(AdapterErrorKind::Protocol).with_hint(message))
        } else {
            Ok(frame.get("result").cloned().unwrap_or(Value::Null))
        };
        let _ = tx.send(result);
    }
    // Dropping the senders wakes every waiter with a transport error.
    pending.retain(|_, _| false);
}

/// Convert one inspector summary node, hoisting children of plumbing widgets
/// into their parent. Returns `None` for nodes with nothing to show.
fn parse_summary_node(value: &Value) -> Option<RawNode> {
    let description = value.get("description").and_then(Value::as_str)?;
    let (kind, key) = split_description(description);

    let mut children = Vec::new();
    collect_children(value, &mut children);

    if FLUTTER_PLUMBING_TYPES.contains(&kind.as_str()) {
        // Collapse: a plumbing widget with one child is replaced by it; with
        // several, keep a thin container node.
        if children.len() == 1 {
            return children.into_iter().next();
        }
        if children.is_empty() {
            return None;
        }
    }

    let text = value
        .get("textPreview")
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|t| !t.is_empty());
    let interactive = FLUTTER_INTERACTIVE_TYPES.contains(&kind.as_str());

    let target = if let Some(key) = &key {
        Some(TargetRef::Finder(FlutterFinder::ByValueKey(key.clone())))
    } else if let Some(text) = &text {
        Some(TargetRef::Finder(FlutterFinder::ByText(text.clone())))
    } else if interactive {
        Some(TargetRef::Finder(FlutterFinder::ByType(kind.clone())))
    } else {
        None
    };

    let mut node = RawNode::new(kind);
    node.text = text;
    node.key = key;
    node.target = target;
    node.interactive = interactive;
    node.children = children;
    Some(node)
}

fn collect_children(value: &Value, out: &mut Vec<RawNode>) {
    if let Some(children) = value.get("children").and_then(Value::as_array) {
        out.extend(children.iter().filter_map(parse_summary_node));
    }
}

/// Split `TextField-[<'email'>]` into kind `TextField` and key `email`.
fn split_description(description: &str) -> (String, Option<String>) {
    if let Some(start) = description.find("-[<") {
        let kind = description[..start].to_string();
        let key = description[start + 3..]
            .trim_end_matches(">]")
            .trim_matches('\'')
            .to_string();
        let key = (!key.is_empty()).then_some(key);
        return (kind, key);
    }
    (description.to_string(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_split_extracts_value_keys() {
        assert_eq!(
            split_description("TextField-[<'email'>]"),
            ("TextField".to_string(), Some("email".to_string()))
        );
        assert_eq!(split_description("Scaffold"), ("Scaffold".to_string(), None));
    }

    #[test]
    fn summary_tree_collapses_plumbing() {
        let raw = json!({
            "description": "Scaffold",
            "children": [{
                "description": "Padding",
                "children": [{
                    "description": "ElevatedButton-[<'submit'>]",
                    "children": []
                }]
            }]
        });
        let node = parse_summary_node(&raw).unwrap();
        assert_eq!(node.kind, "Scaffold");
        assert_eq!(node.children.len(), 1);
        let button = &node.children[0];
        assert_eq!(button.kind, "ElevatedButton");
        assert_eq!(button.key.as_deref(), Some("submit"));
        assert!(button.interactive);
        assert_eq!(
            button.target,
            Some(TargetRef::Finder(FlutterFinder::ByValueKey(
                "submit".to_string()
            )))
        );
    }

    #[test]
    fn text_widgets_carry_preview_and_text_finder() {
        let raw = json!({
            "description": "Text",
            "textPreview": "Welcome back",
            "children": []
        });
        let node = parse_summary_node(&raw).unwrap();
        assert_eq!(node.text.as_deref(), Some("Welcome back"));
        assert_eq!(
            node.target,
            Some(TargetRef::Finder(FlutterFinder::ByText(
                "Welcome back".to_string()
            )))
        );
        assert!(!node.interactive);
    }

    #[test]
    fn empty_plumbing_nodes_vanish() {
        let raw = json!({ "description": "SizedBox", "children": [] });
        assert!(parse_summary_node(&raw).is_none());
    }
}
