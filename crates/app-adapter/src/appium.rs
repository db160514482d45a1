//! WebDriver-protocol adapter for native Android and iOS apps.
//!
//! Talks to a remote automation endpoint (Appium) over HTTP. The UI tree is
//! polled synchronously as XML page source and parsed into [`RawTree`];
//! element references are [`LocatorSpec`] descriptors resolved to live
//! WebDriver element ids at dispatch time with a key -> text -> class
//! fallback chain. Gestures go through W3C pointer action sequences.

use std::time::Duration;

use apptap_core_types::{AppMetadata, ElementBounds, Platform, ViewportInfo};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use url::Url;

use crate::driver::{AppDriver, ScrollDirection};
use crate::error::{AdapterError, AdapterErrorKind};
use crate::raw::{LocatorSpec, RawNode, RawTree, TargetRef};

/// Android widget classes treated as interactive regardless of attributes.
const ANDROID_INTERACTIVE_TYPES: &[&str] = &[
    "android.widget.Button",
    "android.widget.ImageButton",
    "android.widget.EditText",
    "android.widget.CheckBox",
    "android.widget.RadioButton",
    "android.widget.Switch",
    "android.widget.Spinner",
    "android.widget.SeekBar",
];

/// XCUI element types treated as interactive when enabled.
const IOS_INTERACTIVE_TYPES: &[&str] = &[
    "XCUIElementTypeButton",
    "XCUIElementTypeTextField",
    "XCUIElementTypeSecureTextField",
    "XCUIElementTypeSwitch",
    "XCUIElementTypeSlider",
    "XCUIElementTypeCell",
    "XCUIElementTypeLink",
    "XCUIElementTypeSearchField",
    "XCUIElementTypeKey",
];

/// Connection settings for a WebDriver automation endpoint.
#[derive(Clone, Debug)]
pub struct AppiumConfig {
    /// Endpoint base, e.g. `http://localhost:4723`.
    pub server_url: String,
    pub platform: Platform,
    pub device_name: Option<String>,
    /// Android: package + activity.
    pub app_package: Option<String>,
    pub app_activity: Option<String>,
    /// iOS: bundle id.
    pub bundle_id: Option<String>,
    /// Extra raw capabilities merged into `alwaysMatch`.
    pub extra_capabilities: Map<String, Value>,
    /// Pixels beyond the screen edge still considered "in viewport" when the
    /// tree is parsed.
    pub viewport_expansion: f32,
}

impl Default for AppiumConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:4723".to_string(),
            platform: Platform::Android,
            device_name: None,
            app_package: None,
            app_activity: None,
            bundle_id: None,
            extra_capabilities: Map::new(),
            viewport_expansion: 0.0,
        }
    }
}

impl AppiumConfig {
    /// W3C `capabilities` payload for session bootstrap.
    fn capabilities(&self) -> Value {
        let mut always = Map::new();
        always.insert(
            "platformName".into(),
            match self.platform {
                Platform::Ios => "iOS".into(),
                _ => "Android".into(),
            },
        );
        if let Some(device) = &self.device_name {
            always.insert("appium:deviceName".into(), device.clone().into());
        }
        match self.platform {
            Platform::Ios => {
                always.insert("appium:automationName".into(), "XCUITest".into());
                always.insert("appium:autoAcceptAlerts".into(), true.into());
                if let Some(bundle) = &self.bundle_id {
                    always.insert("appium:bundleId".into(), bundle.clone().into());
                }
            }
            _ => {
                always.insert("appium:automationName".into(), "UiAutomator2".into());
                always.insert("appium:autoGrantPermissions".into(), true.into());
                if let Some(package) = &self.app_package {
                    always.insert("appium:appPackage".into(), package.clone().into());
                }
                if let Some(activity) = &self.app_activity {
                    always.insert("appium:appActivity".into(), activity.clone().into());
                }
            }
        }
        for (key, value) in &self.extra_capabilities {
            always.insert(key.clone(), value.clone());
        }
        json!({ "capabilities": { "alwaysMatch": always, "firstMatch": [{}] } })
    }
}

/// WebDriver adapter over HTTP.
pub struct AppiumDriver {
    http: reqwest::Client,
    base: Url,
    session_id: String,
    config: AppiumConfig,
}

impl AppiumDriver {
    /// Open a WebDriver session against the configured endpoint.
    pub async fn connect(config: AppiumConfig) -> Result<Self, AdapterError> {
        let base = Url::parse(config.server_url.trim_end_matches('/'))
            .map_err(|err| AdapterError::new(AdapterErrorKind::Protocol).with_hint(err.to_string()))?;
        let http = reqwest::Client::new();

        let body = config.capabilities();
        let response = http
            .post(endpoint(&base, "session"))
            .json(&body)
            .timeout(Duration::from_secs(120))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let payload: Value = response.json().await.map_err(map_reqwest_error)?;

        let session_id = payload
            .pointer("/value/sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AdapterError::new(AdapterErrorKind::Protocol)
                    .with_hint("session response missing value.sessionId")
            })?
            .to_string();

        info!(
            target: "app-adapter",
            platform = %config.platform,
            session = %session_id,
            "webdriver session established"
        );

        Ok(Self {
            http,
            base,
            session_id,
            config,
        })
    }

    async fn execute(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
        deadline: Duration,
    ) -> Result<Value, AdapterError> {
        let url = endpoint(&self.base, &format!("session/{}/{}", self.session_id, path));
        let mut request = self.http.request(method, url).timeout(deadline);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let payload: Value = response.json().await.map_err(map_reqwest_error)?;

        if let Some(error) = payload.pointer("/value/error").and_then(Value::as_str) {
            let message = payload
                .pointer("/value/message")
                .and_then(Value::as_str)
                .unwrap_or(error)
                .to_string();
            return Err(map_webdriver_error(error).with_hint(message));
        }
        if !status.is_success() {
            return Err(AdapterError::new(AdapterErrorKind::Protocol)
                .with_hint(format!("unexpected http status {status}")));
        }
        Ok(payload)
    }

    /// Resolve a locator descriptor to a live element id, strongest locator
    /// first: developer key, then visible text, then widget class.
    async fn resolve_locator(
        &self,
        spec: &LocatorSpec,
        deadline: Duration,
    ) -> Result<String, AdapterError> {
        let mut candidates: Vec<(&str, String)> = Vec::new();
        if let Some(key) = spec.key.as_deref().filter(|k| !k.is_empty()) {
            match self.config.platform {
                Platform::Ios => candidates.push(("accessibility id", key.to_string())),
                _ => candidates.push(("id", key.to_string())),
            }
        }
        if let Some(text) = spec.text.as_deref().filter(|t| !t.is_empty()) {
            match self.config.platform {
                Platform::Ios => candidates.push((
                    "-ios predicate string",
                    format!("label == '{text}' OR name == '{text}' OR value == '{text}'"),
                )),
                _ => candidates.push((
                    "-android uiautomator",
                    format!("new UiSelector().text(\"{text}\")"),
                )),
            }
        }
        if !spec.class_name.is_empty() {
            candidates.push(("class name", spec.class_name.clone()));
        }

        let mut last_err =
            AdapterError::new(AdapterErrorKind::TargetNotFound).with_hint("no usable locator");
        for (using, value) in candidates {
            match self.find_element(using, &value, deadline).await {
                Ok(id) => return Ok(id),
                Err(err) if err.kind == AdapterErrorKind::TargetNotFound => {
                    debug!(target: "app-adapter", using, value, "locator missed");
                    last_err = err;
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err)
    }

    async fn find_element(
        &self,
        using: &str,
        value: &str,
        deadline: Duration,
    ) -> Result<String, AdapterError> {
        let payload = self
            .execute(
                reqwest::Method::POST,
                "element",
                Some(json!({ "using": using, "value": value })),
                deadline,
            )
            .await?;
        payload
            .pointer("/value")
            .and_then(Value::as_object)
            .and_then(|obj| obj.values().next())
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                AdapterError::new(AdapterErrorKind::Protocol)
                    .with_hint("find element response missing element id")
            })
    }

    /// Coordinate tap through a W3C pointer sequence.
    async fn tap_point(&self, x: f32, y: f32, deadline: Duration) -> Result<(), AdapterError> {
        let actions = pointer_sequence(vec![
            pointer_move(0, x, y),
            json!({ "type": "pointerDown", "button": 0 }),
            json!({ "type": "pause", "duration": 80 }),
            json!({ "type": "pointerUp", "button": 0 }),
        ]);
        self.execute(reqwest::Method::POST, "actions", Some(actions), deadline)
            .await
            .map(|_| ())
    }

    async fn window_size(&self, deadline: Duration) -> Result<ViewportInfo, AdapterError> {
        let payload = self
            .execute(reqwest::Method::GET, "window/rect", None, deadline)
            .await?;
        let width = payload
            .pointer("/value/width")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32;
        let height = payload
            .pointer("/value/height")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32;
        Ok(ViewportInfo::new(width, height))
    }

    fn locator_of<'a>(&self, target: &'a TargetRef) -> Result<&'a LocatorSpec, AdapterError> {
        match target {
            TargetRef::Locator(spec) => Ok(spec),
            other => Err(AdapterError::new(AdapterErrorKind::Protocol).with_hint(format!(
                "webdriver backend cannot address target {other:?}"
            ))),
        }
    }
}

#[async_trait]
impl AppDriver for AppiumDriver {
    async fn capture(&self, deadline: Duration) -> Result<RawTree, AdapterError> {
        let viewport = self.window_size(deadline).await.unwrap_or_default();
        let payload = self
            .execute(reqwest::Method::GET, "source", None, deadline)
            .await?;
        let xml = payload
            .pointer("/value")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AdapterError::new(AdapterErrorKind::Protocol).with_hint("source response not a string")
            })?;
        let tree = parse_page_source(
            xml,
            self.config.platform,
            viewport,
            self.config.viewport_expansion,
        )?;
        debug!(
            target: "app-adapter",
            nodes = tree.root.node_count(),
            "captured page source"
        );
        Ok(tree)
    }

    async fn tap(&self, target: &TargetRef, deadline: Duration) -> Result<(), AdapterError> {
        if let TargetRef::Point { x, y } = target {
            return self.tap_point(*x, *y, deadline).await;
        }
        let spec = self.locator_of(target)?;
        match self.resolve_locator(spec, deadline).await {
            Ok(id) => self
                .execute(
                    reqwest::Method::POST,
                    &format!("element/{id}/click"),
                    Some(json!({})),
                    deadline,
                )
                .await
                .map(|_| ()),
            // Element vanished between capture and dispatch; fall back to its
            // last known center before giving up.
            Err(err) if err.kind == AdapterErrorKind::TargetNotFound => {
                if let Some((x, y)) = spec.bounds.map(|b| b.center()) {
                    warn!(target: "app-adapter", "locator miss, tapping last known center");
                    self.tap_point(x, y, deadline).await
                } else {
                    Err(err)
                }
            }
            Err(err) => Err(err),
        }
    }

    async fn enter_text(
        &self,
        target: &TargetRef,
        text: &str,
        deadline: Duration,
    ) -> Result<(), AdapterError> {
        let spec = self.locator_of(target)?;
        let id = self.resolve_locator(spec, deadline).await?;
        self.execute(
            reqwest::Method::POST,
            &format!("element/{id}/clear"),
            Some(json!({})),
            deadline,
        )
        .await?;
        self.execute(
            reqwest::Method::POST,
            &format!("element/{id}/value"),
            Some(json!({ "text": text })),
            deadline,
        )
        .await
        .map(|_| ())
    }

    async fn scroll(
        &self,
        direction: ScrollDirection,
        target: Option<&TargetRef>,
        deadline: Duration,
    ) -> Result<(), AdapterError> {
        let viewport = self.window_size(deadline).await?;
        let (width, height) = (viewport.width as f32, viewport.height as f32);
        // Swipe across the middle 50% of the target bounds or the screen;
        // finger moves opposite to the direction content should reveal.
        let (cx, cy, span_x, span_y) = match target {
            Some(TargetRef::Locator(LocatorSpec {
                bounds: Some(bounds),
                ..
            })) => {
                let (cx, cy) = bounds.center();
                (cx, cy, bounds.width * 0.5, bounds.height * 0.5)
            }
            _ => (width / 2.0, height / 2.0, width * 0.5, height * 0.5),
        };
        let (from, to) = match direction {
            ScrollDirection::Down => ((cx, cy + span_y / 2.0), (cx, cy - span_y / 2.0)),
            ScrollDirection::Up => ((cx, cy - span_y / 2.0), (cx, cy + span_y / 2.0)),
            ScrollDirection::Right => ((cx + span_x / 2.0, cy), (cx - span_x / 2.0, cy)),
            ScrollDirection::Left => ((cx - span_x / 2.0, cy), (cx + span_x / 2.0, cy)),
        };
        self.swipe(from, to, 300, deadline).await
    }

    async fn swipe(
        &self,
        from: (f32, f32),
        to: (f32, f32),
        duration_ms: u64,
        deadline: Duration,
    ) -> Result<(), AdapterError> {
        let actions = pointer_sequence(vec![
            pointer_move(0, from.0, from.1),
            json!({ "type": "pointerDown", "button": 0 }),
            pointer_move(duration_ms, to.0, to.1),
            json!({ "type": "pointerUp", "button": 0 }),
        ]);
        self.execute(reqwest::Method::POST, "actions", Some(actions), deadline)
            .await
            .map(|_| ())
    }

    async fn drag_and_drop(
        &self,
        from: (f32, f32),
        to: (f32, f32),
        duration_ms: u64,
        deadline: Duration,
    ) -> Result<(), AdapterError> {
        // The pause after pointer-down lets the platform recognize the
        // gesture as a grab rather than a fling.
        let actions = pointer_sequence(vec![
            pointer_move(0, from.0, from.1),
            json!({ "type": "pointerDown", "button": 0 }),
            json!({ "type": "pause", "duration": 600 }),
            pointer_move(duration_ms, to.0, to.1),
            json!({ "type": "pointerUp", "button": 0 }),
        ]);
        self.execute(reqwest::Method::POST, "actions", Some(actions), deadline)
            .await
            .map(|_| ())
    }

    async fn long_press(
        &self,
        target: &TargetRef,
        hold_ms: u64,
        deadline: Duration,
    ) -> Result<(), AdapterError> {
        let (x, y) = target.point().ok_or_else(|| {
            AdapterError::new(AdapterErrorKind::TargetNotFound)
                .with_hint("long press target has no known coordinates")
        })?;
        let actions = pointer_sequence(vec![
            pointer_move(0, x, y),
            json!({ "type": "pointerDown", "button": 0 }),
            json!({ "type": "pause", "duration": hold_ms }),
            json!({ "type": "pointerUp", "button": 0 }),
        ]);
        self.execute(reqwest::Method::POST, "actions", Some(actions), deadline)
            .await
            .map(|_| ())
    }

    async fn screenshot(&self, deadline: Duration) -> Result<Vec<u8>, AdapterError> {
        let payload = self
            .execute(reqwest::Method::GET, "screenshot", None, deadline)
            .await?;
        let encoded = payload
            .pointer("/value")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AdapterError::new(AdapterErrorKind::Protocol)
                    .with_hint("screenshot response not a string")
            })?;
        BASE64.decode(encoded.trim()).map_err(|err| {
            AdapterError::new(AdapterErrorKind::Protocol)
                .with_hint(format!("screenshot not valid base64: {err}"))
        })
    }

    fn metadata(&self) -> AppMetadata {
        AppMetadata {
            platform: self.config.platform,
            app_identifier: self
                .config
                .app_package
                .clone()
                .or_else(|| self.config.bundle_id.clone())
                .unwrap_or_default(),
            device_name: self.config.device_name.clone(),
            automation_name: match self.config.platform {
                Platform::Ios => "XCUITest".to_string(),
                _ => "UiAutomator2".to_string(),
            },
        }
    }
}

fn endpoint(base: &Url, path: &str) -> String {
    format!("{}/{}", base.as_str().trim_end_matches('/'), path)
}

fn map_reqwest_error(err: reqwest::Error) -> AdapterError {
    let kind = if err.is_timeout() {
        AdapterErrorKind::Timeout
    } else if err.is_connect() || err.is_request() {
        AdapterErrorKind::Transport
    } else if err.is_decode() {
        AdapterErrorKind::Protocol
    } else {
        AdapterErrorKind::Internal
    };
    AdapterError::new(kind).with_hint(err.to_string())
}

/// Map W3C WebDriver error codes onto adapter error kinds.
fn map_webdriver_error(code: &str) -> AdapterError {
    let kind = match code {
        "no such element" | "stale element reference" | "no such window" => {
            AdapterErrorKind::TargetNotFound
        }
        "element not interactable" | "invalid element state" | "element click intercepted" => {
            AdapterErrorKind::NotInteractable
        }
        "timeout" | "script timeout" => AdapterErrorKind::Timeout,
        "invalid session id" | "session not created" => AdapterErrorKind::Transport,
        _ => AdapterErrorKind::Protocol,
    };
    AdapterError::new(kind)
}

fn pointer_move(duration_ms: u64, x: f32, y: f32) -> Value {
    json!({
        "type": "pointerMove",
        "duration": duration_ms,
        "x": x.round() as i64,
        "y": y.round() as i64,
    })
}

/// Wrap pointer actions into the W3C `/actions` payload for one touch input.
fn pointer_sequence(actions: Vec<Value>) -> Value {
    json!({
        "actions": [{
            "type": "pointer",
            "id": "finger1",
            "parameters": { "pointerType": "touch" },
            "actions": actions,
        }]
    })
}

/// Parse Appium XML page source into a raw tree.
pub fn parse_page_source(
    xml: &str,
    platform: Platform,
    viewport: ViewportInfo,
    viewport_expansion: f32,
) -> Result<RawTree, AdapterError> {
    let doc = roxmltree::Document::parse(xml).map_err(|err| {
        AdapterError::new(AdapterErrorKind::Protocol)
            .with_hint(format!("page source not valid xml: {err}"))
    })?;
    let root = doc.root_element();
    // The outer <hierarchy>/<AppiumAUT> wrapper carries no element data; use
    // its first element child when present.
    let start = root
        .children()
        .find(|n| n.is_element())
        .filter(|_| matches!(root.tag_name().name(), "hierarchy" | "AppiumAUT"))
        .unwrap_or(root);
    let node = parse_element(start, platform, &viewport, viewport_expansion);
    Ok(RawTree::new(node, viewport))
}

fn parse_element(
    element: roxmltree::Node<'_, '_>,
    platform: Platform,
    viewport: &ViewportInfo,
    expansion: f32,
) -> RawNode {
    let attr = |name: &str| element.attribute(name).map(str::to_string);

    let kind = match platform {
        Platform::Ios => attr("type"),
        _ => attr("class"),
    }
    .unwrap_or_else(|| element.tag_name().name().to_string());

    let text = attr("text")
        .or_else(|| attr("content-desc"))
        .or_else(|| attr("name"))
        .or_else(|| attr("value"))
        .filter(|t| !t.is_empty());

    let key = match platform {
        Platform::Ios => attr("name"),
        _ => attr("resource-id"),
    }
    .filter(|k| !k.is_empty());

    let bounds = attr("bounds").as_deref().and_then(parse_bounds);
    let enabled = attr("enabled").map(|v| v != "false").unwrap_or(true);
    let displayed = attr("displayed").map(|v| v != "false").unwrap_or(true);
    let visible = displayed && bounds.map(|b| b.is_visible()).unwrap_or(true);
    let in_viewport = bounds
        .map(|b| b.in_viewport(viewport, expansion))
        .unwrap_or(true);

    let interactive = is_interactive(&element, &kind, platform) && visible && in_viewport;

    let mut node = RawNode::new(kind.clone());
    node.text = text.clone();
    node.key = key.clone();
    node.bounds = bounds;
    node.enabled = enabled;
    node.visible = visible && in_viewport;
    node.interactive = interactive;
    node.target = Some(TargetRef::Locator(LocatorSpec {
        key,
        text,
        class_name: kind,
        bounds,
    }));
    for attribute in element.attributes() {
        node.attributes
            .insert(attribute.name().to_string(), attribute.value().to_string());
    }
    node.children = element
        .children()
        .filter(|c| c.is_element())
        .map(|c| parse_element(c, platform, viewport, expansion))
        .collect();
    node
}

/// Per-platform interactivity judgement, mirroring the automation backends'
/// own notion of what accepts input.
fn is_interactive(element: &roxmltree::Node<'_, '_>, kind: &str, platform: Platform) -> bool {
    let attr_true = |name: &str| {
        element
            .attribute(name)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    };
    match platform {
        Platform::Ios => {
            if attr_true("enabled") && IOS_INTERACTIVE_TYPES.contains(&kind) {
                return true;
            }
            kind.contains("XCUIElementTypeControl")
        }
        _ => {
            if attr_true("clickable") || attr_true("has-click-listener") {
                return true;
            }
            ANDROID_INTERACTIVE_TYPES.iter().any(|t| kind.contains(t))
        }
    }
}

/// Parse Android-style bounds: `[x1,y1][x2,y2]`.
fn parse_bounds(raw: &str) -> Option<ElementBounds> {
    let mut coords = raw
        .split(['[', ']', ','])
        .filter(|part| !part.is_empty())
        .map(|part| part.trim().parse::<f32>());
    let x1 = coords.next()?.ok()?;
    let y1 = coords.next()?.ok()?;
    let x2 = coords.next()?.ok()?;
    let y2 = coords.next()?.ok()?;
    Some(ElementBounds::new(x1, y1, x2 - x1, y2 - y1))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANDROID_SOURCE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<hierarchy rotation="0">
  <android.widget.FrameLayout bounds="[0,0][1080,1920]" enabled="true">
    <android.widget.EditText resource-id="com.demo:id/email" text="" bounds="[40,300][1040,420]" enabled="true" clickable="true"/>
    <android.widget.Button resource-id="com.demo:id/login" text="Log in" bounds="[40,500][1040,620]" enabled="false" clickable="true"/>
    <android.widget.TextView text="Welcome" bounds="[40,100][1040,180]" enabled="true" clickable="false"/>
  </android.widget.FrameLayout>
</hierarchy>"#;

    #[test]
    fn parses_android_page_source() {
        let tree = parse_page_source(
            ANDROID_SOURCE,
            Platform::Android,
            ViewportInfo::new(1080, 1920),
            0.0,
        )
        .unwrap();
        assert_eq!(tree.root.kind, "android.widget.FrameLayout");
        assert_eq!(tree.root.children.len(), 3);

        let email = &tree.root.children[0];
        assert_eq!(email.key.as_deref(), Some("com.demo:id/email"));
        assert!(email.interactive);
        assert!(email.enabled);

        let login = &tree.root.children[1];
        assert_eq!(login.text.as_deref(), Some("Log in"));
        assert!(login.interactive);
        assert!(!login.enabled);

        let label = &tree.root.children[2];
        assert!(!label.interactive);
        assert_eq!(label.text.as_deref(), Some("Welcome"));
    }

    #[test]
    fn offscreen_elements_are_not_interactive() {
        let xml = r#"<hierarchy>
  <android.widget.Button text="Hidden" bounds="[0,2500][200,2600]" clickable="true"/>
</hierarchy>"#;
        let tree =
            parse_page_source(xml, Platform::Android, ViewportInfo::new(1080, 1920), 0.0).unwrap();
        assert!(!tree.root.interactive);
        assert!(!tree.root.visible);
    }

    #[test]
    fn parses_bounds_string() {
        let bounds = parse_bounds("[10,20][110,70]").unwrap();
        assert_eq!(bounds.x, 10.0);
        assert_eq!(bounds.y, 20.0);
        assert_eq!(bounds.width, 100.0);
        assert_eq!(bounds.height, 50.0);
        assert!(parse_bounds("garbage").is_none());
    }

    #[test]
    fn ios_interactivity_uses_type_table() {
        let xml = r#"<AppiumAUT>
  <XCUIElementTypeButton type="XCUIElementTypeButton" name="Submit" enabled="true"/>
</AppiumAUT>"#;
        let tree = parse_page_source(xml, Platform::Ios, ViewportInfo::new(390, 844), 0.0).unwrap();
        assert!(tree.root.interactive);
        assert_eq!(tree.root.key.as_deref(), Some("Submit"));
    }

    #[test]
    fn webdriver_error_codes_map_to_kinds() {
        assert_eq!(
            map_webdriver_error("no such element").kind,
            AdapterErrorKind::TargetNotFound
        );
        assert_eq!(
            map_webdriver_error("element not interactable").kind,
            AdapterErrorKind::NotInteractable
        );
        assert_eq!(
            map_webdriver_error("invalid session id").kind,
            AdapterErrorKind::Transport
        );
        assert_eq!(
            map_webdriver_error("unknown error").kind,
            AdapterErrorKind::Protocol
        );
    }

    #[test]
    fn capability_payload_per_platform() {
        let android = AppiumConfig {
            app_package: Some("com.demo".into()),
            app_activity: Some(".Main".into()),
            ..Default::default()
        };
        let caps = android.capabilities();
        assert_eq!(
            caps.pointer("/capabilities/alwaysMatch/appium:automationName"),
            Some(&json!("UiAutomator2"))
        );

        let ios = AppiumConfig {
            platform: Platform::Ios,
            bundle_id: Some("com.demo.app".into()),
            ..Default::default()
        };
        let caps = ios.capabilities();
        assert_eq!(
            caps.pointer("/capabilities/alwaysMatch/appium:bundleId"),
            Some(&json!("com.demo.app"))
        );
    }
}
