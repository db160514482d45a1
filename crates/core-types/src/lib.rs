//! Shared primitives for the apptap automation stack.
//!
//! Everything in here is plain data passed by value between the adapter and
//! agent layers. No component-specific logic belongs in this crate.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one agent session (one `run()` invocation).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for the task a session is working on.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonically increasing counter identifying the snapshot an element
/// reference was minted from. A reference is only valid while its epoch
/// matches the session's current snapshot; everything else is stale.
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
pub struct SnapshotEpoch(pub u64);

impl SnapshotEpoch {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SnapshotEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epoch:{}", self.0)
    }
}

/// Target platform of the app under automation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
    Flutter,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
            Platform::Flutter => "flutter",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Screen-space rectangle of an element, in device pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementBounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ElementBounds {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Center point, the default tap target.
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Zero-area bounds report as invisible.
    pub fn is_visible(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Whether the rectangle intersects a viewport expanded by `expansion`
    /// pixels on every side.
    pub fn in_viewport(&self, viewport: &ViewportInfo, expansion: f32) -> bool {
        let right = self.x + self.width;
        let bottom = self.y + self.height;
        right > -expansion
            && self.x < viewport.width as f32 + expansion
            && bottom > -expansion
            && self.y < viewport.height as f32 + expansion
    }
}

/// Device screen dimensions, in device pixels.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ViewportInfo {
    pub width: u32,
    pub height: u32,
}

impl ViewportInfo {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Static description of the app and device behind a driver connection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppMetadata {
    pub platform: Platform,
    /// Package name (Android), bundle id (iOS) or VM service URI (Flutter).
    pub app_identifier: String,
    pub device_name: Option<String>,
    /// Backend automation engine, e.g. "UiAutomator2", "XCUITest", "DartVM".
    pub automation_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_ordering_is_monotonic() {
        let first = SnapshotEpoch::default();
        let second = first.next();
        assert!(second > first);
        assert_eq!(second.next().0, 2);
    }

    #[test]
    fn bounds_center_and_visibility() {
        let bounds = ElementBounds::new(10.0, 20.0, 100.0, 40.0);
        assert_eq!(bounds.center(), (60.0, 40.0));
        assert!(bounds.is_visible());
        assert!(!ElementBounds::new(0.0, 0.0, 0.0, 10.0).is_visible());
    }

    #[test]
    fn bounds_viewport_intersection() {
        let viewport = ViewportInfo::new(1080, 1920);
        let on_screen = ElementBounds::new(0.0, 100.0, 200.0, 50.0);
        let below_screen = ElementBounds::new(0.0, 2500.0, 200.0, 50.0);
        assert!(on_screen.in_viewport(&viewport, 0.0));
        assert!(!below_screen.in_viewport(&viewport, 0.0));
        // Expansion pulls nearby off-screen elements in.
        assert!(below_screen.in_viewport(&viewport, 700.0));
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
        assert_ne!(TaskId::new(), TaskId::new());
    }
}
