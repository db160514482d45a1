//! Backend-native UI tree and element reference types.
//!
//! `RawTree` is what [`crate::AppDriver::capture`] returns: the element
//! hierarchy exactly as the backend reported it, before the agent layer
//! canonicalizes and indexes it. It is always a tree, never a graph.

use std::collections::BTreeMap;

use apptap_core_types::{ElementBounds, ViewportInfo};
use serde::{Deserialize, Serialize};

/// One node of the backend-native element hierarchy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawNode {
    /// Widget class (Android), XCUI element type (iOS) or widget runtime type
    /// (Flutter).
    pub kind: String,
    /// Visible text, accessibility label or text preview.
    pub text: Option<String>,
    /// Stable developer-assigned identity: resource-id, accessibility name or
    /// Flutter value key.
    pub key: Option<String>,
    /// How the backend can be addressed to act on this node, when known.
    pub target: Option<TargetRef>,
    pub bounds: Option<ElementBounds>,
    pub enabled: bool,
    pub visible: bool,
    /// Backend-specific judgement of whether this node accepts input.
    pub interactive: bool,
    /// Raw attributes kept for debugging and planner context.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RawNode>,
}

impl RawNode {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            text: None,
            key: None,
            target: None,
            bounds: None,
            enabled: true,
            visible: true,
            interactive: false,
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Total node count including `self`.
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(RawNode::node_count)
            .sum::<usize>()
    }
}

/// A full capture: element hierarchy plus the viewport it was taken in.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawTree {
    pub root: RawNode,
    pub viewport: ViewportInfo,
}

impl RawTree {
    pub fn new(root: RawNode, viewport: ViewportInfo) -> Self {
        Self { root, viewport }
    }

    /// An empty capture, used when the backend reports nothing (splash
    /// screens, transitions). The agent still receives a well-formed tree.
    pub fn empty(viewport: ViewportInfo) -> Self {
        Self {
            root: RawNode::new("Empty"),
            viewport,
        }
    }
}

/// Backend-addressable reference to one element.
///
/// References never survive a capture: the agent layer stamps them with a
/// snapshot epoch and rejects out-of-epoch use before they reach a driver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetRef {
    /// Locator descriptor for WebDriver endpoints, resolved to a live element
    /// id at dispatch time via a key -> text -> class fallback chain.
    Locator(LocatorSpec),
    /// Widget finder for Flutter driver extension commands.
    Finder(FlutterFinder),
    /// Bare screen point, the last-resort target.
    Point { x: f32, y: f32 },
}

impl TargetRef {
    /// The screen point an action would land on, when one is derivable.
    pub fn point(&self) -> Option<(f32, f32)> {
        match self {
            TargetRef::Locator(spec) => spec.bounds.map(|b| b.center()),
            TargetRef::Finder(_) => None,
            TargetRef::Point { x, y } => Some((*x, *y)),
        }
    }
}

/// WebDriver locator candidates for one element, strongest first.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LocatorSpec {
    /// resource-id (Android) or accessibility id (iOS).
    pub key: Option<String>,
    /// Visible text or label.
    pub text: Option<String>,
    /// Widget class / element type, the weakest locator.
    pub class_name: String,
    pub bounds: Option<ElementBounds>,
}

/// Finder used by the `ext.flutter.driver` extension.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlutterFinder {
    ByValueKey(String),
    ByText(String),
    ByType(String),
}

impl FlutterFinder {
    /// Serialize into the argument map the driver extension expects.
    pub fn to_arguments(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut args = serde_json::Map::new();
        match self {
            FlutterFinder::ByValueKey(key) => {
                args.insert("finderType".into(), "ByValueKey".into());
                args.insert("keyValueString".into(), key.clone().into());
                args.insert("keyValueType".into(), "String".into());
            }
            FlutterFinder::ByText(text) => {
                args.insert("finderType".into(), "ByText".into());
                args.insert("text".into(), text.clone().into());
            }
            FlutterFinder::ByType(ty) => {
                args.insert("finderType".into(), "ByType".into());
                args.insert("type".into(), ty.clone().into());
            }
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_count_walks_children() {
        let mut root = RawNode::new("FrameLayout");
        let mut child = RawNode::new("LinearLayout");
        child.children.push(RawNode::new("Button"));
        root.children.push(child);
        root.children.push(RawNode::new("TextView"));
        assert_eq!(root.node_count(), 4);
    }

    #[test]
    fn target_point_prefers_bounds_center() {
        let spec = LocatorSpec {
            bounds: Some(ElementBounds::new(0.0, 0.0, 100.0, 50.0)),
            class_name: "android.widget.Button".into(),
            ..Default::default()
        };
        assert_eq!(TargetRef::Locator(spec).point(), Some((50.0, 25.0)));
        assert_eq!(
            TargetRef::Point { x: 3.0, y: 4.0 }.point(),
            Some((3.0, 4.0))
        );
        assert_eq!(
            TargetRef::Finder(FlutterFinder::ByText("Login".into())).point(),
            None
        );
    }

    #[test]
    fn finder_arguments_shape() {
        let args = FlutterFinder::ByValueKey("submit".into()).to_arguments();
        assert_eq!(args["finderType"], "ByValueKey");
        assert_eq!(args["keyValueString"], "submit");

        let args = FlutterFinder::ByText("Login".into()).to_arguments();
        assert_eq!(args["finderType"], "ByText");
        assert_eq!(args["text"], "Login");
    }
}
