//! Snapshot builder: canonical element arena, structural hash, summary text.
//!
//! A snapshot is an immutable capture of the whole UI tree. Elements live in
//! an arena indexed by position; parent and child links are arena indices, so
//! a reference outliving its snapshot is a failed lookup, never a dangling
//! pointer. Interactive elements additionally get small stable indices in
//! depth-first order, which is what the planner targets.

use std::collections::BTreeMap;

use app_adapter::{RawNode, RawTree, TargetRef};
use apptap_core_types::{ElementBounds, SnapshotEpoch, ViewportInfo};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One canonical element. Owned by its snapshot, invalidated with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiElement {
    /// Arena position, also the depth-first traversal order.
    pub arena_index: usize,
    pub kind: String,
    pub text: Option<String>,
    pub key: Option<String>,
    pub bounds: Option<ElementBounds>,
    pub enabled: bool,
    pub visible: bool,
    pub interactive: bool,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub depth: usize,
}

/// Resolvable reference to one interactive element of one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRef {
    /// Epoch of the snapshot that minted this reference.
    pub epoch: SnapshotEpoch,
    /// Interactive index the planner saw.
    pub index: u32,
    /// How the backend addresses the element.
    pub target: TargetRef,
    pub enabled: bool,
    /// No stable text or key identity; the planner may prefer not to target
    /// it.
    pub low_confidence: bool,
}

/// Immutable capture of the app's UI tree plus a structural hash.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub epoch: SnapshotEpoch,
    pub viewport: ViewportInfo,
    elements: Vec<UiElement>,
    /// Interactive elements in depth-first order, keyed by planner index.
    pub selector_map: BTreeMap<u32, ElementRef>,
    /// Structural hash over kind + bounds + text + interactivity. Backend
    /// handles stay out so equal-looking screens hash equal.
    pub content_hash: String,
    /// Deterministic text rendering sent to the planner.
    pub summary: String,
    /// Optional screenshot taken alongside the tree.
    pub screenshot: Option<Vec<u8>>,
}

impl Snapshot {
    pub fn elements(&self) -> &[UiElement] {
        &self.elements
    }

    pub fn interactive_count(&self) -> usize {
        self.selector_map.len()
    }

    /// One-line description used in history entries and step events.
    pub fn brief(&self) -> String {
        let hash = &self.content_hash[..8.min(self.content_hash.len())];
        format!(
            "{} elements / {} interactive / {}",
            self.elements.len(),
            self.selector_map.len(),
            hash
        )
    }

    pub fn with_screenshot(mut self, bytes: Vec<u8>) -> Self {
        self.screenshot = Some(bytes);
        self
    }
}

/// Builds canonical snapshots from backend-native trees.
///
/// Summary generation is a pure function of the input tree and the budgets:
/// identical tree in, byte-identical summary out.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    max_elements: usize,
    max_text_length: usize,
}

impl SnapshotBuilder {
    pub fn new(max_elements: usize, max_text_length: usize) -> Self {
        Self {
            max_elements,
            max_text_length,
        }
    }

    pub fn build(&self, raw: &RawTree, epoch: SnapshotEpoch) -> Snapshot {
        let mut elements = Vec::new();
        let mut backend_targets = Vec::new();
        flatten(&raw.root, None, 0, &mut elements, &mut backend_targets);

        let mut selector_map = BTreeMap::new();
        let mut indexed: BTreeMap<usize, u32> = BTreeMap::new();
        for element in &elements {
            if !element.interactive || !element.visible {
                continue;
            }
            let index = selector_map.len() as u32;
            let target = backend_targets[element.arena_index]
                .clone()
                .unwrap_or_else(|| fallback_target(element));
            selector_map.insert(
                index,
                ElementRef {
                    epoch,
                    index,
                    target,
                    enabled: element.enabled,
                    low_confidence: element.text.is_none() && element.key.is_none(),
                },
            );
            indexed.insert(element.arena_index, index);
        }

        let content_hash = structural_hash(&elements);
        let summary = self.render(&elements, &indexed);

        Snapshot {
            epoch,
            viewport: raw.viewport,
            elements,
            selector_map,
            content_hash,
            summary,
            screenshot: None,
        }
    }

    /// Deterministic tree rendering: interactive elements carry their planner
    /// index, everything past the element budget collapses into an explicit
    /// omission marker, and an empty interactive set is called out rather
    /// than left blank.
    fn render(&self, elements: &[UiElement], targets: &BTreeMap<usize, u32>) -> String {
        let mut lines = Vec::new();
        for element in elements.iter().take(self.max_elements) {
            let indent = "  ".repeat(element.depth);
            let mut line = match targets.get(&element.arena_index) {
                Some(index) => format!("{indent}[{index}]<{}>", element.kind),
                None => format!("{indent}<{}>", element.kind),
            };
            if let Some(text) = &element.text {
                line.push_str(&format!(" {:?}", truncate(text, self.max_text_length)));
            }
            if let Some(key) = &element.key {
                line.push_str(&format!(" key={key}"));
            }
            if !element.enabled {
                line.push_str(" (disabled)");
            }
            if targets.contains_key(&element.arena_index)
                && element.text.is_none()
                && element.key.is_none()
            {
                line.push_str(" (low confidence)");
            }
            lines.push(line);
        }
        if elements.len() > self.max_elements {
            lines.push(format!(
                "... {} more elements omitted",
                elements.len() - self.max_elements
            ));
        }
        if targets.is_empty() {
            lines.push("0 interactive elements".to_string());
        }
        lines.join("\n")
    }
}

fn flatten(
    node: &RawNode,
    parent: Option<usize>,
    depth: usize,
    out: &mut Vec<UiElement>,
    targets: &mut Vec<Option<TargetRef>>,
) {
    let arena_index = out.len();
    out.push(UiElement {
        arena_index,
        kind: node.kind.clone(),
        text: node.text.clone(),
        key: node.key.clone(),
        bounds: node.bounds,
        enabled: node.enabled,
        visible: node.visible,
        interactive: node.interactive,
        parent,
        children: Vec::new(),
        depth,
    });
    targets.push(node.target.clone());
    for child in &node.children {
        let child_index = out.len();
        flatten(child, Some(arena_index), depth + 1, out, targets);
        out[arena_index].children.push(child_index);
    }
}

/// Last-resort addressing when a backend gave no target: the element's
/// center point.
fn fallback_target(element: &UiElement) -> TargetRef {
    match element.bounds {
        Some(bounds) => {
            let (x, y) = bounds.center();
            TargetRef::Point { x, y }
        }
        None => TargetRef::Point { x: 0.0, y: 0.0 },
    }
}

fn structural_hash(elements: &[UiElement]) -> String {
    let mut hasher = Sha256::new();
    for element in elements {
        hasher.update(element.kind.as_bytes());
        if let Some(text) = &element.text {
            hasher.update(text.as_bytes());
        }
        if let Some(bounds) = element.bounds {
            hasher.update(bounds.x.to_bits().to_le_bytes());
            hasher.update(bounds.y.to_bits().to_le_bytes());
            hasher.update(bounds.width.to_bits().to_le_bytes());
            hasher.update(bounds.height.to_bits().to_le_bytes());
        }
        hasher.update([element.interactive as u8, element.enabled as u8]);
        hasher.update(b"\x1f");
    }
    let digest = hasher.finalize();
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max).collect();
    format!("{kept}…")
}

#[cfg(test)]
mod tests {
    use super::*;
    use app_adapter::LocatorSpec;

    fn sample_tree() -> RawTree {
        let mut root = RawNode::new("android.widget.FrameLayout");
        let mut label = RawNode::new("android.widget.TextView");
        label.text = Some("Welcome".to_string());
        let mut button = RawNode::new("android.widget.Button");
        button.text = Some("Log in".to_string());
        button.key = Some("com.demo:id/login".to_string());
        button.interactive = true;
        button.bounds = Some(ElementBounds::new(40.0, 500.0, 1000.0, 120.0));
        button.target = Some(TargetRef::Locator(LocatorSpec {
            key: button.key.clone(),
            text: button.text.clone(),
            class_name: button.kind.clone(),
            bounds: button.bounds,
        }));
        let mut anonymous = RawNode::new("android.widget.ImageButton");
        anonymous.interactive = true;
        root.children = vec![label, button, anonymous];
        RawTree::new(root, ViewportInfo::new(1080, 1920))
    }

    #[test]
    fn summary_is_deterministic() {
        let builder = SnapshotBuilder::new(100, 40);
        let raw = sample_tree();
        let first = builder.build(&raw, SnapshotEpoch(1));
        let second = builder.build(&raw, SnapshotEpoch(2));
        assert_eq!(first.summary, second.summary);
        assert_eq!(first.content_hash, second.content_hash);
    }

    #[test]
    fn interactive_indices_follow_dfs_order() {
        let snapshot = SnapshotBuilder::new(100, 40).build(&sample_tree(), SnapshotEpoch(1));
        assert_eq!(snapshot.interactive_count(), 2);
        let login = &snapshot.selector_map[&0];
        assert!(!login.low_confidence);
        assert!(matches!(login.target, TargetRef::Locator(_)));
        // The keyless, textless image button is flagged.
        let anonymous = &snapshot.selector_map[&1];
        assert!(anonymous.low_confidence);
    }

    #[test]
    fn summary_marks_interactive_and_disabled() {
        let mut raw = sample_tree();
        raw.root.children[1].enabled = false;
        let snapshot = SnapshotBuilder::new(100, 40).build(&raw, SnapshotEpoch(1));
        assert!(snapshot.summary.contains("[0]<android.widget.Button>"));
        assert!(snapshot.summary.contains("(disabled)"));
        assert!(snapshot.summary.contains("(low confidence)"));
        assert!(snapshot.summary.contains("<android.widget.TextView> \"Welcome\""));
    }

    #[test]
    fn element_budget_emits_omission_marker() {
        let mut root = RawNode::new("Column");
        for i in 0..10 {
            let mut child = RawNode::new("Text");
            child.text = Some(format!("row {i}"));
            root.children.push(child);
        }
        let raw = RawTree::new(root, ViewportInfo::new(100, 100));
        let snapshot = SnapshotBuilder::new(5, 40).build(&raw, SnapshotEpoch(1));
        assert!(snapshot.summary.contains("... 6 more elements omitted"));
    }

    #[test]
    fn empty_tree_has_explicit_marker() {
        let raw = RawTree::empty(ViewportInfo::new(100, 100));
        let snapshot = SnapshotBuilder::new(50, 40).build(&raw, SnapshotEpoch(1));
        assert!(snapshot.summary.contains("0 interactive elements"));
        assert_eq!(snapshot.interactive_count(), 0);
    }

    #[test]
    fn hash_changes_with_content() {
        let builder = SnapshotBuilder::new(100, 40);
        let first = builder.build(&sample_tree(), SnapshotEpoch(1));
        let mut changed = sample_tree();
        changed.root.children[0].text = Some("Goodbye".to_string());
        let second = builder.build(&changed, SnapshotEpoch(2));
        assert_ne!(first.content_hash, second.content_hash);
    }

    #[test]
    fn long_text_is_truncated_in_summary() {
        let mut root = RawNode::new("Text");
        root.text = Some("a".repeat(100));
        let raw = RawTree::new(root, ViewportInfo::new(100, 100));
        let snapshot = SnapshotBuilder::new(10, 20).build(&raw, SnapshotEpoch(1));
        assert!(snapshot.summary.contains('…'));
        assert!(!snapshot.summary.contains(&"a".repeat(30)));
    }
}
