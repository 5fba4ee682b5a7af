//! Content-root abstraction and an in-memory document model.
//!
//! The engine never owns the rendered document; it talks to it through
//! the `ContentRoot` trait: attribute lookup, class mutation, geometry
//! snapshots and scroll control. `DocumentModel` is the arena-backed
//! implementation used by tests and the playback simulator. Node ids
//! stay stable across detachment, so stale cache entries can be
//! detected (attachment check) instead of dangling.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Marker attribute carried by cue-addressable descendants.
pub const CUE_ID_ATTR: &str = "data-cue-id";

/// Tags treated as inline-level in geometry snapshots.
const INLINE_TAGS: &[&str] = &["a", "b", "em", "i", "mark", "span", "strong", "sub", "sup"];

/// Opaque handle to a document node. Stable for the lifetime of the
/// document, including across detachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

/// Axis-aligned box in content coordinates (px).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// Geometry snapshot of one node and its immediate rendering context.
///
/// Pure data: the layout classifier consumes this without touching the
/// document, so classification is testable with synthetic snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeGeometry {
    /// Whether the node renders inline-level.
    pub inline: bool,
    /// Whether any ancestor is a paragraph.
    pub in_paragraph: bool,
    /// Element children of the parent, this node included.
    pub element_sibling_count: usize,
    /// Non-empty text-node children of the parent.
    pub text_sibling_count: usize,
    pub parent_width: f64,
    pub width: f64,
    pub height: f64,
}

/// The document collaborator interface.
///
/// Implementations own the node tree; the engine only holds `NodeId`
/// back-references and revalidates them through `is_attached` before
/// every reuse.
pub trait ContentRoot {
    /// True when the root has no element descendants at all.
    fn is_empty(&self) -> bool;

    /// True while the node is reachable from the live root.
    fn is_attached(&self, node: NodeId) -> bool;

    /// First attached element carrying `name="value"`, in document order.
    fn find_by_attr(&self, name: &str, value: &str) -> Option<NodeId>;

    /// First attached element with the given element id.
    fn find_by_element_id(&self, value: &str) -> Option<NodeId>;

    /// All attached element ids in document order. Drives the fuzzy
    /// resolution fallback; not a hot path.
    fn element_ids(&self) -> Vec<NodeId>;

    fn element_id(&self, node: NodeId) -> Option<&str>;
    fn attr(&self, node: NodeId, name: &str) -> Option<&str>;
    fn class_names(&self, node: NodeId) -> &[String];
    fn has_class(&self, node: NodeId, class: &str) -> bool;
    fn add_class(&mut self, node: NodeId, class: &str);
    fn remove_class(&mut self, node: NodeId, class: &str);

    /// Geometry snapshot for layout classification.
    fn geometry(&self, node: NodeId) -> Option<NodeGeometry>;

    /// Bounding box in content coordinates.
    fn node_box(&self, node: NodeId) -> Option<Rect>;

    /// Height of the scrolling viewport.
    fn viewport_height(&self) -> f64;

    /// Total height of the content.
    fn content_height(&self) -> f64;

    fn scroll_top(&self) -> f64;
    fn set_scroll_top(&mut self, offset: f64, smooth: bool);

    /// Cue marker on the node or its nearest ancestor. Reverse path for
    /// click-to-seek.
    fn cue_marker_at(&self, node: NodeId) -> Option<&str>;
}

#[derive(Debug, Clone)]
struct NodeData {
    tag: String,
    element_id: Option<String>,
    classes: Vec<String>,
    attrs: HashMap<String, String>,
    /// Some for text nodes, None for elements.
    text: Option<String>,
    bounds: Rect,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    detached: bool,
}

impl NodeData {
    fn element(tag: &str, parent: Option<NodeId>) -> Self {
        Self {
            tag: tag.to_string(),
            element_id: None,
            classes: Vec::new(),
            attrs: HashMap::new(),
            text: None,
            bounds: Rect::default(),
            parent,
            children: Vec::new(),
            detached: false,
        }
    }

    fn is_element(&self) -> bool {
        self.text.is_none()
    }
}

/// Arena-backed `ContentRoot` implementation.
#[derive(Debug, Clone)]
pub struct DocumentModel {
    nodes: Vec<NodeData>,
    viewport_height: f64,
    scroll_top: f64,
    last_scroll_smooth: bool,
}

impl DocumentModel {
    pub fn new(viewport_height: f64) -> Self {
        Self {
            nodes: vec![NodeData::element("article", None)],
            viewport_height,
            scroll_top: 0.0,
            last_scroll_smooth: false,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData::element(tag, Some(parent)));
        self.nodes[parent.0 as usize].children.push(id);
        id
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let mut data = NodeData::element("#text", Some(parent));
        data.text = Some(text.to_string());
        self.nodes.push(data);
        self.nodes[parent.0 as usize].children.push(id);
        id
    }

    pub fn set_element_id(&mut self, node: NodeId, value: &str) {
        self.nodes[node.0 as usize].element_id = Some(value.to_string());
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        self.nodes[node.0 as usize]
            .attrs
            .insert(name.to_string(), value.to_string());
    }

    pub fn set_bounds(&mut self, node: NodeId, bounds: Rect) {
        self.nodes[node.0 as usize].bounds = bounds;
    }

    /// Detaches a subtree. Ids stay valid; attachment checks fail from
    /// here on.
    pub fn detach(&mut self, node: NodeId) {
        if node.0 == 0 {
            return;
        }
        self.nodes[node.0 as usize].detached = true;
        if let Some(parent) = self.nodes[node.0 as usize].parent {
            let siblings = &mut self.nodes[parent.0 as usize].children;
            siblings.retain(|&child| child != node);
        }
    }

    /// Whether the last scroll request asked for smooth behavior.
    pub fn last_scroll_smooth(&self) -> bool {
        self.last_scroll_smooth
    }

    fn data(&self, node: NodeId) -> Option<&NodeData> {
        self.nodes.get(node.0 as usize)
    }

    fn attached_elements(&self) -> impl Iterator<Item = (NodeId, &NodeData)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, data)| (NodeId(index as u32), data))
            .filter(|(id, data)| data.is_element() && self.is_attached(*id))
    }

    fn max_scroll(&self) -> f64 {
        (self.content_height() - self.viewport_height).max(0.0)
    }
}

impl ContentRoot for DocumentModel {
    fn is_empty(&self) -> bool {
        self.nodes[0].children.is_empty()
    }

    fn is_attached(&self, node: NodeId) -> bool {
        let mut cursor = node;
        loop {
            let Some(data) = self.data(cursor) else {
                return false;
            };
            if data.detached {
                return false;
            }
            match data.parent {
                Some(parent) => cursor = parent,
                None => return cursor.0 == 0,
            }
        }
    }

    fn find_by_attr(&self, name: &str, value: &str) -> Option<NodeId> {
        self.attached_elements()
            .find(|(_, data)| data.attrs.get(name).is_some_and(|held| held == value))
            .map(|(id, _)| id)
    }

    fn find_by_element_id(&self, value: &str) -> Option<NodeId> {
        self.attached_elements()
            .find(|(_, data)| data.element_id.as_deref() == Some(value))
            .map(|(id, _)| id)
    }

    fn element_ids(&self) -> Vec<NodeId> {
        self.attached_elements().map(|(id, _)| id).collect()
    }

    fn element_id(&self, node: NodeId) -> Option<&str> {
        self.data(node)?.element_id.as_deref()
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.data(node)?.attrs.get(name).map(String::as_str)
    }

    fn class_names(&self, node: NodeId) -> &[String] {
        self.data(node).map_or(&[], |data| data.classes.as_slice())
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.data(node)
            .is_some_and(|data| data.classes.iter().any(|held| held == class))
    }

    fn add_class(&mut self, node: NodeId, class: &str) {
        if self.has_class(node, class) {
            return;
        }
        if let Some(data) = self.nodes.get_mut(node.0 as usize) {
            data.classes.push(class.to_string());
        }
    }

    fn remove_class(&mut self, node: NodeId, class: &str) {
        if let Some(data) = self.nodes.get_mut(node.0 as usize) {
            data.classes.retain(|held| held != class);
        }
    }

    fn geometry(&self, node: NodeId) -> Option<NodeGeometry> {
        let data = self.data(node)?;
        if !data.is_element() {
            return None;
        }

        let parent = data.parent.and_then(|parent| self.data(parent));
        let (element_siblings, text_siblings, parent_width) =
            parent.map_or((0, 0, 0.0), |parent_data| {
                let mut elements = 0;
                let mut texts = 0;
                for &child in &parent_data.children {
                    match self.data(child) {
                        Some(child_data) if child_data.is_element() => elements += 1,
                        Some(child_data)
                            if child_data
                                .text
                                .as_deref()
                                .is_some_and(|text| !text.trim().is_empty()) =>
                        {
                            texts += 1;
                        }
                        _ => {}
                    }
                }
                (elements, texts, parent_data.bounds.width)
            });

        let mut in_paragraph = false;
        let mut cursor = data.parent;
        while let Some(ancestor) = cursor {
            let Some(ancestor_data) = self.data(ancestor) else {
                break;
            };
            if ancestor_data.tag == "p" {
                in_paragraph = true;
                break;
            }
            cursor = ancestor_data.parent;
        }

        Some(NodeGeometry {
            inline: INLINE_TAGS.contains(&data.tag.as_str()),
            in_paragraph,
            element_sibling_count: element_siblings,
            text_sibling_count: text_siblings,
            parent_width,
            width: data.bounds.width,
            height: data.bounds.height,
        })
    }

    fn node_box(&self, node: NodeId) -> Option<Rect> {
        let data = self.data(node)?;
        data.is_element().then_some(data.bounds)
    }

    fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    fn content_height(&self) -> f64 {
        self.attached_elements()
            .map(|(_, data)| data.bounds.bottom())
            .fold(0.0, f64::max)
    }

    fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    fn set_scroll_top(&mut self, offset: f64, smooth: bool) {
        self.scroll_top = offset.clamp(0.0, self.max_scroll());
        self.last_scroll_smooth = smooth;
    }

    fn cue_marker_at(&self, node: NodeId) -> Option<&str> {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            let data = self.data(current)?;
            if let Some(marker) = data.attrs.get(CUE_ID_ATTR) {
                return Some(marker);
            }
            cursor = data.parent;
        }
        None
    }
}
