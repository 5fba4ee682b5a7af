//! Heuristic layout classification.
//!
//! Classification is a pure function of a geometry snapshot, so the
//! heuristics are testable without a renderer. The engine caches the
//! resulting descriptor per cue id; layout is assumed stable after the
//! initial render of a given document.

use serde::{Deserialize, Serialize};

use crate::document::NodeGeometry;

/// Rendering-context description of a resolved node, driving the
/// highlight style decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutDescriptor {
    pub is_inline: bool,
    pub is_in_paragraph: bool,
    pub has_siblings: bool,
    pub parent_width: f64,
    pub element_width: f64,
    pub element_height: f64,
    /// The node sits inline within running prose, where heavy styling
    /// would be visually disruptive.
    pub is_dense_text: bool,
}

/// Classifies a node's rendering context from its geometry snapshot.
///
/// Dense text means the parent's non-empty text-node children are at
/// least as numerous as its element children.
pub fn classify(geometry: &NodeGeometry) -> LayoutDescriptor {
    LayoutDescriptor {
        is_inline: geometry.inline,
        is_in_paragraph: geometry.in_paragraph,
        has_siblings: geometry.element_sibling_count > 1,
        parent_width: geometry.parent_width,
        element_width: geometry.width,
        element_height: geometry.height,
        is_dense_text: geometry.text_sibling_count >= geometry.element_sibling_count,
    }
}
