//! Keep-in-view scrolling.
//!
//! Scrolls only when the node's box leaves the viewport shrunk by a
//! safety margin, and centers the node when it does. The target
//! computation is pure; `ensure_visible` applies it through the
//! document trait.

use crate::document::{ContentRoot, NodeId, Rect};

/// Computes the scroll offset needed to keep a node in view, or None
/// when the node is already inside the safe region.
///
/// All values are content coordinates. The returned offset centers the
/// node vertically, clamped to the scrollable range.
pub fn scroll_target(
    viewport_height: f64,
    content_height: f64,
    scroll_top: f64,
    node: &Rect,
    margin: f64,
) -> Option<f64> {
    let safe_top = scroll_top + margin;
    let safe_bottom = scroll_top + viewport_height - margin;
    if node.y >= safe_top && node.bottom() <= safe_bottom {
        return None;
    }

    let node_center = node.y + node.height / 2.0;
    let max_scroll = (content_height - viewport_height).max(0.0);
    Some((node_center - viewport_height / 2.0).clamp(0.0, max_scroll))
}

/// Scrolls the container so the node sits centered, if it is outside
/// the safe region. Idempotent for an already-visible node.
///
/// Returns true when a scroll was issued.
pub fn ensure_visible(doc: &mut dyn ContentRoot, node: NodeId, margin: f64) -> bool {
    let Some(node_box) = doc.node_box(node) else {
        return false;
    };
    let target = scroll_target(
        doc.viewport_height(),
        doc.content_height(),
        doc.scroll_top(),
        &node_box,
        margin,
    );
    match target {
        Some(offset) => {
            doc.set_scroll_top(offset, true);
            true
        }
        None => false,
    }
}
