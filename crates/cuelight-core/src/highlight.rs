//! Highlight style selection and class application.
//!
//! `apply` always performs a full reset before adding the new state, so
//! it stays correct even when a deferred cleanup from an earlier
//! removal fires out of order. The at-most-one-active-highlight
//! invariant is enforced by the engine, which removes the previous
//! node's highlight before applying the next.

use serde::{Deserialize, Serialize};

use crate::document::{ContentRoot, NodeId};
use crate::layout::LayoutDescriptor;

/// Fade-in marker added together with a style class.
pub const FADE_IN_CLASS: &str = "cue-fade-in";
/// Fade-out marker set while a removal's deferred cleanup is pending.
pub const FADE_OUT_CLASS: &str = "cue-fade-out";

/// Width share of the parent above which a paragraph-level node gets
/// the advanced treatment.
const WIDE_BLOCK_RATIO: f64 = 0.8;

/// Highlight treatments, least to most visually prominent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightStyle {
    /// Underline-weight styling for targets inline within dense prose.
    Minimal,
    /// Soft background for inline targets with element siblings.
    Medium,
    /// Full-block treatment for near-full-width paragraph content.
    Advanced,
    /// Default treatment.
    Standard,
}

impl HighlightStyle {
    /// Decision policy, evaluated in order; arms are mutually exclusive.
    pub fn choose(descriptor: &LayoutDescriptor) -> Self {
        if descriptor.is_dense_text && descriptor.is_inline && descriptor.has_siblings {
            HighlightStyle::Minimal
        } else if descriptor.is_inline && descriptor.has_siblings {
            HighlightStyle::Medium
        } else if descriptor.is_in_paragraph
            && descriptor.parent_width > 0.0
            && descriptor.element_width / descriptor.parent_width > WIDE_BLOCK_RATIO
        {
            HighlightStyle::Advanced
        } else {
            HighlightStyle::Standard
        }
    }

    /// Short display name for reports and logs.
    pub fn display_name(self) -> &'static str {
        match self {
            HighlightStyle::Minimal => "minimal",
            HighlightStyle::Medium => "medium",
            HighlightStyle::Advanced => "advanced",
            HighlightStyle::Standard => "standard",
        }
    }

    pub fn class_name(self) -> &'static str {
        match self {
            HighlightStyle::Minimal => "cue-highlight-minimal",
            HighlightStyle::Medium => "cue-highlight-medium",
            HighlightStyle::Advanced => "cue-highlight-advanced",
            HighlightStyle::Standard => "cue-highlight-standard",
        }
    }

    pub fn all() -> &'static [HighlightStyle] {
        &[
            HighlightStyle::Minimal,
            HighlightStyle::Medium,
            HighlightStyle::Advanced,
            HighlightStyle::Standard,
        ]
    }
}

/// Removes every highlight-state class, fade markers included.
pub fn clear_highlight_classes(doc: &mut dyn ContentRoot, node: NodeId) {
    for style in HighlightStyle::all() {
        doc.remove_class(node, style.class_name());
    }
    doc.remove_class(node, FADE_IN_CLASS);
    doc.remove_class(node, FADE_OUT_CLASS);
}

/// Applies a highlight style. Clears all prior highlight state first so
/// a repeated style replays its transition.
pub fn apply(doc: &mut dyn ContentRoot, node: NodeId, style: HighlightStyle) {
    clear_highlight_classes(doc, node);
    doc.add_class(node, style.class_name());
    doc.add_class(node, FADE_IN_CLASS);
}

/// Starts removal: swaps the fade-in marker for fade-out. The style
/// class stays until the deferred cleanup so the transition can play.
pub fn begin_remove(doc: &mut dyn ContentRoot, node: NodeId) {
    doc.add_class(node, FADE_OUT_CLASS);
    doc.remove_class(node, FADE_IN_CLASS);
}

/// Deferred half of removal: clears every highlight class. Safe to run
/// late or repeatedly; `apply` resets state on its own.
pub fn finish_remove(doc: &mut dyn ContentRoot, node: NodeId) {
    clear_highlight_classes(doc, node);
}

/// True while the node carries a live highlight. A node mid-removal
/// keeps its style class until the deferred cleanup so the fade can
/// play, but no longer counts as active.
pub fn is_highlighted(doc: &dyn ContentRoot, node: NodeId) -> bool {
    doc.has_class(node, FADE_IN_CLASS)
        && HighlightStyle::all()
            .iter()
            .any(|style| doc.has_class(node, style.class_name()))
}
