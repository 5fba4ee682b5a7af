//! Cue-id to document-node resolution.
//!
//! Resolution runs a prioritized chain of pure strategies, remembers
//! which strategy worked per id, and revalidates cached nodes against
//! the live document before trusting them. A fuzzy substring fallback
//! catches markup that almost matches. Resolution never fails the
//! pipeline; a total miss returns None and the caller skips rendering
//! for that activation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::{CUE_ID_ATTR, ContentRoot, NodeId};

/// Prefix used by the aliased marker form (`data-cue-id="s7"` for cue
/// id `7`).
pub const ALIAS_PREFIX: &str = "s";

type Strategy = fn(&dyn ContentRoot, &str) -> Option<NodeId>;

/// Ordered resolution strategies, cheapest and most common form first.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("cue-attr", resolve_by_cue_attr),
    ("cue-attr-alias", resolve_by_cue_attr_alias),
    ("element-id", resolve_by_element_id),
    ("element-id-alias", resolve_by_element_id_alias),
];

fn resolve_by_cue_attr(doc: &dyn ContentRoot, cue_id: &str) -> Option<NodeId> {
    doc.find_by_attr(CUE_ID_ATTR, cue_id)
}

fn resolve_by_cue_attr_alias(doc: &dyn ContentRoot, cue_id: &str) -> Option<NodeId> {
    doc.find_by_attr(CUE_ID_ATTR, &format!("{ALIAS_PREFIX}{cue_id}"))
}

fn resolve_by_element_id(doc: &dyn ContentRoot, cue_id: &str) -> Option<NodeId> {
    doc.find_by_element_id(cue_id)
}

fn resolve_by_element_id_alias(doc: &dyn ContentRoot, cue_id: &str) -> Option<NodeId> {
    doc.find_by_element_id(&format!("{ALIAS_PREFIX}{cue_id}"))
}

/// Strips the alias prefix from a marker value so it can be matched
/// back to a cue id. `s7` maps to `7`; unprefixed values pass through.
pub fn marker_to_cue_id(marker: &str) -> &str {
    marker.strip_prefix(ALIAS_PREFIX).unwrap_or(marker)
}

/// Cumulative resolution counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorStats {
    /// Lookups served from the element cache.
    pub hits: u64,
    /// Lookups that had to run strategies (or failed outright).
    pub misses: u64,
    /// Cached nodes dropped because they were no longer attached.
    pub evictions: u64,
    pub cached_elements: usize,
    pub cached_strategies: usize,
}

impl LocatorStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Strategy-chain resolver with an element cache and a per-id memo of
/// the last successful strategy.
#[derive(Debug, Default)]
pub struct ElementLocator {
    element_cache: HashMap<String, NodeId>,
    strategy_cache: HashMap<String, usize>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl ElementLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves a cue id to a node, or None when nothing matches.
    pub fn resolve(&mut self, doc: &dyn ContentRoot, cue_id: &str) -> Option<NodeId> {
        if let Some(&cached) = self.element_cache.get(cue_id) {
            if doc.is_attached(cached) {
                self.hits += 1;
                return Some(cached);
            }
            // The document changed underneath us; drop the entry and
            // resolve from scratch.
            debug!(cue_id, "cached node detached, evicting");
            self.element_cache.remove(cue_id);
            self.evictions += 1;
        }
        self.misses += 1;

        if let Some(found) = self.run_strategies(doc, cue_id) {
            return Some(found);
        }

        match fuzzy_resolve(doc, cue_id) {
            Some(node) => {
                debug!(cue_id, "resolved via fuzzy fallback");
                self.element_cache.insert(cue_id.to_string(), node);
                Some(node)
            }
            None => None,
        }
    }

    fn run_strategies(&mut self, doc: &dyn ContentRoot, cue_id: &str) -> Option<NodeId> {
        // The strategy that worked last time for this id goes first.
        let preferred = self.strategy_cache.get(cue_id).copied();
        if let Some(index) = preferred {
            if let Some(node) = STRATEGIES[index].1(doc, cue_id) {
                self.element_cache.insert(cue_id.to_string(), node);
                return Some(node);
            }
        }

        for (index, (name, strategy)) in STRATEGIES.iter().enumerate() {
            if Some(index) == preferred {
                continue;
            }
            if let Some(node) = strategy(doc, cue_id) {
                debug!(cue_id, strategy = name, "resolved");
                self.element_cache.insert(cue_id.to_string(), node);
                self.strategy_cache.insert(cue_id.to_string(), index);
                return Some(node);
            }
        }
        None
    }

    /// Drops the cached node for one id. The strategy memo survives; it
    /// is likely still right for a replacement node.
    pub fn invalidate(&mut self, cue_id: &str) {
        self.element_cache.remove(cue_id);
    }

    /// Clears caches and counters.
    pub fn clear(&mut self) {
        self.element_cache.clear();
        self.strategy_cache.clear();
        self.hits = 0;
        self.misses = 0;
        self.evictions = 0;
    }

    pub fn stats(&self) -> LocatorStats {
        LocatorStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            cached_elements: self.element_cache.len(),
            cached_strategies: self.strategy_cache.len(),
        }
    }
}

/// Last-resort partial matching on id- and class-like attributes.
/// First attached match in document order wins.
fn fuzzy_resolve(doc: &dyn ContentRoot, cue_id: &str) -> Option<NodeId> {
    if cue_id.is_empty() {
        return None;
    }
    doc.element_ids().into_iter().find(|&node| {
        let id_matches = doc
            .element_id(node)
            .is_some_and(|value| partial_match(value, cue_id));
        let marker_matches = doc
            .attr(node, CUE_ID_ATTR)
            .is_some_and(|value| partial_match(value, cue_id));
        let class_matches = doc
            .class_names(node)
            .iter()
            .any(|value| partial_match(value, cue_id));
        id_matches || marker_matches || class_matches
    })
}

fn partial_match(value: &str, cue_id: &str) -> bool {
    !value.is_empty() && (value.contains(cue_id) || cue_id.contains(value))
}
