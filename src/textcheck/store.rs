//! Match Store: per-category snapshots of flagged spans
//!
//! The single mutable structure of the overlay. Every mutation builds the new
//! snapshot first and swaps it in whole, then records a render signal for the
//! category so the editor binding knows what to redraw.

use std::collections::{BTreeMap, BTreeSet};

use super::scope::{self, IgnoreDecision, Resolution};
use super::types::{Category, Match, MatchId, RenderedMark};

#[derive(Debug, Default)]
pub struct MatchStore {
    snapshots: BTreeMap<Category, Vec<Match>>,
    revision: u64,
    pending_signals: BTreeSet<Category>,
}

impl MatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replace all matches of a category.
    ///
    /// Matches are ordered by position and stamped with the category.
    /// Returns false (and signals nothing) if the snapshot is unchanged.
    pub fn replace_category(&mut self, category: &Category, mut matches: Vec<Match>) -> bool {
        for m in &mut matches {
            if &m.category != category {
                m.category = category.clone();
            }
        }
        matches.sort_by_key(|m| (m.offset, m.id));

        let unchanged = match self.snapshots.get(category) {
            Some(current) => current == &matches,
            None => matches.is_empty(),
        };
        if unchanged {
            return false;
        }

        self.snapshots.insert(category.clone(), matches);
        self.signal(category);
        true
    }

    /// Resolve `decision` against the current snapshots and apply it.
    /// Returns the number of matches whose state changed.
    pub fn apply_ignore_decision(&mut self, decision: &IgnoreDecision) -> usize {
        let resolution = scope::resolve(self, decision);
        tracing::debug!(
            scope = decision.scope_name(),
            word = %decision.word,
            affected = resolution.len(),
            "applying ignore decision"
        );
        self.apply_resolution(&resolution)
    }

    /// Apply precomputed state changes, one atomic swap per category
    pub fn apply_resolution(&mut self, resolution: &Resolution) -> usize {
        let mut by_category: BTreeMap<&Category, Vec<_>> = BTreeMap::new();
        for change in &resolution.changes {
            by_category.entry(&change.category).or_default().push(change);
        }

        let mut applied = 0;
        for (category, changes) in by_category {
            let Some(current) = self.snapshots.get(category) else {
                continue;
            };

            let mut next = current.clone();
            for change in changes {
                if let Some(m) = next.iter_mut().find(|m| m.id == change.match_id) {
                    if m.ignore_state != change.to {
                        m.ignore_state = change.to;
                        applied += 1;
                    }
                }
            }

            if &next != current {
                self.snapshots.insert(category.clone(), next);
                self.signal(category);
            }
        }
        applied
    }

    /// Current matches of a category; empty for unknown or unchecked ones
    pub fn matches(&self, category: &Category) -> &[Match] {
        self.snapshots.get(category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, category: &Category, id: MatchId) -> Option<&Match> {
        self.matches(category).iter().find(|m| m.id == id)
    }

    /// Every match of every loaded category
    pub fn all_matches(&self) -> impl Iterator<Item = &Match> {
        self.snapshots.values().flatten()
    }

    pub fn loaded_categories(&self) -> impl Iterator<Item = &Category> {
        self.snapshots.keys()
    }

    /// Render instructions for one category
    pub fn marks(&self, category: &Category) -> Vec<RenderedMark> {
        self.matches(category).iter().map(RenderedMark::from).collect()
    }

    pub fn clear_category(&mut self, category: &Category) {
        if let Some(previous) = self.snapshots.remove(category) {
            if !previous.is_empty() {
                self.signal(category);
            }
        }
    }

    /// Drop every snapshot (document switch)
    pub fn clear_all(&mut self) {
        let categories: Vec<Category> = self.snapshots.keys().cloned().collect();
        for category in categories {
            self.clear_category(&category);
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Drain categories that changed since the last call
    pub fn take_render_signals(&mut self) -> Vec<Category> {
        std::mem::take(&mut self.pending_signals).into_iter().collect()
    }

    fn signal(&mut self, category: &Category) {
        self.revision += 1;
        self.pending_signals.insert(category.clone());
    }
}

// =============================================================================
// Tests
// =============================================================================
