//! Mark Reconciler: keeps match anchors aligned with live editor text
//!
//! # Architecture
//! - **Edit region**: an explicit editor edit, or the common prefix/suffix
//!   difference between the last known text and the synced text
//! - **Coordinate shifting**: matches downstream of the edit move by its net
//!   length change, keeping id and ignore state
//! - **Anchor verification**: a shifted match must still spell its word;
//!   matches touched by the edit or failing verification are dropped
//! - **Change detection**: a content hash per category short-circuits syncs
//!   of identical text

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::change::ChangeDetector;
use super::error::TextCheckError;
use super::store::MatchStore;
use super::text::{is_whole_word, span_equals, utf16_units};
use super::types::{Category, Match, MatchId};

// =============================================================================
// Core Types
// =============================================================================

/// A single change record for shift calculation (UTF-16 units)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Original start position
    pub old_start: usize,
    /// Original end position
    pub old_end: usize,
    /// Original length
    pub old_len: usize,
    /// New length (after change)
    pub new_len: usize,
}

impl Change {
    /// Net shift caused by this change
    pub fn shift(&self) -> i64 {
        self.new_len as i64 - self.old_len as i64
    }

    /// Whether `[start, end)` overlaps the replaced region. A pure insertion
    /// strictly inside the span counts as overlapping.
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        if self.old_len == 0 {
            return start < self.old_start && self.old_start < end;
        }
        start < self.old_end && end > self.old_start
    }

    /// Whether `[start, end)` shares a boundary with the edited region
    pub fn touches(&self, start: usize, end: usize) -> bool {
        end == self.old_start || start == self.old_end
    }
}

/// An editor edit: replace `[from, to)` of the old text with `inserted`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEdit {
    pub from: usize,
    pub to: usize,
    pub inserted: String,
}

impl TextEdit {
    fn to_change(&self) -> Change {
        Change {
            old_start: self.from,
            old_end: self.to,
            old_len: self.to - self.from,
            new_len: self.inserted.encode_utf16().count(),
        }
    }
}

/// What one reconciliation did
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    /// Text was identical to the last known content
    pub skipped: bool,
    pub dropped: Vec<MatchId>,
    pub shifted: usize,
}

// =============================================================================
// Trait for shiftable items
// =============================================================================

/// Items that have start/end positions
pub trait HasSpan {
    fn start(&self) -> usize;
    fn end(&self) -> usize;
    fn set_start(&mut self, start: usize);
    fn set_end(&mut self, end: usize);
}

impl HasSpan for Match {
    fn start(&self) -> usize { self.offset }
    fn end(&self) -> usize { self.offset + self.length }
    fn set_start(&mut self, start: usize) { self.offset = start; }
    fn set_end(&mut self, end: usize) { self.length = end.saturating_sub(self.offset); }
}

// =============================================================================
// Core Functions
// =============================================================================

/// Single edit region turning `old` into `new`, or None if equal
pub fn diff_units(old: &[u16], new: &[u16]) -> Option<Change> {
    if old == new {
        return None;
    }

    let prefix = old.iter().zip(new.iter()).take_while(|(a, b)| a == b).count();
    let max_suffix = old.len().min(new.len()) - prefix;
    let suffix = old
        .iter()
        .rev()
        .zip(new.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    Some(Change {
        old_start: prefix,
        old_end: old.len() - suffix,
        old_len: old.len() - suffix - prefix,
        new_len: new.len() - suffix - prefix,
    })
}

/// Drop items overlapping the change and shift items downstream of it
pub fn shift_items<T: HasSpan>(items: &mut Vec<T>, change: &Change) {
    let shift = change.shift();
    items.retain_mut(|item| {
        if change.overlaps(item.start(), item.end()) {
            return false;
        }

        if shift != 0 && item.start() >= change.old_end {
            let new_start = (item.start() as i64 + shift).max(0) as usize;
            let new_end = (item.end() as i64 + shift).max(0) as usize;
            item.set_start(new_start);
            item.set_end(new_end);
        }

        true
    });
}

/// Re-anchor `matches` after `change` was applied to produce `new_units`.
/// Returns the surviving matches and the ids of dropped ones.
pub fn reconcile_matches(
    matches: &[Match],
    change: &Change,
    new_units: &[u16],
) -> (Vec<Match>, Vec<MatchId>) {
    let adjacent: Vec<MatchId> = matches
        .iter()
        .filter(|m| change.touches(m.start(), m.end()))
        .map(|m| m.id)
        .collect();

    let mut survivors = matches.to_vec();
    shift_items(&mut survivors, change);

    survivors.retain(|m| {
        if !span_equals(new_units, m.offset, m.end(), &m.word) {
            return false;
        }
        // An edit at the boundary may have glued letters onto the word
        !adjacent.contains(&m.id) || is_whole_word(new_units, m.offset, m.end())
    });

    let dropped = matches
        .iter()
        .map(|m| m.id)
        .filter(|id| !survivors.iter().any(|s| s.id == *id))
        .collect();

    (survivors, dropped)
}

// =============================================================================
// MarkReconciler
// =============================================================================

#[derive(Debug, Default)]
struct CategoryText {
    units: Vec<u16>,
    detector: ChangeDetector,
}

/// Live text per category, and which category the editor is showing
#[derive(Debug, Default)]
pub struct MarkReconciler {
    texts: HashMap<Category, CategoryText>,
    focused: Option<Category>,
    skip_unchanged: bool,
}

impl MarkReconciler {
    pub fn new(skip_unchanged: bool) -> Self {
        Self {
            skip_unchanged,
            ..Default::default()
        }
    }

    /// Record the text that current anchors of `category` refer to
    pub fn set_base_text(&mut self, category: &Category, text: &str) {
        let entry = self.texts.entry(category.clone()).or_default();
        entry.units = utf16_units(text);
        entry.detector.record(text);
    }

    /// Last known text of a category
    pub fn text(&self, category: &Category) -> Option<String> {
        self.texts
            .get(category)
            .map(|t| String::from_utf16_lossy(&t.units))
    }

    /// Reconcile `category` against the editor's full plain text
    pub fn sync_text(
        &mut self,
        store: &mut MatchStore,
        category: &Category,
        new_text: &str,
    ) -> ReconcileOutcome {
        self.sync_text_inner(store, category, new_text, self.skip_unchanged)
    }

    pub(crate) fn sync_text_inner(
        &mut self,
        store: &mut MatchStore,
        category: &Category,
        new_text: &str,
        allow_skip: bool,
    ) -> ReconcileOutcome {
        let entry = self.texts.entry(category.clone()).or_default();
        let changed = entry.detector.has_changed(new_text);
        if !changed && allow_skip {
            return ReconcileOutcome {
                skipped: true,
                ..Default::default()
            };
        }

        let new_units = utf16_units(new_text);
        let change = diff_units(&entry.units, &new_units);
        entry.units = new_units;

        match change {
            Some(change) => Self::apply_change(store, category, &change, &entry.units),
            None => ReconcileOutcome::default(),
        }
    }

    /// Reconcile `category` against one editor edit on its last known text
    pub fn apply_edit(
        &mut self,
        store: &mut MatchStore,
        category: &Category,
        edit: &TextEdit,
    ) -> Result<ReconcileOutcome, TextCheckError> {
        let entry = self.texts.entry(category.clone()).or_default();
        if edit.from > edit.to || edit.to > entry.units.len() {
            return Err(TextCheckError::InvalidEdit(format!(
                "range {}..{} outside text of {} units",
                edit.from,
                edit.to,
                entry.units.len()
            )));
        }

        let mut units = Vec::with_capacity(entry.units.len() + edit.inserted.len());
        units.extend_from_slice(&entry.units[..edit.from]);
        units.extend(edit.inserted.encode_utf16());
        units.extend_from_slice(&entry.units[edit.to..]);
        entry.units = units;
        entry.detector.record(&String::from_utf16_lossy(&entry.units));

        Ok(Self::apply_change(store, category, &edit.to_change(), &entry.units))
    }

    fn apply_change(
        store: &mut MatchStore,
        category: &Category,
        change: &Change,
        new_units: &[u16],
    ) -> ReconcileOutcome {
        let current = store.matches(category);
        if current.is_empty() {
            return ReconcileOutcome::default();
        }

        let (survivors, dropped) = reconcile_matches(current, change, new_units);
        let shifted = if change.shift() == 0 {
            0
        } else {
            survivors
                .iter()
                .filter(|m| m.offset >= change.old_start + change.new_len)
                .count()
        };

        if !dropped.is_empty() {
            tracing::debug!(%category, dropped = dropped.len(), "dropping matches touched by edit");
        }
        store.replace_category(category, survivors);

        ReconcileOutcome {
            skipped: false,
            dropped,
            shifted,
        }
    }

    /// Switch the editor to another category. Returns the previously focused
    /// category if it differs.
    pub fn focus_category(&mut self, category: &Category) -> Option<Category> {
        if self.focused.as_ref() == Some(category) {
            return None;
        }
        self.focused.replace(category.clone())
    }

    pub fn focused(&self) -> Option<&Category> {
        self.focused.as_ref()
    }

    pub fn skip_rate(&self, category: &Category) -> f64 {
        self.texts
            .get(category)
            .map(|t| t.detector.skip_rate())
            .unwrap_or(0.0)
    }

    pub fn clear(&mut self) {
        self.texts.clear();
        self.focused = None;
    }
}

// =============================================================================
// Tests
// =============================================================================
