//! Ignore Scope Resolver
//!
//! Translates a user decision into the exact set of affected matches.
//! Resolution is a pure function of the store contents and the decision, so
//! applying the same decision twice yields an empty second resolution.
//!
//! Scope precedence: global > document > once. A broader state is never
//! downgraded by a narrower forward decision, and undoing a document or
//! global decision returns matches to `None` (not to a previous once-state).

use serde::{Deserialize, Serialize};

use super::store::MatchStore;
use super::types::{Category, IgnoreState, Match, MatchId};

// =============================================================================
// Types
// =============================================================================

/// Breadth of a "stop flagging this" decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "camelCase")]
pub enum IgnoreScope {
    /// Exactly one occurrence, anchored by its UTF-16 span so it can be
    /// found again after a re-check renumbers the matches
    Once {
        category: Category,
        #[serde(rename = "matchId")]
        match_id: MatchId,
        offset: usize,
        length: usize,
    },
    /// Every occurrence of the word in this documentation unit
    Document { word: String },
    /// Every occurrence of the word everywhere (dictionary)
    Global { word: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IgnoreAction {
    Ignore,
    Unignore,
}

/// A confirmed user decision, applied locally and queued for persistence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnoreDecision {
    pub scope: IgnoreScope,
    pub action: IgnoreAction,
    pub word: String,
    pub document_id: Option<String>,
}

impl IgnoreDecision {
    pub fn once(m: &Match, action: IgnoreAction, document_id: Option<String>) -> Self {
        Self {
            scope: IgnoreScope::Once {
                category: m.category.clone(),
                match_id: m.id,
                offset: m.offset,
                length: m.length,
            },
            action,
            word: m.word.clone(),
            document_id,
        }
    }

    pub fn document(word: &str, action: IgnoreAction, document_id: Option<String>) -> Self {
        Self {
            scope: IgnoreScope::Document { word: word.to_string() },
            action,
            word: word.to_string(),
            document_id,
        }
    }

    /// Global decisions are keyed by word only
    pub fn global(word: &str, action: IgnoreAction) -> Self {
        Self {
            scope: IgnoreScope::Global { word: word.to_string() },
            action,
            word: word.to_string(),
            document_id: None,
        }
    }

    /// Point a once decision at whatever match now sits on its anchor.
    /// Returns `None` if no match of the same word is there any more.
    /// Document and global decisions are word-keyed and come back unchanged.
    pub fn rebased(&self, store: &MatchStore) -> Option<IgnoreDecision> {
        let IgnoreScope::Once { category, offset, length, .. } = &self.scope else {
            return Some(self.clone());
        };
        store
            .matches(category)
            .iter()
            .find(|m| m.offset == *offset && m.length == *length && m.word == self.word)
            .map(|m| IgnoreDecision::once(m, self.action, self.document_id.clone()))
    }

    pub fn scope_name(&self) -> &'static str {
        match self.scope {
            IgnoreScope::Once { .. } => "once",
            IgnoreScope::Document { .. } => "document",
            IgnoreScope::Global { .. } => "global",
        }
    }
}

/// One match whose ignore state changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub category: Category,
    pub match_id: MatchId,
    pub from: IgnoreState,
    pub to: IgnoreState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub changes: Vec<StateChange>,
}

impl Resolution {
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// New state for `m` under `decision`, or `None` if unaffected
fn target_state(m: &Match, decision: &IgnoreDecision) -> Option<IgnoreState> {
    let state = m.ignore_state;
    let action = decision.action;

    match &decision.scope {
        IgnoreScope::Once { category, match_id, .. } => {
            if &m.category != category || m.id != *match_id || m.word != decision.word {
                return None;
            }
            match (action, state) {
                (IgnoreAction::Ignore, IgnoreState::None) => Some(IgnoreState::IgnoredOnce),
                (IgnoreAction::Unignore, IgnoreState::IgnoredOnce) => Some(IgnoreState::None),
                _ => None,
            }
        }
        IgnoreScope::Document { word } => {
            if &m.word != word {
                return None;
            }
            match (action, state) {
                (IgnoreAction::Ignore, IgnoreState::None | IgnoreState::IgnoredOnce) => {
                    Some(IgnoreState::IgnoredInDocument)
                }
                (IgnoreAction::Unignore, IgnoreState::IgnoredInDocument) => Some(IgnoreState::None),
                _ => None,
            }
        }
        IgnoreScope::Global { word } => {
            if &m.word != word {
                return None;
            }
            match (action, state) {
                (IgnoreAction::Ignore, IgnoreState::IgnoredGlobally) => None,
                (IgnoreAction::Ignore, _) => Some(IgnoreState::IgnoredGlobally),
                (IgnoreAction::Unignore, IgnoreState::IgnoredGlobally) if !m.locked => {
                    Some(IgnoreState::None)
                }
                _ => None,
            }
        }
    }
}

/// Compute the affected matches. Once scope touches only its own category;
/// document and global scope fan out across every loaded category.
pub fn resolve(store: &MatchStore, decision: &IgnoreDecision) -> Resolution {
    let candidates: Box<dyn Iterator<Item = &Match>> = match &decision.scope {
        IgnoreScope::Once { category, .. } => Box::new(store.matches(category).iter()),
        IgnoreScope::Document { .. } | IgnoreScope::Global { .. } => Box::new(store.all_matches()),
    };

    let changes = candidates
        .filter_map(|m| {
            target_state(m, decision).map(|to| StateChange {
                category: m.category.clone(),
                match_id: m.id,
                from: m.ignore_state,
                to,
            })
        })
        .collect();

    Resolution { changes }
}

// =============================================================================
// Tests
// =============================================================================
