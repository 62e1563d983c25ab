//! Interaction Controller: decision surface for a clicked mark
//!
//! # Design Principles
//! 1. State machine: Idle → DecisionOpen → Idle
//! 2. Options are filtered by the clicked match's current ignore state
//! 3. Cancelling never mutates anything

use serde::{Deserialize, Serialize};

use super::error::TextCheckError;
use super::reconcile::TextEdit;
use super::scope::{IgnoreAction, IgnoreDecision};
use super::store::MatchStore;
use super::types::{Category, IgnoreState, Match, MatchId};

// =============================================================================
// Types
// =============================================================================

/// One choice on the decision surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DecisionOption {
    IgnoreOnce,
    UnignoreOnce,
    IgnoreInDocument,
    RemoveFromDocument,
    AddToDictionary,
    RemoveFromDictionary,
    /// Replace the flagged span with a suggestion
    Replace { index: usize, text: String },
}

/// What the editor shows after a mark click
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionSurface {
    pub category: Category,
    pub match_id: MatchId,
    pub word: String,
    pub message: String,
    pub short_message: String,
    pub state: IgnoreState,
    pub options: Vec<DecisionOption>,
}

/// Result of confirming an option
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Confirmation {
    /// Apply to the store and persist
    Decision(IgnoreDecision),
    /// Hand to the editor; the resulting edit comes back through the reconciler
    Replace { category: Category, edit: TextEdit },
}

/// Options offered for a match in its current state
pub fn options_for(m: &Match) -> Vec<DecisionOption> {
    let mut options = match m.ignore_state {
        IgnoreState::None => vec![
            DecisionOption::IgnoreOnce,
            DecisionOption::IgnoreInDocument,
            DecisionOption::AddToDictionary,
        ],
        IgnoreState::IgnoredOnce => vec![
            DecisionOption::UnignoreOnce,
            DecisionOption::IgnoreInDocument,
            DecisionOption::AddToDictionary,
        ],
        IgnoreState::IgnoredInDocument => vec![DecisionOption::RemoveFromDocument],
        IgnoreState::IgnoredGlobally if m.locked => Vec::new(),
        IgnoreState::IgnoredGlobally => vec![DecisionOption::RemoveFromDictionary],
    };

    if m.ignore_state.allows_ignore_once() {
        options.extend(
            m.replacements
                .iter()
                .enumerate()
                .map(|(index, text)| DecisionOption::Replace { index, text: text.clone() }),
        );
    }

    options
}

// =============================================================================
// InteractionController
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum State {
    Idle,
    DecisionOpen(DecisionSurface),
}

#[derive(Debug)]
pub struct InteractionController {
    state: State,
}

impl Default for InteractionController {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionController {
    pub fn new() -> Self {
        Self { state: State::Idle }
    }

    /// Open the decision surface for a clicked mark. A click while another
    /// surface is open replaces it. A mark that is no longer in the store
    /// leaves the controller idle.
    pub fn handle_mark_click(
        &mut self,
        store: &MatchStore,
        match_id: MatchId,
        category: &Category,
    ) -> Result<&DecisionSurface, TextCheckError> {
        let Some(m) = store.get(category, match_id) else {
            self.state = State::Idle;
            return Err(TextCheckError::MatchNotFound {
                category: category.clone(),
                match_id,
            });
        };

        self.state = State::DecisionOpen(DecisionSurface {
            category: category.clone(),
            match_id,
            word: m.word.clone(),
            message: m.message.clone(),
            short_message: m.short_message.clone(),
            state: m.ignore_state,
            options: options_for(m),
        });

        match &self.state {
            State::DecisionOpen(surface) => Ok(surface),
            State::Idle => Err(TextCheckError::NoDecisionOpen),
        }
    }

    /// Confirm one of the offered options and close the surface.
    /// An option that was not offered is rejected and the surface stays open.
    pub fn confirm(
        &mut self,
        store: &MatchStore,
        option: &DecisionOption,
        document_id: Option<&str>,
    ) -> Result<Confirmation, TextCheckError> {
        let State::DecisionOpen(surface) = &self.state else {
            return Err(TextCheckError::NoDecisionOpen);
        };
        if !surface.options.contains(option) {
            return Err(TextCheckError::OptionNotOffered(format!("{:?}", option)));
        }

        let category = surface.category.clone();
        let match_id = surface.match_id;
        let word = surface.word.clone();
        self.state = State::Idle;

        // The mark may have been reconciled away while the surface was open,
        // or its id reused for another word by a newer snapshot
        let m = store
            .get(&category, match_id)
            .filter(|m| m.word == word)
            .ok_or_else(|| TextCheckError::MatchNotFound {
                category: category.clone(),
                match_id,
            })?;

        let document_id = document_id.map(str::to_string);
        let confirmation = match option {
            DecisionOption::IgnoreOnce => {
                Confirmation::Decision(IgnoreDecision::once(m, IgnoreAction::Ignore, document_id))
            }
            DecisionOption::UnignoreOnce => {
                Confirmation::Decision(IgnoreDecision::once(m, IgnoreAction::Unignore, document_id))
            }
            DecisionOption::IgnoreInDocument => Confirmation::Decision(IgnoreDecision::document(
                &m.word,
                IgnoreAction::Ignore,
                document_id,
            )),
            DecisionOption::RemoveFromDocument => Confirmation::Decision(IgnoreDecision::document(
                &m.word,
                IgnoreAction::Unignore,
                document_id,
            )),
            DecisionOption::AddToDictionary => {
                Confirmation::Decision(IgnoreDecision::global(&m.word, IgnoreAction::Ignore))
            }
            DecisionOption::RemoveFromDictionary => {
                Confirmation::Decision(IgnoreDecision::global(&m.word, IgnoreAction::Unignore))
            }
            DecisionOption::Replace { text, .. } => Confirmation::Replace {
                category,
                edit: TextEdit {
                    from: m.offset,
                    to: m.end(),
                    inserted: text.clone(),
                },
            },
        };

        Ok(confirmation)
    }

    /// Escape or click elsewhere. Returns whether a surface was open.
    pub fn cancel(&mut self) -> bool {
        let was_open = self.is_open();
        self.state = State::Idle;
        was_open
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, State::DecisionOpen(_))
    }

    pub fn surface(&self) -> Option<&DecisionSurface> {
        match &self.state {
            State::DecisionOpen(surface) => Some(surface),
            State::Idle => None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
