//! Check Orchestrator: one check cycle per category
//!
//! Every request gets a ticket carrying the category's generation and the
//! document epoch. Only the ticket of the most recently requested check for a
//! category, issued in the current document, may change the store; anything
//! else arriving later is stale and discarded.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::annotated::AnnotatedHtmlParser;
use super::error::TextCheckError;
use super::reconcile::MarkReconciler;
use super::response::{CheckRequest, CheckResponse};
use super::store::MatchStore;
use super::types::Category;

// =============================================================================
// Types
// =============================================================================

/// Handle for one in-flight check
#[derive(Debug, Clone)]
pub struct CheckTicket {
    pub category: Category,
    pub generation: u64,
    pub epoch: u64,
    /// Text the response offsets refer to
    pub text: String,
    pub document_id: Option<String>,
    started: instant::Instant,
}

impl CheckTicket {
    pub fn request(&self) -> CheckRequest {
        CheckRequest {
            document_id: self.document_id.clone(),
            category: self.category.clone(),
            text: self.text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// Snapshot replaced with this many matches
    Applied { matches: usize },
    /// A newer request or document superseded this one
    Stale,
    /// Previous snapshot kept
    Failed(TextCheckError),
}

/// Aggregate statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckStats {
    pub checks_started: u64,
    pub checks_applied: u64,
    pub stale_discarded: u64,
    pub failures: u64,
    pub last_duration_us: u64,
    pub last_match_count: usize,
}

#[derive(Debug, Default)]
struct CheckSlot {
    generation: u64,
    busy: bool,
}

// =============================================================================
// CheckOrchestrator
// =============================================================================

pub struct CheckOrchestrator {
    slots: HashMap<Category, CheckSlot>,
    epoch: u64,
    parser: AnnotatedHtmlParser,
    stats: CheckStats,
}

impl Default for CheckOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckOrchestrator {
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
            epoch: 0,
            parser: AnnotatedHtmlParser::new(),
            stats: CheckStats::default(),
        }
    }

    /// Start a check: supersedes any in-flight check of the category
    pub fn begin(&mut self, category: &Category, text: &str, document_id: Option<&str>) -> CheckTicket {
        let slot = self.slots.entry(category.clone()).or_default();
        slot.generation += 1;
        slot.busy = true;
        self.stats.checks_started += 1;

        tracing::debug!(%category, generation = slot.generation, "check started");

        CheckTicket {
            category: category.clone(),
            generation: slot.generation,
            epoch: self.epoch,
            text: text.to_string(),
            document_id: document_id.map(str::to_string),
            started: instant::Instant::now(),
        }
    }

    pub fn is_current(&self, ticket: &CheckTicket) -> bool {
        ticket.epoch == self.epoch
            && self
                .slots
                .get(&ticket.category)
                .is_some_and(|slot| slot.generation == ticket.generation)
    }

    /// Finish a check. Applied results replace the category snapshot and are
    /// then reconciled against edits made while the request was in flight.
    pub fn finish(
        &mut self,
        ticket: &CheckTicket,
        response: Result<CheckResponse, TextCheckError>,
        store: &mut MatchStore,
        reconciler: &mut MarkReconciler,
    ) -> CheckOutcome {
        if !self.is_current(ticket) {
            self.stats.stale_discarded += 1;
            tracing::debug!(category = %ticket.category, generation = ticket.generation, "discarding stale check response");
            return CheckOutcome::Stale;
        }

        if let Some(slot) = self.slots.get_mut(&ticket.category) {
            slot.busy = false;
        }
        self.stats.last_duration_us = ticket.started.elapsed().as_micros() as u64;

        let matches = response
            .and_then(|resp| resp.into_matches(&ticket.category, &ticket.text, &self.parser));

        let matches = match matches {
            Ok(matches) => matches,
            Err(err) => {
                self.stats.failures += 1;
                tracing::warn!(category = %ticket.category, error = %err, "check failed, keeping previous snapshot");
                return CheckOutcome::Failed(err);
            }
        };

        let count = matches.len();
        let live_text = reconciler.text(&ticket.category);

        store.replace_category(&ticket.category, matches);
        reconciler.set_base_text(&ticket.category, &ticket.text);
        if let Some(live) = live_text.filter(|live| live != &ticket.text) {
            reconciler.sync_text_inner(store, &ticket.category, &live, false);
        }

        self.stats.checks_applied += 1;
        self.stats.last_match_count = count;
        CheckOutcome::Applied { matches: count }
    }

    /// Discard whatever is in flight for a category
    pub fn cancel(&mut self, category: &Category) {
        if let Some(slot) = self.slots.get_mut(category) {
            slot.generation += 1;
            slot.busy = false;
        }
    }

    /// Discard everything in flight (document switch)
    pub fn reset(&mut self) {
        self.epoch += 1;
        for slot in self.slots.values_mut() {
            slot.busy = false;
        }
    }

    pub fn is_busy(&self, category: &Category) -> bool {
        self.slots.get(category).is_some_and(|slot| slot.busy)
    }

    pub fn stats(&self) -> &CheckStats {
        &self.stats
    }
}

// =============================================================================
// Tests
// =============================================================================
