//! TextCheckSession: the overlay state for one open documentation unit
//!
//! Owns the store, reconciler, orchestrator and interaction controller, the
//! outbox of ignore decisions waiting to be persisted, and the notices the UI
//! has not shown yet. All methods are synchronous; the async boundary lives
//! in the driver.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use super::config::TextCheckConfig;
use super::error::TextCheckError;
use super::interaction::{Confirmation, DecisionOption, DecisionSurface, InteractionController};
use super::orchestrator::{CheckOrchestrator, CheckOutcome, CheckStats, CheckTicket};
use super::reconcile::{MarkReconciler, ReconcileOutcome, TextEdit};
use super::response::CheckResponse;
use super::scope::IgnoreDecision;
use super::store::MatchStore;
use super::types::{Category, Match, MatchId, RenderedMark};

// =============================================================================
// Notices
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Transient, user-visible message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    /// RFC 3339 timestamp
    pub at: String,
}

impl Notice {
    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

// =============================================================================
// TextCheckSession
// =============================================================================

pub struct TextCheckSession {
    config: TextCheckConfig,
    document_id: Option<String>,
    store: MatchStore,
    reconciler: MarkReconciler,
    orchestrator: CheckOrchestrator,
    interaction: InteractionController,
    outbox: VecDeque<IgnoreDecision>,
    /// Decisions a response still in flight may not reflect yet
    unsettled: Vec<(u64, IgnoreDecision)>,
    decision_seq: u64,
    /// Decision sequence at the start of each category's current check
    in_flight: HashMap<Category, u64>,
    notices: Vec<Notice>,
}

impl Default for TextCheckSession {
    fn default() -> Self {
        Self::new(TextCheckConfig::default())
    }
}

impl TextCheckSession {
    pub fn new(config: TextCheckConfig) -> Self {
        Self {
            reconciler: MarkReconciler::new(config.skip_unchanged_sync),
            config,
            document_id: None,
            store: MatchStore::new(),
            orchestrator: CheckOrchestrator::new(),
            interaction: InteractionController::new(),
            outbox: VecDeque::new(),
            unsettled: Vec::new(),
            decision_seq: 0,
            in_flight: HashMap::new(),
            notices: Vec::new(),
        }
    }

    pub fn config(&self) -> &TextCheckConfig {
        &self.config
    }

    pub fn document_id(&self) -> Option<&str> {
        self.document_id.as_deref()
    }

    /// Open another documentation unit. In-flight checks for the previous one
    /// are discarded and its matches cleared; queued decisions still persist.
    pub fn set_document(&mut self, document_id: Option<String>) {
        if self.document_id == document_id {
            return;
        }
        tracing::info!(document = ?document_id, "switching text-check document");
        self.document_id = document_id;
        self.orchestrator.reset();
        self.in_flight.clear();
        self.unsettled.clear();
        self.store.clear_all();
        self.reconciler.clear();
        self.interaction.cancel();
    }

    // -------------------------------------------------------------------------
    // Check cycle
    // -------------------------------------------------------------------------

    /// Start a check of `text` for `category`
    pub fn begin_check(&mut self, category: &Category, text: &str) -> Result<CheckTicket, TextCheckError> {
        if !self.config.accepts_category(category) {
            return Err(TextCheckError::InvalidConfig(format!("unknown category {}", category)));
        }
        let len = text.encode_utf16().count();
        if len > self.config.max_text_length {
            return Err(TextCheckError::TextTooLong {
                len,
                max: self.config.max_text_length,
            });
        }

        // Matches from a previous cycle must follow the text being sent
        self.reconciler.sync_text(&mut self.store, category, text);
        let ticket = self.orchestrator.begin(category, text, self.document_id.as_deref());
        self.in_flight.insert(category.clone(), self.decision_seq);
        Ok(ticket)
    }

    /// Apply a check result. A fresh snapshot closes a decision surface open
    /// on that category, and decisions confirmed after the request started
    /// are applied on top of it.
    pub fn finish_check(
        &mut self,
        ticket: &CheckTicket,
        response: Result<CheckResponse, TextCheckError>,
    ) -> CheckOutcome {
        let outcome = self
            .orchestrator
            .finish(ticket, response, &mut self.store, &mut self.reconciler);

        match &outcome {
            CheckOutcome::Applied { .. } => {
                let started_at = self.in_flight.remove(&ticket.category).unwrap_or(self.decision_seq);
                if self
                    .interaction
                    .surface()
                    .is_some_and(|surface| surface.category == ticket.category)
                {
                    self.interaction.cancel();
                }
                self.reapply_unsettled(started_at);
                self.prune_unsettled();
            }
            CheckOutcome::Failed(err) => {
                self.in_flight.remove(&ticket.category);
                self.prune_unsettled();
                self.notices.push(Notice::new(
                    NoticeLevel::Error,
                    format!("Text check failed: {}", err),
                ));
            }
            CheckOutcome::Stale => {}
        }
        outcome
    }

    fn reapply_unsettled(&mut self, started_at: u64) {
        let decisions: Vec<IgnoreDecision> = self
            .unsettled
            .iter()
            .filter(|(seq, _)| *seq > started_at)
            .map(|(_, decision)| decision.clone())
            .collect();

        for decision in decisions {
            match decision.rebased(&self.store) {
                Some(decision) => {
                    self.store.apply_ignore_decision(&decision);
                }
                None => {
                    tracing::debug!(word = %decision.word, "once decision lost its match in the new snapshot");
                }
            }
        }
    }

    /// Keep only decisions some in-flight check has not seen yet
    fn prune_unsettled(&mut self) {
        match self.in_flight.values().min() {
            Some(&oldest) => self.unsettled.retain(|(seq, _)| *seq > oldest),
            None => self.unsettled.clear(),
        }
    }

    /// Whether `ticket` may still change the store
    pub fn is_current(&self, ticket: &CheckTicket) -> bool {
        self.orchestrator.is_current(ticket)
    }

    pub fn is_busy(&self, category: &Category) -> bool {
        self.orchestrator.is_busy(category)
    }

    pub fn stats(&self) -> &CheckStats {
        self.orchestrator.stats()
    }

    // -------------------------------------------------------------------------
    // Editing
    // -------------------------------------------------------------------------

    pub fn sync_text(&mut self, category: &Category, text: &str) -> ReconcileOutcome {
        self.reconciler.sync_text(&mut self.store, category, text)
    }

    pub fn apply_edit(&mut self, category: &Category, edit: &TextEdit) -> Result<ReconcileOutcome, TextCheckError> {
        self.reconciler.apply_edit(&mut self.store, category, edit)
    }

    /// Editor moved to another text field. An in-flight check of the field
    /// being left is discarded.
    pub fn focus_category(&mut self, category: &Category) {
        if let Some(previous) = self.reconciler.focus_category(category) {
            self.orchestrator.cancel(&previous);
            self.in_flight.remove(&previous);
            self.prune_unsettled();
            if self
                .interaction
                .surface()
                .is_some_and(|surface| surface.category == previous)
            {
                self.interaction.cancel();
            }
        }
    }

    pub fn focused_category(&self) -> Option<&Category> {
        self.reconciler.focused()
    }

    // -------------------------------------------------------------------------
    // Store access
    // -------------------------------------------------------------------------

    pub fn matches(&self, category: &Category) -> &[Match] {
        self.store.matches(category)
    }

    pub fn marks(&self, category: &Category) -> Vec<RenderedMark> {
        self.store.marks(category)
    }

    /// Replace a category snapshot directly (e.g. restoring saved matches)
    pub fn replace_category(&mut self, category: &Category, matches: Vec<Match>, text: &str) {
        self.store.replace_category(category, matches);
        self.reconciler.set_base_text(category, text);
    }

    pub fn revision(&self) -> u64 {
        self.store.revision()
    }

    pub fn take_render_signals(&mut self) -> Vec<Category> {
        self.store.take_render_signals()
    }

    // -------------------------------------------------------------------------
    // Decisions
    // -------------------------------------------------------------------------

    pub fn handle_mark_click(&mut self, match_id: MatchId, category: &Category) -> Result<DecisionSurface, TextCheckError> {
        self.interaction
            .handle_mark_click(&self.store, match_id, category)
            .cloned()
    }

    /// Confirm an option. Ignore decisions are applied locally right away and
    /// queued for persistence; replacements are returned for the editor.
    pub fn confirm(&mut self, option: &DecisionOption) -> Result<Confirmation, TextCheckError> {
        let confirmation = self
            .interaction
            .confirm(&self.store, option, self.document_id.as_deref())?;

        if let Confirmation::Decision(decision) = &confirmation {
            self.apply_decision(decision.clone());
        }
        Ok(confirmation)
    }

    pub fn cancel_decision(&mut self) -> bool {
        self.interaction.cancel()
    }

    pub fn decision_surface(&self) -> Option<&DecisionSurface> {
        self.interaction.surface()
    }

    /// Apply locally and queue for persistence. No-op decisions are still
    /// persisted so the backend converges with what the user asked for.
    pub fn apply_decision(&mut self, decision: IgnoreDecision) -> usize {
        let affected = self.store.apply_ignore_decision(&decision);
        if !self.in_flight.is_empty() {
            self.decision_seq += 1;
            self.unsettled.push((self.decision_seq, decision.clone()));
        }
        self.outbox.push_back(decision);
        affected
    }

    pub fn next_pending_decision(&mut self) -> Option<IgnoreDecision> {
        self.outbox.pop_front()
    }

    pub fn pending_decisions(&self) -> usize {
        self.outbox.len()
    }

    /// Record the persistence result. Local state is kept either way.
    pub fn report_persisted(&mut self, decision: &IgnoreDecision, result: Result<(), TextCheckError>) {
        if let Err(err) = result {
            tracing::warn!(scope = decision.scope_name(), word = %decision.word, error = %err, "ignore decision not saved");
            self.notices.push(Notice::new(
                NoticeLevel::Warning,
                format!(
                    "Could not save ignore decision for \"{}\"; it may be lost on reload ({})",
                    decision.word, err
                ),
            ));
        }
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}

// =============================================================================
// Tests
// =============================================================================
