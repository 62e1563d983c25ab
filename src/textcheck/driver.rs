//! Async driver: runs check cycles and persistence against a backend
//!
//! Single-threaded. The session sits in an `Rc<RefCell<..>>` and is never
//! borrowed across an await point. Queued ignore decisions are flushed before
//! every check request goes out; the persist gate makes a check wait for a
//! flush already in progress.

use async_trait::async_trait;
use futures::lock::Mutex;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use super::error::TextCheckError;
use super::orchestrator::CheckOutcome;
use super::response::{CheckRequest, CheckResponse};
use super::scope::IgnoreDecision;
use super::session::TextCheckSession;
use super::types::Category;

/// The two external calls the overlay makes
#[async_trait(?Send)]
pub trait TextCheckBackend {
    /// Analyse plain text and report flagged spans
    async fn check(&self, request: CheckRequest) -> Result<CheckResponse, TextCheckError>;

    /// Store an ignore decision (or its inverse)
    async fn persist(&self, decision: IgnoreDecision) -> Result<(), TextCheckError>;
}

pub struct TextCheckDriver<B> {
    session: Rc<RefCell<TextCheckSession>>,
    backend: B,
    persist_gate: Mutex<()>,
}

impl<B: TextCheckBackend> TextCheckDriver<B> {
    pub fn new(session: TextCheckSession, backend: B) -> Self {
        Self {
            session: Rc::new(RefCell::new(session)),
            backend,
            persist_gate: Mutex::new(()),
        }
    }

    pub fn session(&self) -> Ref<'_, TextCheckSession> {
        self.session.borrow()
    }

    pub fn session_mut(&self) -> RefMut<'_, TextCheckSession> {
        self.session.borrow_mut()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Persist every queued decision in order. Returns how many were sent.
    pub async fn flush_decisions(&self) -> usize {
        let _gate = self.persist_gate.lock().await;

        let mut flushed = 0;
        loop {
            let next = self.session.borrow_mut().next_pending_decision();
            let Some(decision) = next else {
                break;
            };
            let result = self.backend.persist(decision.clone()).await;
            self.session.borrow_mut().report_persisted(&decision, result);
            flushed += 1;
        }

        if flushed > 0 {
            tracing::debug!(flushed, "ignore decisions persisted");
        }
        flushed
    }

    /// Run one check cycle for `category`.
    ///
    /// The ticket is taken before anything is awaited, so request order is
    /// call order. A ticket superseded while decisions were flushing is not
    /// sent at all.
    pub async fn run_check(&self, category: &Category, text: &str) -> Result<CheckOutcome, TextCheckError> {
        let ticket = self.session.borrow_mut().begin_check(category, text)?;

        self.flush_decisions().await;

        if !self.session.borrow().is_current(&ticket) {
            tracing::debug!(%category, generation = ticket.generation, "check superseded before sending");
            return Ok(CheckOutcome::Stale);
        }

        let response = self.backend.check(ticket.request()).await;
        let outcome = self.session.borrow_mut().finish_check(&ticket, response);
        Ok(outcome)
    }
}

// =============================================================================
// Tests
// =============================================================================
