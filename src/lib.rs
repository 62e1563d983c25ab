//! textcheck-core: Text-Check Overlay for the documentation editor
//!
//! A Rust/WASM implementation of the overlay that keeps spelling and grammar
//! flags aligned with live editor content and applies tiered ignore decisions.
//!
//! # Architecture
//!
//! ## Core Components
//! - `store.rs` - MatchStore: per-category snapshots, atomic replacement, render signals
//! - `scope.rs` - Ignore scope resolver (once / document / global, and their inverses)
//! - `reconcile.rs` - MarkReconciler: re-anchors matches after edits without a re-check
//! - `orchestrator.rs` - CheckOrchestrator: busy flag, stale-response discard, cancellation
//! - `interaction.rs` - InteractionController: decision surface for a clicked mark
//! - `session.rs` - TextCheckSession: one open documentation unit, outbox and notices
//! - `driver.rs` - TextCheckDriver: async check cycle and persistence against a backend
//!
//! ## Wire Components
//! - `response.rs` - Check request/response types
//! - `annotated.rs` - `<text-check>` marker parsing for responses without offsets
//! - `change.rs` - ChangeDetector: content-addressable skip detection
//!
//! # Usage (WASM)
//! ```javascript,ignore
//! import init, { TextCheckController } from 'textcheck-core';
//!
//! await init();
//!
//! const controller = new TextCheckController(
//!   (request) => api.check(request),        // { documentId, category, text }
//!   (decision) => api.persist(decision),    // { scope, action, word, documentId }
//!   { maxTextLength: 100000 },
//! );
//! controller.setOnRender((categories) => categories.forEach(redraw));
//! controller.setDocument('KORE600500000');
//!
//! await controller.check('headnote', editor.getText());
//! const surface = controller.handleMarkClick('headnote', 1);
//! controller.confirm({ kind: 'ignoreOnce' });
//! ```

pub mod textcheck;

// Public exports
pub use textcheck::*;

use wasm_bindgen::prelude::*;

// When the `wee_alloc` feature is enabled, use `wee_alloc` as the global
// allocator for smaller WASM bundle size.
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Get version information
#[wasm_bindgen]
pub fn version() -> String {
    format!("textcheck-core v{}", env!("CARGO_PKG_VERSION"))
}
