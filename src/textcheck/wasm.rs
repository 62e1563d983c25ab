//! WASM bindings for the text-check overlay
//!
//! The host passes two Promise-returning callbacks (check, persist) and gets
//! a `TextCheckController`. An optional `onRender` callback receives the
//! names of categories whose marks changed.

use async_trait::async_trait;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, JsFuture};

use super::config::TextCheckConfig;
use super::driver::{TextCheckBackend, TextCheckDriver};
use super::error::TextCheckError;
use super::interaction::{Confirmation, DecisionOption};
use super::orchestrator::CheckOutcome;
use super::reconcile::TextEdit;
use super::response::{CheckRequest, CheckResponse};
use super::scope::IgnoreDecision;
use super::session::TextCheckSession;
use super::types::{Category, MatchId};

// =============================================================================
// JS backend
// =============================================================================

/// Backend calling into JS functions that return Promises (or plain values)
pub struct JsBackend {
    check_fn: js_sys::Function,
    persist_fn: js_sys::Function,
}

impl JsBackend {
    pub fn new(check_fn: js_sys::Function, persist_fn: js_sys::Function) -> Self {
        Self { check_fn, persist_fn }
    }

    async fn call(function: &js_sys::Function, arg: JsValue) -> Result<JsValue, JsValue> {
        let ret = function.call1(&JsValue::NULL, &arg)?;
        JsFuture::from(js_sys::Promise::resolve(&ret)).await
    }
}

fn describe(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

#[async_trait(?Send)]
impl TextCheckBackend for JsBackend {
    async fn check(&self, request: CheckRequest) -> Result<CheckResponse, TextCheckError> {
        let arg = serde_wasm_bindgen::to_value(&request)
            .map_err(|e| TextCheckError::CheckFailed(e.to_string()))?;
        let value = Self::call(&self.check_fn, arg)
            .await
            .map_err(|e| TextCheckError::CheckFailed(describe(&e)))?;
        serde_wasm_bindgen::from_value(value).map_err(|e| TextCheckError::MalformedResponse(e.to_string()))
    }

    async fn persist(&self, decision: IgnoreDecision) -> Result<(), TextCheckError> {
        let arg = serde_wasm_bindgen::to_value(&decision)
            .map_err(|e| TextCheckError::PersistFailed(e.to_string()))?;
        Self::call(&self.persist_fn, arg)
            .await
            .map(|_| ())
            .map_err(|e| TextCheckError::PersistFailed(describe(&e)))
    }
}

// =============================================================================
// Controller
// =============================================================================

type RenderCallback = Rc<RefCell<Option<js_sys::Function>>>;

#[wasm_bindgen]
pub struct TextCheckController {
    driver: Rc<TextCheckDriver<JsBackend>>,
    on_render: RenderCallback,
}

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&format!("Serialization failed: {}", e)))
}

fn err_to_js(err: TextCheckError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Hand pending render signals to the `onRender` callback, if one is set.
/// Without a callback the host polls `takeRenderSignals`.
fn notify(driver: &TextCheckDriver<JsBackend>, on_render: &RenderCallback) {
    let Some(callback) = on_render.borrow().clone() else {
        return;
    };
    let signals = driver.session_mut().take_render_signals();
    if signals.is_empty() {
        return;
    }
    let names: js_sys::Array = signals.iter().map(|c| JsValue::from_str(c.as_str())).collect();
    if let Err(e) = callback.call1(&JsValue::NULL, &names) {
        web_sys::console::error_1(&format!("[TextCheck] onRender failed: {:?}", e).into());
    }
}

#[wasm_bindgen]
impl TextCheckController {
    /// `config` may be undefined for defaults
    #[wasm_bindgen(constructor)]
    pub fn new(check_fn: js_sys::Function, persist_fn: js_sys::Function, config: JsValue) -> Result<TextCheckController, JsValue> {
        let config: TextCheckConfig = if config.is_undefined() || config.is_null() {
            TextCheckConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| JsValue::from_str(&format!("Failed to parse config: {}", e)))?
        };
        config.validate().map_err(err_to_js)?;

        Ok(Self {
            driver: Rc::new(TextCheckDriver::new(
                TextCheckSession::new(config),
                JsBackend::new(check_fn, persist_fn),
            )),
            on_render: Rc::new(RefCell::new(None)),
        })
    }

    #[wasm_bindgen(js_name = setOnRender)]
    pub fn set_on_render(&self, callback: Option<js_sys::Function>) {
        *self.on_render.borrow_mut() = callback;
    }

    #[wasm_bindgen(js_name = setDocument)]
    pub fn set_document(&self, document_id: Option<String>) {
        self.driver.session_mut().set_document(document_id);
        notify(&self.driver, &self.on_render);
    }

    /// Check `text` for `category`. Resolves to "applied", "stale" or "failed".
    #[wasm_bindgen(js_name = check)]
    pub fn check(&self, category: String, text: String) -> js_sys::Promise {
        let driver = Rc::clone(&self.driver);
        let on_render = Rc::clone(&self.on_render);

        future_to_promise(async move {
            let outcome = driver
                .run_check(&Category::new(category), &text)
                .await
                .map_err(err_to_js)?;
            notify(&driver, &on_render);

            let status = match outcome {
                CheckOutcome::Applied { .. } => "applied",
                CheckOutcome::Stale => "stale",
                CheckOutcome::Failed(err) => {
                    web_sys::console::error_1(&format!("[TextCheck] check failed: {}", err).into());
                    "failed"
                }
            };
            Ok(JsValue::from_str(status))
        })
    }

    /// Persist queued ignore decisions now
    #[wasm_bindgen(js_name = flush)]
    pub fn flush(&self) -> js_sys::Promise {
        let driver = Rc::clone(&self.driver);
        future_to_promise(async move {
            let flushed = driver.flush_decisions().await;
            Ok(JsValue::from_f64(flushed as f64))
        })
    }

    #[wasm_bindgen(js_name = syncText)]
    pub fn sync_text(&self, category: &str, text: &str) -> Result<JsValue, JsValue> {
        let outcome = self.driver.session_mut().sync_text(&Category::from(category), text);
        notify(&self.driver, &self.on_render);
        to_js(&outcome)
    }

    /// Editor replaced `[from, to)` (UTF-16 units) with `inserted`
    #[wasm_bindgen(js_name = applyEdit)]
    pub fn apply_edit(&self, category: &str, from: usize, to: usize, inserted: String) -> Result<JsValue, JsValue> {
        let edit = TextEdit { from, to, inserted };
        let outcome = self
            .driver
            .session_mut()
            .apply_edit(&Category::from(category), &edit)
            .map_err(err_to_js)?;
        notify(&self.driver, &self.on_render);
        to_js(&outcome)
    }

    #[wasm_bindgen(js_name = focusCategory)]
    pub fn focus_category(&self, category: &str) {
        self.driver.session_mut().focus_category(&Category::from(category));
    }

    #[wasm_bindgen(js_name = marks)]
    pub fn marks(&self, category: &str) -> Result<JsValue, JsValue> {
        to_js(&self.driver.session().marks(&Category::from(category)))
    }

    #[wasm_bindgen(js_name = isBusy)]
    pub fn is_busy(&self, category: &str) -> bool {
        self.driver.session().is_busy(&Category::from(category))
    }

    /// Open the decision surface for a clicked mark
    #[wasm_bindgen(js_name = handleMarkClick)]
    pub fn handle_mark_click(&self, category: &str, match_id: u32) -> Result<JsValue, JsValue> {
        let surface = self
            .driver
            .session_mut()
            .handle_mark_click(MatchId(match_id), &Category::from(category))
            .map_err(err_to_js)?;
        to_js(&surface)
    }

    /// Confirm an option such as `{ kind: "ignoreOnce" }`. Ignore decisions
    /// are applied at once and persisted in the background; a replacement is
    /// returned for the editor to perform.
    #[wasm_bindgen(js_name = confirm)]
    pub fn confirm(&self, option: JsValue) -> Result<JsValue, JsValue> {
        let option: DecisionOption = serde_wasm_bindgen::from_value(option)
            .map_err(|e| JsValue::from_str(&format!("Failed to parse option: {}", e)))?;

        let confirmation = self.driver.session_mut().confirm(&option).map_err(err_to_js)?;

        if let Confirmation::Decision(_) = &confirmation {
            notify(&self.driver, &self.on_render);
            let driver = Rc::clone(&self.driver);
            wasm_bindgen_futures::spawn_local(async move {
                driver.flush_decisions().await;
            });
        }
        to_js(&confirmation)
    }

    /// Close the decision surface without changing anything
    #[wasm_bindgen(js_name = cancel)]
    pub fn cancel(&self) -> bool {
        self.driver.session_mut().cancel_decision()
    }

    #[wasm_bindgen(js_name = takeRenderSignals)]
    pub fn take_render_signals(&self) -> Result<JsValue, JsValue> {
        to_js(&self.driver.session_mut().take_render_signals())
    }

    #[wasm_bindgen(js_name = takeNotices)]
    pub fn take_notices(&self) -> Result<JsValue, JsValue> {
        to_js(&self.driver.session_mut().take_notices())
    }

    #[wasm_bindgen(js_name = stats)]
    pub fn stats(&self) -> Result<JsValue, JsValue> {
        to_js(self.driver.session().stats())
    }
}
