#![forbid(unsafe_code)]

//! Submission controller: validate, project, dispatch, then report.
//!
//! # State Machine
//!
//! ```text
//!   Idle ──submit()──► Validating ──invalid──► Blocked
//!                          │
//!                          └──valid──► Submitting ──resolve(Ok)──► Succeeded ──► Idle
//!                                           │
//!                                           └──resolve(Err)──► Failed ──► Idle
//! ```
//!
//! `Blocked` is a resting state: the next `submit()` validates again.
//! While `Submitting`, further `submit()` calls are dropped (single-flight).
//! There is no retry and no timeout; the data source owns both.
//!
//! # Failure Modes
//!
//! | Scenario                        | Behavior                                  |
//! |---------------------------------|-------------------------------------------|
//! | Field or cross-field error      | `Blocked(Invalid)`, nothing dispatched    |
//! | Required list empty             | `Blocked(EmptyCollection)`                |
//! | Second submit while in flight   | `Dropped`, nothing dispatched             |
//! | Data source error               | Error banner, values kept, back to `Idle` |
//! | Response for an unknown token   | Ignored, logged at `warn`                 |

use std::fmt;
use std::rc::Rc;

use painel_runtime::{FetchCoordinator, FetchToken, Refresh};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, info_span, warn};

use crate::collaborators::DataSource;
use crate::error::{BlockReason, FetchError};
use crate::form::Form;
use crate::projection::FormProjection;

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitStatus {
    /// Ready to submit.
    #[default]
    Idle,
    /// Running validation.
    Validating,
    /// Validation failed; waiting for the user.
    Blocked,
    /// A request is in flight.
    Submitting,
    /// The request succeeded (transient).
    Succeeded,
    /// The request failed (transient).
    Failed,
}

/// Outcome of one `submit()` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitAttempt {
    /// A request was issued with this token.
    Dispatched(FetchToken),
    /// Validation blocked the submit.
    Blocked(BlockReason),
    /// A request was already in flight; nothing issued.
    Dropped,
}

/// Whether the controller creates or updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitMode {
    /// `DataSource::create`.
    Create,
    /// `DataSource::update` on this id.
    Update(String),
}

impl fmt::Display for SubmitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("create"),
            Self::Update(id) => write!(f, "update({id})"),
        }
    }
}

/// Kind of a user-visible banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BannerKind {
    /// Operation succeeded.
    Success,
    /// Operation failed.
    Error,
}

/// A user-visible message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Banner {
    /// Kind.
    pub kind: BannerKind,
    /// Text.
    pub message: String,
}

impl Banner {
    /// Success banner.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: BannerKind::Success,
            message: message.into(),
        }
    }

    /// Error banner.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: BannerKind::Error,
            message: message.into(),
        }
    }

    /// Whether this is an error banner.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.kind == BannerKind::Error
    }
}

/// Configuration for [`SubmissionController`].
///
/// Defaults:
/// - success_message: "Saved successfully."
/// - failure_prefix: "Could not save"
#[derive(Debug, Clone)]
pub struct SubmitConfig {
    /// Banner text on success.
    pub success_message: String,
    /// Prefix of the banner text on failure.
    pub failure_prefix: String,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            success_message: "Saved successfully.".to_string(),
            failure_prefix: "Could not save".to_string(),
        }
    }
}

impl SubmitConfig {
    /// Set the success banner text.
    #[must_use]
    pub fn success_message(mut self, message: impl Into<String>) -> Self {
        self.success_message = message.into();
        self
    }

    /// Set the failure banner prefix.
    #[must_use]
    pub fn failure_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.failure_prefix = prefix.into();
        self
    }
}

type SuccessHook = Box<dyn FnMut(&Value)>;
type FailureHook = Box<dyn FnMut(&FetchError)>;

/// Single-flight submit orchestration for one form.
pub struct SubmissionController<P> {
    form: Form,
    projection: P,
    source: Rc<dyn DataSource>,
    mode: SubmitMode,
    config: SubmitConfig,
    tokens: FetchCoordinator,
    in_flight: Option<FetchToken>,
    status: SubmitStatus,
    transitions: Vec<SubmitStatus>,
    last_error: Option<FetchError>,
    last_block: Option<BlockReason>,
    banner: Option<Banner>,
    dispatched: u64,
    success_hooks: Vec<SuccessHook>,
    failure_hooks: Vec<FailureHook>,
    refresh: Vec<Box<dyn Refresh>>,
}

impl<P: FormProjection> SubmissionController<P> {
    /// Create a controller with the default config.
    pub fn new(form: Form, projection: P, source: Rc<dyn DataSource>, mode: SubmitMode) -> Self {
        Self {
            form,
            projection,
            source,
            mode,
            config: SubmitConfig::default(),
            tokens: FetchCoordinator::new("submit"),
            in_flight: None,
            status: SubmitStatus::Idle,
            transitions: Vec::new(),
            last_error: None,
            last_block: None,
            banner: None,
            dispatched: 0,
            success_hooks: Vec::new(),
            failure_hooks: Vec::new(),
            refresh: Vec::new(),
        }
    }

    /// Replace the config.
    #[must_use]
    pub fn with_config(mut self, config: SubmitConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a success callback; receives the saved entity.
    pub fn on_success(&mut self, hook: impl FnMut(&Value) + 'static) {
        self.success_hooks.push(Box::new(hook));
    }

    /// Register a failure callback.
    pub fn on_failure(&mut self, hook: impl FnMut(&FetchError) + 'static) {
        self.failure_hooks.push(Box::new(hook));
    }

    /// Reload `view` after every successful save.
    pub fn refresh_on_success(&mut self, view: impl Refresh + 'static) {
        self.refresh.push(Box::new(view));
    }

    /// Switch between create and update. Ignored while a request is in flight.
    pub fn set_mode(&mut self, mode: SubmitMode) {
        if self.in_flight.is_none() {
            self.mode = mode;
        }
    }

    /// Validate and, if valid, dispatch one request.
    pub fn submit(&mut self) -> SubmitAttempt {
        let _span = info_span!("painel.submit", mode = %self.mode).entered();

        if let Some(token) = self.in_flight {
            debug!(%token, "submit dropped, request in flight");
            return SubmitAttempt::Dropped;
        }

        self.transition(SubmitStatus::Validating);
        self.form.touch_all();
        if !self.form.is_valid() {
            return self.block(BlockReason::Invalid);
        }
        if let Some(list) = self.form.empty_required_lists().into_iter().next() {
            return self.block(BlockReason::EmptyCollection(list));
        }

        let payload = self.projection.to_payload(&self.form.snapshot());
        let token = self.tokens.start();
        self.in_flight = Some(token);
        self.last_block = None;
        self.banner = None;
        self.transition(SubmitStatus::Submitting);
        self.dispatched += 1;

        match &self.mode {
            SubmitMode::Create => self.source.create(&payload, token),
            SubmitMode::Update(id) => self.source.update(id, &payload, token),
        }
        info!(%token, "submission dispatched");
        SubmitAttempt::Dispatched(token)
    }

    fn block(&mut self, reason: BlockReason) -> SubmitAttempt {
        debug!(%reason, invalid = ?self.form.invalid_fields(), "submit blocked");
        self.last_block = Some(reason.clone());
        self.transition(SubmitStatus::Blocked);
        SubmitAttempt::Blocked(reason)
    }

    /// Deliver the result of the request issued with `token`.
    ///
    /// Returns `false` (and changes nothing) unless `token` is in flight.
    pub fn resolve(&mut self, token: FetchToken, result: Result<Value, FetchError>) -> bool {
        let _span = info_span!("painel.submit", mode = %self.mode, %token).entered();

        if self.in_flight != Some(token) {
            warn!(%token, "response for a submission that is not in flight, ignored");
            return false;
        }
        self.tokens.try_apply(token, result.is_ok());
        self.in_flight = None;

        match result {
            Ok(entity) => {
                self.transition(SubmitStatus::Succeeded);
                self.last_error = None;
                self.banner = Some(Banner::success(self.config.success_message.clone()));
                info!("submission succeeded");
                for hook in &mut self.success_hooks {
                    hook(&entity);
                }
                for view in &self.refresh {
                    view.request_refresh();
                }
            }
            Err(err) => {
                self.transition(SubmitStatus::Failed);
                warn!(error = %err, "submission failed");
                self.banner = Some(Banner::error(format!(
                    "{}: {}",
                    self.config.failure_prefix,
                    err.user_message()
                )));
                for hook in &mut self.failure_hooks {
                    hook(&err);
                }
                self.last_error = Some(err);
            }
        }
        self.transition(SubmitStatus::Idle);
        true
    }

    fn transition(&mut self, next: SubmitStatus) {
        self.status = next;
        self.transitions.push(next);
    }

    // --- queries ------------------------------------------------------------

    /// Current state.
    #[must_use]
    pub fn status(&self) -> SubmitStatus {
        self.status
    }

    /// Every state entered so far, in order.
    #[must_use]
    pub fn transitions(&self) -> &[SubmitStatus] {
        &self.transitions
    }

    /// Token of the request in flight.
    #[must_use]
    pub fn in_flight(&self) -> Option<FetchToken> {
        self.in_flight
    }

    /// Requests dispatched so far.
    #[must_use]
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Error of the last failed request (cleared by a success).
    #[must_use]
    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }

    /// Why the last submit was blocked (cleared by a dispatch).
    #[must_use]
    pub fn last_block(&self) -> Option<&BlockReason> {
        self.last_block.as_ref()
    }

    /// Banner from the last resolution.
    #[must_use]
    pub fn banner(&self) -> Option<&Banner> {
        self.banner.as_ref()
    }

    /// Dismiss the banner.
    pub fn clear_banner(&mut self) {
        self.banner = None;
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> &SubmitMode {
        &self.mode
    }

    /// The form being submitted.
    #[must_use]
    pub fn form(&self) -> &Form {
        &self.form
    }
}

impl<P> fmt::Debug for SubmissionController<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmissionController")
            .field("mode", &self.mode)
            .field("status", &self.status)
            .field("in_flight", &self.in_flight)
            .field("dispatched", &self.dispatched)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::ListParams;
    use crate::projection::{Coercion, JsonProjection};
    use crate::rules::RuleSet;
    use crate::validation::Validator;
    use painel_runtime::DerivationGraph;
    use serde_json::json;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<(String, FetchToken, Value)>>,
    }

    impl DataSource for Recorder {
        fn list(&self, _params: &ListParams, token: FetchToken) {
            self.calls.borrow_mut().push(("list".into(), token, Value::Null));
        }
        fn get(&self, id: &str, token: FetchToken) {
            self.calls.borrow_mut().push((format!("get:{id}"), token, Value::Null));
        }
        fn create(&self, payload: &Value, token: FetchToken) {
            self.calls
                .borrow_mut()
                .push(("create".into(), token, payload.clone()));
        }
        fn update(&self, id: &str, payload: &Value, token: FetchToken) {
            self.calls
                .borrow_mut()
                .push((format!("update:{id}"), token, payload.clone()));
        }
    }

    fn setup(required_list: bool) -> (SubmissionController<JsonProjection>, Rc<Recorder>) {
        let rules = RuleSet::new()
            .field("nome", [Validator::Required])
            .list("itens", required_list);
        let form = Form::new(&DerivationGraph::new(), rules).unwrap();
        let projection = JsonProjection::new()
            .field("nome", Coercion::Text)
            .list("itens", "itens");
        let source = Rc::new(Recorder::default());
        let controller = SubmissionController::new(
            form,
            projection,
            Rc::clone(&source) as Rc<dyn DataSource>,
            SubmitMode::Create,
        );
        (controller, source)
    }

    #[test]
    fn invalid_form_blocks_and_touches() {
        let (mut c, source) = setup(false);
        assert_eq!(c.submit(), SubmitAttempt::Blocked(BlockReason::Invalid));
        assert_eq!(c.status(), SubmitStatus::Blocked);
        assert!(c.form().is_touched("nome").unwrap());
        assert!(source.calls.borrow().is_empty());
    }

    #[test]
    fn empty_required_list_is_distinct() {
        let (mut c, _) = setup(true);
        c.form().set("nome", "Pizza").unwrap();
        assert_eq!(
            c.submit(),
            SubmitAttempt::Blocked(BlockReason::EmptyCollection("itens".into()))
        );
    }

    #[test]
    fn single_flight() {
        let (mut c, source) = setup(false);
        c.form().set("nome", "Pizza").unwrap();
        let SubmitAttempt::Dispatched(token) = c.submit() else {
            panic!("expected dispatch");
        };
        assert_eq!(c.submit(), SubmitAttempt::Dropped);
        assert_eq!(source.calls.borrow().len(), 1);
        assert_eq!(c.dispatched(), 1);
        assert_eq!(source.calls.borrow()[0].2, json!({"nome": "Pizza", "itens": []}));

        assert!(c.resolve(token, Ok(json!({"id": 1}))));
        assert_eq!(c.status(), SubmitStatus::Idle);
        assert!(matches!(c.submit(), SubmitAttempt::Dispatched(_)));
    }

    #[test]
    fn success_runs_hooks_and_refresh() {
        struct CountingRefresh(Rc<Cell<u32>>);
        impl Refresh for CountingRefresh {
            fn request_refresh(&self) -> FetchToken {
                self.0.set(self.0.get() + 1);
                FetchToken::from_raw(1)
            }
        }

        let (mut c, _) = setup(false);
        let saved = Rc::new(RefCell::new(None));
        let s = Rc::clone(&saved);
        c.on_success(move |entity| *s.borrow_mut() = Some(entity.clone()));
        let refreshes = Rc::new(Cell::new(0));
        c.refresh_on_success(CountingRefresh(Rc::clone(&refreshes)));

        c.form().set("nome", "Pizza").unwrap();
        let SubmitAttempt::Dispatched(token) = c.submit() else {
            panic!("expected dispatch");
        };
        c.resolve(token, Ok(json!({"id": 9})));

        assert_eq!(*saved.borrow(), Some(json!({"id": 9})));
        assert_eq!(refreshes.get(), 1);
        assert_eq!(c.banner(), Some(&Banner::success("Saved successfully.")));
        assert_eq!(
            c.transitions(),
            [
                SubmitStatus::Validating,
                SubmitStatus::Submitting,
                SubmitStatus::Succeeded,
                SubmitStatus::Idle
            ]
        );
    }

    #[test]
    fn failure_preserves_values() {
        let (mut c, _) = setup(false);
        let failures = Rc::new(Cell::new(0));
        let f = Rc::clone(&failures);
        c.on_failure(move |_| f.set(f.get() + 1));

        c.form().set("nome", "Pizza").unwrap();
        let SubmitAttempt::Dispatched(token) = c.submit() else {
            panic!("expected dispatch");
        };
        c.resolve(token, Err(FetchError::transport("timeout")));

        assert_eq!(c.status(), SubmitStatus::Idle);
        assert_eq!(c.last_error(), Some(&FetchError::transport("timeout")));
        assert!(c.banner().unwrap().is_error());
        assert_eq!(failures.get(), 1);
        assert_eq!(c.form().get("nome").unwrap().as_text(), "Pizza");
    }

    #[test]
    fn unknown_token_is_ignored() {
        let (mut c, _) = setup(false);
        assert!(!c.resolve(FetchToken::from_raw(42), Ok(Value::Null)));
        assert_eq!(c.status(), SubmitStatus::Idle);
        assert!(c.transitions().is_empty());
    }

    #[test]
    fn update_mode_targets_id() {
        let (mut c, source) = setup(false);
        c.set_mode(SubmitMode::Update("17".into()));
        c.form().set("nome", "Pizza").unwrap();
        c.submit();
        assert_eq!(source.calls.borrow()[0].0, "update:17");
    }
}
