#![forbid(unsafe_code)]

//! Entity loader for edit screens: load by id, populate the form, then sync
//! selection widgets after the reaction.
//!
//! Selection-widget fields (see [`FormProjection::deferred_fields`]) are
//! written through the form graph's deferred queue inside a reaction scope,
//! so the widget has registered its options before the value arrives.
//!
//! Loads are last-write-wins: resolving an older token after a newer `load`
//! changes nothing.

use std::rc::Rc;

use painel_runtime::{FetchCoordinator, FetchToken};
use serde_json::Value;
use tracing::{info, info_span, warn};

use crate::collaborators::{DataSource, Navigator};
use crate::error::{FetchError, FormError};
use crate::form::Form;
use crate::projection::FormProjection;
use crate::submit::Banner;

/// Configuration for [`EntityLoader`].
///
/// Defaults:
/// - fallback_path: "/"
/// - not_found_message: "Record not found."
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Where to navigate when the entity does not exist.
    pub fallback_path: String,
    /// Banner text when the entity does not exist.
    pub not_found_message: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            fallback_path: "/".to_string(),
            not_found_message: "Record not found.".to_string(),
        }
    }
}

impl LoaderConfig {
    /// Set the fallback path.
    #[must_use]
    pub fn fallback_path(mut self, path: impl Into<String>) -> Self {
        self.fallback_path = path.into();
        self
    }

    /// Set the not-found banner text.
    #[must_use]
    pub fn not_found_message(mut self, message: impl Into<String>) -> Self {
        self.not_found_message = message.into();
        self
    }
}

/// Loads one entity into a form.
pub struct EntityLoader<P> {
    projection: P,
    source: Rc<dyn DataSource>,
    navigator: Rc<dyn Navigator>,
    config: LoaderConfig,
    tokens: FetchCoordinator,
    pending_id: Option<String>,
    loaded_id: Option<String>,
    banner: Option<Banner>,
    last_error: Option<FetchError>,
}

impl<P: FormProjection> EntityLoader<P> {
    /// Create a loader.
    pub fn new(
        projection: P,
        source: Rc<dyn DataSource>,
        navigator: Rc<dyn Navigator>,
        config: LoaderConfig,
    ) -> Self {
        Self {
            projection,
            source,
            navigator,
            config,
            tokens: FetchCoordinator::new("load"),
            pending_id: None,
            loaded_id: None,
            banner: None,
            last_error: None,
        }
    }

    /// Request entity `id`. Supersedes any load still in flight.
    pub fn load(&mut self, id: &str) -> FetchToken {
        let _span = info_span!("painel.load", id).entered();
        let token = self.tokens.start();
        self.pending_id = Some(id.to_string());
        self.source.get(id, token);
        token
    }

    /// Deliver the result of `load`. Returns `Ok(false)` for stale tokens.
    ///
    /// Fails only when the projection names a field or list the form does not
    /// declare.
    pub fn resolve(
        &mut self,
        token: FetchToken,
        result: Result<Value, FetchError>,
        form: &Form,
    ) -> Result<bool, FormError> {
        let _span = info_span!("painel.load", %token).entered();
        if !self.tokens.try_apply(token, result.is_ok()) {
            return Ok(false);
        }
        let id = self.pending_id.take();

        match result {
            Ok(entity) => {
                self.populate(form, &entity)?;
                info!(id = ?id, "entity loaded");
                self.loaded_id = id;
                self.banner = None;
                self.last_error = None;
            }
            Err(err) if err.is_not_found() => {
                warn!(id = ?id, fallback = %self.config.fallback_path, "entity not found");
                self.banner = Some(Banner::error(self.config.not_found_message.clone()));
                self.navigator.go_to(&self.config.fallback_path);
                self.last_error = Some(err);
            }
            Err(err) => {
                warn!(id = ?id, error = %err, "entity load failed");
                self.banner = Some(Banner::error(err.user_message()));
                self.last_error = Some(err);
            }
        }
        Ok(true)
    }

    fn populate(&self, form: &Form, entity: &Value) -> Result<(), FormError> {
        let deferred = self.projection.deferred_fields();
        let _reaction = form.graph().reaction();

        for (name, value) in self.projection.to_fields(entity) {
            if deferred.contains(&name) {
                form.value_cell(&name)?;
                let handle = form.clone();
                form.graph().deferred().defer_with(move || {
                    if let Err(err) = handle.load_value(&name, value) {
                        warn!(error = %err, "deferred field write failed");
                    }
                });
            } else {
                form.load_value(&name, value)?;
            }
        }
        for (list, items) in self.projection.to_lists(entity) {
            form.set_items(&list, items)?;
        }
        form.reset_tracking();
        Ok(())
    }

    /// Whether a load is outstanding.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.pending_id.is_some()
    }

    /// Id of the last entity loaded successfully.
    #[must_use]
    pub fn loaded_id(&self) -> Option<&str> {
        self.loaded_id.as_deref()
    }

    /// Banner from the last resolution.
    #[must_use]
    pub fn banner(&self) -> Option<&Banner> {
        self.banner.as_ref()
    }

    /// Error of the last failed load.
    #[must_use]
    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::ListParams;
    use crate::projection::{Coercion, JsonProjection};
    use crate::rules::RuleSet;
    use crate::value::FieldValue;
    use painel_runtime::DerivationGraph;
    use serde_json::json;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Source {
        gets: RefCell<Vec<(String, FetchToken)>>,
    }

    impl DataSource for Source {
        fn list(&self, _: &ListParams, _: FetchToken) {}
        fn get(&self, id: &str, token: FetchToken) {
            self.gets.borrow_mut().push((id.to_string(), token));
        }
        fn create(&self, _: &Value, _: FetchToken) {}
        fn update(&self, _: &str, _: &Value, _: FetchToken) {}
    }

    #[derive(Default)]
    struct Nav {
        paths: RefCell<Vec<String>>,
    }

    impl Navigator for Nav {
        fn go_to(&self, path: &str) {
            self.paths.borrow_mut().push(path.to_string());
        }
    }

    fn setup() -> (EntityLoader<JsonProjection>, Form, Rc<Source>, Rc<Nav>) {
        let graph = DerivationGraph::new();
        let form = Form::new(
            &graph,
            RuleSet::new().field("nome", []).field("categoria", []),
        )
        .unwrap();
        let projection = JsonProjection::new()
            .field("nome", Coercion::Text)
            .select("categoria", "id_categoria");
        let source = Rc::new(Source::default());
        let nav = Rc::new(Nav::default());
        let loader = EntityLoader::new(
            projection,
            Rc::clone(&source) as Rc<dyn DataSource>,
            Rc::clone(&nav) as Rc<dyn Navigator>,
            LoaderConfig::default().fallback_path("/adicionais"),
        );
        (loader, form, source, nav)
    }

    #[test]
    fn populates_and_stays_pristine() {
        let (mut loader, form, source, _) = setup();
        let token = loader.load("3");
        assert_eq!(source.gets.borrow()[0], ("3".to_string(), token));
        assert!(loader.is_loading());

        let entity = json!({"nome": "Bacon", "id_categoria": 7});
        assert_eq!(loader.resolve(token, Ok(entity), &form), Ok(true));

        assert_eq!(form.get("nome").unwrap(), FieldValue::text("Bacon"));
        assert_eq!(form.get("categoria").unwrap(), FieldValue::text("7"));
        assert!(form.is_pristine());
        assert_eq!(loader.loaded_id(), Some("3"));
        assert!(!loader.is_loading());
    }

    #[test]
    fn select_written_after_reaction() {
        let (mut loader, form, _, _) = setup();
        let token = loader.load("3");
        let outer = form.graph().reaction();
        loader
            .resolve(token, Ok(json!({"nome": "Bacon", "id_categoria": 7})), &form)
            .unwrap();
        assert_eq!(form.get("nome").unwrap(), FieldValue::text("Bacon"));
        assert_eq!(form.get("categoria").unwrap(), FieldValue::Empty);
        drop(outer);
        assert_eq!(form.get("categoria").unwrap(), FieldValue::text("7"));
    }

    #[test]
    fn not_found_navigates_away() {
        let (mut loader, form, _, nav) = setup();
        let token = loader.load("404");
        loader
            .resolve(token, Err(FetchError::not_found("404")), &form)
            .unwrap();
        assert_eq!(*nav.paths.borrow(), vec!["/adicionais".to_string()]);
        assert_eq!(loader.banner(), Some(&Banner::error("Record not found.")));
    }

    #[test]
    fn transport_error_only_banners() {
        let (mut loader, form, _, nav) = setup();
        let token = loader.load("1");
        loader
            .resolve(token, Err(FetchError::transport("offline")), &form)
            .unwrap();
        assert!(nav.paths.borrow().is_empty());
        assert!(loader.banner().unwrap().is_error());
    }

    #[test]
    fn stale_load_is_discarded() {
        let (mut loader, form, _, _) = setup();
        let first = loader.load("1");
        let second = loader.load("2");
        loader
            .resolve(second, Ok(json!({"nome": "Dois"})), &form)
            .unwrap();
        assert_eq!(
            loader.resolve(first, Ok(json!({"nome": "Um"})), &form),
            Ok(false)
        );
        assert_eq!(form.get("nome").unwrap(), FieldValue::text("Dois"));
        assert_eq!(loader.loaded_id(), Some("2"));
    }
}
