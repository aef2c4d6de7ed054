#![forbid(unsafe_code)]

//! Narrow interfaces to the host's data and navigation layers.
//!
//! Calls are dispatch-only. Each [`DataSource`] call must resolve exactly
//! once, later, by the host handing `(token, result)` back to the component
//! that issued it (`SubmissionController::resolve`, `EntityLoader::resolve`,
//! `CollectionView::apply_reload`). Implementations must not call back into
//! the issuing component from inside the dispatch.

use std::collections::BTreeMap;

use painel_runtime::FetchToken;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameters of a list request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    /// Free-text search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Attribute filters, e.g. `active=true`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, String>,
}

impl ListParams {
    /// No search, no filters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the search term; blank terms are dropped.
    #[must_use]
    pub fn search(mut self, term: impl Into<String>) -> Self {
        let term = term.into();
        self.search = (!term.trim().is_empty()).then_some(term);
        self
    }

    /// Add an attribute filter.
    #[must_use]
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }
}

/// Fetch-and-return entities.
pub trait DataSource {
    /// List entities matching `params`.
    fn list(&self, params: &ListParams, token: FetchToken);

    /// Load one entity; a missing id resolves with `FetchError::NotFound`.
    fn get(&self, id: &str, token: FetchToken);

    /// Create an entity from `payload`.
    fn create(&self, payload: &Value, token: FetchToken);

    /// Update entity `id` with `payload`.
    fn update(&self, id: &str, payload: &Value, token: FetchToken);
}

/// Navigate-to-path. Fire and forget.
pub trait Navigator {
    /// Go to `path`.
    fn go_to(&self, path: &str);
}
