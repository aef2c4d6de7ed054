#![forbid(unsafe_code)]

//! Cuisine list: search, active/inactive filter, pagination and reload.

use std::cell::Cell;
use std::rc::Rc;

use painel::{
    CollectionConfig, CollectionView, DataSource, DerivationGraph, Derived, FetchError,
    FetchToken, FlagFilter, ListParams, Refresh, SelectOption, Subscription,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::Screen;

/// Route of this screen; edit screens fall back here.
pub const ROUTE: &str = "/cozinhas";

/// One cuisine as returned by the list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cuisine {
    pub id: u64,
    pub nome: String,
    #[serde(default = "active_by_default")]
    pub ativo: bool,
}

fn active_by_default() -> bool {
    true
}

/// Decode a list response.
pub fn decode_cuisines(value: Value) -> Result<Vec<Cuisine>, FetchError> {
    serde_json::from_value(value)
        .map_err(|err| FetchError::transport(format!("malformed cuisine list: {err}")))
}

/// The cuisine list screen.
pub struct CuisineListScreen {
    view: CollectionView<Cuisine>,
    status: FlagFilter,
    renders: Rc<Cell<u64>>,
    _subscriptions: Vec<Subscription>,
}

impl CuisineListScreen {
    /// Create the screen. Nothing is loaded until [`Self::reload`].
    pub fn new(
        graph: &DerivationGraph,
        source: Rc<dyn DataSource>,
        config: CollectionConfig,
    ) -> Self {
        let view = CollectionView::new(graph, Vec::new(), |c: &Cuisine| c.nome.as_str(), config);
        view.set_fetcher(move |token| source.list(&ListParams::new(), token));

        let renders = Rc::new(Cell::new(0));
        let counter = Rc::clone(&renders);
        let subscriptions = view.subscribe(move || counter.set(counter.get() + 1));

        Self {
            view,
            status: FlagFilter::All,
            renders,
            _subscriptions: subscriptions,
        }
    }

    /// Type into the search box.
    pub fn search(&self, term: &str) {
        self.view.set_search_term(term);
    }

    /// Pick the active/inactive filter.
    pub fn show(&mut self, status: FlagFilter) {
        debug!(?status, "cuisine status filter");
        self.status = status;
        self.view.set_filter(status.predicate(|c: &Cuisine| c.ativo));
    }

    /// Pick the filter from its query-string form (`"true"`, `"false"`, `""`).
    pub fn show_query(&mut self, raw: &str) {
        self.show(FlagFilter::from_query(raw));
    }

    /// Jump to a page.
    pub fn go_to_page(&self, page: usize) {
        self.view.set_page(page);
    }

    /// Change the page size.
    pub fn set_page_size(&self, size: usize) {
        self.view.set_page_size(size);
    }

    /// Request a fresh list from the data source.
    pub fn reload(&self) -> FetchToken {
        self.view.request_refresh()
    }

    /// Deliver a list response. Returns `false` for stale responses.
    pub fn deliver(&self, token: FetchToken, result: Result<Value, FetchError>) -> bool {
        self.view.apply_reload(token, result.and_then(decode_cuisines))
    }

    /// Options for a cuisine select, following the current search/filter.
    pub fn options(&self) -> Derived<Vec<SelectOption>> {
        self.view
            .options(|c: &Cuisine| c.nome.clone(), |c: &Cuisine| c.id.to_string())
    }

    /// Current status filter.
    #[must_use]
    pub fn status(&self) -> FlagFilter {
        self.status
    }

    /// Number of change notifications delivered to the render hook.
    #[must_use]
    pub fn renders(&self) -> u64 {
        self.renders.get()
    }

    /// The underlying collection view.
    #[must_use]
    pub fn collection(&self) -> &CollectionView<Cuisine> {
        &self.view
    }

    /// A handle that reloads this list, for "refresh after save".
    #[must_use]
    pub fn refresher(&self) -> CollectionView<Cuisine> {
        self.view.clone()
    }
}

impl Screen for CuisineListScreen {
    fn title(&self) -> &'static str {
        "Cuisines"
    }

    fn view(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "{} | search: {:?} | status: {:?} | {} | {} total",
            self.title(),
            self.view.search_term(),
            self.status,
            self.view.page_summary(),
            self.view.total_items(),
        )];
        if self.view.is_loading() {
            lines.push("  loading...".to_string());
        }
        if let Some(err) = self.view.last_fetch_error() {
            lines.push(format!("  ! {}", err.user_message()));
        }
        let visible = self.view.visible_items();
        if visible.is_empty() {
            lines.push("  (no cuisines)".to_string());
        }
        for cuisine in visible {
            let state = if cuisine.ativo { "active" } else { "inactive" };
            lines.push(format!("  #{:<3} {:<20} {state}", cuisine.id, cuisine.nome));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemorySource;
    use serde_json::json;

    fn seeded() -> Rc<InMemorySource> {
        Rc::new(InMemorySource::new("nome").with_records(
            (1..=15).map(|i| json!({"nome": format!("Cozinha {i:02}"), "ativo": i % 3 != 0})),
        ))
    }

    fn loaded(graph: &DerivationGraph, source: &Rc<InMemorySource>) -> CuisineListScreen {
        let screen = CuisineListScreen::new(
            graph,
            Rc::clone(source) as Rc<dyn DataSource>,
            CollectionConfig::default(),
        );
        screen.reload();
        let reply = source.answer_next().unwrap();
        assert!(screen.deliver(reply.token, reply.result));
        screen
    }

    #[test]
    fn reload_fills_first_page() {
        let graph = DerivationGraph::new();
        let source = seeded();
        let screen = loaded(&graph, &source);
        assert_eq!(screen.collection().total_items(), 15);
        assert_eq!(screen.collection().total_pages(), 2);
        assert_eq!(screen.collection().visible_items().len(), 10);
        assert!(!screen.collection().is_loading());
    }

    #[test]
    fn filter_reset_goes_back_to_first_page() {
        let graph = DerivationGraph::new();
        let source = seeded();
        let screen = loaded(&graph, &source);
        screen.go_to_page(2);
        screen.search("xyz");
        assert_eq!(screen.collection().page(), 1);
        assert!(screen.collection().visible_items().is_empty());
        assert_eq!(screen.collection().total_pages(), 0);
        assert!(screen.view().iter().any(|l| l.contains("(no cuisines)")));
    }

    #[test]
    fn status_filter_from_query() {
        let graph = DerivationGraph::new();
        let source = seeded();
        let mut screen = loaded(&graph, &source);
        screen.show_query("false");
        assert_eq!(screen.status(), FlagFilter::OnlyFalse);
        assert_eq!(screen.collection().total_items(), 5);
        assert!(screen.collection().visible_items().iter().all(|c| !c.ativo));
    }

    #[test]
    fn malformed_response_is_reported() {
        let graph = DerivationGraph::new();
        let screen = CuisineListScreen::new(
            &graph,
            seeded() as Rc<dyn DataSource>,
            CollectionConfig::default(),
        );
        let token = screen.reload();
        assert!(screen.deliver(token, Ok(json!({"not": "a list"}))));
        assert!(screen.collection().last_fetch_error().is_some());
        assert!(screen.view().iter().any(|l| l.starts_with("  !")));
    }

    #[test]
    fn options_follow_search() {
        let graph = DerivationGraph::new();
        let source = seeded();
        let screen = loaded(&graph, &source);
        let options = screen.options();
        screen.search("cozinha 1");
        let values: Vec<_> = options.get().iter().map(|o| o.value.clone()).collect();
        assert_eq!(values, ["10", "11", "12", "13", "14", "15"]);
    }

    #[test]
    fn render_hook_counts_changes() {
        let graph = DerivationGraph::new();
        let source = seeded();
        let screen = loaded(&graph, &source);
        let before = screen.renders();
        screen.go_to_page(2);
        assert!(screen.renders() > before);
    }
}
