#![forbid(unsafe_code)]

//! Collection view: search, filter and paginate a source collection.
//!
//! A [`CollectionView`] is a small derivation graph:
//!
//! ```text
//!   source ─┐
//!   search ─┼─► filtered ─┬─► visible ◄─ page, page_size
//!   filter ─┘             └─► total_pages ◄─ page_size
//! ```
//!
//! # Page reset policy
//!
//! - Changing the search term or filter resets `page` to 1 whenever the
//!   filtered count changed (so the user never lands on an out-of-range page).
//! - Changing the page size resets `page` to 1.
//! - `set_page` never resets anything; `0` is clamped to 1.
//! - Replacing the source (reload) clamps `page` into `1..=total_pages`.
//!
//! Both resets can be switched off through [`CollectionConfig`].
//!
//! # Failure Modes
//!
//! | Scenario                       | Behavior                          |
//! |--------------------------------|-----------------------------------|
//! | `page` beyond `total_pages`    | `visible_items()` is empty        |
//! | Empty collection               | `total_pages() == 0`              |
//! | Stale reload response          | Discarded, logged at `warn`       |
//! | Reload fails                   | Source kept, error exposed        |

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::error::FetchError;
use crate::fetch::{FetchCoordinator, FetchToken, FetchTrace};
use crate::reactive::{DerivationGraph, Derived, StateCell, Subscription};

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// An externally supplied predicate, composed with the search term by AND.
pub struct Filter<T>(Rc<dyn Fn(&T) -> bool>);

impl<T> Clone for Filter<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> Filter<T> {
    /// Accept every item.
    #[must_use]
    pub fn all() -> Self {
        Self(Rc::new(|_| true))
    }

    /// Wrap a predicate.
    pub fn new(predicate: impl Fn(&T) -> bool + 'static) -> Self {
        Self(Rc::new(predicate))
    }

    /// Evaluate the predicate.
    #[must_use]
    pub fn matches(&self, item: &T) -> bool {
        (self.0)(item)
    }
}

impl<T> fmt::Debug for Filter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Filter(..)")
    }
}

/// Tri-state filter over a boolean attribute (e.g. "active").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlagFilter {
    /// Match every item.
    #[default]
    All,
    /// Match items whose flag is set.
    OnlyTrue,
    /// Match items whose flag is clear.
    OnlyFalse,
}

impl FlagFilter {
    /// Parse the value of a filter select (`""`, `"all"`, `"true"`, `"false"`).
    ///
    /// Unknown values fall back to [`FlagFilter::All`].
    #[must_use]
    pub fn from_query(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "active" => Self::OnlyTrue,
            "false" | "0" | "no" | "inactive" => Self::OnlyFalse,
            _ => Self::All,
        }
    }

    /// Whether a flag value passes.
    #[must_use]
    pub fn accepts(self, flag: bool) -> bool {
        match self {
            Self::All => true,
            Self::OnlyTrue => flag,
            Self::OnlyFalse => !flag,
        }
    }

    /// Build a [`Filter`] reading the flag through `flag`.
    pub fn predicate<T>(self, flag: impl Fn(&T) -> bool + 'static) -> Filter<T> {
        Filter::new(move |item| self.accepts(flag(item)))
    }
}

/// One entry of a selection widget. Values are strings even for numeric ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    /// Text shown to the user.
    pub label: String,
    /// Submitted value.
    pub value: String,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Configuration for a [`CollectionView`].
///
/// Defaults:
/// - default_page_size: 10
/// - reset_page_on_filter_change: true
/// - reset_page_on_page_size: true
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    /// Initial page size.
    pub default_page_size: usize,
    /// Reset to page 1 when a search/filter change alters the filtered count.
    pub reset_page_on_filter_change: bool,
    /// Reset to page 1 when the page size changes.
    pub reset_page_on_page_size: bool,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            reset_page_on_filter_change: true,
            reset_page_on_page_size: true,
        }
    }
}

impl CollectionConfig {
    /// Set the initial page size (clamped to at least 1).
    #[must_use]
    pub fn page_size(mut self, size: usize) -> Self {
        self.default_page_size = size.max(1);
        self
    }

    /// Enable or disable the search/filter reset.
    #[must_use]
    pub fn reset_page_on_filter_change(mut self, enabled: bool) -> Self {
        self.reset_page_on_filter_change = enabled;
        self
    }

    /// Enable or disable the page-size reset.
    #[must_use]
    pub fn reset_page_on_page_size(mut self, enabled: bool) -> Self {
        self.reset_page_on_page_size = enabled;
        self
    }
}

/// Something that can reload itself from the data collaborator.
pub trait Refresh {
    /// Start a reload and return its token.
    fn request_refresh(&self) -> FetchToken;
}

// ---------------------------------------------------------------------------
// CollectionView
// ---------------------------------------------------------------------------

type Fetcher = Rc<dyn Fn(FetchToken)>;

/// Searchable, filterable, paginated view over a collection of `T`.
///
/// Cloning yields another handle to the same view.
#[derive(Clone)]
pub struct CollectionView<T> {
    graph: DerivationGraph,
    config: CollectionConfig,
    source: StateCell<Rc<Vec<T>>>,
    search: StateCell<String>,
    filter: StateCell<Filter<T>>,
    page: StateCell<usize>,
    page_size: StateCell<usize>,
    filtered: Derived<Rc<Vec<T>>>,
    visible: Derived<Vec<T>>,
    total_pages: Derived<usize>,
    fetch: Rc<RefCell<FetchCoordinator>>,
    fetcher: Rc<RefCell<Option<Fetcher>>>,
    loading: StateCell<bool>,
    last_error: StateCell<Option<FetchError>>,
}

impl<T: Clone + 'static> CollectionView<T> {
    /// Create a view. `search_key` selects the attribute searched
    /// case-insensitively.
    pub fn new(
        graph: &DerivationGraph,
        items: Vec<T>,
        search_key: impl Fn(&T) -> &str + 'static,
        config: CollectionConfig,
    ) -> Self {
        let key: Rc<dyn Fn(&T) -> &str> = Rc::new(search_key);

        let source = graph.cell("collection.source", Rc::new(items));
        let search = graph.cell("collection.search", String::new());
        let filter = graph.cell("collection.filter", Filter::all());
        let page = graph.cell("collection.page", 1usize);
        let page_size = graph.cell("collection.page_size", config.default_page_size.max(1));

        let filtered = {
            let (src, term, pred) = (source.clone(), search.clone(), filter.clone());
            graph.derive(
                "collection.filtered",
                [source.dependency(), search.dependency(), filter.dependency()],
                move || {
                    let needle = term.with(|t| t.to_lowercase());
                    let pred = pred.read();
                    src.with(|items| {
                        Rc::new(
                            items
                                .iter()
                                .filter(|&item| {
                                    pred.matches(item)
                                        && (needle.is_empty()
                                            || key(item).to_lowercase().contains(&needle))
                                })
                                .cloned()
                                .collect::<Vec<_>>(),
                        )
                    })
                },
            )
        };

        let visible = {
            let (items, p, s) = (filtered.clone(), page.clone(), page_size.clone());
            graph.derive(
                "collection.visible",
                [filtered.dependency(), page.dependency(), page_size.dependency()],
                move || {
                    let page = p.read().max(1);
                    let size = s.read().max(1);
                    let start = (page - 1).saturating_mul(size);
                    items.with(|all| all.iter().skip(start).take(size).cloned().collect())
                },
            )
        };

        let total_pages = graph.map2(
            "collection.total_pages",
            &filtered,
            &page_size,
            |items: &Rc<Vec<T>>, size: &usize| items.len().div_ceil((*size).max(1)),
        );

        Self {
            graph: graph.clone(),
            config,
            source,
            search,
            filter,
            page,
            page_size,
            filtered,
            visible,
            total_pages,
            fetch: Rc::new(RefCell::new(FetchCoordinator::new("collection"))),
            fetcher: Rc::new(RefCell::new(None)),
            loading: graph.cell("collection.loading", false),
            last_error: graph.cell("collection.last_error", None),
        }
    }

    // --- commands -----------------------------------------------------------

    /// Set the search term.
    pub fn set_search_term(&self, term: impl Into<String>) {
        let before = self.total_items();
        self.search.write(term.into());
        self.after_filter_change(before);
    }

    /// Replace the filter predicate.
    pub fn set_filter(&self, filter: Filter<T>) {
        let before = self.total_items();
        self.filter.write(filter);
        self.after_filter_change(before);
    }

    fn after_filter_change(&self, before: usize) {
        if !self.config.reset_page_on_filter_change {
            return;
        }
        let after = self.total_items();
        if after != before && self.page.read() != 1 {
            debug!(before, after, "filtered count changed, page reset to 1");
            self.page.write(1);
        }
    }

    /// Go to page `page` (1-based; 0 is treated as 1).
    pub fn set_page(&self, page: usize) {
        self.page.write(page.max(1));
    }

    /// Change the page size (0 is treated as 1).
    pub fn set_page_size(&self, size: usize) {
        self.page_size.write(size.max(1));
        if self.config.reset_page_on_page_size && self.page.read() != 1 {
            debug!(size, "page size changed, page reset to 1");
            self.page.write(1);
        }
    }

    /// Replace the source collection.
    pub fn set_source(&self, items: Vec<T>) {
        self.source.write(Rc::new(items));
        let last = self.total_pages().max(1);
        if self.page.read() > last {
            debug!(last, "source shrank, page clamped");
            self.page.write(last);
        }
    }

    // --- queries ------------------------------------------------------------

    /// Items on the current page. Empty when the page is out of range.
    #[must_use]
    pub fn visible_items(&self) -> Vec<T> {
        self.visible.get()
    }

    /// Number of items after search and filter.
    #[must_use]
    pub fn total_items(&self) -> usize {
        self.filtered.with(|items| items.len())
    }

    /// `ceil(total_items / page_size)`; 0 when there are no items.
    #[must_use]
    pub fn total_pages(&self) -> usize {
        self.total_pages.get()
    }

    /// Current page (1-based).
    #[must_use]
    pub fn page(&self) -> usize {
        self.page.read()
    }

    /// Current page size.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size.read()
    }

    /// Current search term.
    #[must_use]
    pub fn search_term(&self) -> String {
        self.search.read()
    }

    /// All items after search and filter.
    #[must_use]
    pub fn filtered_items(&self) -> Rc<Vec<T>> {
        self.filtered.get()
    }

    /// The unfiltered source.
    #[must_use]
    pub fn source_items(&self) -> Rc<Vec<T>> {
        self.source.read()
    }

    /// Handle to the visible-page derived value.
    #[must_use]
    pub fn visible_derived(&self) -> &Derived<Vec<T>> {
        &self.visible
    }

    /// Handle to the filtered derived value.
    #[must_use]
    pub fn filtered_derived(&self) -> &Derived<Rc<Vec<T>>> {
        &self.filtered
    }

    /// "Page X/Y", with `0/0` for an empty collection.
    #[must_use]
    pub fn page_summary(&self) -> String {
        let total = self.total_pages();
        if total == 0 {
            return "Page 0/0".to_string();
        }
        let current = self.page().clamp(1, total);
        format!("Page {current}/{total}")
    }

    /// Derive a select-option list from the filtered items.
    pub fn options(
        &self,
        label: impl Fn(&T) -> String + 'static,
        value: impl Fn(&T) -> String + 'static,
    ) -> Derived<Vec<SelectOption>> {
        self.graph
            .map("collection.options", &self.filtered, move |items: &Rc<Vec<T>>| {
                items
                    .iter()
                    .map(|item| SelectOption {
                        label: label(item),
                        value: value(item),
                    })
                    .collect()
            })
    }

    /// Render hook: `callback` runs after any input of the view changes.
    pub fn subscribe(&self, callback: impl Fn() + 'static) -> Vec<Subscription> {
        let callback: Rc<dyn Fn()> = Rc::new(callback);
        vec![
            notify_on(&self.source, &callback),
            notify_on(&self.search, &callback),
            notify_on(&self.filter, &callback),
            notify_on(&self.page, &callback),
            notify_on(&self.page_size, &callback),
            notify_on(&self.loading, &callback),
        ]
    }

    // --- reload -------------------------------------------------------------

    /// Install the closure that dispatches a list request for a token.
    pub fn set_fetcher(&self, fetcher: impl Fn(FetchToken) + 'static) {
        *self.fetcher.borrow_mut() = Some(Rc::new(fetcher));
    }

    /// Issue a reload token; any earlier in-flight reload becomes stale.
    pub fn begin_reload(&self) -> FetchToken {
        let token = self.fetch.borrow_mut().start();
        self.loading.write(true);
        token
    }

    /// Apply a reload response. Returns `false` when the response was stale.
    pub fn apply_reload(&self, token: FetchToken, result: Result<Vec<T>, FetchError>) -> bool {
        let applied = self.fetch.borrow_mut().try_apply(token, result.is_ok());
        if !applied {
            return false;
        }
        self.loading.write(false);
        match result {
            Ok(items) => {
                if self.last_error.with(Option::is_some) {
                    self.last_error.write(None);
                }
                self.set_source(items);
            }
            Err(err) => {
                warn!(error = %err, "collection reload failed");
                self.last_error.write(Some(err));
            }
        }
        true
    }

    /// Whether a reload is outstanding.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading.read()
    }

    /// Error of the last applied reload, if it failed.
    #[must_use]
    pub fn last_fetch_error(&self) -> Option<FetchError> {
        self.last_error.read()
    }

    /// Snapshot of the reload trace.
    #[must_use]
    pub fn fetch_trace(&self) -> FetchTrace {
        self.fetch.borrow().trace().clone()
    }
}

fn notify_on<V: Clone + 'static>(cell: &StateCell<V>, callback: &Rc<dyn Fn()>) -> Subscription {
    let callback = Rc::clone(callback);
    cell.subscribe(move |_| callback())
}

impl<T: Clone + 'static> Refresh for CollectionView<T> {
    fn request_refresh(&self) -> FetchToken {
        let token = self.begin_reload();
        let fetcher = self.fetcher.borrow().clone();
        match fetcher {
            Some(fetch) => fetch(token),
            None => warn!(%token, "refresh requested without a fetcher"),
        }
        token
    }
}

impl<T> fmt::Debug for CollectionView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionView")
            .field("page", &self.page.with(|p| *p))
            .field("page_size", &self.page_size.with(|s| *s))
            .field("search", &self.search.with(Clone::clone))
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Dish {
        name: String,
        active: bool,
    }

    fn dishes(n: usize) -> Vec<Dish> {
        (1..=n)
            .map(|i| Dish {
                name: format!("Dish {i:02}"),
                active: i % 2 == 0,
            })
            .collect()
    }

    fn view(n: usize) -> CollectionView<Dish> {
        let graph = DerivationGraph::new();
        CollectionView::new(
            &graph,
            dishes(n),
            |d: &Dish| d.name.as_str(),
            CollectionConfig::default(),
        )
    }

    #[test]
    fn pagination_bounds() {
        let v = view(23);
        assert_eq!(v.total_items(), 23);
        assert_eq!(v.total_pages(), 3);
        v.set_page(3);
        assert_eq!(v.visible_items().len(), 3);
        v.set_page(4);
        assert!(v.visible_items().is_empty());
    }

    #[test]
    fn filter_reset_lands_on_page_one() {
        let v = view(15);
        v.set_page(2);
        assert_eq!(v.visible_items().len(), 5);

        v.set_search_term("xyz");
        assert_eq!(v.page(), 1);
        assert!(v.visible_items().is_empty());
        assert_eq!(v.total_pages(), 0);
        assert_eq!(v.page_summary(), "Page 0/0");
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let v = view(15);
        v.set_search_term("DISH 1");
        let names: Vec<_> = v.filtered_items().iter().map(|d| d.name.clone()).collect();
        assert_eq!(names.len(), 6); // 10..=15
        assert!(names.iter().all(|n| n.starts_with("Dish 1")));
    }

    #[test]
    fn search_term_is_not_trimmed() {
        let v = view(15);
        v.set_search_term("dish 01 ");
        assert_eq!(v.total_items(), 0);
        v.set_search_term("dish 01");
        assert_eq!(v.total_items(), 1);
        v.set_search_term("");
        assert_eq!(v.total_items(), 15);
    }

    #[test]
    fn flag_filter_composes_with_search() {
        let v = view(15);
        v.set_filter(FlagFilter::OnlyTrue.predicate(|d: &Dish| d.active));
        assert_eq!(v.total_items(), 7);
        v.set_search_term("dish 1");
        // 10, 12, 14
        assert_eq!(v.total_items(), 3);
        v.set_filter(FlagFilter::All.predicate(|d: &Dish| d.active));
        assert_eq!(v.total_items(), 6);
    }

    #[test]
    fn unchanged_count_keeps_page() {
        let v = view(30);
        v.set_page(2);
        v.set_search_term("dish");
        assert_eq!(v.page(), 2);
    }

    #[test]
    fn page_size_change_resets_page() {
        let v = view(30);
        v.set_page(3);
        v.set_page_size(5);
        assert_eq!(v.page(), 1);
        assert_eq!(v.total_pages(), 6);
    }

    #[test]
    fn page_size_reset_can_be_disabled() {
        let graph = DerivationGraph::new();
        let v = CollectionView::new(
            &graph,
            dishes(30),
            |d: &Dish| d.name.as_str(),
            CollectionConfig::default().reset_page_on_page_size(false),
        );
        v.set_page(2);
        v.set_page_size(5);
        assert_eq!(v.page(), 2);
    }

    #[test]
    fn zero_page_and_size_clamp_to_one() {
        let v = view(3);
        v.set_page(0);
        assert_eq!(v.page(), 1);
        v.set_page_size(0);
        assert_eq!(v.page_size(), 1);
        assert_eq!(v.total_pages(), 3);
    }

    #[test]
    fn visible_page_is_memoized() {
        let v = view(23);
        let first = v.visible_items();
        let again = v.visible_items();
        assert_eq!(first, again);
        assert_eq!(v.visible_derived().recompute_count(), 1);

        v.set_page(2);
        let _ = v.visible_items();
        assert_eq!(v.visible_derived().recompute_count(), 2);
        assert_eq!(v.filtered_derived().recompute_count(), 1);
    }

    #[test]
    fn options_follow_filter() {
        let v = view(4);
        let options = v.options(|d: &Dish| d.name.clone(), |d: &Dish| d.name[5..].to_string());
        assert_eq!(options.get().len(), 4);
        assert_eq!(options.get()[0].value, "01");
        v.set_filter(FlagFilter::OnlyFalse.predicate(|d: &Dish| d.active));
        assert_eq!(options.get().len(), 2);
    }

    #[test]
    fn stale_reload_is_discarded() {
        let v = view(0);
        let first = v.begin_reload();
        let second = v.begin_reload();
        assert!(v.is_loading());

        assert!(v.apply_reload(second, Ok(dishes(5))));
        assert!(!v.apply_reload(first, Ok(dishes(50))));
        assert_eq!(v.total_items(), 5);
        assert!(!v.is_loading());
        assert!(v.fetch_trace().verify_invariants().is_empty());
    }

    #[test]
    fn failed_reload_keeps_source() {
        let v = view(12);
        let token = v.begin_reload();
        assert!(v.apply_reload(token, Err(FetchError::transport("offline"))));
        assert_eq!(v.total_items(), 12);
        assert_eq!(v.last_fetch_error(), Some(FetchError::transport("offline")));
    }

    #[test]
    fn shrinking_source_clamps_page() {
        let v = view(30);
        v.set_page(3);
        let token = v.begin_reload();
        v.apply_reload(token, Ok(dishes(12)));
        assert_eq!(v.page(), 2);
        assert_eq!(v.visible_items().len(), 2);
    }

    #[test]
    fn request_refresh_uses_fetcher() {
        let v = view(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        v.set_fetcher(move |token| log.borrow_mut().push(token));

        let token = v.request_refresh();
        assert_eq!(*seen.borrow(), vec![token]);
    }

    #[test]
    fn subscribe_fires_on_input_change() {
        let v = view(5);
        let hits = Rc::new(std::cell::Cell::new(0));
        let h = Rc::clone(&hits);
        let _subs = v.subscribe(move || h.set(h.get() + 1));
        v.set_page(2);
        v.set_search_term("dish");
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn flag_filter_from_query() {
        assert_eq!(FlagFilter::from_query(""), FlagFilter::All);
        assert_eq!(FlagFilter::from_query("true"), FlagFilter::OnlyTrue);
        assert_eq!(FlagFilter::from_query(" Inactive "), FlagFilter::OnlyFalse);
        assert_eq!(FlagFilter::from_query("bogus"), FlagFilter::All);
    }
}
