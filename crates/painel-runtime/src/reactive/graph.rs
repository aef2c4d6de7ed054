#![forbid(unsafe_code)]

//! Derivation graph: explicit dependency registration with versioned
//! invalidation.
//!
//! A [`Derived`] lists its dependencies up front (cells or other derived
//! values) and a compute closure that reads them. Reads are demand-driven:
//! [`Derived::get`] first refreshes every dependency (transitively), compares
//! the versions it sees against the versions recorded at the last recompute,
//! and only then decides whether to run `compute`.
//!
//! # Generations
//!
//! Every cell write on the thread advances a global write generation. A node
//! that has already been checked in the current generation returns its cached
//! value without walking its dependencies again. This is what keeps diamond
//! shapes (`a -> b -> d`, `a -> c -> d`, `b -> c`) from recomputing a shared
//! intermediate more than once inside one read.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use super::cell::StateCell;
use super::deferred::{DeferConfig, DeferredWrites, ReactionScope};

thread_local! {
    static GENERATION: Cell<u64> = const { Cell::new(1) };
    static NEXT_NODE: Cell<u64> = const { Cell::new(1) };
}

pub(crate) fn current_generation() -> u64 {
    GENERATION.with(Cell::get)
}

pub(crate) fn advance_generation() {
    GENERATION.with(|g| g.set(g.get().wrapping_add(1)));
}

pub(crate) fn allocate_node() -> NodeId {
    NEXT_NODE.with(|n| {
        let id = n.get();
        n.set(id + 1);
        NodeId(id)
    })
}

// ---------------------------------------------------------------------------
// NodeId / StaleLink
// ---------------------------------------------------------------------------

/// Stable identity of a cell or derived node for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Raw id value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Weak back-reference from a dependency to a dependent's stale flag.
///
/// Links to dropped dependents are pruned lazily on the next write.
#[derive(Debug, Clone)]
pub struct StaleLink(Weak<Cell<bool>>);

impl StaleLink {
    pub(crate) fn new(flag: &Rc<Cell<bool>>) -> Self {
        Self(Rc::downgrade(flag))
    }

    pub(crate) fn is_live(&self) -> bool {
        self.0.strong_count() > 0
    }

    /// Set the flag; returns `false` when the dependent is gone.
    fn mark(&self) -> bool {
        match self.0.upgrade() {
            Some(flag) => {
                flag.set(true);
                true
            }
            None => false,
        }
    }
}

pub(crate) fn mark_dependents(links: &RefCell<Vec<StaleLink>>) {
    links.borrow_mut().retain(StaleLink::mark);
}

// ---------------------------------------------------------------------------
// Dependency / Source traits
// ---------------------------------------------------------------------------

/// A node a [`Derived`] value can depend on.
pub trait Dependency {
    /// Identity of the node.
    fn node_id(&self) -> NodeId;

    /// Current version without bringing the node up to date.
    fn version(&self) -> u64;

    /// Bring the node up to date and return its version.
    fn refresh(&self) -> u64;

    /// Whether a read would trigger a recompute somewhere below this node.
    fn is_stale(&self) -> bool;

    /// Register a dependent to be flagged stale when this node changes.
    fn link(&self, link: StaleLink);
}

/// A typed, readable node: either a [`StateCell`] or a [`Derived`].
pub trait Source<T>: Clone + 'static {
    /// Current value (recomputing first if needed).
    fn current(&self) -> T;

    /// Type-erased dependency handle for registration.
    fn dependency(&self) -> Rc<dyn Dependency>;
}

// ---------------------------------------------------------------------------
// DerivationGraph
// ---------------------------------------------------------------------------

/// Per-screen reactive context.
///
/// Creates cells and derived values and owns the screen's deferred-write
/// queue. Cloning the graph yields another handle to the same queue.
#[derive(Clone, Debug)]
pub struct DerivationGraph {
    deferred: DeferredWrites,
    nodes: Rc<Cell<usize>>,
}

impl Default for DerivationGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl DerivationGraph {
    /// Create a graph with the default deferral config.
    #[must_use]
    pub fn new() -> Self {
        Self::with_defer_config(DeferConfig::default())
    }

    /// Create a graph with an explicit deferral config.
    #[must_use]
    pub fn with_defer_config(config: DeferConfig) -> Self {
        Self {
            deferred: DeferredWrites::new(config),
            nodes: Rc::new(Cell::new(0)),
        }
    }

    /// Create a new state cell owned by this graph.
    pub fn cell<T: Clone + 'static>(&self, name: impl Into<String>, value: T) -> StateCell<T> {
        self.nodes.set(self.nodes.get() + 1);
        StateCell::new(name, value)
    }

    /// Create a derived value over explicitly registered dependencies.
    ///
    /// `compute` must only read the nodes listed in `deps`; reads of anything
    /// else are not tracked.
    pub fn derive<T, I, F>(&self, name: impl Into<String>, deps: I, compute: F) -> Derived<T>
    where
        T: Clone + Default + 'static,
        I: IntoIterator<Item = Rc<dyn Dependency>>,
        F: Fn() -> T + 'static,
    {
        self.nodes.set(self.nodes.get() + 1);
        Derived::new(name.into(), deps.into_iter().collect(), Box::new(compute))
    }

    /// Derive a value from a single source.
    pub fn map<S, T, A, F>(&self, name: impl Into<String>, source: &A, f: F) -> Derived<T>
    where
        S: 'static,
        T: Clone + Default + 'static,
        A: Source<S>,
        F: Fn(&S) -> T + 'static,
    {
        let src = source.clone();
        self.derive(name, [source.dependency()], move || f(&src.current()))
    }

    /// Derive a value from two sources.
    pub fn map2<S1, S2, T, A, B, F>(
        &self,
        name: impl Into<String>,
        a: &A,
        b: &B,
        f: F,
    ) -> Derived<T>
    where
        S1: 'static,
        S2: 'static,
        T: Clone + Default + 'static,
        A: Source<S1>,
        B: Source<S2>,
        F: Fn(&S1, &S2) -> T + 'static,
    {
        let (sa, sb) = (a.clone(), b.clone());
        self.derive(name, [a.dependency(), b.dependency()], move || {
            f(&sa.current(), &sb.current())
        })
    }

    /// The deferred-write queue for this screen.
    #[must_use]
    pub fn deferred(&self) -> &DeferredWrites {
        &self.deferred
    }

    /// Open a reaction scope; deferred writes run when the outermost scope drops.
    #[must_use = "dropping the scope immediately flushes deferred writes"]
    pub fn reaction(&self) -> ReactionScope {
        self.deferred.reaction()
    }

    /// Number of nodes created through this graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.get()
    }
}

// ---------------------------------------------------------------------------
// Derived
// ---------------------------------------------------------------------------

struct DerivedNode<T> {
    id: NodeId,
    name: String,
    deps: Vec<Rc<dyn Dependency>>,
    compute: Box<dyn Fn() -> T>,
    cache: RefCell<Option<T>>,
    seen: RefCell<Vec<u64>>,
    version: Cell<u64>,
    checked_at: Cell<u64>,
    stale: Rc<Cell<bool>>,
    computing: Cell<bool>,
    recomputes: Cell<u64>,
    dependents: RefCell<Vec<StaleLink>>,
}

impl<T: Clone + 'static> DerivedNode<T> {
    fn refresh(&self) -> u64 {
        let generation = current_generation();
        let has_value = self.cache.borrow().is_some();
        if has_value && self.checked_at.get() == generation {
            return self.version.get();
        }
        if self.computing.get() {
            tracing::warn!(node = %self.name, "re-entrant read during recompute, serving previous value");
            return self.version.get();
        }

        let current: Vec<u64> = self.deps.iter().map(|dep| dep.refresh()).collect();
        let fresh = has_value && *self.seen.borrow() == current;
        if !fresh {
            self.computing.set(true);
            let value = (self.compute)();
            self.computing.set(false);

            *self.cache.borrow_mut() = Some(value);
            *self.seen.borrow_mut() = current;
            self.version.set(self.version.get() + 1);
            self.recomputes.set(self.recomputes.get() + 1);
            trace!(node = %self.name, id = %self.id, version = self.version.get(), "recomputed");
            mark_dependents(&self.dependents);
        }

        self.stale.set(false);
        self.checked_at.set(generation);
        self.version.get()
    }

    fn stale_now(&self) -> bool {
        if self.cache.borrow().is_none() || self.stale.get() {
            return true;
        }
        let seen = self.seen.borrow();
        self.deps
            .iter()
            .zip(seen.iter())
            .any(|(dep, &v)| dep.is_stale() || dep.version() != v)
    }
}

impl<T: Clone + 'static> Dependency for DerivedNode<T> {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn version(&self) -> u64 {
        self.version.get()
    }

    fn refresh(&self) -> u64 {
        DerivedNode::refresh(self)
    }

    fn is_stale(&self) -> bool {
        self.stale_now()
    }

    fn link(&self, link: StaleLink) {
        self.dependents.borrow_mut().push(link);
    }
}

/// A lazily computed, memoized value.
///
/// Cloning yields another handle to the same node (and the same cache).
pub struct Derived<T> {
    inner: Rc<DerivedNode<T>>,
}

impl<T> Clone for Derived<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> Derived<T> {
    fn new(name: String, deps: Vec<Rc<dyn Dependency>>, compute: Box<dyn Fn() -> T>) -> Self {
        let stale = Rc::new(Cell::new(true));
        for dep in &deps {
            dep.link(StaleLink::new(&stale));
        }
        let id = allocate_node();
        trace!(node = %name, %id, deps = deps.len(), "derived registered");
        Self {
            inner: Rc::new(DerivedNode {
                id,
                name,
                deps,
                compute,
                cache: RefCell::new(None),
                seen: RefCell::new(Vec::new()),
                version: Cell::new(0),
                checked_at: Cell::new(0),
                stale,
                computing: Cell::new(false),
                recomputes: Cell::new(0),
                dependents: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Current value, or `None` when a cyclic read reached this node before
    /// its first compute finished.
    #[must_use]
    pub fn try_get(&self) -> Option<T> {
        self.try_with(Clone::clone)
    }

    /// Borrow the current value; `None` under the same condition as
    /// [`Derived::try_get`].
    pub fn try_with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.inner.refresh();
        self.inner.cache.borrow().as_ref().map(f)
    }

    /// Whether the next read would recompute.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.inner.stale_now()
    }

    /// Node identity.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Debug name given at registration.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Output version; increments on every recompute.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// How many times `compute` has run.
    #[must_use]
    pub fn recompute_count(&self) -> u64 {
        self.inner.recomputes.get()
    }

    /// Type-erased handle for registering this value as a dependency.
    #[must_use]
    pub fn dependency(&self) -> Rc<dyn Dependency> {
        self.inner.clone()
    }

    /// Ids of the registered dependencies, in registration order.
    #[must_use]
    pub fn dependency_ids(&self) -> Vec<NodeId> {
        self.inner.deps.iter().map(|d| d.node_id()).collect()
    }
}

impl<T: Clone + Default + 'static> Derived<T> {
    /// Get the current value, recomputing only if a dependency changed.
    ///
    /// A cyclic read that reaches this node before its first compute
    /// finished yields `T::default()`.
    #[must_use]
    pub fn get(&self) -> T {
        self.try_get().unwrap_or_default()
    }

    /// Borrow the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.refresh();
        match &*self.inner.cache.borrow() {
            Some(value) => f(value),
            None => f(&T::default()),
        }
    }
}

impl<T: Clone + Default + 'static> Source<T> for Derived<T> {
    fn current(&self) -> T {
        self.get()
    }

    fn dependency(&self) -> Rc<dyn Dependency> {
        Derived::dependency(self)
    }
}

impl<T> fmt::Debug for Derived<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derived")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("version", &self.inner.version.get())
            .field("recomputes", &self.inner.recomputes.get())
            .finish()
    }
}
