#![forbid(unsafe_code)]

//! [`StateCell`]: a named, version-stamped value with change notification.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use super::graph::{
    Dependency, NodeId, Source, StaleLink, advance_generation, allocate_node, mark_dependents,
};

type Callback<T> = dyn Fn(&T);

struct CellNode<T> {
    id: NodeId,
    name: String,
    value: RefCell<T>,
    version: Cell<u64>,
    dependents: RefCell<Vec<StaleLink>>,
    subscribers: RefCell<Vec<Weak<Callback<T>>>>,
}

impl<T> Dependency for CellNode<T> {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn version(&self) -> u64 {
        self.version.get()
    }

    fn refresh(&self) -> u64 {
        self.version.get()
    }

    fn is_stale(&self) -> bool {
        false
    }

    fn link(&self, link: StaleLink) {
        self.dependents.borrow_mut().push(link);
    }
}

/// A single mutable input value owned by one screen.
///
/// Writes are always accepted; shape validation belongs to validators, not
/// to the cell. Cloning yields another handle to the same cell.
pub struct StateCell<T> {
    inner: Rc<CellNode<T>>,
}

impl<T> Clone for StateCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> StateCell<T> {
    /// Create a cell. Prefer [`DerivationGraph::cell`](super::DerivationGraph::cell)
    /// so the owning graph accounts for it.
    pub fn new(name: impl Into<String>, value: T) -> Self {
        Self {
            inner: Rc::new(CellNode {
                id: allocate_node(),
                name: name.into(),
                value: RefCell::new(value),
                version: Cell::new(0),
                dependents: RefCell::new(Vec::new()),
                subscribers: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Clone out the current value.
    #[must_use]
    pub fn read(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Replace the value.
    ///
    /// Bumps the version, flags direct dependents stale (without recomputing
    /// them) and then notifies subscribers in registration order.
    pub fn write(&self, value: T) {
        *self.inner.value.borrow_mut() = value;
        self.commit();
    }

    /// Mutate the value in place. Counts as one write.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.inner.value.borrow_mut());
        self.commit();
    }

    fn commit(&self) {
        let version = self.inner.version.get() + 1;
        self.inner.version.set(version);
        advance_generation();
        trace!(cell = %self.inner.name, id = %self.inner.id, version, "cell write");
        mark_dependents(&self.inner.dependents);
        self.notify();
    }

    fn notify(&self) {
        let callbacks: Vec<Rc<Callback<T>>> = {
            let mut subs = self.inner.subscribers.borrow_mut();
            subs.retain(|weak| weak.strong_count() > 0);
            subs.iter().filter_map(Weak::upgrade).collect()
        };
        if callbacks.is_empty() {
            return;
        }
        // Callbacks get a snapshot so they are free to write back into this cell.
        let snapshot = self.read();
        for callback in callbacks {
            callback(&snapshot);
        }
    }

    /// Register a change callback. Dropping the returned guard unsubscribes.
    #[must_use = "dropping the subscription immediately unsubscribes"]
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let callback: Rc<Callback<T>> = Rc::new(callback);
        self.inner
            .subscribers
            .borrow_mut()
            .push(Rc::downgrade(&callback));
        Subscription {
            _callback: Box::new(callback),
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .borrow()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Number of live derived values registered on this cell.
    #[must_use]
    pub fn dependent_count(&self) -> usize {
        self.inner
            .dependents
            .borrow()
            .iter()
            .filter(|link| link.is_live())
            .count()
    }

    /// Version counter; increments on every write.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Cell identity.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Debug name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }
}

impl<T: Clone + 'static> Source<T> for StateCell<T> {
    fn current(&self) -> T {
        self.read()
    }

    fn dependency(&self) -> Rc<dyn Dependency> {
        self.inner.clone()
    }
}

impl<T: Clone + 'static> StateCell<T> {
    /// Type-erased handle for registering this cell as a dependency.
    #[must_use]
    pub fn dependency(&self) -> Rc<dyn Dependency> {
        Source::dependency(self)
    }
}

impl<T: fmt::Debug> fmt::Debug for StateCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateCell")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("version", &self.inner.version.get())
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

/// RAII guard for a change callback.
#[must_use = "dropping the subscription immediately unsubscribes"]
pub struct Subscription {
    _callback: Box<dyn Any>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Subscription")
    }
}
