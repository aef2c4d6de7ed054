#![forbid(unsafe_code)]

//! Deferred writes: cell writes that run after the current reaction.
//!
//! Some selection widgets only register their options once the reaction that
//! bulk-loaded a screen has finished. Writing the selected value in the same
//! reaction makes the widget drop it. Instead of sleeping on a timer, the
//! write is queued here and runs when the outermost [`ReactionScope`] exits
//! (or when the host calls [`DeferredWrites::flush`]).
//!
//! [`DeferConfig::ui_registration_delay`] is only a hint for hosts that
//! drive a real event loop and want to flush on a short timer instead. It is
//! a widget-registration accommodation, not a correctness wait.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use super::cell::StateCell;

/// Configuration for deferred writes.
#[derive(Debug, Clone)]
pub struct DeferConfig {
    /// Suggested delay before a timer-driven host flushes the queue.
    pub ui_registration_delay: Duration,
}

impl Default for DeferConfig {
    fn default() -> Self {
        Self {
            ui_registration_delay: Duration::from_millis(50),
        }
    }
}

impl DeferConfig {
    /// Set the suggested flush delay.
    #[must_use]
    pub fn ui_registration_delay(mut self, delay: Duration) -> Self {
        self.ui_registration_delay = delay;
        self
    }
}

struct DeferredInner {
    queue: RefCell<VecDeque<Box<dyn FnOnce()>>>,
    depth: Cell<usize>,
    flushed: Cell<u64>,
    config: DeferConfig,
}

/// Queue of writes that wait for the current reaction to complete.
#[derive(Clone)]
pub struct DeferredWrites {
    inner: Rc<DeferredInner>,
}

impl DeferredWrites {
    /// Create an empty queue.
    #[must_use]
    pub fn new(config: DeferConfig) -> Self {
        Self {
            inner: Rc::new(DeferredInner {
                queue: RefCell::new(VecDeque::new()),
                depth: Cell::new(0),
                flushed: Cell::new(0),
                config,
            }),
        }
    }

    /// Queue a write of `value` into `cell`.
    pub fn defer<T: Clone + 'static>(&self, cell: &StateCell<T>, value: T) {
        let cell = cell.clone();
        self.defer_with(move || cell.write(value));
    }

    /// Queue an arbitrary write action.
    pub fn defer_with(&self, write: impl FnOnce() + 'static) {
        self.inner.queue.borrow_mut().push_back(Box::new(write));
    }

    /// Number of queued writes.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Whether a reaction scope is currently open.
    #[must_use]
    pub fn in_reaction(&self) -> bool {
        self.inner.depth.get() > 0
    }

    /// Total writes executed by flushes so far.
    #[must_use]
    pub fn flushed_total(&self) -> u64 {
        self.inner.flushed.get()
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &DeferConfig {
        &self.inner.config
    }

    /// Run every queued write in FIFO order, including writes queued by the
    /// writes themselves. Returns how many ran.
    pub fn flush(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.inner.queue.borrow_mut().pop_front();
            let Some(write) = next else {
                break;
            };
            write();
            ran += 1;
        }
        if ran > 0 {
            self.inner.flushed.set(self.inner.flushed.get() + ran as u64);
            debug!(ran, "flushed deferred writes");
        }
        ran
    }

    /// Open a reaction scope. Nested scopes are allowed; only the outermost
    /// one flushes when dropped.
    #[must_use = "dropping the scope immediately flushes deferred writes"]
    pub fn reaction(&self) -> ReactionScope {
        self.inner.depth.set(self.inner.depth.get() + 1);
        ReactionScope {
            writes: self.clone(),
        }
    }
}

impl fmt::Debug for DeferredWrites {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredWrites")
            .field("pending", &self.pending())
            .field("depth", &self.inner.depth.get())
            .field("config", &self.inner.config)
            .finish()
    }
}

/// RAII guard for one reaction to an external event.
#[must_use = "dropping the scope immediately flushes deferred writes"]
pub struct ReactionScope {
    writes: DeferredWrites,
}

impl Drop for ReactionScope {
    fn drop(&mut self) {
        let depth = self.writes.inner.depth.get().saturating_sub(1);
        self.writes.inner.depth.set(depth);
        if depth == 0 {
            self.writes.flush();
        }
    }
}

impl fmt::Debug for ReactionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactionScope")
            .field("depth", &self.writes.inner.depth.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::DerivationGraph;

    #[test]
    fn deferred_write_waits_for_scope_exit() {
        let graph = DerivationGraph::new();
        let selected = graph.cell("selected", String::new());

        {
            let _reaction = graph.reaction();
            graph.deferred().defer(&selected, "7".to_string());
            assert_eq!(selected.read(), "");
            assert_eq!(graph.deferred().pending(), 1);
        }

        assert_eq!(selected.read(), "7");
        assert_eq!(graph.deferred().pending(), 0);
    }

    #[test]
    fn nested_scopes_flush_once_at_outermost() {
        let graph = DerivationGraph::new();
        let cell = graph.cell("n", 0);

        let outer = graph.reaction();
        {
            let _inner = graph.reaction();
            graph.deferred().defer(&cell, 1);
        }
        assert_eq!(cell.read(), 0, "inner scope must not flush");
        drop(outer);
        assert_eq!(cell.read(), 1);
        assert_eq!(cell.version(), 1);
    }

    #[test]
    fn writes_outside_scope_wait_for_explicit_flush() {
        let graph = DerivationGraph::new();
        let cell = graph.cell("n", 0);
        graph.deferred().defer(&cell, 5);
        assert_eq!(cell.read(), 0);
        assert_eq!(graph.deferred().flush(), 1);
        assert_eq!(cell.read(), 5);
    }

    #[test]
    fn flush_runs_chained_writes_in_order() {
        let graph = DerivationGraph::new();
        let log = graph.cell("log", Vec::<u8>::new());
        let deferred = graph.deferred().clone();

        let l = log.clone();
        let d = deferred.clone();
        deferred.defer_with(move || {
            l.update(|v| v.push(1));
            let l2 = l.clone();
            d.defer_with(move || l2.update(|v| v.push(3)));
        });
        let l = log.clone();
        deferred.defer_with(move || l.update(|v| v.push(2)));

        assert_eq!(deferred.flush(), 3);
        assert_eq!(log.read(), vec![1, 2, 3]);
        assert_eq!(deferred.flushed_total(), 3);
    }

    #[test]
    fn default_delay_is_short() {
        let config = DeferConfig::default();
        assert_eq!(config.ui_registration_delay, Duration::from_millis(50));
        let tuned = config.ui_registration_delay(Duration::from_millis(10));
        assert_eq!(tuned.ui_registration_delay, Duration::from_millis(10));
    }
}
