#![forbid(unsafe_code)]

//! Reactive state for Painel screens.
//!
//! This module provides the change-tracking primitives every list and form
//! screen is built from:
//!
//! - [`StateCell`]: a named, version-stamped mutable value with change
//!   notification via subscriber callbacks.
//! - [`Subscription`]: RAII guard that automatically unsubscribes on drop.
//! - [`Derived`]: a lazily-evaluated, memoized value computed from explicitly
//!   registered dependencies (cells or other derived values).
//! - [`DerivationGraph`]: the per-screen context that allocates node ids,
//!   tracks the write generation and owns the deferred-write queue.
//! - [`DeferredWrites`] / [`ReactionScope`]: writes queued until the current
//!   reaction completes.
//!
//! # Architecture
//!
//! Handles use `Rc<RefCell<..>>` for single-threaded shared ownership. A screen
//! owns its graph; nothing here is `Send`.
//!
//! A cell write bumps the cell version and the graph generation, flags every
//! directly dependent [`Derived`] as stale and then runs subscribers. Nothing
//! is recomputed until someone calls [`Derived::get`].
//!
//! # Invariants
//!
//! 1. A cell's version increments exactly once per write.
//! 2. Subscribers are notified in registration order.
//! 3. A derived value is returned from cache iff every dependency version
//!    matches the version seen at the last recompute.
//! 4. Within one generation (no intervening writes) a derived node walks its
//!    dependencies at most once, so diamonds never recompute a shared node twice.
//! 5. `Derived::get()` never returns a stale value.
//! 6. Deferred writes queued inside a [`ReactionScope`] run when the outermost
//!    scope exits, never earlier.

mod cell;
mod deferred;
mod graph;

pub use cell::{StateCell, Subscription};
pub use deferred::{DeferConfig, DeferredWrites, ReactionScope};
pub use graph::{Dependency, DerivationGraph, Derived, NodeId, Source, StaleLink};
