#![forbid(unsafe_code)]

//! Painel Runtime
//!
//! Reactive state for admin screens: mutable cells, memoized derived values
//! with explicit dependencies, deferred writes, searchable/paginated
//! collection views and last-write-wins fetch coordination.
//!
//! # Key Components
//!
//! - [`StateCell`] - Named, versioned input value with change callbacks
//! - [`Derived`] - Lazily recomputed value over registered dependencies
//! - [`DerivationGraph`] - Per-screen factory and deferred-write owner
//! - [`DeferredWrites`] - Writes that run after the current reaction
//! - [`CollectionView`] - Search, filter and pagination over a collection
//! - [`FetchCoordinator`] - Token-based stale-response rejection
//!
//! # Role in Painel
//! `painel-runtime` is the bottom layer. `painel-forms` builds rule sets,
//! forms and the submit/load flows on top of these cells, and the `painel`
//! facade re-exports both.
//!
//! Everything here is single-threaded: handles are `Rc`-based and not `Send`.

pub mod collection;
pub mod error;
pub mod fetch;
pub mod reactive;

pub use collection::{
    CollectionConfig, CollectionView, Filter, FlagFilter, Refresh, SelectOption,
};
pub use error::FetchError;
pub use fetch::{FetchCoordinator, FetchEvent, FetchToken, FetchTrace};
pub use reactive::{
    DeferConfig, DeferredWrites, Dependency, DerivationGraph, Derived, NodeId, ReactionScope,
    Source, StaleLink, StateCell, Subscription,
};
