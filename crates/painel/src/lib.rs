#![forbid(unsafe_code)]

//! Painel public facade crate.
//!
//! Re-exports the reactive runtime and the forms engine behind one stable
//! surface, with a prelude for screen code.

// --- Runtime re-exports ----------------------------------------------------

pub use painel_runtime::{
    CollectionConfig, CollectionView, DeferConfig, DeferredWrites, Dependency, DerivationGraph,
    Derived, FetchCoordinator, FetchError, FetchEvent, FetchToken, FetchTrace, Filter, FlagFilter,
    NodeId, ReactionScope, Refresh, SelectOption, Source, StateCell, Subscription,
};

// --- Forms re-exports ------------------------------------------------------

#[cfg(feature = "forms")]
pub use painel_forms::{
    Activation, Banner, BannerKind, BlockReason, Coercion, ConditionalPolicy, CrossFailure,
    CrossFieldRule, DataSource, EntityLoader, FieldValue, Form, FormError, FormProjection,
    FormSnapshot, JsonProjection, ListParams, LoaderConfig, Navigator, RuleSet,
    SubmissionController, SubmitAttempt, SubmitConfig, SubmitMode, SubmitStatus,
    validation::{ValidationError, ValidationResult, Validator},
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for screens built on painel.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The data collaborator failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// A form was used against its declared shape.
    #[cfg(feature = "forms")]
    #[error(transparent)]
    Form(#[from] FormError),
}

/// Standard result type for painel APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        CollectionConfig, CollectionView, DerivationGraph, Derived, Error, FetchError,
        FetchToken, FlagFilter, Refresh, Result, StateCell,
    };

    #[cfg(feature = "forms")]
    pub use crate::{
        Activation, ConditionalPolicy, CrossFieldRule, DataSource, EntityLoader, FieldValue,
        Form, FormProjection, JsonProjection, Navigator, RuleSet, SubmissionController,
        SubmitAttempt, SubmitMode, Validator,
    };

    #[cfg(feature = "forms")]
    pub use crate::forms;
    pub use crate::runtime;
}

#[cfg(feature = "forms")]
pub use painel_forms as forms;
pub use painel_runtime as runtime;
