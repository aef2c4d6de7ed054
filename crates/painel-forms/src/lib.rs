#![forbid(unsafe_code)]

//! Painel Forms
//!
//! Conditional validation and the submit/load flows of admin form screens,
//! built on the state cells of `painel-runtime`.
//!
//! # Key Components
//!
//! - [`RuleSet`] - Static validators, conditional policies, cross-field rules
//! - [`Form`] - Field state evaluated against its rule set on every write
//! - [`SubmissionController`] - Single-flight validate → project → dispatch
//! - [`EntityLoader`] - Load by id → populate → deferred widget sync
//! - [`FormProjection`] - Entity ↔ form ↔ payload mapping
//! - [`DataSource`] / [`Navigator`] - Host collaborators
//!
//! # Example
//!
//! ```rust
//! use painel_forms::{CrossFieldRule, Form, RuleSet, validation::Validator};
//! use painel_runtime::DerivationGraph;
//!
//! let rules = RuleSet::new()
//!     .field("senha", [Validator::Required, Validator::MinLength(8)])
//!     .field("confirmarSenha", [Validator::Required])
//!     .cross(CrossFieldRule::matches("confirmarSenha", "senha"));
//! let form = Form::new(&DerivationGraph::new(), rules).unwrap();
//!
//! form.set("senha", "Abc12345").unwrap();
//! form.set("confirmarSenha", "Abc12345").unwrap();
//! assert!(form.is_valid());
//! ```

pub mod collaborators;
pub mod error;
pub mod form;
pub mod loader;
pub mod projection;
pub mod rules;
pub mod submit;
pub mod validation;
pub mod value;

pub use collaborators::{DataSource, ListParams, Navigator};
pub use error::{BlockReason, FetchError, FormError};
pub use form::{CrossFailure, Form};
pub use loader::{EntityLoader, LoaderConfig};
pub use projection::{Coercion, FormProjection, JsonProjection};
pub use rules::{Activation, ConditionalPolicy, CrossFieldRule, FieldSpec, ListSpec, RuleSet};
pub use submit::{
    Banner, BannerKind, SubmissionController, SubmitAttempt, SubmitConfig, SubmitMode,
    SubmitStatus,
};
pub use value::{FieldValue, FormSnapshot};
