#![forbid(unsafe_code)]

//! Field validation: validators, error codes and results.
//!
//! Validators are a closed enum so that conditional policies can compare
//! and replace active lists without accumulating duplicates.
//!
//! # Example
//!
//! ```rust
//! use painel_forms::validation::Validator;
//! use painel_forms::{FieldValue, FormSnapshot};
//!
//! let snapshot = FormSnapshot::default();
//! let min = Validator::Min(1.0);
//! assert!(min.validate(&FieldValue::text("3"), &snapshot).is_valid());
//! assert!(!min.validate(&FieldValue::text("0"), &snapshot).is_valid());
//! ```

mod validators;

pub use validators::{
    // Core types
    CustomRule,
    // Error codes
    ERROR_CODE_BELOW_MINIMUM,
    ERROR_CODE_MAX,
    ERROR_CODE_MAX_LENGTH,
    ERROR_CODE_MIN,
    ERROR_CODE_MIN_LENGTH,
    ERROR_CODE_MISMATCH,
    ERROR_CODE_NUMBER,
    ERROR_CODE_PATTERN,
    ERROR_CODE_REQUIRED,
    PatternRule,
    ValidationError,
    ValidationResult,
    Validator,
};
