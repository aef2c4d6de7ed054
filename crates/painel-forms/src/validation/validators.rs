#![forbid(unsafe_code)]

//! Core validation types and the built-in validators.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use regex::Regex;

use crate::error::FormError;
use crate::value::{FieldValue, FormSnapshot};

// ---------------------------------------------------------------------------
// Error Codes (for i18n lookup)
// ---------------------------------------------------------------------------

/// Error code for required field validation.
pub const ERROR_CODE_REQUIRED: &str = "required";
/// Error code for minimum length validation.
pub const ERROR_CODE_MIN_LENGTH: &str = "too_short";
/// Error code for maximum length validation.
pub const ERROR_CODE_MAX_LENGTH: &str = "too_long";
/// Error code for pattern validation.
pub const ERROR_CODE_PATTERN: &str = "pattern";
/// Error code for a value below [`Validator::Min`].
pub const ERROR_CODE_MIN: &str = "min";
/// Error code for a value above [`Validator::Max`].
pub const ERROR_CODE_MAX: &str = "max";
/// Error code for non-numeric text under a numeric validator.
pub const ERROR_CODE_NUMBER: &str = "number";
/// Error code for a failed confirmation pair.
pub const ERROR_CODE_MISMATCH: &str = "mismatch";
/// Error code for a limit below its minimum.
pub const ERROR_CODE_BELOW_MINIMUM: &str = "below_minimum";

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// One failed check on a field or a cross-field rule.
///
/// `code` is one of the `ERROR_CODE_*` constants (or a custom rule name) and
/// stays stable for lookups; `message` is an English template whose `{key}`
/// placeholders are filled from `params`.
///
/// ```rust
/// use painel_forms::validation::ValidationError;
///
/// let error = ValidationError::new("too_short", "Must be at least {min} characters")
///     .with_param("min", 8);
///
/// assert_eq!(error.format_message(), "Must be at least 8 characters");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Stable code.
    pub code: &'static str,
    /// Message template.
    pub message: String,
    /// Placeholder values, by name.
    pub params: BTreeMap<String, String>,
}

impl ValidationError {
    /// Error with no parameters.
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            params: BTreeMap::new(),
        }
    }

    /// Set placeholder `key`.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(key.into(), value.to_string());
        self
    }

    /// The template with every known placeholder filled in.
    #[must_use]
    pub fn format_message(&self) -> String {
        self.params
            .iter()
            .fold(self.message.clone(), |text, (key, value)| {
                text.replace(&format!("{{{key}}}"), value)
            })
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_message())
    }
}

impl std::error::Error for ValidationError {}

// ---------------------------------------------------------------------------
// ValidationResult
// ---------------------------------------------------------------------------

/// Outcome of one validator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ValidationResult {
    /// Passed.
    #[default]
    Valid,
    /// Failed with this error.
    Invalid(ValidationError),
}

impl ValidationResult {
    /// Whether the check passed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// The error, if the check failed.
    #[must_use]
    pub fn into_error(self) -> Option<ValidationError> {
        match self {
            Self::Valid => None,
            Self::Invalid(e) => Some(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Pattern / Custom payloads
// ---------------------------------------------------------------------------

/// A compiled, fully anchored regular expression.
///
/// Two rules are equal when their source patterns are equal.
#[derive(Clone)]
pub struct PatternRule {
    source: String,
    regex: Regex,
}

impl PatternRule {
    /// Compile `pattern`, anchored at both ends.
    pub fn new(pattern: &str) -> Result<Self, FormError> {
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|err| {
            FormError::InvalidPattern {
                pattern: pattern.to_string(),
                message: err.to_string(),
            }
        })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// The pattern as written.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether `text` matches in full.
    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for PatternRule {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Debug for PatternRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PatternRule").field(&self.source).finish()
    }
}

type CustomCheck = Rc<dyn Fn(&FieldValue, &FormSnapshot) -> bool>;

/// A named predicate. Two rules are equal when their names are equal.
#[derive(Clone)]
pub struct CustomRule {
    name: &'static str,
    message: String,
    check: CustomCheck,
}

impl CustomRule {
    /// Name, used as the error code.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for CustomRule {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for CustomRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomRule")
            .field("name", &self.name)
            .field("message", &self.message)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// A pure check of one field value against the whole-form snapshot.
///
/// Every validator except [`Validator::Required`] passes on an empty value;
/// combine with `Required` to demand presence.
#[derive(Debug, Clone, PartialEq)]
pub enum Validator {
    /// Value must not be empty (whitespace-only text counts as empty).
    Required,
    /// Text must have at least `n` characters.
    MinLength(usize),
    /// Text must have at most `n` characters.
    MaxLength(usize),
    /// Text must match the pattern in full.
    Pattern(PatternRule),
    /// Number must be `>= x`.
    Min(f64),
    /// Number must be `<= x`.
    Max(f64),
    /// Caller-supplied predicate.
    Custom(CustomRule),
}

impl Validator {
    /// Compile a [`Validator::Pattern`].
    pub fn pattern(pattern: &str) -> Result<Self, FormError> {
        PatternRule::new(pattern).map(Self::Pattern)
    }

    /// Build a [`Validator::Custom`].
    pub fn custom(
        name: &'static str,
        message: impl Into<String>,
        check: impl Fn(&FieldValue, &FormSnapshot) -> bool + 'static,
    ) -> Self {
        Self::Custom(CustomRule {
            name,
            message: message.into(),
            check: Rc::new(check),
        })
    }

    /// Error code this validator reports.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Required => ERROR_CODE_REQUIRED,
            Self::MinLength(_) => ERROR_CODE_MIN_LENGTH,
            Self::MaxLength(_) => ERROR_CODE_MAX_LENGTH,
            Self::Pattern(_) => ERROR_CODE_PATTERN,
            Self::Min(_) => ERROR_CODE_MIN,
            Self::Max(_) => ERROR_CODE_MAX,
            Self::Custom(rule) => rule.name,
        }
    }

    /// Validate `value`.
    #[must_use]
    pub fn validate(&self, value: &FieldValue, snapshot: &FormSnapshot) -> ValidationResult {
        if value.is_empty() {
            return match self {
                Self::Required => invalid(ValidationError::new(
                    ERROR_CODE_REQUIRED,
                    "This field is required",
                )),
                Self::Custom(rule) => custom(rule, value, snapshot),
                _ => ValidationResult::Valid,
            };
        }

        match self {
            Self::Required => ValidationResult::Valid,
            Self::MinLength(min) => {
                let len = value.as_text().chars().count();
                if len < *min {
                    invalid(
                        ValidationError::new(
                            ERROR_CODE_MIN_LENGTH,
                            "Must be at least {min} characters",
                        )
                        .with_param("min", min)
                        .with_param("actual", len),
                    )
                } else {
                    ValidationResult::Valid
                }
            }
            Self::MaxLength(max) => {
                let len = value.as_text().chars().count();
                if len > *max {
                    invalid(
                        ValidationError::new(
                            ERROR_CODE_MAX_LENGTH,
                            "Must be at most {max} characters",
                        )
                        .with_param("max", max)
                        .with_param("actual", len),
                    )
                } else {
                    ValidationResult::Valid
                }
            }
            Self::Pattern(rule) => {
                if rule.is_match(&value.as_text()) {
                    ValidationResult::Valid
                } else {
                    invalid(
                        ValidationError::new(ERROR_CODE_PATTERN, "Invalid format")
                            .with_param("pattern", rule.source()),
                    )
                }
            }
            Self::Min(min) => match value.as_number() {
                None => not_a_number(),
                Some(n) if n < *min => invalid(
                    ValidationError::new(ERROR_CODE_MIN, "Must be at least {min}")
                        .with_param("min", min),
                ),
                Some(_) => ValidationResult::Valid,
            },
            Self::Max(max) => match value.as_number() {
                None => not_a_number(),
                Some(n) if n > *max => invalid(
                    ValidationError::new(ERROR_CODE_MAX, "Must be at most {max}")
                        .with_param("max", max),
                ),
                Some(_) => ValidationResult::Valid,
            },
            Self::Custom(rule) => custom(rule, value, snapshot),
        }
    }
}

fn invalid(error: ValidationError) -> ValidationResult {
    ValidationResult::Invalid(error)
}

fn not_a_number() -> ValidationResult {
    invalid(ValidationError::new(ERROR_CODE_NUMBER, "Must be a number"))
}

fn custom(rule: &CustomRule, value: &FieldValue, snapshot: &FormSnapshot) -> ValidationResult {
    if (rule.check)(value, snapshot) {
        ValidationResult::Valid
    } else {
        invalid(ValidationError::new(rule.name, rule.message.clone()))
    }
}
