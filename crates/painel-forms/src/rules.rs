#![forbid(unsafe_code)]

//! Field rule sets: static validators, conditional policies and cross-field
//! rules.
//!
//! A [`ConditionalPolicy`] watches one driver field. Whenever the driver
//! changes, its `resolve` function returns one [`Activation`] per dependent
//! field; the form then replaces each dependent's conditional validators with
//! the activated list. Dependents missing from the result get no conditional
//! validators, so reapplying the same driver value always lands on the same
//! state.
//!
//! Static validators declared with [`RuleSet::field`] always stay active.

use std::fmt;
use std::rc::Rc;

use crate::validation::{
    ERROR_CODE_BELOW_MINIMUM, ERROR_CODE_MISMATCH, ValidationError, ValidationResult, Validator,
};
use crate::value::{FieldValue, FormSnapshot};

// ---------------------------------------------------------------------------
// Activation / ConditionalPolicy
// ---------------------------------------------------------------------------

/// Validators activated on one dependent field for one driver value.
#[derive(Debug, Clone, PartialEq)]
pub struct Activation {
    /// Dependent field.
    pub field: String,
    /// Conditional validators to activate.
    pub validators: Vec<Validator>,
    /// Force the dependent's value to `Empty`.
    pub clear: bool,
}

impl Activation {
    /// Activate `validators` on `field`.
    pub fn new(field: impl Into<String>, validators: impl IntoIterator<Item = Validator>) -> Self {
        Self {
            field: field.into(),
            validators: validators.into_iter().collect(),
            clear: false,
        }
    }

    /// Clear `field` and activate nothing on it.
    pub fn cleared(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            validators: Vec::new(),
            clear: true,
        }
    }
}

type Resolver = Rc<dyn Fn(&FieldValue) -> Vec<Activation>>;

/// Replaces the conditional validators of `dependents` from the driver value.
#[derive(Clone)]
pub struct ConditionalPolicy {
    driver: String,
    dependents: Vec<String>,
    resolve: Resolver,
}

impl ConditionalPolicy {
    /// Create a policy.
    pub fn new<I, S>(
        driver: impl Into<String>,
        dependents: I,
        resolve: impl Fn(&FieldValue) -> Vec<Activation> + 'static,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            driver: driver.into(),
            dependents: dependents.into_iter().map(Into::into).collect(),
            resolve: Rc::new(resolve),
        }
    }

    /// Driver field name.
    #[must_use]
    pub fn driver(&self) -> &str {
        &self.driver
    }

    /// Fields whose conditional validators this policy owns.
    #[must_use]
    pub fn dependents(&self) -> &[String] {
        &self.dependents
    }

    /// Activations for a driver value.
    #[must_use]
    pub fn resolve(&self, driver_value: &FieldValue) -> Vec<Activation> {
        (self.resolve)(driver_value)
    }
}

impl fmt::Debug for ConditionalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionalPolicy")
            .field("driver", &self.driver)
            .field("dependents", &self.dependents)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// CrossFieldRule
// ---------------------------------------------------------------------------

type CrossCheck = Rc<dyn Fn(&FormSnapshot) -> ValidationResult>;

/// A rule over several fields at once.
///
/// Failures attach to the form, and are also reported for each participating
/// field.
#[derive(Clone)]
pub struct CrossFieldRule {
    code: &'static str,
    fields: Vec<String>,
    applies_when: Option<(String, Vec<FieldValue>)>,
    check: CrossCheck,
}

impl CrossFieldRule {
    /// Create a rule from a check returning a full result.
    pub fn new<I, S>(
        code: &'static str,
        fields: I,
        check: impl Fn(&FormSnapshot) -> ValidationResult + 'static,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            code,
            fields: fields.into_iter().map(Into::into).collect(),
            applies_when: None,
            check: Rc::new(check),
        }
    }

    /// `confirm` must equal `original` (compared as text).
    pub fn matches(confirm: impl Into<String>, original: impl Into<String>) -> Self {
        let (confirm, original) = (confirm.into(), original.into());
        let (c, o) = (confirm.clone(), original.clone());
        Self::new(ERROR_CODE_MISMATCH, [confirm, original], move |snap| {
            if snap.get(&c).as_text() == snap.get(&o).as_text() {
                ValidationResult::Valid
            } else {
                ValidationResult::Invalid(
                    ValidationError::new(ERROR_CODE_MISMATCH, "{field} does not match {other}")
                        .with_param("field", &c)
                        .with_param("other", &o),
                )
            }
        })
    }

    /// `limit` must be `>= minimum`. Passes while either side is empty or
    /// non-numeric; per-field validators report those cases.
    pub fn at_least(limit: impl Into<String>, minimum: impl Into<String>) -> Self {
        let (limit, minimum) = (limit.into(), minimum.into());
        let (l, m) = (limit.clone(), minimum.clone());
        Self::new(ERROR_CODE_BELOW_MINIMUM, [limit, minimum], move |snap| {
            match (snap.get(&l).as_number(), snap.get(&m).as_number()) {
                (Some(lv), Some(mv)) if lv < mv => ValidationResult::Invalid(
                    ValidationError::new(
                        ERROR_CODE_BELOW_MINIMUM,
                        "{field} must be at least {other} ({minimum})",
                    )
                    .with_param("field", &l)
                    .with_param("other", &m)
                    .with_param("minimum", mv),
                ),
                _ => ValidationResult::Valid,
            }
        })
    }

    /// Only evaluate while `driver` holds one of `values`.
    #[must_use]
    pub fn when<I, V>(mut self, driver: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FieldValue>,
    {
        self.applies_when = Some((driver.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    /// Stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Participating fields.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Driver gating this rule, if any.
    #[must_use]
    pub fn driver(&self) -> Option<&str> {
        self.applies_when.as_ref().map(|(d, _)| d.as_str())
    }

    /// Whether `field` participates.
    #[must_use]
    pub fn involves(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    /// Whether the rule applies to this snapshot.
    #[must_use]
    pub fn applies(&self, snapshot: &FormSnapshot) -> bool {
        match &self.applies_when {
            None => true,
            Some((driver, values)) => values.contains(snapshot.get(driver)),
        }
    }

    /// Evaluate; inapplicable rules pass.
    #[must_use]
    pub fn evaluate(&self, snapshot: &FormSnapshot) -> ValidationResult {
        if self.applies(snapshot) {
            (self.check)(snapshot)
        } else {
            ValidationResult::Valid
        }
    }
}

impl fmt::Debug for CrossFieldRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrossFieldRule")
            .field("code", &self.code)
            .field("fields", &self.fields)
            .field("applies_when", &self.applies_when)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// RuleSet
// ---------------------------------------------------------------------------

/// Declaration of one field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Field name.
    pub name: String,
    /// Value at construction.
    pub initial: FieldValue,
    /// Validators that are always active.
    pub validators: Vec<Validator>,
}

/// Declaration of one list section.
#[derive(Debug, Clone)]
pub struct ListSpec {
    /// Section name.
    pub name: String,
    /// Submission requires at least one item.
    pub required: bool,
}

/// Builder for the complete rule set of one form.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    fields: Vec<FieldSpec>,
    lists: Vec<ListSpec>,
    policies: Vec<ConditionalPolicy>,
    cross: Vec<CrossFieldRule>,
}

impl RuleSet {
    /// Empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field starting `Empty`.
    #[must_use]
    pub fn field(
        self,
        name: impl Into<String>,
        validators: impl IntoIterator<Item = Validator>,
    ) -> Self {
        self.field_with(name, FieldValue::Empty, validators)
    }

    /// Declare a field with an initial value.
    #[must_use]
    pub fn field_with(
        mut self,
        name: impl Into<String>,
        initial: impl Into<FieldValue>,
        validators: impl IntoIterator<Item = Validator>,
    ) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            initial: initial.into(),
            validators: validators.into_iter().collect(),
        });
        self
    }

    /// Declare a list section.
    #[must_use]
    pub fn list(mut self, name: impl Into<String>, required: bool) -> Self {
        self.lists.push(ListSpec {
            name: name.into(),
            required,
        });
        self
    }

    /// Add a conditional policy.
    #[must_use]
    pub fn policy(mut self, policy: ConditionalPolicy) -> Self {
        self.policies.push(policy);
        self
    }

    /// Add a cross-field rule.
    #[must_use]
    pub fn cross(mut self, rule: CrossFieldRule) -> Self {
        self.cross.push(rule);
        self
    }

    /// Declared fields.
    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Declared list sections.
    #[must_use]
    pub fn lists(&self) -> &[ListSpec] {
        &self.lists
    }

    /// Conditional policies.
    #[must_use]
    pub fn policies(&self) -> &[ConditionalPolicy] {
        &self.policies
    }

    /// Cross-field rules.
    #[must_use]
    pub fn cross_rules(&self) -> &[CrossFieldRule] {
        &self.cross
    }
}
