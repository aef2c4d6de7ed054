#![forbid(unsafe_code)]

//! The validation engine: field state, conditional policies and cross-field
//! rules evaluated over state cells.
//!
//! Every field value lives in a [`StateCell`]. The form subscribes to its own
//! cells, so any write (through [`Form::set`] or directly through
//! [`Form::value_cell`]) re-applies the policies whose driver changed and
//! re-evaluates every error before the write returns. Errors therefore always
//! equal the failures of the currently active validators.
//!
//! Writes made while an evaluation is running (a policy clearing a
//! dependent, a change hook writing back) are folded into the running
//! evaluation, which loops until no write is pending.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use painel_runtime::{DerivationGraph, StateCell, Subscription};
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::error::FormError;
use crate::rules::{ConditionalPolicy, CrossFieldRule, RuleSet};
use crate::validation::{ValidationError, Validator};
use crate::value::{FieldValue, FormSnapshot};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

struct FieldSlot {
    name: String,
    value: StateCell<FieldValue>,
    initial: FieldValue,
    touched: bool,
    static_validators: Vec<Validator>,
    conditional: Vec<Validator>,
    errors: Vec<ValidationError>,
}

impl FieldSlot {
    fn active(&self) -> Vec<Validator> {
        let mut active = self.static_validators.clone();
        for v in &self.conditional {
            if !active.contains(v) {
                active.push(v.clone());
            }
        }
        active
    }
}

struct ListSlot {
    name: String,
    required: bool,
    items: StateCell<Vec<Value>>,
    initial: Vec<Value>,
}

struct PolicySlot {
    policy: ConditionalPolicy,
    applied_version: Option<u64>,
}

/// A failed cross-field rule.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossFailure {
    /// Rule code.
    pub code: &'static str,
    /// Participating fields.
    pub fields: Vec<String>,
    /// The error.
    pub error: ValidationError,
}

#[derive(Default)]
struct FormState {
    fields: Vec<FieldSlot>,
    lists: Vec<ListSlot>,
    policies: Vec<PolicySlot>,
    cross: Vec<CrossFieldRule>,
    cross_failures: Vec<CrossFailure>,
}

impl FormState {
    fn field(&self, name: &str) -> Result<&FieldSlot, FormError> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| FormError::UnknownField(name.to_string()))
    }

    fn field_mut(&mut self, name: &str) -> Result<&mut FieldSlot, FormError> {
        self.fields
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or_else(|| FormError::UnknownField(name.to_string()))
    }

    fn list(&self, name: &str) -> Result<&ListSlot, FormError> {
        self.lists
            .iter()
            .find(|l| l.name == name)
            .ok_or_else(|| FormError::UnknownList(name.to_string()))
    }

    fn snapshot(&self) -> FormSnapshot {
        FormSnapshot::new(
            self.fields
                .iter()
                .map(|f| (f.name.clone(), f.value.read()))
                .collect(),
            self.lists
                .iter()
                .map(|l| (l.name.clone(), l.items.read()))
                .collect(),
        )
    }
}

struct FormInner {
    graph: DerivationGraph,
    state: RefCell<FormState>,
    busy: Cell<bool>,
    pending: Cell<bool>,
    revision: StateCell<u64>,
    subscriptions: RefCell<Vec<Subscription>>,
}

impl FormInner {
    fn changed(&self) {
        if self.busy.get() {
            self.pending.set(true);
            return;
        }
        self.busy.set(true);
        loop {
            self.pending.set(false);
            self.apply_policies();
            self.evaluate();
            if !self.pending.get() {
                break;
            }
        }
        self.busy.set(false);
        let revision = self.revision.read() + 1;
        self.revision.write(revision);
    }

    /// Re-apply every policy whose driver version moved. Resolvers run with
    /// no state borrow held, so they may read the form. Clears run last
    /// since they re-enter through subscriptions.
    fn apply_policies(&self) {
        let due: Vec<(usize, u64, FieldValue, ConditionalPolicy)> = {
            let state = self.state.borrow();
            state
                .policies
                .iter()
                .enumerate()
                .filter_map(|(index, slot)| {
                    let driver = state.fields.iter().find(|f| f.name == slot.policy.driver())?;
                    let version = driver.value.version();
                    (slot.applied_version != Some(version))
                        .then(|| (index, version, driver.value.read(), slot.policy.clone()))
                })
                .collect()
        };

        let mut clears: Vec<StateCell<FieldValue>> = Vec::new();
        for (index, version, driver_value, policy) in due {
            let activations = policy.resolve(&driver_value);
            debug!(
                driver = policy.driver(),
                value = %driver_value,
                activations = activations.len(),
                "conditional policy applied"
            );

            let mut state = self.state.borrow_mut();
            let FormState {
                fields, policies, ..
            } = &mut *state;
            for dependent in policy.dependents() {
                if let Some(field) = fields.iter_mut().find(|f| &f.name == dependent) {
                    field.conditional.clear();
                }
            }
            for activation in activations {
                if !policy.dependents().contains(&activation.field) {
                    warn!(
                        driver = policy.driver(),
                        field = %activation.field,
                        "activation for a field the policy does not own, ignored"
                    );
                    continue;
                }
                let Some(field) = fields.iter_mut().find(|f| f.name == activation.field) else {
                    continue;
                };
                field.conditional = activation.validators;
                if activation.clear && field.value.with(|v| *v != FieldValue::Empty) {
                    clears.push(field.value.clone());
                }
            }
            if let Some(slot) = policies.get_mut(index) {
                slot.applied_version = Some(version);
            }
        }
        for cell in clears {
            cell.write(FieldValue::Empty);
        }
    }

    fn evaluate(&self) {
        let mut state = self.state.borrow_mut();
        let snapshot = state.snapshot();

        for field in &mut state.fields {
            let value = snapshot.get(&field.name);
            field.errors = field
                .active()
                .iter()
                .filter_map(|v| v.validate(value, &snapshot).into_error())
                .collect();
        }

        let failures: Vec<CrossFailure> = state
            .cross
            .iter()
            .filter_map(|rule| {
                rule.evaluate(&snapshot).into_error().map(|error| CrossFailure {
                    code: rule.code(),
                    fields: rule.fields().to_vec(),
                    error,
                })
            })
            .collect();
        state.cross_failures = failures;
        trace!(
            invalid_fields = state.fields.iter().filter(|f| !f.errors.is_empty()).count(),
            cross_failures = state.cross_failures.len(),
            "form evaluated"
        );
    }
}

// ---------------------------------------------------------------------------
// Form
// ---------------------------------------------------------------------------

/// Form state plus its rule set.
///
/// Cloning yields another handle to the same form.
#[derive(Clone)]
pub struct Form {
    inner: Rc<FormInner>,
}

impl Form {
    /// Build a form from its rule set. Policies are applied once immediately.
    ///
    /// Fails when a policy or cross-field rule names an undeclared field, or a
    /// name is declared twice.
    pub fn new(graph: &DerivationGraph, rules: RuleSet) -> Result<Self, FormError> {
        check_declarations(&rules)?;

        let fields = rules
            .fields()
            .iter()
            .map(|spec| FieldSlot {
                name: spec.name.clone(),
                value: graph.cell(format!("form.{}", spec.name), spec.initial.clone()),
                initial: spec.initial.clone(),
                touched: false,
                static_validators: spec.validators.clone(),
                conditional: Vec::new(),
                errors: Vec::new(),
            })
            .collect();
        let lists = rules
            .lists()
            .iter()
            .map(|spec| ListSlot {
                name: spec.name.clone(),
                required: spec.required,
                items: graph.cell(format!("form.list.{}", spec.name), Vec::new()),
                initial: Vec::new(),
            })
            .collect();
        let policies = rules
            .policies()
            .iter()
            .map(|policy| PolicySlot {
                policy: policy.clone(),
                applied_version: None,
            })
            .collect();

        let inner = Rc::new(FormInner {
            graph: graph.clone(),
            state: RefCell::new(FormState {
                fields,
                lists,
                policies,
                cross: rules.cross_rules().to_vec(),
                cross_failures: Vec::new(),
            }),
            busy: Cell::new(false),
            pending: Cell::new(false),
            revision: graph.cell("form.revision", 0u64),
            subscriptions: RefCell::new(Vec::new()),
        });

        let subscriptions = {
            let state = inner.state.borrow();
            let mut subs = Vec::new();
            for field in &state.fields {
                let weak = Rc::downgrade(&inner);
                subs.push(field.value.subscribe(move |_| notify(&weak)));
            }
            for list in &state.lists {
                let weak = Rc::downgrade(&inner);
                subs.push(list.items.subscribe(move |_| notify(&weak)));
            }
            subs
        };
        *inner.subscriptions.borrow_mut() = subscriptions;

        inner.changed();
        Ok(Self { inner })
    }

    // --- values -------------------------------------------------------------

    /// Current value of `name`.
    pub fn get(&self, name: &str) -> Result<FieldValue, FormError> {
        Ok(self.value_cell(name)?.read())
    }

    /// Write `name`. Policies and errors are updated before this returns.
    pub fn set(&self, name: &str, value: impl Into<FieldValue>) -> Result<(), FormError> {
        self.value_cell(name)?.write(value.into());
        Ok(())
    }

    /// Write `name` and make the written value its pristine baseline.
    pub fn load_value(&self, name: &str, value: impl Into<FieldValue>) -> Result<(), FormError> {
        let value = value.into();
        let cell = {
            let mut state = self.inner.state.borrow_mut();
            let field = state.field_mut(name)?;
            field.initial = value.clone();
            field.touched = false;
            field.value.clone()
        };
        cell.write(value);
        Ok(())
    }

    /// The state cell backing `name`, for derivations and subscriptions.
    pub fn value_cell(&self, name: &str) -> Result<StateCell<FieldValue>, FormError> {
        Ok(self.inner.state.borrow().field(name)?.value.clone())
    }

    /// Declared field names in order.
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        self.inner
            .state
            .borrow()
            .fields
            .iter()
            .map(|f| f.name.clone())
            .collect()
    }

    /// Copy of every value and list section.
    #[must_use]
    pub fn snapshot(&self) -> FormSnapshot {
        self.inner.state.borrow().snapshot()
    }

    // --- touch / tracking ---------------------------------------------------

    /// Mark `name` touched so its errors become visible.
    pub fn touch(&self, name: &str) -> Result<(), FormError> {
        self.inner.state.borrow_mut().field_mut(name)?.touched = true;
        Ok(())
    }

    /// Mark every field touched.
    pub fn touch_all(&self) {
        for field in &mut self.inner.state.borrow_mut().fields {
            field.touched = true;
        }
    }

    /// Whether `name` was touched.
    pub fn is_touched(&self, name: &str) -> Result<bool, FormError> {
        Ok(self.inner.state.borrow().field(name)?.touched)
    }

    /// Whether any field or list differs from its baseline.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        let state = self.inner.state.borrow();
        state.fields.iter().any(|f| f.value.with(|v| *v != f.initial))
            || state.lists.iter().any(|l| l.items.with(|v| *v != l.initial))
    }

    /// Whether `name` differs from its baseline.
    pub fn is_field_dirty(&self, name: &str) -> Result<bool, FormError> {
        let state = self.inner.state.borrow();
        let field = state.field(name)?;
        Ok(field.value.with(|v| *v != field.initial))
    }

    /// Not dirty and nothing touched.
    #[must_use]
    pub fn is_pristine(&self) -> bool {
        !self.is_dirty() && !self.inner.state.borrow().fields.iter().any(|f| f.touched)
    }

    /// Make the current values the baseline and clear every touched flag.
    pub fn reset_tracking(&self) {
        let mut state = self.inner.state.borrow_mut();
        for field in &mut state.fields {
            field.initial = field.value.read();
            field.touched = false;
        }
        for list in &mut state.lists {
            list.initial = list.items.read();
        }
    }

    // --- validity -----------------------------------------------------------

    /// No field errors and no cross-field failures.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let state = self.inner.state.borrow();
        state.fields.iter().all(|f| f.errors.is_empty()) && state.cross_failures.is_empty()
    }

    /// Per-field errors of `name`.
    pub fn field_errors(&self, name: &str) -> Result<Vec<ValidationError>, FormError> {
        Ok(self.inner.state.borrow().field(name)?.errors.clone())
    }

    /// Field errors plus the failures of every cross-field rule `name`
    /// participates in.
    pub fn errors_for(&self, name: &str) -> Result<Vec<ValidationError>, FormError> {
        let state = self.inner.state.borrow();
        let mut errors = state.field(name)?.errors.clone();
        errors.extend(
            state
                .cross_failures
                .iter()
                .filter(|f| f.fields.iter().any(|n| n == name))
                .map(|f| f.error.clone()),
        );
        Ok(errors)
    }

    /// [`Form::errors_for`] once `name` is touched, nothing before.
    pub fn visible_errors(&self, name: &str) -> Result<Vec<ValidationError>, FormError> {
        if self.is_touched(name)? {
            self.errors_for(name)
        } else {
            Ok(Vec::new())
        }
    }

    /// Failed cross-field rules.
    #[must_use]
    pub fn cross_errors(&self) -> Vec<CrossFailure> {
        self.inner.state.borrow().cross_failures.clone()
    }

    /// Static plus conditional validators currently active on `name`.
    pub fn active_validators(&self, name: &str) -> Result<Vec<Validator>, FormError> {
        Ok(self.inner.state.borrow().field(name)?.active())
    }

    /// Names of fields that currently have errors.
    #[must_use]
    pub fn invalid_fields(&self) -> Vec<String> {
        self.inner
            .state
            .borrow()
            .fields
            .iter()
            .filter(|f| !f.errors.is_empty())
            .map(|f| f.name.clone())
            .collect()
    }

    // --- list sections ------------------------------------------------------

    /// Append an item; returns its index.
    pub fn push_item(&self, list: &str, item: Value) -> Result<usize, FormError> {
        let cell = self.list_cell(list)?;
        let mut index = 0;
        cell.update(|items| {
            items.push(item);
            index = items.len() - 1;
        });
        Ok(index)
    }

    /// Remove the item at `index`; `None` when out of range.
    pub fn remove_item(&self, list: &str, index: usize) -> Result<Option<Value>, FormError> {
        let cell = self.list_cell(list)?;
        if index >= cell.with(Vec::len) {
            return Ok(None);
        }
        let mut removed = None;
        cell.update(|items| removed = Some(items.remove(index)));
        Ok(removed)
    }

    /// Items of `list`.
    pub fn items(&self, list: &str) -> Result<Vec<Value>, FormError> {
        Ok(self.list_cell(list)?.read())
    }

    /// Replace every item of `list`.
    pub fn set_items(&self, list: &str, items: Vec<Value>) -> Result<(), FormError> {
        self.list_cell(list)?.write(items);
        Ok(())
    }

    /// The state cell backing `list`.
    pub fn list_cell(&self, list: &str) -> Result<StateCell<Vec<Value>>, FormError> {
        Ok(self.inner.state.borrow().list(list)?.items.clone())
    }

    /// Required list sections that are currently empty, in declaration order.
    #[must_use]
    pub fn empty_required_lists(&self) -> Vec<String> {
        self.inner
            .state
            .borrow()
            .lists
            .iter()
            .filter(|l| l.required && l.items.with(Vec::is_empty))
            .map(|l| l.name.clone())
            .collect()
    }

    // --- reactivity ---------------------------------------------------------

    /// Counter bumped after every evaluation; derive from it to recompute
    /// projections of the whole form.
    #[must_use]
    pub fn revision(&self) -> StateCell<u64> {
        self.inner.revision.clone()
    }

    /// Render hook: `callback` runs after every evaluation.
    pub fn on_change(&self, callback: impl Fn() + 'static) -> Subscription {
        self.inner.revision.subscribe(move |_| callback())
    }

    /// Graph owning this form's cells.
    #[must_use]
    pub fn graph(&self) -> &DerivationGraph {
        &self.inner.graph
    }
}

fn notify(form: &Weak<FormInner>) {
    if let Some(inner) = form.upgrade() {
        inner.changed();
    }
}

fn check_declarations(rules: &RuleSet) -> Result<(), FormError> {
    let mut seen: Vec<&str> = Vec::new();
    for name in rules
        .fields()
        .iter()
        .map(|f| f.name.as_str())
        .chain(rules.lists().iter().map(|l| l.name.as_str()))
    {
        if seen.contains(&name) {
            return Err(FormError::Duplicate(name.to_string()));
        }
        seen.push(name);
    }

    let declared = |name: &str| rules.fields().iter().any(|f| f.name == name);
    let require = |name: &str| {
        if declared(name) {
            Ok(())
        } else {
            Err(FormError::UnknownField(name.to_string()))
        }
    };
    for policy in rules.policies() {
        require(policy.driver())?;
        for dependent in policy.dependents() {
            require(dependent)?;
        }
    }
    for rule in rules.cross_rules() {
        for field in rule.fields() {
            require(field)?;
        }
        if let Some(driver) = rule.driver() {
            require(driver)?;
        }
    }
    Ok(())
}

impl fmt::Debug for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Form")
            .field("fields", &state.fields.len())
            .field("lists", &state.lists.len())
            .field("cross_failures", &state.cross_failures.len())
            .field("revision", &self.inner.revision.with(|r| *r))
            .finish()
    }
}
