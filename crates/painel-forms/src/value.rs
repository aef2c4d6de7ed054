#![forbid(unsafe_code)]

//! Field values and whole-form snapshots.
//!
//! # Coercions
//!
//! Selection widgets hold numeric ids as text, so an entity field `7` is
//! loaded as `FieldValue::Text("7")` when the field is a select. Numeric
//! validators and [`FieldValue::as_number`] parse such text transparently,
//! and [`FieldValue::to_json`] emits integral numbers as JSON integers.

use std::fmt;

use serde_json::Value;

/// The value held by one form field.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    /// No value.
    #[default]
    Empty,
    /// Free text, or a numeric id held by a selection widget.
    Text(String),
    /// A number.
    Number(f64),
    /// A checkbox or toggle.
    Bool(bool),
}

impl FieldValue {
    /// Text value.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Numeric id as held by a selection widget.
    #[must_use]
    pub fn id(value: i64) -> Self {
        Self::Text(value.to_string())
    }

    /// `Empty`, or text that is empty after trimming.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) | Self::Bool(_) => false,
        }
    }

    /// Text rendering; `Empty` is the empty string.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }

    /// Numeric view. Text is parsed after trimming; `NaN` and infinities
    /// are not numbers.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
            Self::Empty | Self::Bool(_) => None,
        };
        n.filter(|n| n.is_finite())
    }

    /// Boolean view. Accepts `"true"`/`"false"` text.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Empty | Self::Number(_) => None,
        }
    }

    /// Convert to JSON. Integral numbers become JSON integers.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Empty => Value::Null,
            Self::Text(s) => Value::String(s.clone()),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => Value::from(*n as i64),
            Self::Number(n) => Value::from(*n),
            Self::Bool(b) => Value::Bool(*b),
        }
    }

    /// Convert from JSON. Arrays and objects become their JSON text.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Empty,
            Value::String(s) => Self::Text(s.clone()),
            Value::Number(n) => n.as_f64().map_or(Self::Empty, Self::Number),
            Value::Bool(b) => Self::Bool(*b),
            other => Self::Text(other.to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Empty, Into::into)
    }
}

// ---------------------------------------------------------------------------
// FormSnapshot
// ---------------------------------------------------------------------------

static EMPTY: FieldValue = FieldValue::Empty;

/// Immutable copy of every field value and list section, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormSnapshot {
    fields: Vec<(String, FieldValue)>,
    lists: Vec<(String, Vec<Value>)>,
}

impl FormSnapshot {
    /// Build a snapshot from field pairs (no list sections).
    pub fn from_fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            lists: Vec::new(),
        }
    }

    pub(crate) fn new(fields: Vec<(String, FieldValue)>, lists: Vec<(String, Vec<Value>)>) -> Self {
        Self { fields, lists }
    }

    /// Value of `name`; `Empty` for unknown names.
    #[must_use]
    pub fn get(&self, name: &str) -> &FieldValue {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map_or(&EMPTY, |(_, v)| v)
    }

    /// Items of list section `name`; empty for unknown names.
    #[must_use]
    pub fn list(&self, name: &str) -> &[Value] {
        self.lists
            .iter()
            .find(|(n, _)| n == name)
            .map_or(&[] as &[Value], |(_, items)| items.as_slice())
    }

    /// Field pairs in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// List sections in declaration order.
    pub fn lists(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.lists.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }
}
