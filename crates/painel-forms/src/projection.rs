#![forbid(unsafe_code)]

//! Mapping between entities, form values and submit payloads.
//!
//! [`JsonProjection`] covers the common case of one JSON key per field. Its
//! [`Coercion::Select`] mode implements the numeric-as-string rule for
//! selection widgets: an entity id `7` is held in the form as text `"7"` and
//! submitted back as the number `7`.
//!
//! Loading an entity and projecting it back reproduces every field it
//! supplied, blank strings included. Numbers compare by value: an integral
//! float such as `2.0` is submitted as the JSON integer `2`.

use serde_json::{Map, Value};

use crate::value::{FieldValue, FormSnapshot};

/// Converts entities into form values and form snapshots into payloads.
pub trait FormProjection {
    /// Field values carried by `entity`. Fields absent from the entity are
    /// omitted.
    fn to_fields(&self, entity: &Value) -> Vec<(String, FieldValue)>;

    /// List sections carried by `entity`.
    fn to_lists(&self, _entity: &Value) -> Vec<(String, Vec<Value>)> {
        Vec::new()
    }

    /// Submit payload for the current form values.
    fn to_payload(&self, snapshot: &FormSnapshot) -> Value;

    /// Fields bound to selection widgets, written after the loading reaction.
    fn deferred_fields(&self) -> &[String] {
        &[]
    }
}

/// How a field is converted at the JSON boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// Strings stay text; numbers are rendered as text.
    Text,
    /// Numbers; numeric text is parsed on the way out.
    Number,
    /// Booleans.
    Bool,
    /// Selection widget: ids held as text, submitted as numbers when numeric.
    Select,
}

impl Coercion {
    fn load(self, value: &Value) -> FieldValue {
        match (self, value) {
            (_, Value::Null) => FieldValue::Empty,
            (Self::Text | Self::Select, Value::Number(n)) => FieldValue::Text(n.to_string()),
            (Self::Number, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map_or_else(|| FieldValue::Text(s.clone()), FieldValue::Number),
            (Self::Bool, Value::String(s)) => s
                .parse()
                .map_or_else(|_| FieldValue::Text(s.clone()), FieldValue::Bool),
            (_, other) => FieldValue::from_json(other),
        }
    }

    fn store(self, value: &FieldValue) -> Value {
        if *value == FieldValue::Empty {
            return Value::Null;
        }
        match self {
            Self::Text => Value::String(value.as_text()),
            Self::Number => value
                .as_number()
                .map_or_else(|| value.to_json(), |n| FieldValue::Number(n).to_json()),
            Self::Bool => value.as_bool().map_or_else(|| value.to_json(), Value::Bool),
            Self::Select => match value.as_text().trim().parse::<i64>() {
                Ok(id) => Value::from(id),
                Err(_) => value.to_json(),
            },
        }
    }
}

#[derive(Debug, Clone)]
struct Mapping {
    field: String,
    key: String,
    coercion: Coercion,
}

/// One JSON key per field, plus list sections held as JSON arrays.
#[derive(Debug, Clone, Default)]
pub struct JsonProjection {
    fields: Vec<Mapping>,
    lists: Vec<(String, String)>,
    deferred: Vec<String>,
    skip_empty: bool,
}

impl JsonProjection {
    /// Empty projection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `field` to the JSON key of the same name.
    #[must_use]
    pub fn field(self, field: impl Into<String>, coercion: Coercion) -> Self {
        let field = field.into();
        self.field_as(field.clone(), field, coercion)
    }

    /// Map `field` to JSON key `key`.
    #[must_use]
    pub fn field_as(
        mut self,
        field: impl Into<String>,
        key: impl Into<String>,
        coercion: Coercion,
    ) -> Self {
        self.fields.push(Mapping {
            field: field.into(),
            key: key.into(),
            coercion,
        });
        self
    }

    /// Map a selection-widget field; it is also written deferred on load.
    #[must_use]
    pub fn select(mut self, field: impl Into<String>, key: impl Into<String>) -> Self {
        let field = field.into();
        self.deferred.push(field.clone());
        self.field_as(field, key, Coercion::Select)
    }

    /// Map list section `list` to JSON array `key`.
    #[must_use]
    pub fn list(mut self, list: impl Into<String>, key: impl Into<String>) -> Self {
        self.lists.push((list.into(), key.into()));
        self
    }

    /// Omit empty and blank fields from payloads. Without it, `Empty` is
    /// sent as `null` and blank text as written.
    #[must_use]
    pub fn skip_empty(mut self) -> Self {
        self.skip_empty = true;
        self
    }
}

impl FormProjection for JsonProjection {
    fn to_fields(&self, entity: &Value) -> Vec<(String, FieldValue)> {
        self.fields
            .iter()
            .filter_map(|m| {
                entity
                    .get(&m.key)
                    .map(|v| (m.field.clone(), m.coercion.load(v)))
            })
            .collect()
    }

    fn to_lists(&self, entity: &Value) -> Vec<(String, Vec<Value>)> {
        self.lists
            .iter()
            .filter_map(|(list, key)| match entity.get(key) {
                Some(Value::Array(items)) => Some((list.clone(), items.clone())),
                _ => None,
            })
            .collect()
    }

    fn to_payload(&self, snapshot: &FormSnapshot) -> Value {
        let mut payload = Map::new();
        for m in &self.fields {
            let value = snapshot.get(&m.field);
            if self.skip_empty && value.is_empty() {
                continue;
            }
            payload.insert(m.key.clone(), m.coercion.store(value));
        }
        for (list, key) in &self.lists {
            payload.insert(key.clone(), Value::Array(snapshot.list(list).to_vec()));
        }
        Value::Object(payload)
    }

    fn deferred_fields(&self) -> &[String] {
        &self.deferred
    }
}
