use std::collections::BTreeMap;

/// Field data carried by a document: a map of field names to [`Value`]s.
pub type FieldMap = BTreeMap<String, Value>;

/// A single field value.
///
/// This is the subset of the Firestore value model that the convenience layer
/// itself needs to reason about (path arguments, additive deltas, query
/// filters). Wire-only kinds such as bytes, geo points and write-time
/// sentinels stay behind the store client.
#[derive(Clone, Debug, PartialEq)]
pub struct Value {
    kind: ValueKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ValueKind {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Array(Vec<Value>),
    Map(FieldMap),
}

impl Value {
    pub fn null() -> Self {
        Self {
            kind: ValueKind::Null,
        }
    }

    pub fn from_bool(value: bool) -> Self {
        Self {
            kind: ValueKind::Boolean(value),
        }
    }

    pub fn from_integer(value: i64) -> Self {
        Self {
            kind: ValueKind::Integer(value),
        }
    }

    pub fn from_double(value: f64) -> Self {
        Self {
            kind: ValueKind::Double(value),
        }
    }

    pub fn from_string(value: impl Into<String>) -> Self {
        Self {
            kind: ValueKind::String(value.into()),
        }
    }

    pub fn from_array(values: Vec<Value>) -> Self {
        Self {
            kind: ValueKind::Array(values),
        }
    }

    pub fn from_map(map: FieldMap) -> Self {
        Self {
            kind: ValueKind::Map(map),
        }
    }

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind, ValueKind::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            ValueKind::String(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&FieldMap> {
        match &self.kind {
            ValueKind::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match &self.kind {
            ValueKind::Array(values) => Some(values),
            _ => None,
        }
    }

    /// Numeric view of the value. `Double(NaN)` is reported as-is so callers
    /// can apply their own missing-value policy.
    pub fn numeric(&self) -> Option<f64> {
        match &self.kind {
            ValueKind::Integer(value) => Some(*value as f64),
            ValueKind::Double(value) => Some(*value),
            _ => None,
        }
    }

    /// Renders the value as a path argument.
    ///
    /// Only scalars substitute into a path parameter. Null and NaN are
    /// treated as missing, and structured values never become path text.
    pub fn path_arg(&self) -> Option<String> {
        match &self.kind {
            ValueKind::String(text) => Some(text.clone()),
            ValueKind::Integer(value) => Some(value.to_string()),
            ValueKind::Double(value) if value.is_finite() => Some(value.to_string()),
            ValueKind::Boolean(value) => Some(value.to_string()),
            _ => None,
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::null(),
            serde_json::Value::Bool(value) => Value::from_bool(*value),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(value) => Value::from_integer(value),
                None => Value::from_double(number.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(text) => Value::from_string(text.clone()),
            serde_json::Value::Array(values) => {
                Value::from_array(values.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::from_map(
                map.iter()
                    .map(|(key, value)| (key.clone(), Value::from_json(value)))
                    .collect(),
            ),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match &self.kind {
            ValueKind::Null => serde_json::Value::Null,
            ValueKind::Boolean(value) => serde_json::Value::Bool(*value),
            ValueKind::Integer(value) => serde_json::Value::from(*value),
            ValueKind::Double(value) => {
                serde_json::Number::from_f64(*value).map_or(serde_json::Value::Null, serde_json::Value::Number)
            }
            ValueKind::String(text) => serde_json::Value::String(text.clone()),
            ValueKind::Array(values) => {
                serde_json::Value::Array(values.iter().map(Value::to_json).collect())
            }
            ValueKind::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::from_bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::from_integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::from_double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::from_string(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::from_string(value)
    }
}

/// Builds a [`FieldMap`] from `(name, value)` pairs.
pub fn field_map<const N: usize>(entries: [(&str, Value); N]) -> FieldMap {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// Converts a JSON object into a [`FieldMap`]. Non-object input yields `None`.
pub fn field_map_from_json(json: &serde_json::Value) -> Option<FieldMap> {
    match json {
        serde_json::Value::Object(map) => Some(
            map.iter()
                .map(|(key, value)| (key.clone(), Value::from_json(value)))
                .collect(),
        ),
        _ => None,
    }
}
