use crate::value::{FieldMap, Value, ValueKind};

/// Controls whether the delta is added to or subtracted from the base.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeltaOptions {
    pub subtract: bool,
}

impl DeltaOptions {
    pub fn subtract() -> Self {
        Self { subtract: true }
    }
}

/// Merges `delta` into `base` with additive semantics, returning the merged
/// values for exactly the keys of `delta`.
///
/// Per key:
/// - base absent or null: the delta value unchanged;
/// - both numeric: `delta + base` (the delta is negated first when
///   `subtract` is set), with NaN on either side falling back to the other
///   side's value;
/// - both maps: key-wise recursion;
/// - both numeric sequences: element-wise numeric rule, zero-padding the
///   shorter sequence to the longer length;
/// - anything else: the delta value wins.
///
/// This underlies counter reconciliation: within one call the result is
/// deterministic regardless of which side carries prior accumulation.
pub fn compute_delta(delta: &FieldMap, base: &FieldMap, options: DeltaOptions) -> FieldMap {
    let mut merged = FieldMap::new();
    for (key, delta_value) in delta {
        let value = match base.get(key) {
            None => delta_value.clone(),
            Some(base_value) => merge_values(delta_value, base_value, options),
        };
        merged.insert(key.clone(), value);
    }
    merged
}

fn merge_values(delta: &Value, base: &Value, options: DeltaOptions) -> Value {
    if base.is_null() {
        return delta.clone();
    }
    if let Some(value) = merge_numeric(delta, base, options) {
        return value;
    }
    match (delta.kind(), base.kind()) {
        (ValueKind::Map(delta_map), ValueKind::Map(base_map)) => {
            Value::from_map(compute_delta(delta_map, base_map, options))
        }
        (ValueKind::Array(delta_values), ValueKind::Array(base_values))
            if all_numeric(delta_values) && all_numeric(base_values) =>
        {
            merge_arrays(delta_values, base_values, options)
        }
        _ => delta.clone(),
    }
}

fn merge_numeric(delta: &Value, base: &Value, options: DeltaOptions) -> Option<Value> {
    let delta_number = delta.numeric()?;
    let base_number = base.numeric()?;
    if delta_number.is_nan() {
        return Some(base.clone());
    }
    let signed = if options.subtract { negate(delta) } else { delta.clone() };
    if base_number.is_nan() {
        return Some(signed);
    }
    match (signed.kind(), base.kind()) {
        (ValueKind::Integer(left), ValueKind::Integer(right)) => {
            Some(Value::from_integer(left.saturating_add(*right)))
        }
        _ => {
            let signed_number = if options.subtract { -delta_number } else { delta_number };
            Some(Value::from_double(signed_number + base_number))
        }
    }
}

fn negate(value: &Value) -> Value {
    match value.kind() {
        ValueKind::Integer(number) => Value::from_integer(number.saturating_neg()),
        ValueKind::Double(number) => Value::from_double(-number),
        _ => value.clone(),
    }
}

fn all_numeric(values: &[Value]) -> bool {
    values.iter().all(|value| value.numeric().is_some())
}

fn merge_arrays(delta: &[Value], base: &[Value], options: DeltaOptions) -> Value {
    let length = delta.len().max(base.len());
    let zero = Value::from_integer(0);
    let mut merged = Vec::with_capacity(length);
    for index in 0..length {
        let delta_value = delta.get(index).unwrap_or(&zero);
        let base_value = base.get(index).unwrap_or(&zero);
        merged.push(merge_numeric(delta_value, base_value, options).unwrap_or_else(|| delta_value.clone()));
    }
    Value::from_array(merged)
}
