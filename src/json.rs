// ABOUTME: Conversion between serde_json values and the Jyro value model
//
// Numbers remember whether their JSON spelling was integer-looking (`6`) or
// float-looking (`6.0`) so output preserves the input's shape. Key order is
// preserved end to end via serde_json's preserve_order map.

use crate::value::{Value, MAX_VALUE_DEPTH};

/// Convert parsed JSON into a Jyro value.
pub fn value_from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::number(i as f64)
            } else if let Some(u) = n.as_u64() {
                Value::number(u as f64)
            } else {
                Value::float(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => {
            Value::Array(items.iter().map(value_from_json).collect())
        }
        serde_json::Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), value_from_json(item)))
                .collect(),
        ),
    }
}

/// Convert a Jyro value into JSON.
///
/// Function values have no JSON form and are emitted as the string
/// `"<function>"`. Non-finite numbers become null, as do subtrees beyond the
/// recursion cap.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    to_json_at(value, 0)
}

fn to_json_at(value: &Value, depth: usize) -> serde_json::Value {
    if depth > MAX_VALUE_DEPTH {
        return serde_json::Value::Null;
    }
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => {
            if n.is_integer_like() && n.value >= i64::MIN as f64 && n.value <= i64::MAX as f64 {
                serde_json::Value::Number(serde_json::Number::from(n.value as i64))
            } else {
                serde_json::Number::from_f64(n.value)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            }
        }
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Array(items) => serde_json::Value::Array(
            items.iter().map(|item| to_json_at(item, depth + 1)).collect(),
        ),
        Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), to_json_at(item, depth + 1)))
                .collect(),
        ),
        Value::Function(_) => serde_json::Value::String("<function>".to_string()),
    }
}

/// Parse a JSON document directly into a Jyro value.
pub fn parse_json(text: &str) -> Result<Value, serde_json::Error> {
    let json: serde_json::Value = serde_json::from_str(text)?;
    Ok(value_from_json(&json))
}
