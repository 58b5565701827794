use serde_json::Value;

/// Extract the list of rows from an API response.
///
/// The admin API is inconsistent about envelopes: some endpoints return a bare
/// JSON array, others wrap it as `{ "data": [...] }`. Both shapes yield the
/// array's elements. Anything else yields an empty list, logged as a warning.
pub fn unwrap_list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(rows) => rows,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(rows)) => rows,
            other => {
                tracing::warn!(
                    data = ?other.as_ref().map(value_kind),
                    "Response envelope has no data array, treating as empty"
                );
                Vec::new()
            }
        },
        other => {
            tracing::warn!(kind = value_kind(&other), "Unexpected response shape, treating as empty");
            Vec::new()
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
