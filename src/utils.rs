use std::collections::BTreeMap;

use serde_json::{Map, Value as JsonValue};

/// FCM data payloads only carry strings; scalars keep their literal form, compound values
/// are sent as JSON text.
pub fn stringify_data(data: &Map<String, JsonValue>) -> BTreeMap<String, String> {
    data.iter()
        .map(|(key, value)| (key.clone(), stringify_value(value)))
        .collect()
}

fn stringify_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Null => "null".to_string(),
        JsonValue::Array(_) | JsonValue::Object(_) => value.to_string(),
    }
}
