use serde_json::Value;

/// Flatten an issue description to plain text. Older instances send a
/// string; newer ones send Atlassian Document Format, whose text nodes are
/// joined with single spaces.
pub fn description_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(nodes) => {
            let parts: Vec<String> = nodes.iter().filter_map(description_text).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(" "))
            }
        }
        Value::Object(node) => {
            if node.get("type").and_then(Value::as_str) == Some("text") {
                return node.get("text").and_then(Value::as_str).map(String::from);
            }
            node.get("content").and_then(description_text)
        }
        _ => None,
    }
}
