use serde_json::Value;

/// A single record in either the external or the canonical shape.
///
/// Insertion order is preserved, so field order survives a round trip through
/// mapping and export.
pub type Record = serde_json::Map<String, Value>;

/// Look up a value by dotted path (`data.items`) or JSON pointer (`/data/items`).
pub fn value_at_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    if path.starts_with('/') {
        return value.pointer(path);
    }
    value.pointer(&format!("/{}", path.replace('.', "/")))
}

/// True for `null`, empty strings and whitespace-only strings.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Render a scalar for display or CSV output; `null` becomes an empty string.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(value_to_text).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_at_path_dotted_and_pointer() {
        let body = json!({"data": {"items": [1, 2]}, "meta": {"total": 2}});
        assert_eq!(value_at_path(&body, "data.items"), Some(&json!([1, 2])));
        assert_eq!(value_at_path(&body, "/meta/total"), Some(&json!(2)));
        assert_eq!(value_at_path(&body, "meta.missing"), None);
        assert_eq!(value_at_path(&body, ""), Some(&body));
    }

    #[test]
    fn test_blank_and_text() {
        assert!(is_blank(&Value::Null));
        assert!(is_blank(&json!("  ")));
        assert!(!is_blank(&json!(0)));
        assert_eq!(value_to_text(&json!(["a", "b"])), "a,b");
        assert_eq!(value_to_text(&Value::Null), "");
    }
}
