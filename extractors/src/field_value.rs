use serde_json::Value;

/// Flatten one ledger cell into a plain string.
///
/// Resolution order:
/// 1. plain scalar (string or number) -> stringified
/// 2. object whose `value` is a non-empty array -> first element, `text`
///    attribute preferred, bare scalar accepted
/// 3. array -> first element, `text` then `name` then bare scalar
/// 4. object with a `text` or `name` attribute
/// 5. anything else -> empty string
///
/// Unrecognized shapes degrade to `""`; this function never fails.
pub fn extract_string(field: Option<&Value>) -> String {
    let Some(field) = field else {
        return String::new();
    };

    match field {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Object(map) => {
            // {type: 1, value: [{text: "...", type: "text"}]} wrapper
            if let Some(Value::Array(values)) = map.get("value") {
                if let Some(first) = values.first() {
                    if let Some(text) = attr_string(first, "text") {
                        return text;
                    }
                    if let Some(scalar) = scalar_string(first) {
                        return scalar;
                    }
                }
            }
            if let Some(text) = map.get("text").and_then(Value::as_str) {
                return text.to_string();
            }
            if let Some(name) = map.get("name").and_then(Value::as_str) {
                return name.to_string();
            }
            String::new()
        }
        Value::Array(values) => {
            let Some(first) = values.first() else {
                return String::new();
            };
            if let Some(text) = attr_string(first, "text") {
                return text;
            }
            if let Some(name) = attr_string(first, "name") {
                return name;
            }
            scalar_string(first).unwrap_or_default()
        }
        _ => String::new(),
    }
}

/// Numeric variant of [`extract_string`]: numbers pass through, strings are
/// decimal-parsed, everything else (including parse failures) becomes `0`.
pub fn extract_number(field: Option<&Value>) -> f64 {
    match field {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn attr_string(value: &Value, attr: &str) -> Option<String> {
    value
        .as_object()?
        .get(attr)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_scalars() {
        assert_eq!(extract_string(Some(&json!("交通"))), "交通");
        assert_eq!(extract_string(Some(&json!(42))), "42");
        assert_eq!(extract_string(None), "");
    }

    #[test]
    fn test_value_wrapper() {
        let field = json!({
            "type": 1,
            "value": [{"text": "2025-12", "type": "text"}]
        });
        assert_eq!(extract_string(Some(&field)), "2025-12");

        let bare_scalar = json!({"value": ["stephen"]});
        assert_eq!(extract_string(Some(&bare_scalar)), "stephen");

        let empty = json!({"value": []});
        assert_eq!(extract_string(Some(&empty)), "");
    }

    #[test]
    fn test_array_shapes() {
        assert_eq!(extract_string(Some(&json!(["首项", "次项"]))), "首项");
        assert_eq!(
            extract_string(Some(&json!([{"text": "打车"}]))),
            "打车"
        );
        // person cells carry a name attribute instead of text
        assert_eq!(
            extract_string(Some(&json!([{"name": "蒋坤洪", "id": "ou_1"}]))),
            "蒋坤洪"
        );
        assert_eq!(extract_string(Some(&json!([]))), "");
    }

    #[test]
    fn test_tagged_object() {
        assert_eq!(extract_string(Some(&json!({"text": "午餐"}))), "午餐");
        assert_eq!(extract_string(Some(&json!({"name": "李宇航"}))), "李宇航");
        assert_eq!(extract_string(Some(&json!({"unknown": true}))), "");
        assert_eq!(extract_string(Some(&json!(null))), "");
    }

    #[test]
    fn test_extract_number() {
        assert_eq!(extract_number(Some(&json!(128.5))), 128.5);
        assert_eq!(extract_number(Some(&json!("99.9"))), 99.9);
        assert_eq!(extract_number(Some(&json!(" 15 "))), 15.0);
        assert_eq!(extract_number(Some(&json!("not a number"))), 0.0);
        assert_eq!(extract_number(Some(&json!({"value": [1]}))), 0.0);
        assert_eq!(extract_number(None), 0.0);
    }
}
