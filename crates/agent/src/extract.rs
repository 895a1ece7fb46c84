use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

fn fenced_python_object() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)```python\s*(\{.*?\})\s*```").expect("static regex"))
}

fn any_object() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)(\{.*\})").expect("static regex"))
}

fn fenced_sql() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)```sql\s*(.*?)```").expect("static regex"))
}

/// Pulls a structured payload out of free-form model text.
///
/// Patterns are tried in order and the first one that yields a JSON object wins:
/// a fenced `python` block holding an object, any `{...}` span (first `{` to last `}`),
/// then a fenced `sql` block mapped to `{"sql_query": ...}`. Unrecognized text yields an
/// empty map; extraction never fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct StructuredOutputExtractor;

impl StructuredOutputExtractor {
    pub fn extract(&self, text: &str) -> Map<String, Value> {
        for pattern in [fenced_python_object(), any_object()] {
            if let Some(object) = pattern
                .captures(text)
                .and_then(|captures| captures.get(1))
                .and_then(|body| parse_object(body.as_str()))
            {
                return object;
            }
        }

        if let Some(body) = fenced_sql().captures(text).and_then(|captures| captures.get(1)) {
            let mut object = Map::new();
            object.insert("sql_query".to_string(), Value::String(body.as_str().trim().to_string()));
            return object;
        }

        Map::new()
    }
}

fn parse_object(body: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

/// String field from an extracted payload; non-strings and blanks read as absent.
pub fn text_field<'a>(payload: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str).map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{text_field, StructuredOutputExtractor};

    #[test]
    fn fenced_python_block_is_parsed() {
        let text = "Here you go:\n```python\n{\"sql_query\": \"SELECT 1\", \"python_code\": \"plt.plot(df)\", \"explanation\": \"ok\"}\n```";

        let payload = StructuredOutputExtractor.extract(text);

        assert_eq!(
            serde_json::Value::Object(payload),
            json!({"sql_query": "SELECT 1", "python_code": "plt.plot(df)", "explanation": "ok"})
        );
    }

    #[test]
    fn bare_object_spans_first_to_last_brace() {
        let text = "result: {\"sql_query\": \"SELECT a FROM t\", \"nested\": {\"k\": 1}} trailing";

        let payload = StructuredOutputExtractor.extract(text);

        assert_eq!(payload.get("sql_query"), Some(&json!("SELECT a FROM t")));
        assert_eq!(payload.get("nested"), Some(&json!({"k": 1})));
    }

    #[test]
    fn fenced_sql_block_becomes_sql_query() {
        let payload = StructuredOutputExtractor.extract("```sql\n  SELECT * FROM Users \n```");

        assert_eq!(text_field(&payload, "sql_query"), Some("SELECT * FROM Users"));
        assert_eq!(payload.len(), 1);
    }

    #[test]
    fn broken_json_falls_through_to_sql_fence() {
        let text = "{not json}\n```sql\nSELECT 2\n```";

        let payload = StructuredOutputExtractor.extract(text);

        assert_eq!(text_field(&payload, "sql_query"), Some("SELECT 2"));
    }

    #[test]
    fn unrecognized_text_yields_empty_mapping() {
        assert!(StructuredOutputExtractor.extract("no structure here").is_empty());
        assert!(StructuredOutputExtractor.extract("").is_empty());
        assert!(StructuredOutputExtractor.extract("[1, 2, 3]").is_empty());
    }

    #[test]
    fn text_field_ignores_blank_and_non_string_values() {
        let payload = StructuredOutputExtractor.extract(r#"{"a": "  ", "b": 3, "c": " x "}"#);

        assert_eq!(text_field(&payload, "a"), None);
        assert_eq!(text_field(&payload, "b"), None);
        assert_eq!(text_field(&payload, "c"), Some("x"));
        assert_eq!(text_field(&payload, "missing"), None);
    }
}
