//! Rule and sequence documents
//!
//! Smart blocks are stored as loosely-typed JSON objects written by the
//! dashboard. These wrappers keep the raw object intact and read fields
//! leniently: numbers may arrive as strings, booleans as `"on"`, and
//! anything unreadable is reported as absent so the normalizer can apply
//! its default.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lenient field access shared by both document kinds
pub trait DocumentFields {
    /// Underlying JSON object
    fn fields(&self) -> &Map<String, Value>;

    /// Raw value for the first key present (aliases in priority order)
    fn first_of(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter().find_map(|key| match self.fields().get(*key) {
            Some(Value::Null) | None => None,
            Some(value) => Some(value),
        })
    }

    /// Trimmed non-empty string
    fn string_field(&self, key: &str) -> Option<String> {
        self.fields().get(key).and_then(value_as_string)
    }

    /// Boolean; absent or unreadable values are `false`
    fn bool_field(&self, key: &str) -> bool {
        self.fields().get(key).map(value_as_bool).unwrap_or(false)
    }

    /// Integer (fractional values truncate)
    fn int_field(&self, key: &str) -> Option<i64> {
        self.fields().get(key).and_then(value_as_i64)
    }

    /// Nested object
    fn object_field(&self, key: &str) -> Option<&Map<String, Value>> {
        self.fields().get(key).and_then(Value::as_object)
    }

    /// Array elements; absent or non-array values yield an empty slice
    fn array_field(&self, key: &str) -> &[Value] {
        self.fields()
            .get(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Smart block rule document (filters, toggles, scalar settings)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleDocument(Map<String, Value>);

/// Smart block sequence document (mode label, energy curve)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceDocument(Map<String, Value>);

macro_rules! document_impl {
    ($name:ident) => {
        impl $name {
            /// Empty document
            pub fn new() -> Self {
                Self(Map::new())
            }

            /// Wrap a JSON value; anything other than an object is empty
            pub fn from_value(value: Value) -> Self {
                match value {
                    Value::Object(map) => Self(map),
                    _ => Self::new(),
                }
            }

            /// Parse a stored JSON string
            ///
            /// Blank input and `null` are empty documents. Any other
            /// non-object JSON is rejected.
            pub fn from_json(raw: &str) -> Result<Self, String> {
                if raw.trim().is_empty() {
                    return Ok(Self::new());
                }
                match serde_json::from_str::<Value>(raw) {
                    Ok(Value::Object(map)) => Ok(Self(map)),
                    Ok(Value::Null) => Ok(Self::new()),
                    Ok(other) => Err(format!("expected a JSON object, got {}", json_kind(&other))),
                    Err(e) => Err(e.to_string()),
                }
            }

            /// Set a field, replacing any previous value
            pub fn set(&mut self, key: &str, value: impl Into<Value>) {
                self.0.insert(key.to_string(), value.into());
            }

            /// Remove a field
            pub fn remove(&mut self, key: &str) -> Option<Value> {
                self.0.remove(key)
            }

            /// True when no fields are set
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Consume into the raw JSON value
            pub fn into_value(self) -> Value {
                Value::Object(self.0)
            }
        }

        impl DocumentFields for $name {
            fn fields(&self) -> &Map<String, Value> {
                &self.0
            }
        }
    };
}

document_impl!(RuleDocument);
document_impl!(SequenceDocument);

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Read a number leniently; non-numeric strings are `None`
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Read an integer leniently (fractional values truncate)
pub fn value_as_i64(value: &Value) -> Option<i64> {
    value_as_f64(value).map(|f| f as i64)
}

/// Read a boolean leniently (`true`, `"true"`, `"1"`, `"on"`, `"yes"`, non-zero)
pub fn value_as_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => {
            let s = s.trim();
            s.eq_ignore_ascii_case("true")
                || s.eq_ignore_ascii_case("on")
                || s.eq_ignore_ascii_case("yes")
                || s == "1"
        }
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        _ => false,
    }
}

/// Read a trimmed, non-empty string (numbers are stringified)
pub fn value_as_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Read a list of strings; a single string is split on commas
pub fn value_as_string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(value_as_string).collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Read a `{min, max}` object or `[min, max]` array
///
/// Zero and missing bounds are unbounded (`None`).
pub fn value_as_range(value: &Value) -> (Option<f64>, Option<f64>) {
    let (min, max) = match value {
        Value::Object(map) => (
            map.get("min").and_then(value_as_f64),
            map.get("max").and_then(value_as_f64),
        ),
        Value::Array(items) => (
            items.first().and_then(value_as_f64),
            items.get(1).and_then(value_as_f64),
        ),
        _ => (None, None),
    };
    (min.filter(|v| *v != 0.0), max.filter(|v| *v != 0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_accepts_objects_and_blank() {
        let doc = RuleDocument::from_json(r#"{"genre":"Rock"}"#).unwrap();
        assert_eq!(doc.string_field("genre").as_deref(), Some("Rock"));

        assert!(RuleDocument::from_json("").unwrap().is_empty());
        assert!(RuleDocument::from_json("null").unwrap().is_empty());
    }

    #[test]
    fn test_from_json_rejects_non_objects() {
        assert!(RuleDocument::from_json("[1,2]").is_err());
        assert!(SequenceDocument::from_json("{broken").is_err());
    }

    #[test]
    fn test_from_value_non_object_is_empty() {
        assert!(RuleDocument::from_value(json!("genre")).is_empty());
    }

    #[test]
    fn test_lenient_numbers() {
        assert_eq!(value_as_f64(&json!(12.5)), Some(12.5));
        assert_eq!(value_as_f64(&json!(" 42 ")), Some(42.0));
        assert_eq!(value_as_f64(&json!("abc")), None);
        assert_eq!(value_as_f64(&json!(null)), None);
        assert_eq!(value_as_i64(&json!(7.9)), Some(7));
    }

    #[test]
    fn test_lenient_bools() {
        assert!(value_as_bool(&json!(true)));
        assert!(value_as_bool(&json!("TRUE")));
        assert!(value_as_bool(&json!("on")));
        assert!(value_as_bool(&json!("1")));
        assert!(value_as_bool(&json!(2)));
        assert!(!value_as_bool(&json!("false")));
        assert!(!value_as_bool(&json!("0")));
        assert!(!value_as_bool(&json!(null)));
    }

    #[test]
    fn test_strings_and_lists() {
        assert_eq!(value_as_string(&json!("  ")), None);
        assert_eq!(value_as_string(&json!(5)).as_deref(), Some("5"));
        assert_eq!(
            value_as_string_list(&json!(["a", " b ", "", 3])),
            vec!["a", "b", "3"]
        );
        assert_eq!(value_as_string_list(&json!("x, y")), vec!["x", "y"]);
    }

    #[test]
    fn test_ranges() {
        assert_eq!(
            value_as_range(&json!({"min": 90, "max": "120"})),
            (Some(90.0), Some(120.0))
        );
        assert_eq!(value_as_range(&json!([0, 130])), (None, Some(130.0)));
        assert_eq!(value_as_range(&json!([100])), (Some(100.0), None));
        assert_eq!(value_as_range(&json!("fast")), (None, None));
    }

    #[test]
    fn test_first_of_skips_null() {
        let mut doc = RuleDocument::new();
        doc.set("sourcePlaylists", Value::Null);
        doc.set("source_playlists", json!(["p1"]));
        let value = doc.first_of(&["sourcePlaylists", "source_playlists"]);
        assert_eq!(value, Some(&json!(["p1"])));
    }
}
