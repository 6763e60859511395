//! core::entry
//!
//! One occurrence of a tag on a descriptor.
//!
//! # Shape
//!
//! An [`AnnotationEntry`] is an ordered list of positional values plus a map
//! of named values. `cli("foo:bar", "Does bar")` has two positional values;
//! `option("greeting", "VALUE_IS_ARRAY", default = ["hi"])` has two positional
//! values and one named value.
//!
//! Values are `serde_json::Value` so that entries built in code and entries
//! read from manifests share one representation.
//!
//! # Emptiness
//!
//! Positional text accessors treat `null`, `""` and `false` as absent. A
//! declaration like `argument("name", "")` behaves exactly like
//! `argument("name")`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One tag occurrence: positional values plus named values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnnotationEntry {
    /// Positional values in declaration order.
    #[serde(default)]
    pub args: Vec<Value>,
    /// Named values (keys unique).
    #[serde(default)]
    pub named: Map<String, Value>,
}

impl AnnotationEntry {
    /// Create an empty entry (a bare marker tag such as `spawnable`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an entry from positional values.
    ///
    /// # Example
    ///
    /// ```
    /// use cmdtag::core::entry::AnnotationEntry;
    ///
    /// let entry = AnnotationEntry::with_args(["name", "REQUIRED"]);
    /// assert_eq!(entry.positional_text(0).as_deref(), Some("name"));
    /// assert_eq!(entry.len(), 2);
    /// ```
    pub fn with_args<I, V>(args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            named: Map::new(),
        }
    }

    /// Append a positional value.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Set a named value, replacing any previous value under the same key.
    pub fn named(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(key.into(), value.into());
        self
    }

    /// Number of positional values.
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// True when the entry has no positional values.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Raw positional value at `index`.
    pub fn positional(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Positional value at `index` rendered as text, or `None` when absent
    /// or empty.
    pub fn positional_text(&self, index: usize) -> Option<String> {
        self.args.get(index).and_then(value_text)
    }

    /// Named value, or `None` when absent or `null`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.named.get(key).filter(|v| !v.is_null())
    }

    /// Named value rendered as text, or `None` when absent or empty.
    pub fn get_text(&self, key: &str) -> Option<String> {
        self.named.get(key).and_then(value_text)
    }

    /// True when the named value is present and truthy.
    pub fn is_set(&self, key: &str) -> bool {
        self.named.get(key).is_some_and(is_truthy)
    }
}

/// Render a scalar value as text. Empty strings, `null` and `false` are
/// treated as absent; arrays and objects have no text form.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        Value::Bool(false) | Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Truthiness used for marker values such as `secret = true`.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn positional_text_skips_empty_values() {
        let entry = AnnotationEntry::with_args([json!("name"), json!(""), json!(null)]);
        assert_eq!(entry.positional_text(0).as_deref(), Some("name"));
        assert_eq!(entry.positional_text(1), None);
        assert_eq!(entry.positional_text(2), None);
        assert_eq!(entry.positional_text(3), None);
        assert_eq!(entry.len(), 3);
    }

    #[test]
    fn numbers_render_as_text() {
        let entry = AnnotationEntry::new().arg(3);
        assert_eq!(entry.positional_text(0).as_deref(), Some("3"));
    }

    #[test]
    fn named_values() {
        let entry = AnnotationEntry::with_args(["greeting"])
            .named("default", json!(["hi"]))
            .named("secret", true)
            .named("validate", "non_empty")
            .named("nothing", json!(null));

        assert_eq!(entry.get("default"), Some(&json!(["hi"])));
        assert!(entry.is_set("secret"));
        assert_eq!(entry.get_text("validate").as_deref(), Some("non_empty"));
        assert_eq!(entry.get("nothing"), None);
        assert!(!entry.is_set("missing"));
    }

    #[test]
    fn truthiness() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!("yes")));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("0")));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!([])));
    }

    #[test]
    fn deserializes_from_toml() {
        let entry: AnnotationEntry = toml::from_str(
            r#"
            args = ["greeting", "VALUE_IS_ARRAY"]
            named = { default = ["hi"] }
            "#,
        )
        .unwrap();
        assert_eq!(entry.positional_text(1).as_deref(), Some("VALUE_IS_ARRAY"));
        assert_eq!(entry.get("default"), Some(&json!(["hi"])));
    }
}
