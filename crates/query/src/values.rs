//! Filter arguments.
//!
//! A [`Filter`] is the typed rendition of the keyword arguments a caller
//! passes when searching for records: a map of search-field names to
//! [`Values`]. A field that is absent from the filter imposes no constraint.

use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::fmt;

/// One or more values given for a single search field.
///
/// Scalars are promoted to a one-element list on construction, so every
/// translator only ever deals with the list form.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Values(Vec<Value>);

impl Values {
    pub fn new(values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Self(values.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.iter()
    }

    /// The raw JSON values, in the order given.
    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    /// Every value rendered as a string.
    ///
    /// Strings are taken as-is, everything else uses its JSON representation
    /// (so `5` becomes `"5"` and `true` becomes `"true"`).
    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(stringify).collect()
    }
}

/// Render a cell or filter value the way string-based comparisons see it.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Coerce a value to an integer: numbers with no fractional part, and strings
/// that parse as one.
pub fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(_) | Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

impl From<Value> for Values {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => Self(items),
            other => Self(vec![other]),
        }
    }
}
impl From<&str> for Values {
    fn from(value: &str) -> Self {
        Self(vec![Value::String(value.to_string())])
    }
}
impl From<String> for Values {
    fn from(value: String) -> Self {
        Self(vec![Value::String(value)])
    }
}
impl From<i64> for Values {
    fn from(value: i64) -> Self {
        Self(vec![Value::Number(Number::from(value))])
    }
}
impl From<i32> for Values {
    fn from(value: i32) -> Self {
        Self::from(i64::from(value))
    }
}
impl From<u32> for Values {
    fn from(value: u32) -> Self {
        Self::from(i64::from(value))
    }
}
impl From<time::Date> for Values {
    fn from(value: time::Date) -> Self {
        Self(vec![Value::String(value.to_string())])
    }
}
impl<T: Into<Value>> From<Vec<T>> for Values {
    fn from(values: Vec<T>) -> Self {
        Self::new(values)
    }
}
impl<T: Into<Value>, const N: usize> From<[T; N]> for Values {
    fn from(values: [T; N]) -> Self {
        Self::new(values)
    }
}

/// Search-field constraints for one record style.
///
/// Keys are the style's search-field names (plus `name`, which every
/// database understands). Values are ANDed together by the style.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter(BTreeMap<String, Values>);

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    ///
    /// ```
    /// use recordbase_query::Filter;
    ///
    /// let filter = Filter::new().with("name", "w1").with("count", [1, 2]);
    /// assert_eq!(filter.get("count").map(|v| v.len()), Some(2));
    /// assert!(filter.get("label").is_none());
    /// ```
    pub fn with(mut self, field: impl Into<String>, values: impl Into<Values>) -> Self {
        self.insert(field, values);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, values: impl Into<Values>) {
        self.0.insert(field.into(), values.into());
    }

    /// `None` means the field is unconstrained.
    pub fn get(&self, field: &str) -> Option<&Values> {
        self.0.get(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<Values> {
        self.0.remove(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Everything except the `name` constraint, which databases resolve
    /// themselves rather than delegating to the record style.
    pub fn without_name(&self) -> Filter {
        let mut rest = self.clone();
        rest.0.remove("name");
        rest
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, values) in &self.0 {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{field}={}", values.to_strings().join("|"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_scalar_is_promoted_to_list() {
        assert_eq!(Values::from("a").as_slice(), &[json!("a")]);
        assert_eq!(Values::from(json!(["a", "b"])).len(), 2);
        assert_eq!(Values::from(json!(3)).as_slice(), &[json!(3)]);
    }

    #[test]
    fn test_date_values_are_iso_strings() {
        let values = Values::from(time::macros::date!(2021 - 03 - 04));
        assert_eq!(values.to_strings(), vec!["2021-03-04".to_string()]);
    }

    #[rstest]
    #[case(json!(5), Some(5))]
    #[case(json!(5.0), Some(5))]
    #[case(json!(5.5), None)]
    #[case(json!(" 12 "), Some(12))]
    #[case(json!("twelve"), None)]
    #[case(json!(null), None)]
    fn test_integer_coercion(#[case] value: Value, #[case] expected: Option<i64>) {
        assert_eq!(integer(&value), expected);
    }

    #[test]
    fn test_without_name() {
        let filter = Filter::new().with("name", "w1").with("label", "x");
        let rest = filter.without_name();
        assert!(rest.get("name").is_none());
        assert!(rest.get("label").is_some());
        assert!(filter.get("name").is_some());
    }

    #[test]
    fn test_display() {
        let filter = Filter::new().with("name", ["a", "b"]).with("count", 3);
        assert_eq!(filter.to_string(), "count=3, name=a|b");
    }
}
