//! Hierarchical record content.

use crate::error::{ErrorKind, Result};
use crate::xml;
use exn::{OptionExt, ResultExt};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use std::fmt;

/// An ordered tree of string keys to scalars, nested trees, or sequences of
/// either.
///
/// A record's model holds exactly one top-level key: its style's root
/// element.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Model(Map<String, Value>);

impl Model {
    /// A model holding `content` under `root`.
    pub fn new(root: impl Into<String>, content: Value) -> Self {
        let mut map = Map::new();
        map.insert(root.into(), content);
        Self(map)
    }

    /// The top-level key, if there is exactly one.
    pub fn root(&self) -> Option<&str> {
        match self.0.len() {
            1 => self.0.keys().next().map(String::as_str),
            _ => None,
        }
    }

    /// Content under the root key.
    pub fn content(&self) -> Option<&Value> {
        self.root().and_then(|root| self.0.get(root))
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Depth-first search for the first value stored under `key`.
    pub fn find(&self, key: &str) -> Option<&Value> {
        find_in_map(&self.0, key)
    }

    /// Whether any text in the model contains `keyword`, ignoring case.
    ///
    /// Element text, attribute values and scalars (as text) are all searched;
    /// keys are not.
    ///
    /// ```
    /// use recordbase_record::Model;
    /// use serde_json::json;
    ///
    /// let model = Model::new("faq", json!({"question": "Why is the SKY blue?", "answer": null}));
    /// assert!(model.mentions("sky"));
    /// assert!(!model.mentions("question"));
    /// ```
    pub fn mentions(&self, keyword: &str) -> bool {
        let keyword = keyword.to_lowercase();
        self.0.values().any(|value| value_mentions(value, &keyword))
    }

    /// Re-root this model at `root`: the model itself when that is already its
    /// only top-level key, otherwise the first `root` element found anywhere
    /// inside it.
    pub fn rooted(self, root: &str) -> Result<Model> {
        if self.root() == Some(root) {
            return Ok(self);
        }
        let content = self
            .find(root)
            .cloned()
            .ok_or_raise(|| ErrorKind::InvalidModel(root.to_string(), format!("no `{root}` element found")))?;
        Ok(Model::new(root, content))
    }

    /// Parse JSON text. The top level must be an object.
    pub fn from_json(text: &str) -> Result<Model> {
        match serde_json::from_str::<Value>(text).or_raise(|| ErrorKind::Codec("json"))? {
            Value::Object(map) => Ok(Self(map)),
            _ => exn::bail!(ErrorKind::Codec("json")),
        }
    }

    /// Render as JSON; compact without `indent`, pretty-printed with it.
    pub fn to_json(&self, indent: Option<usize>) -> Result<String> {
        let Some(width) = indent else {
            return serde_json::to_string(&self.0).or_raise(|| ErrorKind::Codec("json"));
        };
        let spaces = vec![b' '; width];
        let mut out = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(&spaces));
        self.0.serialize(&mut serializer).or_raise(|| ErrorKind::Codec("json"))?;
        String::from_utf8(out).or_raise(|| ErrorKind::Codec("json"))
    }

    pub fn from_xml(text: &str) -> Result<Model> {
        xml::parse(text).map(Self)
    }

    pub fn to_xml(&self, indent: Option<usize>) -> Result<String> {
        xml::render(&self.0, indent)
    }
}

impl TryFrom<Value> for Model {
    type Error = crate::error::Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => exn::bail!(ErrorKind::InvalidModel("model".to_string(), format!("expected an object, found {other}"))),
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Object(self.0.clone()))
    }
}

fn value_mentions(value: &Value, keyword: &str) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => s.to_lowercase().contains(keyword),
        Value::Number(n) => n.to_string().contains(keyword),
        Value::Bool(b) => b.to_string().contains(keyword),
        Value::Array(items) => items.iter().any(|item| value_mentions(item, keyword)),
        Value::Object(map) => map.values().any(|child| value_mentions(child, keyword)),
    }
}

fn find_in_map<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    if let Some(value) = map.get(key) {
        return Some(value);
    }
    map.values().find_map(|value| find_in_value(value, key))
}

fn find_in_value<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => find_in_map(map, key),
        Value::Array(items) => items.iter().find_map(|item| find_in_value(item, key)),
        _ => None,
    }
}

/// A repeated element as a list, however it was stored: arrays as-is, a lone
/// value as one element, absent or `null` as none.
///
/// XML cannot tell a one-element list from a scalar, so readers of repeated
/// elements go through this.
pub fn as_list(value: Option<&Value>) -> Vec<&Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
    }
}

/// Text of a scalar element; numbers and booleans are rendered back to text.
pub fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// On-disk representations of a model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Json,
    Xml,
}

impl Format {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Xml => "xml",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "xml" => Some(Self::Xml),
            _ => None,
        }
    }

    /// Guess the format of `text` from its first non-blank character.
    pub fn sniff(text: &str) -> Self {
        match text.trim_start().starts_with('<') {
            true => Self::Xml,
            false => Self::Json,
        }
    }

    pub fn render(self, model: &Model, indent: Option<usize>) -> Result<String> {
        match self {
            Self::Json => model.to_json(indent),
            Self::Xml => model.to_xml(indent),
        }
    }

    pub fn parse(self, text: &str) -> Result<Model> {
        match self {
            Self::Json => Model::from_json(text),
            Self::Xml => Model::from_xml(text),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn sample() -> Model {
        Model::try_from(json!({"faq": {"question": "Why?", "answer": "Because."}})).unwrap()
    }

    #[test]
    fn test_root_and_content() {
        let model = sample();
        assert_eq!(model.root(), Some("faq"));
        assert_eq!(model.content(), Some(&json!({"question": "Why?", "answer": "Because."})));
        let two = Model::try_from(json!({"a": 1, "b": 2})).unwrap();
        assert_eq!(two.root(), None);
    }

    #[test]
    fn test_rooted_finds_nested_root() {
        let wrapped = Model::try_from(json!({"envelope": {"items": [{"faq": {"question": "q"}}]}})).unwrap();
        let model = wrapped.rooted("faq").unwrap();
        assert_eq!(model.root(), Some("faq"));
        assert_eq!(model.find("question"), Some(&json!("q")));

        let err = sample().rooted("request").unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidModel(..)));
    }

    #[test]
    fn test_json_pretty_indent() {
        let text = sample().to_json(Some(2)).unwrap();
        assert!(text.contains("\n  \"faq\""));
        assert_eq!(Model::from_json(&text).unwrap(), sample());
        assert!(!sample().to_json(None).unwrap().contains('\n'));
    }

    #[rstest]
    #[case("because", true)]
    #[case("WHY", true)]
    #[case("question", false)]
    #[case("elsewhere", false)]
    fn test_mentions(#[case] keyword: &str, #[case] expected: bool) {
        assert_eq!(sample().mentions(keyword), expected);
    }

    #[rstest]
    #[case(None, 0)]
    #[case(Some(json!(null)), 0)]
    #[case(Some(json!("x")), 1)]
    #[case(Some(json!(["x", "y"])), 2)]
    fn test_as_list(#[case] value: Option<Value>, #[case] len: usize) {
        assert_eq!(as_list(value.as_ref()).len(), len);
    }

    #[rstest]
    #[case(Format::Json)]
    #[case(Format::Xml)]
    fn test_format_sniff_matches_render(#[case] format: Format) {
        let text = format.render(&sample(), Some(4)).unwrap();
        assert_eq!(Format::sniff(&text), format);
        assert_eq!(Format::from_extension(format.extension()), Some(format));
    }
}
