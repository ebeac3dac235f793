//! XML codec for [`Model`](crate::Model) trees.
//!
//! Mapping conventions:
//! - each key is an element; an array value is written as repeated sibling
//!   elements of the same name, and repeated siblings parse back as an array;
//! - `null` is an empty element;
//! - keys starting with `@` are attributes, and `#text` holds the text of an
//!   element that also has attributes or children;
//! - text and attribute values always parse back as strings, whitespace
//!   included; styles convert their typed fields when loading. Only the text
//!   of an element that also has children is trimmed, since indentation
//!   lands there.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use serde_json::{Map, Value};

const TEXT: &str = "#text";
const CODEC: &str = "xml";

struct Frame {
    name: String,
    children: Map<String, Value>,
    text: String,
}

impl Frame {
    fn new(name: String) -> Self {
        Self { name, children: Map::new(), text: String::new() }
    }

    fn finish(mut self) -> (String, Value) {
        let value = if self.children.is_empty() {
            match self.text.is_empty() {
                true => Value::Null,
                false => Value::String(self.text),
            }
        } else {
            let text = self.text.trim();
            if !text.is_empty() {
                self.children.insert(TEXT.to_string(), Value::from(text));
            }
            Value::Object(self.children)
        };
        (self.name, value)
    }
}

fn utf8(bytes: &[u8]) -> Result<String> {
    Ok(std::str::from_utf8(bytes).or_raise(|| ErrorKind::Codec(CODEC))?.to_string())
}

fn open(start: &BytesStart<'_>) -> Result<Frame> {
    let mut frame = Frame::new(utf8(start.name().as_ref())?);
    for attr in start.attributes() {
        let attr = attr.or_raise(|| ErrorKind::Codec(CODEC))?;
        let key = format!("@{}", utf8(attr.key.as_ref())?);
        let value = attr.unescape_value().or_raise(|| ErrorKind::Codec(CODEC))?;
        frame.children.insert(key, Value::from(value.into_owned()));
    }
    Ok(frame)
}

/// Add `value` under `key`, turning a repeated key into an array.
fn append(map: &mut Map<String, Value>, key: String, value: Value) {
    match map.get_mut(&key) {
        Some(existing) => {
            let merged = match existing.take() {
                Value::Array(mut items) => {
                    items.push(value);
                    items
                },
                previous => vec![previous, value],
            };
            *existing = Value::Array(merged);
        },
        None => {
            map.insert(key, value);
        },
    }
}

/// Parse an XML document into the map holding its root element.
pub(crate) fn parse(text: &str) -> Result<Map<String, Value>> {
    let mut reader = Reader::from_str(text);
    let mut stack = vec![Frame::new(String::new())];
    loop {
        match reader.read_event().or_raise(|| ErrorKind::Codec(CODEC))? {
            Event::Start(start) => stack.push(open(&start)?),
            Event::Empty(start) => {
                let (name, value) = open(&start)?.finish();
                if let Some(parent) = stack.last_mut() {
                    append(&mut parent.children, name, value);
                }
            },
            Event::Text(content) => {
                let content = content.unescape().or_raise(|| ErrorKind::Codec(CODEC))?;
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&content);
                }
            },
            Event::CData(content) => {
                let content = utf8(&content)?;
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&content);
                }
            },
            Event::End(_) => {
                // The document frame at the bottom is never closed by a tag.
                if stack.len() < 2 {
                    exn::bail!(ErrorKind::Codec(CODEC));
                }
                if let Some(frame) = stack.pop() {
                    let (name, value) = frame.finish();
                    if let Some(parent) = stack.last_mut() {
                        append(&mut parent.children, name, value);
                    }
                }
            },
            Event::Eof => break,
            _ => {},
        }
    }
    match stack.pop() {
        Some(document) if stack.is_empty() && document.children.len() == 1 => Ok(document.children),
        _ => exn::bail!(ErrorKind::Codec(CODEC)),
    }
}

/// Render a single-rooted map as an XML document.
pub(crate) fn render(map: &Map<String, Value>, indent: Option<usize>) -> Result<String> {
    let mut root = map.iter();
    let (Some((name, value)), None) = (root.next(), root.next()) else {
        exn::bail!(ErrorKind::Codec(CODEC));
    };
    if value.is_array() {
        exn::bail!(ErrorKind::Codec(CODEC));
    }
    let mut writer = match indent {
        Some(width) => Writer::new_with_indent(Vec::new(), b' ', width),
        None => Writer::new(Vec::new()),
    };
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .or_raise(|| ErrorKind::Codec(CODEC))?;
    write_element(&mut writer, name, value)?;
    String::from_utf8(writer.into_inner()).or_raise(|| ErrorKind::Codec(CODEC))
}

fn write_element(writer: &mut Writer<Vec<u8>>, name: &str, value: &Value) -> Result<()> {
    match value {
        Value::Array(items) => {
            for item in items {
                write_element(writer, name, item)?;
            }
        },
        Value::Null => {
            writer.write_event(Event::Empty(BytesStart::new(name))).or_raise(|| ErrorKind::Codec(CODEC))?;
        },
        Value::Object(children) => {
            let mut start = BytesStart::new(name);
            for (key, attr) in children.iter().filter(|(k, _)| k.starts_with('@')) {
                start.push_attribute((&key[1..], text_of(attr).as_str()));
            }
            let body: Vec<_> = children.iter().filter(|(k, _)| !k.starts_with('@')).collect();
            if body.is_empty() {
                writer.write_event(Event::Empty(start)).or_raise(|| ErrorKind::Codec(CODEC))?;
                return Ok(());
            }
            writer.write_event(Event::Start(start)).or_raise(|| ErrorKind::Codec(CODEC))?;
            for (key, child) in body {
                match key.as_str() {
                    TEXT => writer
                        .write_event(Event::Text(BytesText::new(&text_of(child))))
                        .or_raise(|| ErrorKind::Codec(CODEC))?,
                    _ => write_element(writer, key, child)?,
                }
            }
            writer.write_event(Event::End(BytesEnd::new(name))).or_raise(|| ErrorKind::Codec(CODEC))?;
        },
        scalar => {
            writer.write_event(Event::Start(BytesStart::new(name))).or_raise(|| ErrorKind::Codec(CODEC))?;
            writer
                .write_event(Event::Text(BytesText::new(&text_of(scalar))))
                .or_raise(|| ErrorKind::Codec(CODEC))?;
            writer.write_event(Event::End(BytesEnd::new(name))).or_raise(|| ErrorKind::Codec(CODEC))?;
        },
    }
    Ok(())
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_repeated_siblings() {
        let original = map(json!({
            "widget": {
                "label": "a < b & c",
                "tag": ["red", "round"],
                "part": [{"kind": "gear"}, {"kind": "axle"}],
                "empty": null,
            }
        }));
        let text = render(&original, Some(2)).unwrap();
        assert!(text.contains("<tag>red</tag>"));
        assert!(text.contains("a &lt; b &amp; c"));
        assert_eq!(parse(&text).unwrap(), original);
        assert_eq!(parse(&render(&original, None).unwrap()).unwrap(), original);
    }

    #[test]
    fn test_scalars_come_back_as_text() {
        let text = render(&map(json!({"widget": {"count": 3, "ratio": 0.5, "ok": true}})), Some(2)).unwrap();
        assert_eq!(parse(&text).unwrap(), map(json!({"widget": {"count": "3", "ratio": "0.5", "ok": "true"}})));
    }

    #[test]
    fn test_attributes_and_mixed_text() {
        let parsed = parse(r#"<value unit="eV">1.5<error>0.1</error></value>"#).unwrap();
        assert_eq!(parsed, map(json!({"value": {"@unit": "eV", "error": "0.1", "#text": "1.5"}})));
        let text = render(&parsed, Some(2)).unwrap();
        assert!(text.contains(r#"unit="eV""#));
        assert_eq!(parse(&text).unwrap(), parsed);
    }

    #[rstest]
    #[case("42")]
    #[case("-7")]
    #[case("1.50")]
    #[case("0.10")]
    #[case("1e3")]
    #[case("007")]
    #[case("true")]
    #[case("v1.10 ")]
    #[case("  padded  ")]
    #[case("line one\nline two")]
    fn test_text_is_kept_verbatim(#[case] text: &str) {
        let original = map(json!({"faq": {"question": text, "answer": "a"}}));
        for indent in [None, Some(2)] {
            assert_eq!(parse(&render(&original, indent).unwrap()).unwrap(), original);
        }
    }

    #[rstest]
    #[case("<a>1</a><b>2</b>")]
    #[case("<a>1")]
    #[case("")]
    fn test_rejects_non_single_rooted(#[case] text: &str) {
        assert!(parse(text).is_err());
    }

    #[test]
    fn test_render_needs_single_root() {
        assert!(render(&map(json!({"a": 1, "b": 2})), None).is_err());
        assert!(render(&map(json!({"a": [1, 2]})), None).is_err());
    }
}
