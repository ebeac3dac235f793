//! A small record style exercising every predicate translator, for tests.

use super::root_object;
use crate::error::{ErrorKind, Result};
use crate::model::{Model, as_list, text};
use crate::name::validate as validate_name;
use crate::record::{Record, RecordStyle, SearchField};
use exn::ResultExt;
use recordbase_query::{DateMatch, Field, FieldKind, InList, IntMatch, Row, StrContains, StrMatch, integer};
use serde_json::{Map, Value};
use std::any::Any;
use time::Date;
use time::macros::format_description;

const STYLE: &str = "widget";
const ROOT: &str = "widget";

const FIELDS: &[Field] = &[
    Field::new("label", FieldKind::Str),
    Field::new("count", FieldKind::Int),
    Field::new("tags", FieldKind::List),
    Field::new("description", FieldKind::Str),
    Field::new("released", FieldKind::Date),
    Field::new("parts", FieldKind::Nested),
];

const SEARCH: &[SearchField] = &[
    SearchField { param: "label", predicate: &StrMatch, column: "label", parent: None, path: "widget.label" },
    SearchField { param: "count", predicate: &IntMatch, column: "count", parent: None, path: "widget.count" },
    SearchField { param: "tag", predicate: &InList, column: "tags", parent: None, path: "widget.tag" },
    SearchField {
        param: "description",
        predicate: &StrContains,
        column: "description",
        parent: None,
        path: "widget.description",
    },
    SearchField { param: "released", predicate: &DateMatch, column: "released", parent: None, path: "widget.released" },
    SearchField { param: "kind", predicate: &StrMatch, column: "kind", parent: Some("parts"), path: "widget.part.kind" },
    SearchField {
        param: "note",
        predicate: &StrContains,
        column: "note",
        parent: Some("parts"),
        path: "widget.part.note",
    },
];

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Part {
    pub kind: String,
    pub note: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Widget {
    name: String,
    pub label: String,
    pub count: Option<i64>,
    pub tags: Vec<String>,
    pub description: Option<String>,
    pub released: Option<Date>,
    pub parts: Vec<Part>,
    model: Option<Model>,
}

impl Widget {
    pub fn new(name: &str, label: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: validate_name(name)?.to_string(),
            label: label.into(),
            count: None,
            tags: Vec::new(),
            description: None,
            released: None,
            parts: Vec::new(),
            model: None,
        })
    }

    pub fn count(mut self, count: i64) -> Self {
        self.count = Some(count);
        self
    }

    pub fn tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn released(mut self, date: Date) -> Self {
        self.released = Some(date);
        self
    }

    pub fn part(mut self, kind: impl Into<String>, note: Option<&str>) -> Self {
        self.parts.push(Part { kind: kind.into(), note: note.map(str::to_string) });
        self
    }
}

impl Record for Widget {
    fn style(&self) -> &str {
        STYLE
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model_root(&self) -> &str {
        ROOT
    }

    fn render(&self) -> Result<Model> {
        let mut content = Map::new();
        content.insert("label".into(), Value::from(self.label.as_str()));
        if let Some(count) = self.count {
            content.insert("count".into(), Value::from(count));
        }
        if !self.tags.is_empty() {
            content.insert("tag".into(), Value::from(self.tags.clone()));
        }
        if let Some(description) = &self.description {
            content.insert("description".into(), Value::from(description.as_str()));
        }
        if let Some(released) = self.released {
            content.insert("released".into(), Value::from(released.to_string()));
        }
        if !self.parts.is_empty() {
            let parts = self
                .parts
                .iter()
                .map(|p| {
                    let mut part = Map::new();
                    part.insert("kind".into(), Value::from(p.kind.as_str()));
                    if let Some(note) = &p.note {
                        part.insert("note".into(), Value::from(note.as_str()));
                    }
                    Value::Object(part)
                })
                .collect();
            content.insert("part".into(), Value::Array(parts));
        }
        Ok(Model::new(ROOT, Value::Object(content)))
    }

    fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    fn set_model(&mut self, model: Model) {
        self.model = Some(model);
    }

    fn metadata(&self) -> Row {
        let parts = self
            .parts
            .iter()
            .map(|p| {
                let mut part = Map::new();
                part.insert("kind".into(), Value::from(p.kind.as_str()));
                part.insert("note".into(), p.note.as_deref().map_or(Value::Null, Value::from));
                Value::Object(part)
            })
            .collect();
        let mut row = Row::new();
        row.insert("name".into(), Value::from(self.name.as_str()));
        row.insert("label".into(), Value::from(self.label.as_str()));
        row.insert("count".into(), self.count.map_or(Value::Null, Value::from));
        row.insert("tags".into(), Value::from(self.tags.clone()));
        row.insert("description".into(), self.description.as_deref().map_or(Value::Null, Value::from));
        row.insert("released".into(), self.released.map_or(Value::Null, |d| Value::from(d.to_string())));
        row.insert("parts".into(), Value::Array(parts));
        row
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct WidgetStyle;

impl RecordStyle for WidgetStyle {
    fn style(&self) -> &'static str {
        STYLE
    }

    fn model_root(&self) -> &'static str {
        ROOT
    }

    fn fields(&self) -> &'static [Field] {
        FIELDS
    }

    fn search_fields(&self) -> &'static [SearchField] {
        SEARCH
    }

    fn load(&self, name: &str, model: Model) -> Result<Box<dyn Record>> {
        let (model, content) = root_object(model, ROOT)?;
        let released = match text(content.get("released")) {
            Some(date) => Some(
                Date::parse(&date, format_description!("[year]-[month]-[day]"))
                    .or_raise(|| ErrorKind::InvalidModel(STYLE.to_string(), format!("invalid date `{date}`")))?,
            ),
            None => None,
        };
        let parts = as_list(content.get("part"))
            .into_iter()
            .filter_map(|p| Some(Part { kind: text(p.get("kind"))?, note: text(p.get("note")) }))
            .collect();
        let mut widget = Widget::new(name, text(content.get("label")).unwrap_or_default())?;
        widget.count = content.get("count").and_then(integer);
        widget.tags = as_list(content.get("tag")).into_iter().filter_map(|t| text(Some(t))).collect();
        widget.description = text(content.get("description"));
        widget.released = released;
        widget.parts = parts;
        widget.model = Some(model);
        Ok(Box::new(widget))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Format;
    use rstest::rstest;
    use time::macros::date;

    #[rstest]
    #[case(Format::Json)]
    #[case(Format::Xml)]
    fn test_round_trip_metadata(#[case] format: Format) {
        let mut widget = Widget::new("w1", "sprocket")
            .unwrap()
            .count(3)
            .tags(["red"])
            .description("a small sprocket")
            .released(date!(2020 - 01 - 02))
            .part("gear", Some("left hand"))
            .part("axle", None);
        let text = format.render(widget.build_model().unwrap(), Some(2)).unwrap();
        let loaded = WidgetStyle.load("w1", format.parse(&text).unwrap()).unwrap();
        assert_eq!(loaded.metadata(), widget.metadata());
    }
}
