use super::root_object;
use crate::error::{ErrorKind, Result};
use crate::model::{Model, as_list, text};
use crate::name::validate as validate_name;
use crate::record::{Record, RecordStyle, SearchField};
use exn::{OptionExt, ResultExt};
use recordbase_query::{DateMatch, Field, FieldKind, InList, Row, StrContains, StrMatch};
use serde_json::{Map, Value};
use std::any::Any;
use time::Date;
use time::macros::format_description;

const STYLE: &str = "Request";
const ROOT: &str = "request";

const FIELDS: &[Field] = &[
    Field::new("date", FieldKind::Date),
    Field::new("systems", FieldKind::Nested),
    Field::new("elements", FieldKind::List),
    Field::new("comment", FieldKind::Str),
];

const SEARCH: &[SearchField] = &[
    SearchField { param: "date", predicate: &DateMatch, column: "date", parent: None, path: "request.date" },
    SearchField {
        param: "element",
        predicate: &InList,
        column: "elements",
        parent: None,
        path: "request.system.element",
    },
    SearchField {
        param: "formula",
        predicate: &StrMatch,
        column: "formula",
        parent: Some("systems"),
        path: "request.system.chemical-formula",
    },
    SearchField { param: "comment", predicate: &StrContains, column: "comment", parent: None, path: "request.comment" },
];

/// One requested chemical system: a formula, a set of elements, or both.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct System {
    pub formula: Option<String>,
    pub elements: Vec<String>,
}

impl System {
    pub fn new(formula: Option<&str>, elements: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { formula: formula.map(str::to_string), elements: elements.into_iter().map(Into::into).collect() }
    }

    fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(formula) = &self.formula {
            map.insert("chemical-formula".into(), Value::from(formula.as_str()));
        }
        if !self.elements.is_empty() {
            map.insert("element".into(), Value::from(self.elements.clone()));
        }
        Value::Object(map)
    }

    fn from_value(value: &Value) -> Self {
        Self {
            formula: text(value.get("chemical-formula")),
            elements: as_list(value.get("element")).into_iter().filter_map(|e| text(Some(e))).collect(),
        }
    }
}

/// A user request for new interatomic potentials.
#[derive(Clone, Debug)]
pub struct Request {
    name: String,
    pub date: Date,
    pub systems: Vec<System>,
    pub comment: Option<String>,
    model: Option<Model>,
}

impl Request {
    /// A request named after its date and requested elements.
    pub fn new(date: Date, systems: Vec<System>, comment: Option<&str>) -> Result<Self> {
        let name = Self::default_name(date, &systems);
        Self::with_name(&name, date, systems, comment)
    }

    pub fn with_name(name: &str, date: Date, systems: Vec<System>, comment: Option<&str>) -> Result<Self> {
        Ok(Self {
            name: validate_name(name)?.to_string(),
            date,
            systems,
            comment: comment.map(str::to_string),
            model: None,
        })
    }

    /// The date followed by every requested element, space separated.
    pub fn default_name(date: Date, systems: &[System]) -> String {
        let mut name = date.to_string();
        for element in systems.iter().flat_map(|s| &s.elements) {
            name.push(' ');
            name.push_str(element);
        }
        name
    }

    fn parse_date(text: &str) -> Result<Date> {
        Date::parse(text, format_description!("[year]-[month]-[day]"))
            .or_raise(|| ErrorKind::InvalidModel(STYLE.to_string(), format!("invalid date `{text}`")))
    }
}

impl Record for Request {
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
        content.insert("date".into(), Value::from(self.date.to_string()));
        if !self.systems.is_empty() {
            content.insert("system".into(), Value::Array(self.systems.iter().map(System::to_value).collect()));
        }
        if let Some(comment) = &self.comment {
            content.insert("comment".into(), Value::from(comment.as_str()));
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
        let systems: Vec<Value> = self
            .systems
            .iter()
            .map(|s| {
                let mut map = Map::new();
                map.insert("formula".into(), s.formula.as_deref().map_or(Value::Null, Value::from));
                map.insert("elements".into(), Value::from(s.elements.clone()));
                Value::Object(map)
            })
            .collect();
        let elements: Vec<&str> = self.systems.iter().flat_map(|s| &s.elements).map(String::as_str).collect();
        let mut row = Row::new();
        row.insert("name".into(), Value::from(self.name.as_str()));
        row.insert("date".into(), Value::from(self.date.to_string()));
        row.insert("systems".into(), Value::Array(systems));
        row.insert("elements".into(), Value::from(elements));
        row.insert("comment".into(), self.comment.as_deref().map_or(Value::Null, Value::from));
        row
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Style handle for [`Request`] records.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestStyle;

impl RecordStyle for RequestStyle {
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
        let date = text(content.get("date"))
            .ok_or_raise(|| ErrorKind::InvalidModel(STYLE.to_string(), "missing `date`".to_string()))?;
        let systems = as_list(content.get("system")).into_iter().map(System::from_value).collect();
        let comment = text(content.get("comment"));
        let mut request = Request::with_name(name, Request::parse_date(&date)?, systems, comment.as_deref())?;
        request.model = Some(model);
        Ok(Box::new(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Format;
    use recordbase_query::{Filter, Query, Table};
    use rstest::rstest;
    use time::macros::date;

    fn sample() -> Request {
        Request::new(
            date!(2021 - 03 - 04),
            vec![System::new(Some("AlNi3"), ["Al", "Ni"]), System::new(None, ["Fe"])],
            Some("EAM preferred"),
        )
        .unwrap()
    }

    #[test]
    fn test_default_name() {
        assert_eq!(sample().name(), "2021-03-04 Al Ni Fe");
    }

    #[rstest]
    #[case(Format::Json)]
    #[case(Format::Xml)]
    fn test_round_trip_metadata(#[case] format: Format) {
        let mut request = sample();
        let text = format.render(request.build_model().unwrap(), None).unwrap();
        let loaded = RequestStyle.load(request.name(), format.parse(&text).unwrap()).unwrap();
        assert_eq!(loaded.metadata(), request.metadata());
        let loaded = loaded.as_any().downcast_ref::<Request>().unwrap();
        assert_eq!(loaded.systems, request.systems);
    }

    #[test]
    fn test_single_element_survives_xml() {
        let mut request = Request::new(date!(2020 - 01 - 01), vec![System::new(None, ["Cu"])], None).unwrap();
        let text = Format::Xml.render(request.build_model().unwrap(), None).unwrap();
        let loaded = RequestStyle.load(request.name(), Format::Xml.parse(&text).unwrap()).unwrap();
        assert_eq!(loaded.metadata(), request.metadata());
    }

    #[test]
    fn test_bad_date() {
        let model = Model::new(ROOT, serde_json::json!({"date": "March"}));
        assert!(RequestStyle.load("r", model).is_err());
    }

    #[rstest]
    #[case(Filter::new().with("element", ["Al", "Fe"]), true)]
    #[case(Filter::new().with("element", ["Al", "Cu"]), false)]
    #[case(Filter::new().with("formula", "AlNi3"), true)]
    #[case(Filter::new().with("formula", "Al"), false)]
    #[case(Filter::new().with("date", date!(2021 - 03 - 04)), true)]
    #[case(Filter::new().with("comment", "EAM"), true)]
    fn test_mask_and_query_agree(#[case] filter: Filter, #[case] expected: bool) {
        let mut request = sample();
        let table = Table::from_rows([request.metadata()]);
        let masked = RequestStyle.filter_mask(&table, &filter).unwrap().count() == 1;

        let query: Query = RequestStyle.native_query(&filter).unwrap();
        let content = request.build_model().unwrap().to_value();
        assert_eq!(masked, expected);
        assert_eq!(query.matches(&content).unwrap(), expected);
    }
}
