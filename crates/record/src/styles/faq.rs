use super::root_object;
use crate::error::{ErrorKind, Result};
use crate::model::{Model, text};
use crate::name::validate as validate_name;
use crate::record::{Record, RecordStyle, SearchField};
use exn::OptionExt;
use recordbase_query::{Field, FieldKind, Row, StrContains};
use serde_json::{Value, json};
use std::any::Any;

const STYLE: &str = "FAQ";
const ROOT: &str = "faq";

const FIELDS: &[Field] = &[Field::new("question", FieldKind::Str), Field::new("answer", FieldKind::Str)];

const SEARCH: &[SearchField] = &[
    SearchField { param: "question", predicate: &StrContains, column: "question", parent: None, path: "faq.question" },
    SearchField { param: "answer", predicate: &StrContains, column: "answer", parent: None, path: "faq.answer" },
];

/// A frequently asked question and its answer.
#[derive(Clone, Debug)]
pub struct Faq {
    name: String,
    pub question: String,
    pub answer: String,
    model: Option<Model>,
}

impl Faq {
    pub fn new(name: &str, question: impl Into<String>, answer: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: validate_name(name)?.to_string(),
            question: question.into(),
            answer: answer.into(),
            model: None,
        })
    }
}

impl Record for Faq {
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
        Ok(Model::new(ROOT, json!({ "question": self.question, "answer": self.answer })))
    }

    fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    fn set_model(&mut self, model: Model) {
        self.model = Some(model);
    }

    fn metadata(&self) -> Row {
        let mut row = Row::new();
        row.insert("name".into(), Value::from(self.name.as_str()));
        row.insert("question".into(), Value::from(self.question.as_str()));
        row.insert("answer".into(), Value::from(self.answer.as_str()));
        row
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Style handle for [`Faq`] records.
#[derive(Clone, Copy, Debug, Default)]
pub struct FaqStyle;

impl RecordStyle for FaqStyle {
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
        let question = text(content.get("question"))
            .ok_or_raise(|| ErrorKind::InvalidModel(STYLE.to_string(), "missing `question`".to_string()))?;
        let mut faq = Faq::new(name, question, text(content.get("answer")).unwrap_or_default())?;
        faq.model = Some(model);
        Ok(Box::new(faq))
    }
}
