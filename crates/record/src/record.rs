//! The record contract.
//!
//! A [`Record`] is one named, styled piece of hierarchical content. Its
//! [`RecordStyle`] is the style-level half of the contract: it parses stored
//! content back into records and translates search filters for databases.

use crate::error::{ErrorKind, Result};
use crate::model::Model;
use crate::registry::StyleRegistry;
use exn::OptionExt;
use recordbase_query::{Field, Filter, Mask, Predicate, Query, Row, Table};
use std::any::Any;
use std::borrow::Cow;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::warn;

/// One stored record.
///
/// The name is fixed at construction. The model can be rebuilt from the
/// record's current attributes with [`build_model`](Record::build_model)
/// without replacing the record itself.
pub trait Record: Debug + Send + Sync {
    fn style(&self) -> &str;

    fn name(&self) -> &str;

    /// The single top-level key of this record's model.
    fn model_root(&self) -> &str;

    /// Derive fresh content from the record's attributes.
    fn render(&self) -> Result<Model>;

    /// The model last loaded or built, if any.
    fn model(&self) -> Option<&Model>;

    /// Replace the held model.
    fn set_model(&mut self, model: Model);

    /// Flat field map describing this record, always including `name`.
    fn metadata(&self) -> Row;

    fn as_any(&self) -> &dyn Any;

    /// Rebuild the held model from the current attributes.
    fn build_model(&mut self) -> Result<&Model> {
        let model = self.render()?;
        self.set_model(model);
        self.model()
            .ok_or_raise(|| ErrorKind::InvalidModel(self.style().to_string(), "model was not retained".to_string()))
    }

    fn has_model(&self) -> bool {
        self.model().is_some()
    }

    /// The content to store: the held model when there is one, otherwise a
    /// freshly rendered one.
    fn content(&self) -> Result<Cow<'_, Model>> {
        match self.model() {
            Some(model) => Ok(Cow::Borrowed(model)),
            None => Ok(Cow::Owned(self.render()?)),
        }
    }
}

/// A declared search parameter and how it maps onto metadata and content.
#[derive(Clone, Copy)]
pub struct SearchField {
    /// Filter key callers use.
    pub param: &'static str,
    pub predicate: &'static dyn Predicate,
    /// Metadata column the mask reads (inside `parent` when set).
    pub column: &'static str,
    /// Metadata column holding the repeated sub-structure, if any.
    pub parent: Option<&'static str>,
    /// Dotted content path, starting at the model root.
    pub path: &'static str,
}

impl Debug for SearchField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchField")
            .field("param", &self.param)
            .field("column", &self.column)
            .field("parent", &self.parent)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Style-level behaviour shared by every record of one style.
///
/// The default filter methods are driven by [`search_fields`]; a style that
/// declares none matches everything.
///
/// [`search_fields`]: RecordStyle::search_fields
pub trait RecordStyle: Send + Sync {
    fn style(&self) -> &'static str;

    fn model_root(&self) -> &'static str;

    /// Typed metadata columns, used to restore cached tables.
    fn fields(&self) -> &'static [Field] {
        &[]
    }

    fn search_fields(&self) -> &'static [SearchField] {
        &[]
    }

    /// Reconstruct a record from stored content.
    ///
    /// Content rooted elsewhere is searched for the style's root element.
    fn load(&self, name: &str, model: Model) -> Result<Box<dyn Record>>;

    /// Select rows of a metadata table, ANDing every constrained field.
    fn filter_mask(&self, table: &Table, filter: &Filter) -> Result<Mask> {
        warn_unknown(self.style(), self.search_fields(), filter);
        let mut mask = Mask::all(table.len());
        for field in self.search_fields() {
            let values = filter.get(field.param);
            let selected = field
                .predicate
                .mask(table, field.column, values, field.parent)
                .map_err(ErrorKind::filter)?;
            mask = mask & selected;
        }
        Ok(mask)
    }

    /// The same selection as [`filter_mask`](RecordStyle::filter_mask), as a
    /// document query with paths starting at the model root.
    fn native_query(&self, filter: &Filter) -> Result<Query> {
        warn_unknown(self.style(), self.search_fields(), filter);
        let mut query = Query::new();
        for field in self.search_fields() {
            let values = filter.get(field.param);
            field.predicate.query(&mut query, field.path, values).map_err(ErrorKind::filter)?;
        }
        Ok(query)
    }
}

fn warn_unknown(style: &str, fields: &[SearchField], filter: &Filter) {
    for param in filter.fields() {
        if param != "name" && !fields.iter().any(|f| f.param == param) {
            warn!(style, param, "ignoring filter on undeclared search field");
        }
    }
}

/// Handle to a registered record style.
pub type StyleHandle = Arc<dyn RecordStyle>;

/// The record styles known to this process.
pub type RecordRegistry = StyleRegistry<StyleHandle>;

impl StyleRegistry<StyleHandle> {
    /// A registry holding every record style built into this crate.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.add(crate::styles::FaqStyle);
        registry.add(crate::styles::RequestStyle);
        #[cfg(feature = "mock")]
        registry.add(crate::styles::WidgetStyle);
        registry
    }

    /// Register a style under its own name.
    pub fn add(&mut self, style: impl RecordStyle + 'static) {
        self.register(style.style(), Arc::new(style) as StyleHandle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// A style that declares nothing, so it inherits match-everything.
    struct Bare;

    #[derive(Debug)]
    struct BareRecord(String, Option<Model>);

    impl Record for BareRecord {
        fn style(&self) -> &str {
            "bare"
        }
        fn name(&self) -> &str {
            &self.0
        }
        fn model_root(&self) -> &str {
            "bare"
        }
        fn render(&self) -> Result<Model> {
            Ok(Model::new("bare", json!({"rendered": true})))
        }
        fn model(&self) -> Option<&Model> {
            self.1.as_ref()
        }
        fn set_model(&mut self, model: Model) {
            self.1 = Some(model);
        }
        fn metadata(&self) -> Row {
            Row::from_iter([("name".to_string(), json!(self.0))])
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    impl RecordStyle for Bare {
        fn style(&self) -> &'static str {
            "bare"
        }
        fn model_root(&self) -> &'static str {
            "bare"
        }
        fn load(&self, name: &str, model: Model) -> Result<Box<dyn Record>> {
            Ok(Box::new(BareRecord(name.to_string(), Some(model.rooted("bare")?))))
        }
    }

    #[test]
    fn test_default_filters_match_everything() {
        let table = Table::from_rows([BareRecord("a".into(), None).metadata(), BareRecord("b".into(), None).metadata()]);
        let filter = Filter::new().with("anything", "x");
        assert_eq!(Bare.filter_mask(&table, &filter).unwrap().count(), 2);
        assert!(Bare.native_query(&filter).unwrap().is_empty());
    }

    #[test]
    fn test_content_prefers_held_model() {
        let mut record = BareRecord("a".into(), None);
        assert!(!record.has_model());
        assert!(matches!(record.content().unwrap(), Cow::Owned(_)));
        record.build_model().unwrap();
        assert!(record.has_model());
        assert!(matches!(record.content().unwrap(), Cow::Borrowed(_)));

        let loaded = Bare.load("b", Model::new("bare", json!({"x": 1}))).unwrap();
        assert_eq!(loaded.content().unwrap().find("x"), Some(&json!(1)));
    }

    #[test]
    fn test_builtin_registry() {
        let registry = RecordRegistry::builtin();
        assert!(registry.get("FAQ").is_ok());
        assert!(registry.get("Request").is_ok());
        let err = registry.get("citation").err().unwrap();
        assert!(matches!(&*err, ErrorKind::UnknownStyle(_)));
    }
}
