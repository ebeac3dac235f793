use super::{Predicate, any_equal, cells};
use crate::error::Result;
use crate::{Mask, Query, Table, Values};
use serde_json::{Value, json};

/// Exact match: the field equals one of the given values.
///
/// An empty list is membership in an empty set and selects nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct StrMatch;

impl Predicate for StrMatch {
    fn description(&self) -> &'static str {
        "records where a string element equals one of the given values"
    }

    fn mask(&self, table: &Table, field: &str, values: Option<&Values>, parent: Option<&str>) -> Result<Mask> {
        let Some(values) = values else {
            return Ok(Mask::all(table.len()));
        };
        let wanted = values.as_slice();
        Ok(Mask::from_fn(table.len(), |row| any_equal(&cells(table, row, field, parent), wanted)))
    }

    fn query(&self, query: &mut Query, path: &str, values: Option<&Values>) -> Result<()> {
        if let Some(values) = values {
            query.insert(path, json!({ "$in": Value::Array(values.as_slice().to_vec()) }));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::tests::{both, names};
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(None, &["w1", "w2", "w3"])]
    #[case(Some(Values::from("flange")), &["w2"])]
    #[case(Some(Values::from(["flange", "bolt"])), &["w2", "w3"])]
    #[case(Some(Values::from(["missing"])), &[])]
    #[case(Some(Values::from(json!([]))), &[])]
    fn test_label(#[case] values: Option<Values>, #[case] expected: &[&str]) {
        assert_eq!(both(&StrMatch, "label", None, values), names(expected));
    }

    #[rstest]
    #[case(None, &["w1", "w2", "w3"])]
    #[case(Some(Values::from("axle")), &["w1"])]
    #[case(Some(Values::from(["gear", "axle"])), &["w1", "w2"])]
    fn test_nested_kind(#[case] values: Option<Values>, #[case] expected: &[&str]) {
        assert_eq!(both(&StrMatch, "kind", Some("part"), values), names(expected));
    }

    #[rstest]
    #[case("label", None, json!(["bolt", null]), &["w3"])]
    #[case("colour", None, json!([null]), &["w1", "w2", "w3"])]
    #[case("kind", Some("part"), json!([null]), &["w3"])]
    #[case("kind", Some("part"), json!(["axle", null]), &["w1", "w3"])]
    fn test_null_selects_missing_fields(
        #[case] field: &str,
        #[case] parent: Option<&str>,
        #[case] values: Value,
        #[case] expected: &[&str],
    ) {
        assert_eq!(both(&StrMatch, field, parent, Some(Values::from(values))), names(expected));
    }

    #[test]
    fn test_none_adds_nothing_to_query() {
        let mut query = Query::new();
        StrMatch.query(&mut query, "label", None).unwrap();
        assert!(query.is_empty());
    }
}
