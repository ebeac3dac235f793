use super::{Predicate, cells, has};
use crate::error::Result;
use crate::{Mask, Query, Table, Values};
use serde_json::{Value, json};

/// List containment: every given value appears in the record's list field.
///
/// This is AND-of-membership, not set equality; the record may hold more.
/// An empty list, like `None`, imposes no constraint.
#[derive(Clone, Copy, Debug, Default)]
pub struct InList;

impl Predicate for InList {
    fn description(&self) -> &'static str {
        "records where a list element contains every given value"
    }

    fn mask(&self, table: &Table, field: &str, values: Option<&Values>, parent: Option<&str>) -> Result<Mask> {
        let Some(values) = values.filter(|v| !v.is_empty()) else {
            return Ok(Mask::all(table.len()));
        };
        Ok(Mask::from_fn(table.len(), |row| {
            let cells = cells(table, row, field, parent);
            values.iter().all(|wanted| has(&cells, wanted))
        }))
    }

    fn query(&self, query: &mut Query, path: &str, values: Option<&Values>) -> Result<()> {
        if let Some(values) = values.filter(|v| !v.is_empty()) {
            query.insert(path, json!({ "$all": Value::Array(values.as_slice().to_vec()) }));
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
    #[case(Some(Values::from(json!([]))), &["w1", "w2", "w3"])]
    #[case(Some(Values::from("red")), &["w1", "w2"])]
    #[case(Some(Values::from(["red", "round"])), &["w1"])]
    #[case(Some(Values::from(["red", "blue"])), &[])]
    fn test_tags(#[case] values: Option<Values>, #[case] expected: &[&str]) {
        assert_eq!(both(&InList, "tags", None, values), names(expected));
    }

    #[rstest]
    #[case(Some(Values::from(["gear", "axle"])), &["w1"])]
    #[case(Some(Values::from("gear")), &["w1", "w2"])]
    #[case(Some(Values::from(json!([null]))), &["w3"])]
    fn test_across_nested_elements(#[case] values: Option<Values>, #[case] expected: &[&str]) {
        assert_eq!(both(&InList, "kind", Some("part"), values), names(expected));
    }
}
