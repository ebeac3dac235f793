use super::{Predicate, any_equal, cells};
use crate::error::{ErrorKind, Result};
use crate::values::{integer, stringify};
use crate::{Mask, Query, Table, Values};
use exn::OptionExt;
use serde_json::{Value, json};

/// Exact match on an integer field.
///
/// Filter values are coerced to integers first (`"3"` and `3` are the same
/// query); a value that is not an integer is rejected. Cells holding numeric
/// text are coerced the same way, and the query accepts a stored number or
/// its text, since XML content holds only text.
#[derive(Clone, Copy, Debug, Default)]
pub struct IntMatch;

impl IntMatch {
    fn coerce(field: &str, values: &Values) -> Result<Vec<Value>> {
        values
            .iter()
            .map(|v| {
                integer(v)
                    .map(Value::from)
                    .ok_or_raise(|| ErrorKind::InvalidValue(field.to_string(), format!("`{v}` is not an integer")))
            })
            .collect()
    }
}

impl Predicate for IntMatch {
    fn description(&self) -> &'static str {
        "records where an integer element equals one of the given values"
    }

    fn mask(&self, table: &Table, field: &str, values: Option<&Values>, parent: Option<&str>) -> Result<Mask> {
        let Some(values) = values else {
            return Ok(Mask::all(table.len()));
        };
        let wanted = Self::coerce(field, values)?;
        Ok(Mask::from_fn(table.len(), |row| {
            let cells = cells(table, row, field, parent);
            let numbers: Vec<Value> = cells.iter().filter_map(|c| integer(c)).map(Value::from).collect();
            let refs: Vec<&Value> = numbers.iter().collect();
            any_equal(&refs, &wanted)
        }))
    }

    fn query(&self, query: &mut Query, path: &str, values: Option<&Values>) -> Result<()> {
        if let Some(values) = values {
            let mut wanted = Self::coerce(path, values)?;
            let text: Vec<Value> = wanted.iter().map(|v| Value::String(stringify(v))).collect();
            wanted.extend(text);
            query.insert(path, json!({ "$in": wanted }));
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
    #[case(Some(Values::from(3)), &["w1", "w3"])]
    #[case(Some(Values::from("5")), &["w2"])]
    #[case(Some(Values::from([3, 5])), &["w1", "w2", "w3"])]
    #[case(Some(Values::from(json!([]))), &[])]
    fn test_count(#[case] values: Option<Values>, #[case] expected: &[&str]) {
        assert_eq!(both(&IntMatch, "count", None, values), names(expected));
    }

    #[test]
    fn test_matches_counts_stored_as_text() {
        let mut query = Query::new();
        IntMatch.query(&mut query, "count", Some(&Values::from("3"))).unwrap();
        assert_eq!(query.get("count"), Some(&json!({"$in": [3, "3"]})));
        assert!(query.matches(&json!({"count": "3"})).unwrap());
        assert!(query.matches(&json!({"count": 3})).unwrap());
        assert!(!query.matches(&json!({"count": "30"})).unwrap());
    }

    #[test]
    fn test_rejects_non_integers() {
        let table = Table::default();
        let err = IntMatch.mask(&table, "count", Some(&Values::from("three")), None).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidValue(field, _) if field == "count"));
        let mut query = Query::new();
        assert!(IntMatch.query(&mut query, "count", Some(&Values::from("three"))).is_err());
    }
}
