use super::{Predicate, cells, expand};
use crate::error::Result;
use crate::values::stringify;
use crate::{Mask, Query, Table, Values};
use serde_json::{Value, json};

/// Match on a date (or date-like) field, compared as text.
///
/// Both the filter values and the cells are rendered to strings first, so a
/// `time::Date` and its ISO `YYYY-MM-DD` form select the same records, and so
/// do a stored `3` and a stored `"3"`. A `null` value selects records where
/// the field is missing.
#[derive(Clone, Copy, Debug, Default)]
pub struct DateMatch;

fn push_unique(forms: &mut Vec<Value>, value: Value) {
    if !forms.contains(&value) {
        forms.push(value);
    }
}

/// Every stored value whose text is one of `values`: the value itself, its
/// text, and the number or boolean that text spells.
fn stored_forms(values: &Values) -> Vec<Value> {
    let mut forms = Vec::new();
    for value in values.iter() {
        push_unique(&mut forms, value.clone());
        if value.is_null() {
            continue;
        }
        let text = stringify(value);
        if let Ok(parsed @ (Value::Number(_) | Value::Bool(_))) = serde_json::from_str::<Value>(&text)
            && stringify(&parsed) == text
        {
            push_unique(&mut forms, parsed);
        }
        push_unique(&mut forms, Value::String(text));
    }
    forms
}

impl Predicate for DateMatch {
    fn description(&self) -> &'static str {
        "records where a date element equals one of the given dates"
    }

    fn mask(&self, table: &Table, field: &str, values: Option<&Values>, parent: Option<&str>) -> Result<Mask> {
        let Some(values) = values else {
            return Ok(Mask::all(table.len()));
        };
        let wants_null = values.iter().any(Value::is_null);
        let wanted: Vec<String> = values.iter().filter(|v| !v.is_null()).map(stringify).collect();
        Ok(Mask::from_fn(table.len(), |row| {
            let cells = cells(table, row, field, parent);
            if cells.is_empty() {
                return wants_null;
            }
            expand(&cells).into_iter().filter(|c| !c.is_array()).any(|c| match c {
                Value::Null => wants_null,
                cell => wanted.contains(&stringify(cell)),
            })
        }))
    }

    fn query(&self, query: &mut Query, path: &str, values: Option<&Values>) -> Result<()> {
        if let Some(values) = values {
            query.insert(path, json!({ "$in": stored_forms(values) }));
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
    use time::macros::date;

    #[rstest]
    #[case(None, &["w1", "w2", "w3"])]
    #[case(Some(Values::from("2020-01-02")), &["w1", "w3"])]
    #[case(Some(Values::from(date!(2021 - 06 - 30))), &["w2"])]
    #[case(Some(Values::new([date!(2021 - 06 - 30).to_string(), "1999-01-01".to_string()])), &["w2"])]
    #[case(Some(Values::from(json!([null]))), &[])]
    fn test_released(#[case] values: Option<Values>, #[case] expected: &[&str]) {
        assert_eq!(both(&DateMatch, "released", None, values), names(expected));
    }

    #[rstest]
    #[case(Some(Values::from(3)), &["w1", "w3"])]
    #[case(Some(Values::from("5")), &["w2"])]
    #[case(Some(Values::from(["3", "4"])), &["w1", "w3"])]
    fn test_non_string_field_compares_as_text(#[case] values: Option<Values>, #[case] expected: &[&str]) {
        assert_eq!(both(&DateMatch, "count", None, values), names(expected));
    }

    #[test]
    fn test_query_lists_native_and_text_forms() {
        let mut query = Query::new();
        DateMatch.query(&mut query, "count", Some(&Values::from(json!([3, "2020-01-02", null])))).unwrap();
        assert_eq!(query.get("count"), Some(&json!({"$in": [3, "3", "2020-01-02", null]})));
    }
}
