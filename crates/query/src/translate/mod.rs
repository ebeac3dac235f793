//! Predicate translators.
//!
//! Each translator is a stateless unit struct implementing [`Predicate`] for
//! one logical operator. A `None` filter value never constrains anything, in
//! either projection.

mod date_match;
mod in_list;
mod int_match;
mod str_contains;
mod str_match;

pub use self::date_match::DateMatch;
pub use self::in_list::InList;
pub use self::int_match::IntMatch;
pub use self::str_contains::StrContains;
pub use self::str_match::StrMatch;
use crate::document::same;
use crate::error::Result;
use crate::{Mask, Query, Table, Values};
use serde_json::Value;

/// One filter operator, rendered both as a table mask and as a document query.
///
/// For the same inputs, [`mask`](Predicate::mask) over a table and
/// [`query`](Predicate::query) evaluated over documents holding the same rows
/// select the same records.
pub trait Predicate: Send + Sync {
    /// Short human-readable summary, used when listing a style's search fields.
    fn description(&self) -> &'static str;

    /// Select rows of `table` whose `field` satisfies `values`.
    ///
    /// With `parent`, `field` is looked up inside each element of the
    /// repeated sub-structure held in the `parent` column.
    fn mask(&self, table: &Table, field: &str, values: Option<&Values>, parent: Option<&str>) -> Result<Mask>;

    /// Add the equivalent condition on the dotted `path` to `query`.
    fn query(&self, query: &mut Query, path: &str, values: Option<&Values>) -> Result<()>;
}

/// The cells a row offers for `field`: the cell itself, or with `parent`, the
/// `field` of every element of the parent cell.
pub(crate) fn cells<'a>(table: &'a Table, row: usize, field: &str, parent: Option<&str>) -> Vec<&'a Value> {
    match parent {
        None => match table.cell(row, field) {
            Value::Null => Vec::new(),
            cell => vec![cell],
        },
        Some(parent) => match table.cell(row, parent) {
            Value::Array(items) => items.iter().filter_map(|item| item.get(field)).collect(),
            Value::Object(map) => map.get(field).into_iter().collect(),
            _ => Vec::new(),
        },
    }
}

/// Cells expanded the way document queries compare them: arrays count both as
/// a whole and element-wise.
pub(crate) fn expand<'a>(cells: &[&'a Value]) -> Vec<&'a Value> {
    let mut out = Vec::new();
    for cell in cells {
        out.push(*cell);
        if let Value::Array(items) = cell {
            out.extend(items.iter());
        }
    }
    out
}

/// Whether any expanded cell equals `wanted`.
///
/// A row with no cells for the field (missing, or `null`) equals `null`, which
/// is how document queries treat a missing path.
pub(crate) fn has(cells: &[&Value], wanted: &Value) -> bool {
    if cells.is_empty() {
        return wanted.is_null();
    }
    expand(cells).iter().any(|cell| same(cell, wanted))
}

/// Whether any expanded cell equals any of `wanted`.
pub(crate) fn any_equal(cells: &[&Value], wanted: &[Value]) -> bool {
    wanted.iter().any(|w| has(cells, w))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::Row;
    use serde_json::json;
    use std::collections::BTreeSet;

    /// Rows shared by every translator's equivalence tests.
    pub fn rows() -> Vec<Row> {
        [
            json!({
                "name": "w1", "label": "sprocket", "count": 3, "released": "2020-01-02",
                "tags": ["red", "round"], "description": "a small sprocket (metal)",
                "part": [{"kind": "gear", "note": "left hand"}, {"kind": "axle", "note": "steel"}],
            }),
            json!({
                "name": "w2", "label": "flange", "count": 5, "released": "2021-06-30",
                "tags": ["red"], "description": "wide flange",
                "part": [{"kind": "gear", "note": "right hand"}],
            }),
            json!({
                "name": "w3", "label": "bolt", "count": 3, "released": "2020-01-02",
                "tags": [], "description": "a bolt.*",
                "part": [],
            }),
        ]
        .into_iter()
        .map(|v| match v {
            Value::Object(map) => map,
            _ => unreachable!(),
        })
        .collect()
    }

    fn mask_names(table: &Table, mask: &Mask) -> BTreeSet<String> {
        table.filter(mask).name_set()
    }

    fn query_names(rows: &[Row], query: &Query) -> BTreeSet<String> {
        rows.iter()
            .filter(|row| query.matches(&Value::Object((*row).clone())).unwrap())
            .map(|row| row["name"].as_str().unwrap().to_string())
            .collect()
    }

    /// Run both projections and return the selected names, asserting they
    /// agree.
    pub fn both(pred: &dyn Predicate, field: &str, parent: Option<&str>, values: Option<Values>) -> BTreeSet<String> {
        let rows = rows();
        let table = Table::from_rows(rows.clone());
        let mask = pred.mask(&table, field, values.as_ref(), parent).unwrap();
        let mut query = Query::new();
        let path = match parent {
            Some(parent) => format!("{parent}.{field}"),
            None => field.to_string(),
        };
        pred.query(&mut query, &path, values.as_ref()).unwrap();
        let from_mask = mask_names(&table, &mask);
        let from_query = query_names(&rows, &query);
        assert_eq!(from_mask, from_query, "mask and query disagree for {field} = {values:?} (query {query})");
        from_mask
    }

    pub fn names(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_cells_with_parent() {
        let table = Table::from_rows(rows());
        assert_eq!(cells(&table, 0, "kind", Some("part")), vec![&json!("gear"), &json!("axle")]);
        assert!(cells(&table, 2, "kind", Some("part")).is_empty());
        assert_eq!(cells(&table, 0, "label", None), vec![&json!("sprocket")]);
    }

    #[test]
    fn test_null_matches_missing_fields() {
        let table = Table::from_rows(rows());
        // w3 has no parts, so it has no `kind` at all.
        assert!(has(&cells(&table, 2, "kind", Some("part")), &Value::Null));
        assert!(has(&cells(&table, 0, "missing", None), &Value::Null));
        assert!(!has(&cells(&table, 0, "label", None), &Value::Null));
    }
}
