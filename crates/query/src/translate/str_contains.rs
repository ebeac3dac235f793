use super::{Predicate, cells, expand};
use crate::error::Result;
use crate::values::stringify;
use crate::{Mask, Query, Table, Values};
use serde_json::json;

/// Substring match: every given value occurs inside the field.
///
/// With a parent, each value must occur inside the field of at least one
/// element of the repeated sub-structure, not necessarily the same element
/// for every value. The query projection uses `$regex` with the value
/// escaped, so metacharacters are matched literally.
#[derive(Clone, Copy, Debug, Default)]
pub struct StrContains;

impl Predicate for StrContains {
    fn description(&self) -> &'static str {
        "records where a string element contains every given value"
    }

    fn mask(&self, table: &Table, field: &str, values: Option<&Values>, parent: Option<&str>) -> Result<Mask> {
        let Some(values) = values else {
            return Ok(Mask::all(table.len()));
        };
        let needles = values.to_strings();
        Ok(Mask::from_fn(table.len(), |row| {
            let cells = cells(table, row, field, parent);
            let haystacks: Vec<&str> = expand(&cells).into_iter().filter_map(|c| c.as_str()).collect();
            needles.iter().all(|needle| haystacks.iter().any(|h| h.contains(needle.as_str())))
        }))
    }

    fn query(&self, query: &mut Query, path: &str, values: Option<&Values>) -> Result<()> {
        if let Some(values) = values {
            for needle in values.iter().map(stringify) {
                query.push_and(json!({ path: { "$regex": regex::escape(&needle) } }));
            }
        }
        Ok(())
    }
}
