//! In-memory tabular record metadata.

use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::ops::{BitAnd, Index};

/// One record's flat metadata: field name to value.
///
/// Values are usually scalars; list-typed fields hold arrays, and repeated
/// sub-structures hold arrays of objects.
pub type Row = Map<String, Value>;

/// Column name every table is keyed and sorted by.
pub const NAME: &str = "name";

static NULL: Value = Value::Null;

/// Metadata rows for many records of one style.
///
/// This is what a search hands back next to the records themselves, and what
/// the local database keeps in its CSV cache. Rows are kept sorted by `name`.
///
/// The column set is the union of every row's keys, in the order they were
/// first seen, with `name` moved to the front. Missing cells read as `null`,
/// so rows from different versions of a style can share a table.
///
/// # Examples
///
/// ```
/// use recordbase_query::{Mask, Table};
/// use serde_json::{Value, json};
///
/// let rows = [json!({"name": "w2", "count": 5}), json!({"name": "w1", "label": "gear"})]
///     .into_iter()
///     .filter_map(|v| match v {
///         Value::Object(map) => Some(map),
///         _ => None,
///     });
/// let table = Table::from_rows(rows);
/// assert_eq!(table.names(), vec!["w1", "w2"]);
/// assert_eq!(table.cell(0, "count"), &Value::Null);
///
/// let kept = table.filter(&Mask::from(vec![false, true]));
/// assert_eq!(kept.names(), vec!["w2"]);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Build a table from rows, sorted by their `name` cell.
    pub fn from_rows(rows: impl IntoIterator<Item = Row>) -> Self {
        let mut table = Self::default();
        for row in rows {
            table.push(row);
        }
        table.sort_by_name();
        table
    }

    /// Append a row, extending the column set with any new keys.
    pub fn push(&mut self, row: Row) {
        for key in row.keys() {
            if !self.columns.iter().any(|c| c == key) {
                self.columns.push(key.clone());
            }
        }
        self.rows.push(row);
    }

    pub fn sort_by_name(&mut self) {
        self.rows.sort_by(|a, b| name_of(a).cmp(name_of(b)));
        // `name` leads, remaining columns stay in first-seen order.
        if let Some(pos) = self.columns.iter().position(|c| c == NAME) {
            let name = self.columns.remove(pos);
            self.columns.insert(0, name);
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at `(row, column)`, or `null` when the row lacks the column.
    pub fn cell(&self, row: usize, column: &str) -> &Value {
        self.rows.get(row).and_then(|r| r.get(column)).unwrap_or(&NULL)
    }

    /// Every row's `name` cell, in row order.
    pub fn names(&self) -> Vec<&str> {
        self.rows.iter().map(name_of).collect()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.rows.iter().any(|r| name_of(r) == name)
    }

    /// The set of names, for order-insensitive comparisons.
    pub fn name_set(&self) -> BTreeSet<String> {
        self.rows.iter().map(|r| name_of(r).to_string()).collect()
    }

    /// A new table holding only the rows selected by `mask`.
    pub fn filter(&self, mask: &Mask) -> Table {
        let rows = self
            .rows
            .iter()
            .zip(mask.iter())
            .filter(|(_, keep)| *keep)
            .map(|(row, _)| row.clone())
            .collect();
        Table { columns: self.columns.clone(), rows }
    }
}

impl Index<usize> for Table {
    type Output = Row;

    fn index(&self, index: usize) -> &Row {
        &self.rows[index]
    }
}

fn name_of(row: &Row) -> &str {
    row.get(NAME).and_then(Value::as_str).unwrap_or_default()
}

/// One boolean per table row, `true` for rows a search keeps.
///
/// Every predicate translator produces one of these from a [`Table`]; a
/// style combines its translators' masks with `&`, and the result is applied
/// with [`Table::filter`]. Combining masks of different lengths keeps only
/// the rows both cover.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask(Vec<bool>);

impl Mask {
    /// Select every row.
    pub fn all(len: usize) -> Self {
        Self(vec![true; len])
    }

    /// Evaluate `keep` for every row index.
    pub fn from_fn(len: usize, keep: impl FnMut(usize) -> bool) -> Self {
        Self((0..len).map(keep).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of selected rows.
    pub fn count(&self) -> usize {
        self.0.iter().filter(|keep| **keep).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.0.iter().copied()
    }

    /// Indices of the selected rows.
    pub fn selected(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().enumerate().filter(|(_, keep)| **keep).map(|(i, _)| i)
    }
}

impl From<Vec<bool>> for Mask {
    fn from(bits: Vec<bool>) -> Self {
        Self(bits)
    }
}

impl BitAnd for Mask {
    type Output = Mask;

    fn bitand(self, rhs: Mask) -> Mask {
        Mask(self.0.into_iter().zip(rhs.0).map(|(a, b)| a && b).collect())
    }
}

/// How a metadata column is typed.
///
/// Tables round-trip through flat text (the local cache is CSV), which loses
/// types; the kind tells the loader how to restore each cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Str,
    Int,
    Float,
    /// Calendar date, kept as its ISO `YYYY-MM-DD` string.
    Date,
    /// List of scalars.
    List,
    /// Repeated sub-structure (list of objects) or a single object.
    Nested,
}

impl FieldKind {
    /// Restore a cell from its flat text form. Empty text is `null`.
    pub fn coerce(self, text: &str) -> Value {
        if text.is_empty() {
            return Value::Null;
        }
        match self {
            Self::Str | Self::Date => Value::String(text.to_string()),
            Self::Int => match text.trim().parse::<i64>() {
                Ok(i) => Value::from(i),
                Err(_) => Value::String(text.to_string()),
            },
            Self::Float => match text.trim().parse::<f64>() {
                Ok(f) => Value::from(f),
                Err(_) => Value::String(text.to_string()),
            },
            Self::List | Self::Nested => Self::infer(text),
        }
    }

    /// Restore a cell of an undeclared column: list- and map-shaped text is
    /// parsed back into structure, integers become numbers, anything else
    /// stays text.
    pub fn infer(text: &str) -> Value {
        let trimmed = text.trim_start();
        if (trimmed.starts_with('[') || trimmed.starts_with('{'))
            && let Ok(value) = serde_json::from_str(trimmed)
        {
            return value;
        }
        match text.parse::<i64>() {
            Ok(i) => Value::from(i),
            Err(_) => Value::String(text.to_string()),
        }
    }

    /// Flatten a cell to the text form [`coerce`](Self::coerce) reverses.
    pub fn flatten(value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// A declared metadata column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl Field {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}
