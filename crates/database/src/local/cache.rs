//! Per-style metadata cache for the local backend.
//!
//! The cache is a CSV file, `<host>/<style>.csv`, holding one row of record
//! metadata per file found in `<host>/<style>/`. Cells are flattened to text;
//! declared [`Field`] kinds restore them on load and undeclared columns are
//! inferred.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use recordbase_query::{Field, FieldKind, Row, Table};
use std::path::Path;

const NAME: &str = "name";

/// Serialize a table to CSV, columns in table order.
pub(crate) fn encode(table: &Table, path: &Path) -> Result<Vec<u8>> {
    // An empty table still needs a readable header.
    let columns: Vec<&str> = match table.columns() {
        [] => vec![NAME],
        columns => columns.iter().map(String::as_str).collect(),
    };
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&columns).or_raise(|| ErrorKind::Cache(path.to_path_buf()))?;
    for row in table.rows() {
        let cells = columns.iter().map(|column| row.get(*column).map(FieldKind::flatten).unwrap_or_default());
        writer.write_record(cells).or_raise(|| ErrorKind::Cache(path.to_path_buf()))?;
    }
    writer.into_inner().or_raise(|| ErrorKind::Cache(path.to_path_buf()))
}

/// Parse CSV written by [`encode`] back into a typed table.
pub(crate) fn decode(bytes: &[u8], fields: &[Field], path: &Path) -> Result<Table> {
    let mut reader = csv::Reader::from_reader(bytes);
    let headers = reader.headers().or_raise(|| ErrorKind::Cache(path.to_path_buf()))?.clone();
    let kinds: Vec<Option<FieldKind>> = headers
        .iter()
        .map(|column| match column {
            NAME => Some(FieldKind::Str),
            _ => fields.iter().find(|f| f.name == column).map(|f| f.kind),
        })
        .collect();
    if !headers.iter().any(|column| column == NAME) {
        exn::bail!(ErrorKind::Cache(path.to_path_buf()));
    }

    let mut table = Table::default();
    for record in reader.records() {
        let record = record.or_raise(|| ErrorKind::Cache(path.to_path_buf()))?;
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .zip(&kinds)
            .map(|((column, text), kind)| {
                let value = match kind {
                    Some(kind) => kind.coerce(text),
                    None => FieldKind::infer(text),
                };
                (column.to_string(), value)
            })
            .collect();
        table.push(row);
    }
    table.sort_by_name();
    Ok(table)
}
