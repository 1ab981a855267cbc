//! Tabular meter-reading input.
//!
//! A [`ReadingTable`] is an ordered sequence of records with named fields,
//! one record per meter reading. The column set is whatever the upload
//! carried; numeric interpretation happens lazily per cell.
//!
//! Uploads arrive either as CSV (header row = column set, cells kept as
//! text) or as a JSON array of objects.

use std::io::Read;
use std::path::Path;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

/// A single reading: column name → raw cell value, in upload column order.
pub type Record = IndexMap<String, Value>;

/// Encoding of an uploaded readings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingFormat {
    Csv,
    Json,
}

impl ReadingFormat {
    /// Pick a format from the file extension, then the MIME type.
    /// Anything unrecognised is read as JSON.
    pub fn detect(file_name: Option<&str>, content_type: Option<&str>) -> Self {
        let ext = file_name
            .and_then(|n| Path::new(n).extension())
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv") => return Self::Csv,
            Some("json") => return Self::Json,
            _ => {}
        }
        match content_type {
            Some(ct) if ct.to_ascii_lowercase().contains("csv") => Self::Csv,
            _ => Self::Json,
        }
    }
}

/// Ordered batch of readings plus the column set they were uploaded with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadingTable {
    columns: IndexSet<String>,
    rows: Vec<Record>,
}

impl ReadingTable {
    /// Build a table with an explicit header. Columns mentioned by rows but
    /// missing from the header are appended in first-appearance order.
    pub fn new(columns: impl IntoIterator<Item = String>, rows: Vec<Record>) -> Self {
        let mut set: IndexSet<String> = columns.into_iter().collect();
        for row in &rows {
            for key in row.keys() {
                if !set.contains(key) {
                    set.insert(key.clone());
                }
            }
        }
        Self { columns: set, rows }
    }

    /// Build a table whose header is the union of all record keys.
    pub fn from_records(rows: Vec<Record>) -> Self {
        Self::new(std::iter::empty(), rows)
    }

    /// Decode `bytes` in the given format.
    pub fn decode(bytes: &[u8], format: ReadingFormat) -> Result<Self, CoreError> {
        match format {
            ReadingFormat::Csv => Self::from_csv_reader(bytes),
            ReadingFormat::Json => Self::from_json_slice(bytes),
        }
    }

    /// Decode CSV with a header row. The header is the column set even when
    /// there are no data rows. Cells stay text; blank cells become null.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, CoreError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::Headers)
            .from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let row: Record = headers
                .iter()
                .zip(record.iter())
                .map(|(column, cell)| (column.clone(), csv_cell(cell)))
                .collect();
            rows.push(row);
        }
        Ok(Self::new(headers, rows))
    }

    /// Decode a JSON array of objects.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, CoreError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_json_value(value)
    }

    /// Decode an already-parsed JSON value (must be an array of objects).
    pub fn from_json_value(value: Value) -> Result<Self, CoreError> {
        let items = match value {
            Value::Array(items) => items,
            other => {
                return Err(CoreError::InvalidTable(format!(
                    "expected an array of records, got {}",
                    json_kind(&other)
                )))
            }
        };

        let mut rows = Vec::with_capacity(items.len());
        for (idx, item) in items.into_iter().enumerate() {
            match item {
                Value::Object(map) => rows.push(map.into_iter().collect::<Record>()),
                other => {
                    return Err(CoreError::InvalidTable(format!(
                        "record {} is {}, expected an object",
                        idx,
                        json_kind(&other)
                    )))
                }
            }
        }
        Ok(Self::from_records(rows))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    /// Numeric value of a cell, `None` when absent, null or non-numeric.
    pub fn numeric(&self, row: usize, field: &str) -> Option<f64> {
        self.rows.get(row)?.get(field).and_then(numeric_value)
    }

    /// Identifier used for a record in reports: the key column rendered as
    /// text, or the 0-based row position when the key is absent or null.
    pub fn record_key(&self, row: usize, key_field: &str) -> String {
        match self.rows.get(row).and_then(|r| r.get(key_field)) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => row.to_string(),
            Some(other) => other.to_string(),
        }
    }
}

/// Interpret a cell as a float. Numeric strings are accepted (uploads are
/// often stringly typed); booleans, nulls and blanks are not numbers.
pub fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn csv_cell(cell: &str) -> Value {
    if cell.trim().is_empty() {
        Value::Null
    } else {
        Value::String(cell.to_string())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn columns_are_union_in_first_appearance_order() {
        let table = ReadingTable::from_json_value(json!([
            {"meter_number": "M1", "import_VAh": 1.0},
            {"meter_number": "M2", "export_Wh": 3}
        ]))
        .unwrap();

        let cols: Vec<&str> = table.columns().collect();
        assert_eq!(cols, vec!["meter_number", "import_VAh", "export_Wh"]);
        assert_eq!(table.len(), 2);
        assert!(table.has_column("export_Wh"));
        assert!(!table.has_column("X"));
    }

    #[test]
    fn numeric_accepts_numbers_and_numeric_strings() {
        let table = ReadingTable::from_json_value(json!([
            {"a": -5, "b": " 2.5 ", "c": "n/a", "d": null, "e": true}
        ]))
        .unwrap();

        assert_eq!(table.numeric(0, "a"), Some(-5.0));
        assert_eq!(table.numeric(0, "b"), Some(2.5));
        assert_eq!(table.numeric(0, "c"), None);
        assert_eq!(table.numeric(0, "d"), None);
        assert_eq!(table.numeric(0, "e"), None);
        assert_eq!(table.numeric(0, "missing"), None);
        assert_eq!(table.numeric(7, "a"), None);
    }

    #[test]
    fn record_key_falls_back_to_row_position() {
        let table = ReadingTable::from_json_value(json!([
            {"meter_number": "M-001"},
            {"meter_number": 1002},
            {"meter_number": null},
            {}
        ]))
        .unwrap();

        assert_eq!(table.record_key(0, "meter_number"), "M-001");
        assert_eq!(table.record_key(1, "meter_number"), "1002");
        assert_eq!(table.record_key(2, "meter_number"), "2");
        assert_eq!(table.record_key(3, "meter_number"), "3");
    }

    #[test]
    fn rejects_non_array_and_non_object_rows() {
        let err = ReadingTable::from_json_value(json!({"a": 1})).unwrap_err();
        assert!(err.to_string().contains("expected an array"));

        let err = ReadingTable::from_json_value(json!([{"a": 1}, 2])).unwrap_err();
        assert!(err.to_string().contains("record 1"));
    }

    #[test]
    fn csv_header_only_keeps_columns() {
        let table = ReadingTable::from_csv_reader("meter_number, import_VAh\n".as_bytes()).unwrap();
        assert!(table.is_empty());
        let cols: Vec<&str> = table.columns().collect();
        assert_eq!(cols, vec!["meter_number", "import_VAh"]);
    }

    #[test]
    fn csv_cells_are_text_and_blank_is_null() {
        let csv = "meter_number,import_VAh,voltage\nM1,-5,230.5\n,10,\n";
        let table = ReadingTable::from_csv_reader(csv.as_bytes()).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0]["import_VAh"], json!("-5"));
        assert_eq!(table.numeric(0, "import_VAh"), Some(-5.0));
        assert_eq!(table.numeric(0, "voltage"), Some(230.5));
        assert_eq!(table.rows()[1]["voltage"], Value::Null);
        assert_eq!(table.numeric(1, "voltage"), None);
        assert_eq!(table.record_key(0, "meter_number"), "M1");
        assert_eq!(table.record_key(1, "meter_number"), "1");
    }

    #[test]
    fn csv_missing_column_is_not_in_header() {
        let csv = "meter_number,import_VAh\nM1,1\n";
        let table = ReadingTable::from_csv_reader(csv.as_bytes()).unwrap();
        assert!(table.has_column("import_VAh"));
        assert!(!table.has_column("export_VAh"));
    }

    #[test]
    fn csv_ragged_row_is_an_error() {
        let csv = "meter_number,import_VAh\nM1,1,extra\n";
        let err = ReadingTable::from_csv_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, CoreError::Csv(_)));
    }

    #[test]
    fn format_detection() {
        assert_eq!(ReadingFormat::detect(Some("march.CSV"), None), ReadingFormat::Csv);
        assert_eq!(
            ReadingFormat::detect(Some("march.json"), Some("text/csv")),
            ReadingFormat::Json
        );
        assert_eq!(ReadingFormat::detect(None, Some("text/csv; charset=utf-8")), ReadingFormat::Csv);
        assert_eq!(ReadingFormat::detect(Some("upload"), None), ReadingFormat::Json);
    }

    #[test]
    fn decode_dispatches_on_format() {
        let csv = ReadingTable::decode(b"a\n1\n", ReadingFormat::Csv).unwrap();
        let json = ReadingTable::decode(br#"[{"a": 1}]"#, ReadingFormat::Json).unwrap();
        assert_eq!(csv.numeric(0, "a"), json.numeric(0, "a"));
    }

    #[test]
    fn explicit_header_keeps_empty_columns() {
        let table = ReadingTable::new(vec!["import_VAh".to_string()], Vec::new());
        assert!(table.is_empty());
        assert!(table.has_column("import_VAh"));
    }
}
