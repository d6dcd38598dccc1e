//! Excel Reader - loads the first worksheet of a workbook using calamine.

use crate::error::{DashboardError, Result};
use crate::ingestion::csv_reader::is_na_token;
use crate::ingestion::table::Table;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde_json::Value;
use std::io::Cursor;

/// Read an Excel container (xlsx/xlsm/xls/ods) from memory. The first row of
/// the first worksheet is the header.
pub fn read_excel_bytes(bytes: &[u8]) -> Result<Table> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| DashboardError::Spreadsheet(e.to_string()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| DashboardError::Spreadsheet("Workbook has no worksheets".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| DashboardError::Spreadsheet(format!("Failed to read sheet {}: {}", sheet_name, e)))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row.iter().map(header_text).collect(),
        None => {
            return Err(DashboardError::Spreadsheet(
                "No columns to parse from file".to_string(),
            ))
        }
    };

    let body: Vec<Vec<Value>> = rows
        .map(|row| row.iter().map(cell_value).collect::<Vec<_>>())
        .filter(|row| row.iter().any(|v| !v.is_null()))
        .collect();

    Ok(Table::new(headers, body))
}

fn header_text(cell: &Data) -> String {
    match cell_value(cell) {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) => {
            if is_na_token(s.trim()) {
                Value::Null
            } else {
                Value::String(s.clone())
            }
        }
        Data::Int(i) => Value::Number((*i).into()),
        Data::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| Value::String(d.format("%Y-%m-%dT%H:%M:%S").to_string()))
            .unwrap_or(Value::Null),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
    }
}
