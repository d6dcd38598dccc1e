//! In-memory tabular structure produced by the file loaders.

use serde_json::Value;
use std::collections::HashMap;

/// Rectangular table of scalar cells with named columns
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table, normalizing header names and padding short rows with nulls.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let columns = normalize_headers(headers);
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Null);
                row
            })
            .collect();

        Self { columns, rows }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of the column at `idx`, top to bottom.
    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |row| row.get(idx).unwrap_or(&Value::Null))
    }

    pub fn head(&self, n: usize) -> &[Vec<Value>] {
        &self.rows[..self.rows.len().min(n)]
    }
}

/// Trim header names, name blank ones `Unnamed: <idx>` and suffix duplicates
/// with `.1`, `.2`, ... so every column name is unique.
fn normalize_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(headers.len());

    for (idx, header) in headers.into_iter().enumerate() {
        let trimmed = header.trim();
        let base = if trimmed.is_empty() {
            format!("Unnamed: {}", idx)
        } else {
            trimmed.to_string()
        };

        let mut name = base.clone();
        while let Some(count) = seen.get_mut(&name) {
            *count += 1;
            name = format!("{}.{}", base, count);
        }
        seen.insert(name.clone(), 0);
        seen.entry(base).or_insert(0);
        out.push(name);
    }

    out
}
