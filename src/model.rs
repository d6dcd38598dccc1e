//! Core data types shared by ingestion, storage and charting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Name of the implicit ingestion-timestamp column.
pub const TIMESTAMP_COLUMN: &str = "_timestamp";

/// Inferred type of a column
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Numeric,
    Datetime,
    Text,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Numeric => "numeric",
            DataType::Datetime => "datetime",
            DataType::Text => "text",
        };
        f.write_str(name)
    }
}

/// A value and how often it occurs in a column
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

/// Type-specific statistics; the variant is the column's data type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "data_type", rename_all = "lowercase")]
pub enum ColumnStats {
    Numeric { min: f64, max: f64, mean: f64 },
    Datetime,
    Text {
        #[serde(default)]
        top_values: Vec<ValueCount>,
    },
}

impl ColumnStats {
    pub fn data_type(&self) -> DataType {
        match self {
            ColumnStats::Numeric { .. } => DataType::Numeric,
            ColumnStats::Datetime => DataType::Datetime,
            ColumnStats::Text { .. } => DataType::Text,
        }
    }
}

/// Profile of one column of an imported file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub total_count: usize,
    pub non_null_count: usize,
    pub unique_count: usize,
    #[serde(flatten)]
    pub stats: ColumnStats,
}

impl ColumnProfile {
    pub fn data_type(&self) -> DataType {
        self.stats.data_type()
    }

    pub fn null_percentage(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        (self.total_count - self.non_null_count) as f64 / self.total_count as f64 * 100.0
    }

    /// Most frequent values of a text column, truncated to `n`.
    pub fn top_values(&self, n: usize) -> &[ValueCount] {
        match &self.stats {
            ColumnStats::Text { top_values } => &top_values[..top_values.len().min(n)],
            _ => &[],
        }
    }
}

/// Column profiles for one data source, in file column order
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceProfile {
    pub source_name: String,
    pub columns: Vec<ColumnProfile>,
}

impl SourceProfile {
    pub fn new(source_name: impl Into<String>, columns: Vec<ColumnProfile>) -> Self {
        Self {
            source_name: source_name.into(),
            columns,
        }
    }

    pub fn get(&self, column: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|c| c.name == column)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// One stored row: column name to scalar value, tagged with its source
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub source_name: String,
    pub timestamp: DateTime<Utc>,
    pub data: Map<String, Value>,
}

impl Record {
    pub fn new(source_name: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            source_name: source_name.into(),
            timestamp: Utc::now(),
            data,
        }
    }

    /// Value of `column`, with missing keys read as null.
    pub fn get(&self, column: &str) -> &Value {
        self.data.get(column).unwrap_or(&Value::Null)
    }
}

/// Distinct column names across `records`, in first-seen order.
pub fn column_names(records: &[Record]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for record in records {
        for key in record.data.keys() {
            if !names.iter().any(|n| n == key) {
                names.push(key.clone());
            }
        }
    }
    names
}

/// Human-readable text of a scalar, without JSON quoting.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profile_json_carries_data_type_tag() {
        let profile = ColumnProfile {
            name: "revenue".to_string(),
            total_count: 3,
            non_null_count: 2,
            unique_count: 2,
            stats: ColumnStats::Numeric { min: 1.0, max: 3.0, mean: 2.0 },
        };

        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["data_type"], "numeric");
        assert_eq!(value["min"], 1.0);

        let back: ColumnProfile = serde_json::from_value(value).unwrap();
        assert_eq!(back, profile);
        assert!((back.null_percentage() - 33.333).abs() < 0.01);
    }

    #[test]
    fn test_column_names_first_seen_order() {
        let a = Record::new("s", json!({"b": 1, "a": 2}).as_object().unwrap().clone());
        let b = Record::new("s", json!({"a": 3, "c": 4}).as_object().unwrap().clone());
        assert_eq!(column_names(&[a, b]), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!("North")), "North");
        assert_eq!(display_value(&json!(12)), "12");
        assert_eq!(display_value(&Value::Null), "");
    }
}
