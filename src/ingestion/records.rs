//! Record preparation - turns table rows into JSON records for storage.

use crate::ingestion::table::Table;
use crate::model::Record;
use serde_json::{Map, Value};

/// One record per table row, keyed by column name.
pub fn prepare_records(table: &Table, source_name: &str) -> Vec<Record> {
    table
        .rows
        .iter()
        .map(|row| {
            let data: Map<String, Value> = table
                .columns
                .iter()
                .cloned()
                .zip(row.iter().cloned().chain(std::iter::repeat(Value::Null)))
                .collect();
            Record::new(source_name, data)
        })
        .collect()
}
