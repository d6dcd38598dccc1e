//! Type Inference - classifies a column of raw values as numeric, datetime or
//! text and computes summary statistics.
//!
//! Classification is a single pass over the non-null values: a column is
//! numeric when the share of numeric-coercible values is strictly greater than
//! the threshold, otherwise datetime under the same rule, otherwise text.

pub mod coerce;

pub use coerce::{coerce_datetime, coerce_numeric, parse_datetime};

use crate::model::{display_value, ColumnProfile, ColumnStats, DataType, ValueCount};
use itertools::Itertools;
use serde_json::Value;

/// Threshold used when analyzing a file at import time.
pub const IMPORT_THRESHOLD: f64 = 0.8;

/// Threshold used when the dashboard re-infers a column with no stored profile.
pub const DISPLAY_THRESHOLD: f64 = 0.7;

/// Number of most frequent values kept for text columns.
pub const DEFAULT_TOP_K: usize = 5;

#[derive(Clone, Debug)]
pub struct TypeInferencer {
    threshold: f64,
    top_k: usize,
}

impl TypeInferencer {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn for_import() -> Self {
        Self::new(IMPORT_THRESHOLD)
    }

    pub fn for_display() -> Self {
        Self::new(DISPLAY_THRESHOLD)
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Profile one column.
    pub fn infer<'a, I>(&self, name: &str, values: I) -> ColumnProfile
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let values: Vec<&Value> = values.into_iter().collect();
        let total_count = values.len();
        let non_null: Vec<&Value> = values.into_iter().filter(|v| !v.is_null()).collect();
        let unique_count = non_null.iter().map(|v| v.to_string()).unique().count();

        ColumnProfile {
            name: name.to_string(),
            total_count,
            non_null_count: non_null.len(),
            unique_count,
            stats: self.column_stats(&non_null),
        }
    }

    /// Data type only, for callers that do not need statistics.
    pub fn classify<'a, I>(&self, values: I) -> DataType
    where
        I: IntoIterator<Item = &'a Value>,
    {
        self.infer("", values).data_type()
    }

    fn column_stats(&self, non_null: &[&Value]) -> ColumnStats {
        if non_null.is_empty() {
            return ColumnStats::Text { top_values: Vec::new() };
        }

        let numbers: Vec<f64> = non_null.iter().filter_map(|v| coerce_numeric(v)).collect();
        if self.passes(numbers.len(), non_null.len()) {
            let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
            let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            // running mean; finite inputs never overflow to infinity
            let mean = numbers.iter().enumerate().fold(0.0, |mean, (i, x)| {
                let n = (i + 1) as f64;
                mean + x / n - mean / n
            });
            return ColumnStats::Numeric { min, max, mean };
        }

        let dates = non_null.iter().filter(|v| coerce_datetime(v).is_some()).count();
        if self.passes(dates, non_null.len()) {
            return ColumnStats::Datetime;
        }

        ColumnStats::Text {
            top_values: self.top_values(non_null),
        }
    }

    /// Strictly-greater comparison: a share equal to the threshold fails.
    fn passes(&self, hits: usize, non_null: usize) -> bool {
        non_null > 0 && hits as f64 / non_null as f64 > self.threshold
    }

    fn top_values(&self, non_null: &[&Value]) -> Vec<ValueCount> {
        non_null
            .iter()
            .map(|v| display_value(v))
            .counts()
            .into_iter()
            .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)))
            .take(self.top_k)
            .map(|(value, count)| ValueCount { value, count })
            .collect()
    }
}

impl Default for TypeInferencer {
    fn default() -> Self {
        Self::for_import()
    }
}
