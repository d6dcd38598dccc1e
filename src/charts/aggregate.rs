//! Bar and pie aggregation over record columns with polars lazy group-by.

use crate::charts::{BarChart, BarEntry, PieChart, PieSlice};
use crate::error::{DashboardError, Result};
use crate::inference::coerce_numeric;
use crate::model::{display_value, Record};
use polars::prelude::{col, len, DataFrame, DataType as PolarsType, IntoLazy, NamedFrom, Series};
use std::cmp::Ordering;

/// Groups kept in a bar chart.
pub const BAR_LIMIT: usize = 20;

/// Slices kept in a pie chart.
pub const PIE_LIMIT: usize = 10;

/// Sum `value_column` per category. Rows with a missing category or a value
/// that does not coerce to a number are dropped.
pub fn bar_chart(records: &[Record], category_column: &str, value_column: &str) -> Result<BarChart> {
    let (categories, values): (Vec<String>, Vec<f64>) = records
        .iter()
        .filter_map(|r| {
            let category = r.get(category_column);
            if category.is_null() {
                return None;
            }
            coerce_numeric(r.get(value_column)).map(|v| (display_value(category), v))
        })
        .unzip();

    let mut entries = Vec::new();
    if !categories.is_empty() {
        let df = DataFrame::new(vec![
            Series::new("category", &categories),
            Series::new("value", &values),
        ])?;

        let grouped = df
            .lazy()
            .group_by([col("category")])
            .agg([col("value").sum().alias("total")])
            .collect()
            .map_err(|e| DashboardError::Chart(format!("Bar aggregation failed: {}", e)))?;

        let names = grouped.column("category")?.str()?;
        let totals = grouped.column("total")?.f64()?;
        entries = names
            .into_iter()
            .zip(totals.into_iter())
            .filter_map(|(name, total)| {
                Some(BarEntry {
                    category: name?.to_string(),
                    value: total?,
                })
            })
            .collect();
    }

    entries.sort_by(|a, b| {
        b.value
            .partial_cmp(&a.value)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.category.cmp(&b.category))
    });
    entries.truncate(BAR_LIMIT);

    Ok(BarChart {
        category_column: category_column.to_string(),
        value_column: value_column.to_string(),
        entries,
    })
}

/// Frequency of the most common values of `column`, nulls excluded.
pub fn pie_chart(records: &[Record], column: &str) -> Result<PieChart> {
    let labels: Vec<String> = records
        .iter()
        .map(|r| r.get(column))
        .filter(|v| !v.is_null())
        .map(display_value)
        .collect();

    let mut slices = Vec::new();
    if !labels.is_empty() {
        let df = DataFrame::new(vec![Series::new("label", &labels)])?;

        let counted = df
            .lazy()
            .group_by([col("label")])
            .agg([len().cast(PolarsType::Int64).alias("count")])
            .collect()
            .map_err(|e| DashboardError::Chart(format!("Pie aggregation failed: {}", e)))?;

        let names = counted.column("label")?.str()?;
        let counts = counted.column("count")?.i64()?;
        slices = names
            .into_iter()
            .zip(counts.into_iter())
            .filter_map(|(name, count)| {
                Some(PieSlice {
                    label: name?.to_string(),
                    count: count? as usize,
                })
            })
            .collect();
    }

    slices.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    slices.truncate(PIE_LIMIT);

    Ok(PieChart {
        column: column.to_string(),
        slices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn records(rows: &[Value]) -> Vec<Record> {
        rows.iter()
            .map(|r| Record::new("s", r.as_object().unwrap().clone()))
            .collect()
    }

    #[test]
    fn test_bar_sums_per_category() {
        let recs = records(&[
            json!({"cat": "A", "v": 1}),
            json!({"cat": "A", "v": 2}),
            json!({"cat": "B", "v": 5}),
        ]);

        let bar = bar_chart(&recs, "cat", "v").unwrap();
        assert_eq!(
            bar.entries,
            vec![
                BarEntry { category: "B".to_string(), value: 5.0 },
                BarEntry { category: "A".to_string(), value: 3.0 },
            ]
        );
    }

    #[test]
    fn test_bar_drops_missing_and_unparseable() {
        let recs = records(&[
            json!({"cat": "A", "v": "x"}),
            json!({"cat": null, "v": 4}),
            json!({"v": 4}),
            json!({"cat": "B", "v": "2.5"}),
        ]);

        let bar = bar_chart(&recs, "cat", "v").unwrap();
        assert_eq!(bar.entries.len(), 1);
        assert_eq!(bar.entries[0].category, "B");
        assert_eq!(bar.entries[0].value, 2.5);
    }

    #[test]
    fn test_bar_keeps_top_groups() {
        let rows: Vec<Value> = (0..30).map(|i| json!({"cat": format!("c{:02}", i), "v": i})).collect();
        let bar = bar_chart(&records(&rows), "cat", "v").unwrap();

        assert_eq!(bar.entries.len(), BAR_LIMIT);
        assert_eq!(bar.entries[0].category, "c29");
    }

    #[test]
    fn test_bar_empty_input() {
        let bar = bar_chart(&[], "cat", "v").unwrap();
        assert!(bar.entries.is_empty());
    }

    #[test]
    fn test_pie_counts_with_ties() {
        let recs = records(&[
            json!({"r": "South"}),
            json!({"r": "North"}),
            json!({"r": "South"}),
            json!({"r": "East"}),
            json!({"r": null}),
        ]);

        let pie = pie_chart(&recs, "r").unwrap();
        let labels: Vec<&str> = pie.slices.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["South", "East", "North"]);
        assert_eq!(pie.slices[0].count, 2);
        assert_eq!(pie.total(), 4);
    }

    #[test]
    fn test_pie_keeps_top_ten() {
        let rows: Vec<Value> = (0..15).map(|i| json!({"r": format!("v{}", i)})).collect();
        let pie = pie_chart(&records(&rows), "r").unwrap();
        assert_eq!(pie.slices.len(), PIE_LIMIT);
    }
}
