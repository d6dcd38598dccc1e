//! Charts - picks columns for each chart kind and builds the chart data.
//!
//! Four kinds are supported, each with its own precondition:
//! - bar: sum of a numeric column per category (needs categorical + numeric)
//! - pie: value counts of a categorical column
//! - time series: numeric column over a datetime column or the ingestion time
//! - correlation: Pearson matrix over the numeric columns (needs two or more)
//!
//! A chart whose precondition fails, or whose construction errors, is
//! reported as skipped and never aborts the rest of the dashboard.

pub mod aggregate;
pub mod correlation;
pub mod selector;
pub mod time_series;

pub use aggregate::{bar_chart, pie_chart, BAR_LIMIT, PIE_LIMIT};
pub use correlation::correlation_matrix;
pub use selector::{ChartSelector, ColumnSelection};
pub use time_series::time_series;

use crate::error::Result;
use crate::model::{Record, SourceProfile, TIMESTAMP_COLUMN};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    Pie,
    TimeSeries,
    Correlation,
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChartKind::Bar => "bar chart",
            ChartKind::Pie => "pie chart",
            ChartKind::TimeSeries => "time series",
            ChartKind::Correlation => "correlation matrix",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BarEntry {
    pub category: String,
    pub value: f64,
}

/// Sum of `value_column` per distinct `category_column`, largest first
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BarChart {
    pub category_column: String,
    pub value_column: String,
    pub entries: Vec<BarEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PieSlice {
    pub label: String,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PieChart {
    pub column: String,
    pub slices: Vec<PieSlice>,
}

impl PieChart {
    pub fn total(&self) -> usize {
        self.slices.iter().map(|s| s.count).sum()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimePoint {
    pub at: NaiveDateTime,
    pub value: f64,
}

/// Points sorted by time, ascending
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub time_column: String,
    pub value_column: String,
    pub points: Vec<TimePoint>,
}

/// Square matrix; `values[i][j]` is `None` when the coefficient is undefined.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.values[i][j]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Chart {
    Bar(BarChart),
    Pie(PieChart),
    TimeSeries(TimeSeries),
    Correlation(CorrelationMatrix),
}

impl Chart {
    pub fn kind(&self) -> ChartKind {
        match self {
            Chart::Bar(_) => ChartKind::Bar,
            Chart::Pie(_) => ChartKind::Pie,
            Chart::TimeSeries(_) => ChartKind::TimeSeries,
            Chart::Correlation(_) => ChartKind::Correlation,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChartOutcome {
    Rendered { chart: Chart },
    Skipped { kind: ChartKind, reason: String },
}

impl ChartOutcome {
    pub fn kind(&self) -> ChartKind {
        match self {
            ChartOutcome::Rendered { chart } => chart.kind(),
            ChartOutcome::Skipped { kind, .. } => *kind,
        }
    }

    pub fn chart(&self) -> Option<&Chart> {
        match self {
            ChartOutcome::Rendered { chart } => Some(chart),
            ChartOutcome::Skipped { .. } => None,
        }
    }

    fn skipped(kind: ChartKind, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        info!("Skipping {}: {}", kind, reason);
        ChartOutcome::Skipped { kind, reason }
    }
}

/// Columns picked by the user for each chart. `None` means the first column of
/// the matching group (for time series: the first datetime column, else the
/// ingestion timestamp).
#[derive(Clone, Debug, Default)]
pub struct ChartChoices {
    pub bar_category: Option<String>,
    pub bar_value: Option<String>,
    pub pie_column: Option<String>,
    pub time_column: Option<String>,
    pub time_value: Option<String>,
}

/// Everything the presentation layer needs for one source
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub source_name: String,
    pub record_count: usize,
    pub selection: ColumnSelection,
    pub charts: Vec<ChartOutcome>,
}

impl Dashboard {
    pub fn outcome(&self, kind: ChartKind) -> Option<&ChartOutcome> {
        self.charts.iter().find(|c| c.kind() == kind)
    }
}

/// Select chart columns and build all four charts.
pub fn build_dashboard(
    selector: &ChartSelector,
    source_name: &str,
    records: &[Record],
    profile: &SourceProfile,
    choices: &ChartChoices,
) -> Dashboard {
    let selection = selector.select(records, profile);
    info!(
        "Detected columns for {}: numeric {}, categorical {}, datetime {}",
        source_name,
        selection.numeric.len(),
        selection.categorical.len(),
        selection.datetime.len()
    );

    let charts = vec![
        build_bar(records, &selection, choices),
        build_pie(records, &selection, choices),
        build_time_series(records, &selection, choices),
        build_correlation(records, &selection),
    ];

    Dashboard {
        source_name: source_name.to_string(),
        record_count: records.len(),
        selection,
        charts,
    }
}

/// The chosen column if it belongs to `group`, else the group's first column.
fn pick<'a>(choice: &Option<String>, group: &'a [String]) -> std::result::Result<&'a str, String> {
    match choice {
        Some(wanted) => group
            .iter()
            .find(|c| *c == wanted)
            .map(|c| c.as_str())
            .ok_or_else(|| format!("column '{}' is not available for this chart", wanted)),
        None => group
            .first()
            .map(|c| c.as_str())
            .ok_or_else(|| "no eligible column".to_string()),
    }
}

fn finish(kind: ChartKind, built: Result<Option<Chart>>, empty_reason: String) -> ChartOutcome {
    match built {
        Ok(Some(chart)) => ChartOutcome::Rendered { chart },
        Ok(None) => ChartOutcome::skipped(kind, empty_reason),
        Err(e) => {
            warn!("Could not create {}: {}", kind, e);
            ChartOutcome::skipped(kind, format!("Could not create {}: {}", kind, e))
        }
    }
}

fn build_bar(records: &[Record], selection: &ColumnSelection, choices: &ChartChoices) -> ChartOutcome {
    let kind = ChartKind::Bar;
    if selection.categorical.is_empty() || selection.numeric.is_empty() {
        return ChartOutcome::skipped(kind, "Need both categorical and numeric columns for a bar chart");
    }

    let (category, value) = match (
        pick(&choices.bar_category, &selection.categorical),
        pick(&choices.bar_value, &selection.numeric),
    ) {
        (Ok(c), Ok(v)) => (c, v),
        (Err(e), _) | (_, Err(e)) => return ChartOutcome::skipped(kind, e),
    };

    let built = bar_chart(records, category, value).map(|bar| {
        if bar.entries.is_empty() {
            None
        } else {
            Some(Chart::Bar(bar))
        }
    });
    finish(kind, built, format!("No valid numeric data found in column '{}'", value))
}

fn build_pie(records: &[Record], selection: &ColumnSelection, choices: &ChartChoices) -> ChartOutcome {
    let kind = ChartKind::Pie;
    if selection.categorical.is_empty() {
        return ChartOutcome::skipped(kind, "Need a categorical column for a pie chart");
    }

    let column = match pick(&choices.pie_column, &selection.categorical) {
        Ok(c) => c,
        Err(e) => return ChartOutcome::skipped(kind, e),
    };

    let built = pie_chart(records, column).map(|pie| {
        if pie.slices.is_empty() {
            None
        } else {
            Some(Chart::Pie(pie))
        }
    });
    finish(kind, built, format!("Column '{}' has no values", column))
}

fn build_time_series(records: &[Record], selection: &ColumnSelection, choices: &ChartChoices) -> ChartOutcome {
    let kind = ChartKind::TimeSeries;
    if selection.numeric.is_empty() || records.is_empty() {
        return ChartOutcome::skipped(kind, "Need datetime and numeric columns for a time series");
    }

    // the ingestion timestamp is always a valid time axis
    let mut time_columns = selection.datetime.clone();
    time_columns.push(TIMESTAMP_COLUMN.to_string());

    let (time_column, value) = match (
        pick(&choices.time_column, &time_columns),
        pick(&choices.time_value, &selection.numeric),
    ) {
        (Ok(t), Ok(v)) => (t, v),
        (Err(e), _) | (_, Err(e)) => return ChartOutcome::skipped(kind, e),
    };

    let series = time_series(records, time_column, value);
    let built = Ok(if series.points.is_empty() {
        None
    } else {
        Some(Chart::TimeSeries(series))
    });
    finish(kind, built, "No valid data for time series".to_string())
}

fn build_correlation(records: &[Record], selection: &ColumnSelection) -> ChartOutcome {
    let kind = ChartKind::Correlation;
    if selection.numeric.len() < 2 {
        return ChartOutcome::skipped(kind, "Need at least 2 numeric columns for a correlation matrix");
    }

    let built = Ok(correlation_matrix(records, &selection.numeric).map(Chart::Correlation));
    finish(kind, built, "Not enough numeric data for correlation analysis".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Record;
    use serde_json::{json, Value};

    fn records(rows: &[Value]) -> Vec<Record> {
        rows.iter()
            .map(|r| Record::new("sales", r.as_object().unwrap().clone()))
            .collect()
    }

    fn dashboard(rows: &[Value], choices: &ChartChoices) -> Dashboard {
        build_dashboard(
            &ChartSelector::default(),
            "sales",
            &records(rows),
            &SourceProfile::default(),
            choices,
        )
    }

    #[test]
    fn test_all_charts_rendered() {
        let rows = vec![
            json!({"Region": "North", "Revenue": 100, "Units": 10, "Date": "2024-01-02"}),
            json!({"Region": "South", "Revenue": 250, "Units": 20, "Date": "2024-01-01"}),
            json!({"Region": "North", "Revenue": 50, "Units": 6, "Date": "2024-01-03"}),
        ];
        let dash = dashboard(&rows, &ChartChoices::default());

        assert_eq!(dash.record_count, 3);
        assert_eq!(dash.charts.len(), 4);
        assert!(dash.charts.iter().all(|c| c.chart().is_some()));

        match dash.outcome(ChartKind::TimeSeries).and_then(|o| o.chart()) {
            Some(Chart::TimeSeries(ts)) => {
                assert_eq!(ts.time_column, "Date");
                let values: Vec<f64> = ts.points.iter().map(|p| p.value).collect();
                assert_eq!(values, vec![250.0, 100.0, 50.0]);
            }
            other => panic!("expected time series, got {:?}", other),
        }
    }

    #[test]
    fn test_text_only_skips_numeric_charts() {
        let rows = vec![json!({"Region": "North"}), json!({"Region": "South"})];
        let dash = dashboard(&rows, &ChartChoices::default());

        assert!(matches!(dash.outcome(ChartKind::Bar), Some(ChartOutcome::Skipped { .. })));
        assert!(dash.outcome(ChartKind::Pie).unwrap().chart().is_some());
        assert!(matches!(dash.outcome(ChartKind::TimeSeries), Some(ChartOutcome::Skipped { .. })));
        assert!(matches!(dash.outcome(ChartKind::Correlation), Some(ChartOutcome::Skipped { .. })));
    }

    #[test]
    fn test_time_series_falls_back_to_ingestion_time() {
        let rows = vec![json!({"Revenue": 1}), json!({"Revenue": 2})];
        let dash = dashboard(&rows, &ChartChoices::default());

        match dash.outcome(ChartKind::TimeSeries).and_then(|o| o.chart()) {
            Some(Chart::TimeSeries(ts)) => {
                assert_eq!(ts.time_column, TIMESTAMP_COLUMN);
                assert_eq!(ts.points.len(), 2);
            }
            other => panic!("expected time series, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_choice_is_skipped() {
        let rows = vec![json!({"Region": "North", "Revenue": 1})];
        let choices = ChartChoices {
            bar_category: Some("Revenue".to_string()),
            ..ChartChoices::default()
        };
        let dash = dashboard(&rows, &choices);

        match dash.outcome(ChartKind::Bar) {
            Some(ChartOutcome::Skipped { reason, .. }) => assert!(reason.contains("Revenue")),
            other => panic!("expected skipped bar chart, got {:?}", other),
        }
    }

    #[test]
    fn test_outcome_json_shape() {
        let outcome = ChartOutcome::Skipped {
            kind: ChartKind::TimeSeries,
            reason: "none".to_string(),
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "skipped");
        assert_eq!(value["kind"], "time_series");
    }
}
