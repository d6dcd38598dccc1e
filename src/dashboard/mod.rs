//! Presentation - renders a source's dashboard as text or JSON, optionally on
//! a fixed refresh interval.

use crate::charts::{
    build_dashboard, BarChart, Chart, ChartChoices, ChartOutcome, ChartSelector, CorrelationMatrix,
    Dashboard, PieChart, TimeSeries,
};
use crate::error::Result;
use crate::model::{
    column_names, display_value, ColumnProfile, ColumnStats, Record, SourceProfile, TIMESTAMP_COLUMN,
};
use crate::storage::DashboardStore;
use itertools::Itertools;
use std::io::Write;
use std::time::Duration;
use tracing::{error, info, warn};

/// Rows shown in the raw-data preview.
pub const PREVIEW_ROWS: usize = 100;

const CELL_WIDTH: usize = 18;
const BAR_WIDTH: usize = 40;
const SERIES_POINTS: usize = 20;

#[derive(Clone, Debug)]
pub struct DashboardOptions {
    /// Source to show; the first source by name when unset.
    pub source: Option<String>,
    pub record_limit: usize,
    pub refresh_interval: Duration,
    /// Render once and return instead of refreshing.
    pub once: bool,
    pub json: bool,
    pub display_threshold: f64,
    pub choices: ChartChoices,
}

/// Data behind one rendering of the dashboard
pub struct DashboardView {
    pub records: Vec<Record>,
    pub profile: SourceProfile,
    pub dashboard: Dashboard,
}

/// Load records and profile for `source` and build its charts.
pub fn load_view(store: &dyn DashboardStore, source: &str, options: &DashboardOptions) -> Result<DashboardView> {
    let records = store.load_records(source, options.record_limit)?;

    let profile = match store.load_profile(source) {
        Ok(Some(profile)) => profile,
        Ok(None) => SourceProfile::new(source, Vec::new()),
        Err(e) => {
            warn!("Error loading metadata for {}: {}", source, e);
            SourceProfile::new(source, Vec::new())
        }
    };

    let selector = ChartSelector::new(options.display_threshold);
    let dashboard = build_dashboard(&selector, source, &records, &profile, &options.choices);

    Ok(DashboardView {
        records,
        profile,
        dashboard,
    })
}

/// Render the dashboard until interrupted, or once when `options.once` is set.
pub fn run_dashboard(store: &dyn DashboardStore, options: &DashboardOptions, out: &mut dyn Write) -> Result<()> {
    loop {
        match render_once(store, options, out) {
            Ok(()) => {}
            Err(e) if !options.once => error!("Dashboard refresh failed: {}", e),
            Err(e) => return Err(e),
        }

        if options.once {
            return Ok(());
        }
        out.flush()?;
        info!("Next refresh in {:?}", options.refresh_interval);
        std::thread::sleep(options.refresh_interval);
    }
}

fn render_once(store: &dyn DashboardStore, options: &DashboardOptions, out: &mut dyn Write) -> Result<()> {
    let sources = store.list_sources()?;

    let source = match &options.source {
        Some(source) => source.clone(),
        None => match sources.first() {
            Some(first) => first.clone(),
            None => {
                writeln!(out, "No data sources found.")?;
                writeln!(out, "Import your data using: tabledash import your_file.csv")?;
                return Ok(());
            }
        },
    };

    let view = load_view(store, &source, options)?;
    if options.json {
        render_json(&view.dashboard, out)
    } else {
        if view.records.is_empty() {
            writeln!(out, "No data found for source: {}", source)?;
            return Ok(());
        }
        if sources.len() > 1 {
            writeln!(out, "Sources: {}", sources.join(", "))?;
        }
        render_text(&view, out)
    }
}

pub fn render_json(dashboard: &Dashboard, out: &mut dyn Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, dashboard)?;
    writeln!(out)?;
    Ok(())
}

pub fn render_text(view: &DashboardView, out: &mut dyn Write) -> Result<()> {
    let dash = &view.dashboard;
    writeln!(out, "Loaded {} records from '{}'", dash.record_count, dash.source_name)?;
    writeln!(out)?;

    render_summary(view, out)?;
    render_preview(&view.records, out)?;

    writeln!(
        out,
        "Detected columns: Numeric: {}, Categorical: {}, DateTime: {}",
        dash.selection.numeric.len(),
        dash.selection.categorical.len(),
        dash.selection.datetime.len()
    )?;

    for outcome in &dash.charts {
        writeln!(out)?;
        match outcome {
            ChartOutcome::Rendered { chart } => render_chart(chart, out)?,
            ChartOutcome::Skipped { kind, reason } => writeln!(out, "[{} skipped] {}", kind, reason)?,
        }
    }

    Ok(())
}

fn render_summary(view: &DashboardView, out: &mut dyn Write) -> Result<()> {
    let columns = data_columns(&view.records);

    writeln!(out, "== Data Summary ==")?;
    for name in &columns {
        let stored = view.profile.get(name);
        let data_type = stored
            .map(|p| p.data_type().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let unique = view
            .records
            .iter()
            .map(|r| r.get(name))
            .filter(|v| !v.is_null())
            .map(|v| v.to_string())
            .unique()
            .count();
        match stored {
            Some(profile) => writeln!(
                out,
                "  {} ({}) - {} unique values, {}",
                name,
                data_type,
                unique,
                range_or_sample(profile)
            )?,
            None => writeln!(out, "  {} ({}) - {} unique values", name, data_type, unique)?,
        }
    }

    writeln!(out, "  Total rows: {}", view.records.len())?;
    writeln!(out, "  Total columns: {}", columns.len())?;
    if let Some((min, max)) = view.records.iter().map(|r| r.timestamp).minmax().into_option() {
        writeln!(out, "  Date range: {} to {}", min, max)?;
    }
    writeln!(out)?;
    Ok(())
}

fn render_preview(records: &[Record], out: &mut dyn Write) -> Result<()> {
    let columns = data_columns(records);
    let shown = records.len().min(PREVIEW_ROWS);

    writeln!(out, "== Raw Data (first {} of {}) ==", shown, records.len())?;
    let header = columns.iter().map(|c| cell(c)).join(" | ");
    writeln!(out, "{}", header)?;
    writeln!(out, "{}", "-".repeat(header.chars().count()))?;

    for record in records.iter().take(PREVIEW_ROWS) {
        let line = columns.iter().map(|c| cell(&display_value(record.get(c)))).join(" | ");
        writeln!(out, "{}", line)?;
    }
    writeln!(out)?;
    Ok(())
}

fn render_chart(chart: &Chart, out: &mut dyn Write) -> Result<()> {
    match chart {
        Chart::Bar(bar) => render_bar(bar, out),
        Chart::Pie(pie) => render_pie(pie, out),
        Chart::TimeSeries(series) => render_series(series, out),
        Chart::Correlation(matrix) => render_correlation(matrix, out),
    }
}

fn render_bar(bar: &BarChart, out: &mut dyn Write) -> Result<()> {
    writeln!(out, "== {} by {} ==", bar.value_column, bar.category_column)?;

    let max = bar.entries.iter().map(|e| e.value.abs()).fold(0.0, f64::max);
    for entry in &bar.entries {
        let len = if max > 0.0 {
            (entry.value.abs() / max * BAR_WIDTH as f64).round() as usize
        } else {
            0
        };
        writeln!(out, "{} {} {}", cell(&entry.category), "#".repeat(len), format_number(entry.value))?;
    }
    Ok(())
}

fn render_pie(pie: &PieChart, out: &mut dyn Write) -> Result<()> {
    writeln!(out, "== Distribution of {} ==", pie.column)?;

    let total = pie.total().max(1) as f64;
    for slice in &pie.slices {
        writeln!(
            out,
            "{} {:>6} {:>6.1}%",
            cell(&slice.label),
            slice.count,
            slice.count as f64 / total * 100.0
        )?;
    }
    Ok(())
}

fn render_series(series: &TimeSeries, out: &mut dyn Write) -> Result<()> {
    writeln!(out, "== {} over time ({}) ==", series.value_column, series.time_column)?;

    let skip = series.points.len().saturating_sub(SERIES_POINTS);
    if skip > 0 {
        writeln!(out, "  ({} earlier points not shown)", skip)?;
    }
    for point in series.points.iter().skip(skip) {
        writeln!(out, "  {}  {}", point.at, format_number(point.value))?;
    }
    Ok(())
}

fn render_correlation(matrix: &CorrelationMatrix, out: &mut dyn Write) -> Result<()> {
    writeln!(out, "== Correlation Matrix ==")?;

    let header = matrix.columns.iter().map(|c| format!("{:>8}", truncate(c, 8))).join(" ");
    writeln!(out, "{} {}", cell(""), header)?;
    for (name, row) in matrix.columns.iter().zip(&matrix.values) {
        let line = row
            .iter()
            .map(|v| match v {
                Some(r) => format!("{:>8.3}", r),
                None => format!("{:>8}", "-"),
            })
            .join(" ");
        writeln!(out, "{} {}", cell(name), line)?;
    }
    Ok(())
}

/// Value range of a numeric column or the two most frequent text values.
fn range_or_sample(profile: &ColumnProfile) -> String {
    match &profile.stats {
        ColumnStats::Numeric { min, max, .. } => format!("{:.2} to {:.2}", min, max),
        ColumnStats::Text { .. } => {
            format!("Top: {}", profile.top_values(2).iter().map(|v| &v.value).join(", "))
        }
        ColumnStats::Datetime => "Various".to_string(),
    }
}

/// Record columns without the ingestion timestamp.
fn data_columns(records: &[Record]) -> Vec<String> {
    column_names(records)
        .into_iter()
        .filter(|c| c != TIMESTAMP_COLUMN)
        .collect()
}

fn cell(text: &str) -> String {
    format!("{:<width$}", truncate(text, CELL_WIDTH), width = CELL_WIDTH)
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
        cut.push('~');
        cut
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;
    use serde_json::json;

    fn options() -> DashboardOptions {
        DashboardOptions {
            source: None,
            record_limit: 1000,
            refresh_interval: Duration::from_secs(30),
            once: true,
            json: false,
            display_threshold: crate::inference::DISPLAY_THRESHOLD,
            choices: ChartChoices::default(),
        }
    }

    fn seeded_store() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        store.ensure_schema().unwrap();
        for (region, revenue) in [("North", 100), ("South", 250), ("North", 50)] {
            let data = json!({"Region": region, "Revenue": revenue});
            store
                .insert_record(&Record::new("sales", data.as_object().unwrap().clone()))
                .unwrap();
        }
        store
    }

    fn render(store: &SqliteStore, options: &DashboardOptions) -> String {
        let mut out = Vec::new();
        run_dashboard(store, options, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_text_dashboard() {
        let text = render(&seeded_store(), &options());

        assert!(text.contains("Loaded 3 records from 'sales'"));
        assert!(text.contains("Region (unknown) - 2 unique values"));
        assert!(text.contains("== Revenue by Region =="));
        assert!(text.contains("== Distribution of Region =="));
        assert!(text.contains("[correlation matrix skipped]"));
    }

    #[test]
    fn test_json_dashboard() {
        let opts = DashboardOptions { json: true, ..options() };
        let text = render(&seeded_store(), &opts);

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["source_name"], "sales");
        assert_eq!(value["charts"][0]["status"], "rendered");
        assert_eq!(value["charts"][0]["chart"]["kind"], "bar");
        assert_eq!(value["charts"][0]["chart"]["entries"][0]["category"], "South");
    }

    #[test]
    fn test_summary_shows_stored_profile_samples() {
        let store = seeded_store();
        let records = store.load_records("sales", 10).unwrap();
        let columns = ["Region", "Revenue"]
            .iter()
            .map(|c| {
                crate::inference::TypeInferencer::for_import().infer(c, records.iter().map(|r| r.get(c)))
            })
            .collect();
        store.upsert_profile(&SourceProfile::new("sales", columns)).unwrap();

        let text = render(&store, &options());
        assert!(text.contains("Region (text) - 2 unique values, Top: North, South"));
        assert!(text.contains("Revenue (numeric) - 3 unique values, 50.00 to 250.00"));
    }

    #[test]
    fn test_no_sources() {
        let store = SqliteStore::in_memory().unwrap();
        store.ensure_schema().unwrap();
        assert!(render(&store, &options()).contains("No data sources found."));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcdef", 4), "abc~");
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(2.5), "2.50");
    }
}
