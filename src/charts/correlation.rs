//! Pearson correlation over pairwise-complete observations.

use crate::charts::CorrelationMatrix;
use crate::inference::coerce_numeric;
use crate::model::Record;
use tracing::debug;

/// Correlation matrix of `columns`, or `None` when fewer than two columns have
/// any numeric value or fewer than two rows carry a numeric value.
pub fn correlation_matrix(records: &[Record], columns: &[String]) -> Option<CorrelationMatrix> {
    let mut kept: Vec<String> = Vec::new();
    let mut series: Vec<Vec<Option<f64>>> = Vec::new();

    for name in columns {
        let values: Vec<Option<f64>> = records.iter().map(|r| coerce_numeric(r.get(name))).collect();
        if values.iter().all(Option::is_none) {
            debug!("Dropping all-null column {} from correlation", name);
            continue;
        }
        kept.push(name.clone());
        series.push(values);
    }

    let valid_rows = (0..records.len())
        .filter(|&row| series.iter().any(|s| s[row].is_some()))
        .count();
    if kept.len() < 2 || valid_rows < 2 {
        return None;
    }

    let values = series
        .iter()
        .map(|a| series.iter().map(|b| pearson(a, b)).collect())
        .collect();

    Some(CorrelationMatrix { columns: kept, values })
}

/// Undefined (`None`) with fewer than two complete pairs or zero variance.
fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}
