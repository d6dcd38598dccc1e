use crate::charts::{TimePoint, TimeSeries};
use crate::inference::{coerce_datetime, coerce_numeric};
use crate::model::{Record, TIMESTAMP_COLUMN};

/// `value_column` over `time_column`, sorted by time. The `_timestamp` column
/// reads each record's ingestion time. Rows where either side fails to parse
/// are dropped.
pub fn time_series(records: &[Record], time_column: &str, value_column: &str) -> TimeSeries {
    let mut points: Vec<TimePoint> = records
        .iter()
        .filter_map(|r| {
            let at = if time_column == TIMESTAMP_COLUMN {
                Some(r.timestamp.naive_utc())
            } else {
                coerce_datetime(r.get(time_column))
            }?;
            let value = coerce_numeric(r.get(value_column))?;
            Some(TimePoint { at, value })
        })
        .collect();

    // stable: equal times keep record order
    points.sort_by_key(|p| p.at);

    TimeSeries {
        time_column: time_column.to_string(),
        value_column: value_column.to_string(),
        points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use serde_json::json;

    #[test]
    fn test_sorted_and_filtered() {
        let rows = [
            json!({"d": "2024-03-01", "v": 3}),
            json!({"d": "not a date", "v": 9}),
            json!({"d": "2024-01-01", "v": "1"}),
            json!({"d": "2024-02-01", "v": null}),
        ];
        let recs: Vec<Record> = rows
            .iter()
            .map(|r| Record::new("s", r.as_object().unwrap().clone()))
            .collect();

        let ts = time_series(&recs, "d", "v");
        assert_eq!(ts.points.len(), 2);
        assert_eq!(
            ts.points[0].at,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
        );
        assert_eq!(ts.points[1].value, 3.0);
    }

    #[test]
    fn test_ingestion_timestamp_axis() {
        let mut first = Record::new("s", json!({"v": 1}).as_object().unwrap().clone());
        let second = Record::new("s", json!({"v": 2}).as_object().unwrap().clone());
        first.timestamp = second.timestamp + Duration::seconds(5);

        let ts = time_series(&[first, second], TIMESTAMP_COLUMN, "v");
        let values: Vec<f64> = ts.points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![2.0, 1.0]);
    }
}
