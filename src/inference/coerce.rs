//! Best-effort coercion of raw scalars. Failures yield `None` and never
//! propagate: a value that does not coerce is treated as missing.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%B %d %Y",
];

/// Numeric reading of a scalar: numbers, booleans as 1/0, and strings that
/// parse as a finite float.
pub fn coerce_numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Datetime reading of a scalar. Only strings can be datetimes.
pub fn coerce_datetime(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(s) => parse_datetime(s),
        _ => None,
    }
}

pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_numeric() {
        assert_eq!(coerce_numeric(&json!(3)), Some(3.0));
        assert_eq!(coerce_numeric(&json!(2.5)), Some(2.5));
        assert_eq!(coerce_numeric(&json!(" 42 ")), Some(42.0));
        assert_eq!(coerce_numeric(&json!("1e3")), Some(1000.0));
        assert_eq!(coerce_numeric(&json!(true)), Some(1.0));
        assert_eq!(coerce_numeric(&json!("x")), None);
        assert_eq!(coerce_numeric(&json!("")), None);
        assert_eq!(coerce_numeric(&json!("nan")), None);
        assert_eq!(coerce_numeric(&json!("1,000")), None);
        assert_eq!(coerce_numeric(&Value::Null), None);
    }

    #[test]
    fn test_parse_datetime_layouts() {
        let jan1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(parse_datetime("2024-01-01"), Some(jan1));
        assert_eq!(parse_datetime("2024/01/01"), Some(jan1));
        assert_eq!(parse_datetime("01/01/2024"), Some(jan1));
        assert_eq!(parse_datetime("Jan 1, 2024"), Some(jan1));
        assert_eq!(parse_datetime("1 January 2024"), Some(jan1));
        assert!(parse_datetime("2024-01-15 13:45:00").is_some());
        assert!(parse_datetime("2024-01-15T13:45:00Z").is_some());
        assert!(parse_datetime("2024-01-15T13:45:00.250").is_some());
    }

    #[test]
    fn test_parse_datetime_rejects_text() {
        assert_eq!(parse_datetime("n/a"), None);
        assert_eq!(parse_datetime("North"), None);
        assert_eq!(parse_datetime("2024-13-01"), None);
        assert_eq!(coerce_datetime(&json!(20240101)), None);
    }
}
