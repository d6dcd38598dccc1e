//! Runtime configuration loaded from the environment (and `.env`).

use crate::error::{DashboardError, Result};
use crate::inference::{DISPLAY_THRESHOLD, IMPORT_THRESHOLD};
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://dashboard.db";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    /// Pause between successive record inserts.
    pub insert_delay: Duration,
    /// Dashboard refresh interval.
    pub refresh_interval: Duration,
    /// Maximum records loaded per source for display.
    pub record_limit: usize,
    pub import_threshold: f64,
    pub display_threshold: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            insert_delay: Duration::from_secs(1),
            refresh_interval: Duration::from_secs(30),
            record_limit: 1000,
            import_threshold: IMPORT_THRESHOLD,
            display_threshold: DISPLAY_THRESHOLD,
        }
    }
}

impl AppConfig {
    /// Load `.env` (if any) and read overrides from the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            insert_delay: parse_var::<f64>("TABLEDASH_INSERT_DELAY_SECS")?
                .map(secs_to_duration)
                .transpose()?
                .unwrap_or(defaults.insert_delay),
            refresh_interval: parse_var::<f64>("TABLEDASH_REFRESH_SECS")?
                .map(secs_to_duration)
                .transpose()?
                .unwrap_or(defaults.refresh_interval),
            record_limit: parse_var("TABLEDASH_RECORD_LIMIT")?.unwrap_or(defaults.record_limit),
            import_threshold: parse_var("TABLEDASH_IMPORT_THRESHOLD")?
                .map(check_threshold)
                .transpose()?
                .unwrap_or(defaults.import_threshold),
            display_threshold: parse_var("TABLEDASH_DISPLAY_THRESHOLD")?
                .map(check_threshold)
                .transpose()?
                .unwrap_or(defaults.display_threshold),
        };

        Ok(config)
    }
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| DashboardError::Config(format!("{} has an invalid value: {:?}", name, raw))),
        Err(_) => Ok(None),
    }
}

/// Converts a user-supplied number of seconds into a `Duration`.
pub fn secs_to_duration(secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(DashboardError::Config(format!(
            "delay must be a non-negative number of seconds, got {}",
            secs
        )));
    }
    Ok(Duration::from_secs_f64(secs))
}

fn check_threshold(value: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(DashboardError::Config(format!(
            "threshold must be between 0 and 1, got {}",
            value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_keep_both_thresholds() {
        let config = AppConfig::default();
        assert_eq!(config.import_threshold, 0.8);
        assert_eq!(config.display_threshold, 0.7);
        assert_eq!(config.record_limit, 1000);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
    }

    #[test]
    fn test_secs_to_duration() {
        assert_eq!(secs_to_duration(1.5).unwrap(), Duration::from_millis(1500));
        assert_eq!(secs_to_duration(0.0).unwrap(), Duration::ZERO);
        assert!(secs_to_duration(-1.0).is_err());
        assert!(secs_to_duration(f64::NAN).is_err());
    }

    #[test]
    fn test_threshold_range() {
        assert!(check_threshold(0.5).is_ok());
        assert!(check_threshold(1.2).is_err());
    }
}
