//! Storage for records and column profiles.
//!
//! Two tables back every store:
//! - `dashboard_data`: append-only records (timestamp, source name, JSON payload)
//! - `data_source_metadata`: one column-profile document per source name

pub mod postgres;
pub mod sqlite;

pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::model::{Record, SourceProfile};
use serde::{Deserialize, Serialize};

/// Whether `upsert_profile` created or replaced the stored profile
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfileWrite {
    Inserted,
    Updated,
}

/// Relational storage used by the importer and the dashboard.
///
/// Implementations:
/// - SqliteStore: local file or in-memory database
/// - PostgresStore: PostgreSQL with JSONB payloads
pub trait DashboardStore {
    /// Short backend name for log lines.
    fn backend_name(&self) -> &'static str;

    /// Create tables and indexes when missing. Safe to call repeatedly.
    fn ensure_schema(&self) -> Result<()>;

    /// Store the profile for a source, overwriting any earlier one.
    fn upsert_profile(&self, profile: &SourceProfile) -> Result<ProfileWrite>;

    fn load_profile(&self, source_name: &str) -> Result<Option<SourceProfile>>;

    /// Append one record; returns its row id.
    fn insert_record(&self, record: &Record) -> Result<i64>;

    /// Distinct source names that have records, sorted.
    fn list_sources(&self) -> Result<Vec<String>>;

    /// Most recent records of a source, newest first.
    fn load_records(&self, source_name: &str, limit: usize) -> Result<Vec<Record>>;
}

/// Open the store named by a database URL.
///
/// `postgres://` and `postgresql://` URLs select PostgreSQL. `sqlite://<path>`,
/// `:memory:` or a bare file path select SQLite.
pub fn open_store(database_url: &str) -> Result<Box<dyn DashboardStore>> {
    if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        return Ok(Box::new(PostgresStore::connect(database_url)?));
    }

    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);

    if path == ":memory:" {
        Ok(Box::new(SqliteStore::in_memory()?))
    } else {
        Ok(Box::new(SqliteStore::open(path)?))
    }
}

/// Database URL with any password masked, for log output.
pub fn redact_url(database_url: &str) -> String {
    match database_url.split_once('@') {
        Some((credentials, host)) => match credentials.rsplit_once(':') {
            Some((user, _password)) if user.contains("://") => format!("{}:***@{}", user, host),
            _ => format!("{}@{}", credentials, host),
        },
        None => database_url.to_string(),
    }
}
