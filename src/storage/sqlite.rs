//! SQLite-backed dashboard store (rusqlite).

use crate::error::{DashboardError, Result};
use crate::model::{ColumnProfile, Record, SourceProfile};
use crate::storage::{DashboardStore, ProfileWrite};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

pub struct SqliteStore {
    db: Connection,
}

impl SqliteStore {
    /// Open or create a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Connection::open(path)
            .map_err(|e| DashboardError::Database(format!("Failed to open database: {}", e)))?;
        Ok(Self { db })
    }

    pub fn in_memory() -> Result<Self> {
        let db = Connection::open_in_memory()
            .map_err(|e| DashboardError::Database(format!("Failed to open database: {}", e)))?;
        Ok(Self { db })
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    // fixed precision keeps lexical order equal to time order
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl DashboardStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn ensure_schema(&self) -> Result<()> {
        self.db
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS dashboard_data (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    record_timestamp TEXT NOT NULL,
                    data_source TEXT NOT NULL,
                    record_data TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS data_source_metadata (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    source_name TEXT UNIQUE NOT NULL,
                    column_info TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_dashboard_data_timestamp
                    ON dashboard_data(record_timestamp);

                CREATE INDEX IF NOT EXISTS idx_dashboard_data_source
                    ON dashboard_data(data_source);
                "#,
            )
            .map_err(|e| DashboardError::Database(format!("Database setup error: {}", e)))?;

        Ok(())
    }

    fn upsert_profile(&self, profile: &SourceProfile) -> Result<ProfileWrite> {
        let column_info = serde_json::to_string(&profile.columns)?;
        let now = format_timestamp(&Utc::now());

        let existing: Option<i64> = self
            .db
            .query_row(
                "SELECT id FROM data_source_metadata WHERE source_name = ?1",
                params![profile.source_name],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| DashboardError::Database(format!("Failed to look up metadata: {}", e)))?;

        if existing.is_some() {
            self.db
                .execute(
                    r#"
                    UPDATE data_source_metadata
                    SET column_info = ?2, updated_at = ?3
                    WHERE source_name = ?1
                    "#,
                    params![profile.source_name, column_info, now],
                )
                .map_err(|e| DashboardError::Database(format!("Failed to update metadata: {}", e)))?;

            info!("Updated metadata for source: {}", profile.source_name);
            Ok(ProfileWrite::Updated)
        } else {
            self.db
                .execute(
                    r#"
                    INSERT INTO data_source_metadata (source_name, column_info, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?3)
                    "#,
                    params![profile.source_name, column_info, now],
                )
                .map_err(|e| DashboardError::Database(format!("Failed to insert metadata: {}", e)))?;

            info!("Stored metadata for new source: {}", profile.source_name);
            Ok(ProfileWrite::Inserted)
        }
    }

    fn load_profile(&self, source_name: &str) -> Result<Option<SourceProfile>> {
        let column_info: Option<String> = self
            .db
            .query_row(
                "SELECT column_info FROM data_source_metadata WHERE source_name = ?1",
                params![source_name],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| DashboardError::Database(format!("Error loading metadata: {}", e)))?;

        match column_info {
            Some(raw) => {
                let columns: Vec<ColumnProfile> = serde_json::from_str(&raw)?;
                Ok(Some(SourceProfile::new(source_name, columns)))
            }
            None => Ok(None),
        }
    }

    fn insert_record(&self, record: &Record) -> Result<i64> {
        let payload = serde_json::to_string(&record.data)?;

        self.db
            .execute(
                r#"
                INSERT INTO dashboard_data (record_timestamp, data_source, record_data)
                VALUES (?1, ?2, ?3)
                "#,
                params![format_timestamp(&record.timestamp), record.source_name, payload],
            )
            .map_err(|e| DashboardError::Database(format!("Failed to insert record: {}", e)))?;

        Ok(self.db.last_insert_rowid())
    }

    fn list_sources(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .db
            .prepare("SELECT DISTINCT data_source FROM dashboard_data ORDER BY data_source")
            .map_err(|e| DashboardError::Database(format!("Failed to list sources: {}", e)))?;

        let sources = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .and_then(|rows| rows.collect::<std::result::Result<Vec<_>, _>>())
            .map_err(|e| DashboardError::Database(format!("Failed to list sources: {}", e)))?;

        Ok(sources)
    }

    fn load_records(&self, source_name: &str, limit: usize) -> Result<Vec<Record>> {
        let mut stmt = self
            .db
            .prepare(
                r#"
                SELECT record_timestamp, record_data
                FROM dashboard_data
                WHERE data_source = ?1
                ORDER BY record_timestamp DESC, id DESC
                LIMIT ?2
                "#,
            )
            .map_err(|e| DashboardError::Database(format!("Error loading data: {}", e)))?;

        let rows = stmt
            .query_map(params![source_name, limit as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .and_then(|rows| rows.collect::<std::result::Result<Vec<_>, _>>())
            .map_err(|e| DashboardError::Database(format!("Error loading data: {}", e)))?;

        let mut records = Vec::with_capacity(rows.len());
        for (raw_ts, raw_data) in rows {
            let timestamp = match parse_timestamp(&raw_ts) {
                Some(ts) => ts,
                None => {
                    warn!("Skipping record with unreadable timestamp {:?}", raw_ts);
                    continue;
                }
            };
            match serde_json::from_str::<Value>(&raw_data) {
                Ok(Value::Object(data)) => records.push(Record {
                    source_name: source_name.to_string(),
                    timestamp,
                    data,
                }),
                Ok(_) | Err(_) => warn!("Skipping record with invalid payload in {}", source_name),
            }
        }

        Ok(records)
    }
}
