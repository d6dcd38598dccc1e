//! PostgreSQL-backed dashboard store (sqlx).
//!
//! sqlx is async; the store owns a current-thread tokio runtime and blocks on
//! each call so callers stay synchronous.

use crate::error::{DashboardError, Result};
use crate::model::{ColumnProfile, Record, SourceProfile};
use crate::storage::{DashboardStore, ProfileWrite};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{info, warn};

const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS dashboard_data (
        id BIGSERIAL PRIMARY KEY,
        record_timestamp TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
        data_source VARCHAR(255) NOT NULL,
        record_data JSONB NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS data_source_metadata (
        id BIGSERIAL PRIMARY KEY,
        source_name VARCHAR(255) UNIQUE NOT NULL,
        column_info JSONB,
        created_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_dashboard_data_timestamp ON dashboard_data(record_timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_dashboard_data_source ON dashboard_data(data_source)",
    "CREATE INDEX IF NOT EXISTS idx_dashboard_data_jsonb ON dashboard_data USING GIN(record_data)",
];

pub struct PostgresStore {
    runtime: Runtime,
    pool: PgPool,
}

/// Initialize the connection pool and check it with a trivial query
async fn init_pool(database_url: &str) -> std::result::Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;

    Ok(pool)
}

impl PostgresStore {
    pub fn connect(database_url: &str) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let pool = runtime
            .block_on(init_pool(database_url))
            .map_err(|e| DashboardError::Database(format!("Failed to connect to database: {}", e)))?;

        Ok(Self { runtime, pool })
    }
}

impl DashboardStore for PostgresStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    fn ensure_schema(&self) -> Result<()> {
        self.runtime.block_on(async {
            for statement in SCHEMA_STATEMENTS {
                sqlx::query(statement)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| DashboardError::Database(format!("Database setup error: {}", e)))?;
            }
            Ok::<(), DashboardError>(())
        })
    }

    fn upsert_profile(&self, profile: &SourceProfile) -> Result<ProfileWrite> {
        let column_info = serde_json::to_value(&profile.columns)?;

        self.runtime.block_on(async {
            let existing = sqlx::query("SELECT id FROM data_source_metadata WHERE source_name = $1")
                .bind(&profile.source_name)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| DashboardError::Database(format!("Failed to look up metadata: {}", e)))?;

            if existing.is_some() {
                sqlx::query(
                    r#"
                    UPDATE data_source_metadata
                    SET column_info = $2, updated_at = CURRENT_TIMESTAMP
                    WHERE source_name = $1
                    "#,
                )
                .bind(&profile.source_name)
                .bind(&column_info)
                .execute(&self.pool)
                .await
                .map_err(|e| DashboardError::Database(format!("Failed to update metadata: {}", e)))?;

                info!("Updated metadata for source: {}", profile.source_name);
                Ok::<_, DashboardError>(ProfileWrite::Updated)
            } else {
                sqlx::query("INSERT INTO data_source_metadata (source_name, column_info) VALUES ($1, $2)")
                    .bind(&profile.source_name)
                    .bind(&column_info)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| DashboardError::Database(format!("Failed to insert metadata: {}", e)))?;

                info!("Stored metadata for new source: {}", profile.source_name);
                Ok(ProfileWrite::Inserted)
            }
        })
    }

    fn load_profile(&self, source_name: &str) -> Result<Option<SourceProfile>> {
        let row = self
            .runtime
            .block_on(
                sqlx::query("SELECT column_info FROM data_source_metadata WHERE source_name = $1")
                    .bind(source_name)
                    .fetch_optional(&self.pool),
            )
            .map_err(|e| DashboardError::Database(format!("Error loading metadata: {}", e)))?;

        let column_info: Option<Value> = match row {
            Some(row) => row
                .try_get("column_info")
                .map_err(|e| DashboardError::Database(format!("Error loading metadata: {}", e)))?,
            None => return Ok(None),
        };

        let columns: Vec<ColumnProfile> = match column_info {
            Some(value) => serde_json::from_value(value)?,
            None => Vec::new(),
        };
        Ok(Some(SourceProfile::new(source_name, columns)))
    }

    fn insert_record(&self, record: &Record) -> Result<i64> {
        let payload = Value::Object(record.data.clone());

        self.runtime
            .block_on(
                sqlx::query_scalar::<_, i64>(
                    r#"
                    INSERT INTO dashboard_data (record_timestamp, data_source, record_data)
                    VALUES ($1, $2, $3)
                    RETURNING id
                    "#,
                )
                .bind(record.timestamp)
                .bind(&record.source_name)
                .bind(&payload)
                .fetch_one(&self.pool),
            )
            .map_err(|e| DashboardError::Database(format!("Failed to insert record: {}", e)))
    }

    fn list_sources(&self) -> Result<Vec<String>> {
        self.runtime
            .block_on(
                sqlx::query_scalar::<_, String>(
                    "SELECT DISTINCT data_source FROM dashboard_data ORDER BY data_source",
                )
                .fetch_all(&self.pool),
            )
            .map_err(|e| DashboardError::Database(format!("Database connection error: {}", e)))
    }

    fn load_records(&self, source_name: &str, limit: usize) -> Result<Vec<Record>> {
        let rows = self
            .runtime
            .block_on(
                sqlx::query(
                    r#"
                    SELECT record_timestamp, record_data
                    FROM dashboard_data
                    WHERE data_source = $1
                    ORDER BY record_timestamp DESC, id DESC
                    LIMIT $2
                    "#,
                )
                .bind(source_name)
                .bind(limit as i64)
                .fetch_all(&self.pool),
            )
            .map_err(|e| DashboardError::Database(format!("Error loading data: {}", e)))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let timestamp: DateTime<Utc> = match row.try_get("record_timestamp") {
                Ok(ts) => ts,
                Err(e) => {
                    warn!("Skipping record with unreadable timestamp: {}", e);
                    continue;
                }
            };
            match row.try_get::<Value, _>("record_data") {
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
