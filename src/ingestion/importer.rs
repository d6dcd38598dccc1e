//! Importer - analyzes a loaded table, stores its column profile and inserts
//! its records one at a time with a fixed delay between inserts.

use crate::inference::TypeInferencer;
use crate::ingestion::records::prepare_records;
use crate::ingestion::table::Table;
use crate::model::{Record, SourceProfile};
use crate::storage::{DashboardStore, ProfileWrite};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

/// Options controlling an import run
#[derive(Clone, Debug)]
pub struct ImportOptions {
    /// Pause between successive inserts; not applied after the last record.
    pub delay: Duration,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportStatus {
    Success,
    Partial,
    Failed,
}

/// A record that could not be inserted
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordFailure {
    /// Zero-based position in the prepared batch
    pub index: usize,
    pub error: String,
}

/// Progress of the insert loop, reported after every record
#[derive(Clone, Debug)]
pub struct InsertProgress<'a> {
    pub index: usize,
    pub total: usize,
    pub outcome: std::result::Result<i64, &'a str>,
}

/// Outcome of an import run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImportReport {
    pub run_id: String,
    pub source_name: String,
    pub records_total: usize,
    pub records_inserted: usize,
    pub failures: Vec<RecordFailure>,
    pub profile_write: Option<ProfileWrite>,
    pub profile_error: Option<String>,
    pub status: ImportStatus,
}

impl ImportReport {
    fn finish(mut self) -> Self {
        self.status = if self.records_total > 0 && self.records_inserted == 0 {
            ImportStatus::Failed
        } else if !self.failures.is_empty() || self.profile_error.is_some() {
            ImportStatus::Partial
        } else {
            ImportStatus::Success
        };
        self
    }
}

/// Import coordinator over a store
pub struct Importer<'a> {
    store: &'a dyn DashboardStore,
    inferencer: TypeInferencer,
}

impl<'a> Importer<'a> {
    pub fn new(store: &'a dyn DashboardStore) -> Self {
        Self {
            store,
            inferencer: TypeInferencer::for_import(),
        }
    }

    pub fn with_inferencer(mut self, inferencer: TypeInferencer) -> Self {
        self.inferencer = inferencer;
        self
    }

    /// Profile every column of `table`.
    pub fn analyze(&self, source_name: &str, table: &Table) -> SourceProfile {
        let columns = table
            .columns
            .iter()
            .enumerate()
            .map(|(idx, name)| self.inferencer.infer(name, table.column_values(idx)))
            .collect();

        SourceProfile::new(source_name, columns)
    }

    /// Run a full import: analyze, store the profile, then insert every row.
    pub fn import(
        &self,
        source_name: &str,
        table: &Table,
        options: &ImportOptions,
        on_progress: &mut dyn FnMut(&InsertProgress),
    ) -> ImportReport {
        let profile = self.analyze(source_name, table);
        let records = prepare_records(table, source_name);
        self.import_prepared(&profile, &records, options, on_progress)
    }

    /// Store `profile` and insert `records`. A failed profile write is
    /// reported but does not stop the inserts.
    pub fn import_prepared(
        &self,
        profile: &SourceProfile,
        records: &[Record],
        options: &ImportOptions,
        on_progress: &mut dyn FnMut(&InsertProgress),
    ) -> ImportReport {
        let run_id = Uuid::new_v4().to_string();
        info!(
            "Import run {} for source {}: {} records",
            run_id,
            profile.source_name,
            records.len()
        );

        let mut report = ImportReport {
            run_id,
            source_name: profile.source_name.clone(),
            records_total: records.len(),
            records_inserted: 0,
            failures: Vec::new(),
            profile_write: None,
            profile_error: None,
            status: ImportStatus::Success,
        };

        match self.store.upsert_profile(profile) {
            Ok(write) => report.profile_write = Some(write),
            Err(e) => {
                error!("Error storing metadata: {}", e);
                report.profile_error = Some(e.to_string());
            }
        }

        self.insert_records(records, options, on_progress, &mut report);
        report.finish()
    }

    fn insert_records(
        &self,
        records: &[Record],
        options: &ImportOptions,
        on_progress: &mut dyn FnMut(&InsertProgress),
        report: &mut ImportReport,
    ) {
        let total = records.len();

        for (index, record) in records.iter().enumerate() {
            // the stored timestamp is the moment of insertion
            let stamped = Record {
                timestamp: Utc::now(),
                ..record.clone()
            };

            match self.store.insert_record(&stamped) {
                Ok(id) => {
                    report.records_inserted += 1;
                    on_progress(&InsertProgress {
                        index,
                        total,
                        outcome: Ok(id),
                    });
                }
                Err(e) => {
                    let message = e.to_string();
                    error!("Error inserting record {}: {}", index + 1, message);
                    on_progress(&InsertProgress {
                        index,
                        total,
                        outcome: Err(&message),
                    });
                    report.failures.push(RecordFailure {
                        index,
                        error: message,
                    });
                }
            }

            if index + 1 < total && !options.delay.is_zero() {
                std::thread::sleep(options.delay);
            }
        }

        info!(
            "Inserted {}/{} records for {}",
            report.records_inserted, total, report.source_name
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DashboardError, Result};
    use crate::model::DataType;
    use crate::storage::SqliteStore;
    use serde_json::json;
    use std::cell::Cell;

    fn sales_table() -> Table {
        Table::new(
            vec!["Region".into(), "Revenue".into(), "Date".into()],
            vec![
                vec![json!("North"), json!(15000), json!("2024-01-15")],
                vec![json!("South"), json!(18000), json!("2024-01-16")],
                vec![json!("East"), json!(17500), json!("2024-01-17")],
            ],
        )
    }

    fn no_delay() -> ImportOptions {
        ImportOptions { delay: Duration::ZERO }
    }

    /// Store whose record inserts fail on chosen calls.
    struct FlakyStore {
        inner: SqliteStore,
        calls: Cell<usize>,
        fail_on: Vec<usize>,
    }

    impl DashboardStore for FlakyStore {
        fn backend_name(&self) -> &'static str {
            "flaky"
        }
        fn ensure_schema(&self) -> Result<()> {
            self.inner.ensure_schema()
        }
        fn upsert_profile(&self, profile: &SourceProfile) -> Result<ProfileWrite> {
            self.inner.upsert_profile(profile)
        }
        fn load_profile(&self, source_name: &str) -> Result<Option<SourceProfile>> {
            self.inner.load_profile(source_name)
        }
        fn insert_record(&self, record: &Record) -> Result<i64> {
            let call = self.calls.get();
            self.calls.set(call + 1);
            if self.fail_on.contains(&call) {
                return Err(DashboardError::Database("connection reset".to_string()));
            }
            self.inner.insert_record(record)
        }
        fn list_sources(&self) -> Result<Vec<String>> {
            self.inner.list_sources()
        }
        fn load_records(&self, source_name: &str, limit: usize) -> Result<Vec<Record>> {
            self.inner.load_records(source_name, limit)
        }
    }

    #[test]
    fn test_analyze_types() {
        let store = SqliteStore::in_memory().unwrap();
        let profile = Importer::new(&store).analyze("sales", &sales_table());

        let types: Vec<DataType> = profile.columns.iter().map(|c| c.data_type()).collect();
        assert_eq!(types, vec![DataType::Text, DataType::Numeric, DataType::Datetime]);
    }

    #[test]
    fn test_import_success() {
        let store = SqliteStore::in_memory().unwrap();
        store.ensure_schema().unwrap();

        let mut seen = 0;
        let report = Importer::new(&store).import("sales", &sales_table(), &no_delay(), &mut |p| {
            assert_eq!(p.total, 3);
            seen += 1;
        });

        assert_eq!(seen, 3);
        assert_eq!(report.status, ImportStatus::Success);
        assert_eq!(report.records_inserted, 3);
        assert_eq!(report.profile_write, Some(ProfileWrite::Inserted));
        assert_eq!(store.load_records("sales", 10).unwrap().len(), 3);
        assert!(store.load_profile("sales").unwrap().is_some());
    }

    #[test]
    fn test_insert_failures_do_not_abort_batch() {
        let inner = SqliteStore::in_memory().unwrap();
        inner.ensure_schema().unwrap();
        let store = FlakyStore {
            inner,
            calls: Cell::new(0),
            fail_on: vec![1],
        };

        let report = Importer::new(&store).import("sales", &sales_table(), &no_delay(), &mut |_| {});

        assert_eq!(report.status, ImportStatus::Partial);
        assert_eq!(report.records_inserted, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert_eq!(store.load_records("sales", 10).unwrap().len(), 2);
    }

    #[test]
    fn test_all_inserts_failing_is_failed() {
        let store = SqliteStore::in_memory().unwrap();
        // no schema: every statement fails
        let report = Importer::new(&store).import("sales", &sales_table(), &no_delay(), &mut |_| {});

        assert_eq!(report.status, ImportStatus::Failed);
        assert!(report.profile_error.is_some());
        assert_eq!(report.failures.len(), 3);
    }

    #[test]
    fn test_reimport_updates_profile() {
        let store = SqliteStore::in_memory().unwrap();
        store.ensure_schema().unwrap();
        let importer = Importer::new(&store);

        importer.import("sales", &sales_table(), &no_delay(), &mut |_| {});
        let report = importer.import("sales", &sales_table(), &no_delay(), &mut |_| {});

        assert_eq!(report.profile_write, Some(ProfileWrite::Updated));
        assert_eq!(store.load_records("sales", 10).unwrap().len(), 6);
    }

    #[test]
    fn test_huge_values_keep_profile_readable() {
        let store = SqliteStore::in_memory().unwrap();
        store.ensure_schema().unwrap();
        let table = Table::new(
            vec!["Big".into(), "Code".into()],
            vec![
                vec![json!(1e308), json!("1")],
                vec![json!(1e308), json!("2")],
                vec![json!(1e308), json!("3")],
                vec![json!(1e308), json!("x")],
            ],
        );

        let report = Importer::new(&store).import("big", &table, &no_delay(), &mut |_| {});
        assert_eq!(report.status, ImportStatus::Success);

        let profile = store.load_profile("big").unwrap().unwrap();
        assert_eq!(profile.get("Big").unwrap().data_type(), DataType::Numeric);
        assert_eq!(profile.get("Code").unwrap().data_type(), DataType::Text);
    }
}
