//! Ingestion - turns uploaded CSV/Excel files into tables, records and
//! stored column profiles.

pub mod csv_reader;
pub mod excel_reader;
pub mod importer;
pub mod loader;
pub mod records;
pub mod table;

pub use importer::{ImportOptions, ImportReport, ImportStatus, Importer, InsertProgress, RecordFailure};
pub use loader::{load_bytes, load_path, source_name_for, FileFormat, LoadedFile};
pub use records::prepare_records;
pub use table::Table;
