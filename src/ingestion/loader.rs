//! File Loader - accepts a path or an uploaded byte stream and returns a table.

use crate::error::{DashboardError, Result};
use crate::ingestion::csv_reader::read_csv_bytes;
use crate::ingestion::excel_reader::read_excel_bytes;
use crate::ingestion::table::Table;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Excel,
}

impl FileFormat {
    /// Format implied by a file name's extension.
    pub fn from_file_name(file_name: &str) -> Result<Self> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => Ok(FileFormat::Csv),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Ok(FileFormat::Excel),
            "" => Err(DashboardError::UnsupportedFormat("(no extension)".to_string())),
            other => Err(DashboardError::UnsupportedFormat(format!(".{}", other))),
        }
    }
}

/// A loaded file and how it was read
#[derive(Clone, Debug)]
pub struct LoadedFile {
    pub table: Table,
    pub format: FileFormat,
    /// Encoding that decoded a CSV file; `None` for workbooks.
    pub encoding: Option<&'static str>,
}

/// Load a CSV or Excel file from disk.
pub fn load_path(path: impl AsRef<Path>) -> Result<LoadedFile> {
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    // Reject unsupported extensions before touching the file
    FileFormat::from_file_name(&file_name)?;

    let bytes = std::fs::read(path)?;
    load_bytes(&file_name, &bytes)
}

/// Load an uploaded file from memory; `file_name` selects the format.
pub fn load_bytes(file_name: &str, bytes: &[u8]) -> Result<LoadedFile> {
    let format = FileFormat::from_file_name(file_name)?;

    let loaded = match format {
        FileFormat::Csv => {
            let decoded = read_csv_bytes(bytes)?;
            LoadedFile {
                table: decoded.table,
                format,
                encoding: Some(decoded.encoding),
            }
        }
        FileFormat::Excel => LoadedFile {
            table: read_excel_bytes(bytes)?,
            format,
            encoding: None,
        },
    };

    info!(
        "Successfully loaded {} rows with {} columns from {}",
        loaded.table.height(),
        loaded.table.width(),
        file_name
    );

    Ok(loaded)
}

/// Source name for a file: its name without the extension.
pub fn source_name_for(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("data")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(FileFormat::from_file_name("sales.CSV").unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::from_file_name("report.xlsx").unwrap(), FileFormat::Excel);
        assert_eq!(FileFormat::from_file_name("old.xls").unwrap(), FileFormat::Excel);
        assert!(matches!(
            FileFormat::from_file_name("notes.txt"),
            Err(DashboardError::UnsupportedFormat(_))
        ));
        assert!(FileFormat::from_file_name("README").is_err());
    }

    #[test]
    fn test_load_bytes_csv() {
        let loaded = load_bytes("inventory.csv", b"Warehouse,Stock\nNYC,500\nLA,300\n").unwrap();
        assert_eq!(loaded.format, FileFormat::Csv);
        assert_eq!(loaded.encoding, Some("utf-8"));
        assert_eq!(loaded.table.height(), 2);
    }

    #[test]
    fn test_source_name_for() {
        assert_eq!(source_name_for("/tmp/data/sales_2024.csv"), "sales_2024");
        assert_eq!(source_name_for("medical.xlsx"), "medical");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_path("/definitely/not/here.csv");
        assert!(matches!(result, Err(DashboardError::Io(_))));
    }
}
