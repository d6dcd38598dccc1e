use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Could not decode file: {0}")]
    Decode(String),

    #[error("Unsupported file format: {0}. Please use CSV or Excel files.")]
    UnsupportedFormat(String),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Chart error: {0}")]
    Chart(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl From<polars::error::PolarsError> for DashboardError {
    fn from(err: polars::error::PolarsError) -> Self {
        DashboardError::Polars(err.to_string())
    }
}

impl From<csv::Error> for DashboardError {
    fn from(err: csv::Error) -> Self {
        DashboardError::Csv(err.to_string())
    }
}

impl DashboardError {
    /// Remediation hints shown to the user when a file cannot be loaded.
    pub fn hints(&self) -> &'static [&'static str] {
        match self {
            DashboardError::Decode(_) => &[
                "Open the file in Excel and save it as \"CSV UTF-8 (Comma delimited)\"",
                "Try a different file format: if it's CSV, try saving as Excel (.xlsx)",
                "Check for special characters in your data that might cause encoding issues",
            ],
            DashboardError::UnsupportedFormat(_)
            | DashboardError::Csv(_)
            | DashboardError::Spreadsheet(_) => &[
                "Make sure your file is a valid CSV or Excel file",
                "Check that the file isn't corrupted or password-protected",
                "Verify the file has proper column headers in the first row",
                "Make sure the file isn't currently open in another program",
            ],
            _ => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
