pub mod charts;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod inference;
pub mod ingestion;
pub mod model;
pub mod storage;

pub use error::{DashboardError, Result};
