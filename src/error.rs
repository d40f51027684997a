//! Error types for loading, aggregating, filtering and exporting data.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the dashboard core.
#[derive(Error, Debug)]
pub enum DxError {
    /// File extension is not one of the supported tabular formats
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Path is a directory: {}", .0.display())]
    IsDirectory(PathBuf),

    /// The CSV or spreadsheet reader rejected the content
    #[error("Cannot load file at {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Group-by column not in table: {0}")]
    InvalidGroupByColumn(String),

    #[error("No data to export")]
    NoDataToExport,

    #[error("Invalid filter query: {0}")]
    InvalidFilterQuery(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for dashboard operations
pub type DxResult<T> = Result<T, DxError>;

impl DxError {
    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        DxError::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
