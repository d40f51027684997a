//! User-facing error message formatting.
//!
//! Uses typed error matching (DxError, PolarsError variants, io::ErrorKind)
//! rather than string parsing to produce short messages for the dashboard.

use crate::error::DxError;
use polars::prelude::PolarsError;
use std::io;

/// Format a DxError as the message shown next to the table.
pub fn user_message(err: &DxError) -> String {
    match err {
        DxError::UnsupportedFormat(ext) => format!(
            "Unsupported file type '{}'. Use .csv, .xls, .xlsm or .xlsx.",
            ext
        ),
        DxError::FileNotFound(p) => format!("File not found: {}", p.display()),
        DxError::IsDirectory(p) => format!("{} is a directory, not a file.", p.display()),
        DxError::Parse { path, message } => {
            format!("Cannot load {}: {}", path.display(), message)
        }
        DxError::InvalidGroupByColumn(c) => {
            format!("Cannot group by '{}': column is not in the dataset.", c)
        }
        DxError::NoDataToExport => "Nothing to export.".to_string(),
        DxError::InvalidFilterQuery(msg) => format!("Filter ignored: {}", msg),
        DxError::Polars(pe) => user_message_from_polars(pe),
        DxError::Io(e) => user_message_from_io(e, None),
    }
}

/// Format a PolarsError as a user-facing message by matching on its variant.
pub fn user_message_from_polars(err: &PolarsError) -> String {
    use polars::prelude::PolarsError as PE;

    match err {
        PE::ColumnNotFound(msg) => format!(
            "Column not found: {}. Check spelling and that the column exists.",
            msg
        ),
        PE::Duplicate(msg) => format!("Duplicate column in result: {}", msg),
        PE::IO { error, msg } => {
            user_message_from_io(error.as_ref(), msg.as_ref().map(|m| m.as_ref()))
        }
        PE::NoData(msg) => format!("No data: {}", msg),
        PE::SchemaMismatch(msg) => format!("Schema mismatch: {}", msg),
        PE::ShapeMismatch(msg) => format!("Row shape mismatch: {}", msg),
        PE::InvalidOperation(msg) => format!("Operation not allowed: {}", msg),
        PE::OutOfBounds(msg) => format!("Index or row out of bounds: {}", msg),
        PE::ComputeError(msg) => msg.to_string(),
        PE::Context { error, msg } => {
            let inner = user_message_from_polars(error);
            format!("{}: {}", msg, inner)
        }
        #[allow(unreachable_patterns)]
        _ => err.to_string(),
    }
}

/// Format an io::Error as a user-facing message by matching on ErrorKind.
pub fn user_message_from_io(err: &io::Error, context: Option<&str>) -> String {
    use std::io::ErrorKind;

    let base: String = match err.kind() {
        ErrorKind::NotFound => "File or directory not found.".to_string(),
        ErrorKind::PermissionDenied => "Permission denied. Check read access.".to_string(),
        ErrorKind::InvalidData | ErrorKind::InvalidInput => {
            "Invalid or corrupted data.".to_string()
        }
        ErrorKind::UnexpectedEof => "Unexpected end of file.".to_string(),
        ErrorKind::OutOfMemory => "Out of memory.".to_string(),
        _ => err.to_string(),
    };

    match context {
        Some(ctx) if !ctx.is_empty() => format!("{} {}", base, ctx),
        _ => base,
    }
}

/// Format a color_eyre Report (chart rendering) by walking the cause chain.
pub fn user_message_from_report(report: &color_eyre::eyre::Report) -> String {
    for cause in report.chain() {
        if let Some(dx) = cause.downcast_ref::<DxError>() {
            return user_message(dx);
        }
        if let Some(pe) = cause.downcast_ref::<PolarsError>() {
            return user_message_from_polars(pe);
        }
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return user_message_from_io(io_err, None);
        }
    }

    // Fallback: first line of display to avoid long tracebacks
    let display = report.to_string();
    display
        .lines()
        .next()
        .map(str::trim)
        .unwrap_or("An error occurred")
        .to_string()
}
