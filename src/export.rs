//! CSV export of the displayed rows.

use chrono::NaiveDateTime;
use polars::prelude::*;
use std::path::Path;
use tracing::info;

use crate::error::{DxError, DxResult};

/// A CSV payload and the name it is offered under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub bytes: Vec<u8>,
    pub filename: String,
}

/// `{stem}___{YYYY_MM_DD_HH_MM_SS}.{ext}` for `original`, keeping its extension.
pub fn timestamped_filename(original: &str, now: NaiveDateTime) -> String {
    let path = Path::new(original);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| original.to_string());
    let stamp = now.format("%Y_%m_%d_%H_%M_%S");
    match path.extension() {
        Some(ext) => format!("{}___{}.{}", stem, stamp, ext.to_string_lossy()),
        None => format!("{}___{}", stem, stamp),
    }
}

/// Serialize exactly the displayed rows (filtered and sorted, not paged) with a header row.
pub fn export(
    displayed: Option<&DataFrame>,
    original_filename: &str,
    now: NaiveDateTime,
) -> DxResult<ExportFile> {
    let Some(displayed) = displayed else {
        return Err(DxError::NoDataToExport);
    };
    if displayed.height() == 0 {
        return Err(DxError::NoDataToExport);
    }

    let mut df = displayed.clone();
    let mut bytes = Vec::new();
    CsvWriter::new(&mut bytes)
        .include_header(true)
        .with_separator(b',')
        .finish(&mut df)?;

    let filename = timestamped_filename(original_filename, now);
    info!("exporting {} rows as {}", df.height(), filename);
    Ok(ExportFile { bytes, filename })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 7, 9)
            .unwrap()
    }

    #[test]
    fn filename_keeps_stem_and_extension() {
        assert_eq!(
            timestamped_filename("sales.csv", noon()),
            "sales___2024_03_05_14_07_09.csv"
        );
        assert_eq!(
            timestamped_filename("q1.report.xlsx", noon()),
            "q1.report___2024_03_05_14_07_09.xlsx"
        );
        assert_eq!(
            timestamped_filename("README", noon()),
            "README___2024_03_05_14_07_09"
        );
    }

    #[test]
    fn nothing_to_export() {
        assert!(matches!(
            export(None, "a.csv", noon()),
            Err(DxError::NoDataToExport)
        ));
        let empty = df!("a" => Vec::<i64>::new()).unwrap();
        assert!(matches!(
            export(Some(&empty), "a.csv", noon()),
            Err(DxError::NoDataToExport)
        ));
    }

    #[test]
    fn csv_has_header_and_rows() {
        let df = df!("Category" => &["A", "B"], "Amount" => &[1.5, 2.0]).unwrap();
        let file = export(Some(&df), "sales.csv", noon()).unwrap();
        let text = String::from_utf8(file.bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["Category,Amount", "A,1.5", "B,2.0"]);
        assert_eq!(file.filename, "sales___2024_03_05_14_07_09.csv");
    }
}
