//! Tabular file loading (CSV and Excel) into polars DataFrames.
//!
//! CSV bytes are decoded as Latin-1 before they reach the polars reader. Excel files are read
//! eagerly with calamine from the first worksheet, with a per-column type inferred from the cells.

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use polars::datatypes::TimeUnit;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::config::LoadProfile;
use crate::error::{DxError, DxResult};

/// Extensions accepted by `load` and listed by `list_datasets`.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "xls", "xlsm", "xlsx"];

/// Date/datetime layouts tried, in order, during detection and coercion.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Csv,
    Excel,
}

impl FileFormat {
    fn from_path(path: &Path) -> DxResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(FileFormat::Csv),
            "xls" | "xlsm" | "xlsx" => Ok(FileFormat::Excel),
            _ => Err(DxError::UnsupportedFormat(ext)),
        }
    }
}

/// Requested type for one column of a known dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeHint {
    Text,
    Int,
    Float,
    Datetime,
}

impl FromStr for TypeHint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "string" | "str" => Ok(TypeHint::Text),
            "int64" | "int32" => Ok(TypeHint::Int),
            "float64" | "float32" | "double" => Ok(TypeHint::Float),
            other if other.contains("date") => Ok(TypeHint::Datetime),
            _ => Err(format!(
                "unknown dtype '{}'; expected string, int64, int32, float64, float32, double or a date type",
                s
            )),
        }
    }
}

/// Per-dataset loading instructions: type hints by column and an optional column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadOptions {
    pub type_hints: BTreeMap<String, String>,
    pub column_order: Option<Vec<String>>,
}

impl From<&LoadProfile> for LoadOptions {
    fn from(profile: &LoadProfile) -> Self {
        Self {
            type_hints: profile.dtypes.clone(),
            column_order: profile.columns.clone(),
        }
    }
}

/// Seam the view controller loads tables through.
pub trait TableLoader: Send + Sync {
    fn load(&self, path: &Path) -> DxResult<DataFrame>;
}

/// Loads files, applying the first configured profile whose pattern matches the filename.
#[derive(Debug, Clone, Default)]
pub struct DataSource {
    profiles: Vec<LoadProfile>,
}

impl DataSource {
    pub fn new(profiles: Vec<LoadProfile>) -> Self {
        Self { profiles }
    }

    fn options_for(&self, path: &Path) -> LoadOptions {
        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_default();
        self.profiles
            .iter()
            .find(|p| p.matches(&filename))
            .map(LoadOptions::from)
            .unwrap_or_default()
    }
}

impl TableLoader for DataSource {
    fn load(&self, path: &Path) -> DxResult<DataFrame> {
        load(path, &self.options_for(path))
    }
}

/// Load a CSV or Excel file, drop "unnamed" columns, then apply type hints and column order.
pub fn load(path: &Path, options: &LoadOptions) -> DxResult<DataFrame> {
    if !path.exists() {
        return Err(DxError::FileNotFound(path.to_path_buf()));
    }
    if path.is_dir() {
        return Err(DxError::IsDirectory(path.to_path_buf()));
    }

    let df = match FileFormat::from_path(path)? {
        FileFormat::Csv => read_csv_latin1(path)?,
        FileFormat::Excel => read_excel(path)?,
    };
    let df = drop_unnamed_columns(df)?;

    let df = if options.type_hints.is_empty() {
        debug!("reading {} without dtypes", path.display());
        detect_dates(df)?
    } else {
        apply_type_hints(df, &options.type_hints)?
    };

    match &options.column_order {
        Some(order) => apply_column_order(df, order),
        None => Ok(df),
    }
}

/// Names of the supported data files directly inside `dir`, sorted.
pub fn list_datasets(dir: &Path) -> Vec<String> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("cannot list {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| is_supported_filename(name))
        .collect();
    names.sort();
    names
}

fn is_supported_filename(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn read_csv_latin1(path: &Path) -> DxResult<DataFrame> {
    let bytes = std::fs::read(path)?;
    // Every byte maps to the code point of the same value in ISO-8859-1
    let text: String = bytes.iter().map(|&b| b as char).collect();

    let read_options = CsvReadOptions::default()
        .with_has_header(true)
        .map_parse_options(|opts| opts.with_separator(b',').with_try_parse_dates(false));
    let df = CsvReader::new(std::io::Cursor::new(text.into_bytes()))
        .with_options(read_options)
        .finish()
        .map_err(|e| DxError::parse(path, e))?;
    name_blank_columns(df)
}

/// Placeholder for a blank header, matched later by the unnamed-column filter.
fn unnamed_placeholder(col_idx: usize) -> String {
    format!("Unnamed: {}", col_idx)
}

/// A leading index column written without a header comes back with an empty name.
fn name_blank_columns(mut df: DataFrame) -> DxResult<DataFrame> {
    let names: Vec<String> = df.schema().iter_names().map(|s| s.to_string()).collect();
    if names.iter().all(|name| !name.trim().is_empty()) {
        return Ok(df);
    }
    let renamed: Vec<String> = names
        .into_iter()
        .enumerate()
        .map(|(idx, name)| {
            if name.trim().is_empty() {
                unnamed_placeholder(idx)
            } else {
                name
            }
        })
        .collect();
    df.set_column_names(renamed)?;
    Ok(df)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExcelColType {
    Int64,
    Float64,
    Boolean,
    Utf8,
    Date,
    Datetime,
}

fn read_excel(path: &Path) -> DxResult<DataFrame> {
    let mut workbook = open_workbook_auto(path).map_err(|e| DxError::parse(path, e))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| DxError::parse(path, "workbook has no worksheets"))?
        .map_err(|e| DxError::parse(path, e))?;

    let rows: Vec<Vec<Data>> = range.rows().map(|r| r.to_vec()).collect();
    excel_rows_to_dataframe(&rows)
}

/// First row is the header; each remaining column gets a type inferred from its cells.
fn excel_rows_to_dataframe(rows: &[Vec<Data>]) -> DxResult<DataFrame> {
    let Some((header_row, body)) = rows.split_first() else {
        return Ok(DataFrame::new_with_height(0, vec![])?);
    };

    let mut columns = Vec::with_capacity(header_row.len());
    for (col_idx, header) in header_row.iter().enumerate() {
        let cells: Vec<Option<&Data>> = body.iter().map(|row| row.get(col_idx)).collect();
        let name = match calamine::DataType::as_string(header) {
            Some(s) if !s.trim().is_empty() => s,
            _ => unnamed_placeholder(col_idx),
        };
        let series = excel_column_to_series(&name, &cells, excel_infer_column_type(&cells))?;
        columns.push(series.into());
    }
    Ok(DataFrame::new(columns)?)
}

fn excel_infer_column_type(cells: &[Option<&Data>]) -> ExcelColType {
    use calamine::DataType as CalamineTrait;
    let mut has_float = false;
    let mut has_int = false;
    let mut has_bool = false;
    let mut has_datetime = false;
    for cell in cells.iter().flatten() {
        if CalamineTrait::is_string(*cell) {
            let non_empty: Vec<&Data> = cells
                .iter()
                .flatten()
                .copied()
                .filter(|c| !CalamineTrait::is_empty(*c))
                .collect();
            let all_parse = !non_empty.is_empty()
                && non_empty
                    .iter()
                    .all(|c| excel_cell_to_naive_datetime(c).is_some());
            return match all_parse {
                true if parsed_cells_all_midnight(cells) => ExcelColType::Date,
                true => ExcelColType::Datetime,
                false => ExcelColType::Utf8,
            };
        }
        if CalamineTrait::is_datetime(*cell) || CalamineTrait::is_datetime_iso(*cell) {
            has_datetime = true;
        } else if CalamineTrait::is_float(*cell) {
            has_float = true;
        } else if CalamineTrait::is_int(*cell) {
            has_int = true;
        } else if CalamineTrait::is_bool(*cell) {
            has_bool = true;
        }
    }

    if has_datetime && !has_float && !has_int {
        if parsed_cells_all_midnight(cells) {
            ExcelColType::Date
        } else {
            ExcelColType::Datetime
        }
    } else if has_float {
        let all_whole = cells.iter().flatten().all(|cell| {
            calamine::DataType::as_f64(*cell)
                .is_none_or(|f| f.is_finite() && (f - f.trunc()).abs() < 1e-10)
        });
        if all_whole {
            ExcelColType::Int64
        } else {
            ExcelColType::Float64
        }
    } else if has_int {
        ExcelColType::Int64
    } else if has_bool {
        ExcelColType::Boolean
    } else {
        ExcelColType::Utf8
    }
}

fn parsed_cells_all_midnight(cells: &[Option<&Data>]) -> bool {
    cells
        .iter()
        .flatten()
        .filter_map(|c| excel_cell_to_naive_datetime(c))
        .all(|dt| dt.time() == NaiveTime::MIN)
}

fn excel_cell_to_naive_datetime(cell: &Data) -> Option<NaiveDateTime> {
    use calamine::DataType;
    // as_datetime also reads plain numbers as serial dates
    if cell.is_datetime() || cell.is_datetime_iso() {
        if let Some(dt) = cell.as_datetime() {
            return Some(dt);
        }
    }
    let s = cell.get_datetime_iso().or_else(|| cell.get_string())?;
    parse_naive_datetime_str(s)
}

/// Parse an ISO-like date or datetime string.
pub(crate) fn parse_naive_datetime_str(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

fn excel_column_to_series(
    name: &str,
    cells: &[Option<&Data>],
    col_type: ExcelColType,
) -> DxResult<Series> {
    use calamine::DataType as CalamineTrait;
    let series = match col_type {
        ExcelColType::Int64 => {
            let v: Vec<Option<i64>> = cells
                .iter()
                .map(|c| c.and_then(|cell| cell.as_i64()))
                .collect();
            Series::new(name.into(), v)
        }
        ExcelColType::Float64 => {
            let v: Vec<Option<f64>> = cells
                .iter()
                .map(|c| c.and_then(|cell| cell.as_f64()))
                .collect();
            Series::new(name.into(), v)
        }
        ExcelColType::Boolean => {
            let v: Vec<Option<bool>> = cells
                .iter()
                .map(|c| c.and_then(|cell| cell.get_bool()))
                .collect();
            Series::new(name.into(), v)
        }
        ExcelColType::Utf8 => {
            let v: Vec<Option<String>> = cells
                .iter()
                .map(|c| c.filter(|cell| !cell.is_empty()).and_then(|cell| cell.as_string()))
                .collect();
            Series::new(name.into(), v)
        }
        ExcelColType::Date => {
            let v: Vec<Option<NaiveDateTime>> = cells
                .iter()
                .map(|c| c.and_then(excel_cell_to_naive_datetime))
                .collect();
            datetime_series(name, &v)?.cast(&DataType::Date)?
        }
        ExcelColType::Datetime => {
            let v: Vec<Option<NaiveDateTime>> = cells
                .iter()
                .map(|c| c.and_then(excel_cell_to_naive_datetime))
                .collect();
            datetime_series(name, &v)?
        }
    };
    Ok(series)
}

fn datetime_series(name: &str, values: &[Option<NaiveDateTime>]) -> DxResult<Series> {
    let micros: Vec<Option<i64>> = values
        .iter()
        .map(|v| v.map(|dt| dt.and_utc().timestamp_micros()))
        .collect();
    Ok(Series::new(name.into(), micros)
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?)
}

fn drop_unnamed_columns(df: DataFrame) -> DxResult<DataFrame> {
    let names: Vec<String> = df.schema().iter_names().map(|s| s.to_string()).collect();
    let keep: Vec<&String> = names
        .iter()
        .filter(|name| !name.to_lowercase().starts_with("unnamed"))
        .collect();
    if keep.len() == names.len() {
        return Ok(df);
    }
    debug!("dropping {} unnamed column(s)", names.len() - keep.len());
    Ok(df.select(keep.into_iter().map(|s| s.as_str()))?)
}

fn apply_type_hints(mut df: DataFrame, hints: &BTreeMap<String, String>) -> DxResult<DataFrame> {
    for (column, raw_hint) in hints {
        let hint = match TypeHint::from_str(raw_hint) {
            Ok(hint) => hint,
            Err(e) => {
                warn!("cannot convert column {}: {}", column, e);
                continue;
            }
        };
        let series = match df.column(column) {
            Ok(c) => c.as_materialized_series().clone(),
            Err(_) => {
                warn!("cannot convert column {}: not in table", column);
                continue;
            }
        };
        match coerce_series(&series, hint) {
            Ok(converted) => {
                df.with_column(converted)?;
            }
            Err(e) => warn!("cannot convert column {} to {:?}: {}", column, hint, e),
        }
    }
    Ok(df)
}

/// Convert `series` per `hint`. Values that do not convert become null.
fn coerce_series(series: &Series, hint: TypeHint) -> DxResult<Series> {
    let converted = match hint {
        TypeHint::Text => series.cast(&DataType::String)?,
        TypeHint::Int => numeric_source(series)?.cast(&DataType::Int64)?,
        TypeHint::Float => numeric_source(series)?.cast(&DataType::Float64)?,
        TypeHint::Datetime => match series.dtype() {
            DataType::Datetime(_, _) => series.clone(),
            DataType::Date => series.cast(&DataType::Datetime(TimeUnit::Microseconds, None))?,
            _ => {
                let text = series.cast(&DataType::String)?;
                let parsed: Vec<Option<NaiveDateTime>> = text
                    .str()?
                    .into_iter()
                    .map(|v| v.and_then(parse_naive_datetime_str))
                    .collect();
                datetime_series(series.name().as_str(), &parsed)?
            }
        },
    };
    Ok(converted)
}

/// Strings are trimmed before a numeric cast so padded cells still convert.
fn numeric_source(series: &Series) -> DxResult<Series> {
    if series.dtype() != &DataType::String {
        return Ok(series.clone());
    }
    let trimmed: Vec<Option<String>> = series
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.trim().to_string()))
        .collect();
    Ok(Series::new(series.name().clone(), trimmed))
}

/// Convert every text column whose non-null values all parse as dates.
fn detect_dates(mut df: DataFrame) -> DxResult<DataFrame> {
    let text_columns: Vec<String> = df
        .schema()
        .iter()
        .filter(|(_, dtype)| **dtype == DataType::String)
        .map(|(name, _)| name.to_string())
        .collect();

    for name in text_columns {
        let parsed: Option<Vec<Option<NaiveDateTime>>> = {
            let values = df.column(&name)?.str()?;
            if values.null_count() == values.len() {
                None
            } else {
                values
                    .into_iter()
                    .map(|v| match v {
                        None => Some(None),
                        Some(s) => parse_naive_datetime_str(s).map(Some),
                    })
                    .collect()
            }
        };
        if let Some(parsed) = parsed {
            debug!("column {} parsed as datetime", name);
            df.with_column(datetime_series(&name, &parsed)?)?;
        }
    }
    Ok(df)
}

fn apply_column_order(df: DataFrame, order: &[String]) -> DxResult<DataFrame> {
    let schema = df.schema();
    if let Some(missing) = order.iter().find(|c| !schema.contains(c.as_str())) {
        warn!("cannot sort columns: column {} not in table", missing);
        return Ok(df);
    }
    Ok(df.select(order.iter().map(|s| s.as_str()))?)
}
