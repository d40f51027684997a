//! Filtering, sorting and paging of the derived table, as the table widget does it.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MAX_PAGE_SIZE;
use crate::error::DxResult;
use crate::filter::FilterQuery;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortColumn {
    pub column_id: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// The table widget's filter, sort and paging state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableQuery {
    pub filter_query: String,
    pub sort_by: Vec<SortColumn>,
    pub page_current: usize,
    pub page_size: usize,
}

impl Default for TableQuery {
    fn default() -> Self {
        Self {
            filter_query: String::new(),
            sort_by: Vec::new(),
            page_current: 0,
            page_size: 10,
        }
    }
}

/// Rows after filter and sort, plus the current page of them.
#[derive(Debug, Clone)]
pub struct DisplayedTable {
    /// Every displayed row, independent of pagination
    pub rows: DataFrame,
    pub page: DataFrame,
    pub page_current: usize,
    pub page_count: usize,
    /// Parser message when the filter query was rejected and ignored
    pub filter_error: Option<String>,
}

impl DisplayedTable {
    /// Page rows as JSON objects keyed by column name.
    pub fn page_records(&self) -> DxResult<Vec<serde_json::Value>> {
        records(&self.page)
    }
}

/// Apply `query` to `derived`. An invalid filter leaves the rows unfiltered.
pub fn apply(derived: &DataFrame, query: &TableQuery) -> DxResult<DisplayedTable> {
    let mut lf = derived.clone().lazy();
    let mut filter_error = None;

    let filter_text = query.filter_query.trim();
    if !filter_text.is_empty() {
        match FilterQuery::parse(filter_text).and_then(|q| q.to_expr(derived.schema())) {
            Ok(expr) => lf = lf.filter(expr),
            Err(e) => {
                debug!("ignoring filter query {:?}: {}", filter_text, e);
                filter_error = Some(e.to_string());
            }
        }
    }

    let schema = derived.schema();
    let sort_columns: Vec<&SortColumn> = query
        .sort_by
        .iter()
        .filter(|s| schema.contains(s.column_id.as_str()))
        .collect();
    if !sort_columns.is_empty() {
        let options = SortMultipleOptions {
            descending: sort_columns
                .iter()
                .map(|s| s.direction == SortDirection::Desc)
                .collect(),
            nulls_last: vec![true; sort_columns.len()],
            maintain_order: true,
            ..Default::default()
        };
        lf = lf.sort_by_exprs(
            sort_columns
                .iter()
                .map(|s| col(s.column_id.as_str()))
                .collect::<Vec<_>>(),
            options,
        );
    }

    let rows = lf.collect()?;
    let page_size = query.page_size.clamp(1, MAX_PAGE_SIZE);
    let page_count = rows.height().div_ceil(page_size).max(1);
    let page_current = query.page_current.min(page_count - 1);
    let page = rows.slice((page_current * page_size) as i64, page_size);

    Ok(DisplayedTable {
        rows,
        page,
        page_current,
        page_count,
        filter_error,
    })
}

/// Serialize `df` as a list of row objects.
pub fn records(df: &DataFrame) -> DxResult<Vec<serde_json::Value>> {
    if df.height() == 0 {
        return Ok(Vec::new());
    }
    let mut buf = Vec::new();
    let mut df = df.clone();
    JsonWriter::new(&mut buf)
        .with_json_format(JsonFormat::Json)
        .finish(&mut df)?;
    serde_json::from_slice(&buf)
        .map_err(|e| PolarsError::ComputeError(format!("row serialization: {}", e).into()).into())
}
