//! View state controller: maps the dashboard controls to the derived table and the
//! option lists, flags and resets that keep the page consistent.

use polars::prelude::DataFrame;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::aggregate::{aggregate, AggregationMethod};
use crate::config::MAX_PAGE_SIZE;
use crate::error::DxResult;
use crate::source::TableLoader;
use crate::table::{column_names, column_specs, ColumnSpec};

/// Directory and filename of the loaded dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetIdentity {
    pub directory: PathBuf,
    pub filename: String,
}

impl DatasetIdentity {
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.filename)
    }
}

/// Current values of every control that feeds the view.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewRequest {
    pub directory: Option<String>,
    pub filename: Option<String>,
    pub group_by: Vec<String>,
    pub method: Option<AggregationMethod>,
    pub filter_query: String,
    /// Value of the page-size control
    pub selected_page_size: usize,
    /// Page size the table is currently showing
    pub table_page_size: usize,
    pub page_current: usize,
    pub selection: Vec<usize>,
}

/// Everything the page needs to redraw after one request.
#[derive(Debug, Clone)]
pub struct ViewUpdate {
    pub derived: DataFrame,
    pub columns: Vec<ColumnSpec>,
    pub title: String,
    pub group_by_options: Vec<String>,
    pub group_by: Vec<String>,
    pub aggregate_options: Vec<&'static str>,
    pub method: Option<AggregationMethod>,
    pub selection: Vec<usize>,
    pub page_current: usize,
    pub page_size: usize,
    pub export_enabled: bool,
    pub filter_query: String,
    pub filter_query_text: String,
    pub is_new_dataset: bool,
}

struct Viewing {
    identity: DatasetIdentity,
    raw: DataFrame,
    group_by: Vec<String>,
    method: Option<AggregationMethod>,
}

enum Phase {
    Empty,
    Viewing(Viewing),
}

/// Holds the loaded table for one session and derives each view from it.
pub struct ViewStateController {
    loader: Arc<dyn TableLoader>,
    phase: Phase,
}

fn resolve_identity(request: &ViewRequest) -> Option<DatasetIdentity> {
    let directory = request.directory.as_deref().filter(|d| !d.trim().is_empty())?;
    let filename = request.filename.as_deref().filter(|f| !f.trim().is_empty())?;
    let identity = DatasetIdentity {
        directory: PathBuf::from(directory),
        filename: filename.to_string(),
    };
    let path = identity.path();
    if !path.exists() {
        debug!("{} does not exist; keeping current view", path.display());
        return None;
    }
    if path.is_dir() {
        debug!("{} is a directory; keeping current view", path.display());
        return None;
    }
    Some(identity)
}

impl ViewStateController {
    pub fn new(loader: Arc<dyn TableLoader>) -> Self {
        Self {
            loader,
            phase: Phase::Empty,
        }
    }

    pub fn identity(&self) -> Option<&DatasetIdentity> {
        match &self.phase {
            Phase::Empty => None,
            Phase::Viewing(v) => Some(&v.identity),
        }
    }

    /// The table as loaded, before aggregation.
    pub fn raw(&self) -> Option<&DataFrame> {
        match &self.phase {
            Phase::Empty => None,
            Phase::Viewing(v) => Some(&v.raw),
        }
    }

    /// Recompute the view for `request`.
    ///
    /// `Ok(None)` means nothing changes: no dataset is selected or the selection does not
    /// name a file. Load and aggregation errors leave the controller as it was.
    pub fn derive(&mut self, request: &ViewRequest) -> DxResult<Option<ViewUpdate>> {
        let Some(identity) = resolve_identity(request) else {
            return Ok(None);
        };

        let is_new_dataset = match &self.phase {
            Phase::Empty => true,
            Phase::Viewing(v) => v.identity != identity,
        };

        let (group_by, method) = if is_new_dataset {
            (Vec::new(), Some(AggregationMethod::Count))
        } else {
            (request.group_by.clone(), request.method)
        };

        let raw = if is_new_dataset {
            info!("loading {}", identity.path().display());
            self.loader.load(&identity.path())?
        } else {
            match &self.phase {
                Phase::Viewing(v) => v.raw.clone(),
                Phase::Empty => return Ok(None),
            }
        };

        let derived = aggregate(&raw, &group_by, method)?;

        let grouping_changed = match &self.phase {
            Phase::Viewing(v) if !is_new_dataset => v.group_by != group_by || v.method != method,
            _ => true,
        };
        let selection = if is_new_dataset || grouping_changed {
            Vec::new()
        } else {
            request.selection.clone()
        };

        let page_size = request.selected_page_size.clamp(1, MAX_PAGE_SIZE);
        let page_current =
            if is_new_dataset || request.selected_page_size != request.table_page_size {
                0
            } else {
                request.page_current
            };

        let filter_query = if is_new_dataset {
            String::new()
        } else {
            request.filter_query.clone()
        };
        let filter_query_text = if filter_query.is_empty() {
            String::new()
        } else {
            format!("Current Filter Query: {}", filter_query)
        };

        let update = ViewUpdate {
            columns: column_specs(&derived),
            derived,
            title: format!("Examining: {}", identity.filename),
            group_by_options: column_names(&raw),
            group_by: group_by.clone(),
            aggregate_options: AggregationMethod::labels(),
            method,
            selection,
            page_current,
            page_size,
            export_enabled: true,
            filter_query,
            filter_query_text,
            is_new_dataset,
        };

        self.phase = Phase::Viewing(Viewing {
            identity,
            raw,
            group_by,
            method,
        });
        Ok(Some(update))
    }
}

/// Directory used when the client has not chosen one.
pub fn default_directory(configured: Option<&Path>) -> PathBuf {
    configured
        .map(Path::to_path_buf)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}
