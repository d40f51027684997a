//! Local HTTP server: the dashboard page plus a JSON API over the session store.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregate::AggregationMethod;
use crate::chart::{self, ChartSpec};
use crate::chart_render::render_svg;
use crate::config::{ChartConfig, MAX_PAGE_SIZE, MAX_PLOT_BARS};
use crate::error::DxError;
use crate::error_display::{user_message, user_message_from_report};
use crate::export;
use crate::session::{Session, SessionStore};
use crate::source::{list_datasets, TableLoader};
use crate::table::ColumnSpec;
use crate::table_view::{self, SortColumn, TableQuery};
use crate::view::ViewRequest;

/// Values the server hands to new sessions and uses when the client omits them.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub data_dir: PathBuf,
    pub default_page_size: usize,
    pub max_plot_bars: usize,
    pub chart: ChartConfig,
}

pub struct AppState {
    pub sessions: SessionStore,
    pub settings: ServerSettings,
}

impl AppState {
    pub fn new(loader: Arc<dyn TableLoader>, settings: ServerSettings) -> Self {
        Self {
            sessions: SessionStore::new(loader),
            settings,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/health", get(health))
        .route("/api/session", post(create_session))
        .route("/api/datasets", get(get_datasets))
        .route("/api/view", post(post_view))
        .route("/api/chart/:session/:index", get(get_chart))
        .route("/api/export", get(get_export))
        .with_state(state)
}

/// Bind `addr`, optionally open the browser, and serve until the process ends.
pub async fn serve(
    state: Arc<AppState>,
    addr: &str,
    open_browser: Option<Duration>,
) -> color_eyre::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    let url = format!("http://{}/", listener.local_addr()?);
    info!("dashboard listening on {}", url);

    if let Some(delay) = open_browser {
        spawn_browser_open(url, delay);
    }

    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn spawn_browser_open(url: String, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Err(e) = open::that(&url) {
            warn!("could not open a browser ({}); open {} manually", e, url);
        }
    });
}

async fn serve_index() -> Html<&'static str> {
    Html(include_str!("./static/index.html"))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Serialize)]
struct SessionResponse {
    session_id: Uuid,
    data_dir: String,
    page_size: usize,
    max_page_size: usize,
    max_plot_bars: usize,
    max_plot_bars_limit: usize,
}

async fn create_session(State(state): State<Arc<AppState>>) -> Json<SessionResponse> {
    let id = state.sessions.create();
    debug!("created session {}", id);
    Json(SessionResponse {
        session_id: id,
        data_dir: state.settings.data_dir.to_string_lossy().to_string(),
        page_size: state.settings.default_page_size,
        max_page_size: MAX_PAGE_SIZE,
        max_plot_bars: state.settings.max_plot_bars,
        max_plot_bars_limit: MAX_PLOT_BARS,
    })
}

#[derive(Deserialize)]
struct DatasetsQuery {
    path: Option<String>,
}

#[derive(Serialize)]
struct DatasetsResponse {
    path: String,
    options: Vec<String>,
}

async fn get_datasets(
    Query(params): Query<DatasetsQuery>,
    State(state): State<Arc<AppState>>,
) -> Json<DatasetsResponse> {
    let dir = params
        .path
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| state.settings.data_dir.clone());
    Json(DatasetsResponse {
        options: list_datasets(&dir),
        path: dir.to_string_lossy().to_string(),
    })
}

#[derive(Deserialize)]
struct ViewApiRequest {
    session_id: Uuid,
    #[serde(flatten)]
    view: ViewRequest,
    #[serde(default)]
    sort_by: Vec<SortColumn>,
    max_plot_bars: Option<usize>,
}

#[derive(Serialize)]
struct ViewResponse {
    title: String,
    columns: Vec<ColumnSpec>,
    records: Vec<serde_json::Value>,
    total_rows: usize,
    displayed_rows: usize,
    page_current: usize,
    page_size: usize,
    page_count: usize,
    selection: Vec<usize>,
    group_by_options: Vec<String>,
    group_by: Vec<String>,
    aggregate_options: Vec<&'static str>,
    method: Option<AggregationMethod>,
    export_disabled: bool,
    filter_query: String,
    filter_query_text: String,
    filter_error: Option<String>,
    sort_by: Vec<SortColumn>,
    charts: Vec<ChartSpec>,
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn unknown_session(id: Uuid) -> Response {
    debug!("request for unknown session {}", id);
    error_response(StatusCode::NOT_FOUND, format!("Unknown session {}", id))
}

fn derive_view(
    session: &mut Session,
    request: &ViewApiRequest,
    settings: &ServerSettings,
) -> Result<Option<ViewResponse>, DxError> {
    let Some(update) = session.controller.derive(&request.view)? else {
        return Ok(None);
    };

    let query = TableQuery {
        filter_query: update.filter_query.clone(),
        sort_by: if update.is_new_dataset {
            Vec::new()
        } else {
            request.sort_by.clone()
        },
        page_current: update.page_current,
        page_size: update.page_size,
    };
    let displayed = table_view::apply(&update.derived, &query)?;

    let max_bars = request
        .max_plot_bars
        .unwrap_or(settings.max_plot_bars)
        .min(MAX_PLOT_BARS);
    let charts = chart::project(
        &displayed.rows,
        &update.group_by,
        update.method,
        max_bars,
        &update.selection,
        &settings.chart.theme,
    )?;

    let response = ViewResponse {
        title: update.title,
        columns: update.columns,
        records: displayed.page_records()?,
        total_rows: update.derived.height(),
        displayed_rows: displayed.rows.height(),
        page_current: displayed.page_current,
        page_size: update.page_size,
        page_count: displayed.page_count,
        selection: update.selection,
        group_by_options: update.group_by_options,
        group_by: update.group_by,
        aggregate_options: update.aggregate_options,
        method: update.method,
        export_disabled: !update.export_enabled,
        filter_query: update.filter_query,
        filter_query_text: update.filter_query_text,
        filter_error: displayed.filter_error,
        sort_by: query.sort_by.clone(),
        charts: charts.clone(),
    };

    session.displayed = Some(displayed.rows);
    session.charts = charts;
    Ok(Some(response))
}

async fn post_view(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ViewApiRequest>,
) -> Response {
    let result = state.sessions.with_session(request.session_id, |session| {
        derive_view(session, &request, &state.settings)
    });
    let Some(result) = result else {
        return unknown_session(request.session_id);
    };
    match result {
        Ok(Some(view)) => Json(view).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            warn!("view request failed: {}", e);
            error_response(StatusCode::UNPROCESSABLE_ENTITY, user_message(&e))
        }
    }
}

async fn get_chart(
    Path((session_id, index)): Path<(Uuid, usize)>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let spec = state
        .sessions
        .with_session(session_id, |session| session.charts.get(index).cloned());
    let Some(spec) = spec else {
        return unknown_session(session_id);
    };
    let Some(spec) = spec else {
        return error_response(StatusCode::NOT_FOUND, format!("No chart {}", index));
    };

    let chart = &state.settings.chart;
    match render_svg(&spec, &chart.theme, (chart.width, chart.height)) {
        Ok(svg) => ([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response(),
        Err(report) => {
            warn!("chart {} failed to render: {}", spec.title, report);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                user_message_from_report(&report),
            )
        }
    }
}

#[derive(Deserialize)]
struct ExportQuery {
    session: Uuid,
}

/// Attachment header with the filename quoted. Quotes, backslashes and control characters
/// are replaced so the value stays one well-formed quoted-string.
fn content_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}

async fn get_export(
    Query(params): Query<ExportQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let result = state.sessions.with_session(params.session, |session| {
        let filename = session.filename().unwrap_or("export.csv").to_string();
        export::export(
            session.displayed.as_ref(),
            &filename,
            Local::now().naive_local(),
        )
    });
    let Some(result) = result else {
        return unknown_session(params.session);
    };
    match result {
        Ok(file) => (
            [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    content_disposition(&file.filename),
                ),
            ],
            file.bytes,
        )
            .into_response(),
        Err(DxError::NoDataToExport) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, user_message(&e)),
    }
}
