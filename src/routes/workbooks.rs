use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{header, Method},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use crate::{
    AppState,
    error::AppError,
    models::{Column, Dataset, Value},
    services::{
        aggregator::{self, AggregationResult, Granularity, SeriesRequest, TimeSeries},
        dashboard::{self, DashboardMode, HistoryDashboard, OperationDetail, OperationsDashboard},
        detect,
        excel::{SheetSummary, Workbook},
        export, filter,
        profiler::{self, ProfileReport},
        view::ViewConfig,
    },
};
use tower_http::cors::{CorsLayer, Any};

pub fn routes(max_file_size: usize) -> Router<Arc<AppState>> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/workbooks", post(upload_workbook))
        .route("/workbooks/:id/profile", post(profile))
        .route("/workbooks/:id/counts", post(counts))
        .route("/workbooks/:id/series", post(series))
        .route("/workbooks/:id/filter", post(filter_rows))
        .route("/workbooks/:id/dashboard", post(dashboard_view))
        .route("/workbooks/:id/operations/detail", post(operation_detail))
        .route("/workbooks/:id/export", post(export_csv))
        .layer(DefaultBodyLimit::max(max_file_size))
        .layer(cors)
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    workbook_id: String,
    sheets: Vec<SheetSummary>,
    primary_sheet: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ViewRequest {
    sheet: Option<String>,
    config: ViewConfig,
}

#[derive(Debug, Deserialize)]
pub struct CountsRequest {
    sheet: Option<String>,
    column: String,
    top_n: Option<usize>,
    #[serde(default)]
    config: ViewConfig,
}

#[derive(Debug, Deserialize)]
pub struct SeriesBody {
    sheet: Option<String>,
    /// Detected when absent.
    time_column: Option<String>,
    granularity: Granularity,
    category_column: Option<String>,
    top_n: Option<usize>,
    #[serde(default)]
    config: ViewConfig,
}

#[derive(Debug, Deserialize)]
pub struct FilterRequest {
    sheet: Option<String>,
    #[serde(default)]
    config: ViewConfig,
    #[serde(default)]
    offset: usize,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct FilterResponse {
    sheet: String,
    total_rows: usize,
    matched_rows: usize,
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
pub struct DashboardRequest {
    sheet: Option<String>,
    #[serde(default)]
    mode: DashboardMode,
    #[serde(default)]
    config: ViewConfig,
}

#[derive(Debug, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DashboardView {
    Operations(OperationsDashboard),
    History(HistoryDashboard),
}

#[derive(Debug, Deserialize)]
pub struct DetailRequest {
    sheet: Option<String>,
    operation: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExportTarget {
    Profile,
    Filtered,
    Counts { column: String },
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    sheet: Option<String>,
    #[serde(default)]
    config: ViewConfig,
    target: ExportTarget,
}

/// The named sheet, or the primary one when no name is given.
fn select_sheet<'a>(workbook: &'a Workbook, sheet: Option<&str>) -> Result<(&'a str, &'a Dataset), AppError> {
    let found = match sheet {
        Some(name) => workbook.sheet(name),
        None => workbook.primary_sheet(),
    };
    found
        .map(|s| (s.name.as_str(), &s.dataset))
        .ok_or_else(|| AppError::SheetNotFound(sheet.unwrap_or("<primary>").to_string()))
}

fn require_column<'a>(dataset: &'a Dataset, name: &str) -> Result<&'a Column, AppError> {
    dataset
        .column(name)
        .ok_or_else(|| AppError::ColumnNotFound(name.to_string()))
}

async fn upload_workbook(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<UploadResponse>, AppError> {
    if body.is_empty() {
        return Err(AppError::InvalidInput("Empty upload".to_string()));
    }
    tracing::info!("Received workbook upload, size: {}KB", body.len() / 1024);

    let cache = state.cache.clone();
    let workbook = tokio::task::spawn_blocking(move || cache.load(body))
        .await
        .map_err(|e| AppError::Internal(format!("Workbook loading task failed: {}", e)))??;

    Ok(Json(UploadResponse {
        workbook_id: workbook.id.clone(),
        sheets: workbook.summaries(),
        primary_sheet: workbook.primary_sheet().map(|s| s.name.clone()),
    }))
}

async fn profile(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<ViewRequest>,
) -> Result<Json<ProfileReport>, AppError> {
    let workbook = state.cache.get(&id)?;
    let (_, dataset) = select_sheet(&workbook, request.sheet.as_deref())?;
    let view = filter::filter(dataset, &request.config.filters)?;
    let id_col = detect::resolve(&view, request.config.id_column.as_deref(), detect::find_id_column);

    Ok(Json(profiler::profile(&view, id_col, request.config.sort)))
}

async fn counts(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<CountsRequest>,
) -> Result<Json<AggregationResult>, AppError> {
    let workbook = state.cache.get(&id)?;
    let (_, dataset) = select_sheet(&workbook, request.sheet.as_deref())?;
    let view = filter::filter(dataset, &request.config.filters)?;
    let column = require_column(&view, &request.column)?;

    let result = aggregator::count_by(&view, column)
        .ok_or_else(|| AppError::ColumnNotFound(request.column.clone()))?;
    Ok(Json(match request.top_n {
        Some(n) => result.head(n),
        None => result,
    }))
}

async fn series(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<SeriesBody>,
) -> Result<Json<TimeSeries>, AppError> {
    let workbook = state.cache.get(&id)?;
    let (_, dataset) = select_sheet(&workbook, request.sheet.as_deref())?;
    let view = filter::filter(dataset, &request.config.filters)?;

    let time_column = match request.time_column.as_deref().or(request.config.date_column.as_deref()) {
        Some(name) => require_column(&view, name)?,
        None => detect::find_date_column(&view)
            .ok_or_else(|| AppError::ColumnNotFound("<date column>".to_string()))?,
    };
    let category = request
        .category_column
        .as_deref()
        .map(|name| require_column(&view, name))
        .transpose()?;
    let top_n = category.map(|_| request.top_n.unwrap_or(state.config.default_top_n));

    let result = aggregator::time_series(&view, time_column, request.granularity, SeriesRequest { category, top_n })
        .ok_or_else(|| AppError::ColumnNotFound(time_column.name.clone()))?;
    tracing::debug!(
        "Series over {}: {} rows bucketed, {} without timestamp, {} outside top categories",
        time_column.name,
        result.bucketed_total(),
        result.unbucketed,
        result.excluded
    );
    Ok(Json(result))
}

async fn filter_rows(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<FilterRequest>,
) -> Result<Json<FilterResponse>, AppError> {
    let workbook = state.cache.get(&id)?;
    let (sheet, dataset) = select_sheet(&workbook, request.sheet.as_deref())?;
    let filtered = filter::filter(dataset, &request.config.filters)?;
    let shown = if request.config.columns.is_empty() {
        filtered.clone()
    } else {
        filtered.project(&request.config.columns)
    };

    let limit = request.limit.unwrap_or(usize::MAX);
    Ok(Json(FilterResponse {
        sheet: sheet.to_string(),
        total_rows: dataset.row_count(),
        matched_rows: filtered.row_count(),
        columns: shown.columns().to_vec(),
        rows: shown.rows().iter().skip(request.offset).take(limit).cloned().collect(),
    }))
}

#[axum::debug_handler]
async fn dashboard_view(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<DashboardRequest>,
) -> Result<Json<DashboardView>, AppError> {
    let start = std::time::Instant::now();
    let workbook = state.cache.get(&id)?;
    let (sheet, dataset) = select_sheet(&workbook, request.sheet.as_deref())?;
    let view = filter::filter(dataset, &request.config.filters)?;
    tracing::info!("Building {:?} dashboard for sheet {} ({} rows)", request.mode, sheet, view.row_count());

    let result = match request.mode {
        DashboardMode::Operations => DashboardView::Operations(dashboard::operations_dashboard(
            &view,
            &request.config,
            state.config.default_top_n,
        )),
        DashboardMode::History => DashboardView::History(dashboard::history_dashboard(&view, &request.config)),
    };
    tracing::info!("Dashboard built in {:?}", start.elapsed());
    Ok(Json(result))
}

async fn operation_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<DetailRequest>,
) -> Result<Json<OperationDetail>, AppError> {
    let workbook = state.cache.get(&id)?;
    let (_, dataset) = select_sheet(&workbook, request.sheet.as_deref())?;
    dashboard::operation_detail(dataset, &request.operation)
        .map(Json)
        .ok_or_else(|| AppError::ColumnNotFound("<operation column>".to_string()))
}

async fn export_csv(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<ExportRequest>,
) -> Result<impl IntoResponse, AppError> {
    let workbook = state.cache.get(&id)?;
    let (_, dataset) = select_sheet(&workbook, request.sheet.as_deref())?;
    let view = filter::filter(dataset, &request.config.filters)?;

    let (file_name, body) = match &request.target {
        ExportTarget::Profile => {
            let id_col = detect::resolve(&view, request.config.id_column.as_deref(), detect::find_id_column);
            let report = profiler::profile(&view, id_col, request.config.sort);
            ("column_quality.csv".to_string(), export::profile_csv(&report.columns)?)
        }
        ExportTarget::Filtered => ("filtered_rows.csv".to_string(), export::dataset_csv(&view)?),
        ExportTarget::Counts { column } => {
            let col = require_column(&view, column)?;
            let counts = aggregator::count_by(&view, col)
                .ok_or_else(|| AppError::ColumnNotFound(column.clone()))?;
            ("counts.csv".to_string(), export::aggregation_csv(&counts)?)
        }
    };
    tracing::info!("Exporting {} ({} bytes)", file_name, body.len());

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", file_name)),
        ],
        body,
    ))
}
