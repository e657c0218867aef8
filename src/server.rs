use crate::config::AppConfig;
use crate::data::Dataset;
use crate::error::{RenderError, SelectionError};
use crate::filter::{derive_view, resolve_selection};
use crate::render::{render_dashboard, DashboardPage, MapSource};
use crate::types::{DerivedView, YEARS};
use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const BOUNDARIES_PATH: &str = "/api/boundaries";

pub struct AppState {
    pub dataset: Dataset,
    /// Serialized once at startup; the loaded data never changes.
    pub boundaries_geojson: String,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(config: AppConfig, dataset: Dataset) -> Self {
        Self {
            boundaries_geojson: dataset.boundaries.to_geojson().to_string(),
            dataset,
            config,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SelectionParams {
    year: Option<u16>,
    state: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct OptionsResponse {
    years: Vec<u16>,
    states: Vec<String>,
}

impl IntoResponse for SelectionError {
    fn into_response(self) -> Response {
        let status = match self {
            SelectionError::NotFound(_) => StatusCode::NOT_FOUND,
            SelectionError::YearOutOfRange { .. } => StatusCode::BAD_REQUEST,
            SelectionError::EmptyTable => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error!(error = %self, "Selection does not match the loaded table");
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

impl IntoResponse for RenderError {
    fn into_response(self) -> Response {
        error!(error = %self, "Failed to render dashboard");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(dashboard_handler))
        .route("/api/options", get(options_handler))
        .route("/api/view", get(view_handler))
        .route(BOUNDARIES_PATH, get(boundaries_handler))
        .route("/healthz", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: AppConfig, dataset: Dataset) -> Result<()> {
    info!(
        states = dataset.table.len(),
        boundaries = dataset.boundaries.boundaries.len(),
        "Preparing dashboard state"
    );
    let state = Arc::new(AppState::new(config.clone(), dataset));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr.as_str())
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Serving dashboard on http://{addr}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn selected_view(state: &AppState, params: &SelectionParams) -> Result<DerivedView, SelectionError> {
    let table = &state.dataset.table;
    let selection = resolve_selection(table, params.year, params.state.as_deref())?;
    derive_view(table, &selection)
}

async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SelectionParams>,
) -> Result<Html<String>, Response> {
    // An empty table still gets a page, with the no-data notice in every panel
    let view = match selected_view(&state, &params) {
        Ok(view) => Some(view),
        Err(SelectionError::EmptyTable) => None,
        Err(err) => return Err(err.into_response()),
    };
    let states = state.dataset.table.state_names();

    render_dashboard(&DashboardPage {
        states: &states,
        view: view.as_ref(),
        map: &state.config.map,
        boundaries: MapSource::Url(BOUNDARIES_PATH),
        form_action: Some("/"),
    })
    .map(Html)
    .map_err(IntoResponse::into_response)
}

async fn view_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SelectionParams>,
) -> Result<Json<DerivedView>, SelectionError> {
    selected_view(&state, &params).map(Json)
}

async fn options_handler(State(state): State<Arc<AppState>>) -> Json<OptionsResponse> {
    Json(OptionsResponse {
        years: YEARS.collect(),
        states: state
            .dataset
            .table
            .state_names()
            .into_iter()
            .map(str::to_string)
            .collect(),
    })
}

async fn boundaries_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/geo+json")],
        state.boundaries_geojson.clone(),
    )
}

async fn health_handler() -> &'static str {
    "ok"
}
