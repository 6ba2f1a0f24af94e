//! HTTP boundary: service check, invoke, and settings endpoints

use crate::config::CounselConfig;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use counsel_agent::{RunDriver, RunOutcome, SettingsManager};
use counsel_core::{ConfigDocument, SessionKey};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub const SERVICE_STATUS: &str = "The signals service is up and running smoothly. All systems are green!";

pub struct AppState {
    pub driver: RunDriver,
    pub settings: SettingsManager,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(driver: RunDriver, settings: SettingsManager) -> Self {
        Self { driver, settings, started_at: Utc::now() }
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryInput {
    pub session_id: String,
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct SettingsInput {
    pub settings: Value,
}

/// Error body in the `{"detail": ...}` shape clients already parse.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self { status, detail: detail.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(service_check))
        .route("/invoke/:app", post(invoke_handler))
        .route("/settings/:app", get(get_settings_handler).post(update_settings_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}

pub async fn start_server(config: &CounselConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let bind_addr = config.bind_addr()?;

    info!("Counsel Gateway v{} starting", env!("CARGO_PKG_VERSION"));
    info!("  Listening on: {}", bind_addr);
    info!("  Settings:     {}", config.settings.dir.display());
    info!("  Prompts:      {}", config.prompts.dir.display());
    info!("  Model:        {}", config.model.name);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub async fn service_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": SERVICE_STATUS,
        "version": env!("CARGO_PKG_VERSION"),
        "started_at": state.started_at.to_rfc3339(),
        "apps": state.driver.cache().len(),
    }))
}

/// Changed settings rebuild the app before the query runs; unchanged ones
/// reuse the cached graph.
pub async fn invoke_handler(
    Path(app): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(input): Json<QueryInput>,
) -> Json<RunOutcome> {
    let settings = state.settings.fetch_and_compare(&app).await;
    let session = SessionKey::new(input.session_id);
    let outcome = state.driver.run(&app, &session, &input.query, settings).await;

    // A document that failed to build must be offered again on the next call.
    if outcome.is_build_failure() {
        state.settings.forget(&app);
    }
    Json(outcome)
}

pub async fn get_settings_handler(
    Path(app): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    match state.settings.fetch(&app).await {
        Ok(Some(settings)) => Ok(Json(settings.to_value())),
        Ok(None) => Err(ApiError::new(StatusCode::NOT_FOUND, "Settings not found")),
        Err(e) => {
            error!(app = %app, "Error fetching settings: {}", e);
            Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

pub async fn update_settings_handler(
    Path(app): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(input): Json<SettingsInput>,
) -> Result<Json<Value>, ApiError> {
    let settings = ConfigDocument::from_value(input.settings)
        .map_err(|e| ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    state.settings.upsert(&app, &settings).await.map_err(|e| {
        error!(app = %app, "Error updating settings: {}", e);
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(Json(json!({ "message": "Settings updated successfully" })))
}
