//! JSON API used by the web UI

mod alerts;
mod listings;

use crate::error::TrackerError;
use crate::models::Stats;
use crate::tracker::PriceTracker;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<PriceTracker>,
}

impl AppState {
    pub fn new(tracker: Arc<PriceTracker>) -> Self {
        Self { tracker }
    }
}

/// Error body returned by every handler
#[derive(Debug)]
pub struct ApiError(TrackerError);

impl From<TrackerError> for ApiError {
    fn from(e: TrackerError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            TrackerError::NotFound(_) => StatusCode::NOT_FOUND,
            TrackerError::Validation(_) => StatusCode::BAD_REQUEST,
            TrackerError::Conflict(_) => StatusCode::CONFLICT,
            TrackerError::Upstream(_) => StatusCode::BAD_GATEWAY,
            TrackerError::Store(_) | TrackerError::Notify(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn stats(State(state): State<AppState>) -> ApiResult<Json<Stats>> {
    Ok(Json(state.tracker.store().stats().await?))
}

pub fn router(state: AppState, static_dir: Option<&Path>) -> Router {
    let api = Router::new()
        .route("/api/health", get(health))
        .route(
            "/api/listings",
            get(listings::list_listings).post(listings::create_listing),
        )
        .route(
            "/api/listings/{id}",
            get(listings::get_listing).delete(listings::delete_listing),
        )
        .route("/api/listings/{id}/check", post(listings::check_listing))
        .route("/api/alerts", get(alerts::list_alerts).post(alerts::create_alert))
        .route("/api/stats", get(stats))
        .with_state(state);

    let app = match static_dir {
        Some(dir) => api.fallback_service(ServeDir::new(dir)),
        None => api,
    };

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
