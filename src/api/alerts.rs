use super::{ApiResult, AppState};
use crate::error::{validate_price, TrackerError};
use crate::models::{Alert, AlertFilter, AlertType, NewAlert};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct CreateAlertRequest {
    pub listing_id: i64,
    pub email: Option<String>,
    pub target_price: f64,
    #[serde(default)]
    pub alert_type: AlertType,
}

fn validate_email(email: Option<String>) -> Result<String, TrackerError> {
    let email = email.map(|e| e.trim().to_string()).unwrap_or_default();
    match email.split_once('@') {
        Some((user, domain)) if !user.is_empty() && domain.contains('.') && !domain.ends_with('.') => {
            Ok(email)
        }
        _ => Err(TrackerError::Validation("a valid email is required".to_string())),
    }
}

pub async fn create_alert(
    State(state): State<AppState>,
    payload: Result<Json<CreateAlertRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Alert>)> {
    let Json(req) = payload.map_err(|e| TrackerError::Validation(e.body_text()))?;
    let email = validate_email(req.email)?;
    let target_price = validate_price("target_price", req.target_price)?;

    let store = state.tracker.store();
    if store.get_listing(req.listing_id).await?.is_none() {
        return Err(TrackerError::listing_not_found(req.listing_id).into());
    }

    let alert = store
        .create_alert(&NewAlert {
            listing_id: req.listing_id,
            email,
            target_price,
            alert_type: req.alert_type,
        })
        .await?;

    info!(
        "🔔 Alert {} set on listing {} at {:.2}",
        alert.id, alert.listing_id, alert.target_price
    );
    Ok((StatusCode::CREATED, Json(alert)))
}

pub async fn list_alerts(
    State(state): State<AppState>,
    filter: Result<Query<AlertFilter>, QueryRejection>,
) -> ApiResult<Json<Vec<Alert>>> {
    let Query(filter) = filter.map_err(|e| TrackerError::Validation(e.body_text()))?;
    Ok(Json(state.tracker.store().list_alerts(&filter).await?))
}
