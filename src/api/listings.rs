use super::{ApiResult, AppState};
use crate::error::{validate_price, TrackerError};
use crate::models::{Alert, AlertFilter, Listing, ListingFilter, NewListing, PriceHistoryEntry};
use crate::tracker::IngestOutcome;
use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct CreateListingRequest {
    pub url: Option<String>,
    pub title: Option<String>,
    pub price: Option<f64>,
    pub location: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckRequest {
    pub price: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ListingDetail {
    #[serde(flatten)]
    pub listing: Listing,
    pub history: Vec<PriceHistoryEntry>,
    pub alerts: Vec<Alert>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn validate_url(url: Option<String>) -> Result<String, TrackerError> {
    let url = non_empty(url).ok_or_else(|| TrackerError::Validation("url is required".to_string()))?;
    let parsed = Url::parse(&url)
        .map_err(|e| TrackerError::Validation(format!("url is not valid: {}", e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(TrackerError::Validation("url must be http or https".to_string()));
    }
    Ok(url)
}

pub async fn create_listing(
    State(state): State<AppState>,
    payload: Result<Json<CreateListingRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Listing>)> {
    let Json(req) = payload.map_err(|e| TrackerError::Validation(e.body_text()))?;
    let url = validate_url(req.url)?;
    if let Some(price) = req.price {
        validate_price("price", price)?;
    }

    let location = non_empty(req.location);
    let category = non_empty(req.category);

    let new = match (non_empty(req.title), req.price) {
        (Some(title), Some(price)) => NewListing {
            url,
            title,
            price,
            location,
            category,
        },
        // Fill the gaps from the page itself
        (title, price) => {
            let scraped = state.tracker.source().fetch_listing(&url).await?;
            NewListing {
                title: title.or(scraped.title).unwrap_or_else(|| url.clone()),
                url,
                price: price.unwrap_or(scraped.price),
                location: location.or(scraped.location),
                category: category.or(scraped.category),
            }
        }
    };
    validate_price("price", new.price)?;

    let listing = state.tracker.store().create_listing(&new).await?;

    info!("➕ Tracking listing {}: {} ({:.2})", listing.id, listing.title, listing.current_price);
    Ok((StatusCode::CREATED, Json(listing)))
}

pub async fn list_listings(
    State(state): State<AppState>,
    filter: Result<Query<ListingFilter>, QueryRejection>,
) -> ApiResult<Json<Vec<Listing>>> {
    let Query(filter) = filter.map_err(|e| TrackerError::Validation(e.body_text()))?;
    Ok(Json(state.tracker.store().list_listings(&filter).await?))
}

pub async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ListingDetail>> {
    let store = state.tracker.store();
    let listing = store
        .get_listing(id)
        .await?
        .ok_or_else(|| TrackerError::listing_not_found(id))?;
    let history = store.get_history(id).await?;
    let alerts = store
        .list_alerts(&AlertFilter {
            listing_id: Some(id),
            active: None,
        })
        .await?;

    Ok(Json(ListingDetail {
        listing,
        history,
        alerts,
    }))
}

pub async fn delete_listing(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !state.tracker.store().delete_listing(id).await? {
        return Err(TrackerError::listing_not_found(id).into());
    }
    info!("🗑️ Stopped tracking listing {}", id);
    Ok(StatusCode::NO_CONTENT)
}

/// Re-check one listing now. A `{"price": n}` body records that price
/// instead of asking the price source.
pub async fn check_listing(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Bytes,
) -> ApiResult<Json<IngestOutcome>> {
    let req: CheckRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CheckRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| TrackerError::Validation(format!("invalid body: {}", e)))?
    };

    let outcome = match req.price {
        Some(price) => state.tracker.ingest(id, price).await?,
        None => state.tracker.check(id).await?,
    };
    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert_eq!(
            validate_url(Some(" https://shop.test/1 ".to_string())).unwrap(),
            "https://shop.test/1"
        );
        assert!(matches!(validate_url(None), Err(TrackerError::Validation(_))));
        assert!(matches!(validate_url(Some("".to_string())), Err(TrackerError::Validation(_))));
        assert!(matches!(
            validate_url(Some("not a url".to_string())),
            Err(TrackerError::Validation(_))
        ));
        assert!(matches!(
            validate_url(Some("ftp://shop.test/1".to_string())),
            Err(TrackerError::Validation(_))
        ));
    }
}
