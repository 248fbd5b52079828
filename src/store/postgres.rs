use super::ListingStore;
use crate::error::{Result, TrackerError};
use crate::models::{
    Alert, AlertFilter, AlertType, CategoryCount, Listing, ListingFilter, NewAlert, NewListing,
    PriceHistoryEntry, Stats,
};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use tracing::info;

const LISTING_COLUMNS: &str =
    "id, url, title, current_price, location, category, status, last_checked, created_at";
const ALERT_COLUMNS: &str =
    "id, listing_id, email, target_price, alert_type, active, triggered_at, created_at";

#[derive(FromRow)]
struct ListingRow {
    id: i64,
    url: String,
    title: String,
    current_price: f64,
    location: Option<String>,
    category: Option<String>,
    status: String,
    last_checked: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ListingRow> for Listing {
    type Error = TrackerError;

    fn try_from(row: ListingRow) -> Result<Self> {
        let status = row
            .status
            .parse()
            .map_err(|e: String| TrackerError::Store(sqlx::Error::Decode(e.into())))?;
        Ok(Listing {
            id: row.id,
            url: row.url,
            title: row.title,
            current_price: row.current_price,
            location: row.location,
            category: row.category,
            status,
            last_checked: row.last_checked,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct AlertRow {
    id: i64,
    listing_id: i64,
    email: String,
    target_price: f64,
    alert_type: String,
    active: bool,
    triggered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AlertRow> for Alert {
    type Error = TrackerError;

    fn try_from(row: AlertRow) -> Result<Self> {
        let alert_type: AlertType = row
            .alert_type
            .parse()
            .map_err(|e: String| TrackerError::Store(sqlx::Error::Decode(e.into())))?;
        Ok(Alert {
            id: row.id,
            listing_id: row.listing_id,
            email: row.email,
            target_price: row.target_price,
            alert_type,
            active: row.active,
            triggered_at: row.triggered_at,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct HistoryRow {
    id: i64,
    listing_id: i64,
    price: f64,
    recorded_at: DateTime<Utc>,
}

impl From<HistoryRow> for PriceHistoryEntry {
    fn from(row: HistoryRow) -> Self {
        PriceHistoryEntry {
            id: row.id,
            listing_id: row.listing_id,
            price: row.price,
            recorded_at: row.recorded_at,
        }
    }
}

fn into_listings(rows: Vec<ListingRow>) -> Result<Vec<Listing>> {
    rows.into_iter().map(Listing::try_from).collect()
}

fn into_alerts(rows: Vec<AlertRow>) -> Result<Vec<Alert>> {
    rows.into_iter().map(Alert::try_from).collect()
}

/// Postgres-backed store
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and bring the schema up to date
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        if !database_url.starts_with("postgres://") && !database_url.starts_with("postgresql://") {
            anyhow::bail!("DATABASE_URL must start with postgres:// or postgresql://");
        }

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        info!("Connected to PostgreSQL, migrations applied");
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl ListingStore for PgStore {
    async fn create_listing(&self, new: &NewListing) -> Result<Listing> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ListingRow>(&format!(
            r#"
            INSERT INTO listings (url, title, current_price, location, category)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {LISTING_COLUMNS}
            "#
        ))
        .bind(&new.url)
        .bind(&new.title)
        .bind(new.price)
        .bind(&new.location)
        .bind(&new.category)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => {
                TrackerError::Conflict(format!("{} is already tracked", new.url))
            }
            _ => TrackerError::Store(e),
        })?;

        sqlx::query("INSERT INTO price_history (listing_id, price, recorded_at) VALUES ($1, $2, $3)")
            .bind(row.id)
            .bind(row.current_price)
            .bind(row.created_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn get_listing(&self, id: i64) -> Result<Option<Listing>> {
        sqlx::query_as::<_, ListingRow>(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Listing::try_from)
        .transpose()
    }

    async fn list_listings(&self, filter: &ListingFilter) -> Result<Vec<Listing>> {
        let rows = sqlx::query_as::<_, ListingRow>(&format!(
            r#"
            SELECT {LISTING_COLUMNS} FROM listings
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::TEXT IS NULL OR category = $2)
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(&filter.category)
        .fetch_all(&self.pool)
        .await?;

        into_listings(rows)
    }

    async fn list_active_listings(&self) -> Result<Vec<Listing>> {
        let rows = sqlx::query_as::<_, ListingRow>(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings WHERE status = 'active' ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        into_listings(rows)
    }

    async fn delete_listing(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM listings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_listing_price(&self, id: i64, price: f64, checked_at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE listings SET current_price = $1, last_checked = $2 WHERE id = $3")
            .bind(price)
            .bind(checked_at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(TrackerError::listing_not_found(id));
        }
        Ok(())
    }

    async fn record_price(
        &self,
        id: i64,
        price: f64,
        checked_at: DateTime<Utc>,
    ) -> Result<Option<PriceHistoryEntry>> {
        let mut tx = self.pool.begin().await?;

        let previous: f64 =
            sqlx::query_scalar("SELECT current_price FROM listings WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| TrackerError::listing_not_found(id))?;

        sqlx::query("UPDATE listings SET current_price = $1, last_checked = $2 WHERE id = $3")
            .bind(price)
            .bind(checked_at)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let entry = if previous != price {
            let row = sqlx::query_as::<_, HistoryRow>(
                r#"
                INSERT INTO price_history (listing_id, price, recorded_at)
                VALUES ($1, $2, $3)
                RETURNING id, listing_id, price, recorded_at
                "#,
            )
            .bind(id)
            .bind(price)
            .bind(checked_at)
            .fetch_one(&mut *tx)
            .await?;
            Some(row.into())
        } else {
            None
        };

        tx.commit().await?;
        Ok(entry)
    }

    async fn append_history(
        &self,
        listing_id: i64,
        price: f64,
        recorded_at: DateTime<Utc>,
    ) -> Result<PriceHistoryEntry> {
        let row = sqlx::query_as::<_, HistoryRow>(
            r#"
            INSERT INTO price_history (listing_id, price, recorded_at)
            VALUES ($1, $2, $3)
            RETURNING id, listing_id, price, recorded_at
            "#,
        )
        .bind(listing_id)
        .bind(price)
        .bind(recorded_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_foreign_key_violation() => TrackerError::listing_not_found(listing_id),
            _ => TrackerError::Store(e),
        })?;

        Ok(row.into())
    }

    async fn get_history(&self, listing_id: i64) -> Result<Vec<PriceHistoryEntry>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT id, listing_id, price, recorded_at FROM price_history
            WHERE listing_id = $1
            ORDER BY recorded_at ASC, id ASC
            "#,
        )
        .bind(listing_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PriceHistoryEntry::from).collect())
    }

    async fn create_alert(&self, new: &NewAlert) -> Result<Alert> {
        let row = sqlx::query_as::<_, AlertRow>(&format!(
            r#"
            INSERT INTO alerts (listing_id, email, target_price, alert_type)
            VALUES ($1, $2, $3, $4)
            RETURNING {ALERT_COLUMNS}
            "#
        ))
        .bind(new.listing_id)
        .bind(&new.email)
        .bind(new.target_price)
        .bind(new.alert_type.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_foreign_key_violation() => TrackerError::listing_not_found(new.listing_id),
            _ => TrackerError::Store(e),
        })?;

        row.try_into()
    }

    async fn list_alerts(&self, filter: &AlertFilter) -> Result<Vec<Alert>> {
        let rows = sqlx::query_as::<_, AlertRow>(&format!(
            r#"
            SELECT {ALERT_COLUMNS} FROM alerts
            WHERE ($1::BIGINT IS NULL OR listing_id = $1)
              AND ($2::BOOLEAN IS NULL OR active = $2)
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(filter.listing_id)
        .bind(filter.active)
        .fetch_all(&self.pool)
        .await?;

        into_alerts(rows)
    }

    async fn get_active_alerts(&self, listing_id: i64) -> Result<Vec<Alert>> {
        let rows = sqlx::query_as::<_, AlertRow>(&format!(
            "SELECT {ALERT_COLUMNS} FROM alerts WHERE listing_id = $1 AND active = TRUE ORDER BY id ASC"
        ))
        .bind(listing_id)
        .fetch_all(&self.pool)
        .await?;

        into_alerts(rows)
    }

    async fn deactivate_alert(&self, alert_id: i64, triggered_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE alerts SET active = FALSE, triggered_at = $1 WHERE id = $2 AND active = TRUE",
        )
        .bind(triggered_at)
        .bind(alert_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn stats(&self) -> Result<Stats> {
        let (total_listings, active_listings, average_price): (i64, i64, Option<f64>) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE status = 'active'),
                   AVG(current_price) FILTER (WHERE status = 'active')
            FROM listings
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let (total_alerts, active_alerts, triggered_alerts): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE active),
                   COUNT(*) FILTER (WHERE triggered_at IS NOT NULL)
            FROM alerts
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let history_entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM price_history")
            .fetch_one(&self.pool)
            .await?;

        let by_category: Vec<(Option<String>, i64)> = sqlx::query_as(
            "SELECT category, COUNT(*) FROM listings GROUP BY category ORDER BY COUNT(*) DESC, category ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(Stats {
            total_listings,
            active_listings,
            total_alerts,
            active_alerts,
            triggered_alerts,
            history_entries,
            average_price,
            by_category: by_category
                .into_iter()
                .map(|(category, count)| CategoryCount { category, count })
                .collect(),
        })
    }
}
