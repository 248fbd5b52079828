use anyhow::Context;
use price_scout::api::{self, AppState};
use price_scout::config::{Config, SourceKind};
use price_scout::notifier::{EmailNotifier, LogNotifier, Notifier};
use price_scout::scrapers::{MockPriceSource, PageScraper, PriceSource};
use price_scout::store::{ListingStore, MemoryStore, PgStore};
use price_scout::sweep::Sweeper;
use price_scout::tracker::PriceTracker;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("🏷️ Price Scout");
    info!("==============");

    let config = Config::from_env().context("Invalid configuration")?;

    let store: Arc<dyn ListingStore> = match &config.database_url {
        Some(url) => Arc::new(PgStore::connect(url).await?),
        None => {
            warn!("DATABASE_URL not set, using in-memory store (data is lost on exit)");
            Arc::new(MemoryStore::new())
        }
    };

    let source: Arc<dyn PriceSource> = match config.price_source {
        SourceKind::Http => Arc::new(
            PageScraper::with_options(config.fetch.clone()).context("Failed to create page scraper")?,
        ),
        SourceKind::Mock => {
            info!("Using mock price source");
            Arc::new(MockPriceSource::with_drift())
        }
    };

    let notifier: Arc<dyn Notifier> = match &config.mail_relay {
        Some(relay) => {
            info!("📧 Sending alerts through {}", relay.url);
            Arc::new(EmailNotifier::new(relay.clone()).context("Failed to create email notifier")?)
        }
        None => {
            warn!("MAIL_RELAY_URL not set, alerts will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let tracker = Arc::new(PriceTracker::new(store, notifier, source));

    // Keep the scheduler handle alive for the lifetime of the server
    let _scheduler = if config.scheduler_enabled {
        let sweeper = Arc::new(Sweeper::new(tracker.clone(), config.sweep_delay));
        Some(sweeper.schedule(&config.sweep_cron).await?)
    } else {
        info!("Scheduler disabled");
        None
    };

    let app = api::router(AppState::new(tracker), config.static_dir.as_deref());

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("🚀 Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}
