pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod notifier;
pub mod scrapers;
pub mod store;
pub mod sweep;
pub mod tracker;

pub use error::TrackerError;
pub use tracker::{IngestOutcome, PriceTracker};
