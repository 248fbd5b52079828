use crate::notifier::MailRelayConfig;
use crate::scrapers::FetchOptions;
use anyhow::{bail, Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Which price source feeds the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Mock,
    Http,
}

impl FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mock" => Ok(SourceKind::Mock),
            "http" | "page" => Ok(SourceKind::Http),
            other => bail!("PRICE_SOURCE must be 'mock' or 'http', got '{}'", other),
        }
    }
}

/// Runtime settings, read from the environment (and `.env` if present)
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub scheduler_enabled: bool,
    pub sweep_cron: String,
    pub sweep_delay: Duration,
    pub price_source: SourceKind,
    pub fetch: FetchOptions,
    pub mail_relay: Option<MailRelayConfig>,
    pub static_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup, so tests don't have to touch the process env
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = var("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:3001".to_string())
            .parse()
            .context("BIND_ADDR must be host:port")?;

        let scheduler_enabled = var("SCHEDULER_ENABLED")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(true);

        let sweep_delay_ms: u64 = match var("SWEEP_DELAY_MS") {
            Some(v) => v.parse().context("SWEEP_DELAY_MS must be a number of milliseconds")?,
            None => 2000,
        };

        let price_source = match var("PRICE_SOURCE") {
            Some(v) => v.parse()?,
            None => SourceKind::Mock,
        };

        let mut fetch = FetchOptions::default();
        if let Some(v) = var("HTTP_TIMEOUT_SECS") {
            fetch.timeout = Duration::from_secs(v.parse().context("HTTP_TIMEOUT_SECS must be a number")?);
        }
        if let Some(v) = var("USER_AGENT") {
            fetch.user_agent = v;
        }

        let mail_relay = var("MAIL_RELAY_URL").map(|url| MailRelayConfig {
            url,
            token: var("MAIL_RELAY_TOKEN"),
            from: var("MAIL_FROM").unwrap_or_else(|| "alerts@price-scout.local".to_string()),
        });

        Ok(Self {
            database_url: var("DATABASE_URL"),
            bind_addr,
            scheduler_enabled,
            sweep_cron: var("SWEEP_CRON").unwrap_or_else(|| "0 0 */6 * * *".to_string()),
            sweep_delay: Duration::from_millis(sweep_delay_ms),
            price_source,
            fetch,
            mail_relay,
            static_dir: var("STATIC_DIR").map(PathBuf::from),
        })
    }
}
