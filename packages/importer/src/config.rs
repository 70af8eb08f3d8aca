//! Application configuration loaded from the environment.

use std::str::FromStr;
use std::time::Duration;

use actors::PoolConfig;
use db::DbConfig;
use feed::{DEFAULT_USER_AGENT, FetcherConfig};
use jobfeed_core::QueueSettings;
use thiserror::Error;

/// Feeds imported when a trigger names no sources.
pub const DEFAULT_SOURCES: [&str; 9] = [
    "https://jobicy.com/?feed=job_feed",
    "https://jobicy.com/?feed=job_feed&job_categories=smm&job_types=full-time",
    "https://jobicy.com/?feed=job_feed&job_categories=seller&job_types=full-time&search_region=france",
    "https://jobicy.com/?feed=job_feed&job_categories=design-multimedia",
    "https://jobicy.com/?feed=job_feed&job_categories=data-science",
    "https://jobicy.com/?feed=job_feed&job_categories=copywriting",
    "https://jobicy.com/?feed=job_feed&job_categories=business",
    "https://jobicy.com/?feed=job_feed&job_categories=management",
    "https://www.higheredjobs.com/rss/articleFeed.cfm",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}={value}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("{0} must be set together with {1}")]
    Incomplete(&'static str, &'static str),
}

/// Everything the importer needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db: DbConfig,
    pub queue: QueueSettings,
    pub pool: PoolConfig,
    pub fetcher: FetcherConfig,
    /// Source feeds used when a trigger names none.
    pub sources: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db: DbConfig::default(),
            queue: QueueSettings::default(),
            pool: PoolConfig::default(),
            fetcher: FetcherConfig::default(),
            sources: DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl AppConfig {
    /// Build a config from environment variables, loading `.env` first if present.
    ///
    /// Database:
    /// - `DB_ENDPOINT` (default: `mem://`; e.g. `rocksdb://./data/jobfeed`)
    /// - `DB_NAMESPACE`, `DB_DATABASE` (default: `jobfeed`, `main`)
    /// - `DB_USER`, `DB_PASS` (optional root credentials, both or neither)
    ///
    /// Queue and workers:
    /// - `JOB_CONCURRENCY` (default: 5)
    /// - `JOB_ATTEMPTS` (default: 3)
    /// - `BACKOFF_DELAY` in ms (default: 2000)
    /// - `REMOVE_ON_COMPLETE`, `REMOVE_ON_FAIL` (default: 100, 50)
    ///
    /// Fetching:
    /// - `FETCH_TIMEOUT_SECS` (default: 30)
    /// - `FETCH_USER_AGENT`
    /// - `FETCH_MAX_BYTES` (default: 10 MiB)
    /// - `IMPORT_SOURCES` (comma-separated feed URLs)
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is normal.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).and_then(non_empty);
        let mut cfg = Self::default();

        if let Some(endpoint) = var("DB_ENDPOINT") {
            cfg.db.endpoint = endpoint;
        }
        if let Some(namespace) = var("DB_NAMESPACE") {
            cfg.db.namespace = namespace;
        }
        if let Some(database) = var("DB_DATABASE") {
            cfg.db.database = database;
        }
        cfg.db.credentials = match (var("DB_USER"), var("DB_PASS")) {
            (Some(user), Some(pass)) => Some((user, pass)),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Incomplete("DB_USER", "DB_PASS")),
            (None, Some(_)) => return Err(ConfigError::Incomplete("DB_PASS", "DB_USER")),
        };

        if let Some(n) = parse_var::<usize>("JOB_CONCURRENCY", var("JOB_CONCURRENCY"))? {
            cfg.pool.concurrency = at_least_one("JOB_CONCURRENCY", n)?;
        }
        if let Some(n) = parse_var::<u32>("JOB_ATTEMPTS", var("JOB_ATTEMPTS"))? {
            cfg.queue.max_attempts = at_least_one("JOB_ATTEMPTS", n)?;
        }
        if let Some(ms) = parse_var("BACKOFF_DELAY", var("BACKOFF_DELAY"))? {
            cfg.queue.backoff_base_ms = ms;
        }
        if let Some(n) = parse_var("REMOVE_ON_COMPLETE", var("REMOVE_ON_COMPLETE"))? {
            cfg.queue.keep_completed = n;
        }
        if let Some(n) = parse_var("REMOVE_ON_FAIL", var("REMOVE_ON_FAIL"))? {
            cfg.queue.keep_failed = n;
        }

        if let Some(secs) = parse_var::<u64>("FETCH_TIMEOUT_SECS", var("FETCH_TIMEOUT_SECS"))? {
            cfg.fetcher.timeout = Duration::from_secs(at_least_one("FETCH_TIMEOUT_SECS", secs)?);
        }
        cfg.fetcher.user_agent = var("FETCH_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.into());
        if let Some(bytes) = parse_var::<usize>("FETCH_MAX_BYTES", var("FETCH_MAX_BYTES"))? {
            cfg.fetcher.max_body_bytes = at_least_one("FETCH_MAX_BYTES", bytes)?;
        }

        if let Some(sources) = var("IMPORT_SOURCES") {
            cfg.sources = sources
                .split(',')
                .filter_map(|s| non_empty(s.to_string()))
                .collect();
        }

        Ok(cfg)
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_var<T>(name: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(value) = value else {
        return Ok(None);
    };
    value
        .parse()
        .map(Some)
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            var: name,
            reason: e.to_string(),
            value,
        })
}

fn at_least_one<T>(name: &'static str, n: T) -> Result<T, ConfigError>
where
    T: PartialOrd + From<u8> + ToString,
{
    if n < T::from(1) {
        return Err(ConfigError::InvalidValue {
            var: name,
            value: n.to_string(),
            reason: "must be at least 1".into(),
        });
    }
    Ok(n)
}
