use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::num::{NonZeroU32, NonZeroU64};
use std::str::FromStr;

const DEFAULT_DATABASE_URL: &str = "sqlite:./startup_scout.sqlite?mode=rwc";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_PAGE_SIZE: u64 = 20;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Per-IP request budget: `burst` requests, replenished one per `period / burst`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub period_secs: NonZeroU64,
    pub burst: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub page_size: u64,
    pub max_connections: u32,
    /// `None` disables rate limiting entirely.
    pub rate_limit: Option<RateLimitConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            page_size: DEFAULT_PAGE_SIZE,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            rate_limit: None,
        }
    }
}

impl AppConfig {
    /// Reads the configuration from the process environment.
    ///
    /// Call `dotenvy::dotenv()` beforehand if a `.env` file should be honoured.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let bind_addr = parse_or(&lookup, "BIND_ADDR", DEFAULT_BIND_ADDR.parse::<SocketAddr>()?)?;

        let page_size: u64 = parse_or(&lookup, "PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        if page_size == 0 {
            anyhow::bail!("PAGE_SIZE must be greater than zero");
        }
        let max_connections: u32 =
            parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;

        let period_secs: u64 = parse_or(&lookup, "RATE_LIMIT_PERIOD_SECS", 60)?;
        let burst: u32 = parse_or(&lookup, "RATE_LIMIT_BURST", 10)?;
        // A zero burst or period switches the limiter off
        let rate_limit = match (NonZeroU64::new(period_secs), NonZeroU32::new(burst)) {
            (Some(period_secs), Some(burst)) => Some(RateLimitConfig { period_secs, burst }),
            _ => None,
        };

        Ok(Self {
            database_url,
            bind_addr,
            page_size,
            max_connections,
            rate_limit,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}
