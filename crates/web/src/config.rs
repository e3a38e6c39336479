use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use storage::LedgerSettings;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_lock_timeout: Duration,
    pub reconcile_max_attempts: u32,
    pub reconcile_backoff: Duration,
    pub workout_cache_ttl: Duration,
    pub workout_cache_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: std::env::var("HOST").context("Cannot load HOST env variable")?,
            port: std::env::var("PORT")
                .context("PORT must be a number")?
                .parse()?,
            database_url: std::env::var("DATABASE_URL")
                .context("Cannot load DATABASE_URL env variable")?,
            db_max_connections: optional("DB_MAX_CONNECTIONS", 10)?,
            db_lock_timeout: Duration::from_millis(optional("DB_LOCK_TIMEOUT_MS", 5000)?),
            reconcile_max_attempts: optional("RECONCILE_MAX_ATTEMPTS", 3)?,
            reconcile_backoff: Duration::from_millis(optional("RECONCILE_BACKOFF_MS", 25)?),
            workout_cache_ttl: Duration::from_secs(optional("WORKOUT_CACHE_TTL_SECS", 300)?),
            workout_cache_capacity: optional("WORKOUT_CACHE_CAPACITY", 1024)?,
        })
    }

    pub fn ledger_settings(&self) -> LedgerSettings {
        LedgerSettings {
            max_attempts: self.reconcile_max_attempts,
            backoff: self.reconcile_backoff,
            workout_cache_ttl: self.workout_cache_ttl,
            workout_cache_capacity: self.workout_cache_capacity,
        }
    }
}

fn optional<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    parse_or(key, std::env::var(key).ok(), default)
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number, got {:?}", key, raw)),
        _ => Ok(default),
    }
}
