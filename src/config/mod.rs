use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::analytics::QueryLimits;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub cors_allow_any: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    #[serde(default = "DatabaseConfig::default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Time allowed for the grouped store query
    #[serde(default = "AnalyticsConfig::default_query_timeout_ms")]
    pub query_timeout_ms: u64,
    /// Most buckets a single request may materialize
    #[serde(default = "AnalyticsConfig::default_max_buckets")]
    pub max_buckets: i64,
    /// Result cache TTL; 0 disables the cache
    #[serde(default = "AnalyticsConfig::default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "AnalyticsConfig::default_cache_max_entries")]
    pub cache_max_entries: u64,
}

impl DatabaseConfig {
    const fn default_max_connections() -> u32 {
        10
    }
}

impl AnalyticsConfig {
    const fn default_query_timeout_ms() -> u64 {
        10_000
    }

    const fn default_max_buckets() -> i64 {
        10_000
    }

    const fn default_cache_ttl_secs() -> u64 {
        5
    }

    const fn default_cache_max_entries() -> u64 {
        1_000
    }

    pub fn limits(&self) -> QueryLimits {
        QueryLimits {
            max_buckets: self.max_buckets,
            timeout: Duration::from_millis(self.query_timeout_ms),
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: Self::default_query_timeout_ms(),
            max_buckets: Self::default_max_buckets(),
            cache_ttl_secs: Self::default_cache_ttl_secs(),
            cache_max_entries: Self::default_cache_max_entries(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(v) => v
            .parse::<T>()
            .with_context(|| format!("{name} has invalid value '{v}'")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend_str =
            std::env::var("DATABASE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());

        let backend = match backend_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            "sqlite" => DatabaseBackend::Sqlite,
            other => {
                tracing::warn!(
                    "Unknown DATABASE_BACKEND '{other}', falling back to 'sqlite'. Supported values: sqlite, postgres"
                );
                DatabaseBackend::Sqlite
            }
        };

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./tally.db".to_string());
        let max_connections = env_parse(
            "DATABASE_MAX_CONNECTIONS",
            DatabaseConfig::default_max_connections(),
        )?;

        let api_host = std::env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let api_port = env_parse("API_PORT", 8080u16)?;

        let analytics = AnalyticsConfig {
            query_timeout_ms: env_parse(
                "ANALYTICS_QUERY_TIMEOUT_MS",
                AnalyticsConfig::default_query_timeout_ms(),
            )?,
            max_buckets: env_parse(
                "ANALYTICS_MAX_BUCKETS",
                AnalyticsConfig::default_max_buckets(),
            )?,
            cache_ttl_secs: env_parse(
                "ANALYTICS_CACHE_TTL_SECS",
                AnalyticsConfig::default_cache_ttl_secs(),
            )?,
            cache_max_entries: env_parse(
                "ANALYTICS_CACHE_MAX_ENTRIES",
                AnalyticsConfig::default_cache_max_entries(),
            )?,
        };

        let cors_allow_any = std::env::var("CORS_ALLOW_ANY")
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            analytics,
            cors_allow_any,
        })
    }
}
