//! Environment-driven configuration. Missing optional settings degrade to
//! dev-mode components (in-memory store, stub search, no-op notifier) rather
//! than failing startup.

use std::time::Duration;

use anyhow::Context;
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub pipeline: PipelineSettings,
    pub search: SearchConfig,
    pub summarizer: SummarizerConfig,
    pub notifier: NotifierConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Postgres connection string; absent selects the in-memory store.
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl_days: i64,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub collector_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Absent selects the no-evidence stub provider.
    pub api_key: Option<String>,
    pub endpoint: Url,
}

#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    pub endpoint: Url,
    pub model: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Absent selects the no-op notifier.
    pub endpoint: Option<Url>,
    pub api_key: Option<String>,
    pub from: String,
}

const DEFAULT_SEARCH_ENDPOINT: &str = "https://serpapi.com/search";
const DEFAULT_SUMMARIZER_ENDPOINT: &str = "http://localhost:11434/v1/chat/completions";
const DEFAULT_SUMMARIZER_MODEL: &str = "llama3.1";

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            server: ServerConfig {
                host: env_or("HOMERISK_HOST", "0.0.0.0"),
                port: parse_env("HOMERISK_PORT")?.unwrap_or(8080),
            },
            database: DatabaseConfig {
                url: optional_env("DATABASE_URL"),
            },
            cache: CacheConfig {
                ttl_days: parse_env("CACHE_TTL_DAYS")?.unwrap_or(30),
            },
            pipeline: PipelineSettings {
                collector_timeout: Duration::from_secs(
                    parse_env("COLLECTOR_TIMEOUT_SECS")?.unwrap_or(120),
                ),
            },
            search: SearchConfig {
                api_key: optional_env("SERPAPI_KEY"),
                endpoint: parse_url("SERPAPI_ENDPOINT", DEFAULT_SEARCH_ENDPOINT)?,
            },
            summarizer: SummarizerConfig {
                endpoint: parse_url("SUMMARIZER_ENDPOINT", DEFAULT_SUMMARIZER_ENDPOINT)?,
                model: env_or("SUMMARIZER_MODEL", DEFAULT_SUMMARIZER_MODEL),
                api_key: optional_env("SUMMARIZER_API_KEY"),
            },
            notifier: NotifierConfig {
                endpoint: optional_env("MAIL_ENDPOINT")
                    .map(|raw| Url::parse(&raw).context("invalid MAIL_ENDPOINT"))
                    .transpose()?,
                api_key: optional_env("MAIL_API_KEY"),
                from: env_or("MAIL_FROM", "reports@homerisk.local"),
            },
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    optional_env(key).unwrap_or_else(|| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str) -> anyhow::Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    optional_env(key)
        .map(|raw| raw.parse().with_context(|| format!("invalid {key}")))
        .transpose()
}

fn parse_url(key: &str, default: &str) -> anyhow::Result<Url> {
    let raw = env_or(key, default);
    Url::parse(&raw).with_context(|| format!("invalid {key}"))
}
