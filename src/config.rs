use crate::generate::{DEFAULT_BATCH_SIZE, DEFAULT_READING_TEXT_LEN};
use crate::pipeline::MAX_PG_BATCH_ROWS;
use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_TABLE: &str = "readings";

fn setup_config_path() -> Option<PathBuf> {
    env::var("DATAGEN_SETUP_CONFIG_PATH")
        .ok()
        .map(|path| path.trim().to_string())
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct SetupConfigOverrides {
    #[serde(default)]
    database_url: Option<String>,
    #[serde(default)]
    datagen_table: Option<String>,
    #[serde(default)]
    datagen_batch_size: Option<usize>,
}

fn load_setup_config_overrides() -> Option<SetupConfigOverrides> {
    let path = setup_config_path()?;
    if !path.exists() {
        return None;
    }
    read_setup_overrides(&path)
}

pub(crate) fn read_setup_overrides(path: &Path) -> Option<SetupConfigOverrides> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "sensor-datagen failed to read setup config; using env defaults"
            );
            return None;
        }
    };
    parse_setup_overrides(contents).or_else(|| {
        tracing::warn!(
            path = %path.display(),
            "sensor-datagen failed to parse setup config; using env defaults"
        );
        None
    })
}

fn parse_setup_overrides(contents: String) -> Option<SetupConfigOverrides> {
    let mut bytes = contents.into_bytes();
    simd_json::serde::from_slice(&mut bytes).ok()
}

fn env_is_unset(key: &str) -> bool {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .is_none()
}

fn apply_setup_overrides(
    config: &mut Config,
    overrides: &SetupConfigOverrides,
    env_allows: impl Fn(&str) -> bool,
) {
    if config.database_url.is_none() {
        config.database_url = overrides
            .database_url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| normalize_database_url(value.to_string()));
    }
    if env_allows("DATAGEN_TABLE") {
        if let Some(table) = overrides
            .datagen_table
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            config.table = table.to_string();
        }
    }
    if env_allows("DATAGEN_BATCH_SIZE") {
        if let Some(value) = overrides.datagen_batch_size.filter(|v| *v != 0) {
            config.batch_size = value;
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: Option<String>,
    pub db_pool_size: u32,
    pub table: String,
    pub batch_size: usize,
    pub reading_text_len: usize,
    pub insert_attempts: u32,
    pub retry_backoff_ms: u64,
    pub progress_interval_ms: u64,
    pub otlp_endpoint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            db_pool_size: 4,
            table: DEFAULT_TABLE.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            reading_text_len: DEFAULT_READING_TEXT_LEN,
            insert_attempts: 3,
            retry_backoff_ms: 500,
            progress_interval_ms: 2000,
            otlp_endpoint: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let defaults = Self::default();
        let database_url = env::var("DATAGEN_DATABASE_URL")
            .or_else(|_| env::var("DATABASE_URL"))
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(normalize_database_url);
        let db_pool_size = env::var("DATAGEN_DB_POOL_SIZE")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.db_pool_size);
        let table = env::var("DATAGEN_TABLE")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.table);
        let batch_size = env::var("DATAGEN_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.batch_size);
        let reading_text_len = env::var("DATAGEN_READING_TEXT_LEN")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.reading_text_len);
        let insert_attempts = env::var("DATAGEN_INSERT_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.insert_attempts);
        let retry_backoff_ms = env::var("DATAGEN_RETRY_BACKOFF_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.retry_backoff_ms);
        let progress_interval_ms = env::var("DATAGEN_PROGRESS_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v != 0)
            .unwrap_or(defaults.progress_interval_ms);
        let otlp_endpoint = env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();

        let mut config = Self {
            database_url,
            db_pool_size,
            table,
            batch_size,
            reading_text_len,
            insert_attempts,
            retry_backoff_ms,
            progress_interval_ms,
            otlp_endpoint,
        };

        if let Some(overrides) = load_setup_config_overrides() {
            apply_setup_overrides(&mut config, &overrides, env_is_unset);
        }

        validate_table_name(&config.table)?;
        Ok(config)
    }

    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .context("DATAGEN_DATABASE_URL or DATABASE_URL is required (or present as database_url in the setup config) unless --output is given")
    }

    /// Batch size for a sink, falling back to the default when unset and
    /// clamped to what one Postgres insert can bind.
    pub fn effective_batch_size(&self, override_size: Option<usize>, postgres: bool) -> usize {
        let requested = override_size
            .or(Some(self.batch_size))
            .filter(|size| *size != 0)
            .unwrap_or(DEFAULT_BATCH_SIZE);
        if postgres && requested > MAX_PG_BATCH_ROWS {
            tracing::warn!(
                requested,
                max = MAX_PG_BATCH_ROWS,
                "batch size exceeds the Postgres bind limit; clamping"
            );
            return MAX_PG_BATCH_ROWS;
        }
        requested
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

/// The table name is interpolated into SQL, so only plain identifiers pass.
pub fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let Some(first) = chars.next() else {
        bail!("table name must not be empty");
    };
    if !(first.is_ascii_alphabetic() || first == '_')
        || !chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        || table.len() > 48
    {
        bail!("invalid table name {table:?}: use letters, digits and underscores");
    }
    Ok(())
}

fn normalize_database_url(url: String) -> String {
    if let Some(stripped) = url.strip_prefix("postgresql+psycopg://") {
        return format!("postgresql://{stripped}");
    }
    if let Some(stripped) = url.strip_prefix("postgresql+asyncpg://") {
        return format!("postgresql://{stripped}");
    }
    url
}
