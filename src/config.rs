use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_OUTPUT_DIR: &str = "downloads";
const DEFAULT_STORE_PATH: &str = "records.json";
const DEFAULT_KEYWORD_COUNT: usize = 5;
const DEFAULT_SUMMARY_SENTENCES: usize = 5;
const DEFAULT_FETCH_BACKOFF_MS: u64 = 250;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for an ingestion run.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory receiving fetched document bytes.
    pub output_dir: PathBuf,
    /// JSON file backing the document record store.
    pub store_path: PathBuf,
    /// Optional override for the worker pool size.
    pub workers: Option<usize>,
    /// Number of keywords extracted per document.
    pub keyword_count: usize,
    /// Number of sentences kept in each summary.
    pub summary_sentences: usize,
    /// Extra fetch attempts after a transient failure.
    pub fetch_retries: u32,
    /// Base delay of the exponential fetch backoff, in milliseconds.
    pub fetch_backoff_ms: u64,
    /// Per-request fetch timeout, in seconds.
    pub fetch_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            workers: None,
            keyword_count: DEFAULT_KEYWORD_COUNT,
            summary_sentences: DEFAULT_SUMMARY_SENTENCES,
            fetch_retries: 0,
            fetch_backoff_ms: DEFAULT_FETCH_BACKOFF_MS,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            output_dir: load_env_optional("DOCDIGEST_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            store_path: load_env_optional("DOCDIGEST_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            workers: parse_optional("DOCDIGEST_WORKERS")?.filter(|workers| *workers > 0),
            keyword_count: parse_optional("DOCDIGEST_KEYWORD_COUNT")?
                .unwrap_or(defaults.keyword_count),
            summary_sentences: parse_optional("DOCDIGEST_SUMMARY_SENTENCES")?
                .unwrap_or(defaults.summary_sentences),
            fetch_retries: parse_optional("DOCDIGEST_FETCH_RETRIES")?
                .unwrap_or(defaults.fetch_retries),
            fetch_backoff_ms: parse_optional("DOCDIGEST_FETCH_BACKOFF_MS")?
                .unwrap_or(defaults.fetch_backoff_ms),
            fetch_timeout_secs: parse_optional("DOCDIGEST_FETCH_TIMEOUT_SECS")?
                .unwrap_or(defaults.fetch_timeout_secs),
        })
    }

    /// Worker pool size: the configured override or the available hardware parallelism.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Log the effective settings. Call after tracing is installed.
    pub fn log_effective(&self) {
        tracing::info!(
            output_dir = %self.output_dir.display(),
            store_path = %self.store_path.display(),
            workers = self.worker_count(),
            keyword_count = self.keyword_count,
            summary_sentences = self.summary_sentences,
            fetch_retries = self.fetch_retries,
            "Effective configuration"
        );
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    CONFIG.set(config).expect("Failed to set config");
}
