use std::env;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_MODEL_DIR: &str = "./summarizer_model";
const DEFAULT_MAX_INPUT_TOKENS: usize = 1024;
const DEFAULT_SUMMARY_MAX_TOKENS: usize = 128;
const DEFAULT_NUM_BEAMS: usize = 5;
const DEFAULT_TEMPERATURE: f64 = 1.5;
const DEFAULT_UPLOAD_TEMP_DIR: &str = "temp";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
const DEFAULT_PORT_RANGE_START: u16 = 5000;
const DEFAULT_PORT_RANGE_END: u16 = 5099;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
    /// Environment variable parsed but violates a range constraint.
    #[error("Environment variable {0} must be greater than zero")]
    NotPositive(String),
    /// Port search range ends before it starts.
    #[error("PORT_RANGE_END ({end}) must not be below PORT_RANGE_START ({start})")]
    EmptyPortRange {
        /// First port tried.
        start: u16,
        /// Last port tried.
        end: u16,
    },
}

/// Runtime configuration for the summarization server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding `config.json`, `tokenizer.json`, and `model.safetensors`.
    pub model_dir: PathBuf,
    /// Token budget per chunk and cap on the encoder input.
    pub max_input_tokens: usize,
    /// Maximum number of tokens generated per summary.
    pub summary_max_tokens: usize,
    /// Beam width used during generation.
    pub num_beams: usize,
    /// Sampling temperature. Carried for compatibility; beam search ignores it.
    pub temperature: f64,
    /// Directory where uploads are staged while a request streams.
    pub upload_temp_dir: PathBuf,
    /// Largest accepted request body for uploads.
    pub max_upload_bytes: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Ports tried in order when no explicit port is configured.
    pub port_range: RangeInclusive<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            max_input_tokens: DEFAULT_MAX_INPUT_TOKENS,
            summary_max_tokens: DEFAULT_SUMMARY_MAX_TOKENS,
            num_beams: DEFAULT_NUM_BEAMS,
            temperature: DEFAULT_TEMPERATURE,
            upload_temp_dir: PathBuf::from(DEFAULT_UPLOAD_TEMP_DIR),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            server_port: None,
            port_range: DEFAULT_PORT_RANGE_START..=DEFAULT_PORT_RANGE_END,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults for unset keys.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            model_dir: load_env_optional("MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_dir),
            max_input_tokens: load_positive("MAX_INPUT_TOKENS", defaults.max_input_tokens)?,
            summary_max_tokens: load_positive("SUMMARY_MAX_TOKENS", defaults.summary_max_tokens)?,
            num_beams: load_positive("NUM_BEAMS", defaults.num_beams)?,
            temperature: load_parsed("TEMPERATURE")?.unwrap_or(defaults.temperature),
            upload_temp_dir: load_env_optional("UPLOAD_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_temp_dir),
            max_upload_bytes: load_positive("MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            server_port: load_parsed("SERVER_PORT")?,
            port_range: load_port_range(defaults.port_range)?,
        })
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_parsed<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

fn load_positive(key: &str, default: usize) -> Result<usize, ConfigError> {
    match load_parsed::<usize>(key)? {
        Some(0) => Err(ConfigError::NotPositive(key.to_string())),
        Some(value) => Ok(value),
        None => Ok(default),
    }
}

fn load_port_range(default: RangeInclusive<u16>) -> Result<RangeInclusive<u16>, ConfigError> {
    let start = load_parsed("PORT_RANGE_START")?.unwrap_or(*default.start());
    let end = load_parsed("PORT_RANGE_END")?.unwrap_or(*default.end());
    port_range(start, end)
}

fn port_range(start: u16, end: u16) -> Result<RangeInclusive<u16>, ConfigError> {
    if end < start {
        return Err(ConfigError::EmptyPortRange { start, end });
    }
    Ok(start..=end)
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Install an already-built configuration in the global cache.
pub fn install_config(config: Config) -> &'static Config {
    tracing::debug!(
        model_dir = %config.model_dir.display(),
        max_input_tokens = config.max_input_tokens,
        summary_max_tokens = config.summary_max_tokens,
        num_beams = config.num_beams,
        upload_temp_dir = %config.upload_temp_dir.display(),
        server_port = ?config.server_port,
        port_range = ?config.port_range,
        "Loaded configuration"
    );
    if CONFIG.set(config).is_err() {
        tracing::warn!("Configuration already initialized; keeping the first value");
    }
    get_config()
}

/// Load configuration from the environment (and `.env`) without installing it.
pub fn load_config() -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();
    Config::from_env()
}
