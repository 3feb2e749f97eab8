use std::path::Path;

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::exchange::exmo::EXMO_BASE_URL;
use crate::indicator::window::MAX_PERIOD;

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_base_url() -> String {
    EXMO_BASE_URL.into()
}

fn default_pair() -> String {
    "BTC_USD".into()
}

fn default_limit() -> u32 {
    30
}

fn default_period() -> usize {
    5
}

fn default_lookback_hours() -> u32 {
    48
}

fn default_fetch_concurrency() -> usize {
    1
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub exmo: ExmoConfig,
    #[serde(default)]
    pub indicator: IndicatorConfig,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExmoConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Unset leaves the HTTP client's own behaviour in place.
    pub request_timeout_secs: Option<u64>,
}

impl Default for ExmoConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: None,
        }
    }
}

/// Defaults for the `sma` / `ema` commands.
#[derive(Debug, Deserialize)]
pub struct IndicatorConfig {
    #[serde(default = "default_pair")]
    pub pair: String,
    /// Candle resolution forwarded to `candles_history`.
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default = "default_period")]
    pub period: usize,
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u32,
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            pair: default_pair(),
            limit: default_limit(),
            period: default_period(),
            lookback_hours: default_lookback_hours(),
            fetch_concurrency: default_fetch_concurrency(),
        }
    }
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;

    Ok(config)
}

/// Like [`load`], falling back to defaults when no path is given.
pub fn load_or_default(path: Option<&Path>) -> Result<AppConfig, Report<ConfigError>> {
    match path {
        Some(path) => load(path),
        None => Ok(AppConfig::default()),
    }
}

const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_general(config)?;
    validate_exmo(config)?;
    validate_indicator(config)?;
    Ok(())
}

fn invalid(field: String) -> Report<ConfigError> {
    Report::new(ConfigError::Validation { field })
}

fn validate_general(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let format = &config.general.log_format;
    if !VALID_LOG_FORMATS.contains(&format.as_str()) {
        return Err(invalid(format!(
            "general.log_format \"{format}\" is not one of {VALID_LOG_FORMATS:?}"
        )));
    }
    Ok(())
}

fn validate_exmo(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let url = &config.exmo.base_url;
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(invalid(format!(
            "exmo.base_url \"{url}\" must be an http(s) URL"
        )));
    }
    if config.exmo.request_timeout_secs == Some(0) {
        return Err(invalid("exmo.request_timeout_secs must be > 0".into()));
    }
    Ok(())
}

fn validate_indicator(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let indicator = &config.indicator;
    if indicator.pair.trim().is_empty() {
        return Err(invalid("indicator.pair must not be empty".into()));
    }
    if indicator.period == 0 {
        return Err(invalid("indicator.period must be > 0".into()));
    }
    if indicator.period > MAX_PERIOD {
        return Err(invalid(format!("indicator.period must be <= {MAX_PERIOD}")));
    }
    if indicator.lookback_hours == 0 {
        return Err(invalid("indicator.lookback_hours must be > 0".into()));
    }
    if indicator.fetch_concurrency == 0 {
        return Err(invalid("indicator.fetch_concurrency must be > 0".into()));
    }
    Ok(())
}
