//! Configuration management for subsweep
//!
//! Configuration is loaded from `./config/subsweep.toml` (or `--config`).
//! Every section is optional; missing values fall back to the defaults below,
//! which mirror the template written by `--init`.

use serde::Deserialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/subsweep.toml";

/// Template written by `--init`
pub const DEFAULT_CONFIG: &str = include_str!("../config/subsweep.toml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid URL in '{field}': {url}")]
    InvalidUrl { field: String, url: String },

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },

    #[error("Configuration field '{field}' out of range: {value} (expected {expected})")]
    OutOfRange {
        field: String,
        value: u64,
        expected: String,
    },
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_user_agent() -> String {
    format!("subsweep/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
        }
    }
}

/// Concurrency bounds for a run
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum in-flight API requests across all providers
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    /// Maximum collectors running at the same time
    #[serde(default = "default_max_collector_tasks")]
    pub max_collector_tasks: usize,
}

fn default_max_concurrent_requests() -> usize {
    10
}

fn default_max_collector_tasks() -> usize {
    4
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent_requests(),
            max_collector_tasks: default_max_collector_tasks(),
        }
    }
}

/// Retry policy for API calls (fixed delay between attempts)
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per logical request, first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the next attempt (milliseconds)
    #[serde(default = "default_retry_delay_ms")]
    pub delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Output format for persisted results
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unsupported output format '{}' (expected csv or json)", other)),
        }
    }
}

/// Where and how results are written
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_output_format")]
    pub format: OutputFormat,
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("results/subdomains")
}

fn default_output_format() -> OutputFormat {
    OutputFormat::Csv
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            format: default_output_format(),
        }
    }
}

/// Per-source configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub subfinder: SubfinderConfig,
    #[serde(default)]
    pub crtsh: CrtShConfig,
    #[serde(default = "ProviderConfig::securitytrails")]
    pub securitytrails: ProviderConfig,
    #[serde(default = "ProviderConfig::zoomeye")]
    pub zoomeye: ProviderConfig,
    #[serde(default = "ProviderConfig::shodan")]
    pub shodan: ProviderConfig,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            subfinder: SubfinderConfig::default(),
            crtsh: CrtShConfig::default(),
            securitytrails: ProviderConfig::securitytrails(),
            zoomeye: ProviderConfig::zoomeye(),
            shodan: ProviderConfig::shodan(),
        }
    }
}

/// Local subfinder binary
#[derive(Debug, Clone, Deserialize)]
pub struct SubfinderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Path to the binary, or a bare name looked up on PATH
    #[serde(default = "default_subfinder_path")]
    pub path: String,
    /// Timeout for one subfinder run in seconds
    #[serde(default = "default_subfinder_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_subfinder_path() -> String {
    "subfinder".to_string()
}

fn default_subfinder_timeout_secs() -> u64 {
    600
}

impl Default for SubfinderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_subfinder_path(),
            timeout_secs: default_subfinder_timeout_secs(),
        }
    }
}

/// crt.sh certificate search
#[derive(Debug, Clone, Deserialize)]
pub struct CrtShConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_crtsh_base_url")]
    pub base_url: String,
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_crtsh_base_url() -> String {
    "https://crt.sh".to_string()
}

fn default_provider_timeout_secs() -> u64 {
    30
}

impl Default for CrtShConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_crtsh_base_url(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

/// Key-authenticated API provider with optional mirrors
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Empty or missing means the provider is not dispatched
    #[serde(default)]
    pub api_key: Option<String>,
    /// Equivalent base URLs, used in rotation
    #[serde(default)]
    pub endpoints: Vec<String>,
    /// Minimum gap between two requests to this provider (milliseconds)
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    /// Hard timeout for one HTTP attempt (seconds)
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
    /// Page size for paginated search providers
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_min_interval_ms() -> u64 {
    500
}

fn default_page_size() -> u32 {
    100
}

impl ProviderConfig {
    fn with_endpoint(endpoint: &str) -> Self {
        Self {
            enabled: true,
            api_key: None,
            endpoints: vec![endpoint.to_string()],
            min_interval_ms: default_min_interval_ms(),
            timeout_secs: default_provider_timeout_secs(),
            page_size: default_page_size(),
        }
    }

    pub fn securitytrails() -> Self {
        Self::with_endpoint("https://api.securitytrails.com")
    }

    pub fn zoomeye() -> Self {
        Self::with_endpoint("https://api.zoomeye.org")
    }

    pub fn shodan() -> Self {
        Self::with_endpoint("https://api.shodan.io")
    }

    /// The configured key, treating blank strings as absent
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: AppConfig = toml::from_str(content)?;
        config.fill_default_endpoints();
        config.validate()?;
        Ok(config)
    }

    /// Providers configured without mirrors use their public endpoint.
    fn fill_default_endpoints(&mut self) {
        let defaults = SourcesConfig::default();
        for (provider, fallback) in [
            (&mut self.sources.securitytrails, defaults.securitytrails),
            (&mut self.sources.zoomeye, defaults.zoomeye),
            (&mut self.sources.shodan, defaults.shodan),
        ] {
            if provider.endpoints.is_empty() {
                provider.endpoints = fallback.endpoints;
            }
        }
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.user_agent.trim().is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "http.user_agent".to_string(),
            });
        }

        check_range("limits.max_concurrent_requests", self.limits.max_concurrent_requests as u64, 1, 100)?;
        check_range("limits.max_collector_tasks", self.limits.max_collector_tasks as u64, 1, 16)?;
        check_range("retry.max_attempts", self.retry.max_attempts as u64, 1, 10)?;

        if self.sources.subfinder.path.trim().is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "sources.subfinder.path".to_string(),
            });
        }
        check_range("sources.subfinder.timeout_secs", self.sources.subfinder.timeout_secs, 1, 86_400)?;

        check_url("sources.crtsh.base_url", &self.sources.crtsh.base_url)?;
        check_range("sources.crtsh.timeout_secs", self.sources.crtsh.timeout_secs, 5, 30)?;

        for (name, provider) in [
            ("securitytrails", &self.sources.securitytrails),
            ("zoomeye", &self.sources.zoomeye),
            ("shodan", &self.sources.shodan),
        ] {
            if provider.endpoints.is_empty() {
                return Err(ConfigError::EmptyRequired {
                    field: format!("sources.{}.endpoints", name),
                });
            }
            for (i, endpoint) in provider.endpoints.iter().enumerate() {
                check_url(&format!("sources.{}.endpoints[{}]", name, i), endpoint)?;
            }
            check_range(&format!("sources.{}.timeout_secs", name), provider.timeout_secs, 5, 30)?;
            check_range(&format!("sources.{}.page_size", name), provider.page_size as u64, 1, 10_000)?;
        }

        Ok(())
    }

    /// Create default configuration file at the given location
    pub fn create_default_config(path: &Path) -> Result<PathBuf, ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }
}

fn check_url(field: &str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidUrl {
            field: field.to_string(),
            url: url.to_string(),
        })
    }
}

fn check_range(field: &str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field: field.to_string(),
            value,
            expected: format!("{}..={}", min, max),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config = AppConfig::from_toml(DEFAULT_CONFIG);
        assert!(config.is_ok(), "Default config should parse: {:?}", config.err());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml("").expect("empty config should parse");
        assert_eq!(config.limits.max_concurrent_requests, 10);
        assert_eq!(config.limits.max_collector_tasks, 4);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.delay(), Duration::from_secs(1));
        assert_eq!(config.output.format, OutputFormat::Csv);
        assert!(config.sources.subfinder.enabled);
        assert_eq!(config.sources.crtsh.base_url, "https://crt.sh");
        assert_eq!(config.sources.zoomeye.endpoints, vec!["https://api.zoomeye.org".to_string()]);
        assert_eq!(config.sources.zoomeye.page_size, 100);
        assert!(config.sources.shodan.api_key().is_none());
    }

    #[test]
    fn test_provider_section_parsing() {
        let config_str = r#"
[sources.securitytrails]
api_key = "st-key"
endpoints = ["https://mirror-a.example.net", "http://10.0.0.2:8080"]
min_interval_ms = 250
timeout_secs = 5

[sources.shodan]
api_key = "   "
"#;
        let config = AppConfig::from_toml(config_str).expect("Config should parse");
        let st = &config.sources.securitytrails;
        assert_eq!(st.api_key(), Some("st-key"));
        assert_eq!(st.endpoints.len(), 2);
        assert_eq!(st.min_interval(), Duration::from_millis(250));
        assert_eq!(st.timeout(), Duration::from_secs(5));
        assert!(config.sources.shodan.api_key().is_none(), "blank key counts as missing");
        assert_eq!(config.sources.shodan.endpoints, vec!["https://api.shodan.io".to_string()]);
    }

    #[test]
    fn test_empty_endpoint_list_falls_back_to_public_api() {
        let config = AppConfig::from_toml("[sources.zoomeye]\nendpoints = []\n").unwrap();
        assert_eq!(config.sources.zoomeye.endpoints, vec!["https://api.zoomeye.org".to_string()]);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let bad_url = "[sources.zoomeye]\nendpoints = [\"ftp://zoomeye.example\"]\n";
        assert!(matches!(AppConfig::from_toml(bad_url), Err(ConfigError::InvalidUrl { .. })));

        let blank_agent = "[http]\nuser_agent = \" \"\n";
        assert!(matches!(AppConfig::from_toml(blank_agent), Err(ConfigError::EmptyRequired { .. })));

        let long_timeout = "[sources.securitytrails]\ntimeout_secs = 120\n";
        assert!(matches!(AppConfig::from_toml(long_timeout), Err(ConfigError::OutOfRange { .. })));

        let zero_tasks = "[limits]\nmax_collector_tasks = 0\n";
        assert!(matches!(AppConfig::from_toml(zero_tasks), Err(ConfigError::OutOfRange { .. })));
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("CSV".parse::<OutputFormat>(), Ok(OutputFormat::Csv));
        assert_eq!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("xlsx".parse::<OutputFormat>().is_err());
    }
}
