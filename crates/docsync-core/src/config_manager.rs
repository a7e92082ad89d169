use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration for DocSync
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DocSyncConfig {
    /// Capture and queue behaviour
    #[serde(default)]
    pub sync: SyncConfig,

    /// Change classification thresholds
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Remote delivery endpoint
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Capture, batching and retry settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    /// Directory to watch (defaults to current directory)
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Quiet period before captured events drain, and the batch window (ms)
    #[serde(default = "default_sync_delay_ms")]
    pub sync_delay_ms: u64,

    /// Glob patterns to watch; each becomes its own subscription
    #[serde(default = "default_watch_patterns")]
    pub watch_patterns: Vec<String>,

    /// Glob patterns to ignore; evaluated before watch patterns
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    /// Maximum number of changes handed to the transport at once
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Delivery attempts before an item is marked failed
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Retry backoff
    #[serde(default)]
    pub backoff: BackoffConfig,

    /// Number of terminal items kept in history
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Spacing between back-to-back batches while draining (ms)
    #[serde(default = "default_drain_delay_ms")]
    pub drain_delay_ms: u64,

    /// Upper bound for a single transport call (ms). Unset waits indefinitely.
    #[serde(default)]
    pub transport_timeout_ms: Option<u64>,
}

impl SyncConfig {
    pub fn sync_delay(&self) -> Duration {
        Duration::from_millis(self.sync_delay_ms)
    }

    pub fn drain_delay(&self) -> Duration {
        Duration::from_millis(self.drain_delay_ms)
    }

    pub fn transport_timeout(&self) -> Option<Duration> {
        self.transport_timeout_ms.map(Duration::from_millis)
    }

    /// Directory to watch, falling back to the current directory.
    pub fn root_or_cwd(&self) -> PathBuf {
        self.root
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root: None,
            sync_delay_ms: default_sync_delay_ms(),
            watch_patterns: default_watch_patterns(),
            ignore_patterns: default_ignore_patterns(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            backoff: BackoffConfig::default(),
            history_capacity: default_history_capacity(),
            drain_delay_ms: default_drain_delay_ms(),
            transport_timeout_ms: None,
        }
    }
}

/// Exponential retry backoff: `min(base * 2^retry_count, cap)`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackoffConfig {
    /// Base delay (default: 1s)
    #[serde(default = "default_backoff_base_ms")]
    pub base_ms: u64,

    /// Maximum delay (default: 60s)
    #[serde(default = "default_backoff_cap_ms")]
    pub cap_ms: u64,
}

impl BackoffConfig {
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let factor = 2u64.checked_pow(retry_count).unwrap_or(u64::MAX);
        let millis = self.base_ms.saturating_mul(factor).min(self.cap_ms);
        Duration::from_millis(millis)
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: default_backoff_base_ms(),
            cap_ms: default_backoff_cap_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifierConfig {
    /// Files with more lines than this are treated as low priority
    #[serde(default = "default_large_file_lines")]
    pub large_file_lines: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            large_file_lines: default_large_file_lines(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TransportConfig {
    /// HTTP endpoint receiving change batches. Unset means dry run.
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "pretty", "json", "compact"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_sync_delay_ms() -> u64 {
    5000
}
fn default_watch_patterns() -> Vec<String> {
    vec![
        "**/*.{md,mdx,rst,adoc,txt}".to_string(),
        "**/*.{rs,ts,tsx,js,jsx,py,go,java,rb,php,cs,swift,kt}".to_string(),
        "**/{package.json,Cargo.toml,pyproject.toml,go.mod}".to_string(),
    ]
}
fn default_ignore_patterns() -> Vec<String> {
    vec![
        "**/node_modules/**".to_string(),
        "**/target/**".to_string(),
        "**/.git/**".to_string(),
        "**/build/**".to_string(),
        "**/dist/**".to_string(),
        "**/__pycache__/**".to_string(),
        "**/.docsync/**".to_string(),
    ]
}
fn default_batch_size() -> usize {
    10
}
fn default_max_retries() -> u32 {
    3
}
fn default_history_capacity() -> usize {
    100
}
fn default_drain_delay_ms() -> u64 {
    100
}
fn default_backoff_base_ms() -> u64 {
    1000
}
fn default_backoff_cap_ms() -> u64 {
    60_000
}
fn default_large_file_lines() -> usize {
    1000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

/// Configuration manager with layered loading
pub struct ConfigManager {
    config: DocSyncConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables (.env file)
    /// 2. Config file (.docsync.toml)
    /// 3. Sensible defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_dotenv();
        let (config, config_path) = Self::load_config_file()?;
        Self::finish(config, config_path)
    }

    /// Load from an explicit file, still honouring environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        Self::load_dotenv();
        let config = Self::read_toml_file(path)?;
        Self::finish(config, Some(path.to_path_buf()))
    }

    fn finish(config: DocSyncConfig, config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = Self::apply_env_overrides(config, |key| std::env::var(key).ok());
        Self::validate_config(&config)?;

        match &config_path {
            Some(path) => info!("Config file: {}", path.display()),
            None => info!("Config file: NONE (using defaults)"),
        }
        info!(
            "Sync delay {} ms, batch size {}, max retries {}",
            config.sync.sync_delay_ms, config.sync.batch_size, config.sync.max_retries
        );

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Load .env file if it exists
    fn load_dotenv() {
        if Path::new(".env").exists() {
            if let Err(e) = dotenv::from_filename(".env") {
                warn!("Failed to load .env file: {}", e);
            }
            return;
        }

        if let Some(home) = dirs::home_dir() {
            let home_env = home.join(".docsync.env");
            if home_env.exists() {
                if let Err(e) = dotenv::from_path(&home_env) {
                    warn!("Failed to load .docsync.env: {}", e);
                }
            }
        }
    }

    /// Find and load config file
    /// Search order:
    /// 1. ./.docsync.toml (current directory)
    /// 2. ~/.docsync/config.toml (user config)
    /// 3. Use defaults
    fn load_config_file() -> Result<(DocSyncConfig, Option<PathBuf>), ConfigError> {
        let local_config = Path::new(".docsync.toml");
        if local_config.exists() {
            let config = Self::read_toml_file(local_config)?;
            return Ok((config, Some(local_config.to_path_buf())));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".docsync").join("config.toml");
            if user_config.exists() {
                let config = Self::read_toml_file(&user_config)?;
                return Ok((config, Some(user_config)));
            }
        }

        Ok((DocSyncConfig::default(), None))
    }

    /// Read TOML config file
    pub fn read_toml_file(path: &Path) -> Result<DocSyncConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Apply `DOCSYNC_*` overrides read through `lookup`
    pub fn apply_env_overrides<F>(mut config: DocSyncConfig, lookup: F) -> DocSyncConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse_list(raw: &str) -> Vec<String> {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        }

        if let Some(root) = lookup("DOCSYNC_ROOT") {
            config.sync.root = Some(PathBuf::from(root));
        }
        if let Some(ms) = lookup("DOCSYNC_SYNC_DELAY_MS").and_then(|v| v.parse().ok()) {
            config.sync.sync_delay_ms = ms;
        }
        if let Some(patterns) = lookup("DOCSYNC_WATCH_PATTERNS") {
            config.sync.watch_patterns = parse_list(&patterns);
        }
        if let Some(patterns) = lookup("DOCSYNC_IGNORE_PATTERNS") {
            config.sync.ignore_patterns = parse_list(&patterns);
        }
        if let Some(size) = lookup("DOCSYNC_BATCH_SIZE").and_then(|v| v.parse().ok()) {
            config.sync.batch_size = size;
        }
        if let Some(retries) = lookup("DOCSYNC_MAX_RETRIES").and_then(|v| v.parse().ok()) {
            config.sync.max_retries = retries;
        }
        if let Some(capacity) = lookup("DOCSYNC_HISTORY_CAPACITY").and_then(|v| v.parse().ok()) {
            config.sync.history_capacity = capacity;
        }
        if let Some(ms) = lookup("DOCSYNC_TRANSPORT_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            config.sync.transport_timeout_ms = Some(ms);
        }
        if let Some(endpoint) = lookup("DOCSYNC_ENDPOINT") {
            config.transport.endpoint = Some(endpoint);
        }
        if let Some(level) = lookup("DOCSYNC_LOG_LEVEL") {
            config.logging.level = level.to_lowercase();
        }
        if let Some(format) = lookup("DOCSYNC_LOG_FORMAT") {
            config.logging.format = format.to_lowercase();
        }

        config
    }

    /// Validate configuration
    pub fn validate_config(config: &DocSyncConfig) -> Result<(), ConfigError> {
        let sync = &config.sync;
        if sync.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "sync.batch_size must be at least 1".to_string(),
            ));
        }
        if sync.max_retries == 0 {
            return Err(ConfigError::ValidationError(
                "sync.max_retries must be at least 1".to_string(),
            ));
        }
        if sync.history_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "sync.history_capacity must be at least 1".to_string(),
            ));
        }
        if sync.backoff.cap_ms < sync.backoff.base_ms {
            return Err(ConfigError::ValidationError(format!(
                "sync.backoff.cap_ms ({}) is smaller than base_ms ({})",
                sync.backoff.cap_ms, sync.backoff.base_ms
            )));
        }

        match config.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    other
                )))
            }
        }

        match config.logging.format.as_str() {
            "pretty" | "json" | "compact" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}. Must be one of: pretty, json, compact",
                    other
                )))
            }
        }

        Ok(())
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &DocSyncConfig {
        &self.config
    }

    pub fn into_config(self) -> DocSyncConfig {
        self.config
    }

    /// Get the path to the config file that was loaded, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Create a default config file
    pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        let config = DocSyncConfig::default();
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::ReadError(e.to_string()))?;
            }
        }

        std::fs::write(path, toml_str).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = DocSyncConfig::default();
        assert!(ConfigManager::validate_config(&config).is_ok());
        assert_eq!(config.sync.sync_delay_ms, 5000);
        assert_eq!(config.sync.batch_size, 10);
        assert_eq!(config.sync.max_retries, 3);
        assert_eq!(config.sync.history_capacity, 100);
        assert!(config.sync.transport_timeout_ms.is_none());
    }

    #[test]
    fn test_backoff_doubles_until_cap() {
        let backoff = BackoffConfig {
            base_ms: 1000,
            cap_ms: 5000,
        };
        assert_eq!(backoff.delay_for(1), Duration::from_millis(2000));
        assert_eq!(backoff.delay_for(2), Duration::from_millis(4000));
        assert_eq!(backoff.delay_for(3), Duration::from_millis(5000));
        assert_eq!(backoff.delay_for(80), Duration::from_millis(5000));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: DocSyncConfig = toml::from_str(
            r#"
            [sync]
            sync_delay_ms = 250
            batch_size = 4

            [sync.backoff]
            base_ms = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.sync.sync_delay_ms, 250);
        assert_eq!(config.sync.batch_size, 4);
        assert_eq!(config.sync.backoff.base_ms, 10);
        assert_eq!(config.sync.backoff.cap_ms, 60_000);
        assert_eq!(config.sync.max_retries, 3);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DOCSYNC_SYNC_DELAY_MS", "750"),
            ("DOCSYNC_WATCH_PATTERNS", "docs/**/*.md, src/**/*.rs"),
            ("DOCSYNC_MAX_RETRIES", "not-a-number"),
            ("DOCSYNC_ENDPOINT", "http://localhost:9000/sync"),
            ("DOCSYNC_LOG_LEVEL", "DEBUG"),
        ]
        .into_iter()
        .collect();

        let config = ConfigManager::apply_env_overrides(DocSyncConfig::default(), |key| {
            env.get(key).map(|v| v.to_string())
        });

        assert_eq!(config.sync.sync_delay_ms, 750);
        assert_eq!(
            config.sync.watch_patterns,
            vec!["docs/**/*.md".to_string(), "src/**/*.rs".to_string()]
        );
        assert_eq!(config.sync.max_retries, 3);
        assert_eq!(
            config.transport.endpoint.as_deref(),
            Some("http://localhost:9000/sync")
        );
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = DocSyncConfig::default();
        config.sync.batch_size = 0;
        assert!(matches!(
            ConfigManager::validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));

        let mut config = DocSyncConfig::default();
        config.sync.max_retries = 0;
        assert!(matches!(
            ConfigManager::validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));

        let mut config = DocSyncConfig::default();
        config.sync.backoff.cap_ms = 10;
        assert!(ConfigManager::validate_config(&config).is_err());

        let mut config = DocSyncConfig::default();
        config.logging.level = "loud".to_string();
        assert!(ConfigManager::validate_config(&config).is_err());
    }

    #[test]
    fn test_create_and_read_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        ConfigManager::create_default_config(&path).unwrap();
        let config = ConfigManager::read_toml_file(&path).unwrap();
        assert_eq!(config, DocSyncConfig::default());
    }

    #[test]
    fn test_load_from_missing_file() {
        let result = ConfigManager::load_from(Path::new("/definitely/not/here.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }
}
