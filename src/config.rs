//! Engine Configuration Management
//!
//! Features:
//! - Environment presets (development/production)
//! - Environment variable overrides
//! - JSON configuration files
//! - Configuration validation

use crate::error::{Error, Result};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(Error::ConfigError(format!("Invalid environment: {}", s))),
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Environment type
    pub environment: Environment,

    /// Where relations live and how files are delimited
    pub connection: ConnectionConfig,

    /// Join enumeration limits
    pub join: JoinConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Directory scanned for relation files
    pub data_dir: PathBuf,

    /// Field separator
    pub separator: char,

    /// Quote character wrapping field values
    pub quote: char,

    /// First line holds column names
    pub has_header: bool,

    /// Character encoding of relation files (WHATWG label)
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            separator: ';',
            quote: '"',
            has_header: true,
            encoding: default_encoding(),
        }
    }
}

impl ConnectionConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.separator.is_ascii() || !self.quote.is_ascii() {
            return Err(Error::ConfigError(
                "separator and quote must be ASCII characters".to_string(),
            ));
        }
        if self.separator == self.quote {
            return Err(Error::ConfigError(format!(
                "separator and quote are both '{}'",
                self.separator
            )));
        }
        if self.separator == '\n' || self.separator == '\r' {
            return Err(Error::ConfigError(
                "separator cannot be a line terminator".to_string(),
            ));
        }
        self.file_encoding()?;
        Ok(())
    }

    /// Resolve `encoding`. Only ASCII-compatible encodings are accepted, since
    /// separators and quotes are matched byte for byte.
    pub fn file_encoding(&self) -> Result<&'static Encoding> {
        let encoding = Encoding::for_label(self.encoding.trim().as_bytes()).ok_or_else(|| {
            Error::ConfigError(format!("Unknown encoding: {}", self.encoding))
        })?;
        if !encoding.is_ascii_compatible() {
            return Err(Error::ConfigError(format!(
                "Encoding {} is not ASCII compatible",
                encoding.name()
            )));
        }
        Ok(encoding)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinConfig {
    /// Refuse joins whose cross product exceeds this many combinations
    pub max_combinations: Option<u64>,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            max_combinations: Some(10_000_000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::development()
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let env = std::env::var("POLLYDB_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .parse()?;

        let mut config = match env {
            Environment::Development => Self::development(),
            Environment::Production => Self::production(),
        };

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a JSON file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut config: EngineConfig = serde_json::from_str(&text).map_err(|e| {
            Error::ConfigError(format!("Invalid config file {}: {}", path.display(), e))
        })?;

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Development configuration
    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            connection: ConnectionConfig::new("./data"),
            join: JoinConfig::default(),
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    /// Production configuration
    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            connection: ConnectionConfig::new("/var/lib/pollydb"),
            join: JoinConfig {
                max_combinations: Some(1_000_000),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `var`, which maps a variable name to its value.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(dir) = var("POLLYDB_DATA_DIR") {
            self.connection.data_dir = PathBuf::from(dir);
        }
        if let Some(sep) = var("POLLYDB_SEPARATOR") {
            self.connection.separator = single_char(&sep, "POLLYDB_SEPARATOR")?;
        }
        if let Some(quote) = var("POLLYDB_QUOTE") {
            self.connection.quote = single_char(&quote, "POLLYDB_QUOTE")?;
        }
        if let Some(encoding) = var("POLLYDB_ENCODING") {
            self.connection.encoding = encoding;
        }
        if let Some(header) = var("POLLYDB_HEADER") {
            self.connection.has_header = header
                .parse()
                .map_err(|_| Error::ConfigError("Invalid POLLYDB_HEADER".to_string()))?;
        }
        if let Some(max) = var("POLLYDB_MAX_COMBINATIONS") {
            self.join.max_combinations = if max.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(max.parse().map_err(|_| {
                    Error::ConfigError("Invalid POLLYDB_MAX_COMBINATIONS".to_string())
                })?)
            };
        }

        // Logging
        if let Some(level) = var("POLLYDB_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = var("LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.connection.validate()?;

        if self.join.max_combinations == Some(0) {
            return Err(Error::ConfigError(
                "join.max_combinations must be greater than zero".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(Error::ConfigError(format!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(Error::ConfigError(format!(
                "Invalid log format: {}. Must be one of: {}",
                self.logging.format,
                valid_formats.join(", ")
            )));
        }

        Ok(())
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn single_char(value: &str, var: &str) -> Result<char> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(Error::ConfigError(format!(
            "{} must be a single character",
            var
        ))),
    }
}

/// Configuration builder for programmatic setup
pub struct ConfigBuilder {
    config: EngineConfig,
}

impl ConfigBuilder {
    pub fn new(env: Environment) -> Self {
        let config = match env {
            Environment::Development => EngineConfig::development(),
            Environment::Production => EngineConfig::production(),
        };

        Self { config }
    }

    /// Start from an already loaded configuration.
    pub fn from_config(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.connection.data_dir = path.into();
        self
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.config.connection.separator = separator;
        self
    }

    pub fn with_quote(mut self, quote: char) -> Self {
        self.config.connection.quote = quote;
        self
    }

    pub fn with_header(mut self, has_header: bool) -> Self {
        self.config.connection.has_header = has_header;
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.config.connection.encoding = encoding.into();
        self
    }

    pub fn with_max_combinations(mut self, limit: Option<u64>) -> Self {
        self.config.join.max_combinations = limit;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn build(self) -> Result<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
