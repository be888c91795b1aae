//! Application configuration loading, validation, and management.
//!
//! `Config` aggregates the logger, telemetry and per-mode settings. It is
//! read from a TOML file when one exists, otherwise built-in defaults are
//! used, and command-line flags are applied on top before the final
//! validation. The result is immutable for the rest of the run.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use validator::Validate;

pub use self::{
    logger::LoggerConfig,
    modes::{InteractiveConfig, LoggingConfig, PanelConfig, PixelFormat},
    telemetry::TelemetryConfig,
};

pub mod logger;
pub mod modes;
pub mod telemetry;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV: &str = "GPS_MONITOR_CONFIG";

/// Configuration file used when `GPS_MONITOR_CONFIG` is not set.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/gps-monitor/config.toml";

/// UTC timestamp used by the early-print macros.
#[doc(hidden)]
pub fn early_timestamp() -> String {
    let format = time::macros::format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
    );
    time::OffsetDateTime::now_utc()
        .format(format)
        .unwrap_or_default()
}

/// Simple macros for printing timestamped messages before the tracing subscriber
/// is initialized. These are used during early configuration loading.
#[macro_export]
macro_rules! print_info {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style($crate::config::early_timestamp()).dim(),
            console::style("INFO").green(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_warn {
    ($($arg:tt)*) => {
        eprintln!("{}  {} {}",
            console::style($crate::config::early_timestamp()).dim(),
            console::style("WARN").yellow(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_error {
    ($($arg:tt)*) => {
        eprintln!("{}  {} {}",
            console::style($crate::config::early_timestamp()).dim(),
            console::style("ERROR").red(),
            format_args!($($arg)*)
        );
    };
}

/// Errors that can occur during configuration loading, parsing or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Generic configuration-related error with a descriptive message.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error while accessing configuration files.
    #[error("IO error while reading configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// Failure to parse the TOML configuration file.
    #[error("Parse error while reading configuration: {0}")]
    ParseError(String),

    /// Validation failure after successful parsing or after CLI overrides.
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Top-level application configuration.
#[derive(Serialize, Deserialize, Debug, Validate, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// Logging subsystem configuration.
    #[validate(nested)]
    pub logger: LoggerConfig,

    /// Where the telemetry service lives and the request bounds.
    #[validate(nested)]
    pub telemetry: TelemetryConfig,

    #[validate(nested)]
    pub logging: LoggingConfig,

    #[validate(nested)]
    pub panel: PanelConfig,

    #[validate(nested)]
    pub interactive: InteractiveConfig,
}

impl Config {
    /// Locates and loads the configuration file, or falls back to defaults.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a configuration file was found (or named
    /// through `GPS_MONITOR_CONFIG`) but cannot be read, parsed, or validated.
    pub fn new() -> Result<Self, ConfigError> {
        match Self::get_config_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Determines the configuration file path.
    ///
    /// Priority:
    /// 1. `GPS_MONITOR_CONFIG` environment variable
    /// 2. `/etc/gps-monitor/config.toml`
    fn get_config_path() -> Option<PathBuf> {
        if let Ok(config_path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(config_path));
        }

        let fallback = Path::new(DEFAULT_CONFIG_PATH);
        fallback.exists().then(|| fallback.to_path_buf())
    }

    /// Loads and validates configuration from the specified path.
    ///
    /// # Errors
    ///
    /// Propagates IO, parsing, and validation errors as `ConfigError`.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::Config(format!(
                "configuration file {} does not exist",
                path.display()
            )));
        }

        let config_str = fs::read_to_string(path)?;
        Self::from_toml(&config_str)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(document: &str) -> Result<Config, ConfigError> {
        let config: Config =
            toml::from_str(document).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validated()
    }

    /// Runs validation again, e.g. after command-line overrides were applied.
    pub fn validated(self) -> Result<Config, ConfigError> {
        self.validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validated().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [logging]
            interval_secs = 5

            [panel]
            device = "/dev/fb0"
            pixel_format = "gray8"
            "#,
        )
        .unwrap();

        assert_eq!(config.logging.interval_secs, 5);
        assert_eq!(config.panel.device, PathBuf::from("/dev/fb0"));
        assert_eq!(config.panel.pixel_format, PixelFormat::Gray8);
        assert_eq!(config.telemetry.service, "gps");
        assert_eq!(config.interactive.tick_ms, 100);
    }

    #[test]
    fn test_invalid_nested_value_is_rejected() {
        let err = Config::from_toml("[telemetry]\ntimeout_ms = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let err = Config::from_toml("[logging\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logger]\nlevel = \"debug\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.logger.level, "debug");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_mode_settings_are_reachable_from_config_root() {
        let panel = crate::config::PanelConfig {
            pixel_format: crate::config::PixelFormat::Mono1,
            ..Default::default()
        };
        assert_eq!(panel.pixel_format.bits_per_pixel(), 1);
        assert_eq!(crate::config::LoggingConfig::default().interval_secs, 30);
    }

    #[test]
    fn test_early_timestamp_shape() {
        let ts = early_timestamp();
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), "2024-01-01T00:00:00.000000Z".len());
    }
}
