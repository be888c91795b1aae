//! Centralized logging configuration and initialization manager.
//!
//! The `LoggerManager` validates the `[logger]` configuration and installs
//! the global `tracing` subscriber with a console layer (stderr) and/or a
//! systemd journald layer. The interactive dashboard owns the terminal, so
//! that mode asks for the console layer to be suppressed.

use std::io;

use thiserror::Error;
use tracing_subscriber::{fmt, fmt::format::FmtSpan, prelude::*, EnvFilter, Layer};
use validator::{Validate, ValidationErrors};

use crate::{
    config::logger::{ConsoleConfig, LogFormat, LoggerConfig},
    print_info, print_warn,
};

type BoxedLayer = Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>;

/// Errors that can occur during logger configuration or initialization.
#[derive(Error, Debug)]
pub enum LoggerError {
    /// Validation errors from the logger configuration struct.
    #[error("Logger configuration validation error: {0}")]
    ValidationError(#[from] ValidationErrors),

    /// IO error, typically during journald socket operations.
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    /// A global subscriber was already installed.
    #[error("Logger initialization error: {0}")]
    InitializationError(String),

    /// No output layers were configured at all.
    #[error("No logging layers were configured or successfully initialized")]
    NoLayersConfigured,
}

/// Manages logging configuration and global subscriber initialization.
pub struct LoggerManager {
    config: LoggerConfig,
    console_suppressed: bool,
}

impl LoggerManager {
    /// Creates a new `LoggerManager` and validates the provided configuration.
    ///
    /// # Errors
    ///
    /// Returns `LoggerError::ValidationError` if configuration validation fails.
    pub fn new(config: LoggerConfig) -> Result<Self, LoggerError> {
        config.validate()?;

        Ok(LoggerManager {
            config,
            console_suppressed: false,
        })
    }

    /// Drops the console layer regardless of configuration.
    pub fn suppress_console(mut self, suppress: bool) -> Self {
        self.console_suppressed = suppress;
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.config.level))
    }

    /// Builds every layer the configuration asks for.
    ///
    /// A journald failure is only a warning when console output is still
    /// available.
    fn build_layers(&self) -> Result<Vec<BoxedLayer>, LoggerError> {
        let mut layers = Vec::new();

        let console = self
            .config
            .console
            .as_ref()
            .filter(|c| c.enabled && !self.console_suppressed);
        if let Some(console_config) = console {
            layers.push(self.console_layer(console_config, self.filter()));
        }

        if let Some(journald_config) = self.config.journald.as_ref().filter(|j| j.enabled) {
            match tracing_journald::layer() {
                Ok(layer) => {
                    let layer = layer.with_syslog_identifier(journald_config.identifier.clone());
                    layers.push(layer.with_filter(self.filter()).boxed());
                    print_info!(
                        "Systemd journald logger initialized with identifier: {}",
                        journald_config.identifier
                    );
                }
                Err(e) => {
                    print_warn!("Failed to initialize systemd journald logger: {}", e);
                    if layers.is_empty() && !self.console_suppressed {
                        return Err(LoggerError::IoError(e));
                    }
                }
            }
        }

        Ok(layers)
    }

    /// Installs the global `tracing` subscriber.
    ///
    /// Returns `Ok(false)` when the console was suppressed and nothing else
    /// is configured; logging then stays off for the run.
    ///
    /// # Errors
    ///
    /// Fails if no layer is configured, if journald is the only output and
    /// cannot be reached, or if a subscriber is already installed.
    pub fn init(&self) -> Result<bool, LoggerError> {
        let layers = self.build_layers()?;

        if layers.is_empty() {
            if self.console_suppressed {
                return Ok(false);
            }
            print_warn!("No logging layers were initialized. Please check your configuration.");
            return Err(LoggerError::NoLayersConfigured);
        }

        tracing_subscriber::registry()
            .with(layers)
            .try_init()
            .map_err(|e| LoggerError::InitializationError(e.to_string()))?;
        Ok(true)
    }

    /// Constructs a console output layer according to the provided configuration.
    fn console_layer(&self, config: &ConsoleConfig, filter: EnvFilter) -> BoxedLayer {
        let span_events = if config.show_spans {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let base = fmt::layer()
            .with_target(config.show_target)
            .with_thread_ids(config.show_thread_ids)
            .with_span_events(span_events)
            .with_ansi(config.ansi_colors)
            .with_writer(io::stderr);

        match config.format {
            LogFormat::Json => base.json().with_filter(filter).boxed(),
            LogFormat::Pretty => base.pretty().with_filter(filter).boxed(),
            LogFormat::Compact => base.compact().with_filter(filter).boxed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::logger::JournaldConfig;

    #[test]
    fn test_invalid_level_rejected() {
        let config = LoggerConfig {
            level: "loud".into(),
            ..Default::default()
        };
        assert!(matches!(
            LoggerManager::new(config),
            Err(LoggerError::ValidationError(_))
        ));
    }

    #[test]
    fn test_default_config_builds_console_layer() {
        let manager = LoggerManager::new(LoggerConfig::default()).unwrap();
        assert_eq!(manager.build_layers().unwrap().len(), 1);
    }

    #[test]
    fn test_suppressed_console_without_journald_is_silent() {
        let manager = LoggerManager::new(LoggerConfig::default())
            .unwrap()
            .suppress_console(true);
        assert!(manager.build_layers().unwrap().is_empty());
        assert!(!manager.init().unwrap());
    }

    #[test]
    fn test_no_outputs_is_an_error() {
        let config = LoggerConfig {
            console: None,
            journald: Some(JournaldConfig::default()),
            ..Default::default()
        };
        let manager = LoggerManager::new(config).unwrap();
        assert!(matches!(manager.init(), Err(LoggerError::NoLayersConfigured)));
    }
}
