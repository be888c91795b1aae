//! Command-line flags.

use std::path::PathBuf;

use clap::Parser;

use crate::{config::Config, core::dispatcher::RuntimeMode};

const AFTER_HELP: &str = "\
Without flags the interactive dashboard is shown (quit with 'q', ESC or Ctrl+C).

Examples:
  gps-monitor                          Interactive dashboard
  gps-monitor -l                       Log to /tmp/gps-log.csv every 30 seconds
  gps-monitor -l -i 10 -o /root/gps.csv
  gps-monitor -l -d                    Log in the background
  gps-monitor -s                       Show data on the panel

CSV format:
  timestamp,latitude,longitude,speed,elevation,course,age";

#[derive(Debug, Clone, Parser)]
#[command(name = "gps-monitor", version)]
#[command(about = "Show or log GPS data served over ubus", long_about = None)]
#[command(after_help = AFTER_HELP)]
pub struct Cli {
    /// Append GPS fixes to a CSV file instead of showing the dashboard
    #[arg(short = 'l', long = "log")]
    pub log: bool,

    /// Drive the framebuffer panel instead of the terminal
    #[arg(short = 's', long = "spi-display", conflicts_with = "log")]
    pub spi_display: bool,

    /// Seconds between two logged fixes
    #[arg(short = 'i', long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,

    /// CSV file to append to
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Detach from the terminal after start-up (logging only)
    #[arg(short = 'd', long, requires = "log")]
    pub daemon: bool,
}

impl Cli {
    pub fn mode(&self) -> RuntimeMode {
        if self.log {
            RuntimeMode::Logging
        } else if self.spi_display {
            RuntimeMode::PanelDisplay
        } else {
            RuntimeMode::Interactive
        }
    }

    /// Lets the flags override the loaded configuration.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(interval) = self.interval {
            config.logging.interval_secs = interval;
        }
        if let Some(output) = &self.output {
            config.logging.output = output.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::{error::ErrorKind, CommandFactory};

    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("gps-monitor").chain(args.iter().copied()))
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_is_interactive() {
        let cli = parse(&[]).unwrap();
        assert_eq!(cli.mode(), RuntimeMode::Interactive);
        assert!(!cli.daemon);
    }

    #[test]
    fn test_logging_flags_override_config() {
        let cli = parse(&["-l", "-i", "10", "-o", "/root/gps.csv", "-d"]).unwrap();
        assert_eq!(cli.mode(), RuntimeMode::Logging);

        let mut config = Config::default();
        cli.apply_to(&mut config);
        assert_eq!(config.logging.interval_secs, 10);
        assert_eq!(config.logging.output, PathBuf::from("/root/gps.csv"));
    }

    #[test]
    fn test_flags_keep_config_when_absent() {
        let mut config = Config::default();
        config.logging.interval_secs = 45;
        parse(&["--log"]).unwrap().apply_to(&mut config);
        assert_eq!(config.logging.interval_secs, 45);
    }

    #[test]
    fn test_panel_mode() {
        assert_eq!(
            parse(&["--spi-display"]).unwrap().mode(),
            RuntimeMode::PanelDisplay
        );
    }

    #[test]
    fn test_invalid_combinations() {
        assert_eq!(
            parse(&["-l", "-s"]).unwrap_err().kind(),
            ErrorKind::ArgumentConflict
        );
        assert_eq!(
            parse(&["-d"]).unwrap_err().kind(),
            ErrorKind::MissingRequiredArgument
        );
        assert_eq!(
            parse(&["-l", "-i", "0"]).unwrap_err().kind(),
            ErrorKind::ValueValidation
        );
        assert_eq!(
            parse(&["-l", "-i", "soon"]).unwrap_err().kind(),
            ErrorKind::ValueValidation
        );
    }

    #[test]
    fn test_help_is_not_a_failure() {
        assert_eq!(parse(&["-h"]).unwrap_err().kind(), ErrorKind::DisplayHelp);
    }
}
