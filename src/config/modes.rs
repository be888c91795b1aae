//! Per-mode settings: `[logging]`, `[panel]` and `[interactive]`.

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use validator::Validate;

/// CSV logging mode.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggingConfig {
    /// Seconds between two fetches.
    #[validate(range(min = 1, message = "Logging interval must be at least 1 second"))]
    pub interval_secs: u64,

    /// CSV file, opened in append mode.
    pub output: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            output: PathBuf::from("/tmp/gps-log.csv"),
        }
    }
}

impl LoggingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Pixel layout of the framebuffer memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 1 bit per pixel, 8 horizontal pixels per byte, MSB first.
    Mono1,
    /// 8-bit grayscale.
    Gray8,
    /// 16-bit RGB565, little endian.
    #[default]
    Rgb565,
}

impl PixelFormat {
    pub fn bits_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Mono1 => 1,
            PixelFormat::Gray8 => 8,
            PixelFormat::Rgb565 => 16,
        }
    }
}

/// Framebuffer panel mode.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PanelConfig {
    /// Framebuffer device node.
    pub device: PathBuf,

    #[validate(range(min = 8, max = 4096, message = "Panel width must be between 8 and 4096"))]
    pub width: u32,

    #[validate(range(min = 8, max = 4096, message = "Panel height must be between 8 and 4096"))]
    pub height: u32,

    pub pixel_format: PixelFormat,

    /// Seconds between two refreshes.
    #[validate(range(min = 1, message = "Panel refresh must be at least 1 second"))]
    pub refresh_secs: u64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/fb1"),
            width: 256,
            height: 64,
            pixel_format: PixelFormat::default(),
            refresh_secs: 1,
        }
    }
}

impl PanelConfig {
    pub fn refresh(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }
}

/// Interactive dashboard mode.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct InteractiveConfig {
    /// Redraw period in milliseconds.
    #[validate(range(min = 10, max = 10000, message = "Tick must be between 10 and 10000 ms"))]
    pub tick_ms: u64,
}

impl Default for InteractiveConfig {
    fn default() -> Self {
        Self { tick_ms: 100 }
    }
}

impl InteractiveConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_defaults() {
        let logging = LoggingConfig::default();
        assert_eq!(logging.interval_secs, 30);
        assert_eq!(logging.output, PathBuf::from("/tmp/gps-log.csv"));

        let panel = PanelConfig::default();
        assert_eq!((panel.width, panel.height), (256, 64));
        assert_eq!(panel.refresh(), Duration::from_secs(1));

        assert_eq!(InteractiveConfig::default().tick(), Duration::from_millis(100));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let logging = LoggingConfig {
            interval_secs: 0,
            ..Default::default()
        };
        let err = logging.validate().unwrap_err();
        assert!(err.to_string().contains("at least 1 second"));
    }

    #[test]
    fn test_pixel_format_from_toml() {
        let panel: PanelConfig = toml::from_str("pixel_format = \"mono1\"").unwrap();
        assert_eq!(panel.pixel_format, PixelFormat::Mono1);
        assert_eq!(panel.pixel_format.bits_per_pixel(), 1);
        assert_eq!(panel.device, PathBuf::from("/dev/fb1"));
    }
}
