//! Configuration of the telemetry source on the ubus bus.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Socket path used by current OpenWrt releases.
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/ubus/ubus.sock";

/// Socket path used by older releases.
pub const LEGACY_SOCKET_PATH: &str = "/var/run/ubus.sock";

/// `[telemetry]` table: where to find the service and how long to wait for it.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Path of the ubusd Unix socket.
    #[validate(length(min = 1, message = "Socket path must not be empty"))]
    pub socket_path: String,

    /// Object name looked up on every fetch.
    #[validate(length(min = 1, message = "Service name must not be empty"))]
    pub service: String,

    /// Method invoked on the service.
    #[validate(length(min = 1, message = "Method name must not be empty"))]
    pub method: String,

    /// Overall bound of one request, in milliseconds.
    #[validate(range(
        min = 10,
        max = 60000,
        message = "Request timeout must be between 10 and 60000 ms"
    ))]
    pub timeout_ms: u64,

    /// Length of one readiness wait on the socket, in milliseconds.
    #[validate(range(min = 1, max = 1000, message = "Poll slice must be between 1 and 1000 ms"))]
    pub poll_slice_ms: u64,

    /// Extra slices spent collecting trailing reply fragments.
    #[validate(range(max = 100, message = "Grace rounds must not exceed 100"))]
    pub grace_rounds: u32,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            socket_path: DEFAULT_SOCKET_PATH.to_string(),
            service: "gps".to_string(),
            method: "info".to_string(),
            timeout_ms: 1000,
            poll_slice_ms: 10,
            grace_rounds: 10,
        }
    }
}

impl TelemetryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_slice(&self) -> Duration {
        Duration::from_millis(self.poll_slice_ms)
    }

    /// Socket to connect to.
    ///
    /// When the default path is configured but missing, the legacy location
    /// is used if it exists.
    pub fn resolved_socket_path(&self) -> PathBuf {
        let configured = Path::new(&self.socket_path);
        if self.socket_path == DEFAULT_SOCKET_PATH
            && !configured.exists()
            && Path::new(LEGACY_SOCKET_PATH).exists()
        {
            return PathBuf::from(LEGACY_SOCKET_PATH);
        }
        configured.to_path_buf()
    }
}
