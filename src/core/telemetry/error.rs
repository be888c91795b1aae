//! Why a fetch produced no snapshot.

use std::time::Duration;

use gps_monitor_ubus::StatusCode;
use thiserror::Error;

/// Every variant is recoverable; the next scheduled fetch simply tries again.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// The service name is not registered on the bus (provider not running).
    #[error("Service '{0}' is not registered on the bus")]
    ServiceNotFound(String),

    /// The request could not be submitted, or was answered with an error
    /// status and no data.
    #[error("Invoking {service}.{method} failed: {reason}")]
    InvokeFailed {
        service: String,
        method: String,
        reason: String,
        status: Option<StatusCode>,
    },

    /// No reply within the overall bound.
    #[error("No reply within {0:?}")]
    Timeout(Duration),

    /// The service answered but the reply held no usable attribute.
    #[error("Service replied without data (status: {})", describe_status(.status))]
    EmptyReply { status: Option<StatusCode> },

    /// The bus connection itself is gone.
    #[error("Bus transport unavailable: {0}")]
    TransportUnavailable(String),
}

fn describe_status(status: &Option<StatusCode>) -> String {
    status.map_or_else(|| "none".to_string(), |s| s.to_string())
}

impl FetchError {
    /// Status code reported by the service, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            FetchError::InvokeFailed { status, .. } | FetchError::EmptyReply { status } => *status,
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout(_))
    }
}
