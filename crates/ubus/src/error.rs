//! Error handling for the ubus client.
//!
//! `BusError` is the single error type returned by the codec and the
//! connection. Callers usually care about one distinction only: whether the
//! socket itself is gone (`is_transport`) or a single exchange went wrong.

use thiserror::Error;

use super::message::StatusCode;

/// The unified error type for ubus operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// Connecting to the ubus socket failed.
    ///
    /// Usually means `ubusd` is not running or the socket path is wrong.
    #[error("Failed to connect to ubus socket {path}: {source}")]
    Connect {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The daemon did not greet us with a HELLO message.
    #[error("ubus handshake failed: {0}")]
    Handshake(String),

    /// A frame or attribute could not be decoded.
    ///
    /// Framing is lost after this error; the connection should be dropped.
    #[error("Malformed ubus message: {0}")]
    Malformed(String),

    /// The daemon answered a request with a non-OK status.
    #[error("ubus request failed with status {0}")]
    Status(StatusCode),

    /// No complete answer arrived within the allotted time.
    #[error("Timed out waiting for ubus {0} reply")]
    Timeout(&'static str),

    /// The peer closed the socket, or `close()` was already called.
    #[error("ubus connection closed")]
    Closed,

    /// Socket I/O failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BusError {
    /// True when the error means the connection itself is unusable.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            BusError::Connect { .. } | BusError::Closed | BusError::Io(_) | BusError::Malformed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_error_display() {
        let err = BusError::Timeout("lookup");
        assert_eq!(err.to_string(), "Timed out waiting for ubus lookup reply");

        let err = BusError::Status(StatusCode::NotFound);
        assert!(err.to_string().contains("NotFound"));
    }

    #[test]
    fn test_bus_error_transport_classification() {
        assert!(BusError::Closed.is_transport());
        assert!(BusError::Malformed("short frame".into()).is_transport());
        assert!(
            BusError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe")).is_transport()
        );
        assert!(!BusError::Timeout("invoke").is_transport());
        assert!(!BusError::Status(StatusCode::MethodNotFound).is_transport());
    }

    #[test]
    fn test_bus_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "socket missing");
        let err: BusError = io_err.into();
        assert!(err.to_string().contains("socket missing"));
    }
}
