//! Output sinks: CSV log, terminal dashboard and panel frames.

pub mod csv;
pub mod error;
pub mod panel;
pub mod terminal;
pub mod traits;

pub use self::csv::CsvSink;
pub use error::SinkError;
pub use panel::PanelSink;
pub use terminal::TerminalSink;
pub use traits::Sink;

use crate::core::telemetry::FetchError;

/// Short user-facing text for a failed fetch, shared by the screen sinks.
pub fn unavailable_message(error: &FetchError) -> String {
    match error {
        FetchError::Timeout(_) => "Timeout waiting for GPS response".to_string(),
        FetchError::InvokeFailed {
            status: Some(status),
            ..
        } => format!("Error: GPS service returned error: {}", status.code()),
        FetchError::EmptyReply {
            status: Some(status),
        } if !status.is_ok() => format!("Error: GPS service returned error: {}", status.code()),
        FetchError::EmptyReply { .. } => "No GPS data available".to_string(),
        _ => "Failed to fetch GPS data".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use gps_monitor_ubus::StatusCode;

    use super::*;

    #[test]
    fn test_unavailable_messages() {
        assert_eq!(
            unavailable_message(&FetchError::Timeout(Duration::from_millis(1000))),
            "Timeout waiting for GPS response"
        );
        assert_eq!(
            unavailable_message(&FetchError::EmptyReply {
                status: Some(StatusCode::Ok)
            }),
            "No GPS data available"
        );
        assert_eq!(
            unavailable_message(&FetchError::EmptyReply {
                status: Some(StatusCode::NoData)
            }),
            "Error: GPS service returned error: 5"
        );
        assert_eq!(
            unavailable_message(&FetchError::InvokeFailed {
                service: "gps".into(),
                method: "info".into(),
                reason: "NotFound (4)".into(),
                status: Some(StatusCode::NotFound),
            }),
            "Error: GPS service returned error: 4"
        );
        assert_eq!(
            unavailable_message(&FetchError::ServiceNotFound("gps".into())),
            "Failed to fetch GPS data"
        );
        assert_eq!(
            unavailable_message(&FetchError::TransportUnavailable("closed".into())),
            "Failed to fetch GPS data"
        );
    }
}
