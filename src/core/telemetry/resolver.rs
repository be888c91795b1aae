//! Service name to bus object resolution.
//!
//! Nothing is cached: the provider may start after us or restart at any
//! time, so every fetch looks the name up again.

use std::time::Duration;

use gps_monitor_ubus::BusError;
use tracing::debug;

use super::{bus::Bus, error::FetchError};

/// A resolved service, valid for a single fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHandle {
    name: String,
    object_id: u32,
}

impl ServiceHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn object_id(&self) -> u32 {
        self.object_id
    }
}

/// Looks `service` up on the bus, bounded by `timeout`.
pub async fn resolve<B: Bus + ?Sized>(
    bus: &mut B,
    service: &str,
    timeout: Duration,
) -> Result<ServiceHandle, FetchError> {
    match bus.lookup(service, timeout).await {
        Ok(Some(object_id)) => {
            debug!(service, object_id = format_args!("{:08x}", object_id), "Resolved service");
            Ok(ServiceHandle {
                name: service.to_string(),
                object_id,
            })
        }
        Ok(None) => Err(FetchError::ServiceNotFound(service.to_string())),
        Err(BusError::Timeout(_)) => Err(FetchError::Timeout(timeout)),
        Err(e) if e.is_transport() => Err(FetchError::TransportUnavailable(e.to_string())),
        Err(e) => {
            debug!(service, error = %e, "Lookup rejected");
            Err(FetchError::ServiceNotFound(service.to_string()))
        }
    }
}
