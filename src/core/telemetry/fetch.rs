//! Bounded request/reply exchange with the telemetry service.
//!
//! One fetch resolves the service, submits a single `invoke` and then pumps
//! the bus in short readiness slices until the reply shows up or the
//! overall deadline passes. After the first data fragment a few more slices
//! are spent collecting trailing fragments of the same reply.

use std::time::Duration;

use gps_monitor_ubus::{BusError, StatusCode};
use tokio::time::Instant;
use tracing::{debug, instrument, trace, warn};

use super::{
    attributes::AttributeBuffer,
    bus::{Bus, BusEvent},
    error::FetchError,
    resolver::resolve,
    snapshot::Snapshot,
    FetchOutcome,
};
use crate::{config::telemetry::TelemetryConfig, core::lifecycle::Release};

/// Timing and addressing of a fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchPolicy {
    pub service: String,
    pub method: String,
    /// Bound on the whole exchange, resolution included. Only the grace
    /// drain may run past it.
    pub timeout: Duration,
    pub poll_slice: Duration,
    pub grace_rounds: u32,
}

impl From<&TelemetryConfig> for FetchPolicy {
    fn from(config: &TelemetryConfig) -> Self {
        Self {
            service: config.service.clone(),
            method: config.method.clone(),
            timeout: config.timeout(),
            poll_slice: config.poll_slice(),
            grace_rounds: config.grace_rounds,
        }
    }
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self::from(&TelemetryConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyState {
    /// Nothing received for our request yet.
    Pending,
    /// Data arrived, completion status not seen yet.
    Replied,
    /// Completion status seen.
    Finished,
    /// Error status without any data.
    Failed(StatusCode),
}

/// Owns the bus connection and the buffer of the latest reply.
pub struct TelemetryClient<B: Bus> {
    bus: Option<B>,
    policy: FetchPolicy,
    buffer: AttributeBuffer,
    status: Option<StatusCode>,
}

impl<B: Bus> TelemetryClient<B> {
    pub fn new(bus: B, policy: FetchPolicy) -> Self {
        Self {
            bus: Some(bus),
            policy,
            buffer: AttributeBuffer::new(),
            status: None,
        }
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    pub fn is_connected(&self) -> bool {
        self.bus.is_some()
    }

    /// Performs one fetch.
    ///
    /// The previous reply is discarded first; on any error the buffer is
    /// left empty.
    #[instrument(skip(self), fields(service = %self.policy.service, method = %self.policy.method))]
    pub async fn fetch(&mut self) -> FetchOutcome<'_> {
        self.buffer.clear();
        self.status = None;

        match self.exchange().await {
            Ok(()) if !self.buffer.is_empty() => {
                debug!(attributes = self.buffer.len(), status = ?self.status, "Fetch complete");
                Ok(Snapshot::new(&self.buffer, self.status))
            }
            Ok(()) => Err(FetchError::EmptyReply {
                status: self.status,
            }),
            Err(e) => {
                self.buffer.clear();
                debug!(error = %e, "Fetch failed");
                Err(e)
            }
        }
    }

    async fn exchange(&mut self) -> Result<(), FetchError> {
        let policy = &self.policy;
        let bus = self.bus.as_mut().ok_or_else(|| {
            FetchError::TransportUnavailable("bus connection was released".to_string())
        })?;

        // The lookup and the wait for the reply share one deadline.
        let deadline = Instant::now() + policy.timeout;
        let handle = match resolve(bus, &policy.service, remaining(deadline)).await {
            Err(FetchError::Timeout(_)) => return Err(FetchError::Timeout(policy.timeout)),
            other => other?,
        };
        let seq = bus
            .invoke(handle.object_id(), &policy.method)
            .await
            .map_err(|e| FetchError::InvokeFailed {
                service: policy.service.clone(),
                method: policy.method.clone(),
                reason: e.to_string(),
                status: None,
            })?;
        trace!(seq, "Request submitted");

        let mut state = ReplyState::Pending;
        while state == ReplyState::Pending {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let slice = policy.poll_slice.min(deadline - now);
            if bus.wait_readable(slice).await.map_err(transport)? {
                let events = bus.pump().map_err(transport)?;
                collect(events, seq, &mut self.buffer, &mut self.status, &mut state);
            }
        }

        match state {
            ReplyState::Pending => Err(FetchError::Timeout(policy.timeout)),
            ReplyState::Failed(status) => Err(FetchError::InvokeFailed {
                service: policy.service.clone(),
                method: policy.method.clone(),
                reason: format!("service returned {}", status),
                status: Some(status),
            }),
            ReplyState::Finished => Ok(()),
            ReplyState::Replied => {
                for round in 0..policy.grace_rounds {
                    let events = match bus.wait_readable(policy.poll_slice).await {
                        Ok(false) => break,
                        Ok(true) => bus.pump(),
                        Err(e) => Err(e),
                    };
                    match events {
                        Ok(events) => {
                            collect(events, seq, &mut self.buffer, &mut self.status, &mut state)
                        }
                        Err(e) => {
                            warn!(round, error = %e, "Bus error while draining late reply fragments");
                            break;
                        }
                    }
                    if state == ReplyState::Finished {
                        break;
                    }
                }
                Ok(())
            }
        }
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

fn transport(e: BusError) -> FetchError {
    FetchError::TransportUnavailable(e.to_string())
}

fn collect(
    events: Vec<BusEvent>,
    seq: u16,
    buffer: &mut AttributeBuffer,
    status: &mut Option<StatusCode>,
    state: &mut ReplyState,
) {
    for event in events {
        if event.seq() != seq {
            trace!(seq = event.seq(), "Ignoring reply to another request");
            continue;
        }
        match event {
            BusEvent::Data { fields, .. } => {
                let stored = buffer.absorb(&fields);
                trace!(stored, "Reply fragment received");
                if *state == ReplyState::Pending {
                    *state = ReplyState::Replied;
                }
            }
            BusEvent::Status { status: code, .. } => {
                *status = Some(code);
                *state = match *state {
                    ReplyState::Pending if !code.is_ok() => ReplyState::Failed(code),
                    _ => ReplyState::Finished,
                };
            }
        }
    }
}

impl<B: Bus> Release for TelemetryClient<B> {
    fn label(&self) -> &'static str {
        "bus connection"
    }

    fn release(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Some(mut bus) = self.bus.take() {
            bus.close();
        }
        self.buffer.clear();
        Ok(())
    }
}
