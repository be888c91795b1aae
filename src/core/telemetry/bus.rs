//! The bus operations the fetch loop depends on.
//!
//! `Bus` is implemented by the real ubus [`Connection`]; tests script their
//! own implementation to control timing and reply contents.

use std::time::Duration;

use gps_monitor_ubus::{BlobMsgField, BusError, Connection, MsgType, StatusCode};
use tracing::{trace, warn};

/// A reply fragment relevant to a pending request.
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    /// Attributes returned by the remote method.
    Data { seq: u16, fields: Vec<BlobMsgField> },
    /// Completion of the request.
    Status { seq: u16, status: StatusCode },
}

impl BusEvent {
    pub fn seq(&self) -> u16 {
        match self {
            BusEvent::Data { seq, .. } | BusEvent::Status { seq, .. } => *seq,
        }
    }
}

#[async_trait::async_trait]
pub trait Bus: Send {
    /// Resolves an object path; `Ok(None)` when it is not registered.
    async fn lookup(&mut self, path: &str, timeout: Duration) -> Result<Option<u32>, BusError>;

    /// Submits a call without arguments and returns its sequence number.
    async fn invoke(&mut self, object: u32, method: &str) -> Result<u16, BusError>;

    /// Waits at most `slice` for incoming traffic.
    async fn wait_readable(&mut self, slice: Duration) -> Result<bool, BusError>;

    /// Processes one round of pending input.
    fn pump(&mut self) -> Result<Vec<BusEvent>, BusError>;

    /// Releases the connection; later calls fail with `BusError::Closed`.
    fn close(&mut self);
}

#[async_trait::async_trait]
impl Bus for Connection {
    async fn lookup(&mut self, path: &str, timeout: Duration) -> Result<Option<u32>, BusError> {
        Connection::lookup(self, path, timeout).await
    }

    async fn invoke(&mut self, object: u32, method: &str) -> Result<u16, BusError> {
        Connection::invoke(self, object, method, &[]).await
    }

    async fn wait_readable(&mut self, slice: Duration) -> Result<bool, BusError> {
        Connection::wait_readable(self, slice).await
    }

    fn pump(&mut self) -> Result<Vec<BusEvent>, BusError> {
        let mut events = Vec::new();
        for msg in Connection::pump(self)? {
            let seq = msg.header.seq;
            match msg.header.msg_type {
                MsgType::Data => match msg.data() {
                    Ok(fields) => events.push(BusEvent::Data {
                        seq,
                        fields: fields.unwrap_or_default(),
                    }),
                    Err(e) => warn!(seq, error = %e, "Skipping undecodable reply payload"),
                },
                MsgType::Status => events.push(BusEvent::Status {
                    seq,
                    status: msg.status().unwrap_or(StatusCode::UnknownError),
                }),
                other => trace!(?other, seq, "Ignoring bus message"),
            }
        }
        Ok(events)
    }

    fn close(&mut self) {
        Connection::close(self);
    }
}
