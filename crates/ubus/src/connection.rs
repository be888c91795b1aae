//! Client side of a ubus socket.
//!
//! Connecting happens in two steps. [`Handshake::connect`] opens the socket
//! with a blocking std stream and waits for the daemon's HELLO, so it can run
//! before any async runtime exists (and before the process forks into the
//! background). [`Handshake::into_connection`] then moves the stream onto the
//! tokio reactor for the request/reply traffic.

use std::io::{ErrorKind, Read};
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::blob::{BlobMsgField, RawAttr, ATTR_HEADER_LEN};
use super::error::BusError;
use super::message::{attr, Message, MsgType, StatusCode, HEADER_LEN};

const READ_CHUNK: usize = 4096;

/// A socket that has been greeted by the daemon but is not yet async.
#[derive(Debug)]
pub struct Handshake {
    stream: StdUnixStream,
    local_id: u32,
    path: PathBuf,
    rx: BytesMut,
}

impl Handshake {
    /// Connects to `path` and waits up to `timeout` for the HELLO frame.
    pub fn connect(path: impl AsRef<Path>, timeout: Duration) -> Result<Self, BusError> {
        let path = path.as_ref();
        let mut stream = StdUnixStream::connect(path).map_err(|source| BusError::Connect {
            path: path.display().to_string(),
            source,
        })?;
        stream.set_read_timeout(Some(timeout))?;

        let mut rx = BytesMut::with_capacity(READ_CHUNK);
        let mut chunk = [0u8; READ_CHUNK];
        let hello = loop {
            if let Some(msg) = Message::decode(&mut rx)? {
                break msg;
            }
            match stream.read(&mut chunk) {
                Ok(0) => {
                    return Err(BusError::Handshake(
                        "socket closed before HELLO".to_string(),
                    ))
                }
                Ok(n) => rx.extend_from_slice(&chunk[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(BusError::Handshake(format!(
                        "no HELLO within {:?}",
                        timeout
                    )))
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };

        if hello.header.msg_type != MsgType::Hello {
            return Err(BusError::Handshake(format!(
                "expected HELLO, got {:?}",
                hello.header.msg_type
            )));
        }
        stream.set_read_timeout(None)?;

        debug!(
            path = %path.display(),
            local_id = format_args!("{:08x}", hello.header.peer),
            "Connected to ubus"
        );

        Ok(Self {
            stream,
            local_id: hello.header.peer,
            path: path.to_path_buf(),
            rx,
        })
    }

    /// Client id assigned by the daemon.
    pub fn local_id(&self) -> u32 {
        self.local_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Registers the socket with the current tokio runtime.
    ///
    /// Must be called from within a runtime context.
    pub fn into_connection(self) -> Result<Connection, BusError> {
        self.stream.set_nonblocking(true)?;
        let stream = UnixStream::from_std(self.stream)?;

        Ok(Connection {
            stream: Some(stream),
            local_id: self.local_id,
            path: self.path,
            next_seq: 1,
            rx: self.rx,
        })
    }
}

/// An established, non-blocking ubus connection.
///
/// Replies are matched to requests by sequence number only; callers drive
/// reception explicitly with [`wait_readable`](Self::wait_readable) and
/// [`pump`](Self::pump).
#[derive(Debug)]
pub struct Connection {
    stream: Option<UnixStream>,
    local_id: u32,
    path: PathBuf,
    next_seq: u16,
    rx: BytesMut,
}

impl Connection {
    pub fn local_id(&self) -> u32 {
        self.local_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// Drops the socket. Calling it again is a no-op.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!(path = %self.path.display(), "Closed ubus connection");
        }
        self.rx.clear();
    }

    fn take_seq(&mut self) -> u16 {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        seq
    }

    pub async fn send(&mut self, msg: &Message) -> Result<(), BusError> {
        let wire = msg.encode();
        let stream = self.stream.as_mut().ok_or(BusError::Closed)?;
        trace!(
            msg_type = ?msg.header.msg_type,
            seq = msg.header.seq,
            bytes = wire.len(),
            "Sending ubus message"
        );
        stream.write_all(&wire).await?;
        Ok(())
    }

    /// Resolves an object path to its numeric id.
    ///
    /// Returns `Ok(None)` when the daemon reports the path as unknown.
    pub async fn lookup(&mut self, path: &str, timeout: Duration) -> Result<Option<u32>, BusError> {
        let seq = self.take_seq();
        let request = Message::new(
            MsgType::Lookup,
            seq,
            0,
            vec![RawAttr::string(attr::OBJPATH, path)],
        );
        self.send(&request).await?;

        let deadline = Instant::now() + timeout;
        let mut found = None;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(BusError::Timeout("lookup"));
            }
            if !self.wait_readable(remaining).await? {
                continue;
            }

            for msg in self.pump()? {
                if msg.header.seq != seq {
                    trace!(seq = msg.header.seq, "Ignoring unrelated message during lookup");
                    continue;
                }
                match msg.header.msg_type {
                    MsgType::Data if found.is_none() => found = msg.object_id(),
                    MsgType::Status => {
                        return match msg.status().unwrap_or(StatusCode::UnknownError) {
                            StatusCode::Ok => Ok(found),
                            StatusCode::NotFound => Ok(None),
                            other => Err(BusError::Status(other)),
                        };
                    }
                    _ => {}
                }
            }
        }
    }

    /// Sends an INVOKE and returns its sequence number without waiting.
    pub async fn invoke(
        &mut self,
        object: u32,
        method: &str,
        args: &[BlobMsgField],
    ) -> Result<u16, BusError> {
        let seq = self.take_seq();
        let request = Message::new(
            MsgType::Invoke,
            seq,
            object,
            vec![
                RawAttr::u32(attr::OBJID, object),
                RawAttr::string(attr::METHOD, method),
                RawAttr::table(attr::DATA, args),
            ],
        );
        self.send(&request).await?;
        Ok(seq)
    }

    /// Waits at most `slice` for the socket to become readable.
    ///
    /// Returns `Ok(false)` when the slice elapsed with nothing to read.
    pub async fn wait_readable(&mut self, slice: Duration) -> Result<bool, BusError> {
        if self.has_buffered_frame() {
            return Ok(true);
        }
        let stream = self.stream.as_ref().ok_or(BusError::Closed)?;
        match tokio::time::timeout(slice, stream.readable()).await {
            Ok(ready) => {
                ready?;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    /// Reads whatever is available without blocking and returns every
    /// complete frame. A frame that fails to decode is logged and the
    /// buffered bytes behind it are dropped; frames decoded before it are
    /// still returned.
    pub fn pump(&mut self) -> Result<Vec<Message>, BusError> {
        let stream = self.stream.as_ref().ok_or(BusError::Closed)?;
        let mut chunk = [0u8; READ_CHUNK];
        let mut eof = false;

        loop {
            match stream.try_read(&mut chunk) {
                Ok(0) => {
                    eof = true;
                    break;
                }
                Ok(n) => self.rx.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let mut messages = Vec::new();
        loop {
            match Message::decode(&mut self.rx) {
                Ok(Some(msg)) => messages.push(msg),
                Ok(None) => break,
                Err(e) => {
                    // Frame boundaries are lost; drop the rest of the buffer.
                    warn!(error = %e, discarded = self.rx.len(), "Discarding undecodable ubus data");
                    self.rx.clear();
                    break;
                }
            }
        }

        if eof {
            debug!(path = %self.path.display(), "ubus daemon closed the connection");
            self.stream = None;
            if messages.is_empty() {
                return Err(BusError::Closed);
            }
        }
        Ok(messages)
    }

    fn has_buffered_frame(&self) -> bool {
        if self.rx.len() < HEADER_LEN + ATTR_HEADER_LEN {
            return false;
        }
        let word = [
            self.rx[HEADER_LEN],
            self.rx[HEADER_LEN + 1],
            self.rx[HEADER_LEN + 2],
            self.rx[HEADER_LEN + 3],
        ];
        let (_, _, raw_len) = super::blob::split_header(u32::from_be_bytes(word));
        self.rx.len() >= HEADER_LEN + raw_len
    }
}
