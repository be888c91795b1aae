//! # gps-monitor-ubus: minimal asynchronous ubus client
//!
//! Talks to OpenWrt's `ubusd` over its Unix socket. Only the client half
//! of the protocol that a polling consumer needs is implemented:
//!
//! - **blob / blobmsg codec** for message bodies (tables, arrays, strings,
//!   integers, doubles)
//! - **framing** of the 8-byte message header and attribute container
//! - **HELLO handshake**, object **lookup** and method **invoke**
//!
//! Object registration, subscriptions and notifications are out of scope.
//!
//! # Usage
//!
//! ```ignore
//! use std::time::Duration;
//! use gps_monitor_ubus::{Handshake, MsgType};
//!
//! let handshake = Handshake::connect("/var/run/ubus/ubus.sock", Duration::from_secs(1))?;
//! let mut conn = handshake.into_connection()?; // inside a tokio runtime
//!
//! let id = conn.lookup("gps", Duration::from_secs(1)).await?.expect("gps object");
//! let seq = conn.invoke(id, "info", &[]).await?;
//! while conn.wait_readable(Duration::from_millis(10)).await? {
//!     for msg in conn.pump()? {
//!         if msg.header.seq == seq && msg.header.msg_type == MsgType::Data {
//!             println!("{:?}", msg.data()?);
//!         }
//!     }
//! }
//! ```

pub mod blob;
pub mod connection;
pub mod error;
pub mod message;

pub use blob::{BlobMsgField, BlobMsgType, BlobMsgValue, RawAttr};
pub use connection::{Connection, Handshake};
pub use error::BusError;
pub use message::{attr, Header, Message, MsgType, StatusCode};

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BusError>;
