//! ubus message framing.
//!
//! A frame is an 8-byte header followed by one blob container (id 0) whose
//! children are the message attributes. All integers are big-endian.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::blob::{attr_header, split_header, BlobMsgField, RawAttr, ATTR_HEADER_LEN};
use super::error::BusError;

/// Protocol version carried in every header.
pub const MSG_VERSION: u8 = 0;
/// Size of the fixed header preceding the attribute container.
pub const HEADER_LEN: usize = 8;
/// Frames larger than this are treated as corruption.
pub const MAX_MESSAGE_LEN: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgType {
    Hello,
    Status,
    Data,
    Ping,
    Lookup,
    Invoke,
    AddObject,
    RemoveObject,
    Subscribe,
    Unsubscribe,
    Notify,
    Monitor,
    Unknown(u8),
}

impl MsgType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => MsgType::Hello,
            1 => MsgType::Status,
            2 => MsgType::Data,
            3 => MsgType::Ping,
            4 => MsgType::Lookup,
            5 => MsgType::Invoke,
            6 => MsgType::AddObject,
            7 => MsgType::RemoveObject,
            8 => MsgType::Subscribe,
            9 => MsgType::Unsubscribe,
            10 => MsgType::Notify,
            11 => MsgType::Monitor,
            other => MsgType::Unknown(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            MsgType::Hello => 0,
            MsgType::Status => 1,
            MsgType::Data => 2,
            MsgType::Ping => 3,
            MsgType::Lookup => 4,
            MsgType::Invoke => 5,
            MsgType::AddObject => 6,
            MsgType::RemoveObject => 7,
            MsgType::Subscribe => 8,
            MsgType::Unsubscribe => 9,
            MsgType::Notify => 10,
            MsgType::Monitor => 11,
            MsgType::Unknown(other) => other,
        }
    }
}

/// Message attribute ids.
pub mod attr {
    pub const STATUS: u8 = 1;
    pub const OBJPATH: u8 = 2;
    pub const OBJID: u8 = 3;
    pub const METHOD: u8 = 4;
    pub const OBJTYPE: u8 = 5;
    pub const SIGNATURE: u8 = 6;
    pub const DATA: u8 = 7;
    pub const TARGET: u8 = 8;
    pub const ACTIVE: u8 = 9;
    pub const NO_REPLY: u8 = 10;
    pub const SUBSCRIBERS: u8 = 11;
    pub const USER: u8 = 12;
    pub const GROUP: u8 = 13;
}

/// Completion status reported by the daemon or the remote object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    InvalidCommand,
    InvalidArgument,
    MethodNotFound,
    NotFound,
    NoData,
    PermissionDenied,
    Timeout,
    NotSupported,
    UnknownError,
    ConnectionFailed,
    Other(i32),
}

impl StatusCode {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => StatusCode::Ok,
            1 => StatusCode::InvalidCommand,
            2 => StatusCode::InvalidArgument,
            3 => StatusCode::MethodNotFound,
            4 => StatusCode::NotFound,
            5 => StatusCode::NoData,
            6 => StatusCode::PermissionDenied,
            7 => StatusCode::Timeout,
            8 => StatusCode::NotSupported,
            9 => StatusCode::UnknownError,
            10 => StatusCode::ConnectionFailed,
            other => StatusCode::Other(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            StatusCode::Ok => 0,
            StatusCode::InvalidCommand => 1,
            StatusCode::InvalidArgument => 2,
            StatusCode::MethodNotFound => 3,
            StatusCode::NotFound => 4,
            StatusCode::NoData => 5,
            StatusCode::PermissionDenied => 6,
            StatusCode::Timeout => 7,
            StatusCode::NotSupported => 8,
            StatusCode::UnknownError => 9,
            StatusCode::ConnectionFailed => 10,
            StatusCode::Other(code) => code,
        }
    }

    pub fn is_ok(self) -> bool {
        self == StatusCode::Ok
    }

    pub fn name(self) -> &'static str {
        match self {
            StatusCode::Ok => "Ok",
            StatusCode::InvalidCommand => "InvalidCommand",
            StatusCode::InvalidArgument => "InvalidArgument",
            StatusCode::MethodNotFound => "MethodNotFound",
            StatusCode::NotFound => "NotFound",
            StatusCode::NoData => "NoData",
            StatusCode::PermissionDenied => "PermissionDenied",
            StatusCode::Timeout => "Timeout",
            StatusCode::NotSupported => "NotSupported",
            StatusCode::UnknownError => "UnknownError",
            StatusCode::ConnectionFailed => "ConnectionFailed",
            StatusCode::Other(_) => "Other",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub msg_type: MsgType,
    pub seq: u16,
    pub peer: u32,
}

/// A complete ubus frame with its top-level attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub header: Header,
    pub attrs: Vec<RawAttr>,
}

impl Message {
    pub fn new(msg_type: MsgType, seq: u16, peer: u32, attrs: Vec<RawAttr>) -> Self {
        Self {
            header: Header {
                version: MSG_VERSION,
                msg_type,
                seq,
                peer,
            },
            attrs,
        }
    }

    pub fn encode(&self) -> Bytes {
        let body_len: usize = self.attrs.iter().map(RawAttr::encoded_len).sum();
        let mut buf = BytesMut::with_capacity(HEADER_LEN + ATTR_HEADER_LEN + body_len);

        buf.put_u8(self.header.version);
        buf.put_u8(self.header.msg_type.as_u8());
        buf.put_u16(self.header.seq);
        buf.put_u32(self.header.peer);
        buf.put_u32(attr_header(0, false, ATTR_HEADER_LEN + body_len));
        for attr in &self.attrs {
            attr.encode(&mut buf);
        }

        buf.freeze()
    }

    /// Takes one complete frame off the front of `buf`.
    ///
    /// Returns `Ok(None)` while the frame is still incomplete; `buf` is left
    /// untouched in that case.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Message>, BusError> {
        if buf.len() < HEADER_LEN + ATTR_HEADER_LEN {
            return Ok(None);
        }

        let (_, _, raw_len) = split_header((&buf[HEADER_LEN..]).get_u32());
        if raw_len < ATTR_HEADER_LEN {
            return Err(BusError::Malformed(format!(
                "container length {} is shorter than its header",
                raw_len
            )));
        }

        let total = HEADER_LEN + raw_len;
        if total > MAX_MESSAGE_LEN {
            return Err(BusError::Malformed(format!(
                "frame of {} bytes exceeds the {} byte limit",
                total, MAX_MESSAGE_LEN
            )));
        }
        if buf.len() < total {
            return Ok(None);
        }

        let mut frame = buf.split_to(total).freeze();
        let header = Header {
            version: frame.get_u8(),
            msg_type: MsgType::from_u8(frame.get_u8()),
            seq: frame.get_u16(),
            peer: frame.get_u32(),
        };
        if header.version != MSG_VERSION {
            return Err(BusError::Malformed(format!(
                "unsupported protocol version {}",
                header.version
            )));
        }

        let attrs = RawAttr::parse_all(&frame.slice(ATTR_HEADER_LEN..))?;
        Ok(Some(Message { header, attrs }))
    }

    pub fn attr(&self, id: u8) -> Option<&RawAttr> {
        self.attrs.iter().find(|a| a.id == id)
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.attr(attr::STATUS)?
            .as_u32()
            .map(|code| StatusCode::from_code(code as i32))
    }

    pub fn object_id(&self) -> Option<u32> {
        self.attr(attr::OBJID)?.as_u32()
    }

    pub fn object_path(&self) -> Option<&str> {
        self.attr(attr::OBJPATH)?.as_str()
    }

    /// Decoded DATA table, if the message carries one.
    pub fn data(&self) -> Result<Option<Vec<BlobMsgField>>, BusError> {
        match self.attr(attr::DATA) {
            Some(data) => Ok(Some(BlobMsgField::decode_table(&data.payload)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::BlobMsgValue;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(StatusCode::from_code(0), StatusCode::Ok);
        assert_eq!(StatusCode::from_code(4), StatusCode::NotFound);
        assert_eq!(StatusCode::from_code(99), StatusCode::Other(99));
        assert_eq!(StatusCode::MethodNotFound.code(), 3);
        assert!(StatusCode::Ok.is_ok());
        assert!(!StatusCode::NoData.is_ok());
    }

    #[test]
    fn test_status_code_display() {
        assert_eq!(StatusCode::NotFound.to_string(), "NotFound (4)");
        assert_eq!(StatusCode::Other(-2).to_string(), "Other (-2)");
    }

    #[test]
    fn test_msg_type_mapping() {
        assert_eq!(MsgType::from_u8(5), MsgType::Invoke);
        assert_eq!(MsgType::Lookup.as_u8(), 4);
        assert_eq!(MsgType::from_u8(200), MsgType::Unknown(200));
    }

    #[test]
    fn test_encode_lookup_frame_layout() {
        let msg = Message::new(
            MsgType::Lookup,
            0x0102,
            0,
            vec![RawAttr::string(attr::OBJPATH, "gps")],
        );
        let wire = msg.encode();

        assert_eq!(
            &wire[..],
            &[
                0x00, 0x04, 0x01, 0x02, 0x00, 0x00, 0x00, 0x00, // header
                0x00, 0x00, 0x00, 0x0c, // container, len 12
                0x02, 0x00, 0x00, 0x08, b'g', b'p', b's', 0x00, // OBJPATH
            ]
        );
    }

    #[test]
    fn test_decode_waits_for_complete_frame() {
        let wire = Message::new(MsgType::Status, 7, 1, vec![RawAttr::u32(attr::STATUS, 0)]).encode();

        let mut partial = BytesMut::from(&wire[..wire.len() - 2]);
        assert!(Message::decode(&mut partial).unwrap().is_none());
        assert_eq!(partial.len(), wire.len() - 2);

        let mut full = BytesMut::from(&wire[..]);
        full.extend_from_slice(&[0xaa]);
        let msg = Message::decode(&mut full).unwrap().unwrap();
        assert_eq!(msg.header.seq, 7);
        assert_eq!(msg.status(), Some(StatusCode::Ok));
        assert_eq!(&full[..], &[0xaa]);
    }

    #[test]
    fn test_decode_data_reply() {
        let reply = Message::new(
            MsgType::Data,
            3,
            0x10,
            vec![
                RawAttr::u32(attr::OBJID, 0x10),
                RawAttr::table(
                    attr::DATA,
                    &[BlobMsgField::new("latitude", BlobMsgValue::String("45.5".into()))],
                ),
            ],
        );

        let mut buf = BytesMut::from(&reply.encode()[..]);
        let msg = Message::decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.header.msg_type, MsgType::Data);
        assert_eq!(msg.object_id(), Some(0x10));

        let data = msg.data().unwrap().unwrap();
        assert_eq!(data[0].name, "latitude");
        assert!(msg.status().is_none());
    }

    #[test]
    fn test_decode_rejects_oversized_frame() {
        let mut buf = BytesMut::from(&[0x00, 0x02, 0x00, 0x01, 0, 0, 0, 0, 0x00, 0xff, 0xff, 0xff][..]);
        assert!(matches!(
            Message::decode(&mut buf),
            Err(BusError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_rejects_bad_version() {
        let mut wire = BytesMut::from(&Message::new(MsgType::Ping, 1, 0, vec![]).encode()[..]);
        wire[0] = 9;
        assert!(Message::decode(&mut wire).is_err());
    }
}
