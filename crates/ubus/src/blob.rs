//! `blob` and `blobmsg` encoding as used by libubox.
//!
//! Every ubus message body is a tree of blob attributes. Each attribute
//! starts with a big-endian 32-bit word:
//!
//! ```text
//!  31   30..24   23..0
//! +---+--------+-----------------------------+
//! | E |   id   |  length (header included)   |
//! +---+--------+-----------------------------+
//! ```
//!
//! followed by the payload, padded to a 4-byte boundary. When the extended
//! bit `E` is set the attribute is a *blobmsg* field: the payload starts with
//! a 16-bit name length, the NUL-terminated name (padded), then the value,
//! and `id` holds the blobmsg type.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::error::BusError;

const ATTR_EXTENDED: u32 = 0x8000_0000;
const ATTR_ID_MASK: u32 = 0x7f00_0000;
const ATTR_ID_SHIFT: u32 = 24;
const ATTR_LEN_MASK: u32 = 0x00ff_ffff;
const ATTR_ALIGN: usize = 4;

/// Size of the id/length word that starts every attribute.
pub const ATTR_HEADER_LEN: usize = 4;

/// Rounds `len` up to the blob alignment.
pub fn pad_len(len: usize) -> usize {
    (len + ATTR_ALIGN - 1) & !(ATTR_ALIGN - 1)
}

/// Builds the id/length word for an attribute whose total length
/// (header included) is `len`.
pub fn attr_header(id: u8, extended: bool, len: usize) -> u32 {
    let mut word = ((id as u32) << ATTR_ID_SHIFT) & ATTR_ID_MASK;
    if extended {
        word |= ATTR_EXTENDED;
    }
    word | (len as u32 & ATTR_LEN_MASK)
}

/// Splits an id/length word into `(id, extended, len)`.
pub fn split_header(word: u32) -> (u8, bool, usize) {
    (
        ((word & ATTR_ID_MASK) >> ATTR_ID_SHIFT) as u8,
        word & ATTR_EXTENDED != 0,
        (word & ATTR_LEN_MASK) as usize,
    )
}

/// One undecoded blob attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttr {
    pub id: u8,
    pub extended: bool,
    pub payload: Bytes,
}

impl RawAttr {
    /// Plain (non-blobmsg) attribute with an arbitrary payload.
    pub fn new(id: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            id,
            extended: false,
            payload: payload.into(),
        }
    }

    /// Plain attribute carrying a big-endian 32-bit integer.
    pub fn u32(id: u8, value: u32) -> Self {
        Self::new(id, Bytes::copy_from_slice(&value.to_be_bytes()))
    }

    /// Plain attribute carrying a NUL-terminated string.
    pub fn string(id: u8, value: &str) -> Self {
        let mut buf = BytesMut::with_capacity(value.len() + 1);
        buf.put_slice(value.as_bytes());
        buf.put_u8(0);
        Self::new(id, buf.freeze())
    }

    /// Plain attribute whose payload is a blobmsg table.
    pub fn table(id: u8, fields: &[BlobMsgField]) -> Self {
        Self::new(id, BlobMsgField::encode_all(fields))
    }

    pub fn as_u32(&self) -> Option<u32> {
        let bytes: [u8; 4] = self.payload.get(..4)?.try_into().ok()?;
        Some(u32::from_be_bytes(bytes))
    }

    /// Payload up to the first NUL, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        let end = self
            .payload
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(self.payload.len());
        std::str::from_utf8(&self.payload[..end]).ok()
    }

    /// Length on the wire, padding included.
    pub fn encoded_len(&self) -> usize {
        pad_len(ATTR_HEADER_LEN + self.payload.len())
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        let raw_len = ATTR_HEADER_LEN + self.payload.len();
        buf.put_u32(attr_header(self.id, self.extended, raw_len));
        buf.put_slice(&self.payload);
        buf.put_bytes(0, pad_len(raw_len) - raw_len);
    }

    /// Parses a sequence of attributes filling `buf` entirely.
    pub fn parse_all(buf: &Bytes) -> Result<Vec<RawAttr>, BusError> {
        let mut attrs = Vec::new();
        let mut offset = 0;

        while offset < buf.len() {
            let mut rest = &buf[offset..];
            if rest.len() < ATTR_HEADER_LEN {
                return Err(BusError::Malformed(format!(
                    "truncated attribute header at offset {}",
                    offset
                )));
            }

            let (id, extended, raw_len) = split_header(rest.get_u32());
            if raw_len < ATTR_HEADER_LEN || offset + raw_len > buf.len() {
                return Err(BusError::Malformed(format!(
                    "attribute at offset {} claims {} bytes, {} available",
                    offset,
                    raw_len,
                    buf.len() - offset
                )));
            }

            attrs.push(RawAttr {
                id,
                extended,
                payload: buf.slice(offset + ATTR_HEADER_LEN..offset + raw_len),
            });
            offset += pad_len(raw_len);
        }

        Ok(attrs)
    }
}

/// blobmsg value types, numbered as in `blobmsg.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobMsgType {
    Unspec,
    Array,
    Table,
    String,
    Int64,
    Int32,
    Int16,
    /// Also used for booleans.
    Int8,
    Double,
    Unknown(u8),
}

impl BlobMsgType {
    pub fn from_id(id: u8) -> Self {
        match id {
            0 => BlobMsgType::Unspec,
            1 => BlobMsgType::Array,
            2 => BlobMsgType::Table,
            3 => BlobMsgType::String,
            4 => BlobMsgType::Int64,
            5 => BlobMsgType::Int32,
            6 => BlobMsgType::Int16,
            7 => BlobMsgType::Int8,
            8 => BlobMsgType::Double,
            other => BlobMsgType::Unknown(other),
        }
    }

    pub fn id(self) -> u8 {
        match self {
            BlobMsgType::Unspec => 0,
            BlobMsgType::Array => 1,
            BlobMsgType::Table => 2,
            BlobMsgType::String => 3,
            BlobMsgType::Int64 => 4,
            BlobMsgType::Int32 => 5,
            BlobMsgType::Int16 => 6,
            BlobMsgType::Int8 => 7,
            BlobMsgType::Double => 8,
            BlobMsgType::Unknown(id) => id,
        }
    }
}

/// A decoded blobmsg value.
#[derive(Debug, Clone, PartialEq)]
pub enum BlobMsgValue {
    Unspec,
    Array(Vec<BlobMsgField>),
    Table(Vec<BlobMsgField>),
    String(String),
    Int64(i64),
    Int32(i32),
    Int16(i16),
    Int8(i8),
    Double(f64),
    /// A type this decoder does not know; the payload is kept verbatim.
    Unknown { type_id: u8, raw: Bytes },
}

impl BlobMsgValue {
    pub fn kind(&self) -> BlobMsgType {
        match self {
            BlobMsgValue::Unspec => BlobMsgType::Unspec,
            BlobMsgValue::Array(_) => BlobMsgType::Array,
            BlobMsgValue::Table(_) => BlobMsgType::Table,
            BlobMsgValue::String(_) => BlobMsgType::String,
            BlobMsgValue::Int64(_) => BlobMsgType::Int64,
            BlobMsgValue::Int32(_) => BlobMsgType::Int32,
            BlobMsgValue::Int16(_) => BlobMsgType::Int16,
            BlobMsgValue::Int8(_) => BlobMsgType::Int8,
            BlobMsgValue::Double(_) => BlobMsgType::Double,
            BlobMsgValue::Unknown { type_id, .. } => BlobMsgType::Unknown(*type_id),
        }
    }
}

/// A named blobmsg field.
#[derive(Debug, Clone, PartialEq)]
pub struct BlobMsgField {
    pub name: String,
    pub value: BlobMsgValue,
}

impl BlobMsgField {
    pub fn new(name: impl Into<String>, value: BlobMsgValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Decodes one extended attribute into a named field.
    pub fn decode(attr: &RawAttr) -> Result<Self, BusError> {
        if !attr.extended {
            return Err(BusError::Malformed(format!(
                "attribute id {} is not a blobmsg field",
                attr.id
            )));
        }

        let payload = &attr.payload;
        if payload.len() < 2 {
            return Err(BusError::Malformed("blobmsg header too short".into()));
        }
        let name_len = u16::from_be_bytes([payload[0], payload[1]]) as usize;
        let header_len = pad_len(2 + name_len + 1);
        if payload.len() < header_len {
            return Err(BusError::Malformed(format!(
                "blobmsg name of {} bytes overruns a {} byte attribute",
                name_len,
                payload.len()
            )));
        }

        let name = String::from_utf8_lossy(&payload[2..2 + name_len]).into_owned();
        let data = payload.slice(header_len..);

        let value = match BlobMsgType::from_id(attr.id) {
            BlobMsgType::Unspec => BlobMsgValue::Unspec,
            BlobMsgType::Array => BlobMsgValue::Array(Self::decode_table(&data)?),
            BlobMsgType::Table => BlobMsgValue::Table(Self::decode_table(&data)?),
            BlobMsgType::String => {
                let end = data.iter().position(|b| *b == 0).unwrap_or(data.len());
                BlobMsgValue::String(String::from_utf8_lossy(&data[..end]).into_owned())
            }
            BlobMsgType::Int64 => BlobMsgValue::Int64(i64::from_be_bytes(fixed(&data, &name)?)),
            BlobMsgType::Int32 => BlobMsgValue::Int32(i32::from_be_bytes(fixed(&data, &name)?)),
            BlobMsgType::Int16 => BlobMsgValue::Int16(i16::from_be_bytes(fixed(&data, &name)?)),
            BlobMsgType::Int8 => BlobMsgValue::Int8(i8::from_be_bytes(fixed(&data, &name)?)),
            BlobMsgType::Double => {
                BlobMsgValue::Double(f64::from_bits(u64::from_be_bytes(fixed(&data, &name)?)))
            }
            BlobMsgType::Unknown(type_id) => BlobMsgValue::Unknown { type_id, raw: data },
        };

        Ok(Self { name, value })
    }

    /// Decodes every field of a table (or array) payload.
    pub fn decode_table(payload: &Bytes) -> Result<Vec<Self>, BusError> {
        RawAttr::parse_all(payload)?
            .iter()
            .map(Self::decode)
            .collect()
    }

    pub fn to_attr(&self) -> RawAttr {
        let mut buf = BytesMut::new();
        buf.put_u16(self.name.len() as u16);
        buf.put_slice(self.name.as_bytes());
        buf.put_u8(0);
        buf.put_bytes(0, pad_len(buf.len()) - buf.len());

        match &self.value {
            BlobMsgValue::Unspec => {}
            BlobMsgValue::Array(children) | BlobMsgValue::Table(children) => {
                for child in children {
                    child.to_attr().encode(&mut buf);
                }
            }
            BlobMsgValue::String(s) => {
                buf.put_slice(s.as_bytes());
                buf.put_u8(0);
            }
            BlobMsgValue::Int64(v) => buf.put_i64(*v),
            BlobMsgValue::Int32(v) => buf.put_i32(*v),
            BlobMsgValue::Int16(v) => buf.put_i16(*v),
            BlobMsgValue::Int8(v) => buf.put_i8(*v),
            BlobMsgValue::Double(v) => buf.put_u64(v.to_bits()),
            BlobMsgValue::Unknown { raw, .. } => buf.put_slice(raw),
        }

        RawAttr {
            id: self.value.kind().id(),
            extended: true,
            payload: buf.freeze(),
        }
    }

    /// Encodes `fields` back to back, as the body of a table.
    pub fn encode_all(fields: &[BlobMsgField]) -> Bytes {
        let mut buf = BytesMut::new();
        for field in fields {
            field.to_attr().encode(&mut buf);
        }
        buf.freeze()
    }
}

fn fixed<const N: usize>(data: &[u8], name: &str) -> Result<[u8; N], BusError> {
    data.get(..N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| {
            BusError::Malformed(format!(
                "field '{}' needs {} bytes, got {}",
                name,
                N,
                data.len()
            ))
        })
}
