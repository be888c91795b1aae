//! Decoded reply attributes.

use std::fmt;

use gps_monitor_ubus::{BlobMsgField, BlobMsgValue};
use tracing::trace;

/// A scalar attribute value as carried on the bus.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    String(String),
    Int32(i32),
    Int64(i64),
    Double(f64),
}

impl AttrValue {
    /// Converts a blobmsg value, or `None` for the types that are not kept
    /// (small integers, containers, unknown types).
    pub fn from_blobmsg(value: &BlobMsgValue) -> Option<Self> {
        match value {
            BlobMsgValue::String(s) => Some(AttrValue::String(s.clone())),
            BlobMsgValue::Int32(v) => Some(AttrValue::Int32(*v)),
            BlobMsgValue::Int64(v) => Some(AttrValue::Int64(*v)),
            BlobMsgValue::Double(v) => Some(AttrValue::Double(*v)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            AttrValue::String(_) => "string",
            AttrValue::Int32(_) => "int32",
            AttrValue::Int64(_) => "int64",
            AttrValue::Double(_) => "double",
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::String(s) => f.write_str(s),
            AttrValue::Int32(v) => write!(f, "{}", v),
            AttrValue::Int64(v) => write!(f, "{}", v),
            AttrValue::Double(v) => write!(f, "{}", v),
        }
    }
}

/// Named attributes of the latest reply. Names are unique; inserting an
/// existing name replaces its value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeBuffer {
    entries: Vec<(String, AttrValue)>,
}

impl AttributeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: AttrValue) {
        let name = name.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Copies every usable field of a reply table into the buffer and
    /// returns how many were stored.
    pub fn absorb(&mut self, fields: &[BlobMsgField]) -> usize {
        let mut stored = 0;
        for field in fields {
            if field.name.is_empty() {
                trace!("Skipping unnamed reply field");
                continue;
            }
            match AttrValue::from_blobmsg(&field.value) {
                Some(value) => {
                    self.insert(field.name.as_str(), value);
                    stored += 1;
                }
                None => trace!(
                    name = %field.name,
                    kind = ?field.value.kind(),
                    "Skipping reply field of unsupported type"
                ),
            }
        }
        stored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_existing_name() {
        let mut buffer = AttributeBuffer::new();
        buffer.insert("speed", AttrValue::String("1.0".into()));
        buffer.insert("speed", AttrValue::String("2.0".into()));

        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.get("speed"), Some(&AttrValue::String("2.0".into())));
    }

    #[test]
    fn test_absorb_keeps_scalars_and_skips_the_rest() {
        let fields = vec![
            BlobMsgField::new("latitude", BlobMsgValue::String("40.0".into())),
            BlobMsgField::new("sats", BlobMsgValue::Int32(9)),
            BlobMsgField::new("epoch", BlobMsgValue::Int64(1_700_000_000)),
            BlobMsgField::new("hdop", BlobMsgValue::Double(0.9)),
            BlobMsgField::new("valid", BlobMsgValue::Int8(1)),
            BlobMsgField::new("mode", BlobMsgValue::Int16(3)),
            BlobMsgField::new("raw", BlobMsgValue::Table(vec![])),
            BlobMsgField::new("list", BlobMsgValue::Array(vec![])),
            BlobMsgField::new(
                "future",
                BlobMsgValue::Unknown {
                    type_id: 42,
                    raw: bytes::Bytes::new(),
                },
            ),
            BlobMsgField::new("", BlobMsgValue::String("anonymous".into())),
        ];

        let mut buffer = AttributeBuffer::new();
        assert_eq!(buffer.absorb(&fields), 4);
        assert_eq!(buffer.get("sats"), Some(&AttrValue::Int32(9)));
        assert_eq!(buffer.get("epoch"), Some(&AttrValue::Int64(1_700_000_000)));
        assert_eq!(buffer.get("hdop"), Some(&AttrValue::Double(0.9)));
        assert!(buffer.get("valid").is_none());
        assert!(buffer.get("raw").is_none());
    }

    #[test]
    fn test_as_str_only_for_strings() {
        assert_eq!(AttrValue::String("x".into()).as_str(), Some("x"));
        assert_eq!(AttrValue::Int32(1).as_str(), None);
        assert_eq!(AttrValue::Double(1.5).type_name(), "double");
        assert_eq!(AttrValue::Int64(-3).to_string(), "-3");
    }

    #[test]
    fn test_clear_empties_buffer() {
        let mut buffer = AttributeBuffer::new();
        buffer.insert("age", AttrValue::String("2".into()));
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.iter().count(), 0);
    }
}
