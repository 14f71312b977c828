//! PackStream encoder.

use bytes::{BufMut, BytesMut};

use super::marker;
use super::value::{PackStreamStructure, PackStreamValue};
use super::PackStreamError;

/// Marker family for a sized container: tiny base plus 8/16/32-bit markers.
struct SizedMarkers {
    kind: &'static str,
    tiny: Option<u8>,
    m8: u8,
    m16: u8,
    m32: Option<u8>,
}

const STRING: SizedMarkers = SizedMarkers {
    kind: "string",
    tiny: Some(marker::TINY_STRING),
    m8: marker::STRING_8,
    m16: marker::STRING_16,
    m32: Some(marker::STRING_32),
};

const BYTES: SizedMarkers = SizedMarkers {
    kind: "bytes",
    tiny: None,
    m8: marker::BYTES_8,
    m16: marker::BYTES_16,
    m32: Some(marker::BYTES_32),
};

const LIST: SizedMarkers = SizedMarkers {
    kind: "list",
    tiny: Some(marker::TINY_LIST),
    m8: marker::LIST_8,
    m16: marker::LIST_16,
    m32: Some(marker::LIST_32),
};

const MAP: SizedMarkers = SizedMarkers {
    kind: "map",
    tiny: Some(marker::TINY_MAP),
    m8: marker::MAP_8,
    m16: marker::MAP_16,
    m32: Some(marker::MAP_32),
};

const STRUCT: SizedMarkers = SizedMarkers {
    kind: "structure",
    tiny: Some(marker::TINY_STRUCT),
    m8: marker::STRUCT_8,
    m16: marker::STRUCT_16,
    m32: None,
};

/// PackStream encoder writing into a growable buffer.
#[derive(Debug, Default)]
pub struct PackStreamEncoder {
    buffer: BytesMut,
}

impl PackStreamEncoder {
    /// Create an encoder with a small initial buffer.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(256),
        }
    }

    /// Consume the encoder and return the bytes.
    pub fn into_bytes(self) -> BytesMut {
        self.buffer
    }

    /// Encode a value.
    pub fn encode(&mut self, value: &PackStreamValue) -> Result<(), PackStreamError> {
        match value {
            PackStreamValue::Null => self.buffer.put_u8(marker::NULL),
            PackStreamValue::Boolean(true) => self.buffer.put_u8(marker::TRUE),
            PackStreamValue::Boolean(false) => self.buffer.put_u8(marker::FALSE),
            PackStreamValue::Integer(i) => self.encode_int(*i),
            PackStreamValue::Float(f) => {
                self.buffer.put_u8(marker::FLOAT_64);
                self.buffer.put_f64(*f);
            }
            PackStreamValue::Bytes(b) => {
                self.header(&BYTES, b.len())?;
                self.buffer.put_slice(b);
            }
            PackStreamValue::String(s) => self.encode_string(s)?,
            PackStreamValue::List(items) => {
                self.header(&LIST, items.len())?;
                for item in items {
                    self.encode(item)?;
                }
            }
            PackStreamValue::Map(map) => {
                self.header(&MAP, map.len())?;
                for (key, item) in map {
                    self.encode_string(key)?;
                    self.encode(item)?;
                }
            }
            PackStreamValue::Structure(s) => self.encode_structure(s)?,
        }
        Ok(())
    }

    /// Encode a structure header, tag and fields.
    pub fn encode_structure(&mut self, s: &PackStreamStructure) -> Result<(), PackStreamError> {
        self.header(&STRUCT, s.fields.len())?;
        self.buffer.put_u8(s.tag);
        for field in &s.fields {
            self.encode(field)?;
        }
        Ok(())
    }

    fn encode_string(&mut self, s: &str) -> Result<(), PackStreamError> {
        self.header(&STRING, s.len())?;
        self.buffer.put_slice(s.as_bytes());
        Ok(())
    }

    fn encode_int(&mut self, value: i64) {
        if (-16..=127).contains(&value) {
            self.buffer.put_i8(value as i8);
        } else if i8::try_from(value).is_ok() {
            self.buffer.put_u8(marker::INT_8);
            self.buffer.put_i8(value as i8);
        } else if i16::try_from(value).is_ok() {
            self.buffer.put_u8(marker::INT_16);
            self.buffer.put_i16(value as i16);
        } else if i32::try_from(value).is_ok() {
            self.buffer.put_u8(marker::INT_32);
            self.buffer.put_i32(value as i32);
        } else {
            self.buffer.put_u8(marker::INT_64);
            self.buffer.put_i64(value);
        }
    }

    fn header(&mut self, markers: &SizedMarkers, len: usize) -> Result<(), PackStreamError> {
        match markers.tiny {
            Some(base) if len <= marker::TINY_MAX_LEN => {
                self.buffer.put_u8(base | len as u8);
                return Ok(());
            }
            _ => {}
        }
        if let Ok(n) = u8::try_from(len) {
            self.buffer.put_u8(markers.m8);
            self.buffer.put_u8(n);
        } else if let Ok(n) = u16::try_from(len) {
            self.buffer.put_u8(markers.m16);
            self.buffer.put_u16(n);
        } else {
            match (markers.m32, u32::try_from(len)) {
                (Some(m32), Ok(n)) => {
                    self.buffer.put_u8(m32);
                    self.buffer.put_u32(n);
                }
                _ => return Err(PackStreamError::ValueTooLarge(markers.kind, len)),
            }
        }
        Ok(())
    }
}

/// Encode a single value to bytes.
pub fn encode(value: &PackStreamValue) -> Result<BytesMut, PackStreamError> {
    let mut encoder = PackStreamEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}
