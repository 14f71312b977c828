//! PackStream decoder.

use std::collections::HashMap;

use bytes::Buf;

use super::marker;
use super::value::{PackStreamStructure, PackStreamValue};
use super::PackStreamError;

/// PackStream decoder reading from a byte slice.
#[derive(Debug)]
pub struct PackStreamDecoder<'a> {
    data: &'a [u8],
}

impl<'a> PackStreamDecoder<'a> {
    /// Create a decoder over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    /// Decode the next value.
    pub fn decode(&mut self) -> Result<PackStreamValue, PackStreamError> {
        let m = self.u8()?;

        // Tiny families are identified by the high nibble.
        let low = usize::from(m & 0x0F);
        match m & 0xF0 {
            marker::TINY_STRING => return self.string(low),
            marker::TINY_LIST => return self.list(low),
            marker::TINY_MAP => return self.map(low),
            marker::TINY_STRUCT => return self.structure(low),
            _ => {}
        }
        if m <= 0x7F || m >= 0xF0 {
            return Ok(PackStreamValue::Integer(i64::from(m as i8)));
        }

        match m {
            marker::NULL => Ok(PackStreamValue::Null),
            marker::TRUE => Ok(PackStreamValue::Boolean(true)),
            marker::FALSE => Ok(PackStreamValue::Boolean(false)),
            marker::FLOAT_64 => {
                self.ensure(8)?;
                Ok(PackStreamValue::Float(self.data.get_f64()))
            }
            marker::INT_8 => {
                self.ensure(1)?;
                Ok(PackStreamValue::Integer(i64::from(self.data.get_i8())))
            }
            marker::INT_16 => {
                self.ensure(2)?;
                Ok(PackStreamValue::Integer(i64::from(self.data.get_i16())))
            }
            marker::INT_32 => {
                self.ensure(4)?;
                Ok(PackStreamValue::Integer(i64::from(self.data.get_i32())))
            }
            marker::INT_64 => {
                self.ensure(8)?;
                Ok(PackStreamValue::Integer(self.data.get_i64()))
            }
            marker::BYTES_8 | marker::BYTES_16 | marker::BYTES_32 => {
                let len = self.size(m - marker::BYTES_8)?;
                let raw = self.take(len)?;
                Ok(PackStreamValue::Bytes(raw.to_vec()))
            }
            marker::STRING_8 | marker::STRING_16 | marker::STRING_32 => {
                let len = self.size(m - marker::STRING_8)?;
                self.string(len)
            }
            marker::LIST_8 | marker::LIST_16 | marker::LIST_32 => {
                let len = self.size(m - marker::LIST_8)?;
                self.list(len)
            }
            marker::MAP_8 | marker::MAP_16 | marker::MAP_32 => {
                let len = self.size(m - marker::MAP_8)?;
                self.map(len)
            }
            marker::STRUCT_8 | marker::STRUCT_16 => {
                let len = self.size(m - marker::STRUCT_8)?;
                self.structure(len)
            }
            other => Err(PackStreamError::UnknownMarker(other)),
        }
    }

    /// Read a length prefix; `class` 0/1/2 selects 8/16/32 bits.
    fn size(&mut self, class: u8) -> Result<usize, PackStreamError> {
        match class {
            0 => Ok(usize::from(self.u8()?)),
            1 => {
                self.ensure(2)?;
                Ok(usize::from(self.data.get_u16()))
            }
            _ => {
                self.ensure(4)?;
                Ok(self.data.get_u32() as usize)
            }
        }
    }

    fn string(&mut self, len: usize) -> Result<PackStreamValue, PackStreamError> {
        let raw = self.take(len)?;
        let s = std::str::from_utf8(raw).map_err(|e| PackStreamError::InvalidUtf8(e.to_string()))?;
        Ok(PackStreamValue::String(s.to_string()))
    }

    fn list(&mut self, len: usize) -> Result<PackStreamValue, PackStreamError> {
        let mut items = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            items.push(self.decode()?);
        }
        Ok(PackStreamValue::List(items))
    }

    fn map(&mut self, len: usize) -> Result<PackStreamValue, PackStreamError> {
        let mut entries = HashMap::with_capacity(len.min(1024));
        for _ in 0..len {
            let key = match self.decode()? {
                PackStreamValue::String(s) => s,
                _ => return Err(PackStreamError::InvalidMapKey),
            };
            let value = self.decode()?;
            entries.insert(key, value);
        }
        Ok(PackStreamValue::Map(entries))
    }

    fn structure(&mut self, len: usize) -> Result<PackStreamValue, PackStreamError> {
        let tag = self.u8()?;
        let mut fields = Vec::with_capacity(len.min(64));
        for _ in 0..len {
            fields.push(self.decode()?);
        }
        Ok(PackStreamValue::Structure(PackStreamStructure::new(tag, fields)))
    }

    fn u8(&mut self) -> Result<u8, PackStreamError> {
        self.ensure(1)?;
        Ok(self.data.get_u8())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], PackStreamError> {
        self.ensure(len)?;
        let (head, tail) = self.data.split_at(len);
        self.data = tail;
        Ok(head)
    }

    fn ensure(&self, n: usize) -> Result<(), PackStreamError> {
        if self.data.len() < n {
            Err(PackStreamError::UnexpectedEof)
        } else {
            Ok(())
        }
    }
}

/// Decode a single value from bytes.
pub fn decode(data: &[u8]) -> Result<PackStreamValue, PackStreamError> {
    PackStreamDecoder::new(data).decode()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_negative_tiny_int() {
        assert_eq!(decode(&[0xF0]).unwrap(), PackStreamValue::Integer(-16));
        assert_eq!(decode(&[0x7F]).unwrap(), PackStreamValue::Integer(127));
    }

    #[test]
    fn test_decode_truncated() {
        assert!(matches!(decode(&[marker::INT_32, 0x00]), Err(PackStreamError::UnexpectedEof)));
        assert!(matches!(decode(&[0x85, b'a']), Err(PackStreamError::UnexpectedEof)));
    }

    #[test]
    fn test_decode_unknown_marker() {
        assert!(matches!(decode(&[0xC4]), Err(PackStreamError::UnknownMarker(0xC4))));
    }

    #[test]
    fn test_decode_non_string_map_key() {
        // tiny map with one entry whose key is the integer 1
        assert!(matches!(decode(&[0xA1, 0x01, 0x01]), Err(PackStreamError::InvalidMapKey)));
    }

    #[test]
    fn test_decode_structure_keeps_tag() {
        let value = decode(&[0xB2, 0x4E, 0x01, 0x90]).unwrap();
        let s = value.as_structure().unwrap();
        assert_eq!(s.tag, 0x4E);
        assert_eq!(s.fields.len(), 2);
    }
}
