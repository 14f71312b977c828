//! PackStream serialization format.
//!
//! PackStream is the binary serialization format the Bolt protocol uses for
//! every message. This engine only needs it to carry messages, so values are
//! opaque: graph, temporal and spatial structures travel as raw
//! [`PackStreamStructure`]s (tag + fields) and are left for a value layer to
//! interpret.
//!
//! - **Scalars**: Null, Boolean, Integer (smallest marker wins), Float
//! - **Sized**: String, Bytes, List, Map (tiny / 8 / 16 / 32-bit size classes)
//! - **Structure**: tag byte plus up to 65535 fields

pub mod decoder;
pub mod encoder;
pub mod marker;
pub mod value;

pub use decoder::{decode, PackStreamDecoder};
pub use encoder::{encode, PackStreamEncoder};
pub use value::{PackStreamStructure, PackStreamValue};

use std::fmt;

/// PackStream errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackStreamError {
    /// Unexpected end of input
    UnexpectedEof,
    /// Unknown marker byte
    UnknownMarker(u8),
    /// Invalid UTF-8 in string
    InvalidUtf8(String),
    /// Invalid map key (must be string)
    InvalidMapKey,
    /// Value too large to encode
    ValueTooLarge(&'static str, usize),
    /// Invalid structure format
    InvalidStructure(String),
}

impl fmt::Display for PackStreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackStreamError::UnexpectedEof => write!(f, "Unexpected end of PackStream data"),
            PackStreamError::UnknownMarker(m) => write!(f, "Unknown PackStream marker: 0x{:02X}", m),
            PackStreamError::InvalidUtf8(e) => write!(f, "Invalid UTF-8 in string: {}", e),
            PackStreamError::InvalidMapKey => write!(f, "Map keys must be strings"),
            PackStreamError::ValueTooLarge(t, s) => write!(f, "{} too large: {} entries", t, s),
            PackStreamError::InvalidStructure(msg) => write!(f, "Invalid structure: {}", msg),
        }
    }
}

impl std::error::Error for PackStreamError {}
