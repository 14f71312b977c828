//! PackStream marker bytes.

/// Null
pub const NULL: u8 = 0xC0;
/// 64-bit IEEE 754 float
pub const FLOAT_64: u8 = 0xC1;
/// Boolean false
pub const FALSE: u8 = 0xC2;
/// Boolean true
pub const TRUE: u8 = 0xC3;

/// Integer, 1 byte follows
pub const INT_8: u8 = 0xC8;
/// Integer, 2 bytes follow
pub const INT_16: u8 = 0xC9;
/// Integer, 4 bytes follow
pub const INT_32: u8 = 0xCA;
/// Integer, 8 bytes follow
pub const INT_64: u8 = 0xCB;

/// Byte array, u8 length
pub const BYTES_8: u8 = 0xCC;
/// Byte array, u16 length
pub const BYTES_16: u8 = 0xCD;
/// Byte array, u32 length
pub const BYTES_32: u8 = 0xCE;

/// String, u8 length
pub const STRING_8: u8 = 0xD0;
/// String, u16 length
pub const STRING_16: u8 = 0xD1;
/// String, u32 length
pub const STRING_32: u8 = 0xD2;

/// List, u8 length
pub const LIST_8: u8 = 0xD4;
/// List, u16 length
pub const LIST_16: u8 = 0xD5;
/// List, u32 length
pub const LIST_32: u8 = 0xD6;

/// Map, u8 entry count
pub const MAP_8: u8 = 0xD8;
/// Map, u16 entry count
pub const MAP_16: u8 = 0xD9;
/// Map, u32 entry count
pub const MAP_32: u8 = 0xDA;

/// Structure, u8 field count
pub const STRUCT_8: u8 = 0xDC;
/// Structure, u16 field count
pub const STRUCT_16: u8 = 0xDD;

// Tiny families: high nibble is the family, low nibble the size (0..=15).
/// String of up to 15 bytes
pub const TINY_STRING: u8 = 0x80;
/// List of up to 15 items
pub const TINY_LIST: u8 = 0x90;
/// Map of up to 15 entries
pub const TINY_MAP: u8 = 0xA0;
/// Structure of up to 15 fields
pub const TINY_STRUCT: u8 = 0xB0;
/// Largest size a tiny marker can carry
pub const TINY_MAX_LEN: usize = 15;
