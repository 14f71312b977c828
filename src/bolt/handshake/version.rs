//! Bolt protocol version definitions.

use std::fmt;

/// Bolt protocol versions this engine speaks.
///
/// The raw value is the big-endian handshake word `[0, 0, minor, major]`,
/// so Bolt 4.3 is `0x0000_0304`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum BoltVersion {
    /// Bolt 3
    V3 = 0x0000_0003,
    /// Bolt 4.0 - database selection, bounded PULL/DISCARD
    V4_0 = 0x0000_0004,
    /// Bolt 4.1 - NOOP chunks
    V4_1 = 0x0000_0104,
    /// Bolt 4.2
    V4_2 = 0x0000_0204,
    /// Bolt 4.3 - ROUTE message
    V4_3 = 0x0000_0304,
    /// Bolt 4.4 - impersonation
    V4_4 = 0x0000_0404,
}

impl BoltVersion {
    /// All supported versions in order of preference (newest first).
    pub const ALL: [BoltVersion; 6] = [
        BoltVersion::V4_4,
        BoltVersion::V4_3,
        BoltVersion::V4_2,
        BoltVersion::V4_1,
        BoltVersion::V4_0,
        BoltVersion::V3,
    ];

    /// Look up a version by major and minor number.
    pub fn from_parts(major: u8, minor: u8) -> Option<Self> {
        Self::from_u32((u32::from(minor) << 8) | u32::from(major))
    }

    /// Create a BoltVersion from a raw handshake word. Range bits are ignored.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value & 0x0000_FFFF {
            0x0000_0003 => Some(BoltVersion::V3),
            0x0000_0004 => Some(BoltVersion::V4_0),
            0x0000_0104 => Some(BoltVersion::V4_1),
            0x0000_0204 => Some(BoltVersion::V4_2),
            0x0000_0304 => Some(BoltVersion::V4_3),
            0x0000_0404 => Some(BoltVersion::V4_4),
            _ => None,
        }
    }

    /// Get the raw u32 value.
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Get the major version number.
    pub fn major(self) -> u8 {
        (self.as_u32() & 0xFF) as u8
    }

    /// Get the minor version number.
    pub fn minor(self) -> u8 {
        ((self.as_u32() >> 8) & 0xFF) as u8
    }

    /// Convert to big-endian bytes.
    pub fn to_bytes(self) -> [u8; 4] {
        self.as_u32().to_be_bytes()
    }
}

impl fmt::Display for BoltVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())
    }
}

impl PartialOrd for BoltVersion {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BoltVersion {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.major(), self.minor()).cmp(&(other.major(), other.minor()))
    }
}

/// One handshake slot: a version plus how many older minors it also accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionProposal {
    /// Newest version in the slot
    pub version: BoltVersion,
    /// Number of preceding minors also accepted
    pub range: u8,
}

impl VersionProposal {
    /// Exact version only.
    pub fn exact(version: BoltVersion) -> Self {
        Self { version, range: 0 }
    }

    /// `version` and the `range` minors below it.
    pub fn with_range(version: BoltVersion, range: u8) -> Self {
        Self {
            version,
            range: range.min(version.minor()),
        }
    }

    /// Wire form `[0, range, minor, major]`.
    pub fn to_bytes(self) -> [u8; 4] {
        [0, self.range, self.version.minor(), self.version.major()]
    }

    /// Versions covered by this slot, newest first.
    pub fn versions(self) -> impl Iterator<Item = BoltVersion> {
        let major = self.version.major();
        let minor = self.version.minor();
        (minor.saturating_sub(self.range)..=minor)
            .rev()
            .filter_map(move |m| BoltVersion::from_parts(major, m))
    }
}

impl From<BoltVersion> for VersionProposal {
    fn from(version: BoltVersion) -> Self {
        Self::exact(version)
    }
}
