//! Session file layout
//!
//! ```text
//! +----------------------+  0
//! | FileHeader (64 B)    |
//! +----------------------+  64
//! | TOML payload         |
//! +----------------------+  64 + payload_len
//! ```

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::recording::HttpSession;

/// File magic bytes: "CMRS\x00\x01\x00\x00"
pub const FILE_MAGIC: [u8; 8] = [0x43, 0x4D, 0x52, 0x53, 0x00, 0x01, 0x00, 0x00];

/// Current format version
pub const FILE_VERSION: u32 = 1;

/// File header size
pub const HEADER_SIZE: usize = 64;

/// Byte range of the header CRC field, excluded from its own checksum
pub const HEADER_CRC_RANGE: std::ops::Range<usize> = 12..16;

/// File header (64 bytes, little-endian)
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct FileHeader {
    /// Magic bytes for file format identification
    pub magic: [u8; 8],

    /// Format version
    pub version: u32,

    /// CRC32 of header (excluding this field)
    pub header_crc: u32,

    /// Number of sessions stored
    pub session_count: u32,

    /// Number of messages across all sessions
    pub message_count: u32,

    /// Length of the payload following the header
    pub payload_len: u64,

    /// CRC32 of the payload
    pub payload_crc: u32,

    /// Format flags, currently zero
    pub flags: u32,

    /// Save timestamp (Unix epoch nanoseconds)
    pub saved_at: u64,

    /// Reserved for future use
    pub reserved: [u8; 16],
}

static_assertions::const_assert_eq!(std::mem::size_of::<FileHeader>(), HEADER_SIZE);

impl Default for FileHeader {
    fn default() -> Self {
        Self {
            magic: FILE_MAGIC,
            version: FILE_VERSION,
            ..Zeroable::zeroed()
        }
    }
}

/// Payload document
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CollectionDocument {
    /// Sessions in name order
    #[serde(default)]
    pub sessions: Vec<HttpSession>,
}

/// CRC32 over a serialized header, skipping the CRC field
#[must_use]
pub fn header_crc(header_bytes: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&header_bytes[..HEADER_CRC_RANGE.start]);
    hasher.update(&header_bytes[HEADER_CRC_RANGE.end..HEADER_SIZE]);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_header() {
        let header = FileHeader::default();
        assert_eq!(header.magic, FILE_MAGIC);
        assert_eq!(header.version, FILE_VERSION);
        assert_eq!(header.payload_len, 0);
    }

    #[test]
    fn test_header_crc_ignores_crc_field() {
        let mut header = FileHeader::default();
        header.session_count = 3;
        let before = header_crc(bytemuck::bytes_of(&header));

        header.header_crc = 0xDEAD_BEEF;
        let after = header_crc(bytemuck::bytes_of(&header));

        assert_eq!(before, after);
    }

    #[test]
    fn test_header_crc_covers_counts() {
        let mut header = FileHeader::default();
        let before = header_crc(bytemuck::bytes_of(&header));

        header.message_count = 1;
        assert_ne!(before, header_crc(bytemuck::bytes_of(&header)));
    }
}
