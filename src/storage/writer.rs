//! Session file writer

use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use bytemuck::bytes_of;
use tempfile::NamedTempFile;

use super::format::{header_crc, CollectionDocument, FileHeader};
use crate::recording::SessionCollection;
use crate::{ReplayError, Result};

/// Writer for session files
pub struct SessionWriter;

impl SessionWriter {
    /// Encode a collection into file bytes
    ///
    /// # Errors
    ///
    /// Returns error if the collection cannot be serialized
    pub fn encode(collection: &SessionCollection) -> Result<Vec<u8>> {
        let document = CollectionDocument {
            sessions: collection.iter().cloned().collect(),
        };
        let payload = toml::to_string(&document)
            .map_err(|e| ReplayError::InvalidFormat(format!("Failed to encode sessions: {e}")))?;

        let mut header = FileHeader::default();
        header.session_count = u32::try_from(collection.len())
            .map_err(|_| ReplayError::Other("Too many sessions".to_string()))?;
        header.message_count = u32::try_from(collection.message_count())
            .map_err(|_| ReplayError::Other("Too many messages".to_string()))?;
        header.payload_len = payload.len() as u64;
        header.payload_crc = crc32fast::hash(payload.as_bytes());
        header.saved_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        header.header_crc = header_crc(bytes_of(&header));

        let mut data = Vec::with_capacity(super::HEADER_SIZE + payload.len());
        data.extend_from_slice(bytes_of(&header));
        data.extend_from_slice(payload.as_bytes());
        Ok(data)
    }

    /// Replace the file at `path` with the encoded collection
    ///
    /// The bytes go to a temporary file in the same directory, which is synced
    /// and renamed over `path`, so readers never observe a partial write.
    ///
    /// # Errors
    ///
    /// Returns error if encoding or any filesystem step fails
    pub fn write(path: &Path, collection: &SessionCollection) -> Result<()> {
        let data = Self::encode(collection)?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(&data)?;
        file.as_file().sync_all()?;
        file.persist(path).map_err(|e| ReplayError::Io(e.error))?;

        Ok(())
    }
}
