//! Session file reader

use std::fs::File;
use std::io;
use std::path::Path;

use memmap2::Mmap;
use tracing::debug;

use super::format::{header_crc, CollectionDocument, FileHeader};
use crate::recording::SessionCollection;
use crate::{ReplayError, Result};

/// Reader for session files
pub struct SessionReader {
    _file: File,
    mmap: Mmap,
    header: FileHeader,
}

impl SessionReader {
    /// Open and verify an existing session file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be opened, mapped, or is invalid
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ReplayError::FileNotFound(path.display().to_string()),
            _ => ReplayError::Io(e),
        })?;

        if file.metadata()?.len() < super::HEADER_SIZE as u64 {
            return Err(ReplayError::InvalidFormat(
                "File too small to contain header".to_string(),
            ));
        }

        // SAFETY: the file is opened read-only and session files are only
        // replaced by rename, never modified in place.
        let mmap = unsafe { Mmap::map(&file)? };

        let header: FileHeader = bytemuck::pod_read_unaligned(&mmap[..super::HEADER_SIZE]);
        super::validate_header(&header)?;

        let computed_crc = header_crc(&mmap[..super::HEADER_SIZE]);
        if header.header_crc != computed_crc {
            return Err(ReplayError::CorruptedData {
                offset: 0,
                expected: header.header_crc,
                actual: computed_crc,
            });
        }

        let end = super::HEADER_SIZE as u64 + header.payload_len;
        if end > mmap.len() as u64 {
            return Err(ReplayError::InvalidFormat(format!(
                "Payload extends beyond file: {end} > {}",
                mmap.len()
            )));
        }

        let reader = Self {
            _file: file,
            mmap,
            header,
        };

        let payload_crc = crc32fast::hash(reader.payload());
        if payload_crc != header.payload_crc {
            return Err(ReplayError::CorruptedData {
                offset: super::HEADER_SIZE as u64,
                expected: header.payload_crc,
                actual: payload_crc,
            });
        }

        Ok(reader)
    }

    /// Number of sessions declared by the header
    #[must_use]
    pub fn session_count(&self) -> u32 {
        self.header.session_count
    }

    /// Number of messages declared by the header
    #[must_use]
    pub fn message_count(&self) -> u32 {
        self.header.message_count
    }

    /// Save timestamp (Unix epoch nanoseconds)
    #[must_use]
    pub fn saved_at(&self) -> u64 {
        self.header.saved_at
    }

    /// Raw payload bytes
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        let start = super::HEADER_SIZE;
        &self.mmap[start..start + self.header.payload_len as usize]
    }

    /// Decode the payload into a collection
    ///
    /// # Errors
    ///
    /// Returns error if the payload is not a valid session document or
    /// disagrees with the header counts
    pub fn read_collection(&self) -> Result<SessionCollection> {
        let text = std::str::from_utf8(self.payload())
            .map_err(|e| ReplayError::InvalidFormat(format!("Payload is not UTF-8: {e}")))?;
        let document: CollectionDocument = toml::from_str(text)
            .map_err(|e| ReplayError::InvalidFormat(format!("Failed to decode sessions: {e}")))?;

        if document.sessions.len() != self.header.session_count as usize {
            return Err(ReplayError::InvalidFormat(format!(
                "Header declares {} sessions, payload holds {}",
                self.header.session_count,
                document.sessions.len()
            )));
        }

        for session in &document.sessions {
            crate::recording::validate_session_name(session.name())?;
            session.check_indices()?;
        }

        let collection: SessionCollection = document.sessions.into_iter().collect();
        if collection.len() != self.header.session_count as usize {
            return Err(ReplayError::InvalidFormat(
                "Duplicate session names in payload".to_string(),
            ));
        }
        if collection.message_count() != self.header.message_count as usize {
            return Err(ReplayError::InvalidFormat(format!(
                "Header declares {} messages, payload holds {}",
                self.header.message_count,
                collection.message_count()
            )));
        }

        debug!(
            "Decoded {} sessions ({} messages)",
            collection.len(),
            collection.message_count()
        );

        Ok(collection)
    }
}
