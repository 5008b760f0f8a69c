//! Persisted session collections

mod format;
mod reader;
mod writer;

use std::path::{Path, PathBuf};

use tracing::info;

pub use format::{header_crc, FileHeader, FILE_MAGIC, FILE_VERSION, HEADER_SIZE};
pub use reader::SessionReader;
pub use writer::SessionWriter;

use crate::recording::{HttpSession, SessionCollection};
use crate::{ReplayError, Result};

/// Validate session file magic and version
///
/// # Errors
///
/// Returns error if magic or version is invalid
pub fn validate_header(header: &FileHeader) -> Result<()> {
    if header.magic != FILE_MAGIC {
        return Err(ReplayError::InvalidFormat(format!(
            "Invalid magic bytes: expected {:?}, got {:?}",
            FILE_MAGIC, header.magic
        )));
    }

    if header.version != FILE_VERSION {
        return Err(ReplayError::InvalidFormat(format!(
            "Unsupported version: {}, expected {}",
            header.version, FILE_VERSION
        )));
    }

    Ok(())
}

/// Backing file for a session collection
///
/// The file is read on load and written only by [`SessionStore::save`].
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Store backed by `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the backing file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load every session
    ///
    /// # Errors
    ///
    /// Returns `FileNotFound` if the file is missing, or a format error
    pub fn load_collection(&self) -> Result<SessionCollection> {
        let collection = SessionReader::open(&self.path)?.read_collection()?;
        info!(
            "Loaded {} sessions from {}",
            collection.len(),
            self.path.display()
        );
        Ok(collection)
    }

    /// Load every session, or start empty when the file does not exist yet
    ///
    /// # Errors
    ///
    /// Returns error if an existing file cannot be read
    pub fn load_or_default(&self) -> Result<SessionCollection> {
        match self.load_collection() {
            Err(ReplayError::FileNotFound(_)) => Ok(SessionCollection::new()),
            other => other,
        }
    }

    /// Load a single session by name
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` if the collection has no such session
    pub fn load(&self, name: &str) -> Result<HttpSession> {
        let mut collection = self.load_collection()?;
        collection
            .remove(name)
            .ok_or_else(|| ReplayError::SessionNotFound(name.to_string()))
    }

    /// Atomically replace the backing file with `collection`
    ///
    /// # Errors
    ///
    /// Returns error if the collection cannot be written
    pub fn save(&self, collection: &SessionCollection) -> Result<()> {
        SessionWriter::write(&self.path, collection)?;
        info!(
            "Saved {} sessions ({} messages) to {}",
            collection.len(),
            collection.message_count(),
            self.path.display()
        );
        Ok(())
    }
}
