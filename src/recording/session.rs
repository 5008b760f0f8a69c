//! Recorded sessions and the collection that persists them

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::matcher::RequestValidator;
use crate::message::{HttpMessage, Request, Response};
use crate::{ReplayError, Result};

use super::MAX_SESSIONS;

/// A named, ordered recording of request/response pairs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSession {
    name: String,
    #[serde(default)]
    base_uri: String,
    #[serde(default)]
    validator: RequestValidator,
    #[serde(default)]
    messages: Vec<HttpMessage>,
}

impl HttpSession {
    /// Create an empty session
    ///
    /// # Errors
    ///
    /// Returns error if the name is invalid
    pub fn new(name: &str) -> Result<Self> {
        validate_session_name(name)?;

        Ok(Self {
            name: name.to_string(),
            base_uri: String::new(),
            validator: RequestValidator::default(),
            messages: Vec::new(),
        })
    }

    /// Set the base prefix URI the messages are relative to
    #[must_use]
    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = base_uri.into();
        self
    }

    /// Set the matching policy
    #[must_use]
    pub fn with_validator(mut self, validator: RequestValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Session name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base prefix URI
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// Update the base prefix URI
    pub fn set_base_uri(&mut self, base_uri: impl Into<String>) {
        self.base_uri = base_uri.into();
    }

    /// Matching policy
    pub fn validator(&self) -> &RequestValidator {
        &self.validator
    }

    /// Replace the matching policy
    pub fn set_validator(&mut self, validator: RequestValidator) {
        self.validator = validator;
    }

    /// Recorded messages in order
    pub fn messages(&self) -> &[HttpMessage] {
        &self.messages
    }

    /// Message at `index`
    pub fn message(&self, index: usize) -> Option<&HttpMessage> {
        self.messages.get(index)
    }

    /// Number of recorded messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append an exchange, returning its index
    pub fn record(&mut self, request: Request, response: Response) -> usize {
        let index = self.messages.len();
        self.messages.push(HttpMessage {
            index,
            request,
            response,
        });
        index
    }

    /// Check that stored indices match positions
    ///
    /// # Errors
    ///
    /// Returns error on the first out-of-place message
    pub(crate) fn check_indices(&self) -> Result<()> {
        for (position, message) in self.messages.iter().enumerate() {
            if message.index != position {
                return Err(ReplayError::InvalidFormat(format!(
                    "Session '{}': message at position {position} has index {}",
                    self.name, message.index
                )));
            }
        }
        Ok(())
    }
}

/// Mapping from session name to session, persisted as a unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCollection {
    sessions: BTreeMap<String, HttpSession>,
}

impl SessionCollection {
    /// Create an empty collection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a session by name
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` if absent
    pub fn get(&self, name: &str) -> Result<&HttpSession> {
        self.sessions
            .get(name)
            .ok_or_else(|| ReplayError::SessionNotFound(name.to_string()))
    }

    /// Mutable lookup by name
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` if absent
    pub fn get_mut(&mut self, name: &str) -> Result<&mut HttpSession> {
        self.sessions
            .get_mut(name)
            .ok_or_else(|| ReplayError::SessionNotFound(name.to_string()))
    }

    /// Get a session, creating an empty one if needed
    ///
    /// # Errors
    ///
    /// Returns error if the name is invalid or the session limit is reached
    pub fn get_or_create(&mut self, name: &str) -> Result<&mut HttpSession> {
        if !self.sessions.contains_key(name) {
            let session = HttpSession::new(name)?;
            self.insert(session)?;
        }
        self.get_mut(name)
    }

    /// Insert a session, replacing any with the same name
    ///
    /// # Errors
    ///
    /// Returns error if a new name would exceed the session limit
    pub fn insert(&mut self, session: HttpSession) -> Result<Option<HttpSession>> {
        if !self.sessions.contains_key(session.name()) && self.sessions.len() >= MAX_SESSIONS {
            return Err(ReplayError::Other(format!(
                "Session limit reached: {MAX_SESSIONS}"
            )));
        }
        Ok(self.sessions.insert(session.name().to_string(), session))
    }

    /// Remove a session
    pub fn remove(&mut self, name: &str) -> Option<HttpSession> {
        self.sessions.remove(name)
    }

    /// Whether a session exists
    pub fn contains(&self, name: &str) -> bool {
        self.sessions.contains_key(name)
    }

    /// Session names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }

    /// Sessions in name order
    pub fn iter(&self) -> impl Iterator<Item = &HttpSession> {
        self.sessions.values()
    }

    /// Number of sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the collection is empty
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Total messages across all sessions
    pub fn message_count(&self) -> usize {
        self.sessions.values().map(HttpSession::len).sum()
    }
}

impl FromIterator<HttpSession> for SessionCollection {
    fn from_iter<I: IntoIterator<Item = HttpSession>>(iter: I) -> Self {
        Self {
            sessions: iter
                .into_iter()
                .map(|session| (session.name().to_string(), session))
                .collect(),
        }
    }
}

/// Validate a session name
///
/// # Errors
///
/// Returns error if session name is invalid
pub fn validate_session_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ReplayError::InvalidSessionName(
            "Session name cannot be empty".to_string(),
        ));
    }

    if name.len() > 255 {
        return Err(ReplayError::InvalidSessionName(format!(
            "Session name too long: {} > 255",
            name.len()
        )));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(ReplayError::InvalidSessionName(
            "Session name cannot contain path separators".to_string(),
        ));
    }

    if name.starts_with('.') {
        return Err(ReplayError::InvalidSessionName(
            "Session name cannot start with dot".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(ReplayError::InvalidSessionName(
            "Session name cannot contain null bytes".to_string(),
        ));
    }

    if name.contains("..") {
        return Err(ReplayError::InvalidSessionName(
            "Session name cannot contain '..'".to_string(),
        ));
    }

    Ok(())
}
