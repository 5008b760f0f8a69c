//! Position within a session's ordered message list

/// Count of messages consumed from a session
///
/// Invariant: `position <= len`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    position: usize,
    len: usize,
}

impl Cursor {
    /// Cursor at the start of a session with `len` messages
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self { position: 0, len }
    }

    /// Cursor resumed at `position`, clamped to `len`
    #[must_use]
    pub fn resume(position: usize, len: usize) -> Self {
        Self {
            position: position.min(len),
            len,
        }
    }

    /// Index of the next expected message
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of messages in the session
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the session has no messages
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Messages not yet consumed
    pub fn remaining(&self) -> usize {
        self.len - self.position
    }

    /// Whether every message has been consumed
    pub fn is_exhausted(&self) -> bool {
        self.position == self.len
    }

    /// Move past the current message
    ///
    /// Returns `false` without moving when already exhausted.
    pub(crate) fn advance(&mut self) -> bool {
        if self.is_exhausted() {
            return false;
        }
        self.position += 1;
        true
    }
}
