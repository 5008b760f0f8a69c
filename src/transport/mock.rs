//! In-process mock transport

use std::sync::Arc;

use crate::matcher::RequestValidator;
use crate::message::{Request, Response};
use crate::recording::HttpSession;
use crate::replay::{Cursor, Replayer};
use crate::Result;

use super::Transport;

/// Transport answering from a recorded session instead of the network
///
/// Acquired at the start of a test case and released at the end; the cursor
/// it hands back on release lets a later acquisition continue where this one
/// stopped.
pub struct MockTransport {
    replayer: Replayer,
}

impl MockTransport {
    /// Acquire a transport positioned at the first message
    #[must_use]
    pub fn acquire(session: Arc<HttpSession>) -> Self {
        Self {
            replayer: Replayer::new(session),
        }
    }

    /// Acquire a transport positioned at `position`
    #[must_use]
    pub fn resume(session: Arc<HttpSession>, position: usize) -> Self {
        Self {
            replayer: Replayer::resume(session, position),
        }
    }

    /// Override the session's matching policy
    #[must_use]
    pub fn with_validator(self, validator: RequestValidator) -> Self {
        Self {
            replayer: self.replayer.with_validator(validator),
        }
    }

    /// Current position
    pub fn cursor(&self) -> Cursor {
        self.replayer.cursor()
    }

    /// Check that every recorded message was served
    ///
    /// # Errors
    ///
    /// Returns `UnconsumedRecordings` if messages were left over
    pub fn verify_consumed(&self) -> Result<()> {
        self.replayer.verify_consumed()
    }

    /// Release the transport, returning the final cursor
    pub fn release(self) -> Cursor {
        self.replayer.cursor()
    }
}

impl Transport for MockTransport {
    fn send(&mut self, request: Request) -> Result<Response> {
        self.replayer.replay(&request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReplayError;

    #[test]
    fn test_resume_across_acquisitions() {
        let mut session = HttpSession::new("Servers").unwrap();
        session.record(Request::new("POST", "/servers"), Response::new(201));
        session.record(Request::new("GET", "/servers/abc"), Response::new(200));
        let session = Arc::new(session.with_validator(RequestValidator::MethodOnly));

        let mut first = MockTransport::acquire(Arc::clone(&session));
        assert_eq!(first.send(Request::new("POST", "/servers")).unwrap().status, 201);
        let cursor = first.release();

        let mut second = MockTransport::resume(session, cursor.position());
        assert_eq!(second.send(Request::new("GET", "/servers/abc")).unwrap().status, 200);
        assert!(second.verify_consumed().is_ok());

        let err = second.send(Request::new("GET", "/servers")).unwrap_err();
        assert!(matches!(err, ReplayError::ExhaustedSession { .. }));
    }
}
