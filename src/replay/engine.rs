//! Replay engine serving recorded responses in order

use std::sync::Arc;

use tracing::{debug, warn};

use crate::matcher::RequestValidator;
use crate::message::{Request, Response};
use crate::recording::HttpSession;
use crate::{ReplayError, Result};

use super::cursor::Cursor;

/// Serves a read-only session, one message per request
pub struct Replayer {
    session: Arc<HttpSession>,
    validator: RequestValidator,
    cursor: Cursor,
}

impl Replayer {
    /// Start at the first message, using the session's validator
    #[must_use]
    pub fn new(session: Arc<HttpSession>) -> Self {
        let validator = session.validator().clone();
        let cursor = Cursor::new(session.len());
        Self {
            session,
            validator,
            cursor,
        }
    }

    /// Continue from `position` (clamped to the session length)
    #[must_use]
    pub fn resume(session: Arc<HttpSession>, position: usize) -> Self {
        let mut replayer = Self::new(session);
        replayer.cursor = Cursor::resume(position, replayer.session.len());
        replayer
    }

    /// Override the session's matching policy
    #[must_use]
    pub fn with_validator(mut self, validator: RequestValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Session being replayed
    pub fn session(&self) -> &HttpSession {
        &self.session
    }

    /// Current position
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Match `actual` against the next recorded request and return its response
    ///
    /// The cursor advances only on a match.
    ///
    /// # Errors
    ///
    /// Returns `ExhaustedSession` when every message is consumed and
    /// `RequestMismatch` when the validator rejects the request
    pub fn replay(&mut self, actual: &Request) -> Result<Response> {
        let index = self.cursor.position();

        let Some(expected) = self.session.message(index) else {
            warn!(
                "No more requests expected: {} {} (session: {}, recorded: {})",
                actual.method,
                actual.uri,
                self.session.name(),
                self.session.len()
            );
            return Err(ReplayError::ExhaustedSession {
                session: self.session.name().to_string(),
                len: self.session.len(),
            });
        };

        if let Err(mismatch) = self.validator.validate(&expected.request, actual) {
            warn!(
                "Request #{} mismatched in session {}: {}",
                index,
                self.session.name(),
                mismatch
            );
            return Err(ReplayError::RequestMismatch {
                session: self.session.name().to_string(),
                index,
                mismatch,
            });
        }

        let response = expected.response.clone();
        self.cursor.advance();

        debug!(
            "Replayed #{} {} {} -> {} (session: {})",
            index,
            actual.method,
            actual.uri,
            response.status,
            self.session.name()
        );

        Ok(response)
    }

    /// Check that every recorded message was served
    ///
    /// # Errors
    ///
    /// Returns `UnconsumedRecordings` if messages were left over
    pub fn verify_consumed(&self) -> Result<()> {
        if self.cursor.is_exhausted() {
            Ok(())
        } else {
            Err(ReplayError::UnconsumedRecordings {
                session: self.session.name().to_string(),
                consumed: self.cursor.position(),
                len: self.cursor.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::MismatchField;

    fn quota_session() -> Arc<HttpSession> {
        let mut session = HttpSession::new("Quota").unwrap();
        for _ in 0..2 {
            session.record(
                Request::new("GET", "/servers/s1/serverquotas")
                    .with_header("User-Agent", "CloudCmdlets/0.1.0"),
                Response::new(200).with_body(br#"{"Name":"premium_databases"}"#.to_vec()),
            );
        }
        Arc::new(session)
    }

    fn matching_request() -> Request {
        Request::new("GET", "/servers/s1/serverquotas").with_header("User-Agent", "CloudCmdlets/0.1.0")
    }

    #[test]
    fn test_replays_in_order_then_exhausts() {
        let mut replayer = Replayer::new(quota_session());

        for _ in 0..2 {
            let response = replayer.replay(&matching_request()).unwrap();
            assert_eq!(response.status, 200);
        }
        assert!(replayer.cursor().is_exhausted());
        assert!(replayer.verify_consumed().is_ok());

        let err = replayer.replay(&matching_request()).unwrap_err();
        assert!(matches!(err, ReplayError::ExhaustedSession { len: 2, .. }));
        assert_eq!(replayer.cursor().position(), 2);
    }

    #[test]
    fn test_mismatch_does_not_advance() {
        let mut replayer = Replayer::new(quota_session());
        let mut wrong = matching_request();
        wrong.method = "DELETE".to_string();

        let err = replayer.replay(&wrong).unwrap_err();
        match err {
            ReplayError::RequestMismatch {
                index, mismatch, ..
            } => {
                assert_eq!(index, 0);
                assert_eq!(mismatch.field, MismatchField::Method);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(replayer.cursor().position(), 0);
    }

    #[test]
    fn test_leftover_recordings_reported() {
        let mut replayer = Replayer::new(quota_session());
        replayer.replay(&matching_request()).unwrap();

        let err = replayer.verify_consumed().unwrap_err();
        assert!(matches!(
            err,
            ReplayError::UnconsumedRecordings {
                consumed: 1,
                len: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_resume_and_override_validator() {
        let mut replayer = Replayer::resume(quota_session(), 1)
            .with_validator(RequestValidator::MethodOnly);

        let response = replayer.replay(&Request::new("GET", "/anything")).unwrap();
        assert_eq!(response.status, 200);
        assert!(replayer.cursor().is_exhausted());
    }
}
