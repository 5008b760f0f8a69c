//! Recorder capturing live traffic into a session

use tracing::debug;

use crate::fingerprint::{fingerprint_request, short_hex};
use crate::message::{Request, Response};
use crate::transport::Transport;
use crate::Result;

use super::session::HttpSession;

/// Transport that forwards to a live transport and records every exchange
pub struct Recorder<'a, T> {
    inner: T,
    session: &'a mut HttpSession,
}

impl<'a, T: Transport> Recorder<'a, T> {
    /// Wrap `inner`, appending exchanges to `session`
    pub fn new(inner: T, session: &'a mut HttpSession) -> Self {
        Self { inner, session }
    }

    /// Number of messages recorded so far
    pub fn recorded(&self) -> usize {
        self.session.len()
    }

    /// Release the inner transport
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Transport> Transport for Recorder<'_, T> {
    fn send(&mut self, request: Request) -> Result<Response> {
        let response = self.inner.send(request.clone())?;
        let hash = fingerprint_request(&request);
        let method = request.method.clone();
        let uri = request.uri.clone();

        let index = self.session.record(request, response.clone());

        debug!(
            "Recorded #{} {} {} -> {} (session: {}, hash: {})",
            index,
            method,
            uri,
            response.status,
            self.session.name(),
            short_hex(&hash)
        );

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReplayError;

    /// Live stand-in answering with the request URI as body
    struct EchoTransport {
        calls: usize,
    }

    impl Transport for EchoTransport {
        fn send(&mut self, request: Request) -> Result<Response> {
            self.calls += 1;
            if request.uri == "/fail" {
                return Err(ReplayError::Other("connection refused".to_string()));
            }
            Ok(Response::new(200).with_body(request.uri.into_bytes()))
        }
    }

    #[test]
    fn test_records_in_order() {
        let mut session = HttpSession::new("test1").unwrap();
        let mut recorder = Recorder::new(EchoTransport { calls: 0 }, &mut session);

        for i in 0..5 {
            let response = recorder
                .send(Request::new("GET", format!("/api/test/{i}")))
                .unwrap();
            assert_eq!(response.body, format!("/api/test/{i}").into_bytes());
        }
        assert_eq!(recorder.recorded(), 5);
        assert_eq!(recorder.into_inner().calls, 5);

        let uris: Vec<_> = session
            .messages()
            .iter()
            .map(|m| m.request.uri.as_str())
            .collect();
        assert_eq!(uris[0], "/api/test/0");
        assert_eq!(uris[4], "/api/test/4");
    }

    #[test]
    fn test_failed_send_not_recorded() {
        let mut session = HttpSession::new("test1").unwrap();
        let mut recorder = Recorder::new(EchoTransport { calls: 0 }, &mut session);

        assert!(recorder.send(Request::new("GET", "/fail")).is_err());
        assert_eq!(recorder.recorded(), 0);
    }
}
