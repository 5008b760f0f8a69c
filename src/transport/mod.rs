//! Transport seam between cmdlets and the HTTP stack
//!
//! Cmdlets only see [`Transport`]. Live runs plug in a
//! [`BlockingClient`](crate::network::BlockingClient), tests plug in a
//! [`MockTransport`] replaying a recorded session.

mod mock;

pub use mock::MockTransport;

use crate::message::{Request, Response};
use crate::Result;

/// Synchronous request/response channel
pub trait Transport {
    /// Send a request and wait for its response
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be delivered or, for mock
    /// transports, does not match the recording
    fn send(&mut self, request: Request) -> Result<Response>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, request: Request) -> Result<Response> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, request: Request) -> Result<Response> {
        (**self).send(request)
    }
}
