//! Network layer for cmdlet-replay
//!
//! A loopback mock server replaying sessions over real HTTP, and the client
//! used against live services.

mod client;
mod http;
mod server;

pub use client::{BlockingClient, HttpClient};
pub use http::{HttpHandler, MOCK_ERROR_HEADER};
pub use server::MockHttpServer;

/// Graceful shutdown timeout
pub const SHUTDOWN_TIMEOUT_MS: u64 = 5000;
