//! HTTP client for live services and for driving the mock server

use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Method, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use tokio::runtime::Runtime;
use tracing::{debug, warn};

use crate::config::LimitsConfig;
use crate::message::{Request, Response};
use crate::transport::Transport;
use crate::{ReplayError, Result};

use super::http::{header_pairs, HttpHandler};

/// Async HTTP client bound to a base URI
pub struct HttpClient {
    client: Client<HttpConnector, Full<Bytes>>,
    base_uri: String,
    max_response_size: usize,
}

impl HttpClient {
    /// Create a client resolving request URIs against `base_uri`
    #[must_use]
    pub fn new(base_uri: impl Into<String>) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(10)
            .build_http();

        Self {
            client,
            base_uri: base_uri.into(),
            max_response_size: LimitsConfig::default().max_response_size,
        }
    }

    /// Cap the response body size
    #[must_use]
    pub fn with_max_response_size(mut self, max_response_size: usize) -> Self {
        self.max_response_size = max_response_size;
        self
    }

    /// Base URI requests are resolved against
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// Send a request
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be built, sent or read
    pub async fn send(&self, request: &Request) -> Result<Response> {
        let uri = build_uri(&self.base_uri, &request.uri)?;

        debug!("Sending {} {}", request.method, uri);

        let method = request.method.parse::<Method>().map_err(|e| {
            ReplayError::Other(format!("Invalid HTTP method '{}': {e}", request.method))
        })?;

        let mut request_builder = hyper::Request::builder().method(method).uri(uri);
        for (name, value) in &request.headers {
            request_builder = request_builder.header(name.as_str(), value.as_str());
        }

        let http_request = request_builder
            .body(Full::new(Bytes::copy_from_slice(&request.body)))
            .map_err(|e| ReplayError::Other(format!("Failed to build request: {e}")))?;

        let response = self.client.request(http_request).await.map_err(|e| {
            warn!("Request failed: {e}");
            ReplayError::Other(format!("Request failed: {e}"))
        })?;

        let status = response.status().as_u16();
        let headers = header_pairs(response.headers())?;
        let body = HttpHandler::read_body(response.into_body(), self.max_response_size).await?;

        Ok(Response {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

/// Synchronous [`Transport`] over [`HttpClient`]
///
/// Owns a current-thread runtime, so it must not be used from inside another
/// tokio runtime.
pub struct BlockingClient {
    client: HttpClient,
    runtime: Runtime,
}

impl BlockingClient {
    /// Create a blocking client for `base_uri`
    ///
    /// # Errors
    ///
    /// Returns error if the runtime cannot be created
    pub fn new(base_uri: impl Into<String>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(Self {
            client: HttpClient::new(base_uri),
            runtime,
        })
    }

    /// Base URI requests are resolved against
    pub fn base_uri(&self) -> &str {
        self.client.base_uri()
    }
}

impl Transport for BlockingClient {
    fn send(&mut self, request: Request) -> Result<Response> {
        self.runtime.block_on(self.client.send(&request))
    }
}

/// Join a base URI and a relative path-and-query
fn build_uri(base: &str, relative: &str) -> Result<Uri> {
    let base = base.trim_end_matches('/');
    let relative = relative.trim_start_matches('/');
    let uri = format!("{base}/{relative}");

    uri.parse::<Uri>()
        .map_err(|e| ReplayError::Other(format!("Invalid URI '{uri}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_uri_simple() {
        let uri = build_uri("http://example.com:80", "/api/test").unwrap();
        assert_eq!(uri.to_string(), "http://example.com:80/api/test");
    }

    #[test]
    fn test_build_uri_with_prefix_and_query() {
        let uri = build_uri("http://127.0.0.1:9000/mock/", "/servers?api-version=1.0").unwrap();
        assert_eq!(
            uri.to_string(),
            "http://127.0.0.1:9000/mock/servers?api-version=1.0"
        );
    }

    #[test]
    fn test_build_uri_invalid() {
        assert!(build_uri("http://exa mple.com", "/").is_err());
    }

    #[test]
    fn test_blocking_client_creation() {
        let client = BlockingClient::new("http://127.0.0.1:1").unwrap();
        assert_eq!(client.base_uri(), "http://127.0.0.1:1");
    }

    #[test]
    fn test_connection_refused_is_error() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let mut client = BlockingClient::new(format!("http://127.0.0.1:{port}")).unwrap();

        let result = client.send(Request::new("GET", "/"));
        assert!(result.is_err());
    }
}
