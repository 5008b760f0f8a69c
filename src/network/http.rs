//! Conversions between hyper messages and recorded messages

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderName, HeaderValue};
use hyper::{StatusCode, Uri};
use tracing::warn;

use crate::config::LimitsConfig;
use crate::fingerprint::normalize_path;
use crate::message::{Request, Response};
use crate::{ReplayError, Result};

/// Headers hyper manages per connection; never replayed verbatim
const HOP_BY_HOP: [&str; 3] = ["connection", "keep-alive", "transfer-encoding"];

/// Marker header on responses generated by the mock itself
pub const MOCK_ERROR_HEADER: &str = "x-mock-error";

/// HTTP helpers shared by the mock server and the live client
pub struct HttpHandler;

impl HttpHandler {
    /// Create a simple text response
    #[must_use]
    pub fn create_response(status: StatusCode, body: &str) -> hyper::Response<Full<Bytes>> {
        let mut response = hyper::Response::new(Full::new(Bytes::from(body.to_string())));
        *response.status_mut() = status;
        response
    }

    /// Create an error response describing a playback failure
    #[must_use]
    pub fn error_response(error: &ReplayError) -> hyper::Response<Full<Bytes>> {
        let (status, kind) = match error {
            ReplayError::SessionNotFound(_) | ReplayError::FileNotFound(_) => {
                (StatusCode::NOT_FOUND, "not-found")
            }
            ReplayError::DataTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "too-large"),
            ReplayError::ExhaustedSession { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "exhausted"),
            ReplayError::RequestMismatch { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "mismatch"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };

        let mut response = Self::create_response(status, &format!("Error: {error}"));
        response
            .headers_mut()
            .insert(MOCK_ERROR_HEADER, HeaderValue::from_static(kind));
        response
    }

    /// Check declared size and header count of an incoming request
    ///
    /// # Errors
    ///
    /// Returns error if request is too large or has too many headers
    pub fn validate_request<B>(request: &hyper::Request<B>, limits: &LimitsConfig) -> Result<()> {
        if let Some(length) = request
            .headers()
            .get(hyper::header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<usize>().ok())
        {
            if length > limits.max_request_size {
                return Err(ReplayError::DataTooLarge {
                    size: length,
                    limit: limits.max_request_size,
                });
            }
        }

        let header_count = request.headers().len();
        if header_count > limits.max_headers {
            return Err(ReplayError::Other(format!(
                "Too many headers: {header_count} > {}",
                limits.max_headers
            )));
        }

        Ok(())
    }

    /// Read a body with size limit
    ///
    /// # Errors
    ///
    /// Returns error if body is too large or read fails
    pub async fn read_body<B>(body: B, max_size: usize) -> Result<Bytes>
    where
        B: hyper::body::Body,
        B::Error: std::fmt::Display,
    {
        let collected = body
            .collect()
            .await
            .map_err(|e| ReplayError::Other(format!("Failed to read body: {e}")))?;

        let bytes = collected.to_bytes();

        if bytes.len() > max_size {
            return Err(ReplayError::DataTooLarge {
                size: bytes.len(),
                limit: max_size,
            });
        }

        Ok(bytes)
    }

    /// Convert an incoming request, stripping the server prefix from its URI
    ///
    /// # Errors
    ///
    /// Returns error if the request violates the limits
    pub async fn into_request<B>(
        request: hyper::Request<B>,
        prefix: &str,
        limits: &LimitsConfig,
    ) -> Result<Request>
    where
        B: hyper::body::Body,
        B::Error: std::fmt::Display,
    {
        Self::validate_request(&request, limits)?;

        let (parts, body) = request.into_parts();
        let body = Self::read_body(body, limits.max_request_size).await?;

        Ok(Request {
            method: parts.method.as_str().to_string(),
            uri: Self::relative_uri(&parts.uri, prefix),
            headers: header_pairs(&parts.headers)?,
            body: body.to_vec(),
        })
    }

    /// Path and query of `uri` with `prefix` removed
    #[must_use]
    pub fn relative_uri(uri: &Uri, prefix: &str) -> String {
        let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
        let prefix = prefix.trim_end_matches('/');
        if prefix.is_empty() {
            return normalize_path(path_and_query);
        }

        match path_and_query.strip_prefix(prefix) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('?') => {
                normalize_path(rest)
            }
            _ => normalize_path(path_and_query),
        }
    }

    /// Build a hyper response carrying a recorded response verbatim
    ///
    /// # Errors
    ///
    /// Returns error if the recorded status code is invalid
    pub fn into_hyper_response(response: &Response) -> Result<hyper::Response<Full<Bytes>>> {
        let status = StatusCode::from_u16(response.status).map_err(|e| {
            ReplayError::InvalidFormat(format!("Invalid status {}: {e}", response.status))
        })?;

        let mut out = hyper::Response::new(Full::new(Bytes::from(response.body.clone())));
        *out.status_mut() = status;

        for (name, value) in &response.headers {
            if HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h)) {
                continue;
            }
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    out.headers_mut().append(name, value);
                }
                _ => warn!("Skipping unrepresentable header: {}", name),
            }
        }

        Ok(out)
    }
}

/// Header map as ordered name/value pairs
///
/// # Errors
///
/// Returns `InvalidFormat` if a value is not UTF-8, since it could not be
/// recorded without loss
pub(crate) fn header_pairs(headers: &hyper::HeaderMap) -> Result<Vec<(String, String)>> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = std::str::from_utf8(value.as_bytes()).map_err(|e| {
                ReplayError::InvalidFormat(format!("Header '{name}' is not UTF-8: {e}"))
            })?;
            Ok((name.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Empty;

    #[test]
    fn test_error_response() {
        let error = ReplayError::ExhaustedSession {
            session: "Quota".to_string(),
            len: 2,
        };
        let response = HttpHandler::error_response(&error);

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[MOCK_ERROR_HEADER], "exhausted");
    }

    #[test]
    fn test_error_response_not_found() {
        let error = ReplayError::SessionNotFound("x".to_string());
        let response = HttpHandler::error_response(&error);

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validate_request_too_large() {
        let request = hyper::Request::builder()
            .method("POST")
            .uri("/test")
            .header(hyper::header::CONTENT_LENGTH, "10000")
            .body(Empty::<Bytes>::new())
            .unwrap();
        let limits = LimitsConfig {
            max_request_size: 1024,
            ..LimitsConfig::default()
        };

        let result = HttpHandler::validate_request(&request, &limits);
        assert!(matches!(result, Err(ReplayError::DataTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_read_body_too_large() {
        let body = Full::new(Bytes::from("test data that is too long"));

        let result = HttpHandler::read_body(body, 5).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_into_request_strips_prefix() {
        let request = hyper::Request::builder()
            .method("PUT")
            .uri("/mock/servers/abc?api-version=1.0")
            .header("User-Agent", "CloudCmdlets/0.1.0")
            .body(Full::new(Bytes::from_static(b"payload")))
            .unwrap();

        let converted = HttpHandler::into_request(request, "/mock/", &LimitsConfig::default())
            .await
            .unwrap();

        assert_eq!(converted.method, "PUT");
        assert_eq!(converted.uri, "/servers/abc?api-version=1.0");
        assert_eq!(converted.user_agent(), "CloudCmdlets/0.1.0");
        assert_eq!(converted.body, b"payload");
    }

    #[test]
    fn test_relative_uri() {
        let uri: Uri = "/mock".parse().unwrap();
        assert_eq!(HttpHandler::relative_uri(&uri, "/mock/"), "/");

        let uri: Uri = "/mockery/x".parse().unwrap();
        assert_eq!(HttpHandler::relative_uri(&uri, "/mock"), "/mockery/x");

        let uri: Uri = "/servers?x=1".parse().unwrap();
        assert_eq!(HttpHandler::relative_uri(&uri, "/"), "/servers?x=1");
    }

    #[test]
    fn test_header_pairs_keep_utf8_and_reject_raw_bytes() {
        let mut headers = hyper::HeaderMap::new();
        headers.insert("x-display-name", HeaderValue::from_bytes("café".as_bytes()).unwrap());
        assert_eq!(
            header_pairs(&headers).unwrap(),
            vec![("x-display-name".to_string(), "café".to_string())]
        );

        headers.insert("x-raw", HeaderValue::from_bytes(b"\xff\xfe").unwrap());
        assert!(matches!(
            header_pairs(&headers),
            Err(ReplayError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_into_hyper_response_drops_hop_by_hop() {
        let recorded = Response::new(202)
            .with_header("Transfer-Encoding", "chunked")
            .with_header("x-ms-request-id", "abc")
            .with_body(b"ok".to_vec());

        let response = HttpHandler::into_hyper_response(&recorded).unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(response.headers().get("transfer-encoding").is_none());
        assert_eq!(response.headers()["x-ms-request-id"], "abc");
    }
}
