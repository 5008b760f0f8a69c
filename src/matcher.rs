//! Request matching against recorded messages
//!
//! A session carries one [`RequestValidator`]. Validation is pure: it compares
//! the recorded request with the actual one and reports the first differing
//! field.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fingerprint::body_digest;
use crate::message::Request;

/// Client identifier expected in the user-agent by default
pub const DEFAULT_CLIENT_TOKEN: &str = "CloudCmdlets";

/// Headers owned by the HTTP stack rather than the caller
const TRANSPORT_HEADERS: [&str; 4] = ["host", "content-length", "connection", "transfer-encoding"];

/// Field that differed between expected and actual request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MismatchField {
    /// HTTP method
    Method,
    /// Path and query
    Uri,
    /// Client identifier in the user-agent
    UserAgent,
    /// A named header
    Header(String),
    /// Request body
    Body,
}

impl fmt::Display for MismatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Method => f.write_str("method"),
            Self::Uri => f.write_str("uri"),
            Self::UserAgent => f.write_str("user-agent"),
            Self::Header(name) => write!(f, "header '{name}'"),
            Self::Body => f.write_str("body"),
        }
    }
}

/// Descriptive mismatch between a recorded and an actual request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} differs: expected {expected:?}, got {actual:?}")]
pub struct MismatchError {
    /// Differing field
    pub field: MismatchField,
    /// Recorded value
    pub expected: String,
    /// Actual value
    pub actual: String,
}

impl MismatchError {
    fn new(field: MismatchField, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            field,
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

/// Matching policy selectable per session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestValidator {
    /// Method equality only
    MethodOnly,
    /// Method equality and `token` present in the actual user-agent
    UserAgentToken {
        /// Required client identifier
        token: String,
    },
    /// Method equality and equal values for each listed header
    HeaderSubset {
        /// Header names compared case-insensitively
        headers: Vec<String>,
    },
    /// Method, URI and body byte equality
    ExactBody,
    /// Method, URI, caller-set headers and body equality
    Exact,
}

impl Default for RequestValidator {
    fn default() -> Self {
        Self::user_agent_token(DEFAULT_CLIENT_TOKEN)
    }
}

impl fmt::Display for RequestValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MethodOnly => write!(f, "method"),
            Self::UserAgentToken { token } => write!(f, "method + user-agent ~ {token}"),
            Self::HeaderSubset { headers } => write!(f, "method + headers [{}]", headers.join(", ")),
            Self::ExactBody => write!(f, "method + uri + body"),
            Self::Exact => write!(f, "exact"),
        }
    }
}

impl RequestValidator {
    /// Default policy with a custom client identifier
    #[must_use]
    pub fn user_agent_token(token: impl Into<String>) -> Self {
        Self::UserAgentToken {
            token: token.into(),
        }
    }

    /// Header-subset policy over the given names
    #[must_use]
    pub fn header_subset<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::HeaderSubset {
            headers: headers.into_iter().map(Into::into).collect(),
        }
    }

    /// Compare an actual request against the recorded one
    ///
    /// # Errors
    ///
    /// Returns the first differing field
    pub fn validate(&self, expected: &Request, actual: &Request) -> Result<(), MismatchError> {
        check_method(expected, actual)?;

        match self {
            Self::MethodOnly => Ok(()),
            Self::UserAgentToken { token } => {
                if actual.user_agent().contains(token.as_str()) {
                    Ok(())
                } else {
                    Err(MismatchError::new(
                        MismatchField::UserAgent,
                        format!("contains {token}"),
                        actual.user_agent(),
                    ))
                }
            }
            Self::HeaderSubset { headers } => {
                for name in headers {
                    check_header(name, expected.header(name), actual.header(name))?;
                }
                Ok(())
            }
            Self::ExactBody => {
                check_uri(expected, actual)?;
                check_body(expected, actual)
            }
            Self::Exact => {
                check_uri(expected, actual)?;
                check_all_headers(expected, actual)?;
                check_body(expected, actual)
            }
        }
    }
}

fn check_method(expected: &Request, actual: &Request) -> Result<(), MismatchError> {
    if expected.method == actual.method {
        Ok(())
    } else {
        Err(MismatchError::new(
            MismatchField::Method,
            &expected.method,
            &actual.method,
        ))
    }
}

fn check_uri(expected: &Request, actual: &Request) -> Result<(), MismatchError> {
    if expected.uri == actual.uri {
        Ok(())
    } else {
        Err(MismatchError::new(MismatchField::Uri, &expected.uri, &actual.uri))
    }
}

fn check_body(expected: &Request, actual: &Request) -> Result<(), MismatchError> {
    if expected.body == actual.body {
        Ok(())
    } else {
        Err(MismatchError::new(
            MismatchField::Body,
            body_digest(&expected.body),
            body_digest(&actual.body),
        ))
    }
}

fn check_header(
    name: &str,
    expected: Option<&str>,
    actual: Option<&str>,
) -> Result<(), MismatchError> {
    let expected = expected.map(str::trim);
    let actual = actual.map(str::trim);
    if expected == actual {
        return Ok(());
    }

    Err(MismatchError::new(
        MismatchField::Header(name.to_lowercase()),
        expected.unwrap_or("<absent>"),
        actual.unwrap_or("<absent>"),
    ))
}

fn check_all_headers(expected: &Request, actual: &Request) -> Result<(), MismatchError> {
    let expected = caller_headers(expected);
    let actual = caller_headers(actual);

    for (name, values) in &expected {
        let actual_values = actual.get(name).map(|v| v.join(", "));
        check_header(name, Some(values.join(", ").as_str()), actual_values.as_deref())?;
    }
    for (name, values) in &actual {
        if !expected.contains_key(name) {
            check_header(name, None, Some(values.join(", ").as_str()))?;
        }
    }

    Ok(())
}

/// Caller-set headers by lowercase name; repeated headers keep every value in order
fn caller_headers(request: &Request) -> BTreeMap<String, Vec<String>> {
    let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in &request.headers {
        let name = name.to_lowercase();
        if TRANSPORT_HEADERS.contains(&name.as_str()) {
            continue;
        }
        headers.entry(name).or_default().push(value.trim().to_string());
    }
    headers
}
