//! Management cmdlets
//!
//! Each cmdlet binds a few parameters, validates them, issues one request
//! through a [`Transport`] and projects the JSON response into a typed result.
//! Parameter validation runs before anything is sent.

mod compute;
mod media;
mod sql;
mod validate;

pub use compute::{ManagementOperationContext, RestartVm, REQUEST_ID_HEADER};
pub use media::{GetMediaServicesAccount, MediaServicesAccount, RemoveMediaServicesAccount};
pub use sql::{
    GetServer, GetServerQuota, NewServer, RemoveServer, ServerQuota, SetServerPassword,
    SqlDatabaseServerContext, DATA_SERVICE_VERSION,
};
pub use validate::{ValidateGuid, ValidateNotNullOrEmpty};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::message::{Request, Response};
use crate::transport::Transport;
use crate::{ReplayError, Result};

/// User-agent sent by every cmdlet
pub const USER_AGENT: &str = concat!("CloudCmdlets/", env!("CARGO_PKG_VERSION"));

/// Management API version header
pub const API_VERSION_HEADER: &str = "x-ms-version";

/// Management API version sent by every cmdlet
pub const API_VERSION: &str = "2014-05-01";

/// A single management operation
pub trait Cmdlet {
    /// Projected result
    type Output;

    /// Check bound parameters
    ///
    /// # Errors
    ///
    /// Returns `Validation` for malformed parameters
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Issue the request and project the response
    ///
    /// # Errors
    ///
    /// Returns transport errors, `Service` for non-2xx responses, or
    /// `InvalidFormat` if the response cannot be projected
    fn execute(&self, transport: &mut dyn Transport) -> Result<Self::Output>;

    /// Validate, then execute
    ///
    /// # Errors
    ///
    /// See [`validate`](Self::validate) and [`execute`](Self::execute)
    fn run(&self, transport: &mut dyn Transport) -> Result<Self::Output> {
        self.validate()?;
        self.execute(transport)
    }
}

/// Request carrying the headers every management call sends
pub(crate) fn management_request(method: &str, uri: String) -> Request {
    Request::new(method, uri)
        .with_header("User-Agent", USER_AGENT)
        .with_header("Accept", "application/json")
        .with_header(API_VERSION_HEADER, API_VERSION)
}

/// Reject non-2xx responses
///
/// # Errors
///
/// Returns `Service` carrying the status and body
pub fn ensure_success(response: Response) -> Result<Response> {
    if response.is_success() {
        return Ok(response);
    }

    debug!("Service answered {}", response.status);
    Err(ReplayError::Service {
        status: response.status,
        body: String::from_utf8_lossy(&response.body).into_owned(),
    })
}

/// Decode a JSON response body
///
/// # Errors
///
/// Returns `InvalidFormat` if the body is not the expected JSON
pub fn parse_json<T: DeserializeOwned>(response: &Response) -> Result<T> {
    serde_json::from_slice(&response.body)
        .map_err(|e| ReplayError::InvalidFormat(format!("Unexpected response body: {e}")))
}

/// Collection payload: an OData feed, a bare array or a single entity
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum Listing<T> {
    Feed { value: Vec<T> },
    Many(Vec<T>),
    One(T),
}

impl<T> Listing<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            Self::Feed { value } | Self::Many(value) => value,
            Self::One(item) => vec![item],
        }
    }
}
