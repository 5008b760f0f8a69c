//! Database server cmdlets

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use urlencoding::encode;

use crate::transport::Transport;
use crate::Result;

use super::validate::ValidateNotNullOrEmpty;
use super::{ensure_success, management_request, parse_json, Cmdlet, Listing};

/// OData protocol version sent with data-service requests
pub const DATA_SERVICE_VERSION: &str = "3.0;NetFx";

/// A single server quota
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerQuota {
    /// Quota name, lower case
    #[serde(rename = "Name")]
    pub name: String,
    /// Quota limit
    #[serde(rename = "Value")]
    pub value: f64,
}

/// Get-ServerQuota: read one or all quotas of a database server
#[derive(Debug, Clone)]
pub struct GetServerQuota {
    /// Server to query
    pub server_name: String,
    /// Quota to read; all quotas when `None`
    pub quota_name: Option<String>,
}

impl GetServerQuota {
    /// Query every quota of `server_name`
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            quota_name: None,
        }
    }

    /// Restrict the query to one quota
    #[must_use]
    pub fn with_quota_name(mut self, quota_name: impl Into<String>) -> Self {
        self.quota_name = Some(quota_name.into());
        self
    }

    fn uri(&self) -> String {
        let base = format!("/servers/{}/serverquotas", encode(&self.server_name));
        match &self.quota_name {
            Some(quota) => format!("{base}/{}", encode(&quota.to_lowercase())),
            None => base,
        }
    }
}

impl Cmdlet for GetServerQuota {
    type Output = Vec<ServerQuota>;

    fn validate(&self) -> Result<()> {
        ValidateNotNullOrEmpty::validate("ServerName", Some(self.server_name.as_str()))?;
        if let Some(quota) = &self.quota_name {
            ValidateNotNullOrEmpty::validate("QuotaName", Some(quota.as_str()))?;
        }
        Ok(())
    }

    fn execute(&self, transport: &mut dyn Transport) -> Result<Self::Output> {
        let request = management_request("GET", self.uri())
            .with_header("DataServiceVersion", DATA_SERVICE_VERSION)
            .with_header("MaxDataServiceVersion", DATA_SERVICE_VERSION);

        let response = ensure_success(transport.send(request)?)?;
        Ok(parse_json::<Listing<ServerQuota>>(&response)?.into_vec())
    }
}

/// A database server as reported by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlDatabaseServerContext {
    /// Generated server name
    #[serde(rename = "Name")]
    pub server_name: String,
    /// Administrator login
    #[serde(rename = "AdministratorLogin")]
    pub administrator_login: String,
    /// Region hosting the server
    #[serde(rename = "Location")]
    pub location: String,
    /// Server version, absent right after creation
    #[serde(rename = "Version", default)]
    pub version: Option<String>,
    /// Provisioning state
    #[serde(rename = "State", default)]
    pub state: Option<String>,
}

fn server_uri(server_name: &str) -> String {
    format!("/servers/{}", encode(server_name))
}

fn json_request(method: &str, uri: String, body: &serde_json::Value) -> crate::message::Request {
    management_request(method, uri)
        .with_header("Content-Type", "application/json")
        .with_body(body.to_string().into_bytes())
}

/// New-Server: create a database server
#[derive(Debug, Clone)]
pub struct NewServer {
    /// Administrator login
    pub administrator_login: String,
    /// Administrator password
    pub administrator_login_password: String,
    /// Region to create the server in
    pub location: String,
}

impl NewServer {
    /// Create a server administered by `login` in `location`
    pub fn new(
        login: impl Into<String>,
        password: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            administrator_login: login.into(),
            administrator_login_password: password.into(),
            location: location.into(),
        }
    }
}

impl Cmdlet for NewServer {
    type Output = SqlDatabaseServerContext;

    fn validate(&self) -> Result<()> {
        ValidateNotNullOrEmpty::validate("AdministratorLogin", Some(self.administrator_login.as_str()))?;
        ValidateNotNullOrEmpty::validate(
            "AdministratorLoginPassword",
            Some(self.administrator_login_password.as_str()),
        )?;
        ValidateNotNullOrEmpty::validate("Location", Some(self.location.as_str()))
    }

    fn execute(&self, transport: &mut dyn Transport) -> Result<Self::Output> {
        let body = json!({
            "AdministratorLogin": self.administrator_login,
            "AdministratorLoginPassword": self.administrator_login_password,
            "Location": self.location,
        });

        let response = ensure_success(transport.send(json_request("POST", "/servers".to_string(), &body))?)?;
        let server: SqlDatabaseServerContext = parse_json(&response)?;
        debug!("Created server {}", server.server_name);
        Ok(server)
    }
}

/// Get-Server: list servers, or read one by name
#[derive(Debug, Clone, Default)]
pub struct GetServer {
    /// Server to read; all servers when `None`
    pub server_name: Option<String>,
}

impl GetServer {
    /// List every server
    pub fn all() -> Self {
        Self::default()
    }

    /// Read the server called `server_name`
    pub fn named(server_name: impl Into<String>) -> Self {
        Self {
            server_name: Some(server_name.into()),
        }
    }
}

impl Cmdlet for GetServer {
    type Output = Vec<SqlDatabaseServerContext>;

    fn validate(&self) -> Result<()> {
        match &self.server_name {
            Some(name) => ValidateNotNullOrEmpty::validate("ServerName", Some(name.as_str())),
            None => Ok(()),
        }
    }

    fn execute(&self, transport: &mut dyn Transport) -> Result<Self::Output> {
        let uri = match &self.server_name {
            Some(name) => server_uri(name),
            None => "/servers".to_string(),
        };

        let response = ensure_success(transport.send(management_request("GET", uri))?)?;
        Ok(parse_json::<Listing<SqlDatabaseServerContext>>(&response)?.into_vec())
    }
}

/// Set-Server: reset the administrator password
#[derive(Debug, Clone)]
pub struct SetServerPassword {
    /// Server to update
    pub server_name: String,
    /// New administrator password
    pub admin_password: String,
}

impl SetServerPassword {
    /// Reset the password of `server_name`
    pub fn new(server_name: impl Into<String>, admin_password: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            admin_password: admin_password.into(),
        }
    }
}

impl Cmdlet for SetServerPassword {
    type Output = ();

    fn validate(&self) -> Result<()> {
        ValidateNotNullOrEmpty::validate("ServerName", Some(self.server_name.as_str()))?;
        ValidateNotNullOrEmpty::validate("AdminPassword", Some(self.admin_password.as_str()))
    }

    fn execute(&self, transport: &mut dyn Transport) -> Result<Self::Output> {
        let uri = format!("{}?op=ResetPassword", server_uri(&self.server_name));
        let body = json!({ "AdministratorLoginPassword": self.admin_password });

        ensure_success(transport.send(json_request("POST", uri, &body))?)?;
        Ok(())
    }
}

/// Remove-Server: delete a database server
#[derive(Debug, Clone)]
pub struct RemoveServer {
    /// Server to delete
    pub server_name: String,
}

impl RemoveServer {
    /// Delete `server_name`
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
        }
    }
}

impl Cmdlet for RemoveServer {
    type Output = ();

    fn validate(&self) -> Result<()> {
        ValidateNotNullOrEmpty::validate("ServerName", Some(self.server_name.as_str()))
    }

    fn execute(&self, transport: &mut dyn Transport) -> Result<Self::Output> {
        let request = management_request("DELETE", server_uri(&self.server_name));
        ensure_success(transport.send(request)?)?;
        debug!("Removed server {}", self.server_name);
        Ok(())
    }
}
