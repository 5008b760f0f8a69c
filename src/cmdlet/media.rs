//! Media services cmdlets

use serde::{Deserialize, Serialize};
use urlencoding::encode;

use crate::transport::Transport;
use crate::Result;

use super::validate::{ValidateGuid, ValidateNotNullOrEmpty};
use super::{ensure_success, management_request, parse_json, Cmdlet, Listing};

/// A media services account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaServicesAccount {
    /// Account name
    #[serde(rename = "AccountName")]
    pub name: String,
    /// Account id (GUID)
    #[serde(rename = "AccountId")]
    pub account_id: String,
    /// Region hosting the account
    #[serde(rename = "ParentRegion", default)]
    pub location: String,
    /// Provisioning state
    #[serde(rename = "State", default)]
    pub state: String,
}

/// Get-MediaServicesAccount: list accounts, or read one by name
#[derive(Debug, Clone, Default)]
pub struct GetMediaServicesAccount {
    /// Account to read; all accounts when `None`
    pub name: Option<String>,
}

impl GetMediaServicesAccount {
    /// List every account
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the account called `name`
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn uri(&self) -> String {
        match &self.name {
            Some(name) => format!("/services/mediaservices/Accounts/{}", encode(name)),
            None => "/services/mediaservices/Accounts".to_string(),
        }
    }
}

impl Cmdlet for GetMediaServicesAccount {
    type Output = Vec<MediaServicesAccount>;

    fn validate(&self) -> Result<()> {
        match &self.name {
            Some(name) => ValidateNotNullOrEmpty::validate("Name", Some(name.as_str())),
            None => Ok(()),
        }
    }

    fn execute(&self, transport: &mut dyn Transport) -> Result<Self::Output> {
        let response = ensure_success(transport.send(management_request("GET", self.uri()))?)?;
        let accounts = parse_json::<Listing<MediaServicesAccount>>(&response)?.into_vec();

        ValidateGuid::validate(accounts.iter().map(|account| account.account_id.as_str()))?;
        Ok(accounts)
    }
}

/// Remove-MediaServicesAccount: delete an account by name
#[derive(Debug, Clone)]
pub struct RemoveMediaServicesAccount {
    /// Account to delete
    pub name: String,
}

impl RemoveMediaServicesAccount {
    /// Delete the account called `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Cmdlet for RemoveMediaServicesAccount {
    type Output = ();

    fn validate(&self) -> Result<()> {
        ValidateNotNullOrEmpty::validate("Name", Some(self.name.as_str()))
    }

    fn execute(&self, transport: &mut dyn Transport) -> Result<Self::Output> {
        let uri = format!("/services/mediaservices/Accounts/{}", encode(&self.name));
        ensure_success(transport.send(management_request("DELETE", uri))?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Request, Response};
    use crate::ReplayError;

    struct Fixed(&'static str);

    impl Transport for Fixed {
        fn send(&mut self, _request: Request) -> Result<Response> {
            Ok(Response::new(200).with_body(self.0.as_bytes().to_vec()))
        }
    }

    #[test]
    fn test_uri() {
        assert_eq!(
            GetMediaServicesAccount::new().uri(),
            "/services/mediaservices/Accounts"
        );
        assert_eq!(
            GetMediaServicesAccount::new().with_name("media1").uri(),
            "/services/mediaservices/Accounts/media1"
        );
    }

    #[test]
    fn test_list_accounts() {
        let mut transport = Fixed(
            r#"[{"AccountName":"media1","AccountId":"3fa85f64-5717-4562-b3fc-2c963f66afa6","ParentRegion":"West US","State":"Active"}]"#,
        );

        let accounts = GetMediaServicesAccount::new().run(&mut transport).unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].name, "media1");
        assert_eq!(accounts[0].location, "West US");
    }

    #[test]
    fn test_single_account_by_name() {
        let mut transport = Fixed(
            r#"{"AccountName":"media1","AccountId":"3fa85f64-5717-4562-b3fc-2c963f66afa6"}"#,
        );

        let accounts = GetMediaServicesAccount::new()
            .with_name("media1")
            .run(&mut transport)
            .unwrap();
        assert_eq!(accounts[0].state, "");
    }

    #[test]
    fn test_malformed_account_id() {
        let mut transport = Fixed(r#"[{"AccountName":"media1","AccountId":"nope"}]"#);

        let result = GetMediaServicesAccount::new().run(&mut transport);
        assert!(matches!(result, Err(ReplayError::Validation(_))));
    }

    #[test]
    fn test_remove_account() {
        struct Deleting(Option<Request>);

        impl Transport for Deleting {
            fn send(&mut self, request: Request) -> Result<Response> {
                self.0 = Some(request);
                Ok(Response::new(204))
            }
        }

        let mut transport = Deleting(None);
        RemoveMediaServicesAccount::new("media1").run(&mut transport).unwrap();

        let sent = transport.0.unwrap();
        assert_eq!(sent.method, "DELETE");
        assert_eq!(sent.uri, "/services/mediaservices/Accounts/media1");

        let missing = RemoveMediaServicesAccount::new("").run(&mut Deleting(None));
        assert!(matches!(missing, Err(ReplayError::Validation(_))));
    }
}
