//! Virtual machine cmdlets

use serde::{Deserialize, Serialize};
use urlencoding::encode;

use crate::transport::Transport;
use crate::{ReplayError, Result};

use super::validate::ValidateNotNullOrEmpty;
use super::{ensure_success, management_request, Cmdlet};

/// Header carrying the id of an asynchronous management operation
pub const REQUEST_ID_HEADER: &str = "x-ms-request-id";

/// Outcome of a management operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagementOperationContext {
    /// Operation id assigned by the service
    pub operation_id: String,
    /// Cmdlet that started the operation
    pub operation_description: String,
    /// Final status
    pub operation_status: String,
}

/// Restart-VM: restart one role instance
#[derive(Debug, Clone)]
pub struct RestartVm {
    /// Cloud service hosting the VM
    pub service_name: String,
    /// Deployment within the service
    pub deployment_name: String,
    /// Role instance to restart
    pub role_name: String,
}

impl RestartVm {
    /// Restart `role_name` in `deployment_name` of `service_name`
    pub fn new(
        service_name: impl Into<String>,
        deployment_name: impl Into<String>,
        role_name: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            deployment_name: deployment_name.into(),
            role_name: role_name.into(),
        }
    }

    fn uri(&self) -> String {
        format!(
            "/services/hostedservices/{}/deployments/{}/roleinstances/{}/Operations",
            encode(&self.service_name),
            encode(&self.deployment_name),
            encode(&self.role_name)
        )
    }
}

impl Cmdlet for RestartVm {
    type Output = ManagementOperationContext;

    fn validate(&self) -> Result<()> {
        ValidateNotNullOrEmpty::validate("ServiceName", Some(self.service_name.as_str()))?;
        ValidateNotNullOrEmpty::validate("DeploymentName", Some(self.deployment_name.as_str()))?;
        ValidateNotNullOrEmpty::validate("Name", Some(self.role_name.as_str()))
    }

    fn execute(&self, transport: &mut dyn Transport) -> Result<Self::Output> {
        let request = management_request("POST", self.uri())
            .with_header("Content-Type", "application/json")
            .with_body(br#"{"OperationType":"RestartRoleOperation"}"#.to_vec());

        let response = ensure_success(transport.send(request)?)?;
        let operation_id = response
            .header(REQUEST_ID_HEADER)
            .ok_or_else(|| {
                ReplayError::InvalidFormat(format!("Response is missing {REQUEST_ID_HEADER}"))
            })?
            .to_string();

        Ok(ManagementOperationContext {
            operation_id,
            operation_description: "Restart-VM".to_string(),
            operation_status: "Succeeded".to_string(),
        })
    }
}
