//! Starting a new deployment
//!
//! Gates the `deploy_contract` call on the hub accepting deployments, the
//! template not being blocked, and a successful expense calculation. The
//! calculated total cost becomes the approved amount.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use crate::config::ConfigService;
use crate::errors::CallError;
use crate::expenses::{calculate_deployment_expenses, Expenses, ExpensesError};
use crate::hub::{DeployContractArgs, DeployContractError, HubApi};
use crate::models::deployment::DeploymentInformation;
use crate::models::template::ContractTemplate;

/// Why a deployment could not be started
#[derive(Error, Debug)]
pub enum StartDeploymentError {
    #[error("hub config is not loaded yet")]
    ConfigNotLoaded,

    #[error("deployment is disabled on the hub")]
    DeploymentDisabled,

    #[error("contract template is blocked")]
    TemplateBlocked,

    #[error("expense calculation failed: {0}")]
    Expenses(#[from] ExpensesError),

    #[error("deploy call rejected: {0}")]
    Rejected(DeployContractError),

    #[error("deploy call failed: {0}")]
    Transport(String),
}

/// Initiator of new deployments
pub struct DeploymentStarter {
    api: Arc<dyn HubApi>,
    config: Arc<ConfigService>,
}

impl DeploymentStarter {
    pub fn new(api: Arc<dyn HubApi>, config: Arc<ConfigService>) -> Self {
        Self { api, config }
    }

    /// Calculate the expenses a deployment of `template` would incur.
    /// `None` while the config or conversion rate are still loading.
    pub fn calculate_expenses(
        &self,
        template: &ContractTemplate,
    ) -> Option<Result<Expenses, ExpensesError>> {
        let params = self.config.expense_parameters(template)?;
        Some(calculate_deployment_expenses(&params))
    }

    /// Start a deployment from `template`, approving the calculated total
    /// cost.
    pub async fn start(
        &self,
        template: &ContractTemplate,
    ) -> Result<DeploymentInformation, StartDeploymentError> {
        match self.config.is_deployment_available() {
            None => return Err(StartDeploymentError::ConfigNotLoaded),
            Some(false) => return Err(StartDeploymentError::DeploymentDisabled),
            Some(true) => {}
        }
        if template.blocked {
            return Err(StartDeploymentError::TemplateBlocked);
        }

        let expenses = self
            .calculate_expenses(template)
            .ok_or(StartDeploymentError::ConfigNotLoaded)??;

        let args = DeployContractArgs {
            contract_template_id: template.contract_template_id,
            approved_amount_ulps: expenses.total_cost_ulps,
        };

        match self.api.deploy_contract(args).await {
            Ok(deployment) => {
                info!(
                    deployment_id = deployment.deployment_id,
                    contract_template_id = template.contract_template_id,
                    "deployment started"
                );
                Ok(deployment)
            }
            Err(CallError::Response(response_error)) => {
                error!("hub rejected deployment start: {}", response_error);
                Err(StartDeploymentError::Rejected(response_error))
            }
            Err(CallError::Transport(transport_error)) => {
                error!("deployment start failed: {}", transport_error);
                Err(StartDeploymentError::Transport(transport_error.to_string()))
            }
        }
    }
}
