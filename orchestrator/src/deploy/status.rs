//! Contract status reconciliation
//!
//! Combines the template's activation requirement, the interpreted
//! deployment state, the activation state and the certificate validation
//! state into one "is it safe to use the contract" verdict, and drives
//! re-fetching of sources that failed to load.

use std::sync::Arc;

use tracing::debug;

use crate::deploy::activation::{ActivationStateFetcher, ContractActivationState};
use crate::deploy::phase::{contract_deployment_state, ContractDeploymentState};
use crate::deploy::session::DeploymentSession;
use crate::deploy::validate::{CertificateValidator, ContractValidationState, DataAvailability};
use crate::hub::{ContractReference, HubApi};
use crate::identity::IdentityProvider;
use crate::models::principal::Principal;
use crate::models::template::ContractTemplate;

/// Activation state as presented: extends the raw availability with the
/// cases where fetching is not applicable at all
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationAvailability {
    /// The template does not require activation
    NotRequired,

    /// Activation is required but the deployment has not succeeded yet
    NotApplicable,

    Loading,
    Available(ContractActivationState),
    NotAvailable { error: String },
}

/// Validation state as presented
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationAvailability {
    /// No contract node to validate yet
    NotApplicable,

    Loading,
    Available(ContractValidationState),
    NotAvailable { error: String },
}

/// Reconciler over the independently loading status sources
pub struct ContractStatus {
    session: Arc<DeploymentSession>,
    template: ContractTemplate,
    validator: Arc<CertificateValidator>,
    activation: Arc<ActivationStateFetcher>,
}

impl ContractStatus {
    pub fn new(
        api: Arc<dyn HubApi>,
        identity: Arc<dyn IdentityProvider>,
        session: Arc<DeploymentSession>,
        template: ContractTemplate,
    ) -> Self {
        Self {
            session,
            template,
            validator: Arc::new(CertificateValidator::new(Arc::clone(&api))),
            activation: Arc::new(ActivationStateFetcher::new(api, identity)),
        }
    }

    pub fn template(&self) -> &ContractTemplate {
        &self.template
    }

    /// Projection of the deployment result for status display
    pub fn contract_deployment_state(&self) -> Option<ContractDeploymentState> {
        let deployment = self.session.deployment()?;
        contract_deployment_state(&deployment.state, deployment.contract_node.as_ref())
    }

    /// Contract node to validate: present only once the deployment
    /// finalized successfully
    fn contract_node_to_validate(&self) -> Option<Principal> {
        match self.contract_deployment_state() {
            Some(ContractDeploymentState::Success { contract_node }) => Some(contract_node),
            _ => None,
        }
    }

    /// Whether the activation state should be fetched: activation must be
    /// required by the template and the deployment must have succeeded,
    /// otherwise the query would hit a non-existent contract.
    fn should_fetch_activation(&self) -> bool {
        self.template.activation_required && self.contract_node_to_validate().is_some()
    }

    /// Activation state for presentation
    pub fn activation_availability(&self) -> ActivationAvailability {
        if !self.template.activation_required {
            return ActivationAvailability::NotRequired;
        }
        if !self.should_fetch_activation() {
            return ActivationAvailability::NotApplicable;
        }
        match self.activation.availability() {
            // The fetch is triggered right after this state is observed
            None | Some(DataAvailability::Loading) => ActivationAvailability::Loading,
            Some(DataAvailability::Available(state)) => ActivationAvailability::Available(state),
            Some(DataAvailability::NotAvailable { error }) => {
                ActivationAvailability::NotAvailable { error }
            }
        }
    }

    /// Validation state for presentation
    pub fn validation_availability(&self) -> ValidationAvailability {
        if self.contract_node_to_validate().is_none() {
            return ValidationAvailability::NotApplicable;
        }
        match self.validator.availability() {
            None | Some(DataAvailability::Loading) => ValidationAvailability::Loading,
            Some(DataAvailability::Available(state)) => ValidationAvailability::Available(state),
            Some(DataAvailability::NotAvailable { error }) => {
                ValidationAvailability::NotAvailable { error }
            }
        }
    }

    /// The unified safety verdict: deployed successfully, activated where
    /// required, and holding a valid, active certificate.
    pub fn is_it_safe_to_use_contract(&self) -> bool {
        let contract_deployed = matches!(
            self.contract_deployment_state(),
            Some(ContractDeploymentState::Success { .. })
        );

        let activation = self.activation_availability();
        let activation_not_required = activation == ActivationAvailability::NotRequired;
        let activated = matches!(
            activation,
            ActivationAvailability::Available(ContractActivationState::Activated { .. })
        );

        let certificate_valid_and_active = matches!(
            self.validation_availability(),
            ValidationAvailability::Available(
                ContractValidationState::CertificateValidAndActive { .. }
            )
        );

        contract_deployed && (activation_not_required || activated) && certificate_valid_and_active
    }

    /// Trigger the fetches that are due for the current deployment state.
    /// Called once the deployment record is loaded and again whenever it
    /// reaches terminal success.
    pub async fn refresh(&self) {
        if self.should_fetch_activation() {
            if let Some(contract_node) = self.contract_node_to_validate() {
                self.activation.fetch(contract_node).await;
            }
        }
        self.validate_contract().await;
    }

    /// Validate the contract certificate if there is a contract to
    /// validate
    pub async fn validate_contract(&self) {
        let Some(contract_node) = self.contract_node_to_validate() else {
            debug!("no deployed contract to validate yet");
            return;
        };
        self.validator
            .validate(ContractReference::Node(contract_node))
            .await;
    }

    /// Re-trigger the sources that degraded: activation when it failed to
    /// load, validation when it failed to load or the hub asked for a
    /// retry.
    pub async fn fetch_not_available_data(&self) {
        if matches!(
            self.activation_availability(),
            ActivationAvailability::NotAvailable { .. }
        ) {
            if let Some(contract_node) = self.contract_node_to_validate() {
                self.activation.fetch(contract_node).await;
            }
        }

        let validation_retryable = matches!(
            self.validation_availability(),
            ValidationAvailability::NotAvailable { .. }
                | ValidationAvailability::Available(
                    ContractValidationState::BackendErrorWithRetry { .. }
                )
        );
        if validation_retryable {
            self.validate_contract().await;
        }
    }
}
