//! Deployment orchestration
//!
//! Wires the session, processor and status reconciler for one active
//! deployment. All collaborators are passed in explicitly; there is no
//! ambient state.

pub mod activation;
pub mod phase;
pub mod processor;
pub mod session;
pub mod start;
pub mod status;
pub mod validate;

use std::sync::Arc;

use crate::deploy::phase::{interpret_phase, ContractDeploymentState, PhaseInterpretation};
use crate::deploy::processor::{ActionError, DeploymentProcessor, ProcessingState};
use crate::deploy::session::DeploymentSession;
use crate::deploy::status::{ActivationAvailability, ContractStatus, ValidationAvailability};
use crate::hub::HubApi;
use crate::identity::IdentityProvider;
use crate::models::deployment::DeploymentId;
use crate::models::template::ContractTemplate;

/// Everything the presentation layer needs to render one deployment
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    /// Interpretation of the current phase; `None` until the record loads
    pub phase: Option<PhaseInterpretation>,

    pub processing_state: ProcessingState,
    pub should_process_manually: bool,
    pub automatic_processing_in_progress: bool,
    pub process_in_progress: bool,

    pub action_error: Option<ActionError>,
    pub process_error: Option<String>,
    pub cancel_error: Option<String>,

    pub contract_deployment_state: Option<ContractDeploymentState>,
    pub activation: ActivationAvailability,
    pub validation: ValidationAvailability,
    pub is_it_safe_to_use_contract: bool,
}

/// Orchestrator for one active deployment
pub struct DeploymentOrchestrator {
    session: Arc<DeploymentSession>,
    processor: Arc<DeploymentProcessor>,
    status: Arc<ContractStatus>,
}

impl DeploymentOrchestrator {
    pub fn new(
        api: Arc<dyn HubApi>,
        identity: Arc<dyn IdentityProvider>,
        deployment_id: DeploymentId,
        template: ContractTemplate,
    ) -> Self {
        let session = Arc::new(DeploymentSession::new(
            Arc::clone(&api),
            Arc::clone(&identity),
            deployment_id,
        ));
        let processor = Arc::new(DeploymentProcessor::new(
            Arc::clone(&api),
            Arc::clone(&session),
        ));
        let status = Arc::new(ContractStatus::new(
            api,
            identity,
            Arc::clone(&session),
            template,
        ));
        Self {
            session,
            processor,
            status,
        }
    }

    pub fn session(&self) -> &Arc<DeploymentSession> {
        &self.session
    }

    pub fn processor(&self) -> &Arc<DeploymentProcessor> {
        &self.processor
    }

    pub fn status(&self) -> &Arc<ContractStatus> {
        &self.status
    }

    /// Load the record, run the automatic workflow until it settles, then
    /// refresh the status sources. The entry point after mount.
    pub async fn bootstrap(&self) {
        self.session.fetch().await;
        self.processor.run_until_settled().await;
        self.status.refresh().await;
    }

    /// Execute the pending manual action, then refresh the status sources
    pub async fn try_to_process_manually(&self) {
        self.processor.try_to_process_manually().await;
        self.status.refresh().await;
    }

    /// Cancel the active deployment
    pub async fn cancel_deployment(&self, reason: String) {
        self.processor.cancel_deployment(reason).await;
    }

    /// Re-fetch status sources that failed to load
    pub async fn fetch_not_available_data(&self) {
        self.status.fetch_not_available_data().await;
    }

    /// Assemble the presentation snapshot
    pub fn snapshot(&self) -> StatusSnapshot {
        let phase = self
            .session
            .deployment()
            .map(|deployment| interpret_phase(&deployment.state));

        StatusSnapshot {
            phase,
            processing_state: self.processor.processing_state(),
            should_process_manually: self.processor.should_process_manually(),
            automatic_processing_in_progress: self.processor.automatic_processing_in_progress(),
            process_in_progress: self.processor.process_in_progress(),
            action_error: self.processor.action_error(),
            process_error: self.processor.process_error(),
            cancel_error: self.processor.cancel_error(),
            contract_deployment_state: self.status.contract_deployment_state(),
            activation: self.status.activation_availability(),
            validation: self.status.validation_availability(),
            is_it_safe_to_use_contract: self.status.is_it_safe_to_use_contract(),
        }
    }
}
