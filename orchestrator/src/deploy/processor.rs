//! Deployment processor
//!
//! The client-side state machine that advances a deployment through the
//! hub's workflow. On every relevant data change it resolves a processing
//! state through a strict priority chain, executes the single next hub
//! call for automatic states, and exposes manual retry for the rest.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::{debug, error, info};

use crate::deploy::phase::{is_finalized_with_any_result, termination_possible};
use crate::deploy::session::DeploymentSession;
use crate::errors::CallError;
use crate::flight::SingleFlight;
use crate::hub::{HubApi, InitializeContractCertificateError, ObtainContractCertificateError};
use crate::models::deployment::DeploymentState;
use crate::utils::{lock_delay, now_millis};

/// Settling delay before obtaining a certificate, giving the hub's read
/// replicas time to observe the generated certificate.
const OBTAIN_CERTIFICATE_SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Action the processor may take without user intervention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutomaticAction {
    Process,
    ObtainCertificate,
}

/// Action that waits for an explicit user request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualAction {
    Process,
    RetryCreateCertificate,
}

/// Resolved processing state, recomputed from fresh inputs on every
/// evaluation and never stored authoritatively
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingState {
    Automatic(AutomaticAction),
    Manual(ManualAction),
    None,
}

/// Which action raised the sticky local error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionError {
    Process,
    ObtainCertificate,
    InitializeCertificate,
}

#[derive(Default)]
struct ProcessorState {
    /// Sticky marker of the action whose failure needs a manual retry
    action_error: Option<ActionError>,

    /// Error of the last advancing call, structured or transport
    process_error: Option<String>,

    /// Error of the last cancel call
    cancel_error: Option<String>,

    in_progress: bool,
}

/// The deployment-advancing state machine
pub struct DeploymentProcessor {
    session: Arc<DeploymentSession>,
    api: Arc<dyn HubApi>,
    state: RwLock<ProcessorState>,
    process_flight: SingleFlight,
    obtain_flight: SingleFlight,
    retry_flight: SingleFlight,
    cancel_flight: SingleFlight,
}

impl DeploymentProcessor {
    pub fn new(api: Arc<dyn HubApi>, session: Arc<DeploymentSession>) -> Self {
        Self {
            session,
            api,
            state: RwLock::new(ProcessorState::default()),
            process_flight: SingleFlight::new(),
            obtain_flight: SingleFlight::new(),
            retry_flight: SingleFlight::new(),
            cancel_flight: SingleFlight::new(),
        }
    }

    /// Resolve the processing state through the priority chain:
    /// fetch error, sticky action error, processor error, hub processing
    /// error, hub need-processing flag, certificate wait, idle.
    pub fn processing_state(&self) -> ProcessingState {
        if self.session.fetch_failed() {
            return ProcessingState::None;
        }

        let state = self.state.read().unwrap_or_else(|e| e.into_inner());

        if let Some(action_error) = state.action_error {
            return match action_error {
                ActionError::ObtainCertificate | ActionError::InitializeCertificate => {
                    ProcessingState::Manual(ManualAction::RetryCreateCertificate)
                }
                ActionError::Process => ProcessingState::Manual(ManualAction::Process),
            };
        }

        if state.process_error.is_some() {
            return ProcessingState::Manual(ManualAction::Process);
        }
        drop(state);

        let Some(deployment) = self.session.deployment() else {
            return ProcessingState::None;
        };

        if deployment.processing_error.is_some() {
            return ProcessingState::Manual(ManualAction::Process);
        }

        if deployment.need_processing {
            return ProcessingState::Automatic(AutomaticAction::Process);
        }

        if deployment.state == DeploymentState::WaitingReceiveContractCertificate {
            return ProcessingState::Automatic(AutomaticAction::ObtainCertificate);
        }

        ProcessingState::None
    }

    /// Whether the presentation layer should offer the manual controls
    pub fn should_process_manually(&self) -> bool {
        matches!(self.processing_state(), ProcessingState::Manual(_))
    }

    /// Whether the processor is currently advancing on its own
    pub fn automatic_processing_in_progress(&self) -> bool {
        matches!(self.processing_state(), ProcessingState::Automatic(_))
            && self.session.is_owned_by_current_user() == Some(true)
            && !self.finalized()
    }

    /// Whether an advancing call is currently in flight
    pub fn process_in_progress(&self) -> bool {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.in_progress
    }

    /// Sticky action error, if set
    pub fn action_error(&self) -> Option<ActionError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.action_error
    }

    /// Error of the last advancing call, if any
    pub fn process_error(&self) -> Option<String> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.process_error.clone()
    }

    /// Error of the last cancel call, if any
    pub fn cancel_error(&self) -> Option<String> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.cancel_error.clone()
    }

    fn finalized(&self) -> bool {
        self.session
            .deployment()
            .map(|deployment| is_finalized_with_any_result(&deployment.state))
            .unwrap_or(false)
    }

    /// Run automatic actions until the workflow settles: a terminal phase,
    /// a state requiring manual intervention, or nothing left to do.
    pub async fn run_until_settled(self: &Arc<Self>) {
        loop {
            if self.session.is_owned_by_current_user() != Some(true) {
                debug!("not the deployment owner, nothing to process");
                return;
            }
            if self.finalized() {
                return;
            }
            let action = match self.processing_state() {
                ProcessingState::Automatic(action) => action,
                ProcessingState::Manual(_) | ProcessingState::None => return,
            };
            match action {
                AutomaticAction::Process => self.try_to_process().await,
                AutomaticAction::ObtainCertificate => self.try_to_obtain_certificate().await,
            }
        }
    }

    /// Execute the pending manual action, then continue automatically.
    /// Inert unless the resolved state is manual.
    pub async fn try_to_process_manually(self: &Arc<Self>) {
        if self.session.is_owned_by_current_user() != Some(true) {
            debug!("not the deployment owner, skipping manual processing");
            return;
        }
        let action = match self.processing_state() {
            ProcessingState::Manual(action) => action,
            other => {
                debug!(?other, "manual processing requested while not manual");
                return;
            }
        };
        match action {
            ManualAction::Process => self.try_to_process().await,
            ManualAction::RetryCreateCertificate => {
                self.try_to_retry_generate_certificate().await
            }
        }
        self.run_until_settled().await;
    }

    /// Advance the workflow by one hub call, honoring the lock window.
    /// Concurrent invocations share one call.
    pub async fn try_to_process(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.process_flight
            .run(move || async move { this.process_inner().await })
            .await;
    }

    async fn process_inner(&self) {
        let deployment_id = self.session.deployment_id();
        if self.session.is_owned_by_current_user() != Some(true) {
            debug!(deployment_id, "not the deployment owner, skipping process");
            return;
        }
        self.set_in_progress(true);

        let delay = lock_delay(self.session.locked_till_millis(), now_millis());
        if !delay.is_zero() {
            debug!(deployment_id, ?delay, "waiting out the lock window");
            tokio::time::sleep(delay).await;
        }

        match self.api.process_deployment(deployment_id).await {
            Ok(deployment) => {
                info!(deployment_id, "deployment processed");
                self.session.replace_deployment(deployment);
                self.settle(None, None);
            }
            Err(CallError::Response(response_error)) => {
                error!(deployment_id, "hub rejected processing: {}", response_error);
                self.settle(Some(response_error.to_string()), Some(ActionError::Process));
            }
            Err(CallError::Transport(transport_error)) => {
                error!(deployment_id, "processing call failed: {}", transport_error);
                self.settle(
                    Some(transport_error.to_string()),
                    Some(ActionError::Process),
                );
            }
        }
    }

    /// Two-phase certificate handshake: obtain the signed certificate,
    /// then register it against the deployment. Concurrent invocations
    /// share one call.
    pub async fn try_to_obtain_certificate(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.obtain_flight
            .run(move || async move { this.obtain_certificate_inner().await })
            .await;
    }

    async fn obtain_certificate_inner(&self) {
        let deployment_id = self.session.deployment_id();
        if self.session.is_owned_by_current_user() != Some(true) {
            debug!(deployment_id, "not the deployment owner, skipping obtain");
            return;
        }
        self.set_in_progress(true);

        // The obtain call reads from replicas; give them time to catch up
        // with the certificate the hub just generated.
        tokio::time::sleep(OBTAIN_CERTIFICATE_SETTLE_DELAY).await;

        let certificate = match self.api.obtain_contract_certificate(deployment_id).await {
            Ok(certificate) => certificate,
            Err(CallError::Response(response_error)) => {
                error!(
                    deployment_id,
                    "hub rejected certificate obtain: {}", response_error
                );
                let action_error = match response_error {
                    ObtainContractCertificateError::CertificateNotFound
                    | ObtainContractCertificateError::BuildCertificateError { .. } => {
                        Some(ActionError::ObtainCertificate)
                    }
                    _ => None,
                };
                self.settle(Some(response_error.to_string()), action_error);
                return;
            }
            Err(CallError::Transport(transport_error)) => {
                error!(
                    deployment_id,
                    "certificate obtain failed: {}", transport_error
                );
                // Transport failures are treated as transient here: the
                // action error is cleared and the next automatic cycle
                // retries the obtain.
                self.settle(Some(transport_error.to_string()), None);
                return;
            }
        };

        match self
            .api
            .initialize_contract_certificate(deployment_id, certificate)
            .await
        {
            Ok(deployment) => {
                info!(deployment_id, "contract certificate initialized");
                self.session.replace_deployment(deployment);
                self.settle(None, None);
            }
            Err(CallError::Response(response_error)) => {
                error!(
                    deployment_id,
                    "hub rejected certificate initialize: {}", response_error
                );
                let action_error = match response_error {
                    InitializeContractCertificateError::InvalidCertificate { .. } => {
                        Some(ActionError::InitializeCertificate)
                    }
                    _ => None,
                };
                self.settle(Some(response_error.to_string()), action_error);
            }
            Err(CallError::Transport(transport_error)) => {
                error!(
                    deployment_id,
                    "certificate initialize failed: {}", transport_error
                );
                self.settle(Some(transport_error.to_string()), None);
            }
        }
    }

    /// Ask the hub to generate the certificate again after a failed
    /// handshake. Concurrent invocations share one call.
    pub async fn try_to_retry_generate_certificate(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.retry_flight
            .run(move || async move { this.retry_generate_certificate_inner().await })
            .await;
    }

    async fn retry_generate_certificate_inner(&self) {
        let deployment_id = self.session.deployment_id();
        if self.session.is_owned_by_current_user() != Some(true) {
            debug!(deployment_id, "not the deployment owner, skipping retry");
            return;
        }
        self.set_in_progress(true);

        match self
            .api
            .retry_generate_contract_certificate(deployment_id)
            .await
        {
            Ok(deployment) => {
                info!(deployment_id, "certificate generation restarted");
                self.session.replace_deployment(deployment);
                self.settle(None, None);
            }
            Err(CallError::Response(response_error)) => {
                error!(
                    deployment_id,
                    "hub rejected certificate retry: {}", response_error
                );
                self.settle(Some(response_error.to_string()), None);
            }
            Err(CallError::Transport(transport_error)) => {
                error!(
                    deployment_id,
                    "certificate retry failed: {}", transport_error
                );
                self.settle(Some(transport_error.to_string()), None);
            }
        }
    }

    /// Cancel the deployment. Only possible before finalization starts;
    /// honors the lock window like any advancing call.
    pub async fn cancel_deployment(self: &Arc<Self>, reason: String) {
        let this = Arc::clone(self);
        self.cancel_flight
            .run(move || async move { this.cancel_inner(reason).await })
            .await;
    }

    async fn cancel_inner(&self, reason: String) {
        let deployment_id = self.session.deployment_id();

        if self.session.is_owned_by_current_user() != Some(true) {
            debug!(deployment_id, "not the deployment owner, skipping cancel");
            return;
        }
        if let Some(deployment) = self.session.deployment() {
            if !termination_possible(&deployment.state) {
                debug!(deployment_id, "deployment already finalizing, cannot cancel");
                return;
            }
        }

        let delay = lock_delay(self.session.locked_till_millis(), now_millis());
        if !delay.is_zero() {
            debug!(deployment_id, ?delay, "waiting out the lock window");
            tokio::time::sleep(delay).await;
        }

        match self.api.cancel_deployment(deployment_id, reason).await {
            Ok(deployment) => {
                info!(deployment_id, "deployment cancelled");
                self.session.replace_deployment(deployment);
                let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
                state.cancel_error = None;
            }
            Err(CallError::Response(response_error)) => {
                error!(deployment_id, "hub rejected cancel: {}", response_error);
                let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
                state.cancel_error = Some(response_error.to_string());
            }
            Err(CallError::Transport(transport_error)) => {
                error!(deployment_id, "cancel call failed: {}", transport_error);
                {
                    let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
                    state.cancel_error = Some(transport_error.to_string());
                }
                // The call may have gone through; resync with the hub.
                self.session.fetch().await;
            }
        }
    }

    fn set_in_progress(&self, in_progress: bool) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.in_progress = in_progress;
    }

    /// Record the outcome of an advancing call: clears the in-progress
    /// flag and replaces both error slots.
    fn settle(&self, process_error: Option<String>, action_error: Option<ActionError>) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.in_progress = false;
        state.process_error = process_error;
        state.action_error = action_error;
    }
}
