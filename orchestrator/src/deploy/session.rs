//! Deployment session
//!
//! Owns the single deployment record for the active deployment. The record
//! is only ever replaced whole with a record returned by the hub; nothing
//! in the client mutates individual fields.

use std::sync::{Arc, RwLock};

use tracing::{debug, error};

use crate::errors::CallError;
use crate::flight::SingleFlight;
use crate::hub::{DeploymentFilter, GetDeploymentError, HubApi};
use crate::identity::IdentityProvider;
use crate::models::deployment::{DeploymentId, DeploymentInformation};
use crate::models::TimestampMillis;

#[derive(Default)]
struct SessionState {
    deployment: Option<DeploymentInformation>,

    /// Transport-level failure of the last fetch
    fetch_error: Option<String>,

    /// Structured error of the last fetch
    response_error: Option<GetDeploymentError>,
}

/// Holder of the active deployment record
pub struct DeploymentSession {
    api: Arc<dyn HubApi>,
    identity: Arc<dyn IdentityProvider>,
    deployment_id: DeploymentId,
    state: RwLock<SessionState>,
    fetch_flight: SingleFlight,
}

impl DeploymentSession {
    pub fn new(
        api: Arc<dyn HubApi>,
        identity: Arc<dyn IdentityProvider>,
        deployment_id: DeploymentId,
    ) -> Self {
        Self {
            api,
            identity,
            deployment_id,
            state: RwLock::new(SessionState::default()),
            fetch_flight: SingleFlight::new(),
        }
    }

    pub fn deployment_id(&self) -> DeploymentId {
        self.deployment_id
    }

    /// Fetch the current record from the hub. Concurrent calls share one
    /// request.
    pub async fn fetch(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.fetch_flight
            .run(move || async move { this.fetch_inner().await })
            .await;
    }

    async fn fetch_inner(&self) {
        let filter = DeploymentFilter::ByDeploymentId {
            deployment_id: self.deployment_id,
        };
        match self.api.get_deployment(filter).await {
            Ok(deployment) => {
                debug!(
                    deployment_id = self.deployment_id,
                    "fetched deployment record"
                );
                self.replace_deployment(deployment);
            }
            Err(CallError::Response(response_error)) => {
                error!(
                    deployment_id = self.deployment_id,
                    "hub rejected deployment fetch: {}", response_error
                );
                let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
                state.response_error = Some(response_error);
                state.fetch_error = None;
            }
            Err(CallError::Transport(transport_error)) => {
                error!(
                    deployment_id = self.deployment_id,
                    "deployment fetch failed: {}", transport_error
                );
                let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
                state.fetch_error = Some(transport_error.to_string());
            }
        }
    }

    /// Replace the record with a freshly returned one and clear the fetch
    /// errors. The only mutation path for the record.
    pub fn replace_deployment(&self, deployment: DeploymentInformation) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.deployment = Some(deployment);
        state.fetch_error = None;
        state.response_error = None;
    }

    /// Snapshot of the current record
    pub fn deployment(&self) -> Option<DeploymentInformation> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.deployment.clone()
    }

    /// Whether the last fetch failed (transport or structured)
    pub fn fetch_failed(&self) -> bool {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.fetch_error.is_some() || state.response_error.is_some()
    }

    /// Whether the deployment belongs to the current authenticated
    /// identity. `None` until a record is loaded.
    pub fn is_owned_by_current_user(&self) -> Option<bool> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let deployment = state.deployment.as_ref()?;
        Some(self.identity.is_current(&deployment.deployer))
    }

    /// End of the active lock window, if the record carries one
    pub fn locked_till_millis(&self) -> Option<TimestampMillis> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state
            .deployment
            .as_ref()
            .and_then(|deployment| deployment.lock.as_ref())
            .map(|lock| lock.locked_till_millis)
    }
}
