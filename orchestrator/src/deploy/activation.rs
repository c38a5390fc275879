//! Contract activation state
//!
//! Some templates require a one-time ownership-claiming step after
//! deployment. This fetcher asks the deployed contract node who owns it
//! and classifies the answer.

use std::sync::{Arc, RwLock};

use tracing::{debug, error};

use crate::deploy::validate::DataAvailability;
use crate::errors::CallError;
use crate::flight::SingleFlight;
use crate::hub::{GetContractOwnerError, HubApi};
use crate::identity::IdentityProvider;
use crate::models::principal::Principal;

/// Activation state of the deployed contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractActivationState {
    Activated {
        owner: Principal,
        is_owned_by_current_user: bool,
    },
    NotActivated,
    ActivationNotRequired,
}

/// Fetcher of the contract's activation state
pub struct ActivationStateFetcher {
    api: Arc<dyn HubApi>,
    identity: Arc<dyn IdentityProvider>,
    state: RwLock<Option<DataAvailability<ContractActivationState>>>,
    flight: SingleFlight,
}

impl ActivationStateFetcher {
    pub fn new(api: Arc<dyn HubApi>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            api,
            identity,
            state: RwLock::new(None),
            flight: SingleFlight::new(),
        }
    }

    /// Latest activation state; `None` until the first fetch starts
    pub fn availability(&self) -> Option<DataAvailability<ContractActivationState>> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.clone()
    }

    /// Whether the contract is activated by the current user
    pub fn is_activated_and_owned_by_current_user(&self) -> bool {
        matches!(
            self.availability(),
            Some(DataAvailability::Available(ContractActivationState::Activated {
                is_owned_by_current_user: true,
                ..
            }))
        )
    }

    /// Query the contract node for its owner. Concurrent calls share one
    /// request.
    pub async fn fetch(self: &Arc<Self>, contract_node: Principal) {
        let this = Arc::clone(self);
        self.flight
            .run(move || async move { this.fetch_inner(contract_node).await })
            .await;
    }

    async fn fetch_inner(&self, contract_node: Principal) {
        self.set_state(DataAvailability::Loading);

        let availability = match self.api.get_contract_owner(contract_node).await {
            Ok(result) => {
                debug!(owner = %result.owner, "contract is activated");
                let is_owned_by_current_user = self.identity.is_current(&result.owner);
                DataAvailability::Available(ContractActivationState::Activated {
                    owner: result.owner,
                    is_owned_by_current_user,
                })
            }
            Err(CallError::Response(GetContractOwnerError::ContractNotActivated)) => {
                DataAvailability::Available(ContractActivationState::NotActivated)
            }
            Err(CallError::Response(GetContractOwnerError::ContractActivationNotRequired)) => {
                // The owner query is only issued for templates requiring
                // activation, so this answer marks a hub/template mismatch.
                DataAvailability::Available(ContractActivationState::ActivationNotRequired)
            }
            Err(CallError::Response(response_error)) => {
                error!("contract owner query rejected: {}", response_error);
                DataAvailability::NotAvailable {
                    error: response_error.to_string(),
                }
            }
            Err(CallError::Transport(transport_error)) => {
                error!("contract owner query failed: {}", transport_error);
                DataAvailability::NotAvailable {
                    error: transport_error.to_string(),
                }
            }
        };

        self.set_state(availability);
    }

    fn set_state(&self, availability: DataAvailability<ContractActivationState>) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        *state = Some(availability);
    }
}
