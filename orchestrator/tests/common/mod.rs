//! Shared test support: a scriptable in-memory hub

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use hubflow::errors::{CallError, CallResult, HubError};
use hubflow::hub::{
    CancelDeploymentError, ContractOwnerResult, ContractReference, DeployContractArgs,
    DeployContractError, DeploymentFilter, GetContractOwnerError, GetDeploymentError, HubApi,
    InitializeContractCertificateError, ObtainContractCertificateError, ProcessDeploymentError,
    RetryGenerateContractCertificateError, ValidateContractCertificateError,
    ValidateContractCertificateResult,
};
use hubflow::identity::StaticIdentity;
use hubflow::models::certificate::{ContractCertificate, SignedContractCertificate};
use hubflow::models::config::{Config, ConversionRate};
use hubflow::models::deployment::{
    DeploymentExpensesInfo, DeploymentInformation, DeploymentResult, DeploymentState,
    FinalizeDeploymentState,
};
use hubflow::models::principal::Principal;
use hubflow::models::template::ContractTemplate;

pub const DEPLOYER: &str = "user-aaaaa-aa";
pub const CONTRACT_NODE: &str = "node-ccccc-cc";

/// Per-call invocation counters
#[derive(Default)]
pub struct CallCounters {
    pub get_deployment: AtomicU32,
    pub process: AtomicU32,
    pub cancel: AtomicU32,
    pub obtain: AtomicU32,
    pub initialize: AtomicU32,
    pub retry: AtomicU32,
    pub validate: AtomicU32,
    pub owner: AtomicU32,
    pub config: AtomicU32,
    pub conversion_rate: AtomicU32,
}

/// Scripted responses; an empty queue on an exercised call is a test bug
/// and panics
#[derive(Default)]
pub struct MockHubState {
    pub deployment: Option<DeploymentInformation>,
    pub config: Option<Config>,
    pub conversion_rate: Option<ConversionRate>,
    pub process: VecDeque<CallResult<DeploymentInformation, ProcessDeploymentError>>,
    pub cancel: VecDeque<CallResult<DeploymentInformation, CancelDeploymentError>>,
    pub obtain: VecDeque<CallResult<SignedContractCertificate, ObtainContractCertificateError>>,
    pub initialize:
        VecDeque<CallResult<DeploymentInformation, InitializeContractCertificateError>>,
    pub retry: VecDeque<CallResult<DeploymentInformation, RetryGenerateContractCertificateError>>,
    pub validate:
        VecDeque<CallResult<ValidateContractCertificateResult, ValidateContractCertificateError>>,
    pub owner: VecDeque<CallResult<ContractOwnerResult, GetContractOwnerError>>,
    pub deploy: VecDeque<CallResult<DeploymentInformation, DeployContractError>>,
}

/// In-memory hub driven by scripted responses
#[derive(Default)]
pub struct MockHub {
    pub state: Mutex<MockHubState>,
    pub calls: CallCounters,
    /// Artificial latency of `process_deployment`, for overlap tests
    pub process_delay: Duration,
}

impl MockHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_process_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            process_delay: delay,
            ..Self::default()
        })
    }

    pub fn set_deployment(&self, deployment: DeploymentInformation) {
        self.state.lock().unwrap().deployment = Some(deployment);
    }
}

/// Shorthand for a transport-level failure
pub fn transport<E>() -> CallError<E> {
    CallError::Transport(HubError::Internal("connection reset".to_string()))
}

#[async_trait]
impl HubApi for MockHub {
    async fn get_deployment(
        &self,
        _filter: DeploymentFilter,
    ) -> CallResult<DeploymentInformation, GetDeploymentError> {
        self.calls.get_deployment.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        state
            .deployment
            .clone()
            .ok_or(CallError::Response(GetDeploymentError::DeploymentNotFound))
    }

    async fn process_deployment(
        &self,
        _deployment_id: u64,
    ) -> CallResult<DeploymentInformation, ProcessDeploymentError> {
        self.calls.process.fetch_add(1, Ordering::SeqCst);
        if !self.process_delay.is_zero() {
            tokio::time::sleep(self.process_delay).await;
        }
        let response = self
            .state
            .lock()
            .unwrap()
            .process
            .pop_front()
            .expect("unscripted process_deployment call");
        self.remember_record(&response);
        response
    }

    async fn cancel_deployment(
        &self,
        _deployment_id: u64,
        _reason: String,
    ) -> CallResult<DeploymentInformation, CancelDeploymentError> {
        self.calls.cancel.fetch_add(1, Ordering::SeqCst);
        let response = self
            .state
            .lock()
            .unwrap()
            .cancel
            .pop_front()
            .expect("unscripted cancel_deployment call");
        self.remember_record(&response);
        response
    }

    async fn obtain_contract_certificate(
        &self,
        _deployment_id: u64,
    ) -> CallResult<SignedContractCertificate, ObtainContractCertificateError> {
        self.calls.obtain.fetch_add(1, Ordering::SeqCst);
        self.state
            .lock()
            .unwrap()
            .obtain
            .pop_front()
            .expect("unscripted obtain_contract_certificate call")
    }

    async fn initialize_contract_certificate(
        &self,
        _deployment_id: u64,
        _certificate: SignedContractCertificate,
    ) -> CallResult<DeploymentInformation, InitializeContractCertificateError> {
        self.calls.initialize.fetch_add(1, Ordering::SeqCst);
        let response = self
            .state
            .lock()
            .unwrap()
            .initialize
            .pop_front()
            .expect("unscripted initialize_contract_certificate call");
        self.remember_record(&response);
        response
    }

    async fn retry_generate_contract_certificate(
        &self,
        _deployment_id: u64,
    ) -> CallResult<DeploymentInformation, RetryGenerateContractCertificateError> {
        self.calls.retry.fetch_add(1, Ordering::SeqCst);
        let response = self
            .state
            .lock()
            .unwrap()
            .retry
            .pop_front()
            .expect("unscripted retry_generate_contract_certificate call");
        self.remember_record(&response);
        response
    }

    async fn validate_contract_certificate(
        &self,
        _reference: ContractReference,
    ) -> CallResult<ValidateContractCertificateResult, ValidateContractCertificateError> {
        self.calls.validate.fetch_add(1, Ordering::SeqCst);
        self.state
            .lock()
            .unwrap()
            .validate
            .pop_front()
            .expect("unscripted validate_contract_certificate call")
    }

    async fn get_contract_owner(
        &self,
        _node: Principal,
    ) -> CallResult<ContractOwnerResult, GetContractOwnerError> {
        self.calls.owner.fetch_add(1, Ordering::SeqCst);
        self.state
            .lock()
            .unwrap()
            .owner
            .pop_front()
            .expect("unscripted get_contract_owner call")
    }

    async fn deploy_contract(
        &self,
        _args: DeployContractArgs,
    ) -> CallResult<DeploymentInformation, DeployContractError> {
        let response = self
            .state
            .lock()
            .unwrap()
            .deploy
            .pop_front()
            .expect("unscripted deploy_contract call");
        self.remember_record(&response);
        response
    }

    async fn get_config(&self) -> Result<Config, HubError> {
        self.calls.config.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        state
            .config
            .clone()
            .ok_or_else(|| HubError::Internal("no config scripted".to_string()))
    }

    async fn get_conversion_rate(&self) -> Result<ConversionRate, HubError> {
        self.calls.conversion_rate.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        state
            .conversion_rate
            .clone()
            .ok_or_else(|| HubError::Internal("no conversion rate scripted".to_string()))
    }
}

impl MockHub {
    /// Successful advancing responses become the record later fetches see
    fn remember_record<E>(&self, response: &CallResult<DeploymentInformation, E>) {
        if let Ok(deployment) = response {
            self.state.lock().unwrap().deployment = Some(deployment.clone());
        }
    }
}

/*
==========================================
Fixtures
==========================================
*/

pub fn deployer_identity() -> Arc<StaticIdentity> {
    Arc::new(StaticIdentity::logged_in(Principal::new(DEPLOYER)))
}

pub fn stranger_identity() -> Arc<StaticIdentity> {
    Arc::new(StaticIdentity::logged_in(Principal::new("user-zzzzz-zz")))
}

pub fn template(activation_required: bool) -> ContractTemplate {
    ContractTemplate {
        contract_template_id: 11,
        name: "counter".to_string(),
        contract_initial_cycles: 2_000_000_000_000,
        activation_required,
        blocked: false,
    }
}

pub fn deployment(state: DeploymentState, need_processing: bool) -> DeploymentInformation {
    DeploymentInformation {
        deployment_id: 7,
        deployer: Principal::new(DEPLOYER),
        created: 1_700_000_000_000,
        contract_template_id: 11,
        deployment_expenses: DeploymentExpensesInfo {
            deployment_cycles_cost: 1_000_000_000_000,
            contract_initial_cycles: 2_000_000_000_000,
            amount_buffer_permyriad: 500,
            amount_decimal_places: 4,
            cycles_permyriad_per_token: 30_000,
        },
        expenses_amount: 1_0500_0000,
        contract_node: None,
        state,
        processing_error: None,
        need_processing,
        lock: None,
    }
}

pub fn finalized_success() -> DeploymentInformation {
    let mut record = deployment(
        DeploymentState::FinalizeDeployment {
            result: DeploymentResult::Success,
            sub_state: FinalizeDeploymentState::Finalized,
        },
        false,
    );
    record.contract_node = Some(Principal::new(CONTRACT_NODE));
    record
}

pub fn certificate() -> SignedContractCertificate {
    SignedContractCertificate {
        contract_certificate: ContractCertificate {
            deployment_id: 7,
            contract_template_id: 11,
            contract_node: Principal::new(CONTRACT_NODE),
            deployer: Principal::new(DEPLOYER),
            created: 1_700_000_000_000,
            expiration: 1_700_100_000_000,
        },
        signature: vec![7, 7, 7],
    }
}

pub fn validation_active() -> ValidateContractCertificateResult {
    ValidateContractCertificateResult {
        certificate: certificate(),
        delay_to_expiration_millis: Some(600_000),
    }
}

pub fn validation_expired() -> ValidateContractCertificateResult {
    ValidateContractCertificateResult {
        certificate: certificate(),
        delay_to_expiration_millis: None,
    }
}
