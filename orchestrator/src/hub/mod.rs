//! Hub API boundary
//!
//! One type block per remote call, mirroring the hub's own API crate:
//! args, result, structured error enum. The hub answers every call with an
//! externally tagged `Ok`/`Err` envelope ([`CallResponse`]); transport
//! failures stay separate as [`HubError`](crate::errors::HubError) inside
//! [`CallError`](crate::errors::CallError).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::{CallError, CallResult, HubError};
use crate::models::certificate::SignedContractCertificate;
use crate::models::config::{Config, ConversionRate};
use crate::models::deployment::{
    ContractTemplateId, DeploymentId, DeploymentInformation, DeploymentLock,
};
use crate::models::principal::Principal;
use crate::models::TimestampMillis;

/// Wire envelope for a structured hub response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CallResponse<T, E> {
    Ok(T),
    Err(E),
}

impl<T, E> CallResponse<T, E> {
    pub fn into_result(self) -> CallResult<T, E> {
        match self {
            CallResponse::Ok(value) => Ok(value),
            CallResponse::Err(error) => Err(CallError::Response(error)),
        }
    }
}

/*
==========================================
get_deployment
==========================================
*/

/// Selector for the deployment to fetch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeploymentFilter {
    Active { deployer: Principal },
    ByDeploymentId { deployment_id: DeploymentId },
    ByContractNodeId { node_id: Principal },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetDeploymentArgs {
    pub filter: DeploymentFilter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetDeploymentResult {
    pub deployment: DeploymentInformation,
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GetDeploymentError {
    #[error("deployment not found")]
    DeploymentNotFound,
}

/*
==========================================
process_deployment
==========================================
*/

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessDeploymentArgs {
    pub deployment_id: DeploymentId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessDeploymentResult {
    pub deployment: DeploymentInformation,
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessDeploymentError {
    #[error("deployment not found")]
    DeploymentNotFound,

    #[error("permission denied")]
    PermissionDenied,
}

/*
==========================================
cancel_deployment
==========================================
*/

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelDeploymentArgs {
    pub deployment_id: DeploymentId,
    pub reason: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelDeploymentError {
    #[error("deployment not found")]
    DeploymentNotFound,

    #[error("permission denied")]
    PermissionDenied,

    #[error("deployment is in a state that cannot be cancelled")]
    DeploymentWrongState,

    #[error("deployment is locked")]
    DeploymentLocked { lock: DeploymentLock },
}

/*
==========================================
obtain_contract_certificate
==========================================
*/

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObtainContractCertificateArgs {
    pub deployment_id: DeploymentId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObtainContractCertificateResult {
    pub certificate: SignedContractCertificate,
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObtainContractCertificateError {
    #[error("deployment not found")]
    DeploymentNotFound,

    #[error("permission denied")]
    PermissionDenied,

    #[error("deployment is in a state without a certificate")]
    DeploymentWrongState,

    #[error("failed to build certificate: {reason}")]
    BuildCertificateError { reason: String },

    #[error("certificate not found")]
    CertificateNotFound,
}

/*
==========================================
initialize_contract_certificate
==========================================
*/

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeContractCertificateArgs {
    pub deployment_id: DeploymentId,
    pub certificate: SignedContractCertificate,
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitializeContractCertificateError {
    #[error("deployment not found")]
    DeploymentNotFound,

    #[error("permission denied")]
    PermissionDenied,

    #[error("deployment is in a state that does not accept a certificate")]
    DeploymentWrongState,

    #[error("invalid certificate: {reason}")]
    InvalidCertificate { reason: String },

    #[error("deployment is locked")]
    DeploymentLocked { lock: DeploymentLock },
}

/*
==========================================
retry_generate_contract_certificate
==========================================
*/

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryGenerateContractCertificateArgs {
    pub deployment_id: DeploymentId,
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryGenerateContractCertificateError {
    #[error("deployment not found")]
    DeploymentNotFound,

    #[error("permission denied")]
    PermissionDenied,

    #[error("deployment is in a state without certificate generation")]
    DeploymentWrongState,

    #[error("deployment is locked")]
    DeploymentLocked { lock: DeploymentLock },
}

/*
==========================================
validate_contract_certificate
==========================================
*/

/// How the contract to validate is referenced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ContractReference {
    Node(Principal),
    Url(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateContractCertificateArgs {
    pub contract_reference: ContractReference,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateContractCertificateResult {
    pub certificate: SignedContractCertificate,

    /// Present while the certificate is still active; absent once expired
    pub delay_to_expiration_millis: Option<TimestampMillis>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidateContractCertificateError {
    #[error("contract URL validation unavailable: {reason}")]
    ValidateContractUrlUnavailable { reason: String },

    #[error("invalid contract reference URL")]
    InvalidContractReferenceUrl,

    #[error("certificate unavailable")]
    CertificateUnavailable,

    #[error("contract info unavailable")]
    ContractInfoUnavailable,

    #[error("certificate is wrong: {reason}")]
    CertificateWrong { reason: String },
}

/*
==========================================
get_contract_owner
==========================================
*/

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractOwnerResult {
    pub owner: Principal,
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GetContractOwnerError {
    #[error("contract is not activated")]
    ContractNotActivated,

    #[error("contract does not require activation")]
    ContractActivationNotRequired,

    #[error("contract owner unavailable: {reason}")]
    OwnerUnavailable { reason: String },
}

/*
==========================================
deploy_contract
==========================================
*/

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployContractArgs {
    pub contract_template_id: ContractTemplateId,
    pub approved_amount_ulps: u128,
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeployContractError {
    #[error("caller not authorized")]
    CallerNotAuthorized,

    #[error("deployment is currently unavailable")]
    DeploymentUnavailable,

    #[error("an active deployment already exists")]
    ActiveDeploymentExists {
        deployment: Box<DeploymentInformation>,
    },

    #[error("contract template not found")]
    ContractTemplateNotFound,

    #[error("contract template is blocked")]
    ContractTemplateBlocked,

    #[error("insufficient approved balance")]
    InsufficientApprovedBalance,

    #[error("allowance expires too early")]
    AllowanceExpiresTooEarly,

    #[error("failed to get conversion rate: {reason}")]
    GetConversionRateError { reason: String },

    #[error("failed to calculate deployment expenses: {reason}")]
    CalculateDeploymentExpensesError { reason: String },
}

/// The remote authority every orchestrator component talks to.
///
/// The hub executes deployment phases and issues certificates; the client
/// only mirrors its state. Implemented over HTTP by
/// [`HttpClient`](crate::http::client::HttpClient) and by in-memory mocks
/// in tests.
#[async_trait]
pub trait HubApi: Send + Sync {
    async fn get_deployment(
        &self,
        filter: DeploymentFilter,
    ) -> CallResult<DeploymentInformation, GetDeploymentError>;

    async fn process_deployment(
        &self,
        deployment_id: DeploymentId,
    ) -> CallResult<DeploymentInformation, ProcessDeploymentError>;

    async fn cancel_deployment(
        &self,
        deployment_id: DeploymentId,
        reason: String,
    ) -> CallResult<DeploymentInformation, CancelDeploymentError>;

    async fn obtain_contract_certificate(
        &self,
        deployment_id: DeploymentId,
    ) -> CallResult<SignedContractCertificate, ObtainContractCertificateError>;

    async fn initialize_contract_certificate(
        &self,
        deployment_id: DeploymentId,
        certificate: SignedContractCertificate,
    ) -> CallResult<DeploymentInformation, InitializeContractCertificateError>;

    async fn retry_generate_contract_certificate(
        &self,
        deployment_id: DeploymentId,
    ) -> CallResult<DeploymentInformation, RetryGenerateContractCertificateError>;

    async fn validate_contract_certificate(
        &self,
        reference: ContractReference,
    ) -> CallResult<ValidateContractCertificateResult, ValidateContractCertificateError>;

    async fn get_contract_owner(
        &self,
        node: Principal,
    ) -> CallResult<ContractOwnerResult, GetContractOwnerError>;

    async fn deploy_contract(
        &self,
        args: DeployContractArgs,
    ) -> CallResult<DeploymentInformation, DeployContractError>;

    async fn get_config(&self) -> Result<Config, HubError>;

    async fn get_conversion_rate(&self) -> Result<ConversionRate, HubError>;
}
