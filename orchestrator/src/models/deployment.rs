//! Deployment record and workflow state

use serde::{Deserialize, Serialize};

use crate::models::certificate::SignedContractCertificate;
use crate::models::principal::Principal;
use crate::models::{Cycles, TimestampMillis, Timestamped, TokenUlps};

pub type DeploymentId = u64;
pub type ContractTemplateId = u64;

/// Workflow phase of a deployment, mirrored from the hub.
///
/// The hub owns the transitions; the client only interprets the current
/// phase and asks the hub to advance it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentState {
    StartDeployment,
    TransferDeployerFundsToTransitAccount,
    TransferTopUpFundsToMinter,
    NotifyMinterTopUp {
        minter: Principal,
        block_index: u64,
    },
    CreateContractNodeOverMinter,
    CreateContractNodeOverManagement,
    GenerateContractCertificate,
    WaitingReceiveContractCertificate,
    StartInstallContractBundle {
        certificate: SignedContractCertificate,
    },
    UploadContractBundle {
        certificate: SignedContractCertificate,
        upload_chunk_size: usize,
        upload_chunk_count: usize,
        uploaded_chunk_hashes: Vec<Vec<u8>>,
    },
    InstallContractBundle {
        certificate: SignedContractCertificate,
        uploaded_chunk_hashes: Vec<Vec<u8>>,
    },
    MakeContractSelfControlled,
    FinalizeDeployment {
        result: DeploymentResult,
        sub_state: FinalizeDeploymentState,
    },
}

/// Sub-state of the finalization phase. `Finalized` is the only terminal
/// state of the whole workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalizeDeploymentState {
    StartDeploymentFinalization,
    TransferTransitFundsToExternalService,
    Finalized,
}

/// Outcome carried by a finalizing deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentResult {
    Success,
    Cancelled { reason: String },
}

/// Lock window enforced by the hub after certain phase transitions;
/// the next advance call is not accepted before `locked_till_millis`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentLock {
    pub locked_till_millis: TimestampMillis,
}

/// Expense parameters the hub fixed for this deployment at creation time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentExpensesInfo {
    pub deployment_cycles_cost: Cycles,
    pub contract_initial_cycles: Cycles,
    pub amount_buffer_permyriad: u64,
    pub amount_decimal_places: u8,
    pub cycles_permyriad_per_token: u64,
}

/// A deployment as returned by the hub.
///
/// The record is authoritative on the hub side: the client never mutates
/// individual fields, it only replaces the whole record with a freshly
/// returned one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentInformation {
    /// Unique deployment ID
    pub deployment_id: DeploymentId,

    /// Principal that started the deployment
    pub deployer: Principal,

    /// Creation timestamp
    pub created: TimestampMillis,

    /// Template this deployment was created from
    pub contract_template_id: ContractTemplateId,

    /// Expense parameters fixed at creation
    pub deployment_expenses: DeploymentExpensesInfo,

    /// Approved token amount reserved for this deployment
    pub expenses_amount: TokenUlps,

    /// Contract node once the workflow has created it
    pub contract_node: Option<Principal>,

    /// Current workflow phase
    pub state: DeploymentState,

    /// Last processing error recorded by the hub
    pub processing_error: Option<Timestamped<String>>,

    /// Whether the hub expects another `process_deployment` call
    pub need_processing: bool,

    /// Active lock window, if any
    pub lock: Option<DeploymentLock>,
}
