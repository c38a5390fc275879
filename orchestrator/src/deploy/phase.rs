//! Workflow phase interpretation
//!
//! Pure mapping from the hub's deployment state to the ordered progress
//! steps shown to the user, the sub-progress inside the active step, and
//! the terminal classification.

use crate::models::deployment::{
    DeploymentResult, DeploymentState, FinalizeDeploymentState,
};
use crate::models::principal::Principal;

/// Ordered progress steps of the deployment workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeploymentStep {
    TransferFunds,
    MintCycles,
    CreateContractNode,
    GenerateCertificate,
    InstallContractBundle,
    MakeSelfControlled,
    Finalize,
}

/// Number of steps in the workflow
pub const STEP_COUNT: u8 = 7;

impl DeploymentStep {
    pub fn index(&self) -> u8 {
        *self as u8
    }
}

/// What the current phase means for progress display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseInterpretation {
    /// Active step
    pub step: DeploymentStep,

    /// Sub-progress inside the active step; `None` renders as an
    /// indeterminate spinner
    pub progress_percent: Option<u8>,

    /// True only for `FinalizeDeployment` with a `Finalized` sub-state
    pub terminal: bool,
}

/// Interpret a workflow phase.
///
/// The match is deliberately exhaustive with no fallback arm: a new hub
/// phase must fail compilation here rather than silently render as some
/// default step.
pub fn interpret_phase(state: &DeploymentState) -> PhaseInterpretation {
    match state {
        DeploymentState::StartDeployment => step(DeploymentStep::TransferFunds, Some(25)),
        DeploymentState::TransferDeployerFundsToTransitAccount => {
            step(DeploymentStep::TransferFunds, Some(50))
        }
        DeploymentState::TransferTopUpFundsToMinter => {
            step(DeploymentStep::TransferFunds, Some(75))
        }
        DeploymentState::NotifyMinterTopUp { .. } => step(DeploymentStep::MintCycles, None),
        DeploymentState::CreateContractNodeOverMinter
        | DeploymentState::CreateContractNodeOverManagement => {
            step(DeploymentStep::CreateContractNode, None)
        }
        DeploymentState::GenerateContractCertificate => {
            step(DeploymentStep::GenerateCertificate, Some(35))
        }
        DeploymentState::WaitingReceiveContractCertificate => {
            step(DeploymentStep::GenerateCertificate, Some(75))
        }
        DeploymentState::StartInstallContractBundle { .. } => {
            step(DeploymentStep::InstallContractBundle, Some(20))
        }
        DeploymentState::UploadContractBundle {
            upload_chunk_count,
            uploaded_chunk_hashes,
            ..
        } => step(
            DeploymentStep::InstallContractBundle,
            Some(upload_progress_percent(
                uploaded_chunk_hashes.len(),
                *upload_chunk_count,
            )),
        ),
        DeploymentState::InstallContractBundle { .. } => {
            step(DeploymentStep::InstallContractBundle, Some(90))
        }
        DeploymentState::MakeContractSelfControlled => {
            step(DeploymentStep::MakeSelfControlled, None)
        }
        DeploymentState::FinalizeDeployment { sub_state, .. } => match sub_state {
            FinalizeDeploymentState::Finalized => PhaseInterpretation {
                step: DeploymentStep::Finalize,
                progress_percent: None,
                terminal: true,
            },
            FinalizeDeploymentState::TransferTransitFundsToExternalService => {
                step(DeploymentStep::Finalize, Some(35))
            }
            FinalizeDeploymentState::StartDeploymentFinalization => {
                step(DeploymentStep::Finalize, Some(75))
            }
        },
    }
}

fn step(step: DeploymentStep, progress_percent: Option<u8>) -> PhaseInterpretation {
    PhaseInterpretation {
        step,
        progress_percent,
        terminal: false,
    }
}

/// Upload progress mapped into the [20, 85] band of the install step
fn upload_progress_percent(uploaded_chunks: usize, total_chunks: usize) -> u8 {
    if total_chunks == 0 {
        return 20;
    }
    let percent = 20 + (uploaded_chunks * 65) / total_chunks;
    percent.clamp(20, 85) as u8
}

/// Whether the deployment has finalized, with any result
pub fn is_finalized_with_any_result(state: &DeploymentState) -> bool {
    matches!(
        state,
        DeploymentState::FinalizeDeployment {
            sub_state: FinalizeDeploymentState::Finalized,
            ..
        }
    )
}

/// Whether the user may still cancel the deployment. Finalization cannot
/// be interrupted.
pub fn termination_possible(state: &DeploymentState) -> bool {
    !matches!(state, DeploymentState::FinalizeDeployment { .. })
}

/// Projection of the finalize result for status display
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractDeploymentState {
    /// Workflow still running
    Deploying,

    /// Finalized successfully on the given contract node
    Success { contract_node: Principal },

    /// Finalized after cancellation
    Terminated { reason: String },
}

/// Derive the deployment-state projection from the phase and the record's
/// contract node handle. Returns `None` for the illegal combination of a
/// successful finalize without a node handle.
pub fn contract_deployment_state(
    state: &DeploymentState,
    contract_node: Option<&Principal>,
) -> Option<ContractDeploymentState> {
    let DeploymentState::FinalizeDeployment { result, sub_state } = state else {
        return Some(ContractDeploymentState::Deploying);
    };
    if *sub_state != FinalizeDeploymentState::Finalized {
        return Some(ContractDeploymentState::Deploying);
    }
    match result {
        DeploymentResult::Success => {
            let node = contract_node?;
            Some(ContractDeploymentState::Success {
                contract_node: node.clone(),
            })
        }
        DeploymentResult::Cancelled { reason } => Some(ContractDeploymentState::Terminated {
            reason: reason.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::certificate::{ContractCertificate, SignedContractCertificate};

    fn certificate() -> SignedContractCertificate {
        SignedContractCertificate {
            contract_certificate: ContractCertificate {
                deployment_id: 1,
                contract_template_id: 1,
                contract_node: Principal::new("node-aaaaa-aa"),
                deployer: Principal::new("user-aaaaa-aa"),
                created: 0,
                expiration: 0,
            },
            signature: vec![1, 2, 3],
        }
    }

    fn upload_state(uploaded: usize, total: usize) -> DeploymentState {
        DeploymentState::UploadContractBundle {
            certificate: certificate(),
            upload_chunk_size: 1 << 20,
            upload_chunk_count: total,
            uploaded_chunk_hashes: vec![vec![0u8]; uploaded],
        }
    }

    fn canonical_sequence() -> Vec<DeploymentState> {
        vec![
            DeploymentState::StartDeployment,
            DeploymentState::TransferDeployerFundsToTransitAccount,
            DeploymentState::TransferTopUpFundsToMinter,
            DeploymentState::NotifyMinterTopUp {
                minter: Principal::new("minter-aaaaa-aa"),
                block_index: 10,
            },
            DeploymentState::CreateContractNodeOverMinter,
            DeploymentState::GenerateContractCertificate,
            DeploymentState::WaitingReceiveContractCertificate,
            DeploymentState::StartInstallContractBundle {
                certificate: certificate(),
            },
            upload_state(2, 4),
            DeploymentState::InstallContractBundle {
                certificate: certificate(),
                uploaded_chunk_hashes: vec![],
            },
            DeploymentState::MakeContractSelfControlled,
            DeploymentState::FinalizeDeployment {
                result: DeploymentResult::Success,
                sub_state: FinalizeDeploymentState::TransferTransitFundsToExternalService,
            },
            DeploymentState::FinalizeDeployment {
                result: DeploymentResult::Success,
                sub_state: FinalizeDeploymentState::Finalized,
            },
        ]
    }

    #[test]
    fn test_step_index_monotonic_over_canonical_sequence() {
        let mut last_index = 0u8;
        for state in canonical_sequence() {
            let index = interpret_phase(&state).step.index();
            assert!(
                index >= last_index,
                "step index decreased at {:?}: {} < {}",
                state,
                index,
                last_index
            );
            assert!(index < STEP_COUNT);
            last_index = index;
        }
    }

    #[test]
    fn test_terminal_only_when_finalized() {
        for state in canonical_sequence() {
            let interpretation = interpret_phase(&state);
            assert_eq!(
                interpretation.terminal,
                is_finalized_with_any_result(&state)
            );
        }
    }

    #[test]
    fn test_transfer_funds_sub_progress() {
        assert_eq!(
            interpret_phase(&DeploymentState::StartDeployment).progress_percent,
            Some(25)
        );
        assert_eq!(
            interpret_phase(&DeploymentState::TransferDeployerFundsToTransitAccount)
                .progress_percent,
            Some(50)
        );
        assert_eq!(
            interpret_phase(&DeploymentState::TransferTopUpFundsToMinter).progress_percent,
            Some(75)
        );
    }

    #[test]
    fn test_upload_progress_band() {
        assert_eq!(interpret_phase(&upload_state(0, 4)).progress_percent, Some(20));
        assert_eq!(interpret_phase(&upload_state(2, 4)).progress_percent, Some(52));
        assert_eq!(interpret_phase(&upload_state(4, 4)).progress_percent, Some(85));
        // Zero chunks never divides by zero
        assert_eq!(interpret_phase(&upload_state(0, 0)).progress_percent, Some(20));
    }

    #[test]
    fn test_finalize_sub_progress() {
        let before_transfer = DeploymentState::FinalizeDeployment {
            result: DeploymentResult::Success,
            sub_state: FinalizeDeploymentState::TransferTransitFundsToExternalService,
        };
        let interpretation = interpret_phase(&before_transfer);
        assert_eq!(interpretation.progress_percent, Some(35));
        assert!(!interpretation.terminal);

        let started = DeploymentState::FinalizeDeployment {
            result: DeploymentResult::Success,
            sub_state: FinalizeDeploymentState::StartDeploymentFinalization,
        };
        assert_eq!(interpret_phase(&started).progress_percent, Some(75));
    }

    #[test]
    fn test_termination_possible_until_finalize() {
        assert!(termination_possible(&DeploymentState::StartDeployment));
        assert!(termination_possible(
            &DeploymentState::MakeContractSelfControlled
        ));
        assert!(!termination_possible(&DeploymentState::FinalizeDeployment {
            result: DeploymentResult::Success,
            sub_state: FinalizeDeploymentState::StartDeploymentFinalization,
        }));
    }

    #[test]
    fn test_contract_deployment_state_projection() {
        let node = Principal::new("node-aaaaa-aa");

        assert_eq!(
            contract_deployment_state(&DeploymentState::StartDeployment, None),
            Some(ContractDeploymentState::Deploying)
        );

        let success = DeploymentState::FinalizeDeployment {
            result: DeploymentResult::Success,
            sub_state: FinalizeDeploymentState::Finalized,
        };
        assert_eq!(
            contract_deployment_state(&success, Some(&node)),
            Some(ContractDeploymentState::Success {
                contract_node: node.clone(),
            })
        );
        // Success without a node handle is an illegal state
        assert_eq!(contract_deployment_state(&success, None), None);

        let cancelled = DeploymentState::FinalizeDeployment {
            result: DeploymentResult::Cancelled {
                reason: "out of funds".to_string(),
            },
            sub_state: FinalizeDeploymentState::Finalized,
        };
        assert_eq!(
            contract_deployment_state(&cancelled, None),
            Some(ContractDeploymentState::Terminated {
                reason: "out of funds".to_string(),
            })
        );
    }
}
