//! Periodic certificate re-validation
//!
//! Independent of the processor: once a deployment reaches terminal
//! success, asks the hub whether the contract's certificate is currently
//! valid and active, and classifies the answer. Every response fully
//! replaces the previous classification.

use std::sync::{Arc, RwLock};

use tracing::{debug, error};

use crate::errors::CallError;
use crate::flight::SingleFlight;
use crate::hub::{ContractReference, HubApi, ValidateContractCertificateError};
use crate::models::certificate::SignedContractCertificate;
use crate::models::TimestampMillis;

/// Availability of an independently loading data source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataAvailability<T> {
    Loading,
    Available(T),
    /// Client-side failure; the error is retained for display
    NotAvailable { error: String },
}

/// Health of the contract certificate as judged by the hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractValidationState {
    CertificateValidAndActive {
        delay_to_expiration_millis: TimestampMillis,
        certificate: SignedContractCertificate,
    },
    CertificateValidButExpired {
        certificate: SignedContractCertificate,
    },
    /// The hub could not validate right now; a manual retry is offered
    BackendErrorWithRetry {
        error: ValidateContractCertificateError,
    },
    /// The contract failed validation; no retry is offered
    ValidationFatalError,
}

/// Validator of the deployed contract's certificate
pub struct CertificateValidator {
    api: Arc<dyn HubApi>,
    state: RwLock<Option<DataAvailability<ContractValidationState>>>,
    flight: SingleFlight,
}

impl CertificateValidator {
    pub fn new(api: Arc<dyn HubApi>) -> Self {
        Self {
            api,
            state: RwLock::new(None),
            flight: SingleFlight::new(),
        }
    }

    /// Latest classification; `None` until the first validation starts
    pub fn availability(&self) -> Option<DataAvailability<ContractValidationState>> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.clone()
    }

    /// Whether the latest classification allows offering a retry
    pub fn retryable(&self) -> bool {
        matches!(
            self.availability(),
            Some(DataAvailability::NotAvailable { .. })
                | Some(DataAvailability::Available(
                    ContractValidationState::BackendErrorWithRetry { .. }
                ))
        )
    }

    /// Ask the hub to validate the certificate of the given contract.
    /// Concurrent calls share one request.
    pub async fn validate(self: &Arc<Self>, reference: ContractReference) {
        let this = Arc::clone(self);
        self.flight
            .run(move || async move { this.validate_inner(reference).await })
            .await;
    }

    async fn validate_inner(&self, reference: ContractReference) {
        self.set_state(DataAvailability::Loading);

        let availability = match self.api.validate_contract_certificate(reference).await {
            Ok(result) => match result.delay_to_expiration_millis {
                Some(delay_to_expiration_millis) => {
                    debug!(delay_to_expiration_millis, "certificate valid and active");
                    DataAvailability::Available(ContractValidationState::CertificateValidAndActive {
                        delay_to_expiration_millis,
                        certificate: result.certificate,
                    })
                }
                // No expiration delay means the certificate is expired
                None => DataAvailability::Available(
                    ContractValidationState::CertificateValidButExpired {
                        certificate: result.certificate,
                    },
                ),
            },
            Err(CallError::Response(response_error)) => {
                error!("hub rejected certificate validation: {}", response_error);
                if validation_retryable(&response_error) {
                    DataAvailability::Available(ContractValidationState::BackendErrorWithRetry {
                        error: response_error,
                    })
                } else {
                    DataAvailability::Available(ContractValidationState::ValidationFatalError)
                }
            }
            Err(CallError::Transport(transport_error)) => {
                error!("certificate validation failed: {}", transport_error);
                DataAvailability::NotAvailable {
                    error: transport_error.to_string(),
                }
            }
        };

        self.set_state(availability);
    }

    fn set_state(&self, availability: DataAvailability<ContractValidationState>) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        *state = Some(availability);
    }
}

/// The unavailability errors worth retrying; everything else means the
/// contract is not trustworthy.
fn validation_retryable(error: &ValidateContractCertificateError) -> bool {
    matches!(
        error,
        ValidateContractCertificateError::CertificateUnavailable
            | ValidateContractCertificateError::ContractInfoUnavailable
            | ValidateContractCertificateError::ValidateContractUrlUnavailable { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(validation_retryable(
            &ValidateContractCertificateError::CertificateUnavailable
        ));
        assert!(validation_retryable(
            &ValidateContractCertificateError::ContractInfoUnavailable
        ));
        assert!(validation_retryable(
            &ValidateContractCertificateError::ValidateContractUrlUnavailable {
                reason: "gateway timeout".to_string(),
            }
        ));
        assert!(!validation_retryable(
            &ValidateContractCertificateError::CertificateWrong {
                reason: "signature mismatch".to_string(),
            }
        ));
        assert!(!validation_retryable(
            &ValidateContractCertificateError::InvalidContractReferenceUrl
        ));
    }
}
