//! Hub API over HTTP

use async_trait::async_trait;

use crate::errors::{CallResult, HubError};
use crate::http::client::HttpClient;
use crate::hub::{
    CallResponse, CancelDeploymentArgs, CancelDeploymentError, ContractOwnerResult,
    ContractReference, DeployContractArgs, DeployContractError, DeploymentFilter,
    GetContractOwnerError, GetDeploymentArgs, GetDeploymentError, GetDeploymentResult, HubApi,
    InitializeContractCertificateArgs, InitializeContractCertificateError,
    ObtainContractCertificateArgs, ObtainContractCertificateError,
    ObtainContractCertificateResult, ProcessDeploymentArgs, ProcessDeploymentError,
    ProcessDeploymentResult, RetryGenerateContractCertificateArgs,
    RetryGenerateContractCertificateError, ValidateContractCertificateArgs,
    ValidateContractCertificateError, ValidateContractCertificateResult,
};
use crate::models::certificate::SignedContractCertificate;
use crate::models::config::{Config, ConversionRate};
use crate::models::deployment::{DeploymentId, DeploymentInformation};
use crate::models::principal::Principal;

#[async_trait]
impl HubApi for HttpClient {
    async fn get_deployment(
        &self,
        filter: DeploymentFilter,
    ) -> CallResult<DeploymentInformation, GetDeploymentError> {
        let response: CallResponse<GetDeploymentResult, GetDeploymentError> = self
            .post("/hub/deployments/get", &GetDeploymentArgs { filter })
            .await?;
        response.into_result().map(|result| result.deployment)
    }

    async fn process_deployment(
        &self,
        deployment_id: DeploymentId,
    ) -> CallResult<DeploymentInformation, ProcessDeploymentError> {
        let response: CallResponse<ProcessDeploymentResult, ProcessDeploymentError> = self
            .post(
                "/hub/deployments/process",
                &ProcessDeploymentArgs { deployment_id },
            )
            .await?;
        response.into_result().map(|result| result.deployment)
    }

    async fn cancel_deployment(
        &self,
        deployment_id: DeploymentId,
        reason: String,
    ) -> CallResult<DeploymentInformation, CancelDeploymentError> {
        let response: CallResponse<ProcessDeploymentResult, CancelDeploymentError> = self
            .post(
                "/hub/deployments/cancel",
                &CancelDeploymentArgs {
                    deployment_id,
                    reason,
                },
            )
            .await?;
        response.into_result().map(|result| result.deployment)
    }

    async fn obtain_contract_certificate(
        &self,
        deployment_id: DeploymentId,
    ) -> CallResult<SignedContractCertificate, ObtainContractCertificateError> {
        let response: CallResponse<ObtainContractCertificateResult, ObtainContractCertificateError> =
            self.post(
                "/hub/certificates/obtain",
                &ObtainContractCertificateArgs { deployment_id },
            )
            .await?;
        response.into_result().map(|result| result.certificate)
    }

    async fn initialize_contract_certificate(
        &self,
        deployment_id: DeploymentId,
        certificate: SignedContractCertificate,
    ) -> CallResult<DeploymentInformation, InitializeContractCertificateError> {
        let response: CallResponse<ProcessDeploymentResult, InitializeContractCertificateError> =
            self.post(
                "/hub/certificates/initialize",
                &InitializeContractCertificateArgs {
                    deployment_id,
                    certificate,
                },
            )
            .await?;
        response.into_result().map(|result| result.deployment)
    }

    async fn retry_generate_contract_certificate(
        &self,
        deployment_id: DeploymentId,
    ) -> CallResult<DeploymentInformation, RetryGenerateContractCertificateError> {
        let response: CallResponse<ProcessDeploymentResult, RetryGenerateContractCertificateError> =
            self.post(
                "/hub/certificates/retry-generate",
                &RetryGenerateContractCertificateArgs { deployment_id },
            )
            .await?;
        response.into_result().map(|result| result.deployment)
    }

    async fn validate_contract_certificate(
        &self,
        reference: ContractReference,
    ) -> CallResult<ValidateContractCertificateResult, ValidateContractCertificateError> {
        let response: CallResponse<ValidateContractCertificateResult, ValidateContractCertificateError> =
            self.post(
                "/hub/certificates/validate",
                &ValidateContractCertificateArgs {
                    contract_reference: reference,
                },
            )
            .await?;
        response.into_result()
    }

    async fn get_contract_owner(
        &self,
        node: Principal,
    ) -> CallResult<ContractOwnerResult, GetContractOwnerError> {
        let response: CallResponse<ContractOwnerResult, GetContractOwnerError> = self
            .post("/contract/owner", &serde_json::json!({ "node": node }))
            .await?;
        response.into_result()
    }

    async fn deploy_contract(
        &self,
        args: DeployContractArgs,
    ) -> CallResult<DeploymentInformation, DeployContractError> {
        let response: CallResponse<ProcessDeploymentResult, DeployContractError> =
            self.post("/hub/deployments/deploy", &args).await?;
        response.into_result().map(|result| result.deployment)
    }

    async fn get_config(&self) -> Result<Config, HubError> {
        self.get("/hub/config").await
    }

    async fn get_conversion_rate(&self) -> Result<ConversionRate, HubError> {
        self.get("/hub/conversion-rate").await
    }
}
