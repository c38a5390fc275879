//! Contract trust certificates

use serde::{Deserialize, Serialize};

use crate::models::principal::Principal;
use crate::models::deployment::{ContractTemplateId, DeploymentId};
use crate::models::TimestampMillis;

/// Certificate payload issued by the hub for a deployed contract node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCertificate {
    pub deployment_id: DeploymentId,
    pub contract_template_id: ContractTemplateId,
    pub contract_node: Principal,
    pub deployer: Principal,
    pub created: TimestampMillis,
    pub expiration: TimestampMillis,
}

/// Certificate plus the hub's signature over its payload.
///
/// The signature is opaque to the client: trust is established by asking
/// the hub to validate, never by local verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedContractCertificate {
    pub contract_certificate: ContractCertificate,

    /// Raw signature bytes, base64 on the wire
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
