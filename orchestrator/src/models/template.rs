//! Contract templates

use serde::{Deserialize, Serialize};

use crate::models::deployment::ContractTemplateId;
use crate::models::Cycles;

/// Blueprint a deployment is created from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractTemplate {
    /// Unique template ID
    pub contract_template_id: ContractTemplateId,

    /// Display name
    pub name: String,

    /// Cycles the contract node is created with
    pub contract_initial_cycles: Cycles,

    /// Whether the deployed contract requires a one-time activation step
    pub activation_required: bool,

    /// Whether the hub has blocked deployments from this template
    pub blocked: bool,
}
