//! Prompt builder: resource descriptor → bounded analysis request.
//!
//! The prompt has three parts, always in this order:
//!
//! 1. the evaluator role and the risk categories to look for,
//! 2. the resource serialized verbatim as compact JSON,
//! 3. the literal response contract from `ResponseContract::describe`.

use tracing::debug;

use sentinel_contracts::{
    error::{SentinelError, SentinelResult},
    resource::{AnalysisRequest, ResourceDescriptor},
    schema::ResponseContract,
};

/// Default cap on the serialized size of one resource.
pub const DEFAULT_MAX_RESOURCE_BYTES: usize = 256 * 1024;

/// Risk categories every analysis must cover.
pub const RISK_CATEGORIES: [&str; 6] = [
    "Administrative ports (22/SSH, 3389/RDP) open to the internet, e.g. cidr 0.0.0.0/0 or ::/0",
    "Publicly readable or writable storage: public-read ACLs or bucket policies open to everyone",
    "Unrestricted identity-and-access permissions, e.g. Action \"*\" on Resource \"*\"",
    "Missing encryption at rest or in transit",
    "Missing audit or access logging",
    "Secrets, keys, or passwords embedded in the configuration",
];

/// Builds one `AnalysisRequest` per resource. Pure: no I/O, no state.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    contract: ResponseContract,
    max_resource_bytes: usize,
}

impl PromptBuilder {
    pub fn new(contract: ResponseContract, max_resource_bytes: usize) -> Self {
        Self {
            contract,
            max_resource_bytes,
        }
    }

    pub fn contract(&self) -> &ResponseContract {
        &self.contract
    }

    /// Compose the request for `resource`.
    ///
    /// # Errors
    ///
    /// `ReadError` when the resource cannot be serialized or its serialized
    /// form exceeds the configured bound. The backend is never called for
    /// such resources.
    pub fn build(&self, resource: &ResourceDescriptor) -> SentinelResult<AnalysisRequest> {
        let serialized =
            serde_json::to_string(resource.body()).map_err(|e| SentinelError::ReadError {
                reason: format!("resource cannot be serialized: {e}"),
            })?;

        if serialized.len() > self.max_resource_bytes {
            return Err(SentinelError::ReadError {
                reason: format!(
                    "resource is {} bytes, exceeding the {} byte limit",
                    serialized.len(),
                    self.max_resource_bytes
                ),
            });
        }

        let categories = RISK_CATEGORIES
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}. {}", i + 1, c))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Act as a DevSecOps auditor. Analyze the infrastructure-as-code resource below \
             (Terraform, CloudFormation, or raw JSON).\n\
             \n\
             Identify CRITICAL risks that must block the deployment:\n\
             {categories}\n\
             \n\
             RESOURCE: {serialized}\n\
             \n\
             {contract}\n",
            contract = self.contract.describe(),
        );

        debug!(
            resource_id = %resource.id(),
            prompt_bytes = prompt.len(),
            "analysis request built"
        );

        Ok(AnalysisRequest::new(resource.id().clone(), prompt))
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(ResponseContract::verdict_v1(), DEFAULT_MAX_RESOURCE_BYTES)
    }
}
