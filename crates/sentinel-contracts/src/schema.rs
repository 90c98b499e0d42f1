//! The response contract shared by the prompt builder and the normalizer.
//!
//! The prompt tells the backend exactly which fields to emit; the normalizer
//! checks the reply against the same field names and tokens. Keeping both in
//! one place means the request and the parser cannot drift apart.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Primary key carrying the outcome token.
pub const STATUS_FIELD: &str = "status";
/// Accepted alias of [`STATUS_FIELD`].
pub const OUTCOME_FIELD: &str = "outcome";

/// Keys carrying the risk title, primary first.
pub const RISK_TITLE_FIELDS: [&str; 2] = ["risco", "risk_title"];
/// Keys carrying the explanation, primary first.
pub const DETAIL_FIELDS: [&str; 2] = ["detalhe", "detail"];
/// Keys carrying the suggested fix, primary first.
pub const REMEDIATION_FIELDS: [&str; 2] = ["correcao", "remediation"];

/// Tokens mapped to `APPROVED`. Matching is exact and case-sensitive.
pub const APPROVED_TOKENS: [&str; 2] = ["APROVADO", "APPROVED"];
/// Tokens mapped to `REJECTED`.
pub const REJECTED_TOKENS: [&str; 2] = ["REPROVADO", "REJECTED"];
/// Tokens with which the backend declares it could not analyze the resource.
pub const ERROR_TOKENS: [&str; 2] = ["ERRO", "ERROR"];

/// A named response shape: JSON Schema for structure plus the literal text
/// embedded in every prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseContract {
    /// Identifier for this contract (e.g. "iac-verdict-v1").
    pub contract_id: String,
    /// Structural constraints on the reply object.
    pub json_schema: Value,
}

impl ResponseContract {
    /// The verdict contract used by every scan.
    pub fn verdict_v1() -> Self {
        let text_or_null = json!({ "type": ["string", "null"] });
        let mut properties = serde_json::Map::new();
        properties.insert(STATUS_FIELD.to_string(), json!({ "type": "string" }));
        properties.insert(OUTCOME_FIELD.to_string(), json!({ "type": "string" }));
        for key in RISK_TITLE_FIELDS
            .iter()
            .chain(DETAIL_FIELDS.iter())
            .chain(REMEDIATION_FIELDS.iter())
        {
            properties.insert((*key).to_string(), text_or_null.clone());
        }

        Self {
            contract_id: "iac-verdict-v1".to_string(),
            json_schema: json!({
                "type": "object",
                "properties": Value::Object(properties),
            }),
        }
    }

    /// The literal response-format instructions appended to each prompt.
    pub fn describe(&self) -> String {
        format!(
            "Respond with ONLY the following JSON object (no markdown, no extra text):\n\
             {{\n\
             \x20 \"{status}\": \"{approved}\" or \"{rejected}\",\n\
             \x20 \"{risk}\": \"short risk title (null if the resource is safe)\",\n\
             \x20 \"{detail}\": \"short explanation\",\n\
             \x20 \"{fix}\": \"what to change in the code\"\n\
             }}\n\
             The \"{status}\" field must be exactly \"{approved}\" or \"{rejected}\".\n\
             When \"{status}\" is \"{rejected}\", \"{risk}\" must be a non-empty string.",
            status = STATUS_FIELD,
            approved = APPROVED_TOKENS[0],
            rejected = REJECTED_TOKENS[0],
            risk = RISK_TITLE_FIELDS[0],
            detail = DETAIL_FIELDS[0],
            fix = REMEDIATION_FIELDS[0],
        )
    }
}

impl Default for ResponseContract {
    fn default() -> Self {
        Self::verdict_v1()
    }
}
