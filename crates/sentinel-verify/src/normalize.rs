//! Verdict normalizer: one extracted JSON object → one [`Verdict`].
//!
//! Runs in two phases, mirroring how every reply is checked:
//!
//! 1. **Structural**: the object is validated against the response
//!    contract's JSON Schema. A field of the wrong JSON type fails here.
//! 2. **Semantic**: the status token is mapped through the fixed token table
//!    and the text fields are read through their aliases.
//!
//! Every path yields a verdict. Anything the normalizer cannot map becomes an
//! `ERROR` verdict with kind `MALFORMED_RESPONSE` so it blocks the gate.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use sentinel_contracts::{
    error::{SentinelError, SentinelResult},
    resource::{excerpt, ResourceId},
    schema::{
        ResponseContract, APPROVED_TOKENS, DETAIL_FIELDS, ERROR_TOKENS, OUTCOME_FIELD,
        REJECTED_TOKENS, REMEDIATION_FIELDS, RISK_TITLE_FIELDS, STATUS_FIELD,
    },
    verdict::{ErrorKind, Findings, Verdict},
};

/// How much of an unrecognized token is echoed back in the reason.
const TOKEN_EXCERPT_CHARS: usize = 40;

/// Schema messages embed the offending value; cap each one.
const VIOLATION_EXCERPT_CHARS: usize = 120;

/// Violations listed in full before the rest are only counted.
const MAX_LISTED_VIOLATIONS: usize = 3;

/// Maps a parsed reply object onto the closed verdict vocabulary.
pub struct VerdictNormalizer {
    contract_id: String,
    validator: jsonschema::Validator,
}

impl VerdictNormalizer {
    /// Compile the contract's schema once for the lifetime of the run.
    ///
    /// Fails with `ConfigError` when the schema document itself is invalid.
    pub fn new(contract: &ResponseContract) -> SentinelResult<Self> {
        let validator = jsonschema::validator_for(&contract.json_schema).map_err(|e| {
            SentinelError::ConfigError {
                reason: format!("invalid schema for contract '{}': {e}", contract.contract_id),
            }
        })?;
        Ok(Self {
            contract_id: contract.contract_id.clone(),
            validator,
        })
    }

    pub fn contract_id(&self) -> &str {
        &self.contract_id
    }

    /// Produce the verdict for `resource_id` from `object`.
    ///
    /// The object is attached to the verdict as its analysis on every path,
    /// including failures, so the audit copy shows what the backend said.
    pub fn normalize(&self, resource_id: &ResourceId, object: Map<String, Value>) -> Verdict {
        let analysis = Value::Object(object);
        self.classify(resource_id, &analysis)
            .with_analysis(analysis)
    }

    fn classify(&self, resource_id: &ResourceId, analysis: &Value) -> Verdict {
        // ── Phase 1: JSON Schema structural validation ────────────────────────
        let violations: Vec<String> = self
            .validator
            .iter_errors(analysis)
            .map(|error| {
                format!(
                    "at '{}': {}",
                    error.instance_path,
                    excerpt(&error.to_string(), VIOLATION_EXCERPT_CHARS)
                )
            })
            .collect();
        if !violations.is_empty() {
            let mut listed = violations
                .iter()
                .take(MAX_LISTED_VIOLATIONS)
                .cloned()
                .collect::<Vec<_>>()
                .join("; ");
            if violations.len() > MAX_LISTED_VIOLATIONS {
                listed.push_str(&format!(
                    "; and {} more",
                    violations.len() - MAX_LISTED_VIOLATIONS
                ));
            }
            let reason = format!("reply violates {}: {listed}", self.contract_id);
            warn!(resource_id = %resource_id, %reason, "structural validation failure");
            return Verdict::error(resource_id.clone(), ErrorKind::MalformedResponse, reason);
        }

        // ── Phase 2: token table and field aliases ────────────────────────────
        let Some(token) = status_token(analysis) else {
            warn!(resource_id = %resource_id, "reply has no status field");
            return Verdict::error(
                resource_id.clone(),
                ErrorKind::MalformedResponse,
                format!("reply has no '{STATUS_FIELD}' field"),
            );
        };

        let findings = Findings::new(
            first_text(analysis, &RISK_TITLE_FIELDS),
            first_text(analysis, &DETAIL_FIELDS),
            first_text(analysis, &REMEDIATION_FIELDS),
        );

        if APPROVED_TOKENS.contains(&token) {
            debug!(resource_id = %resource_id, token, "approved");
            return Verdict::approved(resource_id.clone(), findings);
        }

        if REJECTED_TOKENS.contains(&token) {
            debug!(resource_id = %resource_id, token, "rejected");
            // A rejection without a title cannot be reported; downgrade it.
            return Verdict::rejected(resource_id.clone(), findings).unwrap_or_else(|err| {
                warn!(resource_id = %resource_id, error = %err, "rejection downgraded");
                Verdict::from_error(resource_id.clone(), &err)
            });
        }

        if ERROR_TOKENS.contains(&token) {
            let reason = findings
                .detail
                .unwrap_or_else(|| "backend reported it could not analyze the resource".to_string());
            warn!(resource_id = %resource_id, %reason, "backend declared an error");
            return Verdict::error(resource_id.clone(), ErrorKind::Unknown, reason);
        }

        let reason = format!(
            "unrecognized status token \"{}\"",
            excerpt(token, TOKEN_EXCERPT_CHARS)
        );
        warn!(resource_id = %resource_id, %reason, "unmappable status");
        Verdict::error(resource_id.clone(), ErrorKind::MalformedResponse, reason)
    }
}

/// The status token, read from `status` first and `outcome` second.
fn status_token(analysis: &Value) -> Option<&str> {
    [STATUS_FIELD, OUTCOME_FIELD]
        .iter()
        .find_map(|key| analysis.get(*key).and_then(Value::as_str))
}

/// The first alias holding a string. `null` counts as absent.
fn first_text(analysis: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| analysis.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
