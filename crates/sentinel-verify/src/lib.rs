//! # sentinel-verify
//!
//! Turns free-form backend text into a schema-valid [`Verdict`].
//!
//! Interpretation runs in two stages:
//!
//! 1. [`extract`] recovers exactly one JSON object from the text.
//! 2. [`normalize::VerdictNormalizer`] checks it against the response
//!    contract and maps it onto the closed verdict vocabulary.
//!
//! [`VerdictInterpreter`] combines both behind the `ResponseInterpreter`
//! seam from `sentinel-core`. It never fails: any reply it cannot map
//! becomes an `ERROR` verdict with kind `MALFORMED_RESPONSE`.

pub mod extract;
pub mod normalize;

use tracing::{debug, warn};

use sentinel_contracts::{
    error::SentinelResult,
    resource::{ResourceId, RawResponse},
    schema::ResponseContract,
    verdict::{ErrorKind, Verdict},
};
use sentinel_core::traits::ResponseInterpreter;

use crate::normalize::VerdictNormalizer;

/// How much of a malformed reply is logged.
const LOG_EXCERPT_CHARS: usize = 200;

/// The production response interpreter.
pub struct VerdictInterpreter {
    normalizer: VerdictNormalizer,
}

impl VerdictInterpreter {
    pub fn new(contract: &ResponseContract) -> SentinelResult<Self> {
        Ok(Self {
            normalizer: VerdictNormalizer::new(contract)?,
        })
    }
}

impl ResponseInterpreter for VerdictInterpreter {
    fn interpret(&self, resource_id: &ResourceId, response: &RawResponse) -> Verdict {
        match extract::extract(response.text()) {
            Ok(extracted) => {
                debug!(
                    resource_id = %resource_id,
                    path = ?extracted.path,
                    "reply object extracted"
                );
                self.normalizer.normalize(resource_id, extracted.object)
            }
            Err(err) => {
                warn!(
                    resource_id = %resource_id,
                    error = %err,
                    reply = %response.excerpt(LOG_EXCERPT_CHARS),
                    "could not extract a reply object"
                );
                Verdict::error(resource_id.clone(), ErrorKind::MalformedResponse, err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use sentinel_contracts::{
        error::SentinelResult,
        record::{RecordContext, VerdictRecord},
        resource::{AnalysisRequest, RawResponse, ResourceDescriptor, ResourceId, RunId},
        schema::ResponseContract,
        verdict::{ErrorKind, Outcome},
    };
    use sentinel_core::{
        loader::ScanItem,
        prompt::PromptBuilder,
        traits::{AuditSink, BackendError, ResponseInterpreter, VerdictBackend},
        CancelToken, ScanPolicy, Scanner,
    };

    use super::VerdictInterpreter;

    // ── Mocks ─────────────────────────────────────────────────────────────────

    /// Replies with the same canned result to every request.
    struct CannedBackend {
        reply: Result<String, BackendError>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl CannedBackend {
        fn new(reply: Result<&str, BackendError>) -> Self {
            Self {
                reply: reply.map(str::to_string),
                prompts: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl VerdictBackend for CannedBackend {
        fn complete(&self, request: &AnalysisRequest) -> Result<RawResponse, BackendError> {
            self.prompts.lock().unwrap().push(request.prompt().to_string());
            self.reply.clone().map(RawResponse::new)
        }
    }

    #[derive(Default)]
    struct CollectingAudit {
        records: Arc<Mutex<Vec<VerdictRecord>>>,
    }

    impl AuditSink for CollectingAudit {
        fn upsert(&self, record: &VerdictRecord) -> SentinelResult<()> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }

        fn finalize(&self, _run_id: &RunId) -> SentinelResult<()> {
            Ok(())
        }
    }

    fn interpreter() -> VerdictInterpreter {
        VerdictInterpreter::new(&ResponseContract::verdict_v1()).unwrap()
    }

    fn interpret(text: &str) -> sentinel_contracts::verdict::Verdict {
        interpreter().interpret(&ResourceId::new("r"), &RawResponse::new(text))
    }

    struct Outcomes {
        report: sentinel_core::ScanReport,
        records: Vec<VerdictRecord>,
        prompts: Vec<String>,
    }

    fn scan(reply: Result<&str, BackendError>) -> Outcomes {
        let backend = CannedBackend::new(reply);
        let prompts = Arc::clone(&backend.prompts);
        let audit = CollectingAudit::default();
        let records = Arc::clone(&audit.records);

        let scanner = Scanner::new(
            PromptBuilder::default(),
            Box::new(backend),
            Box::new(interpreter()),
            Box::new(audit),
            ScanPolicy {
                pacing: std::time::Duration::ZERO,
                ..ScanPolicy::default()
            },
        );
        let resource = ResourceDescriptor::new(
            json!({ "id": "sg-1", "rule": { "port": 22, "cidr": "0.0.0.0/0" } }),
            "sg.json",
            "sg.json",
        );
        let report = scanner.run(
            vec![ScanItem::Ready(resource)],
            &RecordContext::new("IAC", "cli"),
            &CancelToken::new(),
        );

        let records = records.lock().unwrap().clone();
        let prompts = prompts.lock().unwrap().clone();
        Outcomes {
            report,
            records,
            prompts,
        }
    }

    // ── Interpreter ───────────────────────────────────────────────────────────

    #[test]
    fn empty_reply_is_malformed() {
        let verdict = interpret("");
        assert_eq!(verdict.error_kind(), Some(ErrorKind::MalformedResponse));
        assert_eq!(verdict.detail(), Some("response is empty"));
        assert!(verdict.analysis().is_none());
    }

    #[test]
    fn prose_refusal_is_malformed() {
        let verdict = interpret("I'm sorry, I can't review this file.");
        assert_eq!(verdict.outcome(), Outcome::Error);
        assert_eq!(verdict.error_kind(), Some(ErrorKind::MalformedResponse));
    }

    #[test]
    fn parsed_reply_is_attached_as_analysis() {
        let verdict = interpret(r#"{"status":"APROVADO","detalhe":"least privilege respected"}"#);
        assert_eq!(verdict.outcome(), Outcome::Approved);
        assert_eq!(
            verdict.analysis(),
            Some(&json!({ "status": "APROVADO", "detalhe": "least privilege respected" }))
        );
    }

    // ── End-to-end ────────────────────────────────────────────────────────────

    #[test]
    fn fenced_rejection_blocks_the_gate() {
        let out = scan(Ok(
            "```json\n{\"status\":\"REPROVADO\",\"risco\":\"Open SSH\",\"detalhe\":\"Port 22 is reachable from anywhere\",\"correcao\":\"Restrict CIDR\"}\n```",
        ));

        let verdict = &out.report.verdicts[0];
        assert_eq!(verdict.outcome(), Outcome::Rejected);
        assert_eq!(verdict.risk_title(), Some("Open SSH"));
        assert_eq!(verdict.remediation(), Some("Restrict CIDR"));
        assert!(out.report.decision.block);
        assert_eq!(out.report.decision.exit_code(), 1);

        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].risk_title.as_deref(), Some("Open SSH"));
        assert!(out.records[0].analysis_json.contains("REPROVADO"));
        assert!(out.prompts[0].contains(r#""cidr":"0.0.0.0/0""#));
    }

    #[test]
    fn bare_approval_passes_the_gate() {
        let out = scan(Ok(r#"{"status":"APROVADO"}"#));

        assert_eq!(out.report.verdicts[0].outcome(), Outcome::Approved);
        assert!(!out.report.decision.block);
        assert_eq!(out.report.decision.exit_code(), 0);
    }

    #[test]
    fn server_error_is_a_transport_error() {
        let out = scan(Err(BackendError::Status {
            code: 500,
            body: "internal error".to_string(),
        }));

        let verdict = &out.report.verdicts[0];
        assert_eq!(verdict.outcome(), Outcome::Error);
        assert_eq!(verdict.error_kind(), Some(ErrorKind::TransportError));
        assert!(verdict.detail().unwrap().contains("500"));
        assert!(out.report.decision.block);
        assert_eq!(out.report.decision.exit_code(), 1);
    }

    #[test]
    fn chatty_approval_is_recovered() {
        let out = scan(Ok(
            r#"Sure! Here is the analysis: {"status":"APROVADO"} Hope this helps!"#,
        ));

        assert_eq!(out.report.verdicts[0].outcome(), Outcome::Approved);
        assert!(!out.report.decision.block);
    }

    #[test]
    fn rejection_without_risk_is_downgraded() {
        let out = scan(Ok(r#"{"status":"REPROVADO"}"#));

        let verdict = &out.report.verdicts[0];
        assert_eq!(verdict.outcome(), Outcome::Error);
        assert_eq!(verdict.error_kind(), Some(ErrorKind::MalformedResponse));
        assert!(verdict.risk_title().is_none());
        assert!(out.report.decision.block);
    }
}
