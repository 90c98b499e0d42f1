//! The Sentinel scanner: the run-level driver of the analysis pipeline.
//!
//! For every scan item the scanner enforces:
//!
//!   Item → Prompt → Backend (paced, explicit retry) → Interpret → Audit
//!
//! and then, only after every worker has joined, folds all verdicts into a
//! single `GateDecision`. Every item yields exactly one terminal verdict:
//! read failures, transport failures, malformed replies, and cancellation
//! all become `ERROR` verdicts instead of aborting the run.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        mpsc, Arc,
    },
    thread,
    time::{Duration, Instant},
};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use sentinel_contracts::{
    error::SentinelError,
    gate::GateDecision,
    record::{RecordContext, VerdictRecord},
    resource::{AnalysisRequest, RawResponse, RunId},
    verdict::{ErrorKind, Verdict},
};

use crate::{
    gate::aggregate,
    loader::ScanItem,
    prompt::PromptBuilder,
    traits::{AuditSink, BackendError, ResponseInterpreter, VerdictBackend},
};

/// Default delay between consecutive backend calls of one worker.
pub const DEFAULT_PACING: Duration = Duration::from_secs(2);

/// How a run is scheduled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPolicy {
    /// Number of concurrent workers. 1 reproduces strict discovery order.
    pub workers: usize,
    /// Minimum spacing between two backend calls issued by the same worker.
    pub pacing: Duration,
    /// Extra attempts for transport-class failures. Malformed replies are
    /// never retried.
    pub max_retries: u32,
    /// Cancel the rest of the run on the first non-approved verdict.
    pub fail_fast: bool,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            workers: 1,
            pacing: DEFAULT_PACING,
            max_retries: 0,
            fail_fast: false,
        }
    }
}

/// Cooperative cancellation flag shared between the caller and the workers.
///
/// Checked before each resource and again when a backend call returns.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub run_id: RunId,
    /// One verdict per scan item, in discovery order.
    pub verdicts: Vec<Verdict>,
    pub decision: GateDecision,
    /// Audit writes (including finalization) that failed. They never change
    /// a verdict or the decision.
    pub audit_failures: usize,
}

/// Per-worker spacing of backend calls.
struct Pacer {
    interval: Duration,
    last_call: Option<Instant>,
}

impl Pacer {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_call: None,
        }
    }

    fn wait(&mut self) {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                thread::sleep(self.interval - elapsed);
            }
        }
        self.last_call = Some(Instant::now());
    }
}

/// Drives one scan run over a set of items.
///
/// The scanner owns the trusted components (interpreter, audit sink) and the
/// untrusted backend, and is shared by reference across its worker threads.
pub struct Scanner {
    prompt: PromptBuilder,
    backend: Box<dyn VerdictBackend>,
    interpreter: Box<dyn ResponseInterpreter>,
    audit: Box<dyn AuditSink>,
    policy: ScanPolicy,
}

impl Scanner {
    pub fn new(
        prompt: PromptBuilder,
        backend: Box<dyn VerdictBackend>,
        interpreter: Box<dyn ResponseInterpreter>,
        audit: Box<dyn AuditSink>,
        policy: ScanPolicy,
    ) -> Self {
        Self {
            prompt,
            backend,
            interpreter,
            audit,
            policy,
        }
    }

    /// Analyze every item and compute the gate decision.
    ///
    /// Workers pull items from a shared cursor in discovery order. Verdicts
    /// flow back over a channel and are placed by index, so the report keeps
    /// discovery order whatever the completion order was.
    pub fn run(&self, items: Vec<ScanItem>, ctx: &RecordContext, cancel: &CancelToken) -> ScanReport {
        let workers = self.policy.workers.clamp(1, items.len().max(1));
        info!(
            run_id = %ctx.run_id,
            resources = items.len(),
            workers,
            "scan starting"
        );

        let cursor = AtomicUsize::new(0);
        let audit_failures = AtomicUsize::new(0);
        let mut slots: Vec<Option<Verdict>> = vec![None; items.len()];
        let (tx, rx) = mpsc::channel::<(usize, Verdict)>();

        thread::scope(|scope| {
            for worker in 0..workers {
                let tx = tx.clone();
                let items = &items;
                let cursor = &cursor;
                let audit_failures = &audit_failures;
                scope.spawn(move || {
                    let mut pacer = Pacer::new(self.policy.pacing);
                    loop {
                        let index = cursor.fetch_add(1, Ordering::SeqCst);
                        let Some(item) = items.get(index) else { break };

                        let verdict = self.analyze(item, &mut pacer, cancel);
                        debug!(
                            worker,
                            resource_id = %verdict.resource_id(),
                            outcome = %verdict.outcome(),
                            "resource analyzed"
                        );

                        if self.policy.fail_fast && !verdict.is_approved() && !cancel.is_cancelled() {
                            warn!(
                                resource_id = %verdict.resource_id(),
                                "fail-fast: cancelling remaining resources"
                            );
                            cancel.cancel();
                        }

                        if !self.record(&verdict, ctx) {
                            audit_failures.fetch_add(1, Ordering::SeqCst);
                        }

                        if tx.send((index, verdict)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            for (index, verdict) in rx {
                slots[index] = Some(verdict);
            }
        });

        // Every worker has joined; each slot was filled by exactly one of them.
        let verdicts: Vec<Verdict> = slots
            .into_iter()
            .zip(items.iter())
            .map(|(slot, item)| {
                slot.unwrap_or_else(|| {
                    Verdict::error(item.id().clone(), ErrorKind::Unknown, "resource was never analyzed")
                })
            })
            .collect();

        if let Err(e) = self.audit.finalize(&ctx.run_id) {
            error!(run_id = %ctx.run_id, error = %e, "audit finalization failed");
            audit_failures.fetch_add(1, Ordering::SeqCst);
        }

        let decision = aggregate(&verdicts);
        info!(
            run_id = %ctx.run_id,
            total = decision.total,
            approved = decision.approved_count,
            rejected = decision.rejected_count,
            errors = decision.error_count,
            block = decision.block,
            "scan complete"
        );

        ScanReport {
            run_id: ctx.run_id.clone(),
            verdicts,
            decision,
            audit_failures: audit_failures.into_inner(),
        }
    }

    /// Produce the terminal verdict for one item.
    fn analyze(&self, item: &ScanItem, pacer: &mut Pacer, cancel: &CancelToken) -> Verdict {
        let descriptor = match item {
            ScanItem::Unreadable { id, reason, .. } => {
                return Verdict::error(id.clone(), ErrorKind::ReadError, reason.clone());
            }
            ScanItem::Ready(descriptor) => descriptor,
        };
        let resource_id = descriptor.id().clone();

        if cancel.is_cancelled() {
            return Verdict::error(resource_id, ErrorKind::Unknown, "run cancelled before analysis");
        }

        let request = match self.prompt.build(descriptor) {
            Ok(request) => request,
            Err(e) => {
                warn!(resource_id = %resource_id, error = %e, "prompt could not be built");
                return Verdict::from_error(resource_id, &e);
            }
        };

        let response = match self.call_backend(&request, pacer, cancel) {
            Ok(response) => response,
            Err(verdict) => return verdict,
        };

        if cancel.is_cancelled() {
            return Verdict::error(
                resource_id,
                ErrorKind::TransportError,
                "run cancelled while the backend call was in flight",
            );
        }

        debug!(
            resource_id = %resource_id,
            excerpt = %response.excerpt(200),
            "backend replied"
        );
        self.interpreter.interpret(&resource_id, &response)
    }

    /// One backend call plus the explicit transport-only retry budget.
    ///
    /// On final failure the returned verdict says how many attempts were made.
    fn call_backend(
        &self,
        request: &AnalysisRequest,
        pacer: &mut Pacer,
        cancel: &CancelToken,
    ) -> Result<RawResponse, Verdict> {
        let resource_id = request.resource_id();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            pacer.wait();

            let err: BackendError = match self.backend.complete(request) {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            let may_retry =
                err.is_retryable() && attempt <= self.policy.max_retries && !cancel.is_cancelled();
            warn!(
                resource_id = %resource_id,
                attempt,
                error = %err,
                will_retry = may_retry,
                "backend call failed"
            );
            if may_retry {
                continue;
            }

            let err = SentinelError::from(err);
            let verdict = Verdict::from_error(resource_id.clone(), &err);
            return Err(if attempt > 1 {
                let detail = format!("{} (after {attempt} attempts)", err.reason());
                verdict.with_detail(detail)
            } else {
                verdict
            });
        }
    }

    /// Upsert the audit record for `verdict`. Returns false on failure.
    fn record(&self, verdict: &Verdict, ctx: &RecordContext) -> bool {
        let record = VerdictRecord::from_verdict(verdict, ctx, Utc::now());
        match self.audit.upsert(&record) {
            Ok(()) => true,
            Err(e) => {
                error!(
                    record_id = %record.record_id,
                    error = %e,
                    "audit write failed; verdict stands"
                );
                false
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use serde_json::json;

    use sentinel_contracts::{
        error::{SentinelError, SentinelResult},
        record::{RecordContext, VerdictRecord},
        resource::{AnalysisRequest, RawResponse, ResourceDescriptor, ResourceId, RunId},
        schema::ResponseContract,
        verdict::{ErrorKind, Findings, Outcome, Verdict},
    };

    use crate::{
        loader::ScanItem,
        prompt::PromptBuilder,
        traits::{AuditSink, BackendError, ResponseInterpreter, VerdictBackend},
    };

    use super::{CancelToken, ScanPolicy, Scanner};

    // ── Mock helpers ─────────────────────────────────────────────────────────

    type Script = Box<dyn Fn(&AnalysisRequest, usize) -> Result<RawResponse, BackendError> + Send + Sync>;

    /// A backend that answers from a script and counts calls per resource.
    struct ScriptedBackend {
        calls: Arc<Mutex<HashMap<String, usize>>>,
        script: Script,
    }

    impl ScriptedBackend {
        fn new(script: Script) -> Self {
            Self {
                calls: Arc::new(Mutex::new(HashMap::new())),
                script,
            }
        }

        fn replying(text: &'static str) -> Self {
            Self::new(Box::new(move |_, _| Ok(RawResponse::new(text))))
        }
    }

    impl VerdictBackend for ScriptedBackend {
        fn complete(&self, request: &AnalysisRequest) -> Result<RawResponse, BackendError> {
            let attempt = {
                let mut calls = self.calls.lock().unwrap();
                let n = calls.entry(request.resource_id().to_string()).or_insert(0);
                *n += 1;
                *n
            };
            (self.script)(request, attempt)
        }
    }

    fn total_calls(calls: &Arc<Mutex<HashMap<String, usize>>>) -> usize {
        calls.lock().unwrap().values().sum()
    }

    /// Interprets "APPROVED" and "REJECTED:<title>"; everything else is malformed.
    struct KeywordInterpreter;

    impl ResponseInterpreter for KeywordInterpreter {
        fn interpret(&self, resource_id: &ResourceId, response: &RawResponse) -> Verdict {
            let text = response.text();
            if text == "APPROVED" {
                Verdict::approved(resource_id.clone(), Findings::default())
            } else if let Some(title) = text.strip_prefix("REJECTED:") {
                Verdict::rejected(
                    resource_id.clone(),
                    Findings::new(Some(title.to_string()), None, None),
                )
                .unwrap_or_else(|e| Verdict::from_error(resource_id.clone(), &e))
            } else {
                Verdict::error(resource_id.clone(), ErrorKind::MalformedResponse, "unrecognized")
            }
        }
    }

    /// An audit sink that records every call, optionally failing all of them.
    struct RecordingAudit {
        records: Arc<Mutex<Vec<VerdictRecord>>>,
        finalized: Arc<Mutex<Vec<RunId>>>,
        fail: bool,
    }

    impl RecordingAudit {
        fn new() -> Self {
            Self {
                records: Arc::new(Mutex::new(vec![])),
                finalized: Arc::new(Mutex::new(vec![])),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self { fail: true, ..Self::new() }
        }
    }

    impl AuditSink for RecordingAudit {
        fn upsert(&self, record: &VerdictRecord) -> SentinelResult<()> {
            if self.fail {
                return Err(SentinelError::AuditWriteFailed { reason: "table unavailable".into() });
            }
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }

        fn finalize(&self, run_id: &RunId) -> SentinelResult<()> {
            if self.fail {
                return Err(SentinelError::AuditWriteFailed { reason: "table unavailable".into() });
            }
            self.finalized.lock().unwrap().push(run_id.clone());
            Ok(())
        }
    }

    fn ready(id: &str) -> ScanItem {
        ScanItem::Ready(ResourceDescriptor::new(json!({ "id": id }), "test.json", id))
    }

    fn policy() -> ScanPolicy {
        ScanPolicy {
            workers: 1,
            pacing: Duration::ZERO,
            max_retries: 0,
            fail_fast: false,
        }
    }

    fn scanner(backend: ScriptedBackend, audit: RecordingAudit, policy: ScanPolicy) -> Scanner {
        Scanner::new(
            PromptBuilder::default(),
            Box::new(backend),
            Box::new(KeywordInterpreter),
            Box::new(audit),
            policy,
        )
    }

    fn ctx() -> RecordContext {
        RecordContext::new("IAC", "test")
    }

    // ── Test cases ────────────────────────────────────────────────────────────

    #[test]
    fn empty_run_passes() {
        let report = scanner(ScriptedBackend::replying("APPROVED"), RecordingAudit::new(), policy())
            .run(vec![], &ctx(), &CancelToken::new());
        assert!(report.verdicts.is_empty());
        assert!(!report.decision.block);
    }

    /// Unreadable items become READ_ERROR without any backend call.
    #[test]
    fn unreadable_item_never_reaches_backend() {
        let backend = ScriptedBackend::replying("APPROVED");
        let calls = backend.calls.clone();

        let item = ScanItem::Unreadable {
            id: ResourceId::new("broken.json"),
            origin: "broken.json".into(),
            reason: "invalid JSON: EOF".into(),
        };
        let report = scanner(backend, RecordingAudit::new(), policy())
            .run(vec![item], &ctx(), &CancelToken::new());

        assert_eq!(total_calls(&calls), 0);
        assert_eq!(report.verdicts[0].error_kind(), Some(ErrorKind::ReadError));
        assert_eq!(report.verdicts[0].detail(), Some("invalid JSON: EOF"));
        assert!(report.decision.block);
    }

    #[test]
    fn oversized_resource_is_read_error_without_backend_call() {
        let backend = ScriptedBackend::replying("APPROVED");
        let calls = backend.calls.clone();
        let scanner = Scanner::new(
            PromptBuilder::new(ResponseContract::verdict_v1(), 4),
            Box::new(backend),
            Box::new(KeywordInterpreter),
            Box::new(RecordingAudit::new()),
            policy(),
        );

        let report = scanner.run(vec![ready("big")], &ctx(), &CancelToken::new());

        assert_eq!(total_calls(&calls), 0);
        assert_eq!(report.verdicts[0].error_kind(), Some(ErrorKind::ReadError));
    }

    /// Every verdict is audited exactly once under a distinct key, and the
    /// run is finalized once.
    #[test]
    fn approved_run_passes_and_audits_every_verdict() {
        let audit = RecordingAudit::new();
        let records = audit.records.clone();
        let finalized = audit.finalized.clone();
        let context = ctx();

        let report = scanner(ScriptedBackend::replying("APPROVED"), audit, policy()).run(
            vec![ready("a"), ready("b"), ready("c")],
            &context,
            &CancelToken::new(),
        );

        assert!(!report.decision.block);
        assert_eq!(report.decision.approved_count, 3);
        assert_eq!(report.audit_failures, 0);

        let records = records.lock().unwrap();
        assert_eq!(records.len(), 3);
        let keys: std::collections::HashSet<&str> =
            records.iter().map(|r| r.record_id.as_str()).collect();
        assert_eq!(keys.len(), 3);
        assert!(records.iter().all(|r| r.record_id.starts_with(&context.run_id.to_string())));
        assert_eq!(finalized.lock().unwrap().as_slice(), &[context.run_id.clone()]);
    }

    #[test]
    fn non_success_status_becomes_transport_error() {
        let backend = ScriptedBackend::new(Box::new(|_, _| {
            Err(BackendError::Status { code: 500, body: "internal error".into() })
        }));

        let report = scanner(backend, RecordingAudit::new(), policy())
            .run(vec![ready("a")], &ctx(), &CancelToken::new());

        let verdict = &report.verdicts[0];
        assert_eq!(verdict.outcome(), Outcome::Error);
        assert_eq!(verdict.error_kind(), Some(ErrorKind::TransportError));
        assert!(verdict.detail().unwrap().contains("HTTP 500"));
        assert!(report.decision.block);
    }

    #[test]
    fn transport_failures_are_retried_within_budget() {
        let backend = ScriptedBackend::new(Box::new(|_, attempt| {
            if attempt < 3 {
                Err(BackendError::Transport { reason: "connection reset".into() })
            } else {
                Ok(RawResponse::new("APPROVED"))
            }
        }));
        let calls = backend.calls.clone();

        let report = scanner(backend, RecordingAudit::new(), ScanPolicy { max_retries: 2, ..policy() })
            .run(vec![ready("a")], &ctx(), &CancelToken::new());

        assert_eq!(total_calls(&calls), 3);
        assert!(report.verdicts[0].is_approved());
    }

    #[test]
    fn exhausted_retries_report_attempt_count() {
        let backend = ScriptedBackend::new(Box::new(|_, _| {
            Err(BackendError::Status { code: 503, body: "overloaded".into() })
        }));
        let calls = backend.calls.clone();

        let report = scanner(backend, RecordingAudit::new(), ScanPolicy { max_retries: 1, ..policy() })
            .run(vec![ready("a")], &ctx(), &CancelToken::new());

        assert_eq!(total_calls(&calls), 2);
        let verdict = &report.verdicts[0];
        assert_eq!(verdict.error_kind(), Some(ErrorKind::TransportError));
        assert!(
            verdict.detail().unwrap().contains("after 2 attempts"),
            "detail should count attempts: {:?}",
            verdict.detail()
        );
    }

    /// A received-but-unusable reply is a content problem: never retried.
    #[test]
    fn envelope_errors_are_not_retried() {
        let backend = ScriptedBackend::new(Box::new(|_, _| {
            Err(BackendError::Envelope { reason: "no candidates".into() })
        }));
        let calls = backend.calls.clone();

        let report = scanner(backend, RecordingAudit::new(), ScanPolicy { max_retries: 3, ..policy() })
            .run(vec![ready("a")], &ctx(), &CancelToken::new());

        assert_eq!(total_calls(&calls), 1);
        assert_eq!(report.verdicts[0].error_kind(), Some(ErrorKind::MalformedResponse));
    }

    #[test]
    fn fail_fast_cancels_remaining_resources() {
        let backend = ScriptedBackend::new(Box::new(|request, _| {
            if request.resource_id().as_str() == "a" {
                Ok(RawResponse::new("REJECTED:Open SSH"))
            } else {
                Ok(RawResponse::new("APPROVED"))
            }
        }));
        let calls = backend.calls.clone();
        let cancel = CancelToken::new();

        let report = scanner(backend, RecordingAudit::new(), ScanPolicy { fail_fast: true, ..policy() })
            .run(vec![ready("a"), ready("b"), ready("c")], &ctx(), &cancel);

        assert_eq!(total_calls(&calls), 1);
        assert!(cancel.is_cancelled());
        assert_eq!(report.verdicts[0].outcome(), Outcome::Rejected);
        for verdict in &report.verdicts[1..] {
            assert_eq!(verdict.error_kind(), Some(ErrorKind::Unknown));
            assert_eq!(verdict.detail(), Some("run cancelled before analysis"));
        }
        assert_eq!(report.decision.total, 3);
        assert!(report.decision.block);
    }

    /// A pre-cancelled run never emits success: every pending resource errors.
    #[test]
    fn cancelled_run_blocks() {
        let backend = ScriptedBackend::replying("APPROVED");
        let calls = backend.calls.clone();
        let cancel = CancelToken::new();
        cancel.cancel();

        let report = scanner(backend, RecordingAudit::new(), policy())
            .run(vec![ready("a"), ready("b")], &ctx(), &cancel);

        assert_eq!(total_calls(&calls), 0);
        assert_eq!(report.decision.error_count, 2);
        assert!(report.decision.block);
    }

    #[test]
    fn cancellation_in_flight_is_transport_error() {
        let cancel = CancelToken::new();
        let remote = cancel.clone();
        let backend = ScriptedBackend::new(Box::new(move |_, _| {
            remote.cancel();
            Ok(RawResponse::new("APPROVED"))
        }));

        let report = scanner(backend, RecordingAudit::new(), policy())
            .run(vec![ready("a")], &ctx(), &cancel);

        assert_eq!(report.verdicts[0].error_kind(), Some(ErrorKind::TransportError));
        assert!(report.verdicts[0].detail().unwrap().contains("in flight"));
    }

    #[test]
    fn concurrent_workers_keep_discovery_order() {
        let backend = ScriptedBackend::replying("APPROVED");
        let calls = backend.calls.clone();
        let ids: Vec<String> = (0..16).map(|i| format!("r-{i:02}")).collect();
        let items = ids.iter().map(|id| ready(id)).collect();

        let report = scanner(backend, RecordingAudit::new(), ScanPolicy { workers: 4, ..policy() })
            .run(items, &ctx(), &CancelToken::new());

        let got: Vec<&str> = report.verdicts.iter().map(|v| v.resource_id().as_str()).collect();
        assert_eq!(got, ids.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(total_calls(&calls), 16);
        assert_eq!(report.decision.approved_count, 16);
    }

    #[test]
    fn audit_failures_do_not_change_verdicts() {
        let report = scanner(ScriptedBackend::replying("APPROVED"), RecordingAudit::failing(), policy())
            .run(vec![ready("a"), ready("b")], &ctx(), &CancelToken::new());

        // Two upserts plus finalization.
        assert_eq!(report.audit_failures, 3);
        assert!(report.verdicts.iter().all(Verdict::is_approved));
        assert!(!report.decision.block);
    }

    #[test]
    fn pacing_spaces_calls_of_one_worker() {
        let backend = ScriptedBackend::replying("APPROVED");
        let started = std::time::Instant::now();

        scanner(
            backend,
            RecordingAudit::new(),
            ScanPolicy { pacing: Duration::from_millis(40), ..policy() },
        )
        .run(vec![ready("a"), ready("b"), ready("c")], &ctx(), &CancelToken::new());

        // Three calls, two gaps.
        assert!(started.elapsed() >= Duration::from_millis(80));
    }
}
