//! Report rendering. Everything here returns strings; `commands` decides
//! where they are printed.

use serde_json::json;

use sentinel_contracts::{
    error::{SentinelError, SentinelResult},
    record::VerdictRecord,
    verdict::{Outcome, Verdict},
};
use sentinel_core::ScanReport;

pub const NO_RESOURCES: &str = "no infrastructure resources found";
const RULE: &str = "----------------------------------------";

fn verdict_lines(verdict: &Verdict, lines: &mut Vec<String>) {
    let id = verdict.resource_id();
    match verdict.outcome() {
        Outcome::Approved => lines.push(format!("[OK] {id}")),
        Outcome::Rejected => {
            lines.push(format!(
                "[FAIL] {id}: {}",
                verdict.risk_title().unwrap_or_default()
            ));
            if let Some(fix) = verdict.remediation() {
                lines.push(format!("    remediation: {fix}"));
            }
            if let Some(detail) = verdict.detail() {
                lines.push(format!("    detail: {detail}"));
            }
        }
        Outcome::Error => {
            let kind = verdict
                .error_kind()
                .map(|k| k.as_str())
                .unwrap_or("UNKNOWN");
            let reason = verdict.detail().unwrap_or("no reason recorded");
            lines.push(format!("[ERROR] {id}: {kind}: {reason}"));
        }
    }
}

/// Human-readable scan report: one block per resource in discovery order,
/// then the totals and the gate line.
pub fn render_scan_text(report: &ScanReport) -> String {
    let decision = &report.decision;
    let mut lines = Vec::new();
    for verdict in &report.verdicts {
        verdict_lines(verdict, &mut lines);
    }

    lines.push(RULE.to_string());
    lines.push(format!(
        "{} resource(s): {} approved, {} rejected, {} error(s)",
        decision.total, decision.approved_count, decision.rejected_count, decision.error_count
    ));
    if decision.block {
        lines.push(format!(
            "BLOCKED: {} resource(s) prevent deployment",
            decision.blocking_count()
        ));
    } else {
        lines.push(format!("PASSED: all {} resource(s) approved", decision.total));
    }

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

fn to_json(value: &serde_json::Value) -> SentinelResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| SentinelError::Unknown {
        reason: format!("could not render JSON report: {e}"),
    })
}

pub fn render_scan_json(report: &ScanReport) -> SentinelResult<String> {
    to_json(&json!({
        "run_id": report.run_id,
        "decision": report.decision,
        "verdicts": report.verdicts,
    }))
}

pub fn render_history_text(records: &[VerdictRecord]) -> String {
    if records.is_empty() {
        return "no audit records\n".to_string();
    }

    let mut text = String::new();
    for record in records {
        let summary = match record.outcome {
            Outcome::Approved => String::new(),
            Outcome::Rejected => record.risk_title.clone().unwrap_or_default(),
            Outcome::Error => record
                .error_kind
                .map(|k| k.as_str().to_string())
                .unwrap_or_default(),
        };
        let line = format!(
            "{}  {}  {}  {}  {}  {}",
            record.event_time.format("%Y-%m-%dT%H:%M:%SZ"),
            record.record_id,
            record.category,
            record.outcome,
            record.view_state.as_str(),
            summary,
        );
        text.push_str(line.trim_end());
        text.push('\n');
    }
    text
}

pub fn render_history_json(records: &[VerdictRecord]) -> SentinelResult<String> {
    to_json(&json!(records))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};

    use sentinel_contracts::{
        record::{RecordContext, VerdictRecord},
        resource::{ResourceId, RunId},
        verdict::{ErrorKind, Findings, Verdict},
    };
    use sentinel_core::{gate::aggregate, ScanReport};

    use super::{render_history_text, render_scan_json, render_scan_text};

    fn report(verdicts: Vec<Verdict>) -> ScanReport {
        ScanReport {
            run_id: RunId::new(),
            decision: aggregate(&verdicts),
            verdicts,
            audit_failures: 0,
        }
    }

    fn rejected(id: &str) -> Verdict {
        Verdict::rejected(
            ResourceId::new(id),
            Findings::new(
                Some("Open SSH".to_string()),
                Some("Port 22 open to 0.0.0.0/0".to_string()),
                Some("Restrict CIDR".to_string()),
            ),
        )
        .unwrap()
    }

    #[test]
    fn all_approved_passes() {
        let text = render_scan_text(&report(vec![
            Verdict::approved(ResourceId::new("a"), Findings::default()),
            Verdict::approved(ResourceId::new("b"), Findings::default()),
        ]));
        assert_eq!(
            text,
            "[OK] a\n\
             [OK] b\n\
             ----------------------------------------\n\
             2 resource(s): 2 approved, 0 rejected, 0 error(s)\n\
             PASSED: all 2 resource(s) approved\n"
        );
    }

    #[test]
    fn mixed_run_blocks_with_details() {
        let text = render_scan_text(&report(vec![
            rejected("sg-1"),
            Verdict::approved(ResourceId::new("s3"), Findings::default()),
            Verdict::error(ResourceId::new("bad.json"), ErrorKind::ReadError, "invalid JSON: EOF"),
        ]));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "[FAIL] sg-1: Open SSH");
        assert_eq!(lines[1], "    remediation: Restrict CIDR");
        assert_eq!(lines[2], "    detail: Port 22 open to 0.0.0.0/0");
        assert_eq!(lines[3], "[OK] s3");
        assert_eq!(lines[4], "[ERROR] bad.json: READ_ERROR: invalid JSON: EOF");
        assert_eq!(lines.last().copied(), Some("BLOCKED: 2 resource(s) prevent deployment"));
    }

    #[test]
    fn json_report_has_run_decision_and_verdicts() {
        let scan = report(vec![rejected("sg-1")]);
        let value: Value = serde_json::from_str(&render_scan_json(&scan).unwrap()).unwrap();

        assert_eq!(value["run_id"], json!(scan.run_id.to_string()));
        assert_eq!(value["decision"]["block"], true);
        assert_eq!(value["decision"]["rejected_count"], 1);
        assert_eq!(value["verdicts"][0]["outcome"], "REJECTED");
        assert_eq!(value["verdicts"][0]["risk_title"], "Open SSH");
    }

    #[test]
    fn history_lines() {
        assert_eq!(render_history_text(&[]), "no audit records\n");

        let ctx = RecordContext::new("IAC", "cli");
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap();
        let record = VerdictRecord::from_verdict(&rejected("sg-1"), &ctx, at);
        let text = render_history_text(&[record.clone()]);
        assert_eq!(
            text,
            format!(
                "2025-03-01T09:30:00Z  {}  IAC  REJECTED  ACTIVE  Open SSH\n",
                record.record_id
            )
        );
    }
}
