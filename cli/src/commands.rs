//! Subcommand handlers. Each returns the process exit code, or an error that
//! `main` reports as fatal.

use tracing::{info, warn};

use sentinel_audit::{FileAuditStore, InMemoryAuditSink, RecordFilter};
use sentinel_backend::{GeminiClient, GeminiConfig};
use sentinel_config::{ConfigLayer, ScanConfig};
use sentinel_contracts::{
    error::SentinelResult,
    gate::{EXIT_BLOCK, EXIT_PASS},
    record::{RecordContext, ViewState},
    schema::ResponseContract,
};
use sentinel_core::{
    loader, prompt::PromptBuilder, traits::AuditSink, CancelToken, ScanPolicy, Scanner,
};
use sentinel_verify::VerdictInterpreter;

use crate::{report, ArchiveArgs, Format, HistoryArgs, ScanArgs, StoreArgs};

// ── scan ──────────────────────────────────────────────────────────────────────

pub fn scan(args: &ScanArgs) -> SentinelResult<u8> {
    let config = ScanConfig::load(args.store.config.as_deref(), args.config_layer())?;
    info!(?config, "configuration resolved");

    let items = loader::load_paths(&args.paths);
    if items.is_empty() {
        println!("{}", report::NO_RESOURCES);
        return Ok(EXIT_PASS);
    }

    let backend = GeminiClient::new(GeminiConfig {
        endpoint: config.endpoint.clone(),
        model: config.model.clone(),
        api_key: config.api_key()?.to_string(),
        timeout: config.timeout,
    });

    let contract = ResponseContract::verdict_v1();
    let interpreter = VerdictInterpreter::new(&contract)?;
    let prompt = PromptBuilder::new(contract, config.max_resource_bytes);

    let audit: Box<dyn AuditSink> = if args.no_audit {
        Box::new(InMemoryAuditSink::new(config.audit_table.as_str()))
    } else {
        Box::new(FileAuditStore::open(&config.audit_dir, &config.audit_table)?)
    };

    let policy = ScanPolicy {
        workers: config.workers,
        pacing: config.pacing,
        max_retries: config.max_retries,
        fail_fast: args.fail_fast,
    };

    let scanner = Scanner::new(prompt, Box::new(backend), Box::new(interpreter), audit, policy);
    let ctx = RecordContext::new(config.category.as_str(), config.origin.as_str());
    let scan_report = scanner.run(items, &ctx, &CancelToken::new());

    match args.format {
        Format::Text => print!("{}", report::render_scan_text(&scan_report)),
        Format::Json => println!("{}", report::render_scan_json(&scan_report)?),
    }
    if scan_report.audit_failures > 0 {
        warn!(failures = scan_report.audit_failures, "some verdicts were not audited");
        eprintln!(
            "warning: {} audit write(s) failed; the gate decision is unaffected",
            scan_report.audit_failures
        );
    }

    Ok(scan_report.decision.exit_code())
}

// ── history / archive / reset ─────────────────────────────────────────────────

fn open_store(args: &StoreArgs) -> SentinelResult<FileAuditStore> {
    let config = ScanConfig::load(args.config.as_deref(), ConfigLayer::default())?;
    FileAuditStore::open(&config.audit_dir, &config.audit_table)
}

pub fn history(args: &HistoryArgs) -> SentinelResult<u8> {
    let store = open_store(&args.store)?;

    let view_state = match (args.active, args.archived) {
        (true, _) => Some(ViewState::Active),
        (_, true) => Some(ViewState::Archived),
        _ => None,
    };
    let records = store.query(&RecordFilter {
        category: args.category.clone(),
        view_state,
        limit: args.limit,
    })?;

    match args.format {
        Format::Text => print!("{}", report::render_history_text(&records)),
        Format::Json => println!("{}", report::render_history_json(&records)?),
    }

    if args.verify {
        let table = store.snapshot()?;
        if table.verify_integrity() {
            eprintln!("ledger verified: {} event(s)", table.ledger.len());
        } else {
            eprintln!("ledger verification FAILED for {}", store.path().display());
            return Ok(EXIT_BLOCK);
        }
    }
    Ok(EXIT_PASS)
}

pub fn archive(args: &ArchiveArgs) -> SentinelResult<u8> {
    let store = open_store(&args.store)?;
    let record = store.archive(&args.record_id)?;
    println!("archived {}", record.record_id);
    Ok(EXIT_PASS)
}

pub fn reset(args: &StoreArgs) -> SentinelResult<u8> {
    let store = open_store(args)?;
    if !store.path().exists() {
        println!("removed 0 record(s)");
        return Ok(EXIT_PASS);
    }
    let removed = store.clear()?;
    println!("removed {removed} record(s)");
    Ok(EXIT_PASS)
}

