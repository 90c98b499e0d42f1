//! # sentinel-core
//!
//! The scan pipeline for the Sentinel IaC gate.
//!
//! This crate provides:
//! - The three pipeline seams (`VerdictBackend`, `ResponseInterpreter`, `AuditSink`)
//! - The resource loader and the prompt builder
//! - The `Scanner` that runs every resource through the seams in order
//! - The gate aggregator that turns the verdict set into a `GateDecision`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sentinel_core::{Scanner, ScanPolicy, CancelToken, loader, prompt::PromptBuilder};
//!
//! let scanner = Scanner::new(PromptBuilder::default(), backend, interpreter, audit, ScanPolicy::default());
//! let report = scanner.run(loader::load_paths(&paths), &ctx, &CancelToken::new());
//! std::process::exit(report.decision.exit_code().into());
//! ```

pub mod gate;
pub mod loader;
pub mod prompt;
pub mod scanner;
pub mod traits;

pub use scanner::{CancelToken, ScanPolicy, ScanReport, Scanner};
