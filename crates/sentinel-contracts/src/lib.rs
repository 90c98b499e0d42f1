//! # sentinel-contracts
//!
//! Shared types, schemas, and contracts for the Sentinel IaC gate.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions and error types.

pub mod error;
pub mod gate;
pub mod record;
pub mod resource;
pub mod schema;
pub mod verdict;
