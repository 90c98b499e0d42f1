//! # sentinel-backend
//!
//! The reasoning backend for the Sentinel IaC gate: a blocking client for
//! Gemini's `generateContent` endpoint behind the `VerdictBackend` seam.
//!
//! The client sends the API key in the `x-goog-api-key` header, never in the
//! URL, so it cannot leak through request logs.

pub mod envelope;
pub mod gemini;

pub use gemini::{GeminiClient, GeminiConfig, DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_TIMEOUT};
