//! Blocking client for the Gemini `generateContent` endpoint.
//!
//! One `complete` call is one POST. Retries, pacing and cancellation are the
//! scanner's job; this client only classifies what happened on the wire.

use std::fmt;
use std::time::Duration;

use tracing::{debug, warn};

use sentinel_contracts::resource::{excerpt, AnalysisRequest, RawResponse};
use sentinel_core::traits::{BackendError, VerdictBackend};

use crate::envelope::{GenerateRequest, GenerateResponse};

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Longest error-body excerpt carried in a `Status` error.
const BODY_EXCERPT_CHARS: usize = 200;

/// Connection settings, built once at startup and owned by the client.
#[derive(Clone)]
pub struct GeminiConfig {
    /// Base URL up to and including the API version segment.
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    /// Whole-request deadline.
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// `{endpoint}/models/{model}:generateContent`
    pub fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// The production `VerdictBackend`.
pub struct GeminiClient {
    config: GeminiConfig,
    agent: ureq::Agent,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Self { config, agent }
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }
}

impl VerdictBackend for GeminiClient {
    fn complete(&self, request: &AnalysisRequest) -> Result<RawResponse, BackendError> {
        let url = self.config.url();
        let body = serde_json::to_string(&GenerateRequest::single_turn(request.prompt()))
            .map_err(|e| BackendError::Transport {
                reason: format!("could not encode request: {e}"),
            })?;

        debug!(
            resource_id = %request.resource_id(),
            model = %self.config.model,
            prompt_bytes = request.prompt().len(),
            "calling generateContent"
        );

        let response = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .set("x-goog-api-key", &self.config.api_key)
            .send_string(&body);

        match response {
            Ok(resp) => {
                let text = resp.into_string().map_err(|e| BackendError::Transport {
                    reason: format!("could not read response body: {e}"),
                })?;
                parse_envelope(&text)
            }
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                let body = excerpt(body.trim(), BODY_EXCERPT_CHARS);
                warn!(resource_id = %request.resource_id(), code, %body, "backend returned an error status");
                Err(BackendError::Status { code, body })
            }
            Err(ureq::Error::Transport(transport)) => {
                warn!(resource_id = %request.resource_id(), error = %transport, "backend unreachable");
                Err(BackendError::Transport {
                    reason: transport.to_string(),
                })
            }
        }
    }
}

/// Pull the text payload out of a success envelope.
pub fn parse_envelope(text: &str) -> Result<RawResponse, BackendError> {
    let envelope: GenerateResponse =
        serde_json::from_str(text).map_err(|e| BackendError::Envelope {
            reason: format!("not a generateContent response: {e}"),
        })?;

    if let Some(payload) = envelope.first_text() {
        return Ok(RawResponse::new(payload));
    }

    let reason = match (envelope.candidates.first(), &envelope.prompt_feedback) {
        (None, Some(feedback)) => match &feedback.block_reason {
            Some(block) => format!("no candidates (prompt blocked: {block})"),
            None => "no candidates".to_string(),
        },
        (None, None) => "no candidates".to_string(),
        (Some(candidate), _) => match &candidate.finish_reason {
            Some(finish) => format!("first candidate has no text (finish reason {finish})"),
            None => "first candidate has no text".to_string(),
        },
    };
    Err(BackendError::Envelope { reason })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
