//! Completion client for the inference server's `/completion` endpoint
//!
//! One synchronous request per call, no retries. Failures are either
//! returned ([`CompletionClient::try_complete`]) or logged and turned into
//! `None` ([`CompletionClient::complete`]).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{GenerationParams, ServerConfig};
use crate::server::LOOPBACK_HOST;
use crate::LorewrightError;

/// Request body; generation parameters travel flat next to the prompt
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    #[serde(flatten)]
    params: &'a GenerationParams,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CompletionClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl CompletionClient {
    /// Client for a server at `base_url` with a total per-request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LorewrightError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(|e| LorewrightError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Client for the supervised server described by `server`
    pub fn for_server(server: &ServerConfig) -> Result<Self, LorewrightError> {
        Self::new(
            format!("http://{}:{}", LOOPBACK_HOST, server.port),
            server.timings.completion_timeout(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Generated text, or `None` after logging why there is none
    pub fn complete(&self, prompt: &str, params: &GenerationParams) -> Option<String> {
        match self.try_complete(prompt, params) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Completion failed: {}", e);
                None
            }
        }
    }

    /// Issue one completion request and return the trimmed generated text
    ///
    /// Blank content is a malformed response, never an empty success.
    pub fn try_complete(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, LorewrightError> {
        let url = format!("{}/completion", self.base_url);
        debug!(
            %url,
            chars = prompt.len(),
            max_tokens = params.max_tokens,
            temperature = params.temperature,
            "Sending completion request"
        );

        let resp = self
            .http
            .post(&url)
            .json(&CompletionRequest { prompt, params })
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    LorewrightError::Transport(format!("Request timed out: {}", e))
                } else {
                    LorewrightError::Transport(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(LorewrightError::Transport(format!(
                "Server returned {}: {}",
                status,
                body.trim()
            )));
        }

        let body = resp
            .text()
            .map_err(|e| LorewrightError::Transport(format!("Failed to read response: {}", e)))?;
        let parsed: CompletionResponse = serde_json::from_str(&body)
            .map_err(|e| LorewrightError::MalformedResponse(e.to_string()))?;
        let content = parsed.content.ok_or_else(|| {
            LorewrightError::MalformedResponse("response has no 'content' field".to_string())
        })?;

        let text = content.trim();
        if text.is_empty() {
            return Err(LorewrightError::MalformedResponse(
                "response content is empty".to_string(),
            ));
        }
        Ok(text.to_string())
    }
}
