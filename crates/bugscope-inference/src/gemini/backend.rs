//! Gemini analysis provider implementation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use bugscope_core::defaults::{GEMINI_BASE_URL, GEMINI_MODEL, GEMINI_TIMEOUT_SECS};
use bugscope_core::{Analysis, AnalysisProvider, Bug, Error, Result};

use super::error::{to_bugscope_error, GeminiErrorCode};
use super::types::*;
use crate::prompt::{build_prompt, system_instruction};
use crate::response::{degraded, parse_analysis};

/// Provider name recorded on analyzed bugs.
pub const GEMINI_PROVIDER_NAME: &str = "gemini";

/// Configuration for the Gemini backend.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Base URL up to and including the API version.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
    pub temperature: Option<f32>,
}

impl GeminiConfig {
    /// Config with default endpoint, model and timeout.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: GEMINI_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: GEMINI_MODEL.to_string(),
            timeout_seconds: GEMINI_TIMEOUT_SECS,
            temperature: Some(0.2),
        }
    }

    /// Create from environment variables.
    ///
    /// Returns `None` when `GEMINI_API_KEY` is unset or blank.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `GEMINI_API_KEY` | (required) |
    /// | `GEMINI_MODEL` | `gemini-1.5-flash` |
    /// | `GEMINI_BASE_URL` | `https://generativelanguage.googleapis.com/v1beta` |
    /// | `GEMINI_TIMEOUT_SECS` | `30` |
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())?;

        let mut config = Self::new(api_key.trim());
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            if !model.trim().is_empty() {
                config.model = model.trim().to_string();
            }
        }
        if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
            if !base_url.trim().is_empty() {
                config.base_url = base_url.trim().to_string();
            }
        }
        if let Some(secs) = std::env::var("GEMINI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            config.timeout_seconds = secs.max(1);
        }
        Some(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout_seconds(mut self, secs: u64) -> Self {
        self.timeout_seconds = secs;
        self
    }

    /// Full `generateContent` URL for the configured model.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// Gemini-backed [`AnalysisProvider`].
pub struct GeminiBackend {
    client: Client,
    config: GeminiConfig,
}

impl GeminiBackend {
    /// Create a new Gemini backend with the given configuration.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::Config("Gemini API key is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Inference(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "gemini",
            model = %config.model,
            timeout_secs = config.timeout_seconds,
            "Initializing Gemini backend"
        );

        Ok(Self { client, config })
    }

    /// Get the current configuration.
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn build_request(&self, bug: &Bug, context: &[String]) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content::user(build_prompt(bug, context))],
            system_instruction: Some(Content::system(system_instruction())),
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                temperature: self.config.temperature,
            },
        }
    }
}

#[async_trait]
impl AnalysisProvider for GeminiBackend {
    async fn analyze(&self, bug: &Bug, context: &[String]) -> Result<Analysis> {
        let start = Instant::now();
        debug!(
            subsystem = "inference",
            component = "gemini",
            op = "analyze",
            bug_id = %bug.id,
            model = %self.config.model,
            context_files = context.len(),
            "Requesting analysis"
        );

        let response = self
            .client
            .post(self.config.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&self.build_request(bug, context))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("Gemini request timed out: {}", e))
                } else {
                    Error::Inference(format!("Gemini request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body: GeminiErrorResponse =
                response.json().await.unwrap_or(GeminiErrorResponse {
                    error: GeminiError {
                        code: status.as_u16(),
                        message: status
                            .canonical_reason()
                            .unwrap_or("Unknown error")
                            .to_string(),
                        status: String::new(),
                    },
                });
            let code = GeminiErrorCode::from_response(status.as_u16(), &body.error.status);
            warn!(
                subsystem = "inference",
                component = "gemini",
                op = "analyze",
                bug_id = %bug.id,
                http_status = status.as_u16(),
                error_code = ?code,
                "Gemini returned an error"
            );
            return Err(to_bugscope_error(code, &body.error.message));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Inference(format!("Failed to read Gemini response: {}", e)))?;

        let analysis = match serde_json::from_str::<GenerateContentResponse>(&body) {
            Ok(parsed) => match parsed.first_text() {
                Some(text) => parse_analysis(&text, GEMINI_PROVIDER_NAME),
                None => {
                    warn!(
                        subsystem = "inference",
                        component = "gemini",
                        bug_id = %bug.id,
                        "Gemini returned no candidates"
                    );
                    degraded("", GEMINI_PROVIDER_NAME)
                }
            },
            Err(e) => {
                warn!(
                    subsystem = "inference",
                    component = "gemini",
                    bug_id = %bug.id,
                    error = %e,
                    "Unexpected Gemini response shape, using raw body"
                );
                degraded(&body, GEMINI_PROVIDER_NAME)
            }
        };

        debug!(
            subsystem = "inference",
            component = "gemini",
            op = "analyze",
            bug_id = %bug.id,
            duration_ms = start.elapsed().as_millis() as u64,
            analysis_len = analysis.analysis.len(),
            "Analysis received"
        );
        Ok(analysis)
    }

    fn name(&self) -> &str {
        GEMINI_PROVIDER_NAME
    }
}
