//! Provider selection.

use async_trait::async_trait;
use tracing::info;

use bugscope_core::{Analysis, AnalysisProvider, Bug, Result};

use crate::fallback::FallbackAnalyzer;
use crate::gemini::{GeminiBackend, GeminiConfig};

/// The analysis provider chosen at startup.
pub enum AnalysisBackend {
    Gemini(GeminiBackend),
    Fallback(FallbackAnalyzer),
}

impl AnalysisBackend {
    /// Gemini when `GEMINI_API_KEY` is set, otherwise the offline fallback.
    pub fn from_env() -> Result<Self> {
        Self::select(GeminiConfig::from_env())
    }

    /// Choose a backend from an optional Gemini configuration.
    pub fn select(gemini: Option<GeminiConfig>) -> Result<Self> {
        let backend = match gemini {
            Some(config) => Self::Gemini(GeminiBackend::new(config)?),
            None => Self::Fallback(FallbackAnalyzer::new()),
        };
        info!(
            subsystem = "inference",
            component = "backend",
            provider = backend.name(),
            "Analysis provider selected"
        );
        Ok(backend)
    }
}

#[async_trait]
impl AnalysisProvider for AnalysisBackend {
    async fn analyze(&self, bug: &Bug, context: &[String]) -> Result<Analysis> {
        match self {
            Self::Gemini(backend) => backend.analyze(bug, context).await,
            Self::Fallback(backend) => backend.analyze(bug, context).await,
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Gemini(backend) => backend.name(),
            Self::Fallback(backend) => backend.name(),
        }
    }
}
