//! Mock analysis provider for deterministic testing.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bugscope_inference::mock::MockAnalysisProvider;
//!
//! let provider = MockAnalysisProvider::new()
//!     .with_analysis("The submit handler is never bound.")
//!     .with_confidence(0.9);
//! assert_eq!(provider.call_count(), 0);
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use bugscope_core::defaults::NO_DIFF;
use bugscope_core::{Analysis, AnalysisProvider, Bug, Error, Result};

/// Mock provider returning a canned analysis or a canned failure.
#[derive(Clone)]
pub struct MockAnalysisProvider {
    config: Arc<MockConfig>,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

#[derive(Debug, Clone)]
struct MockConfig {
    name: String,
    analysis: String,
    diff: String,
    confidence: f64,
    failure: Option<String>,
    latency: Duration,
}

/// A recorded `analyze` call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub bug_id: Uuid,
    pub context: Vec<String>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            analysis: "Mock analysis".to_string(),
            diff: NO_DIFF.to_string(),
            confidence: 0.9,
            failure: None,
            latency: Duration::ZERO,
        }
    }
}

impl MockAnalysisProvider {
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).name = name.into();
        self
    }

    pub fn with_analysis(mut self, analysis: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).analysis = analysis.into();
        self
    }

    pub fn with_diff(mut self, diff: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).diff = diff.into();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        Arc::make_mut(&mut self.config).confidence = confidence;
        self
    }

    /// Make every call fail with `Error::Inference(message)`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).failure = Some(message.into());
        self
    }

    /// Delay every call, for timeout tests.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        Arc::make_mut(&mut self.config).latency = latency;
        self
    }

    /// Get all recorded calls.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for MockAnalysisProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisProvider for MockAnalysisProvider {
    async fn analyze(&self, bug: &Bug, context: &[String]) -> Result<Analysis> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(MockCall {
                bug_id: bug.id,
                context: context.to_vec(),
            });

        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }

        if let Some(message) = &self.config.failure {
            return Err(Error::Inference(message.clone()));
        }

        Ok(Analysis {
            analysis: self.config.analysis.clone(),
            diff: self.config.diff.clone(),
            confidence: self.config.confidence,
            provider: self.config.name.clone(),
        })
    }

    fn name(&self) -> &str {
        &self.config.name
    }
}
