//! # bugscope-inference
//!
//! AI analysis providers for bugscope.
//!
//! This crate provides:
//! - A Gemini backend talking to the Generative Language API
//! - A deterministic offline fallback analyzer
//! - [`AnalysisBackend`], which picks one of the two at startup
//! - Prompt rendering and tolerant parsing of model replies
//!
//! Every provider implements [`bugscope_core::AnalysisProvider`].

pub mod backend;
pub mod fallback;
pub mod gemini;
pub mod prompt;
pub mod response;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use backend::AnalysisBackend;
pub use fallback::{FallbackAnalyzer, FALLBACK_PROVIDER_NAME};
pub use gemini::{GeminiBackend, GeminiConfig, GEMINI_PROVIDER_NAME};
pub use response::{parse_analysis, EMPTY_ANALYSIS_PLACEHOLDER};

#[cfg(any(test, feature = "mock"))]
pub use mock::MockAnalysisProvider;
