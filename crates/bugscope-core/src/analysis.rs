//! AI analysis results and their normalization.
//!
//! [`Analysis`] is what a provider returns. [`AnalysisRecord`] is what gets
//! written onto a bug: the diff sentinel is resolved, confidence is clamped,
//! and an empty analysis is refused so that an `analyzed` bug always carries
//! text.

use serde::{Deserialize, Serialize};

use crate::defaults::{CONFIDENCE_DEFAULT, CONFIDENCE_MAX, CONFIDENCE_MIN, NO_DIFF};
use crate::error::{Error, Result};

/// Smallest value read as a percentage rather than an over-range fraction.
const CONFIDENCE_PERCENT_MIN: f64 = 2.0;

/// Result of a provider `analyze` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// Markdown root-cause explanation.
    pub analysis: String,
    /// Unified diff, or the literal `NONE`.
    pub diff: String,
    pub confidence: f64,
    /// Name of the provider that produced this result.
    pub provider: String,
}

/// Analysis fields as persisted on a bug.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRecord {
    pub analysis: String,
    pub patch_diff: Option<String>,
    pub confidence: f64,
    pub provider: String,
}

impl AnalysisRecord {
    /// Normalize a provider result for persistence.
    pub fn from_analysis(analysis: Analysis) -> Result<Self> {
        if analysis.analysis.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "Provider '{}' returned an empty analysis",
                analysis.provider
            )));
        }

        let provider = if analysis.provider.trim().is_empty() {
            "unknown".to_string()
        } else {
            analysis.provider
        };

        Ok(Self {
            patch_diff: normalize_diff(&analysis.diff),
            confidence: normalize_confidence(Some(analysis.confidence)),
            analysis: analysis.analysis,
            provider,
        })
    }
}

/// Bring a provider confidence into `[CONFIDENCE_MIN, CONFIDENCE_MAX]`.
///
/// Missing or non-finite values become [`CONFIDENCE_DEFAULT`]. Values in
/// `[2, 100]` are read as percentages; anything else above 1 is capped.
pub fn normalize_confidence(raw: Option<f64>) -> f64 {
    let value = match raw {
        Some(v) if v.is_finite() => v,
        _ => CONFIDENCE_DEFAULT,
    };
    let value = if (CONFIDENCE_PERCENT_MIN..=100.0).contains(&value) {
        value / 100.0
    } else {
        value
    };
    value.clamp(CONFIDENCE_MIN, CONFIDENCE_MAX)
}

/// Resolve the `NONE` sentinel (any case) and blank diffs to `None`.
///
/// Any other diff is kept verbatim.
pub fn normalize_diff(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NO_DIFF) {
        None
    } else {
        Some(raw.to_string())
    }
}
