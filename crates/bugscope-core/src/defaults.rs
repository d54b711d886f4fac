//! Centralized default constants for bugscope.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates and binaries reference these constants instead of defining their
//! own magic numbers.

// =============================================================================
// JOB PROCESSING
// =============================================================================

/// Poll interval for the analysis worker (milliseconds).
pub const JOB_POLL_INTERVAL_MS: u64 = 5_000;

/// Deadline for a single AI provider call (seconds).
pub const ANALYSIS_TIMEOUT_SECS: u64 = 30;

/// Capacity of the worker event broadcast channel.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Default page size for list queries.
pub const LIST_LIMIT: i64 = 50;

// =============================================================================
// TELEMETRY
// =============================================================================

/// Maximum console log / network error entries kept per bug. Oldest are evicted.
pub const TELEMETRY_MAX_ENTRIES: usize = 20;

// =============================================================================
// CONTEXT DISCOVERY
// =============================================================================

/// Maximum number of candidate source paths handed to a provider.
pub const CONTEXT_MAX_FILES: usize = 30;

/// Maximum directory recursion depth when scanning a repository.
pub const CONTEXT_MAX_DEPTH: usize = 10;

// =============================================================================
// ANALYSIS
// =============================================================================

/// Lower bound for persisted confidence.
pub const CONFIDENCE_MIN: f64 = 0.1;

/// Upper bound for persisted confidence.
pub const CONFIDENCE_MAX: f64 = 1.0;

/// Confidence used when a provider omits or garbles the value.
pub const CONFIDENCE_DEFAULT: f64 = 0.5;

/// Confidence reported by the offline fallback analyzer.
pub const FALLBACK_CONFIDENCE: f64 = 0.3;

/// Target length of an analysis, in words.
pub const ANALYSIS_TARGET_WORDS: usize = 250;

/// Literal a provider returns when it has no patch to suggest.
pub const NO_DIFF: &str = "NONE";

// =============================================================================
// GEMINI
// =============================================================================

/// Default Gemini API base URL.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default Gemini model.
pub const GEMINI_MODEL: &str = "gemini-1.5-flash";

/// HTTP client timeout for Gemini requests (seconds).
pub const GEMINI_TIMEOUT_SECS: u64 = 30;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_bounds_are_ordered() {
        assert!(CONFIDENCE_MIN < CONFIDENCE_DEFAULT);
        assert!(CONFIDENCE_DEFAULT < CONFIDENCE_MAX);
        assert!((CONFIDENCE_MIN..=CONFIDENCE_MAX).contains(&FALLBACK_CONFIDENCE));
    }

    #[test]
    fn test_provider_deadline_matches_http_timeout() {
        assert_eq!(ANALYSIS_TIMEOUT_SECS, GEMINI_TIMEOUT_SECS);
    }
}
