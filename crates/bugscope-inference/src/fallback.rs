//! Deterministic, offline analysis used when no AI credentials are set.
//!
//! The report is built from the signals captured with the bug: console
//! errors, failed requests, severity and the best context paths. The same
//! bug and context always yield the same text.

use std::fmt::Write;

use async_trait::async_trait;

use bugscope_core::defaults::{FALLBACK_CONFIDENCE, NO_DIFF};
use bugscope_core::{Analysis, AnalysisProvider, Bug, ConsoleLevel, Result, Severity};

/// Provider name recorded on analyzed bugs.
pub const FALLBACK_PROVIDER_NAME: &str = "fallback";

const MAX_LISTED_ERRORS: usize = 3;
const MAX_LISTED_FILES: usize = 5;

/// Heuristic analyzer with no external calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackAnalyzer;

impl FallbackAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Build the markdown analysis for `bug`.
    pub fn render(&self, bug: &Bug, context: &[String]) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "## Automated triage\n");
        let _ = writeln!(
            out,
            "No AI provider is configured, so this summary is built from the captured \
             telemetry only."
        );

        let console_errors: Vec<&str> = bug
            .console_logs
            .iter()
            .filter(|e| e.level == ConsoleLevel::Error)
            .map(|e| e.message.as_str())
            .collect();

        let server_failures = bug
            .network_errors
            .iter()
            .filter(|e| e.status.is_some_and(|s| s >= 500))
            .count();
        let client_failures = bug
            .network_errors
            .iter()
            .filter(|e| e.status.is_some_and(|s| (400..500).contains(&s)))
            .count();
        let unanswered = bug
            .network_errors
            .iter()
            .filter(|e| e.status.is_none())
            .count();

        let _ = writeln!(out, "\n### Likely cause\n");
        if server_failures > 0 {
            let _ = writeln!(
                out,
                "- {} request(s) failed with a server error; the backend is the first place to look.",
                server_failures
            );
        }
        if client_failures > 0 {
            let _ = writeln!(
                out,
                "- {} request(s) were rejected by the server (4xx); check the payload or session the page sends.",
                client_failures
            );
        }
        if unanswered > 0 {
            let _ = writeln!(
                out,
                "- {} request(s) never received a response (network, CORS or a blocked URL).",
                unanswered
            );
        }
        if !console_errors.is_empty() {
            let _ = writeln!(
                out,
                "- The page logged {} console error(s), most recently:",
                console_errors.len()
            );
            for message in console_errors.iter().rev().take(MAX_LISTED_ERRORS) {
                let _ = writeln!(out, "  - `{}`", first_line(message));
            }
        }
        if server_failures + client_failures + unanswered == 0 && console_errors.is_empty() {
            let _ = writeln!(
                out,
                "- No console errors or failed requests were captured; the defect is likely in \
                 client-side logic between \"{}\" and \"{}\".",
                first_line(&bug.expected),
                first_line(&bug.actual)
            );
        }

        if !context.is_empty() {
            let _ = writeln!(out, "\n### Where to look\n");
            for path in context.iter().take(MAX_LISTED_FILES) {
                let _ = writeln!(out, "- `{}`", path);
            }
        }

        let _ = writeln!(out, "\n### Priority\n");
        let _ = writeln!(out, "{}", priority_note(bug.severity));
        out
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("").trim()
}

fn priority_note(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "Critical: users are blocked; investigate immediately.",
        Severity::High => "High: a core flow is impaired; schedule a fix this cycle.",
        Severity::Medium => "Medium: degraded experience with a workaround.",
        Severity::Low => "Low: cosmetic or minor issue.",
    }
}

#[async_trait]
impl AnalysisProvider for FallbackAnalyzer {
    async fn analyze(&self, bug: &Bug, context: &[String]) -> Result<Analysis> {
        Ok(Analysis {
            analysis: self.render(bug, context),
            diff: NO_DIFF.to_string(),
            confidence: FALLBACK_CONFIDENCE,
            provider: FALLBACK_PROVIDER_NAME.to_string(),
        })
    }

    fn name(&self) -> &str {
        FALLBACK_PROVIDER_NAME
    }
}
