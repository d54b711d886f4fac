//! Prompt construction for bug analysis.

use std::fmt::Write;

use bugscope_core::defaults::{ANALYSIS_TARGET_WORDS, CONTEXT_MAX_FILES, NO_DIFF};
use bugscope_core::{Bug, ConsoleLevel};

/// System instruction shared by all LLM-backed providers.
pub fn system_instruction() -> String {
    format!(
        "You are a senior web engineer triaging bug reports submitted from a live site. \
         Identify the most likely root cause and, when the evidence supports it, propose a \
         minimal fix as a unified diff against one of the candidate source files. \
         Respond with a single JSON object with the keys \"analysis\" (markdown, at most \
         {words} words), \"diff\" (a unified diff, or the string \"{none}\" when no patch can \
         be proposed) and \"confidence\" (a number between 0 and 1).",
        words = ANALYSIS_TARGET_WORDS,
        none = NO_DIFF,
    )
}

/// Render the bug report and candidate paths as the user prompt.
pub fn build_prompt(bug: &Bug, context: &[String]) -> String {
    let mut prompt = String::new();

    let _ = writeln!(prompt, "# Bug report: {}", bug.title);
    let _ = writeln!(prompt, "Severity: {}", bug.severity);
    let _ = writeln!(prompt, "Page: {}", bug.url);
    let _ = writeln!(
        prompt,
        "Browser: {} ({}x{})",
        bug.user_agent, bug.viewport.width, bug.viewport.height
    );

    let _ = writeln!(prompt, "\n## Steps to reproduce\n{}", bug.steps.trim());
    let _ = writeln!(prompt, "\n## Expected\n{}", bug.expected.trim());
    let _ = writeln!(prompt, "\n## Actual\n{}", bug.actual.trim());

    if !bug.console_logs.is_empty() {
        let _ = writeln!(prompt, "\n## Console output");
        for entry in bug.console_logs.iter() {
            let level = match entry.level {
                ConsoleLevel::Log => "log",
                ConsoleLevel::Warn => "warn",
                ConsoleLevel::Error => "error",
            };
            let _ = writeln!(prompt, "- [{}] {}", level, entry.message);
        }
    }

    if !bug.network_errors.is_empty() {
        let _ = writeln!(prompt, "\n## Failed requests");
        for entry in bug.network_errors.iter() {
            let method = entry.method.as_deref().unwrap_or("GET");
            match entry.status {
                Some(status) => {
                    let _ = writeln!(prompt, "- {} {} -> {}", method, entry.url, status);
                }
                None => {
                    let _ = writeln!(prompt, "- {} {} -> no response", method, entry.url);
                }
            }
        }
    }

    if !context.is_empty() {
        let _ = writeln!(prompt, "\n## Candidate source files");
        for path in context.iter().take(CONTEXT_MAX_FILES) {
            let _ = writeln!(prompt, "- {}", path);
        }
    }

    prompt
}
