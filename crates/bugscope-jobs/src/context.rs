//! Code context discovery.
//!
//! Ranks source files under a repository root by how likely they are to be
//! involved in a bug, using only the page URL the bug was reported on. The
//! ranking is advisory input for the analysis provider.
//!
//! Scoring per file:
//!
//! | Signal | Score |
//! |--------|-------|
//! | keyword in the file name | +10 |
//! | keyword elsewhere in the path | +5 |
//! | URL path segment found in the path | +8 |
//! | shallowness | `10 - depth`, floored at 0 |
//! | `.tsx` / `.jsx` | +3 |
//! | `.ts` / `.js` | +2 |

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use reqwest::Url;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use bugscope_core::defaults::{CONTEXT_MAX_DEPTH, CONTEXT_MAX_FILES};
use bugscope_core::{Error, Result};

/// Directories never descended into.
const SKIP_DIRS: &[&str] = &["node_modules", "dist", ".git", "migrations", ".next", "build"];

/// Extensions treated as source code.
const SOURCE_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "cjs", "vue", "svelte", "html", "css", "scss", "py", "rb",
    "go", "rs", "java", "php",
];

/// URL segments that carry no information about the code.
const STOP_WORDS: &[&str] = &["www", "index", "html", "htm", "php", "the", "and", "app"];

const MIN_KEYWORD_LEN: usize = 3;

/// Terms extracted from a bug URL.
#[derive(Debug, Default, PartialEq, Eq)]
struct UrlTerms {
    /// Lowercased path segments, ids removed.
    segments: Vec<String>,
    /// Words split out of the segments.
    keywords: Vec<String>,
}

impl UrlTerms {
    fn from_url(bug_url: &str) -> Self {
        let path = match Url::parse(bug_url) {
            Ok(url) => url.path().to_string(),
            // Relative or malformed URLs still carry a usable path
            Err(_) => bug_url
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_string(),
        };

        let mut segments = Vec::new();
        let mut keywords = Vec::new();
        for segment in path.split('/').map(|s| s.trim().to_lowercase()) {
            if segment.is_empty() || looks_like_id(&segment) {
                continue;
            }
            for word in segment
                .split(|c: char| !c.is_ascii_alphanumeric())
                .filter(|w| w.len() >= MIN_KEYWORD_LEN)
                .filter(|w| !w.chars().all(|c| c.is_ascii_digit()))
                .filter(|w| !STOP_WORDS.contains(w))
            {
                if !keywords.iter().any(|k| k == word) {
                    keywords.push(word.to_string());
                }
            }
            if !segments.contains(&segment) {
                segments.push(segment);
            }
        }

        Self { segments, keywords }
    }

    fn is_empty(&self) -> bool {
        self.segments.is_empty() && self.keywords.is_empty()
    }
}

/// Numeric ids, UUIDs and long hex hashes.
fn looks_like_id(segment: &str) -> bool {
    let digits_only = segment.chars().all(|c| c.is_ascii_digit());
    let hex_like = segment.len() >= 16
        && segment
            .chars()
            .all(|c| c.is_ascii_hexdigit() || c == '-');
    digits_only || hex_like
}

/// Score a root-relative path (forward slashes, lowercased).
fn score(relative: &str, terms: &UrlTerms) -> u32 {
    let (dir, file_name) = match relative.rsplit_once('/') {
        Some((dir, name)) => (dir, name),
        None => ("", relative),
    };
    let depth = relative.matches('/').count();

    let mut score = 0;
    for keyword in &terms.keywords {
        if file_name.contains(keyword.as_str()) {
            score += 10;
        } else if dir.contains(keyword.as_str()) {
            score += 5;
        }
    }
    for segment in &terms.segments {
        if relative.contains(segment.as_str()) {
            score += 8;
        }
    }

    score += (CONTEXT_MAX_DEPTH as u32).saturating_sub(depth as u32);

    score += match extension(file_name) {
        Some("tsx" | "jsx") => 3,
        Some("ts" | "js") => 2,
        _ => 0,
    };
    score
}

fn extension(file_name: &str) -> Option<&str> {
    file_name.rsplit_once('.').map(|(_, ext)| ext)
}

fn is_source_file(file_name: &str) -> bool {
    extension(file_name)
        .map(|ext| SOURCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIP_DIRS.contains(&name))
}

/// Collect root-relative source paths, at most `CONTEXT_MAX_DEPTH` directories deep.
///
/// Unreadable entries are skipped; they never abort the scan.
fn walk(root: &Path) -> BTreeSet<String> {
    let mut files = BTreeSet::new();
    let entries = WalkDir::new(root)
        .max_depth(CONTEXT_MAX_DEPTH + 1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_skipped_dir(e));

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(
                    subsystem = "jobs",
                    component = "context",
                    op = "walk",
                    error = %e,
                    "Skipping unreadable path"
                );
                continue;
            }
        };

        if !entry.file_type().is_file() || !is_source_file(&entry.file_name().to_string_lossy())
        {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.insert(relative);
    }
    files
}

/// Rank source files under `root` for the page at `bug_url`.
///
/// Returns at most 30 root-relative paths, best first, ties broken by path.
/// Deterministic for a given file tree. Symlinked directories are not
/// followed.
pub fn discover(bug_url: &str, root: &Path) -> Result<Vec<String>> {
    if !root.is_dir() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Context root {} is not a directory", root.display()),
        )));
    }

    let files = walk(root);
    let terms = UrlTerms::from_url(bug_url);
    let mut ranked: Vec<(u32, String)> = files
        .into_iter()
        .map(|path| (score(&path.to_lowercase(), &terms), path))
        .collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    Ok(ranked
        .into_iter()
        .take(CONTEXT_MAX_FILES)
        .map(|(_, path)| path)
        .collect())
}

/// Best-effort context discovery for the pipeline.
///
/// Runs the scan on the blocking pool and degrades to an empty list on any
/// error or when no root is configured.
#[derive(Debug, Clone, Default)]
pub struct ContextDiscovery {
    root: Option<PathBuf>,
}

impl ContextDiscovery {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    /// No repository configured; every lookup is empty.
    pub fn disabled() -> Self {
        Self { root: None }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Candidate paths for `bug_url`; never fails.
    pub async fn gather(&self, bug_url: &str) -> Vec<String> {
        let Some(root) = self.root.clone() else {
            return Vec::new();
        };

        let start = Instant::now();
        let url = bug_url.to_string();
        if UrlTerms::from_url(&url).is_empty() {
            debug!(
                subsystem = "jobs",
                component = "context",
                url = %bug_url,
                "No URL keywords, ranking by depth only"
            );
        }

        let result = tokio::task::spawn_blocking(move || discover(&url, &root)).await;
        match result {
            Ok(Ok(paths)) => {
                debug!(
                    subsystem = "jobs",
                    component = "context",
                    op = "gather",
                    files = paths.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Context discovered"
                );
                paths
            }
            Ok(Err(e)) => {
                warn!(
                    subsystem = "jobs",
                    component = "context",
                    op = "gather",
                    error = %e,
                    "Context discovery failed, continuing without context"
                );
                Vec::new()
            }
            Err(e) => {
                warn!(
                    subsystem = "jobs",
                    component = "context",
                    op = "gather",
                    error = %e,
                    "Context discovery task aborted"
                );
                Vec::new()
            }
        }
    }
}
