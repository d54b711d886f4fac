//! bugscope analysis worker.
//!
//! Connects to the database, picks an analysis provider and runs the job
//! worker until Ctrl-C.

use std::path::Path;
use std::sync::Arc;

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bugscope_db::{Database, PoolConfig};
use bugscope_inference::AnalysisBackend;
use bugscope_jobs::{AnalysisPipeline, JobWorker, WorkerConfig};

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/bugscope";
const DEFAULT_LOG_FILTER: &str = "bugscope=info,bugscope_jobs=debug";
const DEFAULT_LOG_FILE_NAME: &str = "bugscope-worker.log";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let _file_guard = init_tracing();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

    info!(subsystem = "worker", "Connecting to database...");
    let db = Database::connect_with_config(&database_url, PoolConfig::from_env()).await?;
    info!(subsystem = "worker", "Database connected");

    info!(subsystem = "worker", "Running database migrations...");
    db.migrate().await?;
    info!(subsystem = "worker", "Database migrations complete");

    let provider = Arc::new(AnalysisBackend::from_env()?);
    let config = WorkerConfig::from_env();

    if let Some(root) = &config.context_root {
        if !root.is_dir() {
            tracing::warn!(
                subsystem = "worker",
                root = %root.display(),
                "CODE_CONTEXT_ROOT is not a directory, analyses will run without code context"
            );
        }
    }

    let pipeline = AnalysisPipeline::from_database(&db, provider)
        .with_context_root(config.context_root.clone());

    let handle = JobWorker::new(pipeline, config).start();

    tokio::signal::ctrl_c().await?;
    info!(subsystem = "worker", "Shutdown requested, finishing current cycle");

    // The loop may already have exited when disabled
    if let Err(e) = handle.shutdown().await {
        tracing::debug!(subsystem = "worker", error = %e, "Worker already stopped");
    }
    handle.join().await;

    bugscope_db::log_pool_metrics(db.pool());
    db.pool().close().await;
    info!(subsystem = "worker", "Shutdown complete");
    Ok(())
}

/// Initialize tracing with configurable output.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables daily-rotated file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
///   RUST_LOG    - standard env filter (default: "bugscope=info,bugscope_jobs=debug")
fn init_tracing() -> Option<WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = if let Some(ref path) = log_file {
        let (file_dir, file_name) = log_file_parts(path);
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            // No ANSI in files unless asked for
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        subsystem = "worker",
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );
    guard
}

/// Split `LOG_FILE` into the rotation directory and file name prefix.
fn log_file_parts(path: &str) -> (&Path, &str) {
    let path = Path::new(path);
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let name = path
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or(DEFAULT_LOG_FILE_NAME);
    (dir, name)
}
