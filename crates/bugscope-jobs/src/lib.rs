//! # bugscope-jobs
//!
//! Background analysis for bugscope.
//!
//! This crate provides:
//! - A job queue facade that never lets a store error escape a cycle
//! - Code context discovery for a bug URL
//! - The analysis pipeline (claim, load, analyze, persist)
//! - A poll-loop worker with graceful shutdown and an event stream
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use bugscope_db::Database;
//! use bugscope_inference::AnalysisBackend;
//! use bugscope_jobs::{AnalysisPipeline, JobWorker, WorkerConfig};
//!
//! let db = Database::connect("postgres://...").await?;
//! let provider = Arc::new(AnalysisBackend::from_env()?);
//! let config = WorkerConfig::from_env();
//!
//! let pipeline = AnalysisPipeline::from_database(&db, provider)
//!     .with_context_root(config.context_root.clone())
//!     .with_timeout(config.analysis_timeout());
//!
//! let handle = JobWorker::new(pipeline, config).start();
//!
//! let mut events = handle.events();
//! while let Ok(event) = events.recv().await {
//!     println!("Event: {:?}", event);
//! }
//!
//! handle.shutdown().await?;
//! handle.join().await;
//! ```

pub mod context;
pub mod pipeline;
pub mod queue;
pub mod worker;

// Re-export core types
pub use bugscope_core::*;

pub use context::{discover, ContextDiscovery};
pub use pipeline::{AnalysisPipeline, CycleOutcome};
pub use queue::JobQueue;
pub use worker::{JobWorker, WorkerConfig, WorkerEvent, WorkerHandle};

/// Default polling interval for job processing (milliseconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = bugscope_core::defaults::JOB_POLL_INTERVAL_MS;

/// Default deadline for a provider call (seconds).
pub const DEFAULT_ANALYSIS_TIMEOUT_SECS: u64 = bugscope_core::defaults::ANALYSIS_TIMEOUT_SECS;
