//! # bugscope-core
//!
//! Core types, traits, and abstractions for bugscope.
//!
//! This crate provides the data model shared by every other bugscope crate
//! (projects, bug reports, analysis jobs), the lifecycle rules that decide
//! which status changes are legal, and the repository/provider traits that
//! storage backends and AI providers implement.

pub mod analysis;
pub mod defaults;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use analysis::{normalize_confidence, normalize_diff, Analysis, AnalysisRecord};
pub use error::{Error, Result};
pub use lifecycle::{
    is_already_analyzed, plan_transition, settle_unapplied, LifecycleState, Transition,
};
pub use models::*;
pub use traits::*;
pub use uuid_utils::new_v7;
