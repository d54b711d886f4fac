//! Google Gemini analysis provider.
//!
//! Calls the `generateContent` endpoint of the Generative Language API in
//! JSON response mode and reads the reply with [`crate::response`].
//!
//! # Example
//!
//! ```rust,no_run
//! use bugscope_inference::gemini::{GeminiBackend, GeminiConfig};
//!
//! // From environment variables; `None` when GEMINI_API_KEY is unset
//! if let Some(config) = GeminiConfig::from_env() {
//!     let backend = GeminiBackend::new(config).unwrap();
//!     println!("Using model {}", backend.config().model);
//! }
//!
//! // Or with custom config
//! let config = GeminiConfig::new("my-key").with_model("gemini-1.5-pro");
//! let backend = GeminiBackend::new(config).unwrap();
//! ```

mod backend;
mod error;
mod types;

pub use backend::{GeminiBackend, GeminiConfig, GEMINI_PROVIDER_NAME};
pub use error::{to_bugscope_error, GeminiErrorCode};
pub use types::*;
