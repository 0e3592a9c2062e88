//! Error types for the arena runner.
//!
//! Only start-up can fail: missing or malformed environment variables and
//! HTTP client construction. Provider failures at runtime are reported as
//! [`arena_core::decision::ProviderError`] and recovered by the core.

/// Errors that can occur while setting up the runner.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Configuration is invalid or missing.
    #[error("config error: {0}")]
    Config(String),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}
