//! Configuration types for the arena runner.
//!
//! Endpoints and secrets come from environment variables; everything about
//! the simulation itself lives in the YAML file named by `ARENA_CONFIG`.

use std::path::PathBuf;

use crate::error::RunnerError;

/// Complete runner configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// LLM backend to send completions to.
    pub backend: LlmBackendConfig,
    /// Model override. Replaces `llm.model` from the YAML when set.
    pub model: Option<String>,
    /// Path to the simulation YAML.
    pub arena_config: PathBuf,
    /// Directory of prompt template overrides.
    pub templates_dir: Option<PathBuf>,
}

/// Configuration for a single LLM backend.
#[derive(Debug, Clone)]
pub struct LlmBackendConfig {
    /// The backend type.
    pub backend_type: BackendType,
    /// Base API URL (e.g. `https://api.openai.com/v1`).
    pub api_url: String,
    /// API key for authentication.
    pub api_key: String,
}

/// Supported LLM backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// `OpenAI`-compatible API (works with `OpenAI`, `DeepSeek`, Ollama).
    OpenAi,
    /// Anthropic Messages API (different request format).
    Anthropic,
}

impl RunnerConfig {
    /// Load configuration from environment variables.
    ///
    /// Required variables:
    /// - `LLM_BACKEND` -- backend type (`openai`, `deepseek`, `ollama`, `anthropic`)
    /// - `LLM_API_URL` -- API base URL
    /// - `LLM_API_KEY` -- API key
    ///
    /// Optional variables:
    /// - `LLM_MODEL` -- model name, overriding `llm.model` in the YAML
    /// - `ARENA_CONFIG` -- simulation YAML (default `arena-config.yaml`)
    /// - `TEMPLATES_DIR` -- prompt template overrides (default: built-ins only)
    pub fn from_env() -> Result<Self, RunnerError> {
        let backend = LlmBackendConfig {
            backend_type: parse_backend_type(&env_var("LLM_BACKEND")?)?,
            api_url: env_var("LLM_API_URL")?,
            api_key: env_var("LLM_API_KEY")?,
        };

        let model = std::env::var("LLM_MODEL")
            .ok()
            .filter(|m| !m.trim().is_empty());

        let arena_config = std::env::var("ARENA_CONFIG")
            .unwrap_or_else(|_| "arena-config.yaml".to_owned())
            .into();

        let templates_dir = std::env::var("TEMPLATES_DIR").ok().map(PathBuf::from);

        Ok(Self {
            backend,
            model,
            arena_config,
            templates_dir,
        })
    }
}

/// Read a required environment variable.
fn env_var(name: &str) -> Result<String, RunnerError> {
    std::env::var(name)
        .map_err(|e| RunnerError::Config(format!("missing required env var {name}: {e}")))
}

/// Map a backend name to its [`BackendType`].
fn parse_backend_type(name: &str) -> Result<BackendType, RunnerError> {
    match name.to_lowercase().as_str() {
        "openai" | "deepseek" | "ollama" => Ok(BackendType::OpenAi),
        "anthropic" | "claude" => Ok(BackendType::Anthropic),
        other => Err(RunnerError::Config(format!("unknown backend type: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_type_parsing() {
        assert!(matches!(parse_backend_type("OpenAI"), Ok(BackendType::OpenAi)));
        assert!(matches!(parse_backend_type("ollama"), Ok(BackendType::OpenAi)));
        assert!(matches!(
            parse_backend_type("anthropic"),
            Ok(BackendType::Anthropic)
        ));
        assert!(matches!(
            parse_backend_type("carrier-pigeon"),
            Err(RunnerError::Config(_))
        ));
    }
}
