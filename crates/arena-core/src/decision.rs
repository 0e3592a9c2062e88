//! Decision provider boundary and the retrying client around it.
//!
//! A [`DecisionProvider`] turns a [`CompletionRequest`] into raw text. It
//! could be an HTTP LLM backend, a scripted bot, or a test stub. The
//! [`DecisionClient`] wraps a provider with a per-attempt timeout and a
//! retry policy, and never fails: every operation degrades to a fallback
//! value and logs.
//!
//! Retry policy: [`ProviderError::Unreachable`] and
//! [`ProviderError::RateLimited`] are retried up to `max_retries` times
//! with linear backoff. Malformed payloads, empty responses and timeouts
//! are not retried.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use arena_types::{Action, AgentId, SUMMARY_PLACEHOLDER};
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::parse::parse_action;
use crate::prompt::PromptPayload;

/// One call to a text-completion capability.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// System message.
    pub system: String,
    /// User messages, in order.
    pub user: Vec<String>,
    /// Model identifier. Empty means the provider default.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Failures a provider can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The endpoint could not be reached or the connection failed.
    #[error("provider unreachable: {0}")]
    Unreachable(String),

    /// The endpoint refused the call because of rate limiting.
    #[error("provider rate limited")]
    RateLimited,

    /// The endpoint answered with something that is not a completion.
    #[error("malformed provider payload: {0}")]
    MalformedPayload(String),

    /// The completion contained no text.
    #[error("empty provider response")]
    EmptyResponse,
}

impl ProviderError {
    /// Whether another attempt may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::RateLimited)
    }
}

/// Classified failure of one client operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecisionError {
    /// The provider failed (after retries, where applicable).
    #[error("decision provider failure: {0}")]
    Provider(#[from] ProviderError),

    /// An attempt exceeded the request timeout.
    #[error("decision request timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout in milliseconds.
        timeout_ms: u64,
    },
}

/// A source of completions.
///
/// Implementations must be shareable across spawned tasks.
pub trait DecisionProvider: Send + Sync + 'static {
    /// Produce raw completion text for `request`.
    fn request_completion(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;
}

/// Timeout and retry settings for a [`DecisionClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    /// Per-attempt timeout.
    pub request_timeout: Duration,
    /// Backoff step; attempt `n` waits `n * retry_backoff`.
    pub retry_backoff: Duration,
}

impl From<&LlmConfig> for ClientSettings {
    fn from(config: &LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries,
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

/// Retrying, never-failing front of a [`DecisionProvider`].
#[derive(Debug)]
pub struct DecisionClient<P> {
    provider: Arc<P>,
    settings: ClientSettings,
}

impl<P> Clone for DecisionClient<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            settings: self.settings.clone(),
        }
    }
}

impl<P: DecisionProvider> DecisionClient<P> {
    /// Wrap a provider.
    pub const fn new(provider: Arc<P>, settings: ClientSettings) -> Self {
        Self { provider, settings }
    }

    /// The client settings.
    pub const fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Run one payload through the provider with timeout and retries.
    ///
    /// # Errors
    ///
    /// Returns [`DecisionError`] once retries are exhausted or a
    /// non-transient failure occurs.
    pub async fn complete(&self, payload: PromptPayload) -> Result<String, DecisionError> {
        let request = CompletionRequest {
            system: payload.system,
            user: payload.user,
            model: self.settings.model.clone(),
            temperature: self.settings.temperature,
        };

        let mut attempt: u32 = 0;
        loop {
            let call = self.provider.request_completion(request.clone());
            let error = match tokio::time::timeout(self.settings.request_timeout, call).await {
                Ok(Ok(text)) if text.trim().is_empty() => ProviderError::EmptyResponse,
                Ok(Ok(text)) => return Ok(text),
                Ok(Err(e)) => e,
                Err(_elapsed) => {
                    return Err(DecisionError::Timeout {
                        timeout_ms: u64::try_from(self.settings.request_timeout.as_millis())
                            .unwrap_or(u64::MAX),
                    });
                }
            };

            if !error.is_transient() || attempt >= self.settings.max_retries {
                return Err(error.into());
            }
            attempt = attempt.saturating_add(1);
            let backoff = self.settings.retry_backoff.saturating_mul(attempt);
            debug!(attempt, backoff_ms = backoff.as_millis(), error = %error, "retrying provider call");
            tokio::time::sleep(backoff).await;
        }
    }

    /// Ask for the next action of `agent`. Any failure yields
    /// [`Action::None`].
    pub async fn decide(&self, agent: AgentId, payload: PromptPayload) -> Action {
        match self.complete(payload).await {
            Ok(text) => {
                let action = parse_action(&text);
                debug!(agent_id = %agent, action = action.label(), "decision parsed");
                action
            }
            Err(e) => {
                warn!(agent_id = %agent, error = %e, "decision failed, no action");
                Action::None
            }
        }
    }

    /// Summarize a chat history. Failure yields the placeholder text.
    pub async fn summarize(&self, agent: AgentId, payload: PromptPayload) -> String {
        match self.complete(payload).await {
            Ok(text) => text.trim().to_owned(),
            Err(e) => {
                warn!(agent_id = %agent, error = %e, "summarization failed, keeping placeholder");
                SUMMARY_PLACEHOLDER.to_owned()
            }
        }
    }

    /// Generate a display name. Failure, or a reply with no usable name,
    /// yields `fallback`.
    pub async fn generate_name(&self, payload: PromptPayload, fallback: String) -> String {
        match self.complete(payload).await {
            Ok(text) => clean_name(&text).unwrap_or_else(|| {
                warn!(raw_response = text, "unusable generated name, using fallback");
                fallback
            }),
            Err(e) => {
                warn!(error = %e, fallback = %fallback, "name generation failed, using fallback");
                fallback
            }
        }
    }

    /// Generate a mutated strategy. Failure yields `parent_strategy`
    /// unchanged.
    pub async fn generate_strategy(&self, payload: PromptPayload, parent_strategy: String) -> String {
        match self.complete(payload).await {
            Ok(text) => text.trim().to_owned(),
            Err(e) => {
                warn!(error = %e, "strategy generation failed, keeping parent strategy");
                parent_strategy
            }
        }
    }
}

/// Provider driven by a closure over the request.
///
/// Useful for offline runs and tests: the closure sees the full request,
/// so replies can depend on which agent is asking.
pub struct ScriptedProvider<F> {
    script: F,
    calls: AtomicU64,
}

impl<F> ScriptedProvider<F>
where
    F: Fn(&CompletionRequest) -> Result<String, ProviderError> + Send + Sync + 'static,
{
    /// Wrap a reply function.
    pub const fn new(script: F) -> Self {
        Self {
            script,
            calls: AtomicU64::new(0),
        }
    }

    /// Number of requests served so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl<F> DecisionProvider for ScriptedProvider<F>
where
    F: Fn(&CompletionRequest) -> Result<String, ProviderError> + Send + Sync + 'static,
{
    fn request_completion(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send {
        self.calls.fetch_add(1, Ordering::Relaxed);
        std::future::ready((self.script)(&request))
    }
}

/// First non-empty line, without surrounding quotes or characters that
/// would break the action grammar.
fn clean_name(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let name = line
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '*' || c == '.')
        .trim();
    if name.is_empty() || name.contains([':', '[', ']']) {
        return None;
    }
    Some(name.to_owned())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicU32;

    use super::*;

    /// Replays canned results, then reports unreachable.
    struct Scripted {
        replies: Mutex<VecDeque<Result<String, ProviderError>>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicU32::new(0),
            })
        }
    }

    impl DecisionProvider for Scripted {
        fn request_completion(
            &self,
            _request: CompletionRequest,
        ) -> impl Future<Output = Result<String, ProviderError>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .replies
                .lock()
                .ok()
                .and_then(|mut q| q.pop_front())
                .unwrap_or_else(|| Err(ProviderError::Unreachable(String::from("script empty"))));
            async move { next }
        }
    }

    /// Never answers.
    struct Silent;

    impl DecisionProvider for Silent {
        fn request_completion(
            &self,
            _request: CompletionRequest,
        ) -> impl Future<Output = Result<String, ProviderError>> + Send {
            std::future::pending()
        }
    }

    fn settings(max_retries: u32) -> ClientSettings {
        ClientSettings {
            model: String::new(),
            temperature: 0.0,
            max_retries,
            request_timeout: Duration::from_millis(50),
            retry_backoff: Duration::from_millis(1),
        }
    }

    fn payload() -> PromptPayload {
        PromptPayload {
            system: String::from("sys"),
            user: vec![String::from("user")],
        }
    }

    #[tokio::test]
    async fn decide_parses_action() {
        let provider = Scripted::new(vec![Ok(String::from("[attack Bob]"))]);
        let client = DecisionClient::new(provider, settings(0));
        assert_eq!(
            client.decide(AgentId::new(), payload()).await,
            Action::Attack {
                target_name: String::from("Bob")
            }
        );
    }

    #[tokio::test]
    async fn malformed_payload_is_none_without_retry() {
        let provider = Scripted::new(vec![
            Err(ProviderError::MalformedPayload(String::from("not json"))),
            Ok(String::from("[attack Bob]")),
        ]);
        let client = DecisionClient::new(Arc::clone(&provider), settings(3));
        assert_eq!(client.decide(AgentId::new(), payload()).await, Action::None);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rate_limit_is_retried() {
        let provider = Scripted::new(vec![
            Err(ProviderError::RateLimited),
            Err(ProviderError::Unreachable(String::from("reset"))),
            Ok(String::from("[message Bob: hi]")),
        ]);
        let client = DecisionClient::new(Arc::clone(&provider), settings(2));
        assert!(matches!(
            client.decide(AgentId::new(), payload()).await,
            Action::Message { .. }
        ));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let provider = Scripted::new(vec![
            Err(ProviderError::RateLimited),
            Err(ProviderError::RateLimited),
            Ok(String::from("[attack Bob]")),
        ]);
        let client = DecisionClient::new(Arc::clone(&provider), settings(1));
        assert_eq!(
            client.complete(payload()).await,
            Err(DecisionError::Provider(ProviderError::RateLimited))
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn blank_text_is_empty_response() {
        let provider = Scripted::new(vec![Ok(String::from("   \n"))]);
        let client = DecisionClient::new(provider, settings(2));
        assert_eq!(
            client.complete(payload()).await,
            Err(DecisionError::Provider(ProviderError::EmptyResponse))
        );
    }

    #[tokio::test]
    async fn timeout_yields_none() {
        let client = DecisionClient::new(Arc::new(Silent), settings(2));
        assert_eq!(
            client.complete(payload()).await,
            Err(DecisionError::Timeout { timeout_ms: 50 })
        );
        assert_eq!(client.decide(AgentId::new(), payload()).await, Action::None);
    }

    #[tokio::test]
    async fn fallbacks_on_failure() {
        let provider = Scripted::new(Vec::new());
        let client = DecisionClient::new(provider, settings(0));
        assert_eq!(
            client.summarize(AgentId::new(), payload()).await,
            SUMMARY_PLACEHOLDER
        );
        assert_eq!(
            client
                .generate_name(payload(), String::from("Alice - Gen 2"))
                .await,
            "Alice - Gen 2"
        );
        assert_eq!(
            client
                .generate_strategy(payload(), String::from("old plan"))
                .await,
            "old plan"
        );
    }

    #[tokio::test]
    async fn generated_name_is_cleaned() {
        let provider = Scripted::new(vec![Ok(String::from("\n  \"Vex\"  \nextra"))]);
        let client = DecisionClient::new(provider, settings(0));
        assert_eq!(
            client.generate_name(payload(), String::from("fallback")).await,
            "Vex"
        );
    }

    #[tokio::test]
    async fn scripted_provider_sees_request() {
        let provider = Arc::new(ScriptedProvider::new(|req: &CompletionRequest| {
            if req.system.contains("berserker") {
                Ok(String::from("[attack Bob]"))
            } else {
                Ok(String::from("I wait."))
            }
        }));
        let client = DecisionClient::new(Arc::clone(&provider), settings(0));
        let angry = PromptPayload {
            system: String::from("You are a berserker."),
            user: Vec::new(),
        };
        assert!(matches!(
            client.decide(AgentId::new(), angry).await,
            Action::Attack { .. }
        ));
        assert_eq!(client.decide(AgentId::new(), payload()).await, Action::None);
        assert_eq!(provider.calls(), 2);
    }

    #[test]
    fn grammar_breaking_names_rejected() {
        assert_eq!(clean_name("[attack]"), None);
        assert_eq!(clean_name("Bob: the great"), None);
        assert_eq!(clean_name("**Nyx**"), Some(String::from("Nyx")));
    }
}
