//! The chat-style call surface used by the orchestrator's stage nodes

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use hwforge_config::Config;
use hwforge_utils::error::LlmError;
use hwforge_utils::types::Stage;

use crate::types::{LlmBackend, LlmInvocation, Message};

/// One system + user prompt exchange.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub project_id: String,
    pub stage: Stage,
}

impl ChatRequest {
    #[must_use]
    pub fn new(
        project_id: impl Into<String>,
        stage: Stage,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            temperature: None,
            max_tokens: None,
            project_id: project_id.into(),
            stage,
        }
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatResponse {
    pub content: String,
    pub provider: String,
    pub model: String,
    pub tokens_input: Option<u64>,
    pub tokens_output: Option<u64>,
}

/// Wraps a backend with the model and per-call timeout from configuration.
///
/// The timeout is enforced here as well as in the HTTP layer, so every
/// backend, scripted ones included, fails with `LlmError::Timeout` rather
/// than hanging a run.
#[derive(Clone)]
pub struct LlmAdapter {
    backend: Arc<dyn LlmBackend>,
    model: String,
    timeout: Duration,
}

impl std::fmt::Debug for LlmAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmAdapter")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl LlmAdapter {
    /// `model` may be empty to use the backend's configured default.
    pub fn new(backend: Arc<dyn LlmBackend>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            backend,
            model: model.into(),
            timeout,
        }
    }

    /// Build the configured backend (with fallback) and wrap it.
    ///
    /// # Errors
    ///
    /// Returns the primary provider's `LlmError` when neither the primary nor
    /// the fallback provider can be constructed.
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let (backend, fallback) = crate::from_config_with_fallback(config)?;
        if let Some(info) = fallback {
            warn!(
                primary = %info.primary_provider,
                fallback = %info.fallback_provider,
                reason = %info.reason,
                "Using fallback LLM provider"
            );
        }
        Ok(Self::new(Arc::from(backend), "", config.llm_timeout()))
    }

    /// Send one chat exchange.
    ///
    /// # Errors
    ///
    /// Any backend failure, or `LlmError::Timeout` if the call exceeds the
    /// configured timeout.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let mut invocation = LlmInvocation::new(
            request.project_id,
            request.stage.as_str(),
            self.model.clone(),
            self.timeout,
            vec![
                Message::system(request.system_prompt),
                Message::user(request.user_prompt),
            ],
        );
        if let Some(temperature) = request.temperature {
            invocation = invocation.with_metadata("temperature", serde_json::json!(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            invocation = invocation.with_metadata("max_tokens", serde_json::json!(max_tokens));
        }

        let result = tokio::time::timeout(self.timeout, self.backend.invoke(invocation))
            .await
            .map_err(|_| LlmError::Timeout {
                duration: self.timeout,
            })??;

        debug!(
            provider = %result.provider,
            model = %result.model_used,
            stage = request.stage.as_str(),
            response_len = result.raw_response.len(),
            "LLM chat completed"
        );

        Ok(ChatResponse {
            content: result.raw_response,
            provider: result.provider,
            model: result.model_used,
            tokens_input: result.tokens_input,
            tokens_output: result.tokens_output,
        })
    }
}
