//! LLM backend abstraction for hwforge
//!
//! Every provider implements [`LlmBackend`]. The orchestrator only talks to
//! [`LlmAdapter`], which turns a system/user prompt pair into one backend
//! invocation; [`extraction`] pulls JSON and code out of the free-form reply.

mod adapter;
mod anthropic_backend;
mod budgeted_backend;
pub mod extraction;
mod http_client;
mod openrouter_backend;
mod scripted;
mod types;

pub use adapter::{ChatRequest, ChatResponse, LlmAdapter};
pub use budgeted_backend::BudgetedBackend;
pub use scripted::ScriptedBackend;
pub use types::{LlmBackend, LlmFallbackInfo, LlmInvocation, LlmResult, Message, Role};
pub use hwforge_utils::error::LlmError;

use anthropic_backend::AnthropicBackend;
use hwforge_config::Config;
use hwforge_utils::redaction::redact_error_message;
use openrouter_backend::OpenRouterBackend;
use tracing::{error, warn};

/// Construct the backend for one provider, without fallback handling.
///
/// HTTP providers are wrapped in a [`BudgetedBackend`].
///
/// # Errors
///
/// `LlmError::Unsupported` for an unknown provider, `LlmError::Misconfiguration`
/// for invalid provider settings.
fn construct_backend_for_provider(
    provider: &str,
    config: &Config,
) -> Result<Box<dyn LlmBackend>, LlmError> {
    match provider {
        "anthropic" => {
            let backend = AnthropicBackend::new_from_config(config)?;
            Ok(Box::new(BudgetedBackend::with_limit_from_config(
                Box::new(backend),
                None,
            )))
        }
        "openrouter" => {
            let backend = OpenRouterBackend::new_from_config(config)?;
            let config_budget = config.llm.openrouter.as_ref().and_then(|or| or.budget);
            Ok(Box::new(BudgetedBackend::with_limit_from_config(
                Box::new(backend),
                config_budget,
            )))
        }
        "scripted" => {
            let path = config
                .llm
                .scripted
                .as_ref()
                .and_then(|s| s.path.as_deref())
                .ok_or_else(|| {
                    LlmError::Misconfiguration(
                        "The scripted provider needs a response file: pass --script \
                         or set [llm.scripted] path."
                            .to_string(),
                    )
                })?;
            Ok(Box::new(ScriptedBackend::from_path(path)?))
        }
        unknown => Err(LlmError::Unsupported(format!(
            "Unknown LLM provider '{unknown}'. Supported providers: {}.",
            hwforge_config::SUPPORTED_PROVIDERS.join(", ")
        ))),
    }
}

/// Create the configured backend, falling back to `[llm] fallback_provider`
/// when the primary cannot be constructed.
///
/// Fallback only covers construction (missing key, bad config). Runtime
/// failures of an invocation never switch providers.
///
/// # Errors
///
/// Returns the primary provider's error when no fallback is configured or the
/// fallback fails as well.
pub fn from_config_with_fallback(
    config: &Config,
) -> Result<(Box<dyn LlmBackend>, Option<LlmFallbackInfo>), LlmError> {
    let provider = config.provider();

    let primary_error = match construct_backend_for_provider(provider, config) {
        Ok(backend) => return Ok((backend, None)),
        Err(e) => e,
    };

    let Some(fallback_provider) = config.llm.fallback_provider.as_deref() else {
        return Err(primary_error);
    };

    let reason = redact_error_message(&primary_error.to_string());
    warn!(
        primary = provider,
        fallback = fallback_provider,
        reason = %reason,
        "Primary LLM provider failed during construction, trying fallback"
    );

    match construct_backend_for_provider(fallback_provider, config) {
        Ok(backend) => Ok((
            backend,
            Some(LlmFallbackInfo {
                primary_provider: provider.to_string(),
                fallback_provider: fallback_provider.to_string(),
                reason,
            }),
        )),
        Err(fallback_error) => {
            error!(
                fallback = fallback_provider,
                error = %redact_error_message(&fallback_error.to_string()),
                "Fallback LLM provider also failed"
            );
            Err(primary_error)
        }
    }
}

/// Create the configured backend, discarding fallback metadata.
///
/// # Errors
///
/// See [`from_config_with_fallback`].
pub fn from_config(config: &Config) -> Result<Box<dyn LlmBackend>, LlmError> {
    from_config_with_fallback(config).map(|(backend, _)| backend)
}
