use hwforge_utils::error::ConfigError;

use crate::model::{Config, SUPPORTED_PROVIDERS};

impl Config {
    /// Validate configuration values, collecting every problem found.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` listing each invalid value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        let orch = &self.orchestrator;

        if orch.accept_threshold > 100 {
            errors.push(format!(
                "accept_threshold must be between 0 and 100, got {}",
                orch.accept_threshold
            ));
        }
        if orch.max_loop_attempts == 0 {
            errors.push("max_loop_attempts must be greater than 0".to_string());
        }
        if orch.max_loop_attempts > 10 {
            errors.push(format!(
                "max_loop_attempts exceeds maximum limit of 10, got {}",
                orch.max_loop_attempts
            ));
        }
        if orch.max_total_iterations == 0 {
            errors.push("max_total_iterations must be greater than 0".to_string());
        }

        if let Some(timeout) = self.defaults.llm_timeout_secs
            && !(5..=3600).contains(&timeout)
        {
            errors.push(format!(
                "llm_timeout_secs must be between 5 and 3600 seconds, got {timeout}"
            ));
        }

        for (key, provider) in [
            ("llm.provider", self.llm.provider.as_deref()),
            ("llm.fallback_provider", self.llm.fallback_provider.as_deref()),
        ] {
            if let Some(provider) = provider
                && !SUPPORTED_PROVIDERS.contains(&provider)
            {
                errors.push(format!(
                    "{key} '{provider}' is not supported (expected one of: {})",
                    SUPPORTED_PROVIDERS.join(", ")
                ));
            }
        }

        for (key, temperature) in [
            (
                "llm.anthropic.temperature",
                self.llm.anthropic.as_ref().and_then(|a| a.temperature),
            ),
            (
                "llm.openrouter.temperature",
                self.llm.openrouter.as_ref().and_then(|o| o.temperature),
            ),
        ] {
            if let Some(t) = temperature
                && !(0.0..=2.0).contains(&t)
            {
                errors.push(format!("{key} must be between 0.0 and 2.0, got {t}"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationFailed {
                error_count: errors.len(),
                errors,
            })
        }
    }
}
