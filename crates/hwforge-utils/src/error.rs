use std::time::Duration;
use thiserror::Error;

/// Library-level error type for hwforge operations.
///
/// `HwforgeError` is returned by setup paths (configuration, catalog loading,
/// snapshot persistence). Failures *inside* a pipeline run are recorded on the
/// orchestrator state instead of being returned, so a run always ends with an
/// event rather than an unhandled error.
///
/// # Exit Code Mapping
///
/// | Exit Code | Error Type |
/// |-----------|------------|
/// | 2 | Configuration/CLI argument errors |
/// | 70 | LLM backend failure |
/// | 1 | Other errors |
#[derive(Error, Debug)]
pub enum HwforgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM backend error: {0}")]
    Llm(#[from] LlmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Trait for providing user-friendly error reporting with suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },

    #[error("Configuration discovery failed: {reason}")]
    DiscoveryFailed { reason: String },

    #[error("Configuration validation failed: {error_count} errors")]
    ValidationFailed {
        errors: Vec<String>,
        error_count: usize,
    },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => {
                format!("Configuration file has invalid format: {reason}")
            }
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::NotFound { path } => format!("Configuration file not found: {path}"),
            Self::DiscoveryFailed { reason } => {
                format!("Could not discover configuration: {reason}")
            }
            Self::ValidationFailed { errors, .. } => {
                format!("Configuration is invalid:\n  - {}", errors.join("\n  - "))
            }
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Check the TOML syntax of .hwforge/config.toml".to_string(),
                "Run 'hwforge config' to see the effective configuration".to_string(),
            ],
            Self::InvalidValue { key, .. } => {
                vec![format!("Fix the value of '{key}' in your config file or CLI flags")]
            }
            Self::NotFound { .. } => vec![
                "Check the path passed to --config".to_string(),
                "Omit --config to use discovery".to_string(),
            ],
            Self::DiscoveryFailed { .. } => {
                vec!["Set HWFORGE_HOME or pass --config explicitly".to_string()]
            }
            Self::ValidationFailed { .. } => {
                vec!["Correct the listed values and re-run".to_string()]
            }
        }
    }
}

/// Errors surfaced by LLM backends.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Transport-level failure (HTTP connectivity, malformed provider payload)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider authentication failure (401, 403, missing API key)
    #[error("Provider authentication error: {0}")]
    ProviderAuth(String),

    /// Provider quota/rate limit exceeded (429)
    #[error("Provider quota exceeded: {0}")]
    ProviderQuota(String),

    /// Provider service outage (5xx errors)
    #[error("Provider outage: {0}")]
    ProviderOutage(String),

    /// Invocation timed out
    #[error("Timeout after {duration:?}")]
    Timeout { duration: Duration },

    /// Budget limit exceeded
    #[error("Budget exceeded: attempted {attempted} calls, limit is {limit}")]
    BudgetExceeded { limit: u32, attempted: u32 },

    /// Configuration error
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),

    /// Unsupported feature or provider
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl UserFriendlyError for LlmError {
    fn user_message(&self) -> String {
        match self {
            Self::Transport(msg) => format!("LLM transport error: {msg}"),
            Self::ProviderAuth(msg) => format!("LLM provider rejected credentials: {msg}"),
            Self::ProviderQuota(msg) => format!("LLM provider quota exceeded: {msg}"),
            Self::ProviderOutage(msg) => format!("LLM provider is unavailable: {msg}"),
            Self::Timeout { duration } => {
                format!("LLM call timed out after {}s", duration.as_secs())
            }
            Self::BudgetExceeded { limit, attempted } => {
                format!("LLM call budget of {limit} exhausted ({attempted} attempted)")
            }
            Self::Misconfiguration(msg) => format!("LLM provider misconfigured: {msg}"),
            Self::Unsupported(msg) => format!("Unsupported LLM configuration: {msg}"),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::ProviderAuth(_) | Self::Misconfiguration(_) => vec![
                "Check that the API key environment variable is set".to_string(),
                "Verify [llm] settings in .hwforge/config.toml".to_string(),
            ],
            Self::ProviderQuota(_) | Self::BudgetExceeded { .. } => vec![
                "Wait and retry, or raise [llm.<provider>] budget".to_string(),
            ],
            Self::Timeout { .. } => {
                vec!["Increase [defaults] llm_timeout_secs".to_string()]
            }
            Self::Transport(_) | Self::ProviderOutage(_) => {
                vec!["Check network connectivity and provider status".to_string()]
            }
            Self::Unsupported(_) => {
                vec!["Use one of: anthropic, openrouter, scripted".to_string()]
            }
        }
    }
}

impl HwforgeError {
    /// Render the error with suggestions for terminal output.
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let (message, suggestions) = match self {
            Self::Config(e) => (e.user_message(), e.suggestions()),
            Self::Llm(e) => (e.user_message(), e.suggestions()),
            other => (other.to_string(), Vec::new()),
        };
        if suggestions.is_empty() {
            return message;
        }
        let mut out = message;
        out.push_str("\n\nSuggestions:");
        for s in suggestions {
            out.push_str("\n  - ");
            out.push_str(&s);
        }
        out
    }
}
