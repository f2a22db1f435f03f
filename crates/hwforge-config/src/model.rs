use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use hwforge_utils::types::Mode;

/// Review score at or above which a generated artifact is accepted.
pub const DEFAULT_ACCEPT_THRESHOLD: u8 = 85;

/// Generate attempts per review loop before escalating to a human.
pub const DEFAULT_MAX_LOOP_ATTEMPTS: u32 = 3;

/// Node executions per run before the circuit breaker trips.
pub const DEFAULT_MAX_TOTAL_ITERATIONS: u32 = 60;

/// Per-call LLM timeout.
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 180;

/// Provider names accepted in `[llm] provider`.
pub const SUPPORTED_PROVIDERS: &[&str] = &["anthropic", "openrouter", "scripted"];

/// Effective configuration for an hwforge process.
///
/// # Configuration File Format
///
/// ```toml
/// [defaults]
/// verbose = false
/// llm_timeout_secs = 180
///
/// [llm]
/// provider = "anthropic"
/// fallback_provider = "openrouter"
///
/// [llm.anthropic]
/// model = "claude-sonnet-4-5"
/// max_tokens = 8192
///
/// [orchestrator]
/// accept_threshold = 85
/// max_loop_attempts = 3
/// max_total_iterations = 60
/// auto_answer_modes = ["vibe_it"]
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub defaults: Defaults,
    pub llm: LlmConfig,
    pub orchestrator: OrchestratorSettings,
    /// Source attribution for each setting (for `hwforge config`).
    pub source_attribution: BTreeMap<String, ConfigSource>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Defaults {
    pub verbose: Option<bool>,
    /// Model override applied to whichever provider is selected.
    pub model: Option<String>,
    pub llm_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LlmConfig {
    pub provider: Option<String>,
    pub fallback_provider: Option<String>,
    pub anthropic: Option<AnthropicConfig>,
    pub openrouter: Option<OpenRouterConfig>,
    pub scripted: Option<ScriptedConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AnthropicConfig {
    /// Environment variable holding the API key (default `ANTHROPIC_API_KEY`)
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OpenRouterConfig {
    /// Environment variable holding the API key (default `OPENROUTER_API_KEY`)
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Maximum calls per process
    pub budget: Option<u32>,
}

/// Offline provider that replays canned responses from a JSON file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ScriptedConfig {
    pub path: Option<PathBuf>,
}

/// Limits and policies for the review loops.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    pub accept_threshold: u8,
    pub max_loop_attempts: u32,
    pub max_total_iterations: u32,
    /// Modes that auto-answer open questions instead of pausing for input.
    pub auto_answer_modes: Vec<Mode>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            accept_threshold: DEFAULT_ACCEPT_THRESHOLD,
            max_loop_attempts: DEFAULT_MAX_LOOP_ATTEMPTS,
            max_total_iterations: DEFAULT_MAX_TOTAL_ITERATIONS,
            auto_answer_modes: vec![Mode::VibeIt],
        }
    }
}

impl OrchestratorSettings {
    #[must_use]
    pub fn auto_answers(&self, mode: Mode) -> bool {
        self.auto_answer_modes.contains(&mode)
    }
}

/// Where a configuration value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Defaults,
    ConfigFile(PathBuf),
    Environment,
    Cli,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Defaults => write!(f, "default"),
            Self::ConfigFile(path) => write!(f, "config file ({})", path.display()),
            Self::Environment => write!(f, "environment"),
            Self::Cli => write!(f, "cli"),
        }
    }
}

/// Values supplied on the command line, applied with the highest precedence.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub verbose: Option<bool>,
    pub model: Option<String>,
    pub llm_provider: Option<String>,
    pub llm_timeout_secs: Option<u64>,
    /// Response script for the `scripted` provider.
    pub script_path: Option<PathBuf>,
}

impl Config {
    /// Built-in defaults with no file or CLI input.
    #[must_use]
    pub fn defaults() -> Self {
        let mut source_attribution = BTreeMap::new();
        for key in [
            "verbose",
            "llm_timeout_secs",
            "llm_provider",
            "accept_threshold",
            "max_loop_attempts",
            "max_total_iterations",
            "auto_answer_modes",
        ] {
            source_attribution.insert(key.to_string(), ConfigSource::Defaults);
        }
        Self {
            defaults: Defaults::default(),
            llm: LlmConfig::default(),
            orchestrator: OrchestratorSettings::default(),
            source_attribution,
        }
    }

    /// Configuration for tests: scripted provider and default limits.
    #[cfg(any(test, feature = "test-utils"))]
    #[must_use]
    pub fn minimal_for_testing() -> Self {
        let mut config = Self::defaults();
        config.llm.provider = Some("scripted".to_string());
        config
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.defaults.verbose.unwrap_or(false)
    }

    #[must_use]
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(
            self.defaults
                .llm_timeout_secs
                .unwrap_or(DEFAULT_LLM_TIMEOUT_SECS),
        )
    }

    /// Provider name, defaulting to `anthropic`.
    #[must_use]
    pub fn provider(&self) -> &str {
        self.llm.provider.as_deref().unwrap_or("anthropic")
    }

    /// Lines for `hwforge config`: `key = value  [source]`.
    #[must_use]
    pub fn describe(&self) -> Vec<String> {
        let source = |key: &str| {
            self.source_attribution
                .get(key)
                .map_or_else(|| "default".to_string(), ToString::to_string)
        };
        let modes: Vec<&str> = self
            .orchestrator
            .auto_answer_modes
            .iter()
            .map(Mode::as_str)
            .collect();
        vec![
            format!("verbose = {}  [{}]", self.verbose(), source("verbose")),
            format!(
                "model = {}  [{}]",
                self.defaults.model.as_deref().unwrap_or("<provider default>"),
                source("model")
            ),
            format!(
                "llm_timeout_secs = {}  [{}]",
                self.llm_timeout().as_secs(),
                source("llm_timeout_secs")
            ),
            format!("llm_provider = {}  [{}]", self.provider(), source("llm_provider")),
            format!(
                "llm_fallback_provider = {}  [{}]",
                self.llm.fallback_provider.as_deref().unwrap_or("<none>"),
                source("llm_fallback_provider")
            ),
            format!(
                "accept_threshold = {}  [{}]",
                self.orchestrator.accept_threshold,
                source("accept_threshold")
            ),
            format!(
                "max_loop_attempts = {}  [{}]",
                self.orchestrator.max_loop_attempts,
                source("max_loop_attempts")
            ),
            format!(
                "max_total_iterations = {}  [{}]",
                self.orchestrator.max_total_iterations,
                source("max_total_iterations")
            ),
            format!(
                "auto_answer_modes = [{}]  [{}]",
                modes.join(", "),
                source("auto_answer_modes")
            ),
        ]
    }
}
