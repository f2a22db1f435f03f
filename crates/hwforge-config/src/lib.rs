//! Configuration management for hwforge
//!
//! Hierarchical configuration with discovery and precedence:
//! CLI > environment > file > defaults. Configuration files are TOML with
//! `[defaults]`, `[llm]`, and `[orchestrator]` sections.

mod discovery;
mod model;
mod validation;

pub use model::{
    AnthropicConfig, CliArgs, Config, ConfigSource, Defaults, LlmConfig, OpenRouterConfig,
    OrchestratorSettings, ScriptedConfig, DEFAULT_ACCEPT_THRESHOLD, DEFAULT_LLM_TIMEOUT_SECS,
    DEFAULT_MAX_LOOP_ATTEMPTS, DEFAULT_MAX_TOTAL_ITERATIONS, SUPPORTED_PROVIDERS,
};
