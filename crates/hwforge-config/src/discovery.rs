use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use hwforge_utils::error::ConfigError;

use crate::model::{CliArgs, Config, ConfigSource, Defaults, LlmConfig};

/// Directory searched for `config.toml` in each ancestor of the start directory.
const CONFIG_DIR: &str = ".hwforge";
const CONFIG_FILE: &str = "config.toml";
const HOME_ENV: &str = "HWFORGE_HOME";
const PROVIDER_ENV: &str = "HWFORGE_LLM_PROVIDER";

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    defaults: Option<Defaults>,
    llm: Option<LlmConfig>,
    orchestrator: Option<TomlOrchestrator>,
}

/// `[orchestrator]` as written in the file; every key optional so that source
/// attribution can tell set keys from defaults.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlOrchestrator {
    accept_threshold: Option<u8>,
    max_loop_attempts: Option<u32>,
    max_total_iterations: Option<u32>,
    auto_answer_modes: Option<Vec<hwforge_utils::types::Mode>>,
}

impl Config {
    /// Discover and load configuration with precedence: CLI > env > file > defaults
    ///
    /// Uses the current working directory for config file discovery when no
    /// explicit path is provided in `cli_args`.
    pub fn discover(cli_args: &CliArgs) -> Result<Self> {
        let start_dir = env::current_dir().context("Failed to get current directory")?;
        Self::discover_from(&start_dir, cli_args)
    }

    /// Discover and load configuration starting from a specific directory
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs) -> Result<Self> {
        let mut config = Config::defaults();

        let config_path = if let Some(explicit_path) = &cli_args.config_path {
            if !explicit_path.exists() {
                return Err(ConfigError::NotFound {
                    path: explicit_path.display().to_string(),
                }
                .into());
            }
            Some(explicit_path.clone())
        } else {
            Self::discover_config_file_from(start_dir)
        };

        if let Some(path) = &config_path {
            let file_config = Self::load_config_file(path)
                .with_context(|| format!("Failed to load config file: {}", path.display()))?;
            config.apply_file(file_config, ConfigSource::ConfigFile(path.clone()));
        }

        if let Ok(env_provider) = env::var(PROVIDER_ENV)
            && !env_provider.is_empty()
        {
            config.llm.provider = Some(env_provider);
            config
                .source_attribution
                .insert("llm_provider".to_string(), ConfigSource::Environment);
        }

        config.apply_cli(cli_args);
        config.validate()?;

        Ok(config)
    }

    fn apply_file(&mut self, file_config: TomlConfig, source: ConfigSource) {
        let attribute = |key: &str, config: &mut Config| {
            config
                .source_attribution
                .insert(key.to_string(), source.clone());
        };

        if let Some(file_defaults) = file_config.defaults {
            if file_defaults.verbose.is_some() {
                self.defaults.verbose = file_defaults.verbose;
                attribute("verbose", self);
            }
            if file_defaults.model.is_some() {
                self.defaults.model = file_defaults.model;
                attribute("model", self);
            }
            if file_defaults.llm_timeout_secs.is_some() {
                self.defaults.llm_timeout_secs = file_defaults.llm_timeout_secs;
                attribute("llm_timeout_secs", self);
            }
        }

        if let Some(file_llm) = file_config.llm {
            if file_llm.provider.is_some() {
                self.llm.provider = file_llm.provider;
                attribute("llm_provider", self);
            }
            if file_llm.fallback_provider.is_some() {
                self.llm.fallback_provider = file_llm.fallback_provider;
                attribute("llm_fallback_provider", self);
            }
            if file_llm.anthropic.is_some() {
                self.llm.anthropic = file_llm.anthropic;
                attribute("llm_anthropic_config", self);
            }
            if file_llm.openrouter.is_some() {
                self.llm.openrouter = file_llm.openrouter;
                attribute("llm_openrouter_config", self);
            }
            if file_llm.scripted.is_some() {
                self.llm.scripted = file_llm.scripted;
                attribute("llm_scripted_config", self);
            }
        }

        if let Some(file_orch) = file_config.orchestrator {
            if let Some(v) = file_orch.accept_threshold {
                self.orchestrator.accept_threshold = v;
                attribute("accept_threshold", self);
            }
            if let Some(v) = file_orch.max_loop_attempts {
                self.orchestrator.max_loop_attempts = v;
                attribute("max_loop_attempts", self);
            }
            if let Some(v) = file_orch.max_total_iterations {
                self.orchestrator.max_total_iterations = v;
                attribute("max_total_iterations", self);
            }
            if let Some(v) = file_orch.auto_answer_modes {
                self.orchestrator.auto_answer_modes = v;
                attribute("auto_answer_modes", self);
            }
        }
    }

    fn apply_cli(&mut self, cli_args: &CliArgs) {
        if let Some(verbose) = cli_args.verbose {
            self.defaults.verbose = Some(verbose);
            self.source_attribution
                .insert("verbose".to_string(), ConfigSource::Cli);
        }
        if let Some(model) = &cli_args.model {
            self.defaults.model = Some(model.clone());
            self.source_attribution
                .insert("model".to_string(), ConfigSource::Cli);
        }
        if let Some(provider) = &cli_args.llm_provider {
            self.llm.provider = Some(provider.clone());
            self.source_attribution
                .insert("llm_provider".to_string(), ConfigSource::Cli);
        }
        if let Some(timeout) = cli_args.llm_timeout_secs {
            self.defaults.llm_timeout_secs = Some(timeout);
            self.source_attribution
                .insert("llm_timeout_secs".to_string(), ConfigSource::Cli);
        }
        if let Some(path) = &cli_args.script_path {
            self.llm.provider = Some("scripted".to_string());
            self.llm.scripted = Some(crate::model::ScriptedConfig {
                path: Some(path.clone()),
            });
            self.source_attribution
                .insert("llm_provider".to_string(), ConfigSource::Cli);
        }
    }

    /// Search upward from `start_dir` for `.hwforge/config.toml`, stopping at
    /// the filesystem root or a repository root, then fall back to
    /// `$HWFORGE_HOME/config.toml`.
    #[must_use]
    pub fn discover_config_file_from(start_dir: &Path) -> Option<PathBuf> {
        let mut current_dir = Some(start_dir);

        while let Some(dir) = current_dir {
            let config_path = dir.join(CONFIG_DIR).join(CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }
            if dir.join(".git").exists() || dir.join(".hg").exists() {
                break;
            }
            current_dir = dir.parent();
        }

        env::var_os(HOME_ENV)
            .map(|home| PathBuf::from(home).join(CONFIG_FILE))
            .filter(|path| path.exists())
    }

    fn load_config_file(path: &Path) -> Result<TomlConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: TomlConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::InvalidFile(format!("{}: {e}", path.display())))?;
        Ok(config)
    }
}
