//! CLI entry point and dispatch logic
//!
//! This module owns the `run()` function which:
//! - Parses CLI arguments
//! - Builds CliArgs and discovers Config
//! - Initializes tracing
//! - Creates the tokio runtime
//! - Dispatches to command handlers
//! - Handles all error output

use clap::Parser;

use hwforge_blocks::BlockError;
use hwforge_config::{CliArgs, Config};
use hwforge_orchestrator::OrchestratorError;
use hwforge_utils::error::{ConfigError, HwforgeError, UserFriendlyError};
use hwforge_utils::exit_codes::ExitCode;
use hwforge_utils::logging::init_tracing;
use hwforge_utils::redaction::redact_error_message;

use super::args::{Cli, Commands};
use super::commands::{self, RunOptions};

/// Main CLI execution function.
///
/// Prints all output, including errors, and returns the exit code for
/// anything other than success. main.rs only calls `std::process::exit`.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    let script_path = match &cli.command {
        Commands::Run { script, .. } => script.clone(),
        _ => None,
    };
    let cli_args = CliArgs {
        config_path: cli.config.clone(),
        verbose: cli.verbose.then_some(true),
        model: cli.model.clone(),
        llm_provider: cli.llm_provider.clone(),
        llm_timeout_secs: cli.llm_timeout,
        script_path,
    };

    let config = match Config::discover(&cli_args) {
        Ok(config) => config,
        Err(err) => return Err(report_error(&err)),
    };

    // A second subscriber only fails in embedded use; logging is best effort.
    let _ = init_tracing(config.verbose(), cli.log_json);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    let result = rt.block_on(async {
        match cli.command {
            Commands::Run {
                project_id,
                mode,
                description,
                blocks,
                snapshot,
                script: _,
                json_events,
            } => {
                let options = RunOptions {
                    project_id,
                    mode,
                    description,
                    blocks,
                    snapshot,
                    json_events,
                };
                commands::execute_run_command(options, &config).await
            }
            Commands::Drc { slugs, blocks, json } => {
                commands::execute_drc_command(&slugs, blocks.as_deref(), json)
            }
            Commands::Config => commands::execute_config_command(&config),
        }
    });

    match result {
        Ok(code) if code == ExitCode::SUCCESS => Ok(()),
        Ok(code) => Err(code),
        Err(err) => Err(report_error(&err)),
    }
}

/// Print an error with suggestions and pick its exit code.
fn report_error(error: &anyhow::Error) -> ExitCode {
    let (message, suggestions, code) = classify(error);
    eprintln!("✗ {}", redact_error_message(&message));
    if !suggestions.is_empty() {
        eprintln!("\n  Suggestions:");
        for (i, suggestion) in suggestions.iter().enumerate() {
            eprintln!("    {}. {}", i + 1, suggestion);
        }
    }
    code
}

fn classify(error: &anyhow::Error) -> (String, Vec<String>, ExitCode) {
    if let Some(e) = error.downcast_ref::<HwforgeError>() {
        return (e.to_string(), suggestions_for(e), e.to_exit_code());
    }
    if let Some(e) = error.downcast_ref::<ConfigError>() {
        return (e.user_message(), e.suggestions(), ExitCode::CLI_ARGS);
    }
    if let Some(e) = error.downcast_ref::<BlockError>() {
        let suggestions = match e {
            BlockError::UnknownBlock(_) => {
                vec!["Check the slug against the catalog passed to --blocks".to_string()]
            }
            _ => vec!["Check the block catalog file passed to --blocks".to_string()],
        };
        return (e.to_string(), suggestions, ExitCode::CLI_ARGS);
    }
    if let Some(e) = error.downcast_ref::<OrchestratorError>() {
        let code = match e {
            OrchestratorError::InvalidInput(_)
            | OrchestratorError::SnapshotIo { .. }
            | OrchestratorError::SnapshotJson(_) => ExitCode::CLI_ARGS,
            OrchestratorError::Llm(_) => ExitCode::LLM_FAILURE,
            _ => ExitCode::INTERNAL,
        };
        return (format!("{error:#}"), e.suggestions(), code);
    }
    (
        format!("Unexpected error: {error:#}"),
        vec!["Run with --verbose for more detailed output".to_string()],
        ExitCode::INTERNAL,
    )
}

fn suggestions_for(error: &HwforgeError) -> Vec<String> {
    match error {
        HwforgeError::Config(e) => e.suggestions(),
        HwforgeError::Llm(e) => e.suggestions(),
        HwforgeError::InvalidInput(_) => vec!["See 'hwforge run --help'".to_string()],
        HwforgeError::Io(_) | HwforgeError::Json(_) => Vec::new(),
    }
}
