//! Command implementations for the hwforge CLI

use anyhow::{Context, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use hwforge_blocks::{BlockCatalog, DrcIssue, validate_block_combination};
use hwforge_config::Config;
use hwforge_llm::LlmAdapter;
use hwforge_orchestrator::{
    AbortSignal, HistoryType, Orchestrator, OrchestratorError, OrchestratorState, RunEvent,
    RunInput, RunOutcome, SpecSnapshot, StateUpdate,
};
use hwforge_utils::error::HwforgeError;
use hwforge_utils::exit_codes::ExitCode;
use hwforge_utils::redaction::redact_error_message;
use hwforge_utils::types::Mode;

/// Options of `hwforge run` after argument parsing.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub project_id: String,
    pub mode: Mode,
    pub description: Option<String>,
    pub blocks: Option<PathBuf>,
    pub snapshot: Option<PathBuf>,
    pub json_events: bool,
}

/// Execute `hwforge run`: drive the pipeline, print events, persist the snapshot.
///
/// Returns the exit code implied by how the run ended.
pub async fn execute_run_command(options: RunOptions, config: &Config) -> Result<ExitCode> {
    let description = match options.description {
        Some(text) => text,
        None => read_description_from_stdin()?,
    };
    let catalog = load_catalog(options.blocks.as_deref())?;
    let existing_spec = match &options.snapshot {
        Some(path) if path.exists() => {
            let snapshot = SpecSnapshot::load(path)
                .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
            info!(path = %path.display(), "Resuming from snapshot");
            Some(snapshot)
        }
        _ => None,
    };

    let llm = LlmAdapter::from_config(config).map_err(HwforgeError::Llm)?;
    let orchestrator = Orchestrator::new(llm, config.orchestrator.clone());

    let abort = AbortSignal::new();
    let watcher = abort.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; stopping after the current node");
            watcher.abort();
        }
    });

    let sink = EventSink {
        json: options.json_events,
        snapshot_path: options.snapshot.clone(),
        snapshot: existing_spec.clone().unwrap_or_default(),
    };
    let (tx, rx) = mpsc::channel(64);
    let printer = tokio::spawn(sink.consume(rx));

    let input = RunInput {
        project_id: options.project_id,
        mode: options.mode,
        description,
        available_blocks: catalog.into_blocks(),
        existing_spec,
    };
    let result = orchestrator.run(input, &abort, &tx).await;
    drop(tx);

    let persisted = printer.await.context("Event printer task failed")?;
    let state = result?;
    persisted?;

    Ok(exit_code_for(&state))
}

fn read_description_from_stdin() -> Result<String> {
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read the description from stdin")?;
    if buffer.trim().is_empty() {
        return Err(HwforgeError::InvalidInput(
            "no description given: pass --description or pipe text on stdin".to_string(),
        )
        .into());
    }
    Ok(buffer.trim().to_string())
}

fn load_catalog(path: Option<&Path>) -> Result<BlockCatalog> {
    let catalog = match path {
        Some(path) => BlockCatalog::from_path(path)?,
        None => BlockCatalog::builtin()?,
    };
    debug!(blocks = catalog.len(), "Block catalog loaded");
    Ok(catalog)
}

fn exit_code_for(state: &OrchestratorState) -> ExitCode {
    match RunOutcome::from_state(state) {
        Some(RunOutcome::Completed { .. }) => ExitCode::SUCCESS,
        Some(RunOutcome::Rejected { .. }) => ExitCode::REJECTED,
        Some(RunOutcome::NeedsInput { .. }) => ExitCode::NEEDS_INPUT,
        None => ExitCode::INTERNAL,
    }
}

/// Consumes the event stream: prints each event and persists `spec` patches.
struct EventSink {
    json: bool,
    snapshot_path: Option<PathBuf>,
    snapshot: SpecSnapshot,
}

impl EventSink {
    /// Runs until the stream closes. A failed snapshot write is reported once
    /// the stream ends; printing continues.
    async fn consume(mut self, mut rx: mpsc::Receiver<RunEvent>) -> Result<(), OrchestratorError> {
        let mut first_error = None;
        while let Some(event) = rx.recv().await {
            if self.json {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => error!(error = %e, "Failed to serialize event"),
                }
            } else {
                print_event(&event);
            }

            if let RunEvent::Spec { data } = event {
                self.snapshot.apply_patch(data);
                if let Some(path) = &self.snapshot_path
                    && let Err(e) = self.snapshot.save(path)
                {
                    error!(path = %path.display(), error = %e, "Failed to persist snapshot");
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

fn print_event(event: &RunEvent) {
    match event {
        RunEvent::State { node, data } => print_update(&node.to_string(), data),
        RunEvent::Spec { .. } => {}
        RunEvent::Complete { data } => print_outcome(data),
        RunEvent::Error { error } => {
            eprintln!("✗ Run failed: {}", redact_error_message(error));
        }
    }
}

fn print_update(node: &str, update: &StateUpdate) {
    for item in &update.history {
        let marker = match item.kind {
            HistoryType::Error => "✗",
            HistoryType::Fix => "~",
            HistoryType::Validation => "?",
            _ => "·",
        };
        match &item.result {
            Some(result) => println!("{marker} [{}] {node}: {result}", item.stage),
            None => println!("{marker} [{}] {node}: {}", item.stage, item.action),
        }
    }
}

fn print_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Completed { product_name } => {
            println!(
                "✓ Completed: {}",
                product_name.as_deref().unwrap_or("unnamed product")
            );
        }
        RunOutcome::Rejected {
            reason,
            suggested_revisions,
        } => {
            println!("✗ Rejected: {reason}");
            if !suggested_revisions.is_empty() {
                println!("\n  Suggested revisions:");
                for revision in suggested_revisions {
                    println!("    - {revision}");
                }
            }
        }
        RunOutcome::NeedsInput { stage, reason } => {
            println!("⏸ Needs input at {stage} ({})", reason.as_str());
            println!("  Re-run with the same --snapshot after answering to resume");
        }
    }
}

/// Execute `hwforge drc`. Exits with `REJECTED` when the combination has errors.
pub fn execute_drc_command(slugs: &[String], blocks: Option<&Path>, json: bool) -> Result<ExitCode> {
    let catalog = load_catalog(blocks)?;
    let selected = catalog.resolve(slugs)?;
    let result = validate_block_combination(&selected);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialize DRC result")?
        );
    } else {
        if result.valid {
            println!("✓ {} blocks pass DRC", selected.len());
        } else {
            println!("✗ DRC failed with {} errors", result.errors.len());
        }
        print_issues("Errors", &result.errors);
        print_issues("Warnings", &result.warnings);
    }

    Ok(if result.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::REJECTED
    })
}

fn print_issues(heading: &str, issues: &[DrcIssue]) {
    if issues.is_empty() {
        return;
    }
    println!("\n  {heading}:");
    for issue in issues {
        println!("    {}: {} [{}]", issue.code, issue.message, issue.blocks.join(", "));
    }
}

/// Execute `hwforge config`.
pub fn execute_config_command(config: &Config) -> Result<ExitCode> {
    println!("Effective configuration:");
    for line in config.describe() {
        println!("  {line}");
    }
    Ok(ExitCode::SUCCESS)
}
