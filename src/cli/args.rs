//! CLI argument definitions and parsing structures
//!
//! This module defines the command-line interface structure using clap,
//! including the main `Cli` struct and the subcommand enum.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use hwforge_utils::types::Mode;

/// hwforge - LLM-orchestrated hardware design pipeline
#[derive(Parser, Debug)]
#[command(name = "hwforge")]
#[command(about = "Turn a product idea into a spec, PCB, enclosure, and firmware using LLM providers")]
#[command(long_about = r#"
hwforge drives a hardware project through five stages: spec, pcb, enclosure,
firmware and export. Enclosure and firmware are generated, reviewed and
revised until a review accepts them or the attempt limit is reached.

EXAMPLES:
  # Run a project, reading the description from stdin
  echo "A desk clock with a temperature display" | hwforge run --project-id clock --mode vibe_it

  # Persist progress and resume later from the same snapshot
  hwforge run --project-id clock --mode design_it --snapshot clock.json --description "..."

  # Replay canned model responses (no provider calls)
  hwforge run --project-id demo --mode vibe_it --script responses.json --description "..."

  # Check a block combination against the design rules
  hwforge drc esp32-devkit usb-c-power ssd1306-oled

  # Show the effective configuration and where each value came from
  hwforge config

CONFIGURATION:
  Configuration is loaded with precedence: CLI flags > environment > config file > defaults
  Config file is discovered by searching upward from CWD for .hwforge/config.toml
  Use --config to specify an explicit config file path

EXIT CODES:
  0 completed, 1 run error, 2 bad arguments or configuration,
  3 rejected (or DRC errors), 4 paused for input, 70 LLM failure
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Model to use for LLM provider calls
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// LLM provider: anthropic, openrouter or scripted
    #[arg(long, global = true)]
    pub llm_provider: Option<String>,

    /// Per-call LLM timeout in seconds
    #[arg(long, global = true)]
    pub llm_timeout: Option<u64>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run (or resume) a project through the pipeline
    Run {
        /// Project identifier used in logs and prompts
        #[arg(long)]
        project_id: String,

        /// Autonomy mode: vibe_it, fix_it or design_it
        #[arg(long, value_parser = parse_mode, default_value = "vibe_it")]
        mode: Mode,

        /// Product description (read from stdin when omitted)
        #[arg(long)]
        description: Option<String>,

        /// Block catalog JSON file (defaults to the built-in catalog)
        #[arg(long)]
        blocks: Option<PathBuf>,

        /// Spec snapshot to resume from and keep updated
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Replay model responses from a JSON script instead of calling a provider
        #[arg(long)]
        script: Option<PathBuf>,

        /// Print every event as a JSON line on stdout
        #[arg(long)]
        json_events: bool,
    },

    /// Check a combination of blocks against the design rules
    Drc {
        /// Block slugs to check together
        #[arg(required = true)]
        slugs: Vec<String>,

        /// Block catalog JSON file (defaults to the built-in catalog)
        #[arg(long)]
        blocks: Option<PathBuf>,

        /// Output the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration with the source of each value
    Config,
}

fn parse_mode(raw: &str) -> Result<Mode, String> {
    raw.parse::<Mode>()
        .map_err(|_| format!("unknown mode '{raw}' (expected vibe_it, fix_it or design_it)"))
}

/// Build the clap command, for help rendering and completion generation.
#[must_use]
pub fn build_cli() -> clap::Command {
    <Cli as clap::CommandFactory>::command()
}
