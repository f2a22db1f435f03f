//! hwforge - LLM-orchestrated pipeline from a product idea to a manufacturable hardware design
//!
//! A run takes a plain-language product description through five forward-only
//! stages: spec, pcb, enclosure, firmware, export. The enclosure and firmware
//! stages are generate/review/decide loops with a per-stage attempt cap and a
//! global iteration cap; a run ends completed, rejected as not manufacturable,
//! paused for human input, or with an error event.
//!
//! hwforge can be used in two ways:
//! - **CLI**: `hwforge run`, `hwforge drc`, `hwforge config`
//! - **Library**: drive [`Orchestrator::run`] directly and consume [`RunEvent`]s
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! # Run a project end to end with the configured provider
//! hwforge run --project-id desk-clock --mode vibe_it \
//!     --description "A desk clock with a temperature display" \
//!     --snapshot desk-clock.json
//!
//! # Replay canned model responses instead of calling a provider
//! hwforge run --project-id demo --mode vibe_it --script responses.json < idea.txt
//!
//! # Check a block combination against the design rules
//! hwforge drc esp32-devkit usb-c-power ssd1306-oled
//! ```
//!
//! # Quick Start (Library)
//!
//! ```ignore
//! use hwforge::{AbortSignal, BlockCatalog, Config, LlmAdapter, Mode, Orchestrator, RunInput};
//!
//! let config = Config::discover(&Default::default())?;
//! let orchestrator = Orchestrator::new(LlmAdapter::from_config(&config)?, config.orchestrator.clone());
//! let (tx, mut rx) = tokio::sync::mpsc::channel(64);
//! let input = RunInput {
//!     project_id: "desk-clock".to_string(),
//!     mode: Mode::VibeIt,
//!     description: "A desk clock with a temperature display".to_string(),
//!     available_blocks: BlockCatalog::builtin()?.into_blocks(),
//!     existing_spec: None,
//! };
//! let state = orchestrator.run(input, &AbortSignal::new(), &tx).await?;
//! ```
//!
//! # Event stream
//!
//! Every run emits `state` events (one per node), `spec` events carrying
//! persistable [`SpecPatch`]es, and exactly one terminal `complete` or
//! `error` event. Applying the `spec` patches in order to the input
//! [`SpecSnapshot`] yields the snapshot a later run resumes from.

// ============================================================================
// Stable Public API
// ============================================================================

pub use hwforge_config::{CliArgs, Config, ConfigSource, OrchestratorSettings};
pub use hwforge_utils::error::{HwforgeError, UserFriendlyError};
pub use hwforge_utils::exit_codes::ExitCode;
pub use hwforge_utils::types::{Mode, Stage};

pub use hwforge_blocks::{
    BlockCatalog, BlockDefinition, DrcCode, DrcResult, PlacedBlock, validate_block_combination,
};
pub use hwforge_llm::{LlmAdapter, LlmBackend, ScriptedBackend};
pub use hwforge_orchestrator::{
    AbortSignal, Decision, HistoryItem, HistoryType, InputReason, NodeId, Orchestrator,
    OrchestratorError, OrchestratorState, RunEvent, RunInput, RunOutcome, SpecPatch,
    SpecSnapshot, StageStatus, StateUpdate,
};

// ============================================================================
// Internal modules (not covered by semver)
// ============================================================================

#[doc(hidden)]
pub mod cli;

#[doc(hidden)]
pub use hwforge_blocks as blocks;
#[doc(hidden)]
pub use hwforge_llm as llm;
#[doc(hidden)]
pub use hwforge_orchestrator as orchestrator;
