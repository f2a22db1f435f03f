//! The hwforge pipeline orchestrator
//!
//! A run drives one hardware project through five forward-only stages
//! (spec, pcb, enclosure, firmware, export). The enclosure and firmware
//! stages are generate/review/decide loops: a review scoring at least the
//! accept threshold, or carrying an `accept` verdict, ends the loop; a loop
//! that runs out of attempts pauses for human input; a global iteration cap
//! stops any run that has gone on too long.
//!
//! The graph is an explicit transition table ([`graph`]) executed one node
//! at a time by [`Orchestrator::run`]. Nodes never mutate state; they return
//! a [`StateUpdate`] that the driver merges, then a [`RunEvent`] is sent for
//! each step.
//!
//! ```ignore
//! let orchestrator = Orchestrator::new(LlmAdapter::from_config(&config)?, config.orchestrator);
//! let (tx, mut rx) = tokio::sync::mpsc::channel(64);
//! let state = orchestrator.run(input, &AbortSignal::new(), &tx).await?;
//! ```

pub mod artifacts;
pub mod decision;
mod driver;
mod error;
pub mod graph;
pub mod history;
mod nodes;
mod prepare;
pub mod snapshot;
pub mod state;

pub use artifacts::{InputReason, NeedsInput, Rejection, ReviewResult, Verdict};
pub use decision::{decide, Decision, ReviewLimits};
pub use driver::{AbortSignal, Orchestrator, RunEvent, RunOutcome};
pub use error::OrchestratorError;
pub use graph::{create_orchestrator_graph, NodeId, OrchestratorGraph, Target};
pub use history::{HistoryItem, HistoryType};
pub use nodes::{run_node, NodeContext, NodeOutcome};
pub use prepare::{prepare_initial_state, RunInput};
pub use snapshot::{SpecPatch, SpecSnapshot, StageRecord, StageStatus};
pub use state::{LoopStage, LoopState, LoopUpdate, OrchestratorState, StateUpdate};
