//! Runs the graph from a prepared state and streams progress events

use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, Instrument};

use hwforge_config::OrchestratorSettings;
use hwforge_llm::LlmAdapter;
use hwforge_utils::logging::{node_span, run_span};
use hwforge_utils::types::Stage;

use crate::artifacts::InputReason;
use crate::error::OrchestratorError;
use crate::graph::{create_orchestrator_graph, NodeId, OrchestratorGraph, Target};
use crate::history::HistoryItem;
use crate::nodes::{run_node, NodeContext};
use crate::prepare::{prepare_initial_state, RunInput};
use crate::snapshot::SpecPatch;
use crate::state::{OrchestratorState, StateUpdate};

/// Cooperative cancellation flag, checked between nodes.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a run that did not error ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed {
        #[serde(rename = "productName", skip_serializing_if = "Option::is_none")]
        product_name: Option<String>,
    },
    Rejected {
        reason: String,
        #[serde(rename = "suggestedRevisions")]
        suggested_revisions: Vec<String>,
    },
    NeedsInput {
        stage: Stage,
        reason: InputReason,
    },
}

impl RunOutcome {
    /// Outcome implied by a finished state; `None` if the state carries an error.
    #[must_use]
    pub fn from_state(state: &OrchestratorState) -> Option<Self> {
        if state.error.is_some() {
            return None;
        }
        if let Some(rejection) = &state.rejection {
            return Some(Self::Rejected {
                reason: rejection.reason.clone(),
                suggested_revisions: rejection.suggested_revisions.clone(),
            });
        }
        if let Some(needs) = state.needs_input {
            return Some(Self::NeedsInput {
                stage: needs.stage,
                reason: needs.reason,
            });
        }
        Some(Self::Completed {
            product_name: state.product_name.clone(),
        })
    }
}

/// One item of the progress stream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// A node ran; `data` is the update it produced.
    State { node: NodeId, data: StateUpdate },
    /// Persistable change to the project spec.
    Spec { data: SpecPatch },
    Complete { data: RunOutcome },
    Error { error: String },
}

impl RunEvent {
    /// `complete` and `error` end the stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }
}

/// Executes runs against one LLM adapter and one set of limits.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    graph: OrchestratorGraph,
    ctx: NodeContext,
}

impl Orchestrator {
    #[must_use]
    pub fn new(llm: LlmAdapter, settings: OrchestratorSettings) -> Self {
        Self {
            graph: create_orchestrator_graph(),
            ctx: NodeContext { llm, settings },
        }
    }

    /// Run (or resume) a project until it completes, is rejected, pauses for
    /// input, fails, or is aborted.
    ///
    /// Events are sent as they happen; the last one is always `complete` or
    /// `error`. A closed receiver does not stop the run.
    ///
    /// # Errors
    ///
    /// Only `OrchestratorError::InvalidInput`. Every failure after the run
    /// starts is reported through the final state and an `error` event.
    pub async fn run(
        &self,
        input: RunInput,
        abort: &AbortSignal,
        events: &mpsc::Sender<RunEvent>,
    ) -> Result<OrchestratorState, OrchestratorError> {
        input.validate()?;
        let span = run_span(&input.project_id, input.mode.as_str());
        self.drive(input, abort, events).instrument(span).await
    }

    async fn drive(
        &self,
        input: RunInput,
        abort: &AbortSignal,
        events: &mpsc::Sender<RunEvent>,
    ) -> Result<OrchestratorState, OrchestratorError> {
        let mut state = prepare_initial_state(&input);
        info!(
            stage = %state.current_stage,
            completed = state.completed_stages.len(),
            "Run started"
        );

        let mut target = self.graph.entry_for(&state);
        if matches!(target, Target::Node(_)) {
            emit(events, RunEvent::Spec {
                data: SpecPatch::started(state.current_stage),
            })
            .await;
        }

        while let Target::Node(node) = target {
            if abort.is_aborted() {
                let err = OrchestratorError::Aborted;
                let stage = node.stage(&state);
                let update = StateUpdate {
                    error: Some(err.to_string()),
                    ..StateUpdate::default().with_history(HistoryItem::error(
                        stage,
                        node.to_string(),
                        err.to_string(),
                    ))
                };
                state.apply(update);
                info!(node = %node, "Run aborted before node");
                break;
            }

            state.iterations += 1;
            let span = node_span(&state.project_id, node.into(), node.stage(&state).as_str());
            let outcome = run_node(node, &state, &self.ctx).instrument(span).await;

            let patch = SpecPatch::from_update(&outcome.update, Utc::now());
            state.apply(outcome.update.clone());
            emit(events, RunEvent::State {
                node,
                data: outcome.update,
            })
            .await;
            if let Some(patch) = patch {
                emit(events, RunEvent::Spec { data: patch }).await;
            }

            target = self.graph.next(node, outcome.decision, &state);
        }

        match RunOutcome::from_state(&state) {
            Some(outcome) => {
                info!(outcome = ?outcome, iterations = state.iterations, "Run finished");
                emit(events, RunEvent::Complete { data: outcome }).await;
            }
            None => {
                let message = state.error.clone().unwrap_or_default();
                error!(error = %message, "Run ended with an error");
                emit(events, RunEvent::Error { error: message }).await;
            }
        }

        Ok(state)
    }
}

async fn emit(events: &mpsc::Sender<RunEvent>, event: RunEvent) {
    // A dropped receiver only means nobody is listening.
    let _ = events.send(event).await;
}
