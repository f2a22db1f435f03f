//! Node handlers
//!
//! A handler reads the state, may call the LLM once, and returns a
//! [`NodeOutcome`]. Handlers return `Result` internally; [`run_node`] turns
//! any error into `state.error` plus an `error` history item, so nothing
//! escapes the node boundary.

mod completion;
mod enclosure;
mod export;
mod firmware;
mod pcb;
mod review_loop;
mod spec;

use serde_json::json;
use tracing::{debug, warn};

use hwforge_config::OrchestratorSettings;
use hwforge_llm::{ChatRequest, LlmAdapter};
use hwforge_prompts::Prompt;
use hwforge_utils::redaction::redact_error_message;
use hwforge_utils::types::Stage;

use crate::decision::Decision;
use crate::error::OrchestratorError;
use crate::graph::NodeId;
use crate::history::HistoryItem;
use crate::state::{LoopStage, OrchestratorState, StateUpdate};

/// Shared, read-only dependencies of every node.
#[derive(Debug, Clone)]
pub struct NodeContext {
    pub llm: LlmAdapter,
    pub settings: OrchestratorSettings,
}

#[derive(Debug, Clone)]
pub struct NodeOutcome {
    pub update: StateUpdate,
    pub decision: Decision,
}

impl NodeOutcome {
    #[must_use]
    pub fn proceed(update: StateUpdate) -> Self {
        Self {
            update,
            decision: Decision::Continue,
        }
    }

    #[must_use]
    pub fn decided(update: StateUpdate, decision: Decision) -> Self {
        Self { update, decision }
    }

    /// Failed node: sets `error` and records it in history.
    #[must_use]
    pub fn failed(node: NodeId, stage: Stage, err: &OrchestratorError) -> Self {
        let message = redact_error_message(&err.to_string());
        let mut item = HistoryItem::error(stage, node.to_string(), message.clone());
        if err.is_parse_error() {
            item = item.with_details(json!({ "parseError": true }));
        }
        Self::proceed(StateUpdate {
            error: Some(message),
            ..StateUpdate::default().with_history(item)
        })
    }
}

/// Execute one node.
pub async fn run_node(node: NodeId, state: &OrchestratorState, ctx: &NodeContext) -> NodeOutcome {
    let result = match node {
        NodeId::AnalyzeFeasibility => spec::analyze_feasibility(state, ctx).await,
        NodeId::AnswerQuestions => spec::answer_questions(state, ctx),
        NodeId::GenerateBlueprints => spec::generate_blueprints(state, ctx).await,
        NodeId::SelectBlueprint => spec::select_blueprint(state),
        NodeId::GenerateNames => spec::generate_names(state, ctx).await,
        NodeId::SelectName => spec::select_name(state),
        NodeId::FinalizeSpec => spec::finalize_spec(state, ctx).await,
        NodeId::MarkSpecComplete => completion::mark_complete(state, Stage::Spec),
        NodeId::SelectBlocks => pcb::select_blocks(state, ctx).await,
        NodeId::ValidatePcb => pcb::validate_pcb(state),
        NodeId::MarkPcbComplete => completion::mark_complete(state, Stage::Pcb),
        NodeId::GenerateEnclosure => enclosure::generate(state, ctx).await,
        NodeId::ReviewEnclosure => enclosure::review(state, ctx).await,
        NodeId::DecideEnclosure => review_loop::decide_node(state, ctx, LoopStage::Enclosure),
        NodeId::AcceptEnclosure => review_loop::accept_node(state, LoopStage::Enclosure),
        NodeId::MarkEnclosureComplete => completion::mark_complete(state, Stage::Enclosure),
        NodeId::GenerateFirmware => firmware::generate(state, ctx).await,
        NodeId::ReviewFirmware => firmware::review(state, ctx).await,
        NodeId::DecideFirmware => review_loop::decide_node(state, ctx, LoopStage::Firmware),
        NodeId::AcceptFirmware => review_loop::accept_node(state, LoopStage::Firmware),
        NodeId::MarkFirmwareComplete => completion::mark_complete(state, Stage::Firmware),
        NodeId::BuildExport => export::build_export(state),
        NodeId::MarkExportComplete => completion::mark_complete(state, Stage::Export),
        NodeId::RequestUserInput => completion::request_user_input(state),
    };

    result.unwrap_or_else(|err| {
        warn!(node = %node, error = %redact_error_message(&err.to_string()), "Node failed");
        NodeOutcome::failed(node, node.stage(state), &err)
    })
}

/// One LLM exchange for `stage`; returns the reply text.
async fn ask(
    ctx: &NodeContext,
    state: &OrchestratorState,
    stage: Stage,
    prompt: Prompt,
    temperature: Option<f32>,
) -> Result<String, OrchestratorError> {
    let mut request = ChatRequest::new(state.project_id.clone(), stage, prompt.system, prompt.user);
    if let Some(temperature) = temperature {
        request = request.with_temperature(temperature);
    }
    let response = ctx.llm.chat(request).await?;
    debug!(
        provider = %response.provider,
        model = %response.model,
        chars = response.content.len(),
        "LLM reply received"
    );
    Ok(response.content)
}

/// Unwrap a required upstream artifact or fail with a precondition error.
fn require<'a, T>(
    value: Option<&'a T>,
    node: NodeId,
    missing: &'static str,
) -> Result<&'a T, OrchestratorError> {
    value.ok_or(OrchestratorError::Precondition { node, missing })
}
