//! Enclosure loop: OpenSCAD generation and review

use serde_json::json;
use tracing::info;

use hwforge_llm::extraction::extract_code_block;
use hwforge_prompts as prompts;
use hwforge_utils::types::Stage;

use super::review_loop::review_node;
use super::{ask, require, NodeContext, NodeOutcome};
use crate::artifacts::EnclosureArtifact;
use crate::error::OrchestratorError;
use crate::graph::NodeId;
use crate::history::HistoryItem;
use crate::state::{LoopStage, LoopUpdate, OrchestratorState, StateUpdate};

pub(super) async fn generate(
    state: &OrchestratorState,
    ctx: &NodeContext,
) -> Result<NodeOutcome, OrchestratorError> {
    let node = NodeId::GenerateEnclosure;
    let final_spec = require(state.final_spec.as_ref(), node, "a final spec")?;
    let pcb = require(state.pcb.as_ref(), node, "a placed PCB")?;
    let feedback = state.enclosure_loop.feedback.as_deref();

    let prompt = prompts::enclosure(final_spec, &serde_json::to_value(pcb)?, feedback);
    let reply = ask(ctx, state, Stage::Enclosure, prompt, None).await?;
    let code = extract_code_block(&reply, Some("openscad")).ok_or(OrchestratorError::Parse {
        node,
        what: "OpenSCAD code",
    })?;

    let attempt = state.enclosure_loop.attempts + 1;
    info!(attempt, bytes = code.len(), revision = feedback.is_some(), "Enclosure generated");

    let item = HistoryItem::tool_result(Stage::Enclosure, node.to_string())
        .with_result(format!("Attempt {attempt}: {} bytes of OpenSCAD", code.len()))
        .with_details(json!({ "attempt": attempt, "revision": feedback.is_some() }));
    Ok(NodeOutcome::proceed(StateUpdate {
        enclosure: Some(EnclosureArtifact {
            open_scad_code: code,
            iterations: attempt,
        }),
        enclosure_loop: LoopUpdate {
            attempts: Some(attempt),
            review: Some(None),
            feedback: Some(None),
        },
        ..StateUpdate::default().with_history(item)
    }))
}

pub(super) async fn review(
    state: &OrchestratorState,
    ctx: &NodeContext,
) -> Result<NodeOutcome, OrchestratorError> {
    let node = NodeId::ReviewEnclosure;
    let enclosure = require(state.enclosure.as_ref(), node, "generated enclosure code")?;
    let final_spec = require(state.final_spec.as_ref(), node, "a final spec")?;
    let pcb = require(state.pcb.as_ref(), node, "a placed PCB")?;

    let prompt = prompts::enclosure_review(
        final_spec,
        &serde_json::to_value(pcb.board_size)?,
        &enclosure.open_scad_code,
    );
    review_node(state, ctx, LoopStage::Enclosure, prompt).await
}
