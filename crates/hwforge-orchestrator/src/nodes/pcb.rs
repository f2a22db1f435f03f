//! PCB-stage nodes: block selection and the deterministic board check

use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use hwforge_blocks::{
    auto_place, board_size, derive_net_list, find_overlaps, known_i2c_address,
    validate_block_combination, BlockDefinition, DEFAULT_GRID_COLUMNS,
};
use hwforge_llm::extraction::parse_json;
use hwforge_prompts as prompts;
use hwforge_utils::types::Stage;

use super::{ask, require, NodeContext, NodeOutcome};
use crate::artifacts::{PcbArtifact, SchematicComponent};
use crate::error::OrchestratorError;
use crate::graph::NodeId;
use crate::history::HistoryItem;
use crate::state::{OrchestratorState, StateUpdate};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SelectionReply {
    Wrapped {
        blocks: Vec<String>,
        #[serde(default)]
        rationale: Option<String>,
    },
    Bare(Vec<String>),
}

pub(super) async fn select_blocks(
    state: &OrchestratorState,
    ctx: &NodeContext,
) -> Result<NodeOutcome, OrchestratorError> {
    let node = NodeId::SelectBlocks;
    let final_spec = require(state.final_spec.as_ref(), node, "a final spec")?;
    if state.available_blocks.is_empty() {
        return Err(OrchestratorError::Precondition {
            node,
            missing: "a block catalog",
        });
    }

    let prompt = prompts::block_selection(final_spec, &state.available_blocks);
    let reply = ask(ctx, state, Stage::Pcb, prompt, None).await?;

    let mut history = Vec::new();
    let (chosen, rationale) = match parse_json::<SelectionReply>(&reply) {
        Some(SelectionReply::Wrapped { blocks, rationale }) => (blocks, rationale),
        Some(SelectionReply::Bare(blocks)) => (blocks, None),
        None => (Vec::new(), None),
    };

    let mut selected = resolve_slugs(&state.available_blocks, &chosen);
    if selected.is_empty() {
        selected = heuristic_selection(&state.available_blocks, final_spec);
        history.push(HistoryItem::parse_fallback(
            Stage::Pcb,
            node.to_string(),
            "Block selection unreadable; used keyword heuristic",
        ));
    }

    let placed = auto_place(&selected, DEFAULT_GRID_COLUMNS);
    let schematic_data = placed
        .iter()
        .zip(&selected)
        .enumerate()
        .map(|(i, (p, block))| SchematicComponent {
            reference: format!("B{}", i + 1),
            block_slug: p.block_slug.clone(),
            name: block.name.clone(),
            category: block.category.to_string(),
        })
        .collect();
    let pcb = PcbArtifact {
        board_size: board_size(&placed),
        net_list: derive_net_list(&selected),
        placed_blocks: placed,
        schematic_data,
    };

    debug!(blocks = pcb.placed_blocks.len(), "Blocks placed");
    history.push(
        HistoryItem::tool_result(Stage::Pcb, node.to_string())
            .with_result(format!(
                "Placed {} blocks on a {:.1} x {:.1} mm board",
                pcb.placed_blocks.len(),
                pcb.board_size.width_mm,
                pcb.board_size.height_mm
            ))
            .with_details(json!({
                "blocks": pcb.placed_blocks.iter().map(|p| p.block_slug.as_str()).collect::<Vec<_>>(),
                "rationale": rationale,
            })),
    );

    Ok(NodeOutcome::proceed(StateUpdate {
        pcb: Some(pcb),
        history,
        ..StateUpdate::default()
    }))
}

/// Catalog entries for `slugs`, in order, skipping unknown and repeated slugs.
fn resolve_slugs<'a>(catalog: &'a [BlockDefinition], slugs: &[String]) -> Vec<&'a BlockDefinition> {
    let mut out: Vec<&BlockDefinition> = Vec::new();
    for slug in slugs {
        match catalog.iter().find(|b| b.slug == *slug) {
            Some(block) if !out.iter().any(|b| b.slug == block.slug) => out.push(block),
            Some(_) => {}
            None => warn!(slug = %slug, "Model chose a block that is not in the catalog"),
        }
    }
    out
}

/// First MCU, first power block, then any block whose slug words appear in the final spec.
fn heuristic_selection<'a>(catalog: &'a [BlockDefinition], final_spec: &Value) -> Vec<&'a BlockDefinition> {
    let text = final_spec.to_string().to_ascii_lowercase();
    let mut out: Vec<&BlockDefinition> = Vec::new();

    out.extend(catalog.iter().find(|b| b.is_mcu()));
    out.extend(catalog.iter().find(|b| b.is_power()));

    for block in catalog.iter().filter(|b| !b.is_mcu() && !b.is_power()) {
        let mentioned = block
            .slug
            .split('-')
            .filter(|word| word.len() >= 3)
            .any(|word| text.contains(word));
        if mentioned {
            out.push(block);
        }
    }
    out
}

/// Structural board check. Reports in history only; never fails the run.
pub(super) fn validate_pcb(state: &OrchestratorState) -> Result<NodeOutcome, OrchestratorError> {
    let node = NodeId::ValidatePcb;
    let pcb = require(state.pcb.as_ref(), node, "a placed PCB")?;

    let blocks: Vec<&BlockDefinition> = pcb
        .placed_blocks
        .iter()
        .filter_map(|p| state.available_blocks.iter().find(|b| b.slug == p.block_slug))
        .collect();

    let mut issues: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    let mcu_count = blocks.iter().filter(|b| b.is_mcu()).count();
    if mcu_count != 1 {
        issues.push(format!("Expected exactly one MCU block, found {mcu_count}"));
    }
    if !blocks.iter().any(|b| b.is_power()) {
        issues.push("No power block".to_string());
    }
    for (a, b) in find_overlaps(&pcb.placed_blocks) {
        issues.push(format!("Blocks {a} and {b} overlap"));
    }

    let mut by_address: BTreeMap<u8, Vec<&str>> = BTreeMap::new();
    for placed in &pcb.placed_blocks {
        if let Some(address) = known_i2c_address(&placed.block_slug) {
            by_address.entry(address).or_default().push(&placed.block_slug);
        }
    }
    for (address, slugs) in by_address.iter().filter(|(_, s)| s.len() > 1) {
        issues.push(format!(
            "I2C address 0x{address:02X} shared by {}",
            slugs.join(", ")
        ));
    }

    let drc = validate_block_combination(&blocks);
    warnings.extend(drc.warnings.iter().map(|w| format!("{}: {}", w.code, w.message)));
    for error in &drc.errors {
        let line = format!("{}: {}", error.code, error.message);
        if !issues.contains(&line) {
            issues.push(line);
        }
    }

    let valid = issues.is_empty();
    if !valid {
        warn!(issues = issues.len(), "PCB validation found issues");
    }
    let item = HistoryItem::validation(Stage::Pcb, node.to_string())
        .with_result(if valid {
            "PCB valid".to_string()
        } else {
            format!("{} issues", issues.len())
        })
        .with_details(json!({
            "valid": valid,
            "issues": issues,
            "warnings": warnings,
        }));

    Ok(NodeOutcome::proceed(StateUpdate::default().with_history(item)))
}
