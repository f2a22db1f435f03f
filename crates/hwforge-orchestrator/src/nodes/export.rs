//! Export stage: manifest assembly for manufacturing hand-off

use chrono::Utc;
use serde_json::json;
use std::collections::BTreeMap;

use hwforge_utils::types::Stage;

use super::{require, NodeOutcome};
use crate::artifacts::{BomLine, ExportFile, ExportManifest};
use crate::error::OrchestratorError;
use crate::graph::NodeId;
use crate::history::HistoryItem;
use crate::state::{OrchestratorState, StateUpdate};

fn export_file(path: impl Into<String>, content: &str) -> ExportFile {
    ExportFile {
        path: path.into(),
        bytes: content.len(),
        blake3: blake3::hash(content.as_bytes()).to_hex().to_string(),
    }
}

pub(super) fn build_export(state: &OrchestratorState) -> Result<NodeOutcome, OrchestratorError> {
    let node = NodeId::BuildExport;
    let final_spec = require(state.final_spec.as_ref(), node, "a final spec")?;
    let pcb = require(state.pcb.as_ref(), node, "a placed PCB")?;
    let enclosure = require(state.enclosure.as_ref(), node, "an accepted enclosure")?;
    let firmware = require(state.firmware.as_ref(), node, "accepted firmware")?;

    let product_name = state
        .product_name
        .clone()
        .or_else(|| {
            final_spec
                .get("productName")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| state.project_id.clone());

    let mut quantities: BTreeMap<&str, u32> = BTreeMap::new();
    for placed in &pcb.placed_blocks {
        *quantities.entry(placed.block_slug.as_str()).or_default() += 1;
    }
    let bom = quantities
        .into_iter()
        .map(|(slug, quantity)| {
            let block = state.available_blocks.iter().find(|b| b.slug == slug);
            BomLine {
                block_slug: slug.to_string(),
                name: block.map_or_else(|| slug.to_string(), |b| b.name.clone()),
                category: block.map_or_else(String::new, |b| b.category.to_string()),
                quantity,
            }
        })
        .collect::<Vec<_>>();

    let mut files = vec![
        export_file("spec/final_spec.json", &serde_json::to_string_pretty(final_spec)?),
        export_file("pcb/netlist.json", &serde_json::to_string_pretty(&pcb.net_list)?),
        export_file("enclosure/enclosure.scad", &enclosure.open_scad_code),
    ];
    files.extend(
        firmware
            .files
            .iter()
            .map(|f| export_file(format!("firmware/{}", f.path), &f.content)),
    );

    let manifest = ExportManifest {
        product_name,
        generated_at: Utc::now(),
        board_size: pcb.board_size,
        bom,
        files,
    };

    let item = HistoryItem::tool_result(Stage::Export, node.to_string())
        .with_result(format!(
            "Manifest for {} with {} files",
            manifest.product_name,
            manifest.files.len()
        ))
        .with_details(json!({ "bomLines": manifest.bom.len() }));
    Ok(NodeOutcome::proceed(StateUpdate {
        export: Some(manifest),
        ..StateUpdate::default().with_history(item)
    }))
}
