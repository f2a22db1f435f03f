//! Firmware loop: file-list generation and review

use serde_json::{json, Value};
use tracing::{info, warn};

use hwforge_llm::extraction::{extract_code_block, first_fence_language, parse_json};
use hwforge_prompts as prompts;
use hwforge_utils::types::Stage;

use super::review_loop::review_node;
use super::{ask, require, NodeContext, NodeOutcome};
use crate::artifacts::{list_in, FirmwareArtifact, FirmwareFile};
use crate::error::OrchestratorError;
use crate::graph::NodeId;
use crate::history::HistoryItem;
use crate::state::{LoopStage, LoopUpdate, OrchestratorState, StateUpdate};

const FALLBACK_LANGUAGE: &str = "cpp";

/// Entry point path for a single untitled code block.
fn fallback_path(language: &str) -> &'static str {
    match language {
        "c" => "src/main.c",
        "python" | "py" | "micropython" => "main.py",
        "rust" | "rs" => "src/main.rs",
        _ => "src/main.cpp",
    }
}

pub(super) async fn generate(
    state: &OrchestratorState,
    ctx: &NodeContext,
) -> Result<NodeOutcome, OrchestratorError> {
    let node = NodeId::GenerateFirmware;
    let final_spec = require(state.final_spec.as_ref(), node, "a final spec")?;
    let pcb = require(state.pcb.as_ref(), node, "a placed PCB")?;
    let feedback = state.firmware_loop.feedback.as_deref();

    let prompt = prompts::firmware(final_spec, &serde_json::to_value(pcb)?, feedback);
    let reply = ask(ctx, state, Stage::Firmware, prompt, None).await?;

    let mut history = Vec::new();
    let files = match parse_files(&reply) {
        Some(files) => files,
        None => {
            warn!("Firmware reply is not a file list; wrapping the code block");
            let language =
                first_fence_language(&reply).unwrap_or_else(|| FALLBACK_LANGUAGE.to_string());
            let path = fallback_path(&language);
            let content = extract_code_block(&reply, Some(&language)).ok_or(
                OrchestratorError::Parse {
                    node,
                    what: "firmware files",
                },
            )?;
            history.push(HistoryItem::parse_fallback(
                Stage::Firmware,
                node.to_string(),
                format!("File list unreadable; wrote a single {path}"),
            ));
            vec![FirmwareFile {
                path: path.to_string(),
                content,
                language,
            }]
        }
    };

    let attempt = state.firmware_loop.attempts + 1;
    info!(attempt, files = files.len(), revision = feedback.is_some(), "Firmware generated");
    history.push(
        HistoryItem::tool_result(Stage::Firmware, node.to_string())
            .with_result(format!("Attempt {attempt}: {} files", files.len()))
            .with_details(json!({
                "attempt": attempt,
                "paths": files.iter().map(|f| f.path.as_str()).collect::<Vec<_>>(),
            })),
    );

    Ok(NodeOutcome::proceed(StateUpdate {
        firmware: Some(FirmwareArtifact {
            files,
            build_status: "pending".to_string(),
        }),
        firmware_loop: LoopUpdate {
            attempts: Some(attempt),
            review: Some(None),
            feedback: Some(None),
        },
        history,
        ..StateUpdate::default()
    }))
}

/// Non-empty `files` list with a path on every entry.
fn parse_files(reply: &str) -> Option<Vec<FirmwareFile>> {
    let value: Value = parse_json(reply)?;
    let files: Vec<FirmwareFile> = serde_json::from_value(list_in(&value, "files")?).ok()?;
    let files: Vec<FirmwareFile> = files
        .into_iter()
        .filter(|f| !f.path.trim().is_empty())
        .collect();
    (!files.is_empty()).then_some(files)
}

pub(super) async fn review(
    state: &OrchestratorState,
    ctx: &NodeContext,
) -> Result<NodeOutcome, OrchestratorError> {
    let node = NodeId::ReviewFirmware;
    let firmware = state
        .firmware
        .as_ref()
        .filter(|f| !f.files.is_empty());
    let firmware = require(firmware, node, "generated firmware files")?;
    let final_spec = require(state.final_spec.as_ref(), node, "a final spec")?;
    let pcb = require(state.pcb.as_ref(), node, "a placed PCB")?;

    let prompt = prompts::firmware_review(
        final_spec,
        &serde_json::to_value(&pcb.net_list)?,
        &serde_json::to_value(&firmware.files)?,
    );
    review_node(state, ctx, LoopStage::Firmware, prompt).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::PcbArtifact;
    use crate::nodes::test_support::{context, state};
    use hwforge_blocks::{BoardSize, Net};
    use hwforge_llm::ScriptedBackend;
    use hwforge_utils::types::Mode;

    fn ready() -> OrchestratorState {
        let mut s = state(Mode::VibeIt);
        s.final_spec = Some(json!({"productName": "Tocka"}));
        s.pcb = Some(PcbArtifact {
            placed_blocks: Vec::new(),
            board_size: BoardSize {
                width_mm: 29.4,
                height_mm: 29.4,
            },
            net_list: vec![Net {
                name: "I2C".to_string(),
                members: vec!["esp32-devkit".to_string(), "bme280".to_string()],
            }],
            schematic_data: Vec::new(),
        });
        s
    }

    #[tokio::test]
    async fn test_parses_file_list() {
        let backend = ScriptedBackend::from_responses([r##"{"files": [
            {"path": "src/main.cpp", "content": "void setup() {}\nvoid loop() {}", "language": "cpp"},
            {"path": "include/pins.h", "content": "#define SDA 21"}
        ]}"##]);
        let outcome = generate(&ready(), &context(&backend)).await.unwrap();

        let firmware = outcome.update.firmware.unwrap();
        assert_eq!(firmware.files.len(), 2);
        assert_eq!(firmware.files[1].language, "cpp");
        assert_eq!(firmware.build_status, "pending");
        assert_eq!(outcome.update.firmware_loop.attempts, Some(1));
        assert!(!outcome.update.history[0].is_parse_error());
    }

    #[tokio::test]
    async fn test_single_code_block_falls_back_to_main_cpp() {
        let backend = ScriptedBackend::from_responses([
            "Here you go:\n```cpp\nvoid setup() {}\nvoid loop() {}\n```\nEnjoy!",
        ]);
        let outcome = generate(&ready(), &context(&backend)).await.unwrap();

        let files = outcome.update.firmware.unwrap().files;
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "src/main.cpp");
        assert_eq!(files[0].language, "cpp");
        assert_eq!(files[0].content, "void setup() {}\nvoid loop() {}");
        assert!(outcome.update.history[0].is_parse_error());
    }

    #[tokio::test]
    async fn test_code_block_fallback_keeps_fence_language() {
        let backend = ScriptedBackend::from_responses([
            "MicroPython version:\n```python\nfrom machine import I2C\n```",
        ]);
        let outcome = generate(&ready(), &context(&backend)).await.unwrap();

        let files = outcome.update.firmware.unwrap().files;
        assert_eq!(files[0].path, "main.py");
        assert_eq!(files[0].language, "python");
        assert_eq!(files[0].content, "from machine import I2C");
    }

    #[tokio::test]
    async fn test_review_embeds_net_list() {
        let backend = ScriptedBackend::from_responses([r#"{"score": 88, "verdict": "accept"}"#]);
        let mut s = ready();
        s.firmware = Some(FirmwareArtifact {
            files: vec![FirmwareFile {
                path: "src/main.cpp".to_string(),
                content: "int x;".to_string(),
                language: "cpp".to_string(),
            }],
            build_status: "pending".to_string(),
        });

        review(&s, &context(&backend)).await.unwrap();

        let sent = &backend.invocations()[0].messages[1].content;
        assert!(sent.contains("bme280"));
        assert!(sent.contains("int x;"));
    }

    #[tokio::test]
    async fn test_review_without_files_is_precondition_error() {
        let backend = ScriptedBackend::new();
        let mut s = ready();
        s.firmware = Some(FirmwareArtifact {
            files: Vec::new(),
            build_status: "pending".to_string(),
        });
        assert!(matches!(
            review(&s, &context(&backend)).await,
            Err(OrchestratorError::Precondition { .. })
        ));
    }
}
