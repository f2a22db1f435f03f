//! Shared fixtures for the pipeline integration tests
//!
//! Responses are listed in the order the pipeline asks for them:
//! feasibility, blueprints, names, final spec, block selection, then the
//! enclosure and firmware generate/review pairs.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use hwforge::{
    AbortSignal, BlockCatalog, LlmAdapter, Mode, Orchestrator, OrchestratorSettings,
    OrchestratorState, RunEvent, RunInput, ScriptedBackend, SpecSnapshot,
};
use tokio::sync::mpsc;

pub const FEASIBLE: &str = r#"{
  "manufacturable": true,
  "summary": "A small desk clock built from stock blocks",
  "complexity": "low",
  "risks": ["Display glare"],
  "openQuestions": []
}"#;

pub const FEASIBLE_WITH_QUESTION: &str = r#"{
  "manufacturable": true,
  "summary": "A small desk clock built from stock blocks",
  "openQuestions": [
    {"id": "q1", "question": "USB or battery power?", "options": ["USB", "Battery"]}
  ]
}"#;

pub const BLUEPRINTS: &str = r#"Here are three directions:
```json
{"blueprints": [
  {"name": "Minimal Cube", "description": "Matte cube with an OLED face", "style": "minimal"},
  {"name": "Retro Radio", "description": "Rounded wooden shell", "style": "retro"}
]}
```"#;

pub const NAMES: &str = r#"{"names": [{"name": "Tickle", "rationale": "Short and friendly"}, {"name": "Cubeclock"}]}"#;

pub const FINAL_SPEC: &str = r#"{
  "summary": "Desk clock with an OLED display and a temperature sensor",
  "features": ["Time display", "Temperature readout"],
  "power": "USB-C"
}"#;

pub const BLOCKS: &str =
    r#"{"blocks": ["esp32-devkit", "usb-c-power", "ssd1306-oled", "bme280"], "rationale": "Display plus sensor"}"#;

pub const ENCLOSURE: &str = "```openscad\ndifference() { cube([60, 40, 30]); translate([2, 2, 2]) cube([56, 36, 30]); }\n```";

pub const FIRMWARE: &str = r##"{"files": [
  {"path": "src/main.cpp", "content": "#include <Wire.h>\nvoid setup() {}\nvoid loop() {}\n", "language": "cpp"},
  {"path": "platformio.ini", "content": "[env:esp32]\nplatform = espressif32\n", "language": "ini"}
]}"##;

/// A review reply in the shape the review prompts ask for.
pub fn review(score: u8, verdict: &str) -> String {
    format!(
        r#"{{"score": {score}, "verdict": "{verdict}", "issues": [{{"severity": "major", "description": "Wall too thin", "suggestion": "Use 2mm walls"}}], "positives": ["Compact"], "summary": "Reviewed"}}"#
    )
}

/// Replies that take a fresh run through the spec and pcb stages.
pub fn through_pcb() -> Vec<String> {
    [FEASIBLE, BLUEPRINTS, NAMES, FINAL_SPEC, BLOCKS]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Replies for a fresh run that is accepted first time in every loop.
pub fn happy_path() -> Vec<String> {
    let mut responses = through_pcb();
    responses.extend([
        ENCLOSURE.to_string(),
        review(92, "accept"),
        FIRMWARE.to_string(),
        review(88, "accept"),
    ]);
    responses
}

pub fn orchestrator(backend: &ScriptedBackend) -> Orchestrator {
    orchestrator_with(backend, OrchestratorSettings::default())
}

pub fn orchestrator_with(backend: &ScriptedBackend, settings: OrchestratorSettings) -> Orchestrator {
    let llm = LlmAdapter::new(Arc::new(backend.clone()), "", Duration::from_secs(5));
    Orchestrator::new(llm, settings)
}

pub fn input(mode: Mode, existing_spec: Option<SpecSnapshot>) -> RunInput {
    RunInput {
        project_id: "desk-clock".to_string(),
        mode,
        description: "A desk clock that shows the time and room temperature".to_string(),
        available_blocks: BlockCatalog::builtin().unwrap().into_blocks(),
        existing_spec,
    }
}

/// Run to the end and return the final state with every event sent.
pub async fn run_collect(
    orchestrator: &Orchestrator,
    input: RunInput,
    abort: &AbortSignal,
) -> (OrchestratorState, Vec<RunEvent>) {
    let (tx, mut rx) = mpsc::channel(1024);
    let state = orchestrator.run(input, abort, &tx).await.unwrap();
    drop(tx);

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    (state, events)
}

/// Fold the `spec` events of a run onto `base`.
pub fn snapshot_from(events: &[RunEvent], base: SpecSnapshot) -> SpecSnapshot {
    let mut snapshot = base;
    for event in events {
        if let RunEvent::Spec { data } = event {
            snapshot.apply_patch(data.clone());
        }
    }
    snapshot
}

/// Number of LLM calls made for `stage`.
pub fn calls_for(backend: &ScriptedBackend, stage: &str) -> usize {
    backend
        .invocations()
        .iter()
        .filter(|call| call.stage == stage)
        .count()
}
