//! Spec-stage prompts: feasibility, blueprints, naming, and the final spec

use serde_json::Value;

use crate::{pretty, Prompt};

const FEASIBILITY_SYSTEM: &str = r#"You are a senior hardware product engineer reviewing a product idea for manufacturability with off-the-shelf modules (one microcontroller, a power block, sensors, displays, actuators, radios) on a small modular PCB and a 3D-printed enclosure.

Decide whether the idea can be built with these constraints. Do not reject ideas only because they are ambitious; reject them when they need parts outside this envelope (custom silicon, FPGAs, high voltage, RF above 6 GHz, medical certification, and so on).

List the open questions a designer would need answered, each with two to four concrete options, most sensible option first.

Respond with JSON only:
{
  "manufacturable": true,
  "summary": "one paragraph assessment",
  "complexity": "low | medium | high",
  "risks": ["..."],
  "rejectionReason": null,
  "suggestedRevisions": [],
  "openQuestions": [
    {"id": "q1", "question": "...", "options": ["...", "..."]}
  ]
}
When not manufacturable, set "manufacturable": false, explain why in "rejectionReason", and offer "suggestedRevisions" that would make it buildable."#;

/// Manufacturability analysis of the raw description.
#[must_use]
pub fn feasibility(description: &str) -> Prompt {
    Prompt::new(
        FEASIBILITY_SYSTEM,
        format!("# Product idea\n\n{}", description.trim()),
    )
}

const BLUEPRINTS_SYSTEM: &str = r#"You are an industrial designer. Propose three distinct visual blueprints for the product: different form factors, mounting styles or interaction models, all buildable with the stated constraints.

Respond with JSON only:
{
  "blueprints": [
    {"id": "b1", "name": "short title", "description": "form factor, size, materials, how the user interacts", "style": "one or two words"}
  ]
}"#;

/// Candidate visual concepts, informed by feasibility and answered questions.
#[must_use]
pub fn blueprints(description: &str, feasibility: &Value, decisions: &Value) -> Prompt {
    Prompt::new(
        BLUEPRINTS_SYSTEM,
        format!(
            "# Product idea\n\n{}\n\n# Feasibility analysis\n\n{}\n\n# Design decisions\n\n{}",
            description.trim(),
            pretty(feasibility),
            pretty(decisions)
        ),
    )
}

const NAMES_SYSTEM: &str = r#"You are a product naming specialist. Suggest five short, pronounceable product names that fit the chosen design. Avoid existing trademarks you know of.

Respond with JSON only:
{
  "names": [
    {"name": "...", "rationale": "why it fits"}
  ]
}"#;

#[must_use]
pub fn names(description: &str, blueprint: &Value) -> Prompt {
    Prompt::new(
        NAMES_SYSTEM,
        format!(
            "# Product idea\n\n{}\n\n# Selected blueprint\n\n{}",
            description.trim(),
            pretty(blueprint)
        ),
    )
}

const FINAL_SPEC_SYSTEM: &str = r#"You are a hardware systems engineer writing the final product specification that the PCB, enclosure and firmware teams will build from. Be concrete: give numbers with units wherever possible.

Respond with a single JSON object:
{
  "productName": "...",
  "summary": "...",
  "requirements": ["functional requirement", "..."],
  "inputs": ["sensors, buttons, ..."],
  "outputs": ["displays, LEDs, actuators, ..."],
  "connectivity": ["wifi", "ble", "..."],
  "power": {"source": "usb | battery", "targetRuntimeHours": 0},
  "enclosure": {"maxDimensionsMm": [0, 0, 0], "mounting": "...", "material": "PLA | PETG | ..."},
  "firmware": {"platform": "arduino | esp-idf | pico-sdk", "behaviors": ["..."]}
}"#;

/// Consolidated spec from every upstream spec-stage artifact.
#[must_use]
pub fn final_spec(
    description: &str,
    feasibility: &Value,
    decisions: &Value,
    blueprint: &Value,
    product_name: &str,
) -> Prompt {
    Prompt::new(
        FINAL_SPEC_SYSTEM,
        format!(
            "# Product name\n\n{product_name}\n\n# Product idea\n\n{}\n\n# Feasibility analysis\n\n{}\n\n# Design decisions\n\n{}\n\n# Selected blueprint\n\n{}",
            description.trim(),
            pretty(feasibility),
            pretty(decisions),
            pretty(blueprint)
        ),
    )
}
