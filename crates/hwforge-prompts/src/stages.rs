//! Generation prompts for the PCB, enclosure, and firmware stages

use hwforge_blocks::BlockDefinition;
use serde_json::Value;

use crate::{pretty, with_feedback, Prompt};

const BLOCK_SELECTION_SYSTEM: &str = r#"You are a PCB integration engineer assembling a board from a fixed catalog of prefabricated blocks. Choose the smallest set of blocks that satisfies the specification: exactly one microcontroller, at least one power block, and the peripherals the requirements call for. Only use slugs from the catalog.

Respond with JSON only:
{"blocks": ["slug", "..."], "rationale": "one paragraph"}"#;

/// Catalog-constrained block choice for the final spec.
#[must_use]
pub fn block_selection(final_spec: &Value, catalog: &[BlockDefinition]) -> Prompt {
    let mut listing = String::new();
    for block in catalog {
        listing.push_str(&format!(
            "- {} ({}, {}x{} units): {}\n",
            block.slug, block.category, block.width_units, block.height_units, block.name
        ));
        if !block.description.is_empty() {
            listing.push_str(&format!("  {}\n", block.description));
        }
    }

    Prompt::new(
        BLOCK_SELECTION_SYSTEM,
        format!(
            "# Specification\n\n{}\n\n# Block catalog\n\n{listing}",
            pretty(final_spec)
        ),
    )
}

const ENCLOSURE_SYSTEM: &str = r"You are a mechanical designer writing parametric OpenSCAD for a 3D-printed enclosure. The enclosure must hold the PCB described below with at least 2 mm clearance, expose every connector, display and button the specification needs, and print without supports where possible.

Use named parameters at the top of the file, 2 mm minimum wall thickness, and modules for the base and the lid.

Respond with a single ```openscad fenced code block and nothing else.";

/// OpenSCAD enclosure around the placed PCB.
#[must_use]
pub fn enclosure(final_spec: &Value, pcb: &Value, feedback: Option<&str>) -> Prompt {
    let user = format!(
        "# Specification\n\n{}\n\n# PCB\n\n{}",
        pretty(final_spec),
        pretty(pcb)
    );
    Prompt::new(ENCLOSURE_SYSTEM, with_feedback(user, feedback))
}

const FIRMWARE_SYSTEM: &str = r#"You are an embedded firmware engineer writing a compilable firmware scaffold (Arduino-style C++ unless the specification names another platform) for the board below. Initialise every block on its bus, implement the behaviours in the specification, and keep hardware pin numbers in one header.

Respond with JSON only:
{
  "files": [
    {"path": "src/main.cpp", "language": "cpp", "content": "..."},
    {"path": "include/pins.h", "language": "cpp", "content": "..."}
  ]
}"#;

/// Firmware scaffold for the placed blocks and their nets.
#[must_use]
pub fn firmware(final_spec: &Value, pcb: &Value, feedback: Option<&str>) -> Prompt {
    let user = format!(
        "# Specification\n\n{}\n\n# PCB (placed blocks and net list)\n\n{}",
        pretty(final_spec),
        pretty(pcb)
    );
    Prompt::new(FIRMWARE_SYSTEM, with_feedback(user, feedback))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hwforge_blocks::BlockCatalog;
    use serde_json::json;

    #[test]
    fn test_block_selection_lists_catalog() {
        let catalog = BlockCatalog::builtin().unwrap();
        let prompt = block_selection(&json!({"summary": "clock"}), catalog.blocks());
        assert!(prompt.user.contains("- esp32-devkit (mcu, 2x2 units)"));
        assert!(prompt.user.contains("Dual-core 240 MHz"));
    }

    #[test]
    fn test_enclosure_feedback_section() {
        let spec = json!({"summary": "clock"});
        let pcb = json!({"boardSize": {"widthMm": 54.8, "heightMm": 29.4}});

        let first = enclosure(&spec, &pcb, None);
        let retry = enclosure(&spec, &pcb, Some("- Lid too loose: add 0.2mm"));

        assert!(!first.user.contains("Address these issues"));
        assert!(retry.user.contains("Address these issues from the previous review"));
        assert!(retry.user.contains("- Lid too loose: add 0.2mm"));
        assert!(retry.user.contains("54.8"));
    }

    #[test]
    fn test_firmware_requests_file_list() {
        let prompt = firmware(&json!({}), &json!({"netList": []}), None);
        assert!(prompt.system.contains("\"files\""));
        assert!(prompt.user.contains("netList"));
    }
}
