//! Review prompts for the enclosure and firmware loops

use serde_json::Value;

use crate::{pretty, Prompt};

const REVIEW_CONTRACT: &str = r#"Score the artifact from 0 to 100 against the specification. 85 or more means it can ship as is. List concrete issues with a fix for each.

Respond with JSON only:
{
  "score": 0,
  "verdict": "accept | revise",
  "issues": [{"severity": "critical | major | minor", "description": "...", "suggestion": "..."}],
  "positives": ["..."],
  "summary": "one paragraph"
}"#;

fn review_system(role: &str) -> String {
    format!("{role}\n\n{REVIEW_CONTRACT}")
}

/// Enclosure review: spec, board outline, and the OpenSCAD source.
#[must_use]
pub fn enclosure_review(final_spec: &Value, board_size: &Value, openscad: &str) -> Prompt {
    Prompt::new(
        review_system(
            "You are a mechanical design reviewer checking an OpenSCAD enclosure for fit around the PCB, wall thickness, printability, access to connectors and controls, and assembly.",
        ),
        format!(
            "# Specification\n\n{}\n\n# PCB board size\n\n{}\n\n# OpenSCAD\n\n```openscad\n{}\n```",
            pretty(final_spec),
            pretty(board_size),
            openscad.trim_end()
        ),
    )
}

/// Firmware review: spec, the PCB net list, and every generated file.
#[must_use]
pub fn firmware_review(final_spec: &Value, net_list: &Value, files: &Value) -> Prompt {
    let mut listing = String::new();
    if let Some(files) = files.as_array() {
        for file in files {
            let path = file.get("path").and_then(Value::as_str).unwrap_or("?");
            let language = file.get("language").and_then(Value::as_str).unwrap_or("");
            let content = file.get("content").and_then(Value::as_str).unwrap_or("");
            listing.push_str(&format!("## {path}\n\n```{language}\n{}\n```\n\n", content.trim_end()));
        }
    }

    Prompt::new(
        review_system(
            "You are a firmware reviewer checking that the code initialises every block on the right bus and pins, matches the net list, implements the specified behaviour, and would compile.",
        ),
        format!(
            "# Specification\n\n{}\n\n# Net list\n\n{}\n\n# Files\n\n{listing}",
            pretty(final_spec),
            pretty(net_list)
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_enclosure_review_embeds_code_and_board() {
        let prompt = enclosure_review(&json!({}), &json!({"widthMm": 42.0}), "cube(10);\n");
        assert!(prompt.user.contains("```openscad\ncube(10);\n```"));
        assert!(prompt.user.contains("42.0"));
        assert!(prompt.system.contains("\"verdict\""));
    }

    #[test]
    fn test_firmware_review_lists_files() {
        let files = json!([
            {"path": "src/main.cpp", "language": "cpp", "content": "void setup() {}"},
            {"path": "include/pins.h", "language": "cpp", "content": "#define LED 2"}
        ]);
        let prompt = firmware_review(&json!({}), &json!([{"name": "I2C"}]), &files);
        assert!(prompt.user.contains("## src/main.cpp"));
        assert!(prompt.user.contains("#define LED 2"));
        assert!(prompt.user.contains("\"I2C\""));
    }
}
