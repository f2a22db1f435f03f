//! Prompt builders for each pipeline step
//!
//! Every builder is a pure function from structured inputs to a [`Prompt`].
//! The system prompt fixes the response contract (usually a JSON shape); the
//! user prompt carries the project material.

mod review;
mod spec;
mod stages;

pub use review::{enclosure_review, firmware_review};
pub use spec::{blueprints, feasibility, final_spec, names};
pub use stages::{block_selection, enclosure, firmware};

/// A system/user prompt pair for one LLM call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

const FEEDBACK_HEADING: &str = "## Address these issues from the previous review";

/// Append reviewer feedback verbatim under a fixed heading.
fn with_feedback(mut user: String, feedback: Option<&str>) -> String {
    if let Some(feedback) = feedback.map(str::trim).filter(|f| !f.is_empty()) {
        user.push_str("\n\n");
        user.push_str(FEEDBACK_HEADING);
        user.push('\n');
        user.push_str(feedback);
    }
    user
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_appended_verbatim() {
        let user = with_feedback("Base".to_string(), Some("- Wall too thin: use 2mm"));
        assert!(user.ends_with(
            "## Address these issues from the previous review\n- Wall too thin: use 2mm"
        ));
    }

    #[test]
    fn test_blank_feedback_ignored() {
        assert_eq!(with_feedback("Base".to_string(), Some("  ")), "Base");
        assert_eq!(with_feedback("Base".to_string(), None), "Base");
    }
}
