//! Routing decisions and the score gate shared by both review loops

use serde::{Deserialize, Serialize};

use hwforge_config::OrchestratorSettings;

use crate::artifacts::{ReviewResult, Verdict};

/// What a node tells the graph about where to go next.
///
/// Every conditional edge is a total function over this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accept,
    Revise,
    Escalate,
    Reject,
    Continue,
}

/// Thresholds the decide nodes apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewLimits {
    pub accept_threshold: u8,
    pub max_loop_attempts: u32,
}

impl From<&OrchestratorSettings> for ReviewLimits {
    fn from(settings: &OrchestratorSettings) -> Self {
        Self {
            accept_threshold: settings.accept_threshold,
            max_loop_attempts: settings.max_loop_attempts,
        }
    }
}

/// Accept iff `score >= threshold` or the verdict is `accept`; otherwise
/// escalate once `attempts` reaches the cap, else revise.
#[must_use]
pub fn decide(review: &ReviewResult, attempts: u32, limits: &ReviewLimits) -> Decision {
    if review.score >= limits.accept_threshold || review.verdict == Verdict::Accept {
        Decision::Accept
    } else if attempts >= limits.max_loop_attempts {
        Decision::Escalate
    } else {
        Decision::Revise
    }
}

/// One bullet per issue: `- {description}: {suggestion}`.
#[must_use]
pub fn feedback_from_review(review: &ReviewResult) -> String {
    let lines: Vec<String> = review
        .issues
        .iter()
        .map(|issue| match &issue.suggestion {
            Some(suggestion) => format!("- {}: {}", issue.description, suggestion),
            None => format!("- {}", issue.description),
        })
        .collect();

    if lines.is_empty() {
        format!("- Review scored {}/100; improve the overall quality", review.score)
    } else {
        lines.join("\n")
    }
}
