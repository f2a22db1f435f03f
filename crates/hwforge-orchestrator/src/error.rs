use thiserror::Error;

use hwforge_utils::error::{LlmError, UserFriendlyError};

use crate::graph::NodeId;

/// Failures raised while preparing or executing a run.
///
/// Inside the graph these never escape a node: the node boundary turns them
/// into `state.error` plus an `error` history item. Only [`InvalidInput`]
/// and snapshot I/O reach callers as `Err`.
///
/// [`InvalidInput`]: OrchestratorError::InvalidInput
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Invalid run input: {0}")]
    InvalidInput(String),

    #[error("{node} requires {missing}, which is not present")]
    Precondition { node: NodeId, missing: &'static str },

    #[error("{node} could not parse {what} from the model response")]
    Parse { node: NodeId, what: &'static str },

    #[error("Maximum iterations exceeded (limit {limit})")]
    MaxIterations { limit: u32 },

    #[error("Run aborted")]
    Aborted,

    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Snapshot I/O failed for {path}: {reason}")]
    SnapshotIo { path: String, reason: String },

    #[error("Snapshot is not valid JSON: {0}")]
    SnapshotJson(#[source] serde_json::Error),

    #[error("Failed to serialize pipeline data: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OrchestratorError {
    /// `true` for model-output parse failures, which are flagged in history.
    #[must_use]
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}

impl UserFriendlyError for OrchestratorError {
    fn user_message(&self) -> String {
        match self {
            Self::Llm(e) => e.user_message(),
            other => other.to_string(),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidInput(_) => {
                vec!["Provide --project-id and a non-empty description".to_string()]
            }
            Self::Precondition { .. } => {
                vec!["The snapshot may be missing upstream artifacts; re-run from an earlier stage".to_string()]
            }
            Self::Parse { .. } => vec!["Re-run; model output is not deterministic".to_string()],
            Self::MaxIterations { .. } => {
                vec!["Raise [orchestrator] max_total_iterations or simplify the request".to_string()]
            }
            Self::Aborted => Vec::new(),
            Self::Llm(e) => e.suggestions(),
            Self::SnapshotIo { .. } | Self::SnapshotJson(_) => {
                vec!["Check the path passed to --snapshot".to_string()]
            }
            Self::Serialization(_) => {
                vec!["Run with --verbose and report the failing node".to_string()]
            }
        }
    }
}
