//! Offline backend that replays canned responses in order
//!
//! Used by `hwforge run --script` for dry runs and by the test suites. A
//! script file is a JSON array whose entries are either a response string or
//! `{"error": "..."}` to simulate a provider failure.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use hwforge_utils::error::LlmError;

use crate::types::{LlmBackend, LlmInvocation, LlmResult};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScriptEntry {
    Text(String),
    Response { response: String },
    Error { error: String },
}

#[derive(Debug, Default)]
struct ScriptState {
    queue: VecDeque<Result<String, LlmError>>,
    invocations: Vec<LlmInvocation>,
}

/// Cloning shares the queue and the invocation log, so a test can keep a
/// handle after giving the backend to the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBackend {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backend = Self::new();
        for response in responses {
            backend.push_response(response);
        }
        backend
    }

    /// Load a JSON script file.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the file cannot be read or is
    /// not a JSON array of script entries.
    pub fn from_path(path: &Path) -> Result<Self, LlmError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            LlmError::Misconfiguration(format!(
                "Cannot read response script {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json_str(&raw).map_err(|e| match e {
            LlmError::Misconfiguration(msg) => {
                LlmError::Misconfiguration(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if `raw` is not a valid script.
    pub fn from_json_str(raw: &str) -> Result<Self, LlmError> {
        let entries: Vec<ScriptEntry> = serde_json::from_str(raw)
            .map_err(|e| LlmError::Misconfiguration(format!("Invalid response script: {e}")))?;
        let backend = Self::new();
        for entry in entries {
            match entry {
                ScriptEntry::Text(text) | ScriptEntry::Response { response: text } => {
                    backend.push_response(text);
                }
                ScriptEntry::Error { error } => backend.push_error(LlmError::Transport(error)),
            }
        }
        Ok(backend)
    }

    pub fn push_response(&self, response: impl Into<String>) {
        self.lock().queue.push_back(Ok(response.into()));
    }

    pub fn push_error(&self, error: LlmError) {
        self.lock().queue.push_back(Err(error));
    }

    /// Every invocation received so far, in call order.
    #[must_use]
    pub fn invocations(&self) -> Vec<LlmInvocation> {
        self.lock().invocations.clone()
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.lock().queue.len()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let mut state = self.lock();
        let call_index = state.invocations.len() + 1;
        debug!(
            provider = "scripted",
            call_index,
            project_id = %inv.project_id,
            stage = %inv.stage,
            "Replaying scripted response"
        );
        let model = if inv.model.is_empty() {
            "scripted".to_string()
        } else {
            inv.model.clone()
        };
        state.invocations.push(inv);

        match state.queue.pop_front() {
            Some(Ok(text)) => Ok(LlmResult::new(text, "scripted", model)),
            Some(Err(e)) => Err(e),
            None => Err(LlmError::Transport(format!(
                "response script exhausted at call {call_index}"
            ))),
        }
    }
}
