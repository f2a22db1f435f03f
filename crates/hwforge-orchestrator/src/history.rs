//! Append-only audit log entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

use hwforge_utils::types::Stage;

static NEXT_HISTORY_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryType {
    ToolCall,
    ToolResult,
    Validation,
    Error,
    Fix,
    Progress,
    Thinking,
}

/// One node action and its outcome. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: HistoryType,
    pub stage: Stage,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl HistoryItem {
    pub fn new(kind: HistoryType, stage: Stage, action: impl Into<String>) -> Self {
        let n = NEXT_HISTORY_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("h-{n}"),
            timestamp: Utc::now(),
            kind,
            stage,
            action: action.into(),
            result: None,
            details: None,
        }
    }

    pub fn progress(stage: Stage, action: impl Into<String>) -> Self {
        Self::new(HistoryType::Progress, stage, action)
    }

    pub fn tool_result(stage: Stage, action: impl Into<String>) -> Self {
        Self::new(HistoryType::ToolResult, stage, action)
    }

    pub fn validation(stage: Stage, action: impl Into<String>) -> Self {
        Self::new(HistoryType::Validation, stage, action)
    }

    pub fn error(stage: Stage, action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(HistoryType::Error, stage, action).with_result(message)
    }

    /// Record a recovered parse failure; `details.parseError` is always `true`.
    pub fn parse_fallback(stage: Stage, action: impl Into<String>, note: impl Into<String>) -> Self {
        Self::new(HistoryType::Fix, stage, action)
            .with_result(note)
            .with_details(json!({ "parseError": true }))
    }

    #[must_use]
    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// `true` if `details.parseError` is set.
    #[must_use]
    pub fn is_parse_error(&self) -> bool {
        self.details
            .as_ref()
            .and_then(|d| d.get("parseError"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}
