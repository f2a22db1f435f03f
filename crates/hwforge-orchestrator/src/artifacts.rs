//! Artifacts produced by the stage nodes
//!
//! Field names serialize in camelCase so snapshots stay compatible with
//! the JSON consumers of the event stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use hwforge_blocks::{BoardSize, Net, PlacedBlock};
use hwforge_utils::types::Stage;

/// Manufacturability assessment of the raw description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feasibility {
    pub manufacturable: bool,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<String>,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub suggested_revisions: Vec<String>,
    #[serde(default)]
    pub open_questions: Vec<OpenQuestion>,
}

impl Feasibility {
    /// The rejection this assessment implies, if it is not manufacturable.
    #[must_use]
    pub fn rejection(&self) -> Option<Rejection> {
        if self.manufacturable {
            return None;
        }
        let reason = self
            .rejection_reason
            .clone()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| "Not manufacturable with the available blocks".to_string());
        Some(Rejection {
            reason,
            suggested_revisions: self.suggested_revisions.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenQuestion {
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
}

/// An answered open question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignDecision {
    pub question_id: String,
    pub question: String,
    pub answer: String,
    /// Chosen by the pipeline rather than a person.
    #[serde(default)]
    pub auto: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blueprint {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub style: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameOption {
    pub name: String,
    #[serde(default)]
    pub rationale: String,
}

/// One entry of the schematic's component list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchematicComponent {
    /// Reference designator, `B1`, `B2`, ... in placement order.
    pub reference: String,
    pub block_slug: String,
    pub name: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PcbArtifact {
    pub placed_blocks: Vec<PlacedBlock>,
    pub board_size: BoardSize,
    pub net_list: Vec<Net>,
    pub schematic_data: Vec<SchematicComponent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnclosureArtifact {
    pub open_scad_code: String,
    /// Generate attempt that produced this code.
    pub iterations: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmwareFile {
    pub path: String,
    pub content: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "cpp".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmwareArtifact {
    pub files: Vec<FirmwareFile>,
    /// Firmware is never compiled here, so this stays `pending` until a
    /// downstream build reports back.
    pub build_status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Accept,
    Revise,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewIssue {
    pub severity: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// A normalized review: `score` and `verdict` are always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    pub score: u8,
    pub verdict: Verdict,
    #[serde(default)]
    pub issues: Vec<ReviewIssue>,
    #[serde(default)]
    pub positives: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

/// Review JSON as the model returns it, before defaults are applied.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawReview {
    score: Option<f64>,
    verdict: Option<String>,
    issues: Vec<RawIssue>,
    positives: Vec<String>,
    summary: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawIssue {
    severity: Option<String>,
    description: Option<String>,
    issue: Option<String>,
    suggestion: Option<String>,
    fix: Option<String>,
}

impl RawReview {
    /// Fill in whichever of score/verdict is missing from the other.
    ///
    /// Returns `None` when neither is present.
    pub(crate) fn normalize(self, accept_threshold: u8) -> Option<ReviewResult> {
        let score = self
            .score
            .filter(|s| s.is_finite())
            .map(|s| s.round().clamp(0.0, 100.0) as u8);
        let verdict = self.verdict.as_deref().and_then(parse_verdict);

        let (score, verdict) = match (score, verdict) {
            (Some(score), Some(verdict)) => (score, verdict),
            (Some(score), None) => {
                let derived = if score >= accept_threshold {
                    Verdict::Accept
                } else {
                    Verdict::Revise
                };
                (score, derived)
            }
            (None, Some(Verdict::Accept)) => (accept_threshold, Verdict::Accept),
            (None, Some(Verdict::Revise)) => (accept_threshold.saturating_sub(1), Verdict::Revise),
            (None, None) => return None,
        };

        let issues = self
            .issues
            .into_iter()
            .filter_map(|raw| {
                let description = raw.description.or(raw.issue)?;
                Some(ReviewIssue {
                    severity: raw.severity.unwrap_or_else(|| "minor".to_string()),
                    description,
                    suggestion: raw.suggestion.or(raw.fix).filter(|s| !s.trim().is_empty()),
                })
            })
            .collect();

        Some(ReviewResult {
            score,
            verdict,
            issues,
            positives: self.positives,
            summary: self.summary.unwrap_or_default(),
        })
    }
}

fn parse_verdict(raw: &str) -> Option<Verdict> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "accept" | "accepted" | "approve" | "approved" | "pass" => Some(Verdict::Accept),
        "revise" | "reject" | "rejected" | "fail" | "needs_revision" => Some(Verdict::Revise),
        _ => None,
    }
}

/// Terminal outcome of a failed feasibility check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub reason: String,
    #[serde(default)]
    pub suggested_revisions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputReason {
    /// Open questions in a mode that does not auto-answer.
    OpenQuestions,
    /// A review loop used up its attempts without an accepted artifact.
    MaxAttemptsReached,
}

impl InputReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OpenQuestions => "open_questions",
            Self::MaxAttemptsReached => "max_attempts_reached",
        }
    }
}

/// A human-input checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeedsInput {
    pub stage: Stage,
    pub reason: InputReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BomLine {
    pub block_slug: String,
    pub name: String,
    pub category: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFile {
    pub path: String,
    pub bytes: usize,
    /// Hex BLAKE3 digest of the file content.
    pub blake3: String,
}

/// Manufacturing hand-off manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportManifest {
    pub product_name: String,
    pub generated_at: DateTime<Utc>,
    pub board_size: BoardSize,
    pub bom: Vec<BomLine>,
    pub files: Vec<ExportFile>,
}

/// Accepts `"text"`, `["a", "b"]`, or `null`.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) if s.trim().is_empty() => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    })
}

/// Look up `key` in a model reply that is either `{key: [...]}` or a bare array.
pub(crate) fn list_in(value: &Value, key: &str) -> Option<Value> {
    match value {
        Value::Array(_) => Some(value.clone()),
        Value::Object(map) => map.get(key).filter(|v| v.is_array()).cloned(),
        _ => None,
    }
}
