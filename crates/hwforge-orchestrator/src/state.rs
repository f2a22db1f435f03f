//! The record threaded through every node, and the partial updates nodes return
//!
//! Nodes never mutate [`OrchestratorState`]. They return a [`StateUpdate`]
//! which the driver merges with [`OrchestratorState::apply`]: list fields
//! that form a log (`history`, `decisions`, `completed_stages`) are appended,
//! everything else is replaced when present.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use hwforge_blocks::BlockDefinition;
use hwforge_utils::types::{Mode, Stage};

use crate::artifacts::{
    Blueprint, DesignDecision, EnclosureArtifact, ExportManifest, Feasibility, FirmwareArtifact,
    NameOption, NeedsInput, OpenQuestion, PcbArtifact, Rejection, ReviewResult,
};
use crate::history::HistoryItem;

/// Generate/review bookkeeping for one review loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopState {
    /// Generate calls so far in this run. Never decreases.
    pub attempts: u32,
    pub review: Option<ReviewResult>,
    /// Bulleted issues from the last rejected review, consumed by generate.
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorState {
    pub project_id: String,
    pub mode: Mode,
    pub description: String,
    pub current_stage: Stage,
    pub completed_stages: Vec<Stage>,

    pub feasibility: Option<Feasibility>,
    pub open_questions: Vec<OpenQuestion>,
    pub decisions: Vec<DesignDecision>,
    pub blueprints: Vec<Blueprint>,
    pub selected_blueprint: Option<Blueprint>,
    pub name_options: Vec<NameOption>,
    pub product_name: Option<String>,
    pub final_spec: Option<Value>,

    pub pcb: Option<PcbArtifact>,
    pub enclosure: Option<EnclosureArtifact>,
    pub enclosure_loop: LoopState,
    pub firmware: Option<FirmwareArtifact>,
    pub firmware_loop: LoopState,
    pub export: Option<ExportManifest>,

    #[serde(skip)]
    pub available_blocks: Vec<BlockDefinition>,
    pub history: Vec<HistoryItem>,
    pub error: Option<String>,
    pub rejection: Option<Rejection>,
    pub needs_input: Option<NeedsInput>,
    /// Node executions in this run, incremented by the driver.
    pub iterations: u32,
    pub started_at: DateTime<Utc>,
}

impl OrchestratorState {
    /// Fresh state at the start of the spec stage.
    #[must_use]
    pub fn new(
        project_id: impl Into<String>,
        mode: Mode,
        description: impl Into<String>,
        available_blocks: Vec<BlockDefinition>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            mode,
            description: description.into(),
            current_stage: Stage::Spec,
            completed_stages: Vec::new(),
            feasibility: None,
            open_questions: Vec::new(),
            decisions: Vec::new(),
            blueprints: Vec::new(),
            selected_blueprint: None,
            name_options: Vec::new(),
            product_name: None,
            final_spec: None,
            pcb: None,
            enclosure: None,
            enclosure_loop: LoopState::default(),
            firmware: None,
            firmware_loop: LoopState::default(),
            export: None,
            available_blocks,
            history: Vec::new(),
            error: None,
            rejection: None,
            needs_input: None,
            iterations: 0,
            started_at: Utc::now(),
        }
    }

    /// Merge a node's partial update.
    pub fn apply(&mut self, update: StateUpdate) {
        let StateUpdate {
            current_stage,
            completed_stages,
            feasibility,
            open_questions,
            decisions,
            blueprints,
            selected_blueprint,
            name_options,
            product_name,
            final_spec,
            pcb,
            enclosure,
            enclosure_loop,
            firmware,
            firmware_loop,
            export,
            history,
            error,
            rejection,
            needs_input,
        } = update;

        if let Some(stage) = current_stage {
            self.current_stage = stage;
        }
        for stage in completed_stages {
            if !self.completed_stages.contains(&stage) {
                self.completed_stages.push(stage);
            }
        }
        replace(&mut self.feasibility, feasibility);
        if let Some(questions) = open_questions {
            self.open_questions = questions;
        }
        self.decisions.extend(decisions);
        if let Some(blueprints) = blueprints {
            self.blueprints = blueprints;
        }
        replace(&mut self.selected_blueprint, selected_blueprint);
        if let Some(names) = name_options {
            self.name_options = names;
        }
        replace(&mut self.product_name, product_name);
        replace(&mut self.final_spec, final_spec);
        replace(&mut self.pcb, pcb);
        replace(&mut self.enclosure, enclosure);
        enclosure_loop.merge_into(&mut self.enclosure_loop);
        replace(&mut self.firmware, firmware);
        firmware_loop.merge_into(&mut self.firmware_loop);
        replace(&mut self.export, export);
        self.history.extend(history);
        replace(&mut self.error, error);
        replace(&mut self.rejection, rejection);
        replace(&mut self.needs_input, needs_input);
    }

    /// `true` once every stage has been marked complete.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        Stage::ORDER.iter().all(|stage| self.completed_stages.contains(stage))
    }

    /// First stage in pipeline order that is not complete.
    #[must_use]
    pub fn first_incomplete_stage(&self) -> Option<Stage> {
        Stage::ORDER
            .into_iter()
            .find(|stage| !self.completed_stages.contains(stage))
    }

    #[must_use]
    pub fn is_stage_complete(&self, stage: Stage) -> bool {
        self.completed_stages.contains(&stage)
    }

    /// Global circuit breaker across all stages.
    #[must_use]
    pub fn has_exceeded_max_iterations(&self, limit: u32) -> bool {
        self.iterations > limit
    }

    #[must_use]
    pub fn loop_state(&self, stage: LoopStage) -> &LoopState {
        match stage {
            LoopStage::Enclosure => &self.enclosure_loop,
            LoopStage::Firmware => &self.firmware_loop,
        }
    }
}

fn replace<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

/// Partial state returned by one node.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<Stage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub completed_stages: Vec<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feasibility: Option<Feasibility>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_questions: Option<Vec<OpenQuestion>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub decisions: Vec<DesignDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blueprints: Option<Vec<Blueprint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_blueprint: Option<Blueprint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_options: Option<Vec<NameOption>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_spec: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pcb: Option<PcbArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enclosure: Option<EnclosureArtifact>,
    #[serde(skip_serializing_if = "LoopUpdate::is_empty")]
    pub enclosure_loop: LoopUpdate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware: Option<FirmwareArtifact>,
    #[serde(skip_serializing_if = "LoopUpdate::is_empty")]
    pub firmware_loop: LoopUpdate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<ExportManifest>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<HistoryItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_input: Option<NeedsInput>,
}

impl StateUpdate {
    #[must_use]
    pub fn with_history(mut self, item: HistoryItem) -> Self {
        self.history.push(item);
        self
    }

    pub fn loop_mut(&mut self, stage: LoopStage) -> &mut LoopUpdate {
        match stage {
            LoopStage::Enclosure => &mut self.enclosure_loop,
            LoopStage::Firmware => &mut self.firmware_loop,
        }
    }
}

/// Partial [`LoopState`]. The outer `Option` means "leave unchanged";
/// `Some(None)` clears the field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<Option<ReviewResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Option<String>>,
}

impl LoopUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attempts.is_none() && self.review.is_none() && self.feedback.is_none()
    }

    fn merge_into(self, target: &mut LoopState) {
        if let Some(attempts) = self.attempts {
            target.attempts = attempts;
        }
        if let Some(review) = self.review {
            target.review = review;
        }
        if let Some(feedback) = self.feedback {
            target.feedback = feedback;
        }
    }
}

/// The two generate/review/decide/accept loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStage {
    Enclosure,
    Firmware,
}

impl LoopStage {
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Enclosure => Stage::Enclosure,
            Self::Firmware => Stage::Firmware,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::Verdict;
    use crate::history::HistoryItem;
    use proptest::prelude::*;

    fn state() -> OrchestratorState {
        OrchestratorState::new("p1", Mode::VibeIt, "a lamp", Vec::new())
    }

    fn review(score: u8) -> ReviewResult {
        ReviewResult {
            score,
            verdict: Verdict::Revise,
            issues: Vec::new(),
            positives: Vec::new(),
            summary: String::new(),
        }
    }

    #[test]
    fn test_history_and_decisions_append() {
        let mut s = state();
        s.apply(StateUpdate::default().with_history(HistoryItem::progress(Stage::Spec, "a")));
        s.apply(StateUpdate {
            decisions: vec![DesignDecision {
                question_id: "q1".to_string(),
                question: "Power?".to_string(),
                answer: "USB".to_string(),
                auto: true,
            }],
            ..StateUpdate::default().with_history(HistoryItem::progress(Stage::Spec, "b"))
        });

        assert_eq!(s.history.len(), 2);
        assert_eq!(s.history[0].action, "a");
        assert_eq!(s.history[1].action, "b");
        assert_eq!(s.decisions.len(), 1);
    }

    #[test]
    fn test_completed_stages_deduplicated() {
        let mut s = state();
        for _ in 0..2 {
            s.apply(StateUpdate {
                completed_stages: vec![Stage::Spec],
                current_stage: Some(Stage::Pcb),
                ..StateUpdate::default()
            });
        }
        assert_eq!(s.completed_stages, vec![Stage::Spec]);
        assert_eq!(s.current_stage, Stage::Pcb);
        assert!(!s.is_complete());
    }

    #[test]
    fn test_loop_update_clears_and_keeps() {
        let mut s = state();
        s.enclosure_loop.review = Some(review(60));
        s.enclosure_loop.feedback = Some("- fix".to_string());
        s.enclosure_loop.attempts = 2;

        s.apply(StateUpdate {
            enclosure_loop: LoopUpdate {
                review: Some(None),
                ..LoopUpdate::default()
            },
            ..StateUpdate::default()
        });

        assert_eq!(s.enclosure_loop.review, None);
        assert_eq!(s.enclosure_loop.feedback.as_deref(), Some("- fix"));
        assert_eq!(s.enclosure_loop.attempts, 2);
        assert_eq!(s.firmware_loop, LoopState::default());
    }

    #[test]
    fn test_absent_fields_do_not_clear() {
        let mut s = state();
        s.product_name = Some("Lumo".to_string());
        s.apply(StateUpdate::default());
        assert_eq!(s.product_name.as_deref(), Some("Lumo"));
    }

    #[test]
    fn test_update_serialization_skips_empty_fields() {
        let update = StateUpdate {
            firmware_loop: LoopUpdate {
                feedback: Some(None),
                ..LoopUpdate::default()
            },
            ..StateUpdate::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({"firmwareLoop": {"feedback": null}}));
    }

    #[test]
    fn test_iteration_limit_is_exclusive() {
        let mut s = state();
        s.iterations = 60;
        assert!(!s.has_exceeded_max_iterations(60));
        s.iterations = 61;
        assert!(s.has_exceeded_max_iterations(60));
    }

    proptest! {
        #[test]
        fn prop_history_is_append_only(batches in prop::collection::vec(0usize..4, 1..12)) {
            let mut s = state();
            for (i, n) in batches.iter().enumerate() {
                let before: Vec<String> = s.history.iter().map(|h| h.id.clone()).collect();
                let mut update = StateUpdate::default();
                for j in 0..*n {
                    update.history.push(HistoryItem::progress(Stage::Spec, format!("{i}.{j}")));
                }
                s.apply(update);
                prop_assert!(s.history.len() >= before.len());
                let after: Vec<String> = s.history.iter().take(before.len()).map(|h| h.id.clone()).collect();
                prop_assert_eq!(before, after);
            }
        }
    }
}
