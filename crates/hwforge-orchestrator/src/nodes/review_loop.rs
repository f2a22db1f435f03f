//! Review, decide and accept steps shared by the enclosure and firmware loops

use serde_json::{json, Value};
use tracing::{info, warn};

use hwforge_llm::extraction::parse_json;
use hwforge_prompts::Prompt;

use super::{ask, NodeContext, NodeOutcome};
use crate::artifacts::{
    InputReason, NeedsInput, RawReview, ReviewIssue, ReviewResult, Verdict,
};
use crate::decision::{decide, feedback_from_review, Decision, ReviewLimits};
use crate::error::OrchestratorError;
use crate::graph::NodeId;
use crate::history::HistoryItem;
use crate::state::{LoopStage, OrchestratorState, StateUpdate};

const FALLBACK_SCORE: u8 = 70;

impl LoopStage {
    const fn review_node(self) -> NodeId {
        match self {
            Self::Enclosure => NodeId::ReviewEnclosure,
            Self::Firmware => NodeId::ReviewFirmware,
        }
    }

    const fn decide_node(self) -> NodeId {
        match self {
            Self::Enclosure => NodeId::DecideEnclosure,
            Self::Firmware => NodeId::DecideFirmware,
        }
    }

    const fn accept_node(self) -> NodeId {
        match self {
            Self::Enclosure => NodeId::AcceptEnclosure,
            Self::Firmware => NodeId::AcceptFirmware,
        }
    }

    /// Size summary of the current artifact, `None` if there is none.
    fn artifact_summary(self, state: &OrchestratorState) -> Option<Value> {
        match self {
            Self::Enclosure => state
                .enclosure
                .as_ref()
                .filter(|e| !e.open_scad_code.trim().is_empty())
                .map(|e| json!({ "bytes": e.open_scad_code.len(), "iteration": e.iterations })),
            Self::Firmware => state
                .firmware
                .as_ref()
                .filter(|f| !f.files.is_empty())
                .map(|f| {
                    json!({
                        "files": f.files.len(),
                        "bytes": f.files.iter().map(|file| file.content.len()).sum::<usize>(),
                    })
                }),
        }
    }
}

/// Review returned when the model's review cannot be parsed.
fn fallback_review() -> ReviewResult {
    ReviewResult {
        score: FALLBACK_SCORE,
        verdict: Verdict::Revise,
        issues: vec![ReviewIssue {
            severity: "warning".to_string(),
            description: "The review response could not be parsed".to_string(),
            suggestion: Some("Re-check the artifact against the specification".to_string()),
        }],
        positives: Vec::new(),
        summary: "Automatic review fallback".to_string(),
    }
}

/// Ask for a review with an already-built prompt and store the normalized result.
pub(super) async fn review_node(
    state: &OrchestratorState,
    ctx: &NodeContext,
    stage: LoopStage,
    prompt: Prompt,
) -> Result<NodeOutcome, OrchestratorError> {
    let node = stage.review_node();
    let reply = ask(ctx, state, stage.stage(), prompt, None).await?;

    let mut update = StateUpdate::default();
    let review = match parse_json::<RawReview>(&reply)
        .and_then(|raw| raw.normalize(ctx.settings.accept_threshold))
    {
        Some(review) => review,
        None => {
            warn!(node = %node, "Review unreadable; using fallback review");
            update.history.push(HistoryItem::parse_fallback(
                stage.stage(),
                node.to_string(),
                format!("Review unreadable; assumed score {FALLBACK_SCORE}"),
            ));
            fallback_review()
        }
    };

    info!(
        node = %node,
        score = review.score,
        issues = review.issues.len(),
        "Review received"
    );
    update.history.push(
        HistoryItem::tool_result(stage.stage(), node.to_string())
            .with_result(format!("Score {}/100", review.score))
            .with_details(json!({
                "verdict": review.verdict,
                "issues": review.issues.len(),
                "summary": review.summary,
            })),
    );
    update.loop_mut(stage).review = Some(Some(review));
    Ok(NodeOutcome::proceed(update))
}

/// Route on the stored review. The global iteration cap is checked first.
pub(super) fn decide_node(
    state: &OrchestratorState,
    ctx: &NodeContext,
    stage: LoopStage,
) -> Result<NodeOutcome, OrchestratorError> {
    let node = stage.decide_node();
    let limit = ctx.settings.max_total_iterations;
    if state.has_exceeded_max_iterations(limit) {
        return Err(OrchestratorError::MaxIterations { limit });
    }

    let loop_state = state.loop_state(stage);
    let review = loop_state.review.as_ref().ok_or(OrchestratorError::Precondition {
        node,
        missing: "a review",
    })?;
    let decision = decide(review, loop_state.attempts, &ReviewLimits::from(&ctx.settings));

    let mut update = StateUpdate::default();
    let item = HistoryItem::validation(stage.stage(), node.to_string()).with_details(json!({
        "score": review.score,
        "verdict": review.verdict,
        "attempts": loop_state.attempts,
        "decision": decision,
    }));

    match decision {
        Decision::Accept => {
            update.loop_mut(stage).feedback = Some(None);
            update.history.push(item.with_result(format!("Accepted at {}/100", review.score)));
        }
        Decision::Escalate => {
            info!(node = %node, attempts = loop_state.attempts, "Loop exhausted; escalating");
            update.needs_input = Some(NeedsInput {
                stage: stage.stage(),
                reason: InputReason::MaxAttemptsReached,
            });
            update.history.push(item.with_result(format!(
                "Escalating after {} attempts",
                loop_state.attempts
            )));
        }
        Decision::Revise | Decision::Reject | Decision::Continue => {
            let loop_update = update.loop_mut(stage);
            loop_update.feedback = Some(Some(feedback_from_review(review)));
            loop_update.review = Some(None);
            update.history.push(item.with_result(format!(
                "Revision requested at {}/100",
                review.score
            )));
        }
    }

    Ok(NodeOutcome::decided(update, decision))
}

/// Re-check the artifact and record the accepted score.
pub(super) fn accept_node(
    state: &OrchestratorState,
    stage: LoopStage,
) -> Result<NodeOutcome, OrchestratorError> {
    let node = stage.accept_node();
    let summary = stage
        .artifact_summary(state)
        .ok_or(OrchestratorError::Precondition {
            node,
            missing: "a generated artifact",
        })?;
    let score = state
        .loop_state(stage)
        .review
        .as_ref()
        .map(|r| r.score);

    let mut details = summary;
    details["score"] = json!(score);
    let item = HistoryItem::tool_result(stage.stage(), node.to_string())
        .with_result(format!("{} accepted", stage.stage()))
        .with_details(details);
    Ok(NodeOutcome::decided(
        StateUpdate::default().with_history(item),
        Decision::Accept,
    ))
}
