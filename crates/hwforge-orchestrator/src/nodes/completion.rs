use serde_json::json;
use tracing::info;

use hwforge_utils::types::Stage;

use super::NodeOutcome;
use crate::error::OrchestratorError;
use crate::history::HistoryItem;
use crate::state::{OrchestratorState, StateUpdate};

/// Mark `stage` complete and advance to the first stage still incomplete.
///
/// Stages completed in an earlier run are skipped, so a resumed project never
/// regenerates a finished artifact.
pub(super) fn mark_complete(
    state: &OrchestratorState,
    stage: Stage,
) -> Result<NodeOutcome, OrchestratorError> {
    let next = std::iter::successors(stage.next(), Stage::next)
        .find(|s| !state.is_stage_complete(*s));
    info!(stage = %stage, next = ?next, "Stage complete");

    let item = HistoryItem::progress(stage, format!("mark_{stage}_complete"))
        .with_result(format!("{stage} stage complete"));
    Ok(NodeOutcome::proceed(StateUpdate {
        completed_stages: vec![stage],
        current_stage: Some(next.unwrap_or(stage)),
        ..StateUpdate::default().with_history(item)
    }))
}

/// Human-input checkpoint. Records why the run paused; the graph then ends.
pub(super) fn request_user_input(state: &OrchestratorState) -> Result<NodeOutcome, OrchestratorError> {
    let (stage, reason) = state
        .needs_input
        .map_or((state.current_stage, "unspecified"), |n| (n.stage, n.reason.as_str()));
    info!(stage = %stage, reason, "Waiting for user input");

    let item = HistoryItem::progress(stage, "request_user_input")
        .with_result("Waiting for user input")
        .with_details(json!({ "reason": reason }));
    Ok(NodeOutcome::proceed(StateUpdate::default().with_history(item)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{InputReason, NeedsInput};
    use crate::nodes::test_support::state;
    use hwforge_utils::types::Mode;

    #[test]
    fn test_mark_complete_advances() {
        let outcome = mark_complete(&state(Mode::VibeIt), Stage::Pcb).unwrap();
        assert_eq!(outcome.update.completed_stages, vec![Stage::Pcb]);
        assert_eq!(outcome.update.current_stage, Some(Stage::Enclosure));
        assert_eq!(outcome.update.history[0].action, "mark_pcb_complete");
    }

    #[test]
    fn test_mark_complete_skips_stages_already_complete() {
        let mut s = state(Mode::VibeIt);
        s.completed_stages = vec![Stage::Spec, Stage::Enclosure];
        s.current_stage = Stage::Pcb;
        let outcome = mark_complete(&s, Stage::Pcb).unwrap();
        assert_eq!(outcome.update.current_stage, Some(Stage::Firmware));
    }

    #[test]
    fn test_mark_export_complete_stays_on_export() {
        let mut s = state(Mode::VibeIt);
        s.current_stage = Stage::Export;
        let outcome = mark_complete(&s, Stage::Export).unwrap();
        assert_eq!(outcome.update.current_stage, Some(Stage::Export));
    }

    #[test]
    fn test_request_user_input_records_reason() {
        let mut s = state(Mode::DesignIt);
        s.needs_input = Some(NeedsInput {
            stage: Stage::Firmware,
            reason: InputReason::MaxAttemptsReached,
        });
        let outcome = request_user_input(&s).unwrap();
        let item = &outcome.update.history[0];
        assert_eq!(item.stage, Stage::Firmware);
        assert_eq!(item.details.as_ref().unwrap()["reason"], "max_attempts_reached");
    }
}
