use hwforge_blocks::BlockDefinition;
use hwforge_utils::types::{Mode, Stage};

use crate::error::OrchestratorError;
use crate::snapshot::{SpecSnapshot, StageStatus};
use crate::state::OrchestratorState;

/// Everything a run needs from its caller.
#[derive(Debug, Clone)]
pub struct RunInput {
    pub project_id: String,
    pub mode: Mode,
    pub description: String,
    pub available_blocks: Vec<BlockDefinition>,
    /// Snapshot to resume from; `None` starts a fresh project.
    pub existing_spec: Option<SpecSnapshot>,
}

impl RunInput {
    /// # Errors
    ///
    /// `InvalidInput` for a blank project id or description.
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.project_id.trim().is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "project id must not be empty".to_string(),
            ));
        }
        if self.description.trim().is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "description must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Build the state a run starts from.
///
/// With a snapshot, `completed_stages` holds every stage marked complete and
/// `current_stage` is the first stage in pipeline order that is not. Spec
/// artifacts are copied across; open questions are recomputed as the
/// feasibility questions not yet answered by a recorded decision. A stored
/// non-manufacturable feasibility carries its rejection over, so the run ends
/// rejected without calling the model. Loop attempt counters always start at
/// zero.
#[must_use]
pub fn prepare_initial_state(input: &RunInput) -> OrchestratorState {
    let mut state = OrchestratorState::new(
        input.project_id.clone(),
        input.mode,
        input.description.clone(),
        input.available_blocks.clone(),
    );

    let Some(snapshot) = &input.existing_spec else {
        return state;
    };

    state.completed_stages = Stage::ORDER
        .into_iter()
        .filter(|stage| snapshot.stage_status(*stage) == StageStatus::Complete)
        .collect();
    state.current_stage = state.first_incomplete_stage().unwrap_or(Stage::Export);

    state.feasibility = snapshot.feasibility.clone();
    state.decisions = snapshot.decisions.clone();
    state.blueprints = snapshot.blueprints.clone();
    state.selected_blueprint = snapshot.selected_blueprint.clone();
    state.product_name = snapshot.product_name.clone();
    state.final_spec = snapshot.final_spec.clone();
    state.pcb = snapshot.pcb.clone();
    state.enclosure = snapshot.enclosure.clone();
    state.firmware = snapshot.firmware.clone();
    state.export = snapshot.export.clone();

    if let Some(feasibility) = &state.feasibility
        && !state.is_stage_complete(Stage::Spec)
    {
        state.rejection = feasibility.rejection();
        state.open_questions = feasibility
            .open_questions
            .iter()
            .filter(|q| !state.decisions.iter().any(|d| d.question_id == q.id))
            .cloned()
            .collect();
    }

    state
}
