//! End-to-end pipeline runs against a scripted LLM backend
//!
//! Each test queues canned model replies, drives a full run through
//! `Orchestrator::run`, and checks the final state, the event stream, and
//! the calls the pipeline made. No provider or network is involved.

mod test_support;

use hwforge::llm::LlmError;
use hwforge::orchestrator::StageRecord;
use hwforge::{
    AbortSignal, HistoryType, InputReason, Mode, OrchestratorSettings, RunEvent, RunOutcome,
    ScriptedBackend, SpecSnapshot, Stage, StageStatus,
};
use test_support::*;

fn terminal(events: &[RunEvent]) -> &RunEvent {
    let last = events.last().expect("run emitted no events");
    assert!(last.is_terminal(), "last event is not terminal: {last:?}");
    assert_eq!(
        events.iter().filter(|e| e.is_terminal()).count(),
        1,
        "exactly one terminal event"
    );
    last
}

fn outcome(events: &[RunEvent]) -> RunOutcome {
    match terminal(events) {
        RunEvent::Complete { data } => data.clone(),
        other => panic!("expected a complete event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_full_run_completes_every_stage() {
    let backend = ScriptedBackend::from_responses(happy_path());
    let (state, events) = run_collect(
        &orchestrator(&backend),
        input(Mode::VibeIt, None),
        &AbortSignal::new(),
    )
    .await;

    assert_eq!(
        outcome(&events),
        RunOutcome::Completed {
            product_name: Some("Tickle".to_string())
        }
    );
    assert!(state.is_complete());
    assert_eq!(state.completed_stages, Stage::ORDER.to_vec());
    assert!(state.error.is_none());
    assert_eq!(backend.remaining(), 0);

    let export = state.export.as_ref().expect("export manifest");
    let paths: Vec<&str> = export.files.iter().map(|f| f.path.as_str()).collect();
    assert!(paths.contains(&"enclosure/enclosure.scad"));
    assert!(paths.contains(&"firmware/src/main.cpp"));
    assert!(export.files.iter().all(|f| f.blake3.len() == 64));
    assert_eq!(export.bom.len(), 4);
}

#[tokio::test]
async fn test_spec_events_rebuild_a_complete_snapshot() {
    let backend = ScriptedBackend::from_responses(happy_path());
    let (_, events) = run_collect(
        &orchestrator(&backend),
        input(Mode::VibeIt, None),
        &AbortSignal::new(),
    )
    .await;

    let snapshot = snapshot_from(&events, SpecSnapshot::default());
    for stage in Stage::ORDER {
        assert_eq!(snapshot.stage_status(stage), StageStatus::Complete, "{stage}");
        assert!(snapshot.stages[&stage].completed_at.is_some());
    }
    assert_eq!(snapshot.product_name.as_deref(), Some("Tickle"));
    assert!(snapshot.final_spec.is_some());
    assert!(snapshot.pcb.is_some());
    assert!(snapshot.export.is_some());
}

#[tokio::test]
async fn test_rejection_ends_run_with_reason() {
    let backend = ScriptedBackend::from_responses([
        r#"{"manufacturable": false, "rejectionReason": "needs FPGA", "suggestedRevisions": "Use a camera module with on-board processing"}"#,
    ]);
    let (state, events) = run_collect(
        &orchestrator(&backend),
        input(Mode::VibeIt, None),
        &AbortSignal::new(),
    )
    .await;

    match outcome(&events) {
        RunOutcome::Rejected {
            reason,
            suggested_revisions,
        } => {
            assert_eq!(reason, "needs FPGA");
            assert_eq!(suggested_revisions.len(), 1);
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(backend.invocations().len(), 1);
    assert!(state.blueprints.is_empty());
    assert!(state.final_spec.is_none());
}

#[tokio::test]
async fn test_no_open_questions_goes_straight_to_blueprints() {
    let backend = ScriptedBackend::from_responses(happy_path());
    let (state, _) = run_collect(
        &orchestrator(&backend),
        input(Mode::VibeIt, None),
        &AbortSignal::new(),
    )
    .await;

    let answer = state
        .history
        .iter()
        .position(|h| h.action == "answer_questions")
        .expect("answer_questions ran");
    assert_eq!(
        state.history[answer].result.as_deref(),
        Some("No questions to answer")
    );
    assert_eq!(state.history[answer + 1].action, "generate_blueprints");
    assert!(state.decisions.is_empty());
}

#[tokio::test]
async fn test_vibe_mode_auto_answers_questions() {
    let mut responses = happy_path();
    responses[0] = FEASIBLE_WITH_QUESTION.to_string();
    let backend = ScriptedBackend::from_responses(responses);
    let (state, events) = run_collect(
        &orchestrator(&backend),
        input(Mode::VibeIt, None),
        &AbortSignal::new(),
    )
    .await;

    assert!(matches!(outcome(&events), RunOutcome::Completed { .. }));
    assert_eq!(state.decisions.len(), 1);
    assert_eq!(state.decisions[0].answer, "USB");
    assert!(state.decisions[0].auto);
}

#[tokio::test]
async fn test_design_mode_pauses_on_open_questions() {
    let backend = ScriptedBackend::from_responses([FEASIBLE_WITH_QUESTION]);
    let (state, events) = run_collect(
        &orchestrator(&backend),
        input(Mode::DesignIt, None),
        &AbortSignal::new(),
    )
    .await;

    assert_eq!(
        outcome(&events),
        RunOutcome::NeedsInput {
            stage: Stage::Spec,
            reason: InputReason::OpenQuestions,
        }
    );
    assert_eq!(state.open_questions.len(), 1);
    assert_eq!(
        state.history.last().map(|h| h.action.as_str()),
        Some("request_user_input")
    );
}

#[tokio::test]
async fn test_high_score_accepts_despite_revise_verdict() {
    let mut responses = through_pcb();
    responses.extend([
        ENCLOSURE.to_string(),
        review(90, "revise"),
        FIRMWARE.to_string(),
        review(95, "accept"),
    ]);
    let backend = ScriptedBackend::from_responses(responses);
    let (state, events) = run_collect(
        &orchestrator(&backend),
        input(Mode::VibeIt, None),
        &AbortSignal::new(),
    )
    .await;

    assert!(matches!(outcome(&events), RunOutcome::Completed { .. }));
    assert_eq!(state.enclosure_loop.attempts, 1);
    assert_eq!(calls_for(&backend, "enclosure"), 2);
    assert!(state.history.iter().any(|h| h.action == "accept_enclosure"));
}

#[tokio::test]
async fn test_low_accept_verdict_still_accepts() {
    let mut responses = through_pcb();
    responses.extend([
        ENCLOSURE.to_string(),
        review(50, "accept"),
        FIRMWARE.to_string(),
        review(95, "accept"),
    ]);
    let backend = ScriptedBackend::from_responses(responses);
    let (state, _) = run_collect(
        &orchestrator(&backend),
        input(Mode::VibeIt, None),
        &AbortSignal::new(),
    )
    .await;

    assert_eq!(state.enclosure_loop.attempts, 1);
    assert!(state.is_complete());
}

#[tokio::test]
async fn test_exhausted_enclosure_loop_asks_for_input() {
    let mut responses = through_pcb();
    for _ in 0..3 {
        responses.push(ENCLOSURE.to_string());
        responses.push(review(60, "revise"));
    }
    // Would be consumed by a fourth attempt.
    responses.push(ENCLOSURE.to_string());
    let backend = ScriptedBackend::from_responses(responses);
    let (state, events) = run_collect(
        &orchestrator(&backend),
        input(Mode::VibeIt, None),
        &AbortSignal::new(),
    )
    .await;

    assert_eq!(
        outcome(&events),
        RunOutcome::NeedsInput {
            stage: Stage::Enclosure,
            reason: InputReason::MaxAttemptsReached,
        }
    );
    assert_eq!(state.enclosure_loop.attempts, 3);
    assert_eq!(calls_for(&backend, "enclosure"), 6);
    assert_eq!(backend.remaining(), 1);
    assert!(!state.completed_stages.contains(&Stage::Enclosure));
}

#[tokio::test]
async fn test_revision_prompt_carries_review_feedback() {
    let mut responses = through_pcb();
    responses.extend([
        ENCLOSURE.to_string(),
        review(60, "revise"),
        ENCLOSURE.to_string(),
        review(91, "accept"),
        FIRMWARE.to_string(),
        review(91, "accept"),
    ]);
    let backend = ScriptedBackend::from_responses(responses);
    let (state, _) = run_collect(
        &orchestrator(&backend),
        input(Mode::VibeIt, None),
        &AbortSignal::new(),
    )
    .await;

    assert!(state.is_complete());
    assert_eq!(state.enclosure_loop.attempts, 2);
    assert!(state.enclosure_loop.feedback.is_none());

    let enclosure_calls: Vec<_> = backend
        .invocations()
        .into_iter()
        .filter(|call| call.stage == "enclosure")
        .collect();
    let second_generate = &enclosure_calls[2];
    let user = &second_generate.messages.last().unwrap().content;
    assert!(user.contains("Wall too thin"));
    assert!(user.contains("Use 2mm walls"));
}

#[tokio::test]
async fn test_firmware_code_block_fallback() {
    let mut responses = through_pcb();
    responses.extend([
        ENCLOSURE.to_string(),
        review(92, "accept"),
        "Sure! Here is the sketch:\n```cpp\nvoid setup() { Serial.begin(115200); }\nvoid loop() {}\n```\nEnjoy.".to_string(),
        review(90, "accept"),
    ]);
    let backend = ScriptedBackend::from_responses(responses);
    let (state, _) = run_collect(
        &orchestrator(&backend),
        input(Mode::VibeIt, None),
        &AbortSignal::new(),
    )
    .await;

    let firmware = state.firmware.as_ref().unwrap();
    assert_eq!(firmware.files.len(), 1);
    assert_eq!(firmware.files[0].path, "src/main.cpp");
    assert_eq!(firmware.files[0].language, "cpp");
    assert!(firmware.files[0].content.starts_with("void setup()"));
    assert!(state.history.iter().any(|h| h.stage == Stage::Firmware && h.is_parse_error()));
    assert!(state.is_complete());
}

#[tokio::test]
async fn test_transport_failure_ends_with_error_event() {
    let backend = ScriptedBackend::from_responses([FEASIBLE, BLUEPRINTS]);
    backend.push_error(LlmError::Transport("connection reset by peer".to_string()));
    let (state, events) = run_collect(
        &orchestrator(&backend),
        input(Mode::VibeIt, None),
        &AbortSignal::new(),
    )
    .await;

    match terminal(&events) {
        RunEvent::Error { error } => assert!(error.contains("connection reset")),
        other => panic!("expected an error event, got {other:?}"),
    }
    let last = state.history.last().unwrap();
    assert_eq!(last.kind, HistoryType::Error);
    assert_eq!(last.action, "generate_names");
    assert!(state.error.is_some());
}

#[tokio::test]
async fn test_unparseable_feasibility_is_a_hard_error() {
    let backend = ScriptedBackend::from_responses(["I think this is doable!"]);
    let (state, events) = run_collect(
        &orchestrator(&backend),
        input(Mode::VibeIt, None),
        &AbortSignal::new(),
    )
    .await;

    assert!(matches!(terminal(&events), RunEvent::Error { .. }));
    assert!(state.history.last().unwrap().is_parse_error());
}

#[tokio::test]
async fn test_abort_stops_before_the_next_node() {
    let backend = ScriptedBackend::from_responses(happy_path());
    let abort = AbortSignal::new();
    abort.abort();
    let (state, events) = run_collect(
        &orchestrator(&backend),
        input(Mode::VibeIt, None),
        &abort,
    )
    .await;

    match terminal(&events) {
        RunEvent::Error { error } => assert_eq!(error, "Run aborted"),
        other => panic!("expected an error event, got {other:?}"),
    }
    assert!(backend.invocations().is_empty());
    assert_eq!(state.history.last().unwrap().kind, HistoryType::Error);
}

#[tokio::test]
async fn test_global_iteration_cap_stops_the_run() {
    let settings = OrchestratorSettings {
        max_total_iterations: 10,
        ..OrchestratorSettings::default()
    };
    let backend = ScriptedBackend::from_responses(happy_path());
    let (state, events) = run_collect(
        &orchestrator_with(&backend, settings),
        input(Mode::VibeIt, None),
        &AbortSignal::new(),
    )
    .await;

    match terminal(&events) {
        RunEvent::Error { error } => assert!(error.contains("Maximum iterations exceeded")),
        other => panic!("expected an error event, got {other:?}"),
    }
    assert_eq!(state.history.last().unwrap().action, "decide_enclosure");
}

#[tokio::test]
async fn test_resume_picks_up_at_the_paused_stage() {
    let mut responses = through_pcb();
    for _ in 0..3 {
        responses.push(ENCLOSURE.to_string());
        responses.push(review(60, "revise"));
    }
    let first = ScriptedBackend::from_responses(responses);
    let (_, events) = run_collect(
        &orchestrator(&first),
        input(Mode::VibeIt, None),
        &AbortSignal::new(),
    )
    .await;
    let snapshot = snapshot_from(&events, SpecSnapshot::default());
    assert_eq!(snapshot.stage_status(Stage::Pcb), StageStatus::Complete);
    assert_eq!(snapshot.stage_status(Stage::Enclosure), StageStatus::InProgress);

    let second = ScriptedBackend::from_responses([
        ENCLOSURE.to_string(),
        review(95, "accept"),
        FIRMWARE.to_string(),
        review(95, "accept"),
    ]);
    let (state, events) = run_collect(
        &orchestrator(&second),
        input(Mode::VibeIt, Some(snapshot)),
        &AbortSignal::new(),
    )
    .await;

    assert!(matches!(outcome(&events), RunOutcome::Completed { .. }));
    assert_eq!(second.invocations()[0].stage, "enclosure");
    assert_eq!(calls_for(&second, "spec"), 0);
    assert_eq!(calls_for(&second, "pcb"), 0);
    assert_eq!(state.enclosure_loop.attempts, 1);
    assert_eq!(state.product_name.as_deref(), Some("Tickle"));
}

#[tokio::test]
async fn test_resume_never_reruns_a_completed_stage() {
    let first = ScriptedBackend::from_responses(happy_path());
    let (_, events) = run_collect(
        &orchestrator(&first),
        input(Mode::VibeIt, None),
        &AbortSignal::new(),
    )
    .await;
    let mut snapshot = snapshot_from(&events, SpecSnapshot::default());
    let finished_enclosure = snapshot.enclosure.clone();

    // Spec and enclosure done, pcb reopened, firmware and export never run.
    snapshot.stages.insert(Stage::Pcb, StageRecord::in_progress());
    snapshot.stages.remove(&Stage::Firmware);
    snapshot.stages.remove(&Stage::Export);
    snapshot.firmware = None;
    snapshot.export = None;

    let second = ScriptedBackend::from_responses([
        BLOCKS.to_string(),
        FIRMWARE.to_string(),
        review(90, "accept"),
    ]);
    let (state, events) = run_collect(
        &orchestrator(&second),
        input(Mode::VibeIt, Some(snapshot)),
        &AbortSignal::new(),
    )
    .await;

    assert!(matches!(outcome(&events), RunOutcome::Completed { .. }));
    assert_eq!(calls_for(&second, "spec"), 0);
    assert_eq!(calls_for(&second, "pcb"), 1);
    assert_eq!(calls_for(&second, "enclosure"), 0);
    assert_eq!(calls_for(&second, "firmware"), 2);
    assert_eq!(second.remaining(), 0);
    assert_eq!(state.enclosure, finished_enclosure);
    assert_eq!(state.enclosure_loop.attempts, 0);
    assert!(state.is_complete());

    let nodes: Vec<String> = events
        .iter()
        .filter_map(|e| match e {
            RunEvent::State { node, .. } => Some(node.to_string()),
            _ => None,
        })
        .collect();
    assert!(!nodes.iter().any(|n| n.ends_with("_enclosure")));
    let pcb_done = nodes.iter().position(|n| n == "mark_pcb_complete").unwrap();
    assert_eq!(nodes[pcb_done + 1], "generate_firmware");
}

#[tokio::test]
async fn test_resumed_rejection_stays_rejected() {
    let first = ScriptedBackend::from_responses([
        r#"{"manufacturable": false, "rejectionReason": "needs FPGA", "suggestedRevisions": ["Drop the video pipeline"]}"#,
    ]);
    let (_, events) = run_collect(
        &orchestrator(&first),
        input(Mode::VibeIt, None),
        &AbortSignal::new(),
    )
    .await;
    let snapshot = snapshot_from(&events, SpecSnapshot::default());
    assert_eq!(
        snapshot.feasibility.as_ref().map(|f| f.manufacturable),
        Some(false)
    );

    let second = ScriptedBackend::from_responses(happy_path());
    let (state, events) = run_collect(
        &orchestrator(&second),
        input(Mode::VibeIt, Some(snapshot)),
        &AbortSignal::new(),
    )
    .await;

    assert_eq!(
        outcome(&events),
        RunOutcome::Rejected {
            reason: "needs FPGA".to_string(),
            suggested_revisions: vec!["Drop the video pipeline".to_string()],
        }
    );
    assert!(second.invocations().is_empty());
    assert!(state.blueprints.is_empty());
    assert!(state.final_spec.is_none());
    assert!(!state.is_stage_complete(Stage::Spec));
}

#[tokio::test]
async fn test_completed_snapshot_is_a_no_op() {
    let backend = ScriptedBackend::from_responses(happy_path());
    let (_, events) = run_collect(
        &orchestrator(&backend),
        input(Mode::VibeIt, None),
        &AbortSignal::new(),
    )
    .await;
    let snapshot = snapshot_from(&events, SpecSnapshot::default());

    let idle = ScriptedBackend::new();
    let (state, events) = run_collect(
        &orchestrator(&idle),
        input(Mode::VibeIt, Some(snapshot)),
        &AbortSignal::new(),
    )
    .await;

    assert_eq!(events.len(), 1);
    assert!(matches!(outcome(&events), RunOutcome::Completed { .. }));
    assert!(idle.invocations().is_empty());
    assert!(state.history.is_empty());
}

#[tokio::test]
async fn test_blank_description_is_rejected_up_front() {
    let backend = ScriptedBackend::new();
    let mut run_input = input(Mode::VibeIt, None);
    run_input.description = "   ".to_string();

    let (tx, _rx) = tokio::sync::mpsc::channel(8);
    let result = orchestrator(&backend)
        .run(run_input, &AbortSignal::new(), &tx)
        .await;
    assert!(matches!(result, Err(hwforge::OrchestratorError::InvalidInput(_))));
}
