//! Property-based tests for the review loops and the event stream
//!
//! Each case drives a whole scripted run, so the case count is capped.
//!
//! ## Configuration
//!
//! - `PROPTEST_CASES`: Number of test cases per property (default: 32)
//! - `PROPTEST_MAX_SHRINK_ITERS`: Max shrinking iterations on failure (default: 200)

mod test_support;

use proptest::prelude::*;
use std::env;

use hwforge::{
    AbortSignal, InputReason, Mode, RunEvent, RunOutcome, ScriptedBackend, SpecSnapshot, Stage,
};
use test_support::*;

const DEFAULT_PROPTEST_CASES: u32 = 32;
const DEFAULT_MAX_SHRINK_ITERS: u32 = 200;
const MAX_LOOP_ATTEMPTS: usize = 3;
const ACCEPT_THRESHOLD: u8 = 85;

fn proptest_config(max_cases: Option<u32>) -> ProptestConfig {
    let env_cases = env::var("PROPTEST_CASES")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(DEFAULT_PROPTEST_CASES);
    let env_shrink_iters = env::var("PROPTEST_MAX_SHRINK_ITERS")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(DEFAULT_MAX_SHRINK_ITERS);

    ProptestConfig {
        cases: max_cases.map_or(env_cases, |max| env_cases.min(max)),
        max_shrink_iters: env_shrink_iters,
        ..ProptestConfig::default()
    }
}

fn arb_review() -> impl Strategy<Value = (u8, bool)> {
    (0u8..=100, any::<bool>())
}

fn accepts((score, accept_verdict): (u8, bool)) -> bool {
    score >= ACCEPT_THRESHOLD || accept_verdict
}

fn verdict(accept_verdict: bool) -> &'static str {
    if accept_verdict { "accept" } else { "revise" }
}

/// Script an enclosure loop that sees `reviews` in order, stopping at the
/// first accepting review. Returns the replies and the attempts it takes.
fn script_enclosure_loop(reviews: &[(u8, bool)]) -> (Vec<String>, usize, bool) {
    let mut responses = through_pcb();
    let mut attempts = 0;
    let mut accepted = false;
    for review_pair in reviews.iter().take(MAX_LOOP_ATTEMPTS) {
        attempts += 1;
        responses.push(ENCLOSURE.to_string());
        responses.push(review(review_pair.0, verdict(review_pair.1)));
        if accepts(*review_pair) {
            accepted = true;
            break;
        }
    }
    if accepted {
        responses.push(FIRMWARE.to_string());
        responses.push(review(95, "accept"));
    }
    (responses, attempts, accepted)
}

fn run_blocking(backend: &ScriptedBackend) -> (hwforge::OrchestratorState, Vec<RunEvent>) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(run_collect(
        &orchestrator(backend),
        input(Mode::VibeIt, None),
        &AbortSignal::new(),
    ))
}

proptest! {
    #![proptest_config(proptest_config(Some(64)))]

    /// The enclosure loop generates at most `MAX_LOOP_ATTEMPTS` times and
    /// ends accepted or escalated, never looping again.
    #[test]
    fn prop_enclosure_loop_terminates(reviews in prop::collection::vec(arb_review(), 3)) {
        let (responses, attempts, accepted) = script_enclosure_loop(&reviews);
        let backend = ScriptedBackend::from_responses(responses);
        let (state, events) = run_blocking(&backend);

        let generates = state
            .history
            .iter()
            .filter(|h| h.action == "generate_enclosure")
            .count();
        prop_assert_eq!(generates, attempts);
        prop_assert!(generates <= MAX_LOOP_ATTEMPTS);
        prop_assert_eq!(state.enclosure_loop.attempts as usize, attempts);
        prop_assert_eq!(backend.remaining(), 0);

        let outcome = match events.last() {
            Some(RunEvent::Complete { data }) => data.clone(),
            other => return Err(TestCaseError::fail(format!("unexpected end: {other:?}"))),
        };
        if accepted {
            prop_assert!(matches!(outcome, RunOutcome::Completed { .. }), "{:?}", outcome);
        } else {
            prop_assert_eq!(
                outcome,
                RunOutcome::NeedsInput { stage: Stage::Enclosure, reason: InputReason::MaxAttemptsReached }
            );
        }
    }

    /// Attempt numbers recorded by the generator rise by one per attempt.
    #[test]
    fn prop_attempts_are_monotonic(reviews in prop::collection::vec(arb_review(), 3)) {
        let (responses, _, _) = script_enclosure_loop(&reviews);
        let backend = ScriptedBackend::from_responses(responses);
        let (state, _) = run_blocking(&backend);

        let recorded: Vec<u64> = state
            .history
            .iter()
            .filter(|h| h.action == "generate_enclosure")
            .filter_map(|h| h.details.as_ref()?.get("attempt")?.as_u64())
            .collect();
        let expected: Vec<u64> = (1..=recorded.len() as u64).collect();
        prop_assert_eq!(recorded, expected);
    }

    /// Exactly one terminal event, always last, and history ids are unique.
    #[test]
    fn prop_stream_has_one_terminal_event(reviews in prop::collection::vec(arb_review(), 3)) {
        let (responses, _, _) = script_enclosure_loop(&reviews);
        let backend = ScriptedBackend::from_responses(responses);
        let (state, events) = run_blocking(&backend);

        let terminals: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_terminal())
            .map(|(i, _)| i)
            .collect();
        prop_assert_eq!(terminals, vec![events.len() - 1]);

        let mut ids: Vec<&str> = state.history.iter().map(|h| h.id.as_str()).collect();
        let total = ids.len();
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), total);
    }

    /// Replaying the spec events of a run and preparing a resume from the
    /// result is stable: preparing twice gives the same starting point.
    #[test]
    fn prop_resume_preparation_is_idempotent(reviews in prop::collection::vec(arb_review(), 3)) {
        let (responses, _, _) = script_enclosure_loop(&reviews);
        let backend = ScriptedBackend::from_responses(responses);
        let (_, events) = run_blocking(&backend);
        let snapshot = snapshot_from(&events, SpecSnapshot::default());

        let first = hwforge::orchestrator::prepare_initial_state(&input(Mode::VibeIt, Some(snapshot.clone())));
        let second = hwforge::orchestrator::prepare_initial_state(&input(Mode::VibeIt, Some(snapshot)));
        prop_assert_eq!(first.current_stage, second.current_stage);
        prop_assert_eq!(first.completed_stages, second.completed_stages);
    }
}
