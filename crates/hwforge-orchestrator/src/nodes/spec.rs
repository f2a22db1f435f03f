//! Spec-stage nodes: single pass, no review loop

use serde_json::{json, Value};
use tracing::info;

use hwforge_llm::extraction::parse_json;
use hwforge_prompts as prompts;
use hwforge_utils::types::Stage;

use super::{ask, require, NodeContext, NodeOutcome};
use crate::artifacts::{
    list_in, Blueprint, DesignDecision, Feasibility, InputReason, NameOption, NeedsInput,
};
use crate::decision::Decision;
use crate::error::OrchestratorError;
use crate::graph::NodeId;
use crate::history::HistoryItem;
use crate::state::{OrchestratorState, StateUpdate};

const CREATIVE_TEMPERATURE: f32 = 0.7;

pub(super) async fn analyze_feasibility(
    state: &OrchestratorState,
    ctx: &NodeContext,
) -> Result<NodeOutcome, OrchestratorError> {
    let node = NodeId::AnalyzeFeasibility;
    let reply = ask(ctx, state, Stage::Spec, prompts::feasibility(&state.description), None).await?;
    let feasibility: Feasibility = parse_json(&reply).ok_or(OrchestratorError::Parse {
        node,
        what: "feasibility analysis",
    })?;

    if let Some(rejection) = feasibility.rejection() {
        info!(reason = %rejection.reason, "Feasibility rejected the product");

        let item = HistoryItem::validation(Stage::Spec, node.to_string())
            .with_result(format!("Rejected: {}", rejection.reason))
            .with_details(json!({ "suggestedRevisions": rejection.suggested_revisions }));
        let update = StateUpdate {
            rejection: Some(rejection),
            feasibility: Some(feasibility),
            ..StateUpdate::default().with_history(item)
        };
        return Ok(NodeOutcome::decided(update, Decision::Reject));
    }

    let item = HistoryItem::tool_result(Stage::Spec, node.to_string())
        .with_result(feasibility.summary.clone())
        .with_details(json!({
            "openQuestions": feasibility.open_questions.len(),
            "risks": feasibility.risks.len(),
        }));
    Ok(NodeOutcome::proceed(StateUpdate {
        open_questions: Some(feasibility.open_questions.clone()),
        feasibility: Some(feasibility),
        ..StateUpdate::default().with_history(item)
    }))
}

/// Auto-answers in the configured modes; other modes pause for a person.
pub(super) fn answer_questions(
    state: &OrchestratorState,
    ctx: &NodeContext,
) -> Result<NodeOutcome, OrchestratorError> {
    let node = NodeId::AnswerQuestions;

    if state.open_questions.is_empty() {
        let item = HistoryItem::progress(Stage::Spec, node.to_string())
            .with_result("No questions to answer");
        return Ok(NodeOutcome::proceed(StateUpdate::default().with_history(item)));
    }

    if !ctx.settings.auto_answers(state.mode) {
        let item = HistoryItem::progress(Stage::Spec, node.to_string())
            .with_result(format!(
                "{} open questions need answers in {} mode",
                state.open_questions.len(),
                state.mode
            ))
            .with_details(json!({ "questions": state.open_questions }));
        let update = StateUpdate {
            needs_input: Some(NeedsInput {
                stage: Stage::Spec,
                reason: InputReason::OpenQuestions,
            }),
            ..StateUpdate::default().with_history(item)
        };
        return Ok(NodeOutcome::decided(update, Decision::Escalate));
    }

    let decisions: Vec<DesignDecision> = state
        .open_questions
        .iter()
        .map(|q| DesignDecision {
            question_id: q.id.clone(),
            question: q.question.clone(),
            answer: q
                .options
                .first()
                .cloned()
                .unwrap_or_else(|| "Designer's choice".to_string()),
            auto: true,
        })
        .collect();

    let item = HistoryItem::tool_result(Stage::Spec, node.to_string())
        .with_result(format!("Auto-answered {} questions", decisions.len()));
    Ok(NodeOutcome::proceed(StateUpdate {
        decisions,
        open_questions: Some(Vec::new()),
        ..StateUpdate::default().with_history(item)
    }))
}

pub(super) async fn generate_blueprints(
    state: &OrchestratorState,
    ctx: &NodeContext,
) -> Result<NodeOutcome, OrchestratorError> {
    let node = NodeId::GenerateBlueprints;
    let feasibility = require(state.feasibility.as_ref(), node, "a feasibility analysis")?;

    let prompt = prompts::blueprints(
        &state.description,
        &serde_json::to_value(feasibility)?,
        &serde_json::to_value(&state.decisions)?,
    );
    let reply = ask(ctx, state, Stage::Spec, prompt, Some(CREATIVE_TEMPERATURE)).await?;

    let mut blueprints: Vec<Blueprint> =
        parse_list(&reply, "blueprints").ok_or(OrchestratorError::Parse {
            node,
            what: "blueprints",
        })?;
    for (i, blueprint) in blueprints.iter_mut().enumerate() {
        if blueprint.id.trim().is_empty() {
            blueprint.id = format!("b{}", i + 1);
        }
    }

    let item = HistoryItem::tool_result(Stage::Spec, node.to_string())
        .with_result(format!("{} blueprints", blueprints.len()));
    Ok(NodeOutcome::proceed(StateUpdate {
        blueprints: Some(blueprints),
        ..StateUpdate::default().with_history(item)
    }))
}

pub(super) fn select_blueprint(state: &OrchestratorState) -> Result<NodeOutcome, OrchestratorError> {
    let node = NodeId::SelectBlueprint;
    let chosen = require(state.blueprints.first(), node, "generated blueprints")?.clone();

    let item = HistoryItem::progress(Stage::Spec, node.to_string())
        .with_result(format!("Selected \"{}\"", chosen.name));
    Ok(NodeOutcome::proceed(StateUpdate {
        selected_blueprint: Some(chosen),
        ..StateUpdate::default().with_history(item)
    }))
}

pub(super) async fn generate_names(
    state: &OrchestratorState,
    ctx: &NodeContext,
) -> Result<NodeOutcome, OrchestratorError> {
    let node = NodeId::GenerateNames;
    let blueprint = require(state.selected_blueprint.as_ref(), node, "a selected blueprint")?;

    let prompt = prompts::names(&state.description, &serde_json::to_value(blueprint)?);
    let reply = ask(ctx, state, Stage::Spec, prompt, Some(CREATIVE_TEMPERATURE)).await?;
    let names: Vec<NameOption> = parse_list(&reply, "names").ok_or(OrchestratorError::Parse {
        node,
        what: "name options",
    })?;

    let item = HistoryItem::tool_result(Stage::Spec, node.to_string())
        .with_result(format!("{} name options", names.len()));
    Ok(NodeOutcome::proceed(StateUpdate {
        name_options: Some(names),
        ..StateUpdate::default().with_history(item)
    }))
}

pub(super) fn select_name(state: &OrchestratorState) -> Result<NodeOutcome, OrchestratorError> {
    let node = NodeId::SelectName;
    let chosen = require(state.name_options.first(), node, "name options")?;

    let item = HistoryItem::progress(Stage::Spec, node.to_string())
        .with_result(format!("Named \"{}\"", chosen.name));
    Ok(NodeOutcome::proceed(StateUpdate {
        product_name: Some(chosen.name.clone()),
        ..StateUpdate::default().with_history(item)
    }))
}

pub(super) async fn finalize_spec(
    state: &OrchestratorState,
    ctx: &NodeContext,
) -> Result<NodeOutcome, OrchestratorError> {
    let node = NodeId::FinalizeSpec;
    let feasibility = require(state.feasibility.as_ref(), node, "a feasibility analysis")?;
    let blueprint = require(state.selected_blueprint.as_ref(), node, "a selected blueprint")?;
    let product_name = require(state.product_name.as_ref(), node, "a product name")?;

    let prompt = prompts::final_spec(
        &state.description,
        &serde_json::to_value(feasibility)?,
        &serde_json::to_value(&state.decisions)?,
        &serde_json::to_value(blueprint)?,
        product_name,
    );
    let reply = ask(ctx, state, Stage::Spec, prompt, None).await?;

    let mut spec = match parse_json::<Value>(&reply) {
        Some(Value::Object(map)) => map,
        _ => {
            return Err(OrchestratorError::Parse {
                node,
                what: "final spec object",
            });
        }
    };
    spec.entry("productName")
        .or_insert_with(|| Value::String(product_name.clone()));

    let item = HistoryItem::tool_result(Stage::Spec, node.to_string())
        .with_result("Final spec ready")
        .with_details(json!({ "keys": spec.len() }));
    Ok(NodeOutcome::proceed(StateUpdate {
        final_spec: Some(Value::Object(spec)),
        ..StateUpdate::default().with_history(item)
    }))
}

/// Non-empty list under `key` (or a bare array) from a model reply.
fn parse_list<T: serde::de::DeserializeOwned>(reply: &str, key: &str) -> Option<Vec<T>> {
    let value: Value = parse_json(reply)?;
    let items: Vec<T> = serde_json::from_value(list_in(&value, key)?).ok()?;
    (!items.is_empty()).then_some(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::test_support::{context, state};
    use hwforge_llm::ScriptedBackend;
    use hwforge_utils::types::Mode;

    use crate::artifacts::OpenQuestion;

    #[tokio::test]
    async fn test_rejection_carries_reason() {
        let backend = ScriptedBackend::from_responses([
            r#"{"manufacturable": false, "rejectionReason": "needs FPGA", "suggestedRevisions": ["Drop the video pipeline"]}"#,
        ]);
        let outcome = analyze_feasibility(&state(Mode::VibeIt), &context(&backend))
            .await
            .unwrap();

        assert_eq!(outcome.decision, Decision::Reject);
        let rejection = outcome.update.rejection.unwrap();
        assert_eq!(rejection.reason, "needs FPGA");
        assert_eq!(rejection.suggested_revisions, vec!["Drop the video pipeline"]);
    }

    #[tokio::test]
    async fn test_feasibility_parse_failure_is_an_error() {
        let backend = ScriptedBackend::from_responses(["I think this is a great idea!"]);
        let err = analyze_feasibility(&state(Mode::VibeIt), &context(&backend))
            .await
            .unwrap_err();
        assert!(err.is_parse_error());
    }

    #[test]
    fn test_no_questions_is_a_noop() {
        let backend = ScriptedBackend::new();
        let outcome = answer_questions(&state(Mode::VibeIt), &context(&backend)).unwrap();

        assert_eq!(outcome.decision, Decision::Continue);
        assert!(outcome.update.decisions.is_empty());
        assert_eq!(
            outcome.update.history[0].result.as_deref(),
            Some("No questions to answer")
        );
    }

    fn with_questions(mode: Mode) -> OrchestratorState {
        let mut s = state(mode);
        s.open_questions = vec![
            OpenQuestion {
                id: "q1".to_string(),
                question: "Power source?".to_string(),
                options: vec!["USB-C".to_string(), "Battery".to_string()],
            },
            OpenQuestion {
                id: "q2".to_string(),
                question: "Colour?".to_string(),
                options: Vec::new(),
            },
        ];
        s
    }

    #[test]
    fn test_auto_answer_picks_first_option() {
        let backend = ScriptedBackend::new();
        let outcome = answer_questions(&with_questions(Mode::VibeIt), &context(&backend)).unwrap();

        let decisions = &outcome.update.decisions;
        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[0].answer, "USB-C");
        assert!(decisions.iter().all(|d| d.auto));
        assert_eq!(outcome.update.open_questions, Some(Vec::new()));
    }

    #[test]
    fn test_design_mode_pauses_for_input() {
        let backend = ScriptedBackend::new();
        let outcome = answer_questions(&with_questions(Mode::DesignIt), &context(&backend)).unwrap();

        assert_eq!(outcome.decision, Decision::Escalate);
        let needs = outcome.update.needs_input.unwrap();
        assert_eq!(needs.reason, InputReason::OpenQuestions);
        assert!(outcome.update.decisions.is_empty());
    }

    #[tokio::test]
    async fn test_blueprints_get_ids() {
        let backend = ScriptedBackend::from_responses([
            r#"```json
{"blueprints": [{"name": "Cube", "description": "Small cube"}, {"id": "tall", "name": "Tower"}]}
```"#,
        ]);
        let mut s = state(Mode::VibeIt);
        s.feasibility = Some(serde_json::from_value(json!({"manufacturable": true})).unwrap());

        let outcome = generate_blueprints(&s, &context(&backend)).await.unwrap();
        let blueprints = outcome.update.blueprints.unwrap();

        assert_eq!(blueprints[0].id, "b1");
        assert_eq!(blueprints[1].id, "tall");
        let call = &backend.invocations()[0];
        assert_eq!(call.stage, "spec");
    }

    #[tokio::test]
    async fn test_blueprints_require_feasibility() {
        let backend = ScriptedBackend::new();
        let err = generate_blueprints(&state(Mode::VibeIt), &context(&backend))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Precondition { .. }));
        assert!(backend.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_final_spec_fills_product_name() {
        let backend = ScriptedBackend::from_responses([r#"{"summary": "A clock"}"#]);
        let mut s = state(Mode::VibeIt);
        s.feasibility = Some(serde_json::from_value(json!({"manufacturable": true})).unwrap());
        s.selected_blueprint = Some(Blueprint {
            id: "b1".to_string(),
            name: "Cube".to_string(),
            description: String::new(),
            style: String::new(),
        });
        s.product_name = Some("Tocka".to_string());

        let outcome = finalize_spec(&s, &context(&backend)).await.unwrap();
        assert_eq!(outcome.update.final_spec.unwrap()["productName"], "Tocka");
    }

    #[test]
    fn test_parse_list_rejects_empty() {
        assert!(parse_list::<NameOption>(r#"{"names": []}"#, "names").is_none());
        assert_eq!(
            parse_list::<NameOption>(r#"[{"name": "Lumo"}]"#, "names").unwrap()[0].name,
            "Lumo"
        );
    }
}
