//! The stage graph as an explicit transition table
//!
//! Each node has exactly one outgoing [`Edge`]. Conditional edges are plain
//! functions over [`Decision`], so routing is a table lookup plus a match.
//! Stage completion nodes use [`Edge::NextStage`], which continues at the
//! entry of the first stage not yet complete, the same rule a resumed run
//! starts from.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumIter, IntoStaticStr};

use hwforge_utils::types::Stage;

use crate::decision::Decision;
use crate::state::OrchestratorState;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeId {
    AnalyzeFeasibility,
    AnswerQuestions,
    GenerateBlueprints,
    SelectBlueprint,
    GenerateNames,
    SelectName,
    FinalizeSpec,
    MarkSpecComplete,
    SelectBlocks,
    ValidatePcb,
    MarkPcbComplete,
    GenerateEnclosure,
    ReviewEnclosure,
    DecideEnclosure,
    AcceptEnclosure,
    MarkEnclosureComplete,
    GenerateFirmware,
    ReviewFirmware,
    DecideFirmware,
    AcceptFirmware,
    MarkFirmwareComplete,
    BuildExport,
    MarkExportComplete,
    RequestUserInput,
}

impl NodeId {
    /// Stage a node belongs to. `RequestUserInput` reports the run's current stage.
    #[must_use]
    pub fn stage(&self, state: &OrchestratorState) -> Stage {
        match self {
            Self::AnalyzeFeasibility
            | Self::AnswerQuestions
            | Self::GenerateBlueprints
            | Self::SelectBlueprint
            | Self::GenerateNames
            | Self::SelectName
            | Self::FinalizeSpec
            | Self::MarkSpecComplete => Stage::Spec,
            Self::SelectBlocks | Self::ValidatePcb | Self::MarkPcbComplete => Stage::Pcb,
            Self::GenerateEnclosure
            | Self::ReviewEnclosure
            | Self::DecideEnclosure
            | Self::AcceptEnclosure
            | Self::MarkEnclosureComplete => Stage::Enclosure,
            Self::GenerateFirmware
            | Self::ReviewFirmware
            | Self::DecideFirmware
            | Self::AcceptFirmware
            | Self::MarkFirmwareComplete => Stage::Firmware,
            Self::BuildExport | Self::MarkExportComplete => Stage::Export,
            Self::RequestUserInput => state
                .needs_input
                .map_or(state.current_stage, |needs| needs.stage),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Node(NodeId),
    End,
}

#[derive(Debug, Clone, Copy)]
pub enum Edge {
    Direct(NodeId),
    Conditional(fn(Decision) -> Target),
    /// Entry node of the state's current stage; ends once every stage is complete.
    NextStage,
    End,
}

fn after_feasibility(decision: Decision) -> Target {
    match decision {
        Decision::Reject => Target::End,
        Decision::Accept | Decision::Revise | Decision::Escalate | Decision::Continue => {
            Target::Node(NodeId::AnswerQuestions)
        }
    }
}

fn after_questions(decision: Decision) -> Target {
    match decision {
        Decision::Escalate => Target::Node(NodeId::RequestUserInput),
        Decision::Reject => Target::End,
        Decision::Accept | Decision::Revise | Decision::Continue => {
            Target::Node(NodeId::GenerateBlueprints)
        }
    }
}

fn after_decide_enclosure(decision: Decision) -> Target {
    match decision {
        Decision::Accept => Target::Node(NodeId::AcceptEnclosure),
        Decision::Revise => Target::Node(NodeId::GenerateEnclosure),
        Decision::Escalate => Target::Node(NodeId::RequestUserInput),
        Decision::Reject | Decision::Continue => Target::End,
    }
}

fn after_decide_firmware(decision: Decision) -> Target {
    match decision {
        Decision::Accept => Target::Node(NodeId::AcceptFirmware),
        Decision::Revise => Target::Node(NodeId::GenerateFirmware),
        Decision::Escalate => Target::Node(NodeId::RequestUserInput),
        Decision::Reject | Decision::Continue => Target::End,
    }
}

/// Node table plus routing. Stateless; build once and share.
#[derive(Debug, Clone)]
pub struct OrchestratorGraph {
    edges: BTreeMap<NodeId, Edge>,
}

/// Build the full five-stage topology.
#[must_use]
pub fn create_orchestrator_graph() -> OrchestratorGraph {
    use NodeId::*;

    let edges = BTreeMap::from([
        (AnalyzeFeasibility, Edge::Conditional(after_feasibility)),
        (AnswerQuestions, Edge::Conditional(after_questions)),
        (GenerateBlueprints, Edge::Direct(SelectBlueprint)),
        (SelectBlueprint, Edge::Direct(GenerateNames)),
        (GenerateNames, Edge::Direct(SelectName)),
        (SelectName, Edge::Direct(FinalizeSpec)),
        (FinalizeSpec, Edge::Direct(MarkSpecComplete)),
        (MarkSpecComplete, Edge::NextStage),
        (SelectBlocks, Edge::Direct(ValidatePcb)),
        (ValidatePcb, Edge::Direct(MarkPcbComplete)),
        (MarkPcbComplete, Edge::NextStage),
        (GenerateEnclosure, Edge::Direct(ReviewEnclosure)),
        (ReviewEnclosure, Edge::Direct(DecideEnclosure)),
        (DecideEnclosure, Edge::Conditional(after_decide_enclosure)),
        (AcceptEnclosure, Edge::Direct(MarkEnclosureComplete)),
        (MarkEnclosureComplete, Edge::NextStage),
        (GenerateFirmware, Edge::Direct(ReviewFirmware)),
        (ReviewFirmware, Edge::Direct(DecideFirmware)),
        (DecideFirmware, Edge::Conditional(after_decide_firmware)),
        (AcceptFirmware, Edge::Direct(MarkFirmwareComplete)),
        (MarkFirmwareComplete, Edge::NextStage),
        (BuildExport, Edge::Direct(MarkExportComplete)),
        (MarkExportComplete, Edge::NextStage),
        (RequestUserInput, Edge::End),
    ]);

    OrchestratorGraph { edges }
}

impl OrchestratorGraph {
    #[must_use]
    pub fn edge(&self, node: NodeId) -> Option<Edge> {
        self.edges.get(&node).copied()
    }

    /// Where to go after `node` returned `decision`.
    ///
    /// An error on the state ends the run regardless of the edge.
    #[must_use]
    pub fn next(&self, node: NodeId, decision: Decision, state: &OrchestratorState) -> Target {
        if state.error.is_some() {
            return Target::End;
        }
        match self.edge(node) {
            Some(Edge::Direct(next)) => Target::Node(next),
            Some(Edge::Conditional(route)) => route(decision),
            Some(Edge::NextStage) => self.entry_for(state),
            Some(Edge::End) | None => Target::End,
        }
    }

    /// First node for a run, from the stage the state resumes in.
    ///
    /// A state that is complete or already rejected has nothing left to run.
    #[must_use]
    pub fn entry_for(&self, state: &OrchestratorState) -> Target {
        if state.is_complete() || state.rejection.is_some() {
            return Target::End;
        }
        let node = match state.current_stage {
            Stage::Spec if state.final_spec.is_some() => NodeId::MarkSpecComplete,
            Stage::Spec if state.feasibility.is_some() => NodeId::AnswerQuestions,
            Stage::Spec => NodeId::AnalyzeFeasibility,
            Stage::Pcb => NodeId::SelectBlocks,
            Stage::Enclosure => NodeId::GenerateEnclosure,
            Stage::Firmware => NodeId::GenerateFirmware,
            Stage::Export => NodeId::BuildExport,
        };
        Target::Node(node)
    }
}
