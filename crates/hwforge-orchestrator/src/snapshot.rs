//! Persisted project spec: the resume boundary between runs
//!
//! The driver emits a [`SpecPatch`] for every node that changes a persisted
//! artifact or a stage status. Applying the patches in order to the input
//! snapshot yields the snapshot a later run can resume from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use hwforge_utils::atomic_write::write_file_atomic;
use hwforge_utils::types::Stage;

use crate::artifacts::{
    Blueprint, DesignDecision, EnclosureArtifact, ExportManifest, Feasibility, FirmwareArtifact,
    PcbArtifact,
};
use crate::error::OrchestratorError;
use crate::state::StateUpdate;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    Pending,
    InProgress,
    Complete,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRecord {
    pub status: StageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl StageRecord {
    #[must_use]
    pub fn in_progress() -> Self {
        Self {
            status: StageStatus::InProgress,
            completed_at: None,
        }
    }

    #[must_use]
    pub fn complete(at: DateTime<Utc>) -> Self {
        Self {
            status: StageStatus::Complete,
            completed_at: Some(at),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpecSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feasibility: Option<Feasibility>,
    pub decisions: Vec<DesignDecision>,
    pub blueprints: Vec<Blueprint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_blueprint: Option<Blueprint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_spec: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pcb: Option<PcbArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enclosure: Option<EnclosureArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware: Option<FirmwareArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<ExportManifest>,
    pub stages: BTreeMap<Stage, StageRecord>,
}

impl SpecSnapshot {
    /// Load a snapshot from a JSON file.
    ///
    /// # Errors
    ///
    /// `SnapshotIo` if the file cannot be read, `SnapshotJson` if it does not parse.
    pub fn load(path: &Path) -> Result<Self, OrchestratorError> {
        let raw = std::fs::read_to_string(path).map_err(|e| OrchestratorError::SnapshotIo {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&raw).map_err(OrchestratorError::SnapshotJson)
    }

    /// Write the snapshot atomically as pretty JSON.
    ///
    /// # Errors
    ///
    /// `Serialization` if the snapshot cannot be encoded, `SnapshotIo` if the
    /// write fails.
    pub fn save(&self, path: &Path) -> Result<(), OrchestratorError> {
        let json = serde_json::to_string_pretty(self)?;
        write_file_atomic(path, &json).map_err(|e| OrchestratorError::SnapshotIo {
            path: path.display().to_string(),
            reason: format!("{e:#}"),
        })
    }

    #[must_use]
    pub fn stage_status(&self, stage: Stage) -> StageStatus {
        self.stages
            .get(&stage)
            .map(|r| r.status)
            .unwrap_or_default()
    }

    pub fn apply_patch(&mut self, patch: SpecPatch) {
        let SpecPatch {
            feasibility,
            decisions,
            blueprints,
            selected_blueprint,
            product_name,
            final_spec,
            pcb,
            enclosure,
            firmware,
            export,
            stages,
        } = patch;

        set(&mut self.feasibility, feasibility);
        self.decisions.extend(decisions);
        if let Some(blueprints) = blueprints {
            self.blueprints = blueprints;
        }
        set(&mut self.selected_blueprint, selected_blueprint);
        set(&mut self.product_name, product_name);
        set(&mut self.final_spec, final_spec);
        set(&mut self.pcb, pcb);
        set(&mut self.enclosure, enclosure);
        set(&mut self.firmware, firmware);
        set(&mut self.export, export);
        for (stage, record) in stages {
            // A complete stage stays complete.
            if self.stage_status(stage) != StageStatus::Complete {
                self.stages.insert(stage, record);
            }
        }
    }
}

fn set<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

/// Incremental change to a [`SpecSnapshot`]; `decisions` are appended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpecPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feasibility: Option<Feasibility>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub decisions: Vec<DesignDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blueprints: Option<Vec<Blueprint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_blueprint: Option<Blueprint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_spec: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pcb: Option<PcbArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enclosure: Option<EnclosureArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware: Option<FirmwareArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<ExportManifest>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub stages: BTreeMap<Stage, StageRecord>,
}

impl SpecPatch {
    /// The persisted part of a node's update, or `None` if nothing persisted changed.
    #[must_use]
    pub fn from_update(update: &StateUpdate, now: DateTime<Utc>) -> Option<Self> {
        let mut patch = Self {
            feasibility: update.feasibility.clone(),
            decisions: update.decisions.clone(),
            blueprints: update.blueprints.clone(),
            selected_blueprint: update.selected_blueprint.clone(),
            product_name: update.product_name.clone(),
            final_spec: update.final_spec.clone(),
            pcb: update.pcb.clone(),
            enclosure: update.enclosure.clone(),
            firmware: update.firmware.clone(),
            export: update.export.clone(),
            stages: BTreeMap::new(),
        };

        for stage in &update.completed_stages {
            patch.stages.insert(*stage, StageRecord::complete(now));
        }
        if let Some(stage) = update.current_stage
            && !update.completed_stages.contains(&stage)
        {
            patch.stages.insert(stage, StageRecord::in_progress());
        }

        (!patch.is_empty()).then_some(patch)
    }

    /// Opening patch for a run: the stage it starts in is now in progress.
    #[must_use]
    pub fn started(stage: Stage) -> Self {
        let mut patch = Self::default();
        patch.stages.insert(stage, StageRecord::in_progress());
        patch
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
