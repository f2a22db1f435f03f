//! Core identifiers shared across the hwforge crates.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// The five sequential design stages of a hardware project.
///
/// Stages are strictly forward-only: a run never re-enters a stage that has
/// already been marked complete.
///
/// # Serialization
///
/// `Stage` serializes to its lowercase name (e.g., `"spec"`, `"pcb"`).
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
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Stage {
    /// Feasibility, questions, blueprint, naming, and the final spec.
    Spec,
    /// Block selection, placement, and validation.
    Pcb,
    /// OpenSCAD enclosure generation and review loop.
    Enclosure,
    /// Firmware scaffold generation and review loop.
    Firmware,
    /// Manifest assembly for manufacturing hand-off.
    Export,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ORDER: [Stage; 5] = [
        Stage::Spec,
        Stage::Pcb,
        Stage::Enclosure,
        Stage::Firmware,
        Stage::Export,
    ];

    /// Returns the canonical lowercase name used in snapshots and events.
    ///
    /// ```rust
    /// use hwforge_utils::types::Stage;
    ///
    /// assert_eq!(Stage::Spec.as_str(), "spec");
    /// assert_eq!(Stage::Firmware.as_str(), "firmware");
    /// ```
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Spec => "spec",
            Self::Pcb => "pcb",
            Self::Enclosure => "enclosure",
            Self::Firmware => "firmware",
            Self::Export => "export",
        }
    }

    /// The stage that follows this one, or `None` for `Export`.
    #[must_use]
    pub const fn next(&self) -> Option<Stage> {
        match self {
            Self::Spec => Some(Self::Pcb),
            Self::Pcb => Some(Self::Enclosure),
            Self::Enclosure => Some(Self::Firmware),
            Self::Firmware => Some(Self::Export),
            Self::Export => None,
        }
    }
}

/// How much autonomy the pipeline has when it meets an open question.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Mode {
    /// Fully unattended: questions are answered automatically.
    VibeIt,
    /// Targeted fixes on an existing design.
    FixIt,
    /// Collaborative design with a human in the loop.
    DesignIt,
}

impl Mode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::VibeIt => "vibe_it",
            Self::FixIt => "fix_it",
            Self::DesignIt => "design_it",
        }
    }
}
