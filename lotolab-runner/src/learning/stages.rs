//! Stage ladder — five named learning stages with prerequisites.
//!
//! Later stages must "earn" their place:
//! - **stage1_fixed_10:** fixed-window validation over 10-draw windows.
//! - **stage2_fixed_20:** 20-draw windows, after stage 1.
//! - **stage3_fixed_30:** 30-draw windows, after stage 2.
//! - **stage4_expanding:** expanding-window validation, after stage 1.
//! - **stage5_ensemble:** folds every accumulated insight into the production
//!   engine, once any three stages are complete.
//!
//! Locked stages are rejected outright; there is no soft override.

use serde::{Deserialize, Serialize};

// ─── Stage table ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageKind {
    FixedWindow { window_size: usize },
    ExpandingWindow,
    EnsembleOptimization,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Prerequisite {
    None,
    /// This stage must be completed first.
    Stage(&'static str),
    /// At least this many stages of any kind must be completed.
    CompletedCount(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LearningStage {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub kind: StageKind,
    pub prerequisite: Prerequisite,
}

pub const STAGE1_FIXED_10: &str = "stage1_fixed_10";
pub const STAGE2_FIXED_20: &str = "stage2_fixed_20";
pub const STAGE3_FIXED_30: &str = "stage3_fixed_30";
pub const STAGE4_EXPANDING: &str = "stage4_expanding";
pub const STAGE5_ENSEMBLE: &str = "stage5_ensemble";

pub const STAGES: [LearningStage; 5] = [
    LearningStage {
        id: STAGE1_FIXED_10,
        name: "Fixed window (10 draws)",
        description: "Prediction patterns over the most recent 10-draw windows",
        kind: StageKind::FixedWindow { window_size: 10 },
        prerequisite: Prerequisite::None,
    },
    LearningStage {
        id: STAGE2_FIXED_20,
        name: "Fixed window (20 draws)",
        description: "Prediction patterns over medium 20-draw windows",
        kind: StageKind::FixedWindow { window_size: 20 },
        prerequisite: Prerequisite::Stage(STAGE1_FIXED_10),
    },
    LearningStage {
        id: STAGE3_FIXED_30,
        name: "Fixed window (30 draws)",
        description: "Prediction patterns over long 30-draw windows",
        kind: StageKind::FixedWindow { window_size: 30 },
        prerequisite: Prerequisite::Stage(STAGE2_FIXED_20),
    },
    LearningStage {
        id: STAGE4_EXPANDING,
        name: "Expanding window",
        description: "Cumulative training over the whole history",
        kind: StageKind::ExpandingWindow,
        prerequisite: Prerequisite::Stage(STAGE1_FIXED_10),
    },
    LearningStage {
        id: STAGE5_ENSEMBLE,
        name: "Ensemble optimization",
        description: "Merge every stage's insights into the production engine",
        kind: StageKind::EnsembleOptimization,
        prerequisite: Prerequisite::CompletedCount(3),
    },
];

pub fn find_stage(id: &str) -> Option<&'static LearningStage> {
    STAGES.iter().find(|s| s.id == id)
}

// ─── Status ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Locked,
    Available,
    Completed,
}

impl LearningStage {
    pub fn prerequisites_met(&self, completed: &[String]) -> bool {
        match self.prerequisite {
            Prerequisite::None => true,
            Prerequisite::Stage(id) => completed.iter().any(|c| c == id),
            Prerequisite::CompletedCount(n) => completed.len() >= n,
        }
    }

    /// Completed takes precedence over locked, so a stage completed before a
    /// reset of its prerequisite still reads as completed.
    pub fn status(&self, completed: &[String]) -> StageStatus {
        if completed.iter().any(|c| c == self.id) {
            StageStatus::Completed
        } else if self.prerequisites_met(completed) {
            StageStatus::Available
        } else {
            StageStatus::Locked
        }
    }

    /// Human-readable prerequisite, for error messages.
    pub fn requirement(&self) -> String {
        match self.prerequisite {
            Prerequisite::None => "none".into(),
            Prerequisite::Stage(id) => format!("{id} completed"),
            Prerequisite::CompletedCount(n) => format!("at least {n} completed stages"),
        }
    }
}

/// One row of the progress table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub kind: StageKind,
    pub status: StageStatus,
}

pub fn stage_statuses(completed: &[String]) -> Vec<StageInfo> {
    STAGES
        .iter()
        .map(|s| StageInfo {
            id: s.id.to_string(),
            name: s.name.to_string(),
            description: s.description.to_string(),
            kind: s.kind,
            status: s.status(completed),
        })
        .collect()
}
