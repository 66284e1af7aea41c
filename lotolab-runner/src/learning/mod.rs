//! Progressive learning — a resumable ladder of validation stages whose
//! insights accumulate into the production engine.

pub mod insights;
pub mod manager;
pub mod stages;
pub mod state;

pub use insights::{PatternInsights, StageAnalysis};
pub use manager::{
    EnsembleOptimization, LearningConfig, LearningError, LearningProgress, ProgressiveLearningManager, StageOutcome,
    StageResult,
};
pub use stages::{find_stage, LearningStage, StageKind, StageStatus, STAGES};
pub use state::{JsonStateStore, LearningState, MemoryStateStore, StageInsights, StateStore};
