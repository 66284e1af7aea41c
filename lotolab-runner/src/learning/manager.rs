//! ProgressiveLearningManager — runs stages, merges insights, persists state.
//!
//! Each call to [`ProgressiveLearningManager::execute_learning_stage`] works on
//! a copy of the state. Unknown stages, locked stages, validation stages that
//! record no backtests and an ensemble stage run against an untrained engine
//! fail before anything changes. Once a stage has run,
//! the new state replaces the old in memory and is saved; if saving fails the
//! caller gets [`LearningError::Persistence`] with the finished outcome and can
//! retry with [`ProgressiveLearningManager::persist_state`], after
//! [`ProgressiveLearningManager::reload_state`] when another writer got there
//! first.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lotolab_core::data::{DataSource, DataSourceError};
use lotolab_core::engine::PredictionEngine;
use lotolab_core::ensemble::{ModelWeights, GRADIENT_BOOST, NEURAL_NETWORK, RANDOM_FOREST};
use lotolab_core::store::{ModelStore, StoreError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::insights::{
    analyze_expanding, analyze_fixed, extract_feature_weights, extract_pattern_insights, merge_feature_weights,
    PatternInsights, StageAnalysis,
};
use super::stages::{find_stage, stage_statuses, LearningStage, StageInfo, StageKind, STAGES};
use super::state::{LearningState, StageInsights, StateStore};
use crate::progress::{NoProgress, ValidationProgress};
use crate::validator::{BacktestResult, TimeSeriesValidator, ValidationConfig, ValidationError};

/// Backtests kept verbatim in a stage result.
const SAMPLE_RESULTS: usize = 5;

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Best-candidate matches for a backtest to count as high-accuracy.
    pub high_accuracy_threshold: usize,
    /// Weight of the old value in the feature-weight EMA.
    pub ema_factor: f64,
    /// Mean avg-matches above which the ensemble shifts weight to the neural net.
    pub neural_weight_threshold: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            high_accuracy_threshold: 4,
            ema_factor: 0.7,
            neural_weight_threshold: 3.0,
        }
    }
}

// ─── Results ─────────────────────────────────────────────────────────

/// What stage 5 derived and applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleOptimization {
    pub model_weights: ModelWeights,
    pub feature_weights: BTreeMap<String, f64>,
    pub pattern_adjustments: PatternInsights,
    pub stages_integrated: usize,
    /// Whether the updated engine was written to the model store.
    pub engine_saved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage_id: String,
    pub kind: StageKind,
    pub total_tests: usize,
    pub analysis: StageAnalysis,
    pub feature_weights: BTreeMap<String, f64>,
    pub pattern_insights: PatternInsights,
    pub optimization: Option<EnsembleOptimization>,
    /// The first few backtests, for display.
    pub sample_results: Vec<BacktestResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningProgress {
    pub total_stages: usize,
    pub completed_stages: usize,
    pub progress_percentage: f64,
    pub stages: Vec<StageInfo>,
    pub last_updated: Option<DateTime<Utc>>,
    pub accumulated_insights: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub stage_result: StageResult,
    pub progress: LearningProgress,
}

#[derive(Debug, Error)]
pub enum LearningError {
    #[error("unknown learning stage: {0}")]
    InvalidStage(String),

    #[error("stage {stage} is locked: requires {requires}")]
    PrerequisiteNotMet { stage: String, requires: String },

    #[error("stage {stage} recorded no backtests")]
    NoBacktests { stage: String },

    #[error("stage {stage} needs a trained production engine")]
    EngineNotTrained { stage: String },

    #[error(transparent)]
    Data(#[from] DataSourceError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("stage {} finished but could not be saved: {source}", .outcome.stage_result.stage_id)]
    Persistence {
        outcome: Box<StageOutcome>,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ─── Manager ─────────────────────────────────────────────────────────

pub struct ProgressiveLearningManager {
    engine: PredictionEngine,
    source: Arc<dyn DataSource>,
    state_store: Arc<dyn StateStore>,
    model_store: Option<Arc<dyn ModelStore>>,
    progress: Arc<dyn ValidationProgress>,
    validation: ValidationConfig,
    config: LearningConfig,
    state: LearningState,
}

impl ProgressiveLearningManager {
    /// Loads the persisted state; a missing document starts empty.
    pub fn new(
        engine: PredictionEngine,
        source: Arc<dyn DataSource>,
        state_store: Arc<dyn StateStore>,
        validation: ValidationConfig,
        config: LearningConfig,
    ) -> Result<Self, LearningError> {
        let state = state_store.load()?.unwrap_or_default();
        tracing::info!(
            completed = state.stages_completed.len(),
            version = state.version,
            "learning state loaded"
        );
        Ok(Self {
            engine,
            source,
            state_store,
            model_store: None,
            progress: Arc::new(NoProgress),
            validation,
            config,
            state,
        })
    }

    pub fn with_model_store(mut self, store: Arc<dyn ModelStore>) -> Self {
        self.model_store = Some(store);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ValidationProgress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn state(&self) -> &LearningState {
        &self.state
    }

    pub fn engine(&self) -> &PredictionEngine {
        &self.engine
    }

    pub fn into_engine(self) -> PredictionEngine {
        self.engine
    }

    pub fn execute_learning_stage(&mut self, stage_id: &str) -> Result<StageOutcome, LearningError> {
        let stage = find_stage(stage_id).ok_or_else(|| LearningError::InvalidStage(stage_id.to_string()))?;
        if !stage.prerequisites_met(&self.state.stages_completed) {
            return Err(LearningError::PrerequisiteNotMet {
                stage: stage.id.to_string(),
                requires: stage.requirement(),
            });
        }
        if stage.kind == StageKind::EnsembleOptimization && !self.engine.is_trained() {
            return Err(LearningError::EngineNotTrained {
                stage: stage.id.to_string(),
            });
        }

        tracing::info!(stage = stage.id, name = stage.name, "learning stage started");
        let stage_result = match stage.kind {
            StageKind::FixedWindow { .. } | StageKind::ExpandingWindow => self.run_validation_stage(stage)?,
            StageKind::EnsembleOptimization => self.run_ensemble_stage(stage),
        };

        let mut next = self.state.clone();
        accumulate(&mut next, &stage_result, self.config.ema_factor);
        if !next.is_completed(stage.id) {
            next.stages_completed.push(stage.id.to_string());
        }
        next.last_updated = Some(Utc::now());
        self.state = next;

        let mut stage_result = stage_result;
        if let Some(opt) = stage_result.optimization.as_mut() {
            opt.engine_saved = self.model_store.is_some() && self.engine.is_trained();
        }
        let outcome = StageOutcome {
            stage_result,
            progress: self.get_learning_progress(),
        };

        if let Err(source) = self.persist_state() {
            tracing::warn!(stage = stage.id, error = %source, "stage completed but not persisted");
            return Err(LearningError::Persistence {
                outcome: Box::new(outcome),
                source,
            });
        }

        tracing::info!(
            stage = stage.id,
            completed = outcome.progress.completed_stages,
            "learning stage complete"
        );
        Ok(outcome)
    }

    /// Save the in-memory state, and the engine when a model store is set.
    /// A [`StoreError::VersionConflict`] persists until
    /// [`reload_state`](Self::reload_state) rebases onto the stored version.
    pub fn persist_state(&mut self) -> Result<(), StoreError> {
        if let (Some(store), Some(snapshot)) = (&self.model_store, self.engine.snapshot()) {
            store.save(&snapshot)?;
        }
        self.state.version = self.state_store.save(&self.state, self.state.version)?;
        Ok(())
    }

    /// Re-read the stored state and replay on top of it every stage completed
    /// here but missing there. After a version conflict this rebases the
    /// in-memory progress so [`persist_state`](Self::persist_state) can
    /// succeed. Returns the number of stages replayed.
    pub fn reload_state(&mut self) -> Result<usize, LearningError> {
        let mut stored = self.state_store.load()?.unwrap_or_default();
        let mut replayed = 0;
        for id in &self.state.stages_completed {
            if stored.is_completed(id) {
                continue;
            }
            let Some(insights) = self.state.accumulated_insights.get(id) else {
                continue;
            };
            apply_insights(&mut stored, id, insights.clone(), self.config.ema_factor);
            stored.stages_completed.push(id.clone());
            replayed += 1;
        }
        if replayed > 0 {
            stored.last_updated = self.state.last_updated;
        }
        tracing::info!(version = stored.version, replayed, "learning state reloaded");
        self.state = stored;
        Ok(replayed)
    }

    pub fn get_learning_progress(&self) -> LearningProgress {
        let total = STAGES.len();
        let completed = self.state.stages_completed.len();
        LearningProgress {
            total_stages: total,
            completed_stages: completed,
            progress_percentage: completed as f64 / total as f64 * 100.0,
            stages: stage_statuses(&self.state.stages_completed),
            last_updated: self.state.last_updated,
            accumulated_insights: self.state.accumulated_insights.len(),
        }
    }

    /// Clear every completed stage and accumulated insight.
    pub fn reset_learning_progress(&mut self) -> Result<(), LearningError> {
        let cleared = self.state.cleared();
        let version = self.state_store.save(&cleared, self.state.version)?;
        self.state = LearningState { version, ..cleared };
        tracing::info!(version, "learning progress reset");
        Ok(())
    }

    // ── Stage procedures ──

    fn run_validation_stage(&self, stage: &LearningStage) -> Result<StageResult, LearningError> {
        let records = self.source.fetch_draws()?;
        let validator = TimeSeriesValidator::new(self.engine.config().clone(), self.validation.clone())
            .with_progress(Arc::clone(&self.progress));
        let game = *self.engine.game();

        let (results, analysis) = match stage.kind {
            StageKind::FixedWindow { window_size } => {
                let mut by_window = validator.fixed_window_validation(&records, &[window_size])?;
                let results = by_window.remove(&window_size).unwrap_or_default();
                let analysis = analyze_fixed(&results, window_size);
                (results, analysis)
            }
            _ => {
                let results = validator.expanding_window_validation(&records)?;
                let analysis = analyze_expanding(&results);
                (results, analysis)
            }
        };

        if results.is_empty() {
            return Err(LearningError::NoBacktests {
                stage: stage.id.to_string(),
            });
        }

        let threshold = self.config.high_accuracy_threshold;
        Ok(StageResult {
            stage_id: stage.id.to_string(),
            kind: stage.kind,
            total_tests: results.len(),
            analysis,
            feature_weights: extract_feature_weights(&results, &game, threshold),
            pattern_insights: extract_pattern_insights(&results, threshold),
            optimization: None,
            sample_results: results.into_iter().take(SAMPLE_RESULTS).collect(),
        })
    }

    /// Derive final weights and patterns from the accumulated state and apply
    /// them to the production engine.
    fn run_ensemble_stage(&mut self, stage: &LearningStage) -> StageResult {
        let model_weights = optimize_model_weights(&self.state, self.config.neural_weight_threshold);
        let feature_weights = self.state.feature_weights.clone();
        let pattern_adjustments = self.state.pattern_adjustments.clone();

        self.engine.set_model_weights(&model_weights);
        if pattern_adjustments.target_sum().is_some() || pattern_adjustments.optimal_odd_count.is_some() {
            self.engine.set_pattern_targets(
                pattern_adjustments.target_sum(),
                pattern_adjustments.optimal_odd_count.map(|o| o as f64),
            );
        }
        tracing::info!(weights = ?model_weights, "optimizations applied to engine");

        StageResult {
            stage_id: stage.id.to_string(),
            kind: stage.kind,
            total_tests: 0,
            analysis: StageAnalysis::None,
            feature_weights: BTreeMap::new(),
            pattern_insights: PatternInsights::default(),
            optimization: Some(EnsembleOptimization {
                model_weights,
                feature_weights,
                pattern_adjustments,
                stages_integrated: self.state.accumulated_insights.len(),
                engine_saved: false,
            }),
            sample_results: Vec::new(),
        }
    }
}

fn accumulate(state: &mut LearningState, result: &StageResult, ema_factor: f64) {
    let insights = StageInsights {
        recorded_at: Utc::now(),
        analysis: result.analysis.clone(),
        feature_weights: result.feature_weights.clone(),
        pattern_insights: result.pattern_insights.clone(),
    };
    apply_insights(state, &result.stage_id, insights, ema_factor);
}

fn apply_insights(state: &mut LearningState, stage_id: &str, insights: StageInsights, ema_factor: f64) {
    merge_feature_weights(&mut state.feature_weights, &insights.feature_weights, ema_factor);
    state.pattern_adjustments.merge_latest(&insights.pattern_insights);
    state.accumulated_insights.insert(stage_id.to_string(), insights);
}

/// Defaults rf 0.40 / gb 0.35 / nn 0.25; rf 0.35 / gb 0.30 / nn 0.35 once the
/// mean avg-matches across recorded analyses exceeds `neural_threshold`.
pub fn optimize_model_weights(state: &LearningState, neural_threshold: f64) -> ModelWeights {
    let avgs: Vec<f64> = state
        .accumulated_insights
        .values()
        .filter_map(|i| i.analysis.avg_matches())
        .collect();
    if !avgs.is_empty() {
        let mean = avgs.iter().sum::<f64>() / avgs.len() as f64;
        if mean > neural_threshold {
            return ModelWeights::from_pairs(&[(RANDOM_FOREST, 0.35), (GRADIENT_BOOST, 0.30), (NEURAL_NETWORK, 0.35)]);
        }
    }
    ModelWeights::default()
}
