//! PredictionEngine — the aggregate that owns every piece of model state.
//!
//! The trained ensemble, vote weights, frequency table, pattern statistics and
//! data count live here as explicit fields. Training replaces the ensemble,
//! frequencies and pattern statistics wholesale and only on success; model
//! weights survive retraining so tuned weights keep applying.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{CandidateSet, DrawError, DrawRecord, GameSpec, Number};
use crate::ensemble::{EnsembleConfig, EnsembleTrainer, ModelWeights, TrainError, TrainedEnsemble, TrainingReport};
use crate::features::{
    ExtractionReport, FeatureError, FeatureExtractor, FrequencyTable, PatternStats, PatternTargets, TargetMode,
};
use crate::vote::{VoteConfig, VoteMode, WeightedVoteGenerator};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub game: GameSpec,
    pub target_mode: TargetMode,
    pub min_rows: usize,
    pub ensemble: EnsembleConfig,
    pub vote: VoteConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            game: GameSpec::LOTO7,
            target_mode: TargetMode::SameDraw,
            min_rows: 100,
            ensemble: EnsembleConfig::default(),
            vote: VoteConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine has not been trained")]
    NotTrained,

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Train(#[from] TrainError),

    #[error("generated an invalid candidate: {0}")]
    Candidate(#[from] DrawError),

    #[error("snapshot is for {found:?} but the engine plays {expected:?}")]
    GameMismatch { expected: GameSpec, found: GameSpec },
}

/// Learned corrections applied by with-learning generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningAdjustments {
    pub boost_numbers: Vec<Number>,
    pub pattern_targets: Option<PatternTargets>,
}

impl LearningAdjustments {
    pub fn is_empty(&self) -> bool {
        self.boost_numbers.is_empty() && self.pattern_targets.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct EngineTraining {
    pub extraction: ExtractionReport,
    pub ensemble: TrainingReport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub mode: VoteMode,
    pub candidates: Vec<CandidateSet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub trained: bool,
    pub models: Vec<String>,
    pub cv_scores: Vec<(String, f64)>,
    pub model_weights: ModelWeights,
    pub data_count: usize,
    pub avg_sum: Option<f64>,
    pub avg_odd: Option<f64>,
    pub top_numbers: Vec<Number>,
}

/// Everything needed to restore an engine without retraining.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub game: GameSpec,
    pub ensemble: TrainedEnsemble,
    pub model_weights: ModelWeights,
    pub frequencies: FrequencyTable,
    pub pattern_stats: Option<PatternStats>,
    pub data_count: usize,
}

#[derive(Debug, Clone)]
pub struct PredictionEngine {
    config: EngineConfig,
    ensemble: Option<TrainedEnsemble>,
    model_weights: ModelWeights,
    frequencies: FrequencyTable,
    pattern_stats: Option<PatternStats>,
    data_count: usize,
}

impl PredictionEngine {
    pub fn new(config: EngineConfig) -> Self {
        let frequencies = FrequencyTable::new(&config.game);
        Self {
            config,
            ensemble: None,
            model_weights: ModelWeights::default(),
            frequencies,
            pattern_stats: None,
            data_count: 0,
        }
    }

    pub fn game(&self) -> &GameSpec {
        &self.config.game
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_trained(&self) -> bool {
        self.ensemble.is_some()
    }

    pub fn ensemble(&self) -> Option<&TrainedEnsemble> {
        self.ensemble.as_ref()
    }

    pub fn model_weights(&self) -> &ModelWeights {
        &self.model_weights
    }

    pub fn frequencies(&self) -> &FrequencyTable {
        &self.frequencies
    }

    pub fn pattern_stats(&self) -> Option<&PatternStats> {
        self.pattern_stats.as_ref()
    }

    pub fn data_count(&self) -> usize {
        self.data_count
    }

    /// Full retrain on `records`. On error the engine is left untouched.
    pub fn train(&mut self, records: &[DrawRecord]) -> Result<EngineTraining, EngineError> {
        let extractor = FeatureExtractor::new(self.config.game, self.config.target_mode, self.config.min_rows);
        let mut frequencies = FrequencyTable::new(&self.config.game);
        let set = extractor.extract(records, &mut frequencies)?;
        let (ensemble, report) = EnsembleTrainer::new(self.config.ensemble.clone()).train(&set.rows(), &set.targets)?;

        tracing::debug!(
            records = records.len(),
            rows = set.len(),
            models = ensemble.len(),
            "engine trained"
        );

        self.ensemble = Some(ensemble);
        self.frequencies = frequencies;
        self.pattern_stats = Some(set.pattern_stats);
        self.data_count = records.len();

        Ok(EngineTraining {
            extraction: set.report,
            ensemble: report,
        })
    }

    /// Generate `count` candidates. Non-empty adjustments switch to
    /// with-learning mode.
    pub fn predict<R: Rng + ?Sized>(
        &self,
        count: usize,
        adjustments: Option<&LearningAdjustments>,
        rng: &mut R,
    ) -> Result<Prediction, EngineError> {
        let ensemble = self.ensemble.as_ref().ok_or(EngineError::NotTrained)?;
        let adjustments = adjustments.filter(|a| !a.is_empty());
        let mode = if adjustments.is_some() {
            VoteMode::WithLearning
        } else {
            VoteMode::Normal
        };

        let fallback;
        let stats = match &self.pattern_stats {
            Some(s) => s,
            None => {
                fallback = PatternStats::fallback(&self.config.game);
                &fallback
            }
        };
        let targets = adjustments.and_then(|a| a.pattern_targets.as_ref());
        let base = stats.base_vector(self.config.game.picks, targets);
        let boost = adjustments.map(|a| a.boost_numbers.as_slice()).unwrap_or(&[]);

        let generator = WeightedVoteGenerator::new(
            self.config.game,
            ensemble,
            &self.model_weights,
            &self.frequencies,
            &self.config.vote,
        );
        let candidates = generator.generate(&base, count, mode, boost, rng)?;
        Ok(Prediction { mode, candidates })
    }

    pub fn set_model_weights(&mut self, weights: &ModelWeights) {
        self.model_weights.update(weights);
    }

    /// Override the sum and odd-count pattern the vote base vector uses.
    pub fn set_pattern_targets(&mut self, avg_sum: Option<f64>, avg_odd: Option<f64>) {
        let stats = self
            .pattern_stats
            .get_or_insert_with(|| PatternStats::fallback(&self.config.game));
        if let Some(sum) = avg_sum {
            stats.avg_sum = sum;
        }
        if let Some(odd) = avg_odd {
            stats.avg_odd = odd;
        }
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            trained: self.is_trained(),
            models: self
                .ensemble
                .as_ref()
                .map(|e| e.names().into_iter().map(String::from).collect())
                .unwrap_or_default(),
            cv_scores: self
                .ensemble
                .as_ref()
                .map(|e| e.models().iter().map(|m| (m.name.clone(), m.cv_score)).collect())
                .unwrap_or_default(),
            model_weights: self.model_weights.clone(),
            data_count: self.data_count,
            avg_sum: self.pattern_stats.as_ref().map(|s| s.avg_sum),
            avg_odd: self.pattern_stats.as_ref().map(|s| s.avg_odd),
            top_numbers: self.frequencies.most_common(10),
        }
    }

    pub fn snapshot(&self) -> Option<EngineSnapshot> {
        Some(EngineSnapshot {
            game: self.config.game,
            ensemble: self.ensemble.clone()?,
            model_weights: self.model_weights.clone(),
            frequencies: self.frequencies.clone(),
            pattern_stats: self.pattern_stats.clone(),
            data_count: self.data_count,
        })
    }

    pub fn restore(&mut self, snapshot: EngineSnapshot) -> Result<(), EngineError> {
        if snapshot.game != self.config.game {
            return Err(EngineError::GameMismatch {
                expected: self.config.game,
                found: snapshot.game,
            });
        }
        self.ensemble = Some(snapshot.ensemble);
        self.model_weights = snapshot.model_weights;
        self.frequencies = snapshot.frequencies;
        self.pattern_stats = snapshot.pattern_stats;
        self.data_count = snapshot.data_count;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::ensemble::test_support::small_config;

    pub fn small_engine() -> PredictionEngine {
        PredictionEngine::new(EngineConfig {
            ensemble: small_config(),
            min_rows: 50,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::small_engine;
    use super::*;
    use crate::data::SyntheticDataSource;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn history(rounds: u32) -> Vec<DrawRecord> {
        SyntheticDataSource::new(GameSpec::LOTO7, rounds, 5).generate()
    }

    #[test]
    fn predict_before_training_fails() {
        let engine = small_engine();
        let err = engine.predict(1, None, &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, EngineError::NotTrained));
    }

    #[test]
    fn train_then_predict() {
        let mut engine = small_engine();
        let training = engine.train(&history(20)).unwrap();
        assert_eq!(training.extraction.rows, 140);
        assert_eq!(engine.data_count(), 20);
        let p = engine.predict(4, None, &mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(p.mode, VoteMode::Normal);
        assert_eq!(p.candidates.len(), 4);
        let status = engine.status();
        assert!(status.trained);
        assert_eq!(status.models.len(), 3);
        assert_eq!(status.top_numbers.len(), 10);
    }

    #[test]
    fn failed_training_leaves_engine_untouched() {
        let mut engine = small_engine();
        engine.train(&history(20)).unwrap();
        let err = engine.train(&history(3)).unwrap_err();
        assert!(matches!(err, EngineError::Feature(FeatureError::InsufficientData { .. })));
        assert_eq!(engine.data_count(), 20);
    }

    #[test]
    fn adjustments_switch_to_learning_mode() {
        let mut engine = small_engine();
        engine.train(&history(20)).unwrap();
        let adj = LearningAdjustments {
            boost_numbers: vec![7, 13],
            pattern_targets: Some(PatternTargets {
                avg_sum: Some(140.0),
                avg_odd_count: None,
            }),
        };
        let p = engine.predict(2, Some(&adj), &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(p.mode, VoteMode::WithLearning);
        let empty = LearningAdjustments::default();
        let p = engine.predict(2, Some(&empty), &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(p.mode, VoteMode::Normal);
    }

    #[test]
    fn weights_survive_retraining() {
        let mut engine = small_engine();
        engine.set_model_weights(&ModelWeights::from_pairs(&[("neural_network", 0.5)]));
        engine.train(&history(20)).unwrap();
        assert_eq!(engine.model_weights().get("neural_network"), 0.5);
        assert_eq!(engine.model_weights().get("random_forest"), 0.40);
    }

    #[test]
    fn snapshot_restores_state() {
        let mut engine = small_engine();
        assert!(engine.snapshot().is_none());
        engine.train(&history(20)).unwrap();
        engine.set_pattern_targets(Some(140.0), Some(4.0));
        let snap = engine.snapshot().unwrap();

        let mut fresh = small_engine();
        fresh.restore(snap).unwrap();
        assert!(fresh.is_trained());
        assert_eq!(fresh.data_count(), 20);
        assert_eq!(fresh.pattern_stats().unwrap().avg_sum, 140.0);

        let mut other = PredictionEngine::new(EngineConfig {
            game: GameSpec::MINI_LOTO,
            ..Default::default()
        });
        let err = other.restore(engine.snapshot().unwrap()).unwrap_err();
        assert!(matches!(err, EngineError::GameMismatch { .. }));
    }
}
