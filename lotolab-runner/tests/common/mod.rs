//! Shared fixtures for runner integration tests.

#![allow(dead_code)]

use lotolab_core::engine::EngineConfig;
use lotolab_core::ensemble::{EnsembleConfig, GRADIENT_BOOST, RANDOM_FOREST};
use lotolab_core::models::{BoostingParams, ForestParams, ModelKind, ModelSpec};
use lotolab_runner::ValidationConfig;

/// Two cheap models so each backtest trains in milliseconds.
pub fn small_engine_config() -> EngineConfig {
    EngineConfig {
        ensemble: EnsembleConfig {
            roster: vec![
                ModelSpec::new(
                    RANDOM_FOREST,
                    ModelKind::RandomForest(ForestParams {
                        n_trees: 3,
                        max_depth: 4,
                        ..Default::default()
                    }),
                ),
                ModelSpec::new(
                    GRADIENT_BOOST,
                    ModelKind::GradientBoosting(BoostingParams {
                        n_rounds: 2,
                        max_depth: 2,
                        ..Default::default()
                    }),
                ),
            ],
            cv_folds: 3,
            seed: 11,
        },
        ..Default::default()
    }
}

pub fn small_validation(fixed_cap: usize, expanding_cap: usize) -> ValidationConfig {
    ValidationConfig {
        fixed_cap,
        expanding_cap,
        ..Default::default()
    }
}
