//! LotoLab Core — draws, features, classifiers, ensemble voting, backtest scoring.
//!
//! This crate contains everything one backtest needs:
//! - Domain types (game parameters, draws, candidate sets)
//! - Draw sources (CSV, synthetic) and integrity checks
//! - Feature extraction with frequency and pattern statistics
//! - Hand-rolled classifiers (random forest, gradient boosting, MLP, nearest centroid)
//! - Ensemble training with per-model scalers and cross-validation
//! - Weighted-vote candidate generation
//! - Portfolio evaluation against an actual draw
//! - The `PredictionEngine` aggregate and its persistence

pub mod data;
pub mod domain;
pub mod engine;
pub mod ensemble;
pub mod evaluate;
pub mod features;
pub mod models;
pub mod rng;
pub mod store;
pub mod vote;

pub use domain::{CandidateSet, Draw, DrawError, DrawRecord, GameSpec, Number};
pub use engine::{EngineConfig, EngineError, LearningAdjustments, PredictionEngine};
pub use evaluate::{evaluate, Evaluation, PortfolioSummary};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: engine state can cross threads, so a host can run
    /// validation on a worker thread.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Draw>();
        require_sync::<domain::Draw>();
        require_send::<domain::CandidateSet>();
        require_sync::<domain::CandidateSet>();
        require_send::<features::FrequencyTable>();
        require_sync::<features::FrequencyTable>();
        require_send::<ensemble::TrainedEnsemble>();
        require_sync::<ensemble::TrainedEnsemble>();
        require_send::<engine::PredictionEngine>();
        require_sync::<engine::PredictionEngine>();
        require_send::<engine::EngineSnapshot>();
        require_sync::<engine::EngineSnapshot>();
        require_send::<rng::RngHierarchy>();
        require_sync::<rng::RngHierarchy>();
        require_send::<store::JsonModelStore>();
        require_sync::<store::JsonModelStore>();
    }
}
