//! Criterion benchmarks for LotoLab hot paths.
//!
//! Benchmarks:
//! 1. Feature extraction over a 200-draw window
//! 2. Ensemble training per model kind
//! 3. Candidate generation from a trained engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use lotolab_core::data::SyntheticDataSource;
use lotolab_core::domain::{DrawRecord, GameSpec};
use lotolab_core::ensemble::{EnsembleConfig, EnsembleTrainer};
use lotolab_core::features::{FeatureExtractor, FrequencyTable, TargetMode};
use lotolab_core::models::{BoostingParams, ForestParams, MlpParams, ModelKind, ModelSpec};
use lotolab_core::{EngineConfig, PredictionEngine};

// ── Helpers ──────────────────────────────────────────────────────────

const G: GameSpec = GameSpec::LOTO7;

fn history(n: u32) -> Vec<DrawRecord> {
    SyntheticDataSource::new(G, n, 1).generate()
}

fn small_kinds() -> Vec<ModelKind> {
    vec![
        ModelKind::RandomForest(ForestParams {
            n_trees: 20,
            ..Default::default()
        }),
        ModelKind::GradientBoosting(BoostingParams {
            n_rounds: 5,
            ..Default::default()
        }),
        ModelKind::NeuralNet(MlpParams {
            hidden: vec![16],
            epochs: 20,
            ..Default::default()
        }),
        ModelKind::NearestCentroid,
    ]
}

// ── 1. Feature extraction ────────────────────────────────────────────

fn bench_features(c: &mut Criterion) {
    let records = history(200);
    let extractor = FeatureExtractor::new(G, TargetMode::NextDraw, 1);
    c.bench_function("extract_200_draws", |b| {
        b.iter(|| {
            let mut freq = FrequencyTable::new(&G);
            black_box(extractor.extract(black_box(&records), &mut freq).unwrap())
        })
    });
}

// ── 2. Training ──────────────────────────────────────────────────────

fn bench_training(c: &mut Criterion) {
    let records = history(30);
    let mut freq = FrequencyTable::new(&G);
    let set = FeatureExtractor::new(G, TargetMode::SameDraw, 1)
        .extract(&records, &mut freq)
        .unwrap();
    let rows = set.rows();

    let mut group = c.benchmark_group("train_model");
    group.sample_size(10);
    for kind in small_kinds() {
        let trainer = EnsembleTrainer::new(EnsembleConfig {
            roster: vec![ModelSpec::new(kind.label(), kind.clone())],
            ..Default::default()
        });
        group.bench_with_input(BenchmarkId::from_parameter(kind.label()), &trainer, |b, t| {
            b.iter(|| black_box(t.train(&rows, &set.targets).unwrap()))
        });
    }
    group.finish();
}

// ── 3. Generation ────────────────────────────────────────────────────

fn bench_generation(c: &mut Criterion) {
    let roster = small_kinds()
        .into_iter()
        .map(|k| ModelSpec::new(k.label(), k))
        .collect();
    let mut engine = PredictionEngine::new(EngineConfig {
        ensemble: EnsembleConfig {
            roster,
            ..Default::default()
        },
        ..Default::default()
    });
    engine.train(&history(30)).unwrap();

    c.bench_function("predict_20_candidates", |b| {
        let mut rng = StdRng::seed_from_u64(0);
        b.iter(|| black_box(engine.predict(20, None, &mut rng).unwrap()))
    });
}

criterion_group!(benches, bench_features, bench_training, bench_generation);
criterion_main!(benches);
