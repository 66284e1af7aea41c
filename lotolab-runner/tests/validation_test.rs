//! Time-series validation over synthetic history.

mod common;

use common::{small_engine_config, small_validation};
use lotolab_core::data::SyntheticDataSource;
use lotolab_core::domain::{DrawRecord, GameSpec};
use lotolab_runner::comparison::Recommendation;
use lotolab_runner::{TimeSeriesValidator, ValidationConfig, ValidationError, WindowLabel};

fn history(rounds: u32) -> Vec<DrawRecord> {
    SyntheticDataSource::new(GameSpec::LOTO7, rounds, 2024).generate()
}

#[test]
fn fixed_window_end_to_end() {
    let records = history(200);
    let config = ValidationConfig::default();
    let validator = TimeSeriesValidator::new(small_engine_config(), config.clone());

    let by_window = validator.fixed_window_validation(&records, &[10]).unwrap();
    let results = &by_window[&10];

    // 200 - 10 - 1 = 189 possible offsets, capped at 50.
    assert!(!results.is_empty());
    assert!(results.len() <= 50);
    for r in results {
        assert_eq!(r.label, WindowLabel::Fixed(10));
        assert_eq!(r.summary.histogram.iter().sum::<usize>(), config.portfolio_size);
        assert_eq!(r.portfolio.len(), config.portfolio_size);
        assert_eq!(r.match_counts.len(), config.portfolio_size);
        assert_eq!(r.train_end - r.train_start, 10);
        assert_eq!(r.test_round, records[r.test_index].round);
        for c in &r.portfolio {
            assert_eq!(c.len(), 7);
        }
    }
}

#[test]
fn no_training_index_reaches_the_test_index() {
    let records = history(90);
    let validator = TimeSeriesValidator::new(small_engine_config(), small_validation(8, 8));

    let fixed = validator.fixed_window_validation(&records, &[10, 20]).unwrap();
    let expanding = validator.expanding_window_validation(&records).unwrap();
    assert!(!expanding.is_empty());

    for r in fixed.values().flatten().chain(expanding.iter()) {
        assert!(r.train_start < r.train_end);
        assert!(r.train_end - 1 < r.test_index, "{:?} leaks", r.label);
    }
    for r in &expanding {
        assert_eq!(r.train_start, 0);
        assert_eq!(r.train_end, r.test_index);
        assert!(r.test_index >= 30);
    }
}

#[test]
fn backtests_never_exceed_the_cap() {
    let records = history(300);
    let validator = TimeSeriesValidator::new(small_engine_config(), small_validation(5, 4));

    let fixed = validator.fixed_window_validation(&records, &[10]).unwrap();
    assert!(fixed[&10].len() <= 5);
    // step = 289 / 5 = 57
    let tests: Vec<usize> = fixed[&10].iter().map(|r| r.test_index).collect();
    assert!(tests.windows(2).all(|w| w[1] - w[0] >= 57));

    assert!(validator.expanding_window_validation(&records).unwrap().len() <= 4);
}

#[test]
fn short_history_yields_no_results() {
    let records = history(11);
    let validator = TimeSeriesValidator::new(small_engine_config(), ValidationConfig::default());
    let fixed = validator.fixed_window_validation(&records, &[10]).unwrap();
    assert!(fixed[&10].is_empty());
}

#[test]
fn seeded_runs_are_reproducible() {
    let records = history(80);
    let run = || {
        TimeSeriesValidator::new(small_engine_config(), small_validation(3, 3))
            .fixed_window_validation(&records, &[10])
            .unwrap()
    };
    assert_eq!(run(), run());
}

#[test]
fn invalid_history_is_rejected() {
    let records: Vec<DrawRecord> = (1..=40).map(|r| DrawRecord::new(r, vec![1, 1, 2, 3, 4, 5, 6])).collect();
    let validator = TimeSeriesValidator::new(small_engine_config(), ValidationConfig::default());
    let err = validator.fixed_window_validation(&records, &[10]).unwrap_err();
    assert!(matches!(err, ValidationError::NoValidDraws { records: 40 }));
}

#[test]
fn invalid_test_draws_are_skipped() {
    let mut records = history(60);
    records[10].numbers = vec![1, 2, 3];
    let validator = TimeSeriesValidator::new(small_engine_config(), small_validation(50, 5));
    let fixed = validator.fixed_window_validation(&records, &[10]).unwrap();
    assert!(fixed[&10].iter().all(|r| r.test_index != 10));
    assert!(!fixed[&10].is_empty());
}

#[test]
fn run_validation_compares_both_modes() {
    let records = history(100);
    let config = ValidationConfig {
        window_sizes: vec![10, 20],
        ..small_validation(4, 4)
    };
    let report = TimeSeriesValidator::new(small_engine_config(), config)
        .run_validation(&records)
        .unwrap();

    let fixed_count: usize = report.fixed.values().map(Vec::len).sum();
    assert_eq!(report.summary.total_validations, fixed_count + report.expanding.len());
    assert!(report.summary.fixed_window_tested);
    assert!(report.summary.expanding_tested);
    assert!(report.comparison.best_method.is_some());
    assert_ne!(report.comparison.recommendation, Recommendation::Undetermined);
    assert!(report.comparison.improvement >= 0.0);
}
