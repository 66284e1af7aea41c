//! Feature extraction — draw windows to training rows.
//!
//! Each valid draw becomes one 16-dimensional [`FeatureVector`]. The vector is
//! replicated N times, once per target number, so the classifiers learn "is
//! this number drawn" rather than draw order. Invalid records are skipped and
//! counted per reason; they never abort extraction.
//!
//! Extraction also feeds the running single/pair [`FrequencyTable`] and
//! produces [`PatternStats`], the window's mean feature vector, which the vote
//! generator uses as its base input.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Draw, DrawRecord, GameSpec, Number, SkipCounts};

pub const FEATURE_DIM: usize = 16;

/// Feature indices.
pub mod idx {
    pub const MEAN: usize = 0;
    pub const STD: usize = 1;
    pub const SUM: usize = 2;
    pub const ODD_COUNT: usize = 3;
    pub const MAX: usize = 4;
    pub const MIN: usize = 5;
    pub const MEDIAN: usize = 6;
    pub const RANGE: usize = 7;
    pub const CONSECUTIVE: usize = 8;
    pub const FIRST: usize = 9;
    pub const MIDDLE: usize = 10;
    pub const LAST: usize = 11;
    pub const GAP_MEAN: usize = 12;
    pub const GAP_MAX: usize = 13;
    pub const GAP_MIN: usize = 14;
    pub const LOW_HALF: usize = 15;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(pub [f64; FEATURE_DIM]);

impl FeatureVector {
    pub fn from_draw(draw: &Draw, game: &GameSpec) -> Self {
        let nums: Vec<f64> = draw.numbers().iter().map(|&n| n as f64).collect();
        let sorted = draw.sorted();
        let n = nums.len() as f64;

        let sum: f64 = nums.iter().sum();
        let mean = sum / n;
        let std = (nums.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n).sqrt();
        let max = sorted[sorted.len() - 1] as f64;
        let min = sorted[0] as f64;
        let median = if sorted.len() % 2 == 1 {
            sorted[sorted.len() / 2] as f64
        } else {
            (sorted[sorted.len() / 2 - 1] as f64 + sorted[sorted.len() / 2] as f64) / 2.0
        };
        let gaps: Vec<f64> = sorted.windows(2).map(|w| (w[1] - w[0]) as f64).collect();
        let gap_mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
        let gap_max = gaps.iter().copied().fold(f64::MIN, f64::max);
        let gap_min = gaps.iter().copied().fold(f64::MAX, f64::min);
        let low = game.low_half_limit();

        let mut v = [0.0; FEATURE_DIM];
        v[idx::MEAN] = mean;
        v[idx::STD] = std;
        v[idx::SUM] = sum;
        v[idx::ODD_COUNT] = draw.odd_count() as f64;
        v[idx::MAX] = max;
        v[idx::MIN] = min;
        v[idx::MEDIAN] = median;
        v[idx::RANGE] = max - min;
        v[idx::CONSECUTIVE] = draw.consecutive_pairs() as f64;
        v[idx::FIRST] = nums[0];
        v[idx::MIDDLE] = nums[game.middle_position()];
        v[idx::LAST] = nums[nums.len() - 1];
        v[idx::GAP_MEAN] = gap_mean;
        v[idx::GAP_MAX] = gap_max;
        v[idx::GAP_MIN] = gap_min;
        v[idx::LOW_HALF] = draw.numbers().iter().filter(|&&x| x <= low).count() as f64;
        Self(v)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Which numbers a feature row is labelled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetMode {
    /// The draw's own numbers.
    SameDraw,
    /// The numbers of the following record in the same window.
    NextDraw,
}

/// Running single-number and pair co-occurrence counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyTable {
    max_number: Number,
    singles: Vec<u64>,
    /// Upper-triangular `(a, b)`, `a < b`, flattened as `a * (K + 1) + b`.
    pairs: Vec<u64>,
    /// Numbers in the order they were first seen; ties in `most_common` keep this order.
    first_seen: Vec<Number>,
    draws: u64,
}

impl FrequencyTable {
    pub fn new(game: &GameSpec) -> Self {
        let k = game.max_number as usize + 1;
        Self {
            max_number: game.max_number,
            singles: vec![0; k],
            pairs: vec![0; k * k],
            first_seen: Vec::new(),
            draws: 0,
        }
    }

    pub fn observe(&mut self, draw: &Draw) {
        let nums = draw.numbers();
        for &n in nums {
            if n > self.max_number {
                continue;
            }
            if self.singles[n as usize] == 0 {
                self.first_seen.push(n);
            }
            self.singles[n as usize] += 1;
        }
        for i in 0..nums.len() {
            for j in (i + 1)..nums.len() {
                let (a, b) = ordered(nums[i], nums[j]);
                let idx = self.pair_index(a, b);
                if let Some(slot) = self.pairs.get_mut(idx) {
                    *slot += 1;
                }
            }
        }
        self.draws += 1;
    }

    pub fn count(&self, number: Number) -> u64 {
        self.singles.get(number as usize).copied().unwrap_or(0)
    }

    pub fn pair_count(&self, a: Number, b: Number) -> u64 {
        let (a, b) = ordered(a, b);
        self.pairs.get(self.pair_index(a, b)).copied().unwrap_or(0)
    }

    pub fn draws_observed(&self) -> u64 {
        self.draws
    }

    /// Up to `n` numbers by descending count, ties in first-seen order.
    pub fn most_common(&self, n: usize) -> Vec<Number> {
        let mut order = self.first_seen.clone();
        order.sort_by(|a, b| self.count(*b).cmp(&self.count(*a)));
        order.truncate(n);
        order
    }

    /// Up to `n` pairs by descending co-occurrence count.
    pub fn most_common_pairs(&self, n: usize) -> Vec<((Number, Number), u64)> {
        let k = self.max_number;
        let mut pairs: Vec<((Number, Number), u64)> = (1..=k)
            .flat_map(|a| (a..=k).skip(1).map(move |b| (a, b)))
            .map(|(a, b)| ((a, b), self.pair_count(a, b)))
            .filter(|(_, c)| *c > 0)
            .collect();
        pairs.sort_by(|x, y| y.1.cmp(&x.1));
        pairs.truncate(n);
        pairs
    }

    fn pair_index(&self, a: Number, b: Number) -> usize {
        a as usize * (self.max_number as usize + 1) + b as usize
    }
}

fn ordered(a: Number, b: Number) -> (Number, Number) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Summary of a window's draws: the mean feature vector plus named averages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternStats {
    pub avg_sum: f64,
    pub avg_odd: f64,
    pub avg_range: f64,
    pub avg_continuous: f64,
    pub mean_features: FeatureVector,
    pub samples: usize,
}

impl PatternStats {
    pub fn from_features(features: &[FeatureVector]) -> Option<Self> {
        if features.is_empty() {
            return None;
        }
        let n = features.len() as f64;
        let mut mean = [0.0; FEATURE_DIM];
        for f in features {
            for (m, x) in mean.iter_mut().zip(f.0.iter()) {
                *m += x;
            }
        }
        for m in mean.iter_mut() {
            *m /= n;
        }
        Some(Self {
            avg_sum: mean[idx::SUM],
            avg_odd: mean[idx::ODD_COUNT],
            avg_range: mean[idx::RANGE],
            avg_continuous: mean[idx::CONSECUTIVE],
            mean_features: FeatureVector(mean),
            samples: features.len(),
        })
    }

    /// Expected feature values for uniformly random draws, used before any
    /// history has been seen.
    pub fn fallback(game: &GameSpec) -> Self {
        let n = game.picks as f64;
        let k1 = game.max_number as f64 + 1.0;
        let order_stat = |i: f64| i * k1 / (n + 1.0);
        let range = order_stat(n) - order_stat(1.0);
        let gap_mean = range / (n - 1.0);

        let mut v = [0.0; FEATURE_DIM];
        v[idx::MEAN] = k1 / 2.0;
        v[idx::STD] = k1 / (2.0 * 3f64.sqrt()) * ((n - 1.0) / n).sqrt();
        v[idx::SUM] = game.expected_sum();
        v[idx::ODD_COUNT] = n / 2.0;
        v[idx::MAX] = order_stat(n);
        v[idx::MIN] = order_stat(1.0);
        v[idx::MEDIAN] = k1 / 2.0;
        v[idx::RANGE] = range;
        v[idx::CONSECUTIVE] = (n - 1.0) * n / (k1 - 1.0);
        v[idx::FIRST] = order_stat(1.0);
        v[idx::MIDDLE] = order_stat(game.middle_position() as f64 + 1.0);
        v[idx::LAST] = order_stat(n);
        v[idx::GAP_MEAN] = gap_mean;
        v[idx::GAP_MAX] = gap_mean * 2.0;
        v[idx::GAP_MIN] = (gap_mean / 3.0).max(1.0);
        v[idx::LOW_HALF] = n * game.low_half_limit() as f64 / (k1 - 1.0);

        Self {
            avg_sum: v[idx::SUM],
            avg_odd: v[idx::ODD_COUNT],
            avg_range: v[idx::RANGE],
            avg_continuous: v[idx::CONSECUTIVE],
            mean_features: FeatureVector(v),
            samples: 0,
        }
    }

    /// The representative input for candidate generation. Learned targets
    /// override the sum (and with it the mean) and the odd count.
    pub fn base_vector(&self, picks: usize, targets: Option<&PatternTargets>) -> FeatureVector {
        let mut v = self.mean_features;
        v.0[idx::SUM] = self.avg_sum;
        v.0[idx::MEAN] = self.avg_sum / picks as f64;
        v.0[idx::ODD_COUNT] = self.avg_odd;
        if let Some(t) = targets {
            if let Some(sum) = t.avg_sum {
                v.0[idx::SUM] = sum;
                v.0[idx::MEAN] = sum / picks as f64;
            }
            if let Some(odd) = t.avg_odd_count {
                v.0[idx::ODD_COUNT] = odd;
            }
        }
        v
    }
}

/// Pattern values learned from high-accuracy predictions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternTargets {
    pub avg_sum: Option<f64>,
    pub avg_odd_count: Option<f64>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeatureError {
    #[error("insufficient data: {rows} training rows < minimum {min_rows} ({skipped} records skipped)")]
    InsufficientData {
        rows: usize,
        min_rows: usize,
        skipped: usize,
    },
}

/// What happened to each record of a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub records: usize,
    pub valid_draws: usize,
    pub skipped: SkipCounts,
    pub rows: usize,
}

/// Feature matrix, targets and window summaries.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    pub features: Vec<FeatureVector>,
    pub targets: Vec<Number>,
    pub pattern_stats: PatternStats,
    pub report: ExtractionReport,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn rows(&self) -> Vec<Vec<f64>> {
        self.features.iter().map(|f| f.0.to_vec()).collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FeatureExtractor {
    game: GameSpec,
    target_mode: TargetMode,
    min_rows: usize,
}

impl FeatureExtractor {
    pub fn new(game: GameSpec, target_mode: TargetMode, min_rows: usize) -> Self {
        Self {
            game,
            target_mode,
            min_rows,
        }
    }

    pub fn game(&self) -> &GameSpec {
        &self.game
    }

    /// Build training rows from a window of records, updating `frequencies`
    /// with every valid draw in the window.
    pub fn extract(
        &self,
        window: &[DrawRecord],
        frequencies: &mut FrequencyTable,
    ) -> Result<TrainingSet, FeatureError> {
        let mut report = ExtractionReport {
            records: window.len(),
            ..Default::default()
        };

        let draws: Vec<Option<Draw>> = window
            .iter()
            .map(|r| match Draw::from_record(r, &self.game) {
                Ok(d) => Some(d),
                Err(e) => {
                    tracing::debug!(round = r.round, error = %e, "skipping invalid draw");
                    report.skipped.record(&e);
                    None
                }
            })
            .collect();

        let mut per_draw = Vec::new();
        let mut features = Vec::new();
        let mut targets = Vec::new();

        for (i, draw) in draws.iter().enumerate() {
            let Some(draw) = draw else { continue };
            report.valid_draws += 1;
            frequencies.observe(draw);

            let fv = FeatureVector::from_draw(draw, &self.game);
            per_draw.push(fv);

            let target = match self.target_mode {
                TargetMode::SameDraw => Some(draw),
                TargetMode::NextDraw => draws.get(i + 1).and_then(|d| d.as_ref()),
            };
            if let Some(target) = target {
                for &n in target.numbers() {
                    features.push(fv);
                    targets.push(n);
                }
            }
        }
        report.rows = targets.len();

        if report.skipped.total() > 0 {
            tracing::warn!(
                skipped = report.skipped.total(),
                wrong_count = report.skipped.wrong_count,
                out_of_range = report.skipped.out_of_range,
                duplicate = report.skipped.duplicate,
                "invalid draws excluded from feature extraction"
            );
        }

        if report.rows < self.min_rows {
            return Err(FeatureError::InsufficientData {
                rows: report.rows,
                min_rows: self.min_rows,
                skipped: report.skipped.total(),
            });
        }

        let pattern_stats =
            PatternStats::from_features(&per_draw).unwrap_or_else(|| PatternStats::fallback(&self.game));

        tracing::debug!(
            draws = report.valid_draws,
            rows = report.rows,
            "feature extraction complete"
        );

        Ok(TrainingSet {
            features,
            targets,
            pattern_stats,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const G: GameSpec = GameSpec::LOTO7;

    fn rec(round: u32, nums: &[i64]) -> DrawRecord {
        DrawRecord::new(round, nums.to_vec())
    }

    #[test]
    fn feature_vector_values() {
        let d = Draw::new(1, &[1, 5, 12, 19, 23, 30, 37], &G).unwrap();
        let f = FeatureVector::from_draw(&d, &G).0;
        assert!((f[idx::SUM] - 127.0).abs() < 1e-9);
        assert!((f[idx::MEAN] - 127.0 / 7.0).abs() < 1e-9);
        assert_eq!(f[idx::ODD_COUNT], 5.0); // 1, 5, 19, 23, 37
        assert_eq!(f[idx::MAX], 37.0);
        assert_eq!(f[idx::MIN], 1.0);
        assert_eq!(f[idx::MEDIAN], 19.0);
        assert_eq!(f[idx::RANGE], 36.0);
        assert_eq!(f[idx::CONSECUTIVE], 0.0);
        assert_eq!(f[idx::FIRST], 1.0);
        assert_eq!(f[idx::MIDDLE], 19.0);
        assert_eq!(f[idx::LAST], 37.0);
        assert!((f[idx::GAP_MEAN] - 6.0).abs() < 1e-9);
        assert_eq!(f[idx::GAP_MAX], 7.0);
        assert_eq!(f[idx::GAP_MIN], 4.0);
        assert_eq!(f[idx::LOW_HALF], 4.0); // 1, 5, 12, 19
    }

    #[test]
    fn same_draw_replicates_rows_per_number() {
        let window: Vec<DrawRecord> = (0..3)
            .map(|i| rec(i + 1, &[1, 2, 3, 4, 5, 6, 7 + i as i64]))
            .collect();
        let mut freq = FrequencyTable::new(&G);
        let set = FeatureExtractor::new(G, TargetMode::SameDraw, 1)
            .extract(&window, &mut freq)
            .unwrap();
        assert_eq!(set.len(), 21);
        assert_eq!(&set.targets[..7], &[1, 2, 3, 4, 5, 6, 7]);
        assert!(set.features[..7].iter().all(|f| *f == set.features[0]));
    }

    #[test]
    fn next_draw_never_looks_past_the_window() {
        let window = vec![
            rec(1, &[1, 2, 3, 4, 5, 6, 7]),
            rec(2, &[8, 9, 10, 11, 12, 13, 14]),
        ];
        let mut freq = FrequencyTable::new(&G);
        let set = FeatureExtractor::new(G, TargetMode::NextDraw, 1)
            .extract(&window, &mut freq)
            .unwrap();
        // Only draw 1 has a successor inside the window.
        assert_eq!(set.len(), 7);
        assert_eq!(set.targets, vec![8, 9, 10, 11, 12, 13, 14]);
        // Both draws still feed the frequency table.
        assert_eq!(freq.draws_observed(), 2);
    }

    #[test]
    fn duplicate_draw_is_skipped_without_error() {
        let window = vec![
            rec(1, &[1, 1, 5, 12, 19, 23, 30]),
            rec(2, &[1, 5, 12, 19, 23, 30, 37]),
        ];
        let mut freq = FrequencyTable::new(&G);
        let set = FeatureExtractor::new(G, TargetMode::SameDraw, 1)
            .extract(&window, &mut freq)
            .unwrap();
        assert_eq!(set.report.skipped.duplicate, 1);
        assert_eq!(set.report.valid_draws, 1);
        assert_eq!(set.len(), 7);
    }

    #[test]
    fn too_few_rows_is_insufficient_data() {
        let window = vec![rec(1, &[1, 2, 3, 4, 5, 6, 7]), rec(2, &[1, 1, 1, 1, 1, 1, 1])];
        let mut freq = FrequencyTable::new(&G);
        let err = FeatureExtractor::new(G, TargetMode::SameDraw, 50)
            .extract(&window, &mut freq)
            .unwrap_err();
        assert_eq!(
            err,
            FeatureError::InsufficientData {
                rows: 7,
                min_rows: 50,
                skipped: 1
            }
        );
    }

    #[test]
    fn frequency_table_counts_singles_and_pairs() {
        let mut freq = FrequencyTable::new(&G);
        freq.observe(&Draw::new(1, &[1, 2, 3, 4, 5, 6, 7], &G).unwrap());
        freq.observe(&Draw::new(2, &[7, 2, 9, 10, 11, 12, 13], &G).unwrap());
        assert_eq!(freq.count(2), 2);
        assert_eq!(freq.count(7), 2);
        assert_eq!(freq.count(8), 0);
        assert_eq!(freq.pair_count(2, 7), 2);
        assert_eq!(freq.pair_count(7, 2), 2);
        assert_eq!(freq.pair_count(1, 13), 0);
        // 2 and 7 lead; 2 was seen before 7.
        assert_eq!(freq.most_common(2), vec![2, 7]);
        assert_eq!(freq.most_common_pairs(1), vec![((2, 7), 2)]);
    }

    #[test]
    fn pattern_stats_average_the_window() {
        let a = Draw::new(1, &[1, 2, 3, 4, 5, 6, 7], &G).unwrap();
        let b = Draw::new(2, &[31, 32, 33, 34, 35, 36, 37], &G).unwrap();
        let stats = PatternStats::from_features(&[
            FeatureVector::from_draw(&a, &G),
            FeatureVector::from_draw(&b, &G),
        ])
        .unwrap();
        assert!((stats.avg_sum - (28.0 + 238.0) / 2.0).abs() < 1e-9);
        assert_eq!(stats.samples, 2);
    }

    #[test]
    fn base_vector_applies_targets() {
        let stats = PatternStats::fallback(&G);
        let targets = PatternTargets {
            avg_sum: Some(140.0),
            avg_odd_count: Some(4.0),
        };
        let v = stats.base_vector(7, Some(&targets));
        assert_eq!(v.0[idx::SUM], 140.0);
        assert_eq!(v.0[idx::MEAN], 20.0);
        assert_eq!(v.0[idx::ODD_COUNT], 4.0);
    }

    #[test]
    fn fallback_matches_uniform_expectations_for_loto7() {
        let stats = PatternStats::fallback(&G);
        assert!((stats.avg_sum - 133.0).abs() < 1e-9);
        assert!((stats.avg_odd - 3.5).abs() < 1e-9);
        assert!((stats.mean_features.0[idx::MIN] - 4.75).abs() < 1e-9);
    }
}
