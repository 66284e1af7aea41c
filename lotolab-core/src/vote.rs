//! Weighted-vote candidate generation.
//!
//! For every candidate each surviving model is sampled R times from its
//! distribution at the base feature vector; each draw adds the model's weight
//! (times the boost multiplier for boosted numbers) to a tally. A flat bonus
//! for historically frequent numbers follows, then the N heaviest numbers
//! form the candidate. Missing numbers are padded uniformly at random.

use rand::distributions::{Distribution as _, WeightedIndex};
use rand::seq::IteratorRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::{CandidateSet, DrawError, GameSpec, Number};
use crate::ensemble::{ModelWeights, TrainedEnsemble};
use crate::features::{FeatureVector, FrequencyTable};
use crate::models::Distribution;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteMode {
    Normal,
    WithLearning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoteConfig {
    pub normal_repetitions: usize,
    pub learning_repetitions: usize,
    pub boost_multiplier: f64,
    pub frequency_bonus: f64,
    pub frequency_top_n: usize,
}

impl Default for VoteConfig {
    fn default() -> Self {
        Self {
            normal_repetitions: 5,
            learning_repetitions: 8,
            boost_multiplier: 1.5,
            frequency_bonus: 0.1,
            frequency_top_n: 15,
        }
    }
}

impl VoteConfig {
    pub fn repetitions(&self, mode: VoteMode) -> usize {
        match mode {
            VoteMode::Normal => self.normal_repetitions,
            VoteMode::WithLearning => self.learning_repetitions,
        }
    }
}

/// Accumulated vote weight per number, in first-vote order.
#[derive(Debug, Default)]
struct Tally {
    entries: Vec<(Number, f64)>,
}

impl Tally {
    fn add(&mut self, number: Number, weight: f64) {
        match self.entries.iter_mut().find(|(n, _)| *n == number) {
            Some((_, w)) => *w += weight,
            None => self.entries.push((number, weight)),
        }
    }

    /// Up to `n` numbers by weight; equal weights keep first-vote order.
    fn top(mut self, n: usize) -> Vec<Number> {
        self.entries.sort_by(|a, b| b.1.total_cmp(&a.1));
        self.entries.into_iter().take(n).map(|(num, _)| num).collect()
    }
}

/// One model's sampler at the base vector.
struct Voter {
    weight: f64,
    classes: Vec<Number>,
    sampler: WeightedIndex<f64>,
}

pub struct WeightedVoteGenerator<'a> {
    game: GameSpec,
    ensemble: &'a TrainedEnsemble,
    weights: &'a ModelWeights,
    frequencies: &'a FrequencyTable,
    config: &'a VoteConfig,
}

impl<'a> WeightedVoteGenerator<'a> {
    pub fn new(
        game: GameSpec,
        ensemble: &'a TrainedEnsemble,
        weights: &'a ModelWeights,
        frequencies: &'a FrequencyTable,
        config: &'a VoteConfig,
    ) -> Self {
        Self {
            game,
            ensemble,
            weights,
            frequencies,
            config,
        }
    }

    /// Generate `count` candidates. Duplicates across the portfolio are allowed.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        base: &FeatureVector,
        count: usize,
        mode: VoteMode,
        boost: &[Number],
        rng: &mut R,
    ) -> Result<Vec<CandidateSet>, DrawError> {
        let voters = self.voters(base);
        let frequent = self.frequencies.most_common(self.config.frequency_top_n);
        let repetitions = self.config.repetitions(mode);

        (0..count)
            .map(|_| self.candidate(&voters, &frequent, repetitions, boost, rng))
            .collect()
    }

    fn voters(&self, base: &FeatureVector) -> Vec<Voter> {
        self.ensemble
            .models()
            .iter()
            .filter_map(|m| {
                let scaled = m.scaler.transform(base.as_slice());
                let Distribution { classes, probs } = m.model.predict_distribution(&scaled);
                match WeightedIndex::new(&probs) {
                    Ok(sampler) => Some(Voter {
                        weight: self.weights.get(&m.name),
                        classes,
                        sampler,
                    }),
                    Err(e) => {
                        tracing::debug!(model = %m.name, error = %e, "model has no usable distribution");
                        None
                    }
                }
            })
            .collect()
    }

    fn candidate<R: Rng + ?Sized>(
        &self,
        voters: &[Voter],
        frequent: &[Number],
        repetitions: usize,
        boost: &[Number],
        rng: &mut R,
    ) -> Result<CandidateSet, DrawError> {
        let tally = self.tally(voters, frequent, repetitions, boost, rng);
        let mut chosen = tally.top(self.game.picks);
        if chosen.len() < self.game.picks {
            let missing = self.game.picks - chosen.len();
            let pad = (1..=self.game.max_number)
                .filter(|n| !chosen.contains(n))
                .choose_multiple(rng, missing);
            chosen.extend(pad);
        }
        CandidateSet::new(&chosen, &self.game)
    }

    fn tally<R: Rng + ?Sized>(
        &self,
        voters: &[Voter],
        frequent: &[Number],
        repetitions: usize,
        boost: &[Number],
        rng: &mut R,
    ) -> Tally {
        let mut tally = Tally::default();
        for voter in voters {
            for _ in 0..repetitions {
                let number = voter.classes[voter.sampler.sample(rng)];
                if !self.game.contains(i64::from(number)) {
                    continue;
                }
                let weight = if boost.contains(&number) {
                    voter.weight * self.config.boost_multiplier
                } else {
                    voter.weight
                };
                tally.add(number, weight);
            }
        }
        for &number in frequent {
            tally.add(number, self.config.frequency_bonus);
        }
        tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Draw;
    use crate::ensemble::test_support::small_config;
    use crate::ensemble::EnsembleTrainer;
    use crate::features::{FeatureExtractor, TargetMode};
    use crate::data::SyntheticDataSource;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const G: GameSpec = GameSpec::LOTO7;

    fn trained() -> (TrainedEnsemble, FrequencyTable, FeatureVector) {
        let records = SyntheticDataSource::new(G, 30, 11).generate();
        let mut freq = FrequencyTable::new(&G);
        let set = FeatureExtractor::new(G, TargetMode::SameDraw, 50)
            .extract(&records, &mut freq)
            .unwrap();
        let (ensemble, _) = EnsembleTrainer::new(small_config())
            .train(&set.rows(), &set.targets)
            .unwrap();
        let base = set.pattern_stats.base_vector(G.picks, None);
        (ensemble, freq, base)
    }

    #[test]
    fn every_candidate_has_n_distinct_numbers() {
        let (ensemble, freq, base) = trained();
        let weights = ModelWeights::default();
        let config = VoteConfig::default();
        let gen = WeightedVoteGenerator::new(G, &ensemble, &weights, &freq, &config);
        let mut rng = StdRng::seed_from_u64(1);
        let portfolio = gen.generate(&base, 20, VoteMode::Normal, &[], &mut rng).unwrap();
        assert_eq!(portfolio.len(), 20);
        for c in &portfolio {
            assert_eq!(c.len(), 7);
            assert!(c.numbers().windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn pads_when_too_few_numbers_receive_votes() {
        // No models and no frequency history: every number is padding.
        let ensemble = TrainedEnsemble::default();
        let freq = FrequencyTable::new(&G);
        let weights = ModelWeights::default();
        let config = VoteConfig::default();
        let gen = WeightedVoteGenerator::new(G, &ensemble, &weights, &freq, &config);
        let mut rng = StdRng::seed_from_u64(2);
        let base = crate::features::PatternStats::fallback(&G).base_vector(7, None);
        let portfolio = gen.generate(&base, 5, VoteMode::WithLearning, &[], &mut rng).unwrap();
        assert!(portfolio.iter().all(|c| c.len() == 7));
    }

    #[test]
    fn frequency_bonus_alone_selects_most_common_numbers() {
        let ensemble = TrainedEnsemble::default();
        let mut freq = FrequencyTable::new(&G);
        for round in 0..3 {
            freq.observe(&Draw::new(round, &[1, 2, 3, 4, 5, 6, 7], &G).unwrap());
        }
        freq.observe(&Draw::new(9, &[30, 31, 32, 33, 34, 35, 36], &G).unwrap());
        let weights = ModelWeights::default();
        let config = VoteConfig {
            frequency_top_n: 7,
            ..Default::default()
        };
        let gen = WeightedVoteGenerator::new(G, &ensemble, &weights, &freq, &config);
        let base = crate::features::PatternStats::fallback(&G).base_vector(7, None);
        let mut rng = StdRng::seed_from_u64(3);
        let c = gen.generate(&base, 1, VoteMode::Normal, &[], &mut rng).unwrap();
        assert_eq!(c[0].numbers(), &[1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn tally_ties_keep_first_vote_order() {
        let mut t = Tally::default();
        t.add(9, 1.0);
        t.add(4, 2.0);
        t.add(2, 1.0);
        t.add(9, 0.0);
        assert_eq!(t.top(3), vec![4, 9, 2]);
    }

    #[test]
    fn same_seed_same_portfolio() {
        let (ensemble, freq, base) = trained();
        let weights = ModelWeights::default();
        let config = VoteConfig::default();
        let gen = WeightedVoteGenerator::new(G, &ensemble, &weights, &freq, &config);
        let a = gen
            .generate(&base, 5, VoteMode::Normal, &[3], &mut StdRng::seed_from_u64(9))
            .unwrap();
        let b = gen
            .generate(&base, 5, VoteMode::Normal, &[3], &mut StdRng::seed_from_u64(9))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn boosted_numbers_outrank_equal_votes() {
        let ensemble = TrainedEnsemble::default();
        let freq = FrequencyTable::new(&G);
        let weights = ModelWeights::default();
        let config = VoteConfig::default();
        let gen = WeightedVoteGenerator::new(G, &ensemble, &weights, &freq, &config);
        let voter = |number: Number| Voter {
            weight: 0.4,
            classes: vec![number],
            sampler: WeightedIndex::new([1.0]).unwrap(),
        };
        let voters = [voter(5), voter(9)];
        let mut rng = StdRng::seed_from_u64(4);

        let tally = gen.tally(&voters, &[], 2, &[9], &mut rng);
        let weight_of = |n: Number| tally.entries.iter().find(|(m, _)| *m == n).map(|(_, w)| *w).unwrap();
        assert!((weight_of(5) - 0.8).abs() < 1e-12);
        assert!((weight_of(9) - 0.8 * 1.5).abs() < 1e-12);
        // 5 voted first but the boost puts 9 ahead.
        assert_eq!(tally.top(1), vec![9]);

        let plain = gen.tally(&voters, &[], 2, &[], &mut rng);
        assert_eq!(plain.top(1), vec![5]);
    }
}
