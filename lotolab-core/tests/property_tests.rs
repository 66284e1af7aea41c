//! Property tests for candidate and scoring invariants.
//!
//! Uses proptest to verify:
//! 1. Candidate sets are always N distinct ascending numbers in 1..=K
//! 2. Match counts equal the set intersection and partition the candidate
//! 3. Portfolio histograms sum to the portfolio size
//! 4. Frequency counts add up to N per observed draw

use proptest::prelude::*;
use lotolab_core::domain::{CandidateSet, Draw, GameSpec, Number};
use lotolab_core::evaluate::{evaluate, score_candidate};
use lotolab_core::features::FrequencyTable;

const G: GameSpec = GameSpec::LOTO7;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_numbers() -> impl Strategy<Value = Vec<Number>> {
    proptest::sample::subsequence((1..=37u8).collect::<Vec<_>>(), 7).prop_shuffle()
}

fn arb_draw() -> impl Strategy<Value = Draw> {
    arb_numbers().prop_map(|n| {
        let wide: Vec<i64> = n.iter().map(|&v| i64::from(v)).collect();
        Draw::new(1, &wide, &G).unwrap()
    })
}

fn arb_candidate() -> impl Strategy<Value = CandidateSet> {
    arb_numbers().prop_map(|n| CandidateSet::new(&n, &G).unwrap())
}

// ── 1. Candidate invariants ──────────────────────────────────────────

proptest! {
    #[test]
    fn candidates_are_sorted_distinct_in_range(c in arb_candidate()) {
        prop_assert_eq!(c.len(), 7);
        prop_assert!(c.numbers().windows(2).all(|w| w[0] < w[1]));
        prop_assert!(c.numbers().iter().all(|&n| (1..=37).contains(&n)));
    }

    /// Any slice with a repeated number is rejected.
    #[test]
    fn duplicates_are_rejected(mut n in arb_numbers(), at in 1usize..7) {
        n[at] = n[0];
        prop_assert!(CandidateSet::new(&n, &G).is_err());
    }
}

// ── 2. Match counts ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn matches_equal_intersection(c in arb_candidate(), actual in arb_draw()) {
        let s = score_candidate(&c, &actual);
        let expected = c.numbers().iter().filter(|&&n| actual.contains(n)).count();
        prop_assert_eq!(s.matches, expected);
        prop_assert_eq!(s.matched.len() + s.extra.len(), 7);
        prop_assert_eq!(s.matched.len() + s.missed.len(), 7);
        prop_assert!(s.missed.iter().all(|n| !c.contains(*n)));
    }
}

// ── 3. Portfolio aggregates ──────────────────────────────────────────

proptest! {
    #[test]
    fn histogram_sums_to_portfolio_size(
        portfolio in prop::collection::vec(arb_candidate(), 0..25),
        actual in arb_draw(),
    ) {
        let e = evaluate(&portfolio, &actual).summary;
        prop_assert_eq!(e.histogram.len(), 8);
        prop_assert_eq!(e.histogram.iter().sum::<usize>(), portfolio.len());
        prop_assert!(e.sets_5_plus <= e.sets_4_plus);
        prop_assert!(e.sets_4_plus <= e.sets_3_plus);
        if !portfolio.is_empty() {
            prop_assert!(e.min_matches as f64 <= e.avg_matches + 1e-9);
            prop_assert!(e.avg_matches <= e.max_matches as f64 + 1e-9);
        }
    }
}

// ── 4. Frequency accounting ──────────────────────────────────────────

proptest! {
    #[test]
    fn frequency_counts_sum_to_picks(draws in prop::collection::vec(arb_draw(), 1..20)) {
        let mut freq = FrequencyTable::new(&G);
        for d in &draws {
            freq.observe(d);
        }
        let total: u64 = (1..=37u8).map(|n| freq.count(n)).sum();
        prop_assert_eq!(total, 7 * draws.len() as u64);
        prop_assert_eq!(freq.draws_observed(), draws.len() as u64);
    }
}
