//! History integrity report: invalid rows per reason and gaps in the round sequence.

use serde::{Deserialize, Serialize};

use crate::domain::{Draw, DrawRecord, GameSpec, SkipCounts};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub total_records: usize,
    pub valid_records: usize,
    pub invalid: SkipCounts,
    /// `(before, after)` pairs of consecutive rounds that are not adjacent.
    pub round_gaps: Vec<(u32, u32)>,
    pub earliest_round: Option<u32>,
    pub latest_round: Option<u32>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.invalid.total() == 0 && self.round_gaps.is_empty()
    }
}

/// Check every record against the game and the round sequence for gaps.
/// Expects records sorted by round, as [`super::DataSource`] returns them.
pub fn check_integrity(records: &[DrawRecord], game: &GameSpec) -> IntegrityReport {
    let mut invalid = SkipCounts::default();
    for r in records {
        if let Err(e) = Draw::from_record(r, game) {
            invalid.record(&e);
        }
    }

    let round_gaps = records
        .windows(2)
        .filter(|w| w[1].round > w[0].round + 1)
        .map(|w| (w[0].round, w[1].round))
        .collect();

    IntegrityReport {
        total_records: records.len(),
        valid_records: records.len() - invalid.total(),
        invalid,
        round_gaps,
        earliest_round: records.first().map(|r| r.round),
        latest_round: records.last().map(|r| r.round),
    }
}
