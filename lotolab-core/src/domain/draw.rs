//! Draw — one historical lottery result.
//!
//! Rows arrive from a data source as [`DrawRecord`]s whose numbers are not yet
//! checked against the game. [`Draw::from_record`] is the only way to build a
//! [`Draw`], so every `Draw` in the system holds exactly N distinct numbers in
//! `1..=K`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{GameSpec, Number};

/// A raw row from the data source: round, optional date, unchecked numbers
/// in column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawRecord {
    pub round: u32,
    pub date: Option<NaiveDate>,
    pub numbers: Vec<i64>,
}

impl DrawRecord {
    pub fn new(round: u32, numbers: Vec<i64>) -> Self {
        Self {
            round,
            date: None,
            numbers,
        }
    }
}

/// Why a record is not a valid draw for a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DrawError {
    #[error("expected {expected} numbers, found {found}")]
    WrongCount { expected: usize, found: usize },
    #[error("number {number} outside 1..={max}")]
    OutOfRange { number: i64, max: Number },
    #[error("number {number} appears more than once")]
    Duplicate { number: Number },
}

/// A validated draw. Numbers keep their column order; use [`Draw::sorted`] for
/// ascending order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draw {
    pub round: u32,
    pub date: Option<NaiveDate>,
    numbers: Vec<Number>,
}

impl Draw {
    pub fn from_record(record: &DrawRecord, game: &GameSpec) -> Result<Self, DrawError> {
        let numbers = validate_numbers(&record.numbers, game)?;
        Ok(Self {
            round: record.round,
            date: record.date,
            numbers,
        })
    }

    pub fn new(round: u32, numbers: &[i64], game: &GameSpec) -> Result<Self, DrawError> {
        Self::from_record(&DrawRecord::new(round, numbers.to_vec()), game)
    }

    /// Numbers in column (drawn) order.
    pub fn numbers(&self) -> &[Number] {
        &self.numbers
    }

    pub fn sorted(&self) -> Vec<Number> {
        let mut sorted = self.numbers.clone();
        sorted.sort_unstable();
        sorted
    }

    pub fn contains(&self, number: Number) -> bool {
        self.numbers.contains(&number)
    }

    pub fn sum(&self) -> u32 {
        self.numbers.iter().map(|&n| n as u32).sum()
    }

    pub fn odd_count(&self) -> usize {
        self.numbers.iter().filter(|&&n| n % 2 == 1).count()
    }

    /// max − min.
    pub fn range(&self) -> u32 {
        let max = self.numbers.iter().copied().max().unwrap_or(0);
        let min = self.numbers.iter().copied().min().unwrap_or(0);
        (max - min) as u32
    }

    /// Number of adjacent pairs (in sorted order) that differ by exactly 1.
    pub fn consecutive_pairs(&self) -> usize {
        self.sorted().windows(2).filter(|w| w[1] - w[0] == 1).count()
    }
}

/// Per-reason tally of records rejected by [`Draw::from_record`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCounts {
    pub wrong_count: usize,
    pub out_of_range: usize,
    pub duplicate: usize,
}

impl SkipCounts {
    pub fn record(&mut self, err: &DrawError) {
        match err {
            DrawError::WrongCount { .. } => self.wrong_count += 1,
            DrawError::OutOfRange { .. } => self.out_of_range += 1,
            DrawError::Duplicate { .. } => self.duplicate += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.wrong_count + self.out_of_range + self.duplicate
    }
}

/// Check count, range and distinctness; returns the numbers narrowed to [`Number`].
pub(crate) fn validate_numbers(numbers: &[i64], game: &GameSpec) -> Result<Vec<Number>, DrawError> {
    if numbers.len() != game.picks {
        return Err(DrawError::WrongCount {
            expected: game.picks,
            found: numbers.len(),
        });
    }

    let mut seen = vec![false; game.max_number as usize + 1];
    let mut out = Vec::with_capacity(numbers.len());
    for &n in numbers {
        if !game.contains(n) {
            return Err(DrawError::OutOfRange {
                number: n,
                max: game.max_number,
            });
        }
        let n = n as Number;
        if seen[n as usize] {
            return Err(DrawError::Duplicate { number: n });
        }
        seen[n as usize] = true;
        out.push(n);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const G: GameSpec = GameSpec::LOTO7;

    #[test]
    fn valid_draw_keeps_column_order() {
        let d = Draw::new(1, &[30, 1, 12, 5, 37, 23, 19], &G).unwrap();
        assert_eq!(d.numbers(), &[30, 1, 12, 5, 37, 23, 19]);
        assert_eq!(d.sorted(), vec![1, 5, 12, 19, 23, 30, 37]);
    }

    #[test]
    fn duplicate_is_rejected() {
        let err = Draw::new(1, &[1, 1, 5, 12, 19, 23, 30], &G).unwrap_err();
        assert_eq!(err, DrawError::Duplicate { number: 1 });
    }

    #[test]
    fn out_of_range_is_rejected() {
        assert_eq!(
            Draw::new(1, &[0, 2, 5, 12, 19, 23, 30], &G).unwrap_err(),
            DrawError::OutOfRange { number: 0, max: 37 }
        );
        assert_eq!(
            Draw::new(1, &[1, 2, 5, 12, 19, 23, 38], &G).unwrap_err(),
            DrawError::OutOfRange { number: 38, max: 37 }
        );
    }

    #[test]
    fn wrong_count_is_rejected() {
        assert_eq!(
            Draw::new(1, &[1, 2, 3], &G).unwrap_err(),
            DrawError::WrongCount {
                expected: 7,
                found: 3
            }
        );
    }

    #[test]
    fn skip_counts_tally_by_reason() {
        let mut counts = SkipCounts::default();
        counts.record(&DrawError::Duplicate { number: 3 });
        counts.record(&DrawError::Duplicate { number: 4 });
        counts.record(&DrawError::OutOfRange { number: 99, max: 37 });
        assert_eq!(counts.duplicate, 2);
        assert_eq!(counts.out_of_range, 1);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn summary_statistics() {
        let d = Draw::new(1, &[1, 2, 3, 10, 20, 21, 37], &G).unwrap();
        assert_eq!(d.sum(), 94);
        assert_eq!(d.odd_count(), 4); // 1, 3, 21, 37
        assert_eq!(d.range(), 36);
        assert_eq!(d.consecutive_pairs(), 3); // 1-2, 2-3, 20-21
    }
}
