//! Game parameters: how many numbers are drawn (N) out of how many (K).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Number;

/// Fixed-size draw game: `picks` distinct numbers from `1..=max_number`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameSpec {
    /// N, numbers per draw.
    pub picks: usize,
    /// K, the highest number in the pool.
    pub max_number: Number,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("a game must draw at least 2 numbers (got {0})")]
    TooFewPicks(usize),
    #[error("cannot draw {picks} distinct numbers from a pool of {max_number}")]
    PoolTooSmall { picks: usize, max_number: Number },
}

impl GameSpec {
    /// 7 from 37.
    pub const LOTO7: GameSpec = GameSpec {
        picks: 7,
        max_number: 37,
    };

    /// 5 from 31.
    pub const MINI_LOTO: GameSpec = GameSpec {
        picks: 5,
        max_number: 31,
    };

    pub fn new(picks: usize, max_number: Number) -> Result<Self, GameError> {
        let spec = Self { picks, max_number };
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<(), GameError> {
        if self.picks < 2 {
            return Err(GameError::TooFewPicks(self.picks));
        }
        if self.picks > self.max_number as usize {
            return Err(GameError::PoolTooSmall {
                picks: self.picks,
                max_number: self.max_number,
            });
        }
        Ok(())
    }

    pub fn contains(&self, number: i64) -> bool {
        number >= 1 && number <= self.max_number as i64
    }

    /// Numbers at or below this value count as "low half".
    pub fn low_half_limit(&self) -> Number {
        (self.max_number as u16).div_ceil(2) as Number
    }

    /// Expected sum of a uniformly random draw: N·(K+1)/2.
    pub fn expected_sum(&self) -> f64 {
        self.picks as f64 * (self.max_number as f64 + 1.0) / 2.0
    }

    /// Column index used as the "middle" positional feature.
    pub fn middle_position(&self) -> usize {
        self.picks / 2
    }
}

impl Default for GameSpec {
    fn default() -> Self {
        Self::LOTO7
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loto7_parameters() {
        let g = GameSpec::LOTO7;
        assert!(g.validate().is_ok());
        assert_eq!(g.low_half_limit(), 19);
        assert!((g.expected_sum() - 133.0).abs() < 1e-12);
        assert_eq!(g.middle_position(), 3);
    }

    #[test]
    fn mini_loto_parameters() {
        let g = GameSpec::MINI_LOTO;
        assert_eq!(g.low_half_limit(), 16);
        assert!((g.expected_sum() - 80.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_impossible_games() {
        assert_eq!(GameSpec::new(1, 37), Err(GameError::TooFewPicks(1)));
        assert!(matches!(
            GameSpec::new(8, 6),
            Err(GameError::PoolTooSmall { .. })
        ));
    }

    #[test]
    fn contains_is_one_based() {
        let g = GameSpec::LOTO7;
        assert!(!g.contains(0));
        assert!(g.contains(1));
        assert!(g.contains(37));
        assert!(!g.contains(38));
    }
}
