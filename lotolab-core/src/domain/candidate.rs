//! CandidateSet — one generated prediction.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::draw::validate_numbers;
use super::{DrawError, GameSpec, Number};

/// Exactly N distinct numbers in `1..=K`, stored ascending.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateSet(Vec<Number>);

impl CandidateSet {
    pub fn new(numbers: &[Number], game: &GameSpec) -> Result<Self, DrawError> {
        let widened: Vec<i64> = numbers.iter().map(|&n| n as i64).collect();
        let mut numbers = validate_numbers(&widened, game)?;
        numbers.sort_unstable();
        Ok(Self(numbers))
    }

    pub fn numbers(&self) -> &[Number] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, number: Number) -> bool {
        self.0.binary_search(&number).is_ok()
    }
}

impl fmt::Display for CandidateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|n| format!("{n:02}")).collect();
        write!(f, "[{}]", parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_is_sorted() {
        let c = CandidateSet::new(&[30, 1, 12, 5, 37, 23, 19], &GameSpec::LOTO7).unwrap();
        assert_eq!(c.numbers(), &[1, 5, 12, 19, 23, 30, 37]);
        assert!(c.contains(23));
        assert!(!c.contains(24));
    }

    #[test]
    fn candidate_rejects_duplicates() {
        assert!(CandidateSet::new(&[1, 1, 2, 3, 4, 5, 6], &GameSpec::LOTO7).is_err());
    }

    #[test]
    fn display_is_zero_padded() {
        let c = CandidateSet::new(&[1, 2, 3, 4, 5], &GameSpec::MINI_LOTO).unwrap();
        assert_eq!(c.to_string(), "[01 02 03 04 05]");
    }
}
