//! Data source trait and structured error types.
//!
//! The `DataSource` trait abstracts over where draw history comes from (CSV
//! export, synthetic generator, an in-memory fixture) so the validator and the
//! learning manager can be driven by any of them and mocked in tests.

use thiserror::Error;

use crate::domain::DrawRecord;

#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing column '{column}'")]
    MissingColumn { column: String },

    #[error("row {row}: column '{column}' is not an integer: '{value}'")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("round {round} appears more than once")]
    DuplicateRound { round: u32 },

    #[error("data source returned no draws")]
    Empty,
}

/// Anything that can produce the full draw history, oldest first.
pub trait DataSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch every known draw, ordered by ascending round (most recent last).
    ///
    /// Implementations guarantee a strictly increasing round field and one
    /// integer per number column; the numbers themselves are not checked
    /// against the game.
    fn fetch_draws(&self) -> Result<Vec<DrawRecord>, DataSourceError>;
}

/// In-memory source over a fixed list of records.
#[derive(Debug, Clone, Default)]
pub struct StaticDataSource {
    records: Vec<DrawRecord>,
}

impl StaticDataSource {
    pub fn new(mut records: Vec<DrawRecord>) -> Self {
        records.sort_by_key(|r| r.round);
        Self { records }
    }
}

impl DataSource for StaticDataSource {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch_draws(&self) -> Result<Vec<DrawRecord>, DataSourceError> {
        if self.records.is_empty() {
            return Err(DataSourceError::Empty);
        }
        Ok(self.records.clone())
    }
}

/// The round that follows the most recent record, if any.
pub fn next_round(records: &[DrawRecord]) -> Option<u32> {
    records.iter().map(|r| r.round).max().map(|r| r + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_source_sorts_by_round() {
        let src = StaticDataSource::new(vec![
            DrawRecord::new(3, vec![1]),
            DrawRecord::new(1, vec![2]),
            DrawRecord::new(2, vec![3]),
        ]);
        let rounds: Vec<u32> = src.fetch_draws().unwrap().iter().map(|r| r.round).collect();
        assert_eq!(rounds, vec![1, 2, 3]);
    }

    #[test]
    fn empty_static_source_is_an_error() {
        let src = StaticDataSource::default();
        assert!(matches!(src.fetch_draws(), Err(DataSourceError::Empty)));
    }

    #[test]
    fn next_round_follows_latest() {
        let records = vec![DrawRecord::new(41, vec![]), DrawRecord::new(42, vec![])];
        assert_eq!(next_round(&records), Some(43));
        assert_eq!(next_round(&[]), None);
    }
}
