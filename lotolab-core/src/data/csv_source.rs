//! CSV draw history with a configurable column mapping.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::source::{DataSource, DataSourceError};
use crate::domain::DrawRecord;

/// Which CSV columns hold the round, the date and the drawn numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub round_column: String,
    #[serde(default)]
    pub date_column: Option<String>,
    pub number_columns: Vec<String>,
}

impl ColumnMapping {
    /// `round`, `date`, `n1` … `n{picks}`.
    pub fn numbered(picks: usize) -> Self {
        Self {
            round_column: "round".into(),
            date_column: Some("date".into()),
            number_columns: (1..=picks).map(|i| format!("n{i}")).collect(),
        }
    }
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self::numbered(7)
    }
}

pub struct CsvDataSource {
    path: PathBuf,
    columns: ColumnMapping,
}

impl CsvDataSource {
    pub fn new(path: impl Into<PathBuf>, columns: ColumnMapping) -> Self {
        Self {
            path: path.into(),
            columns,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse CSV content into records sorted by round.
    ///
    /// Blank number cells are dropped rather than rejected, so the row later
    /// fails draw validation (wrong count) and is skipped by feature
    /// extraction instead of failing the whole load.
    pub fn parse<R: Read>(reader: R, columns: &ColumnMapping) -> Result<Vec<DrawRecord>, DataSourceError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let index_of = |name: &str| -> Result<usize, DataSourceError> {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| DataSourceError::MissingColumn {
                    column: name.to_string(),
                })
        };

        let round_idx = index_of(&columns.round_column)?;
        let date_idx = columns
            .date_column
            .as_deref()
            .and_then(|c| headers.iter().position(|h| h == c));
        let number_idx: Vec<usize> = columns
            .number_columns
            .iter()
            .map(|c| index_of(c))
            .collect::<Result<_, _>>()?;

        let mut records = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let row = row + 1;
            let rec = result?;

            let round_raw = rec.get(round_idx).unwrap_or("");
            let round = parse_integer(round_raw)
                .filter(|r| *r >= 0 && *r <= u32::MAX as i64)
                .ok_or_else(|| DataSourceError::InvalidValue {
                    row,
                    column: columns.round_column.clone(),
                    value: round_raw.to_string(),
                })? as u32;

            let date = date_idx.and_then(|i| rec.get(i)).and_then(parse_date);

            let mut numbers = Vec::with_capacity(number_idx.len());
            for (col, &i) in columns.number_columns.iter().zip(&number_idx) {
                let raw = rec.get(i).unwrap_or("");
                if raw.is_empty() {
                    continue;
                }
                let n = parse_integer(raw).ok_or_else(|| DataSourceError::InvalidValue {
                    row,
                    column: col.clone(),
                    value: raw.to_string(),
                })?;
                numbers.push(n);
            }

            records.push(DrawRecord {
                round,
                date,
                numbers,
            });
        }

        records.sort_by_key(|r| r.round);
        if let Some(w) = records.windows(2).find(|w| w[0].round == w[1].round) {
            return Err(DataSourceError::DuplicateRound { round: w[0].round });
        }
        Ok(records)
    }
}

impl DataSource for CsvDataSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch_draws(&self) -> Result<Vec<DrawRecord>, DataSourceError> {
        let file = File::open(&self.path).map_err(|e| DataSourceError::Io {
            path: self.path.display().to_string(),
            source: e,
        })?;
        let records = Self::parse(file, &self.columns)?;
        if records.is_empty() {
            return Err(DataSourceError::Empty);
        }
        tracing::debug!(path = %self.path.display(), rows = records.len(), "loaded draw history");
        Ok(records)
    }
}

/// Integers, also accepting spreadsheet-style `12.0`.
fn parse_integer(raw: &str) -> Option<i64> {
    if let Ok(n) = raw.parse::<i64>() {
        return Some(n);
    }
    let f = raw.parse::<f64>().ok()?;
    (f.fract() == 0.0 && f.is_finite()).then_some(f as i64)
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}
