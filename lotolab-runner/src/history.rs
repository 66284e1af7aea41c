//! Prediction history — one JSONL entry per target round.
//!
//! A portfolio is recorded against the round it predicts; recording the same
//! round twice is rejected. Once the draw for that round appears in the data
//! source, [`PredictionHistory::auto_verify`] fills in the actual numbers and
//! per-set match counts. New entries are appended; verification and removal
//! rewrite the file atomically (temp file, then rename).

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use lotolab_core::domain::{CandidateSet, Draw, DrawRecord, GameSpec, Number};
use lotolab_core::evaluate::evaluate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("a prediction for round {0} is already recorded")]
    DuplicateRound(u32),
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> HistoryError + '_ {
    move |source| HistoryError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionEntry {
    pub round: u32,
    pub recorded_at: DateTime<Utc>,
    pub predictions: Vec<CandidateSet>,
    /// Actual numbers, ascending, once verified.
    pub actual: Option<Vec<Number>>,
    /// Matches per prediction, in prediction order.
    pub matches: Vec<usize>,
    pub verified: bool,
}

impl PredictionEntry {
    pub fn max_matches(&self) -> usize {
        self.matches.iter().copied().max().unwrap_or(0)
    }

    pub fn avg_matches(&self) -> f64 {
        if self.matches.is_empty() {
            0.0
        } else {
            self.matches.iter().sum::<usize>() as f64 / self.matches.len() as f64
        }
    }
}

/// Match statistics over every verified prediction set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyStats {
    pub verified_rounds: usize,
    pub total_predictions: usize,
    pub avg_matches: f64,
    pub max_matches: usize,
    /// `match_distribution[m]` = sets with exactly `m` matches.
    pub match_distribution: Vec<usize>,
    /// At least N-1 matches.
    pub excellent: usize,
    /// 4 up to N-2 matches.
    pub good: usize,
    /// Exactly 3 matches.
    pub fair: usize,
    /// 0 to 2 matches.
    pub poor: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistorySummary {
    pub total_rounds: usize,
    pub verified_rounds: usize,
    pub pending_rounds: usize,
    pub latest_round: Option<u32>,
    pub earliest_round: Option<u32>,
}

pub struct PredictionHistory {
    path: PathBuf,
    entries: Vec<PredictionEntry>,
}

impl PredictionHistory {
    /// Load the history at `path`; a missing file is an empty history.
    /// Malformed lines are skipped with a warning.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, HistoryError> {
        let path = path.into();
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Self {
                    path,
                    entries: Vec::new(),
                })
            }
            Err(e) => return Err(io_err(&path)(e)),
        };

        let mut entries = Vec::new();
        for (lineno, line) in io::BufReader::new(file).lines().enumerate() {
            let line = line.map_err(io_err(&path))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<PredictionEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!(path = %path.display(), line = lineno + 1, error = %e, "skipping malformed history line"),
            }
        }
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[PredictionEntry] {
        &self.entries
    }

    pub fn find(&self, round: u32) -> Option<&PredictionEntry> {
        self.entries.iter().find(|e| e.round == round)
    }

    /// Record `predictions` for `round` and append it to the file.
    pub fn add_prediction(&mut self, round: u32, predictions: Vec<CandidateSet>) -> Result<(), HistoryError> {
        if self.find(round).is_some() {
            return Err(HistoryError::DuplicateRound(round));
        }
        let entry = PredictionEntry {
            round,
            recorded_at: Utc::now(),
            predictions,
            actual: None,
            matches: Vec::new(),
            verified: false,
        };
        let json = serde_json::to_string(&entry)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err(&self.path))?;
        writeln!(file, "{json}").map_err(io_err(&self.path))?;
        file.flush().map_err(io_err(&self.path))?;

        tracing::info!(round, sets = entry.predictions.len(), "prediction recorded");
        self.entries.push(entry);
        Ok(())
    }

    /// Verify every pending entry whose round has a valid draw in `records`.
    /// Returns the number of entries verified. Entries change in memory only
    /// once the file has been rewritten.
    pub fn auto_verify(&mut self, records: &[DrawRecord], game: &GameSpec) -> Result<usize, HistoryError> {
        let mut updated = self.entries.clone();
        let mut verified = 0;
        for entry in updated.iter_mut().filter(|e| !e.verified) {
            let Some(record) = records.iter().find(|r| r.round == entry.round) else {
                continue;
            };
            let draw = match Draw::from_record(record, game) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!(round = entry.round, error = %e, "draw for predicted round is invalid, not verified");
                    continue;
                }
            };
            let evaluation = evaluate(&entry.predictions, &draw);
            entry.actual = Some(draw.sorted());
            entry.matches = evaluation.scores.iter().map(|s| s.matches).collect();
            entry.verified = true;
            verified += 1;
            tracing::info!(
                round = entry.round,
                max_matches = evaluation.summary.max_matches,
                avg_matches = format!("{:.2}", evaluation.summary.avg_matches),
                "prediction verified"
            );
        }
        if verified > 0 {
            write_entries(&self.path, &updated)?;
            self.entries = updated;
        }
        Ok(verified)
    }

    /// Returns whether an entry was removed.
    pub fn remove(&mut self, round: u32) -> Result<bool, HistoryError> {
        if self.find(round).is_none() {
            return Ok(false);
        }
        let kept: Vec<PredictionEntry> = self.entries.iter().filter(|e| e.round != round).cloned().collect();
        write_entries(&self.path, &kept)?;
        self.entries = kept;
        Ok(true)
    }

    pub fn verified(&self) -> impl Iterator<Item = &PredictionEntry> {
        self.entries.iter().filter(|e| e.verified)
    }

    /// `None` until at least one entry is verified.
    pub fn accuracy_stats(&self) -> Option<AccuracyStats> {
        let verified: Vec<&PredictionEntry> = self.verified().collect();
        let all: Vec<usize> = verified.iter().flat_map(|e| e.matches.iter().copied()).collect();
        if all.is_empty() {
            return None;
        }
        let picks = verified
            .iter()
            .flat_map(|e| e.predictions.iter().map(|p| p.len()))
            .max()
            .unwrap_or(0);
        let max_matches = all.iter().copied().max().unwrap_or(0);
        let mut distribution = vec![0usize; picks.max(max_matches) + 1];
        for &m in &all {
            distribution[m] += 1;
        }
        let excellent_from = picks.saturating_sub(1).max(4);
        let count = |lo: usize, hi: usize| all.iter().filter(|&&m| m >= lo && m <= hi).count();

        Some(AccuracyStats {
            verified_rounds: verified.len(),
            total_predictions: all.len(),
            avg_matches: all.iter().sum::<usize>() as f64 / all.len() as f64,
            max_matches,
            match_distribution: distribution,
            excellent: count(excellent_from, usize::MAX),
            good: count(4, excellent_from - 1),
            fair: count(3, 3),
            poor: count(0, 2),
        })
    }

    pub fn summary(&self) -> HistorySummary {
        let verified = self.verified().count();
        HistorySummary {
            total_rounds: self.entries.len(),
            verified_rounds: verified,
            pending_rounds: self.entries.len() - verified,
            latest_round: self.entries.iter().map(|e| e.round).max(),
            earliest_round: self.entries.iter().map(|e| e.round).min(),
        }
    }

    /// The `count` most recent entries by round, newest first.
    pub fn recent(&self, count: usize) -> Vec<&PredictionEntry> {
        let mut sorted: Vec<&PredictionEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| b.round.cmp(&a.round));
        sorted.truncate(count);
        sorted
    }
}

/// Replace the file at `path` with `entries`, one JSON line each.
fn write_entries(path: &Path, entries: &[PredictionEntry]) -> Result<(), HistoryError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let mut body = String::new();
    for entry in entries {
        body.push_str(&serde_json::to_string(entry)?);
        body.push('\n');
    }
    let tmp = path.with_extension("jsonl.tmp");
    fs::write(&tmp, body).map_err(io_err(&tmp))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        io_err(path)(e)
    })
}
