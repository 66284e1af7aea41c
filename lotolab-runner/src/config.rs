//! `lotolab.toml` — one document for every tunable.
//!
//! Every section is optional and falls back to its `Default`.
//!
//! ```toml
//! [game]
//! picks = 7
//! max_number = 37
//!
//! [data]
//! csv_path = "draws.csv"
//!
//! [validation]
//! window_sizes = [10, 20, 30]
//! portfolio_size = 20
//!
//! [storage]
//! dir = "lotolab-data"
//! ```

use std::path::{Path, PathBuf};

use lotolab_core::data::ColumnMapping;
use lotolab_core::domain::{GameError, GameSpec};
use lotolab_core::engine::EngineConfig;
use lotolab_core::ensemble::EnsembleConfig;
use lotolab_core::features::TargetMode;
use lotolab_core::vote::VoteConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::learning::LearningConfig;
use crate::validator::ValidationConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Game(#[from] GameError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LotoConfig {
    pub game: GameSpec,
    pub data: DataConfig,
    pub ensemble: EnsembleSection,
    pub vote: VoteConfig,
    pub validation: ValidationConfig,
    pub learning: LearningConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub csv_path: Option<PathBuf>,
    pub columns: ColumnMapping,
}

/// Production training settings: the roster plus the minimum row count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleSection {
    pub min_rows: usize,
    #[serde(flatten)]
    pub config: EnsembleConfig,
}

impl Default for EnsembleSection {
    fn default() -> Self {
        Self {
            min_rows: 100,
            config: EnsembleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("lotolab-data"),
        }
    }
}

impl StorageConfig {
    pub fn model_path(&self) -> PathBuf {
        self.dir.join("model.json")
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.join("learning_state.json")
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.join("prediction_history.jsonl")
    }
}

impl LotoConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.game.validate()?;
        if self.data.columns.number_columns.len() != self.game.picks {
            return Err(ConfigError::Invalid(format!(
                "data.columns lists {} number columns but the game draws {}",
                self.data.columns.number_columns.len(),
                self.game.picks
            )));
        }
        if self.ensemble.config.roster.is_empty() {
            return Err(ConfigError::Invalid("ensemble.roster is empty".into()));
        }
        if self.ensemble.config.cv_folds < 2 {
            return Err(ConfigError::Invalid("ensemble.cv_folds must be at least 2".into()));
        }
        let v = &self.validation;
        if v.window_sizes.is_empty() || v.window_sizes.contains(&0) {
            return Err(ConfigError::Invalid("validation.window_sizes must be non-empty and positive".into()));
        }
        if v.portfolio_size == 0 {
            return Err(ConfigError::Invalid("validation.portfolio_size must be positive".into()));
        }
        if v.initial_size == 0 {
            return Err(ConfigError::Invalid("validation.initial_size must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.learning.ema_factor) {
            return Err(ConfigError::Invalid("learning.ema_factor must be in [0, 1)".into()));
        }
        if self.vote.boost_multiplier <= 0.0 {
            return Err(ConfigError::Invalid("vote.boost_multiplier must be positive".into()));
        }
        Ok(())
    }

    /// Production engine settings (`SameDraw` targets).
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            game: self.game,
            target_mode: TargetMode::SameDraw,
            min_rows: self.ensemble.min_rows,
            ensemble: self.ensemble.config.clone(),
            vote: self.vote.clone(),
        }
    }
}
