//! LotoLab CLI — validation, learning stages, training and prediction commands.
//!
//! Commands:
//! - `validate` — walk-forward validation over fixed and expanding windows
//! - `stage list` / `stage run <id>` / `stage reset` — the progressive learning ladder
//! - `train` — fit the production engine on the full history and save it
//! - `predict` — generate candidate sets for the next round and record them
//! - `verify` — score recorded predictions against drawn results
//! - `status` — engine, learning and history summary

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use lotolab_core::data::{check_integrity, next_round, CsvDataSource, DataSource, SyntheticDataSource};
use lotolab_core::rng::RngHierarchy;
use lotolab_core::store::{JsonModelStore, ModelStore};
use lotolab_core::{DrawRecord, PredictionEngine};
use lotolab_runner::learning::{LearningError, StageStatus};
use lotolab_runner::{
    JsonStateStore, LogProgress, LotoConfig, PredictionHistory, ProgressiveLearningManager, TimeSeriesValidator,
    ValidationReport, VerificationLearner,
};

#[derive(Parser)]
#[command(name = "lotolab", about = "LotoLab CLI — ensemble lottery prediction with walk-forward validation")]
struct Cli {
    /// Path to the TOML config. Defaults apply when the file does not exist.
    #[arg(long, global = true, default_value = "lotolab.toml")]
    config: PathBuf,

    /// Use N synthetic draws instead of the configured CSV history.
    #[arg(long, global = true)]
    synthetic: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run fixed-window and expanding-window validation and compare them.
    Validate {
        /// Window sizes to test (comma separated). Defaults to the config.
        #[arg(long, value_delimiter = ',')]
        windows: Option<Vec<usize>>,

        /// Print the full report as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Progressive learning stages.
    Stage {
        #[command(subcommand)]
        action: StageAction,
    },
    /// Train the production engine on the full history.
    Train,
    /// Generate candidate sets for the next round.
    Predict {
        /// Number of candidate sets.
        #[arg(long, default_value_t = 5)]
        count: usize,

        /// Skip adjustments learned from verified predictions.
        #[arg(long, default_value_t = false)]
        no_learning: bool,

        /// RNG seed. Defaults to entropy.
        #[arg(long)]
        seed: Option<u64>,

        /// Do not record the prediction in the history.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Verify recorded predictions against drawn results.
    Verify,
    /// Show engine, learning and history status.
    Status,
}

#[derive(Subcommand)]
enum StageAction {
    /// List every stage with its status.
    List,
    /// Execute one stage.
    Run {
        /// Stage id, e.g. stage1_fixed_10.
        id: String,
    },
    /// Clear every completed stage and accumulated insight.
    Reset,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let source = build_source(&config, cli.synthetic)?;

    match cli.command {
        Commands::Validate { windows, json } => run_validate(&config, source.as_ref(), windows, json),
        Commands::Stage { action } => match action {
            StageAction::List => run_stage_list(&config, source),
            StageAction::Run { id } => run_stage(&config, source, &id),
            StageAction::Reset => run_stage_reset(&config, source),
        },
        Commands::Train => run_train(&config, source.as_ref()),
        Commands::Predict {
            count,
            no_learning,
            seed,
            dry_run,
        } => run_predict(&config, source.as_ref(), count, !no_learning, seed, dry_run),
        Commands::Verify => run_verify(&config, source.as_ref()),
        Commands::Status => run_status(&config, source),
    }
}

fn load_config(path: &Path) -> Result<LotoConfig> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "config not found, using defaults");
        return Ok(LotoConfig::default());
    }
    LotoConfig::from_file(path).with_context(|| format!("loading config {}", path.display()))
}

fn build_source(config: &LotoConfig, synthetic: Option<u32>) -> Result<Arc<dyn DataSource>> {
    if let Some(rounds) = synthetic {
        return Ok(Arc::new(SyntheticDataSource::new(config.game, rounds, config.validation.seed)));
    }
    match &config.data.csv_path {
        Some(path) => Ok(Arc::new(CsvDataSource::new(path.clone(), config.data.columns.clone()))),
        None => bail!("no draw history configured: set data.csv_path or pass --synthetic <N>"),
    }
}

fn fetch(source: &dyn DataSource) -> Result<Vec<DrawRecord>> {
    let records = source
        .fetch_draws()
        .with_context(|| format!("fetching draws from {}", source.name()))?;
    tracing::info!(source = source.name(), draws = records.len(), "draw history loaded");
    Ok(records)
}

fn model_store(config: &LotoConfig) -> JsonModelStore {
    JsonModelStore::new(config.storage.model_path())
}

/// The saved engine, or an untrained one when nothing has been saved yet.
fn load_engine(config: &LotoConfig) -> Result<PredictionEngine> {
    let mut engine = PredictionEngine::new(config.engine_config());
    let store = model_store(config);
    if let Some(snapshot) = store.load().context("loading saved engine")? {
        engine.restore(snapshot).context("restoring saved engine")?;
    }
    Ok(engine)
}

fn learning_manager(config: &LotoConfig, source: Arc<dyn DataSource>) -> Result<ProgressiveLearningManager> {
    let engine = load_engine(config)?;
    let state_store = Arc::new(JsonStateStore::new(config.storage.state_path()));
    let manager = ProgressiveLearningManager::new(
        engine,
        source,
        state_store,
        config.validation.clone(),
        config.learning.clone(),
    )
    .context("opening learning state")?
    .with_model_store(Arc::new(model_store(config)))
    .with_progress(Arc::new(LogProgress));
    Ok(manager)
}

// ─── validate ────────────────────────────────────────────────────────

fn run_validate(config: &LotoConfig, source: &dyn DataSource, windows: Option<Vec<usize>>, json: bool) -> Result<()> {
    let records = fetch(source)?;
    let mut validation = config.validation.clone();
    if let Some(windows) = windows {
        if windows.is_empty() || windows.contains(&0) {
            bail!("--windows must list positive sizes");
        }
        validation.window_sizes = windows;
    }

    let validator = TimeSeriesValidator::new(config.engine_config(), validation).with_progress(Arc::new(LogProgress));
    let report = validator.run_validation(&records).context("running validation")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_validation(&report);
    }
    Ok(())
}

fn print_validation(report: &ValidationReport) {
    println!();
    println!("=== Validation ===");
    println!("Backtests:      {}", report.summary.total_validations);
    println!();
    println!("{:<12} {:>9} {:>10} {:>8} {:>8} {:>8} {:>10}", "Method", "Backtests", "Avg", "Std", "Max", "4+", "Score");
    println!("{}", "-".repeat(71));
    for stats in &report.comparison.configs {
        println!(
            "{:<12} {:>9} {:>10.3} {:>8.3} {:>8} {:>7.1}% {:>10.3}",
            stats.label.to_string(),
            stats.backtests,
            stats.mean_avg_matches,
            stats.std_avg_matches,
            stats.max_matches,
            stats.mean_frac_4_plus * 100.0,
            stats.composite_score,
        );
    }
    println!();
    match report.comparison.best_method {
        Some(best) => println!("Best method:    {best} (score {:.3})", report.comparison.best_score),
        None => println!("Best method:    (none)"),
    }
    println!("Recommendation: {}", report.comparison.recommendation);
    println!("Improvement:    {:.3}", report.comparison.improvement);
    println!();
}

// ─── stage ───────────────────────────────────────────────────────────

fn run_stage_list(config: &LotoConfig, source: Arc<dyn DataSource>) -> Result<()> {
    let manager = learning_manager(config, source)?;
    let progress = manager.get_learning_progress();

    println!(
        "Progress: {}/{} ({:.0}%)",
        progress.completed_stages, progress.total_stages, progress.progress_percentage
    );
    println!();
    println!("{:<22} {:<10} {}", "Stage", "Status", "Name");
    println!("{}", "-".repeat(60));
    for stage in &progress.stages {
        let status = match stage.status {
            StageStatus::Locked => "locked",
            StageStatus::Available => "available",
            StageStatus::Completed => "completed",
        };
        println!("{:<22} {:<10} {}", stage.id, status, stage.name);
    }
    if let Some(at) = progress.last_updated {
        println!();
        println!("Last updated: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    Ok(())
}

fn run_stage(config: &LotoConfig, source: Arc<dyn DataSource>, id: &str) -> Result<()> {
    let mut manager = learning_manager(config, source)?;
    let outcome = match manager.execute_learning_stage(id) {
        Ok(outcome) => outcome,
        Err(LearningError::Persistence { outcome, source }) => {
            eprintln!("WARNING: stage finished but was not saved: {source}");
            *outcome
        }
        Err(e @ LearningError::EngineNotTrained { .. }) => {
            return Err(e).context("run `lotolab train` before the ensemble stage")
        }
        Err(e) => return Err(e).with_context(|| format!("running stage {id}")),
    };

    let result = &outcome.stage_result;
    println!();
    println!("=== Stage {} ===", result.stage_id);
    println!("Backtests:      {}", result.total_tests);
    if let Some(avg) = result.analysis.avg_matches() {
        println!("Avg matches:    {avg:.3}");
    }
    for (feature, weight) in &result.feature_weights {
        println!("Weight {feature:<8} {weight:.3}");
    }
    if let Some(opt) = &result.optimization {
        println!("Model weights:  {}", serde_json::to_string(&opt.model_weights)?);
        println!("Stages merged:  {}", opt.stages_integrated);
        println!("Engine saved:   {}", opt.engine_saved);
    }
    println!(
        "Progress:       {}/{} ({:.0}%)",
        outcome.progress.completed_stages, outcome.progress.total_stages, outcome.progress.progress_percentage
    );
    println!();
    Ok(())
}

fn run_stage_reset(config: &LotoConfig, source: Arc<dyn DataSource>) -> Result<()> {
    let mut manager = learning_manager(config, source)?;
    manager.reset_learning_progress().context("resetting learning progress")?;
    println!("Learning progress reset.");
    Ok(())
}

// ─── train / predict / verify ────────────────────────────────────────

fn run_train(config: &LotoConfig, source: &dyn DataSource) -> Result<()> {
    let records = fetch(source)?;
    let integrity = check_integrity(&records, &config.game);
    if !integrity.is_clean() {
        tracing::warn!(
            invalid = integrity.invalid.total(),
            gaps = integrity.round_gaps.len(),
            "draw history has integrity issues"
        );
    }

    // Keep tuned weights from a previous save.
    let mut engine = load_engine(config)?;
    let training = engine.train(&records).context("training engine")?;
    let snapshot = engine.snapshot().context("engine has no trained ensemble after training")?;
    let store = model_store(config);
    store.save(&snapshot).context("saving engine")?;

    let status = engine.status();
    println!();
    println!("=== Training ===");
    println!("Draws:          {}", status.data_count);
    println!("Rows:           {}", training.extraction.rows);
    for (name, score) in &status.cv_scores {
        println!("{name:<16}{score:.4}");
    }
    println!("Saved to:       {}", store.path().display());
    println!();
    Ok(())
}

fn run_predict(
    config: &LotoConfig,
    source: &dyn DataSource,
    count: usize,
    use_learning: bool,
    seed: Option<u64>,
    dry_run: bool,
) -> Result<()> {
    if count == 0 {
        bail!("--count must be positive");
    }
    let engine = load_engine(config)?;
    if !engine.is_trained() {
        bail!("no trained engine at {}; run `lotolab train` first", config.storage.model_path().display());
    }

    let records = fetch(source)?;
    let round = next_round(&records).context("draw history is empty")?;
    let mut history = PredictionHistory::open(config.storage.history_path())?;

    let adjustments = if use_learning {
        let learner = VerificationLearner::default();
        let metrics = learner.learn(history.entries());
        Some(learner.adjustments(&metrics))
    } else {
        None
    };

    let seeds = match seed {
        Some(seed) => RngHierarchy::new(seed),
        None => RngHierarchy::from_entropy(),
    };
    let mut rng = seeds.rng_for("predict", u64::from(round));
    let prediction = engine
        .predict(count, adjustments.as_ref(), &mut rng)
        .context("generating candidates")?;

    println!();
    println!("=== Round {round} ({:?}) ===", prediction.mode);
    for (i, set) in prediction.candidates.iter().enumerate() {
        println!("{:>3}. {set}", i + 1);
    }
    println!();

    if dry_run {
        return Ok(());
    }
    history
        .add_prediction(round, prediction.candidates)
        .with_context(|| format!("recording prediction for round {round}"))?;
    println!("Recorded in {}", history.path().display());
    Ok(())
}

fn run_verify(config: &LotoConfig, source: &dyn DataSource) -> Result<()> {
    let records = fetch(source)?;
    let mut history = PredictionHistory::open(config.storage.history_path())?;
    let verified = history.auto_verify(&records, &config.game)?;
    println!("Verified {verified} new round(s).");

    let Some(stats) = history.accuracy_stats() else {
        println!("No verified predictions yet.");
        return Ok(());
    };
    println!();
    println!("=== Accuracy ===");
    println!("Rounds:         {}", stats.verified_rounds);
    println!("Sets:           {}", stats.total_predictions);
    println!("Avg matches:    {:.3}", stats.avg_matches);
    println!("Max matches:    {}", stats.max_matches);
    println!(
        "Tiers:          excellent {} / good {} / fair {} / poor {}",
        stats.excellent, stats.good, stats.fair, stats.poor
    );

    let learner = VerificationLearner::default();
    if let Some(report) = learner.report(history.entries()) {
        if let Some(pattern) = &report.metrics.high_accuracy {
            println!(
                "High accuracy:  sum {:.1}, odd {:.1} over {} set(s)",
                pattern.avg_sum, pattern.avg_odd_count, pattern.sample_size
            );
        }
        if !report.metrics.frequently_missed.is_empty() {
            let missed: Vec<String> = report
                .metrics
                .frequently_missed
                .iter()
                .map(|(n, c)| format!("{n}({c})"))
                .collect();
            println!("Often missed:   {}", missed.join(" "));
        }
    }
    println!();
    Ok(())
}

// ─── status ──────────────────────────────────────────────────────────

fn run_status(config: &LotoConfig, source: Arc<dyn DataSource>) -> Result<()> {
    let manager = learning_manager(config, Arc::clone(&source))?;
    let status = manager.engine().status();
    let progress = manager.get_learning_progress();
    let history = PredictionHistory::open(config.storage.history_path())?;
    let summary = history.summary();

    println!();
    println!("=== Engine ===");
    println!("Trained:        {}", status.trained);
    println!("Models:         {}", status.models.join(", "));
    println!("Weights:        {}", serde_json::to_string(&status.model_weights)?);
    println!("Draws:          {}", status.data_count);
    if let (Some(sum), Some(odd)) = (status.avg_sum, status.avg_odd) {
        println!("Pattern:        sum {sum:.1}, odd {odd:.2}");
    }
    println!();
    println!("=== Learning ===");
    println!(
        "Stages:         {}/{} ({:.0}%)",
        progress.completed_stages, progress.total_stages, progress.progress_percentage
    );
    println!();
    println!("=== History ===");
    println!("Rounds:         {} ({} verified, {} pending)", summary.total_rounds, summary.verified_rounds, summary.pending_rounds);
    match source.fetch_draws() {
        Ok(records) => match next_round(&records) {
            Some(round) => println!("Next round:     {round}"),
            None => println!("Next round:     (no draws)"),
        },
        Err(e) => println!("Next round:     unavailable ({e})"),
    }
    println!();
    Ok(())
}
