//! Trendchain CLI: momentum simulation, transition tables, and category summaries.
//!
//! Commands:
//! - `simulate`: fit a model to a history and write simulated trajectories (JSON or CSV)
//! - `table`: print the fitted reference statistics and transition table as JSON
//! - `categorize`: print per-category counts and next-day profiles as JSON
//!
//! Every command reads a TOML run file with a `[simulation]` table (any
//! `SimulationConfig` field) and an `[input]` table holding either
//! `movements` or `prices` (plus an optional `period`).

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use trendchain_core::{
    categorize_movements, price_movements, CategoryCounts, CategoryMode, ConditionalProfile,
    ConditioningOrder, MomentumSimulator, ReferenceStats, SimulationConfig, SimulationResult,
};

/// Starting value used when the input gives movements and no starting value.
const DEFAULT_STARTING_VALUE: f64 = 100.0;

#[derive(Parser)]
#[command(
    name = "trendchain",
    about = "Trendchain CLI: Markov momentum simulation of price movements"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate trajectories from a TOML run file.
    Simulate {
        /// Path to the TOML run file.
        #[arg(long)]
        config: PathBuf,

        /// Conditioning order (1 or 2). Overrides the run file.
        #[arg(long)]
        order: Option<usize>,

        /// Number of trials. Overrides the run file.
        #[arg(long)]
        trials: Option<usize>,

        /// Steps per trial. Overrides the run file.
        #[arg(long)]
        steps: Option<usize>,

        /// Master seed. Overrides the run file.
        #[arg(long)]
        seed: Option<u64>,

        /// Run trials on one thread.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Output file. Defaults to stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the fitted transition table as JSON.
    Table {
        /// Path to the TOML run file.
        #[arg(long)]
        config: PathBuf,

        /// Conditioning order (1 or 2). Overrides the run file.
        #[arg(long)]
        order: Option<usize>,
    },
    /// Print category counts and next-day profiles as JSON.
    Categorize {
        /// Path to the TOML run file.
        #[arg(long)]
        config: PathBuf,

        /// Number of categories (4 or 8).
        #[arg(long, default_value_t = 4)]
        mode: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

// ─── Run file ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RunFile {
    #[serde(default)]
    simulation: SimulationConfig,
    input: InputSection,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct InputSection {
    movements: Option<Vec<f64>>,
    prices: Option<Vec<f64>>,
    #[serde(default = "default_period")]
    period: usize,
    starting_value: Option<f64>,
}

fn default_period() -> usize {
    1
}

impl RunFile {
    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading run file {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("in run file {}", path.display()))
    }

    fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("parsing run file TOML")
    }
}

impl InputSection {
    /// Percent movements to fit, either given directly or derived from prices.
    fn history(&self) -> Result<Vec<f64>> {
        match (&self.movements, &self.prices) {
            (Some(_), Some(_)) => bail!("[input] takes either `movements` or `prices`, not both"),
            (Some(movements), None) => Ok(movements.clone()),
            (None, Some(prices)) => price_movements(prices, self.period)
                .with_context(|| format!("deriving movements with period {}", self.period)),
            (None, None) => bail!("[input] needs `movements` or `prices`"),
        }
    }

    /// Explicit starting value, else the last price, else the default.
    fn starting_value(&self) -> f64 {
        self.starting_value
            .or_else(|| self.prices.as_ref().and_then(|p| p.last().copied()))
            .unwrap_or(DEFAULT_STARTING_VALUE)
    }
}

/// Command-line overrides applied on top of the run file's `[simulation]`.
#[derive(Debug, Default)]
struct Overrides {
    order: Option<usize>,
    trials: Option<usize>,
    steps: Option<usize>,
    seed: Option<u64>,
    sequential: bool,
}

impl Overrides {
    fn apply(&self, mut config: SimulationConfig) -> Result<SimulationConfig> {
        if let Some(order) = self.order {
            config.order = ConditioningOrder::try_from(order)?;
        }
        if let Some(trials) = self.trials {
            config.n_trials = trials;
        }
        if let Some(steps) = self.steps {
            config.n_steps = steps;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if self.sequential {
            config.parallel = false;
        }
        Ok(config)
    }
}

// ─── Commands ────────────────────────────────────────────────────────

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            config,
            order,
            trials,
            steps,
            seed,
            sequential,
            format,
            output,
        } => {
            let overrides = Overrides {
                order,
                trials,
                steps,
                seed,
                sequential,
            };
            run_simulate(&config, &overrides, format, output.as_deref())
        }
        Commands::Table { config, order } => {
            let overrides = Overrides {
                order,
                ..Default::default()
            };
            run_table(&config, &overrides)
        }
        Commands::Categorize { config, mode } => run_categorize(&config, mode),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries results; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run_simulate(
    config_path: &Path,
    overrides: &Overrides,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<()> {
    let run = RunFile::from_file(config_path)?;
    let config = overrides.apply(run.simulation)?;
    let history = run.input.history()?;
    let starting_value = run.input.starting_value();

    info!(
        history = history.len(),
        starting_value,
        "loaded run file {}",
        config_path.display()
    );

    let simulator = MomentumSimulator::new(config).context("invalid simulation config")?;
    let result = simulator
        .simulate(&history, starting_value)
        .context("simulation failed")?;

    log_summary(&result);
    if result.sentinel_steps() > 0 {
        warn!(
            sentinel_steps = result.sentinel_steps(),
            "resolver fell back to 0.0 movements; consider a larger resolver_batch"
        );
    }

    let mut out = open_output(output)?;
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, &result).context("writing JSON output")?;
            writeln!(out)?;
        }
        OutputFormat::Csv => write_csv(&mut out, &result)?,
    }
    out.flush()?;

    if let Some(path) = output {
        info!("trajectories saved to {}", path.display());
    }
    Ok(())
}

fn run_table(config_path: &Path, overrides: &Overrides) -> Result<()> {
    let run = RunFile::from_file(config_path)?;
    let config = overrides.apply(run.simulation)?;
    let history = run.input.history()?;

    let model = MomentumSimulator::new(config)
        .context("invalid simulation config")?
        .fit(&history)
        .context("fitting transition table")?;

    let mut out = open_output(None)?;
    serde_json::to_writer_pretty(&mut out, &model)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// JSON document printed by `categorize`.
#[derive(Debug, Serialize)]
struct CategorySummary {
    reference: ReferenceStats,
    counts: CategoryCounts,
    /// Next-day profiles for every label that occurs in the history.
    profiles: Vec<ConditionalProfile>,
}

fn run_categorize(config_path: &Path, mode: usize) -> Result<()> {
    let run = RunFile::from_file(config_path)?;
    let history = run.input.history()?;
    let mode = CategoryMode::try_from(mode)?;

    let summary = summarize_categories(&history, mode)?;

    let mut out = open_output(None)?;
    serde_json::to_writer_pretty(&mut out, &summary)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

fn summarize_categories(history: &[f64], mode: CategoryMode) -> Result<CategorySummary> {
    let (categories, reference) =
        categorize_movements(history, mode).context("categorizing history")?;

    let mut profiles = Vec::new();
    for &previous in mode.labels() {
        match ConditionalProfile::next_day(&categories, previous, mode) {
            Ok(profile) => profiles.push(profile),
            Err(e) if e.is_insufficient_history() => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(CategorySummary {
        reference,
        counts: CategoryCounts::from_categories(&categories, mode),
        profiles,
    })
}

// ─── Output ──────────────────────────────────────────────────────────

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            let file =
                File::create(path).with_context(|| format!("creating {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

/// One CSV row: step 0 is the starting value with no movement.
#[derive(Debug, Serialize)]
struct PathRow {
    trial: usize,
    step: usize,
    movement: Option<f64>,
    price: f64,
}

fn write_csv<W: Write>(out: W, result: &SimulationResult) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    for trajectory in &result.trajectories {
        for (step, &price) in trajectory.prices.iter().enumerate() {
            wtr.serialize(PathRow {
                trial: trajectory.trial,
                step,
                movement: step.checked_sub(1).map(|i| trajectory.movements[i]),
                price,
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

fn log_summary(result: &SimulationResult) {
    let mut finals = result.final_prices();
    if finals.is_empty() {
        return;
    }
    finals.sort_by(f64::total_cmp);
    let mean = finals.iter().sum::<f64>() / finals.len() as f64;
    let absorbed = result.trajectories.iter().filter(|t| t.is_absorbed()).count();

    info!(
        run_id = %result.run_id,
        trials = finals.len(),
        start = result.starting_value,
        mean_final = mean,
        median_final = finals[finals.len() / 2],
        min_final = finals[0],
        max_final = finals[finals.len() - 1],
        absorbed,
        "simulation summary"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOVEMENTS_RUN: &str = r#"
[simulation]
n_steps = 5
n_trials = 3
order = 1

[input]
movements = [1.0, -2.0, 0.5, -0.3, 2.0, -1.0, 0.8, -0.6, 1.5, -0.9]
"#;

    #[test]
    fn parses_movements_run_file() {
        let run = RunFile::from_toml(MOVEMENTS_RUN).unwrap();
        assert_eq!(run.simulation.n_steps, 5);
        assert_eq!(run.simulation.n_trials, 3);
        assert_eq!(run.simulation.seed, 42);
        assert_eq!(run.input.history().unwrap().len(), 10);
        assert_eq!(run.input.starting_value(), DEFAULT_STARTING_VALUE);
    }

    #[test]
    fn prices_are_converted_to_movements() {
        let run = RunFile::from_toml(
            r#"
[input]
prices = [100.0, 110.0, 99.0, 108.9]
"#,
        )
        .unwrap();
        let history = run.input.history().unwrap();
        assert_eq!(history.len(), 3);
        assert!((history[0] - 10.0).abs() < 1e-9);
        assert!((history[1] + 10.0).abs() < 1e-9);
        assert_eq!(run.input.starting_value(), 108.9);
        assert_eq!(run.simulation, SimulationConfig::default());
    }

    #[test]
    fn period_samples_every_nth_price() {
        let run = RunFile::from_toml(
            r#"
[input]
prices = [100.0, 50.0, 200.0, 1.0, 100.0]
period = 2
starting_value = 7.5
"#,
        )
        .unwrap();
        let history = run.input.history().unwrap();
        assert_eq!(history.len(), 2);
        assert!((history[0] - 100.0).abs() < 1e-9);
        assert!((history[1] + 50.0).abs() < 1e-9);
        assert_eq!(run.input.starting_value(), 7.5);
    }

    #[test]
    fn input_needs_exactly_one_source() {
        let both = RunFile::from_toml("[input]\nmovements = [1.0]\nprices = [1.0]\n").unwrap();
        assert!(both.input.history().is_err());

        let neither = RunFile::from_toml("[input]\nperiod = 2\n").unwrap();
        assert!(neither.input.history().is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(RunFile::from_toml("[input]\nmovement = [1.0]\n").is_err());
        assert!(RunFile::from_toml("[simulation]\ntrials = 3\n[input]\n").is_err());
    }

    #[test]
    fn overrides_replace_run_file_values() {
        let run = RunFile::from_toml(MOVEMENTS_RUN).unwrap();
        let overrides = Overrides {
            order: Some(2),
            trials: Some(9),
            seed: Some(1),
            sequential: true,
            ..Default::default()
        };
        let config = overrides.apply(run.simulation).unwrap();
        assert_eq!(config.order, ConditioningOrder::Two);
        assert_eq!(config.n_trials, 9);
        assert_eq!(config.n_steps, 5);
        assert_eq!(config.seed, 1);
        assert!(!config.parallel);

        let bad = Overrides {
            order: Some(3),
            ..Default::default()
        };
        assert!(bad.apply(SimulationConfig::default()).is_err());
    }

    #[test]
    fn csv_has_one_row_per_price() {
        let run = RunFile::from_toml(MOVEMENTS_RUN).unwrap();
        let history = run.input.history().unwrap();
        let result = MomentumSimulator::new(run.simulation)
            .unwrap()
            .simulate(&history, 100.0)
            .unwrap();

        let mut buf = Vec::new();
        write_csv(&mut buf, &result).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "trial,step,movement,price");
        assert_eq!(lines.len(), 1 + 3 * 6);
        assert_eq!(lines[1], "0,0,,100.0");
    }

    #[test]
    fn summary_skips_unseen_labels() {
        // Only gains in 8-category mode around a positive mean.
        let history = [1.0, 2.0, 1.5, 2.5, 1.2, 2.2];
        let summary = summarize_categories(&history, CategoryMode::Eight).unwrap();
        assert_eq!(summary.counts.total, 6);
        assert_eq!(summary.counts.entries.len(), 8);
        assert!(!summary.profiles.is_empty());
        assert!(summary.profiles.len() < 8);
        assert!(summary.profiles.iter().all(|p| p.observed > 0));
    }
}
