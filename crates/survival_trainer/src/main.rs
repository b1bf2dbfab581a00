//! Patient survival classifier CLI
//!
//! `survival train` fits and persists the pipeline, `survival predict`
//! scores one patient from saved artifacts.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand};
use survival_core::{PatientRecord, PipelineConfig, Predictor};
use survival_trainer::run_training;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "survival")]
#[command(author = "Survival Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train and query a patient survival classifier", long_about = None)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train, evaluate and persist the pipeline
    Train(TrainArgs),
    /// Score a single patient with saved artifacts
    Predict(PredictArgs),
    /// Print the default configuration as TOML
    Config,
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Input CSV dataset path (headed, one row per patient)
    #[arg(short, long)]
    input: PathBuf,

    /// Pipeline configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory for artifacts
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Outcome column name
    #[arg(long)]
    target: Option<String>,

    /// Number of boosting trees
    #[arg(long)]
    trees: Option<usize>,

    /// Maximum tree depth
    #[arg(long)]
    max_depth: Option<usize>,

    #[arg(long)]
    learning_rate: Option<f64>,

    /// Seed for the split and row subsampling
    #[arg(long)]
    seed: Option<i64>,

    /// Keep at most this many columns after reduction
    #[arg(long)]
    top_k: Option<usize>,

    /// Persist the model trained on every column
    #[arg(long)]
    no_reduction: bool,

    /// Skip the importance chart
    #[arg(long)]
    no_plot: bool,
}

#[derive(Args, Debug)]
#[command(group(
    ArgGroup::new("source")
        .required(true)
        .args(["field", "record", "interactive"]),
))]
struct PredictArgs {
    /// Artifact directory written by `survival train`
    #[arg(short, long, default_value = "artifacts")]
    artifacts: PathBuf,

    /// Patient value as column=value (repeatable)
    #[arg(short, long = "field", value_name = "COLUMN=VALUE")]
    field: Vec<String>,

    /// JSON file holding one patient object
    #[arg(short, long)]
    record: Option<PathBuf>,

    /// Prompt for each column on the terminal
    #[arg(long)]
    interactive: bool,

    /// Probability at or above which the patient is labelled positive
    #[arg(long)]
    threshold: Option<f64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    match cli.command {
        Command::Train(args) => train(args),
        Command::Predict(args) => predict(args),
        Command::Config => {
            print!("{}", PipelineConfig::default().to_toml_string()?);
            Ok(())
        }
    }
}

fn train(args: TrainArgs) -> Result<()> {
    info!("Patient survival trainer v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => PipelineConfig::load_from_file(path).context("Failed to load configuration")?,
        None => PipelineConfig::default(),
    };
    config
        .apply_env_overrides()
        .context("Invalid environment override")?;

    if let Some(output) = args.output {
        config.output.dir = output;
    }
    if let Some(target) = args.target {
        config.data.target_column = target;
    }
    if let Some(trees) = args.trees {
        config.model.n_estimators = trees;
    }
    if let Some(depth) = args.max_depth {
        config.model.max_depth = depth;
    }
    if let Some(lr) = args.learning_rate {
        config.model.learning_rate = lr;
    }
    if let Some(seed) = args.seed {
        config.split.seed = seed;
        config.model.seed = seed;
    }
    if let Some(k) = args.top_k {
        config.reduction.top_k = Some(k);
    }
    if args.no_reduction {
        config.reduction.enabled = false;
    }
    if args.no_plot {
        config.output.plot = false;
    }

    info!("Training configuration:");
    info!("  Target: {}", config.data.target_column);
    info!("  Trees: {}", config.model.n_estimators);
    info!("  Max depth: {}", config.model.max_depth);
    info!("  Learning rate: {}", config.model.learning_rate);
    info!("  Seed: {}", config.split.seed);

    let outcome = run_training(&config, &args.input)
        .with_context(|| format!("Training failed for {}", args.input.display()))?;

    let report = outcome.reduced_report.as_ref().unwrap_or(&outcome.full_report);
    info!("Training completed successfully");
    info!("  Columns: {}", outcome.selected_columns.join(", "));
    info!("  Test accuracy: {:.4}, ROC AUC: {:.4}", report.accuracy, report.roc_auc);
    info!("  Artifacts: {}", outcome.artifact_dir.display());
    for (file, hash) in &outcome.manifest.files {
        info!("    {} ({})", file, hash);
    }

    Ok(())
}

fn predict(args: PredictArgs) -> Result<()> {
    let mut predictor = Predictor::from_dir(&args.artifacts)
        .with_context(|| format!("Failed to load artifacts from {}", args.artifacts.display()))?;
    if let Some(threshold) = args.threshold {
        predictor = predictor.with_threshold(threshold)?;
    }

    let record = if args.interactive {
        prompt_record(predictor.columns())?
    } else if let Some(path) = &args.record {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let value: serde_json::Value =
            serde_json::from_str(&content).context("Patient record is not valid JSON")?;
        PatientRecord::from_json(&value)?
    } else if !args.field.is_empty() {
        PatientRecord::from_pairs(&args.field)?
    } else {
        bail!("no patient values given");
    };

    let prediction = predictor.predict(&record)?;
    println!("{}", serde_json::to_string_pretty(&prediction)?);
    Ok(())
}

/// Ask for every column on stderr; a blank answer leaves the value missing
fn prompt_record(columns: &[String]) -> Result<PatientRecord> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut stderr = io::stderr();
    let mut record = PatientRecord::new();

    for column in columns {
        write!(stderr, "{}: ", column)?;
        stderr.flush()?;
        let answer = match lines.next() {
            Some(line) => line?,
            None => String::new(),
        };
        let answer = answer.trim();
        record.set(column.as_str(), (!answer.is_empty()).then_some(answer));
    }

    Ok(record)
}
