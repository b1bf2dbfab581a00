//! End-to-end training pipeline
//!
//! load → split → fit preprocessor → train → evaluate → importance → plot →
//! reduce and retrain → persist.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use survival_core::{
    ArtifactBundle, ArtifactManifest, ColumnTransformer, EvaluationReport, Model, PipelineConfig,
};
use tracing::{debug, info, instrument};

use crate::dataset::{train_test_split, LabeledDataset, TargetEncoding};
use crate::errors::Result;
use crate::importance::rank_columns;
use crate::plot::plot_importance;
use crate::reduction::select_columns;
use crate::trainer::{GbdtTrainer, TrainingParams};

pub const METRICS_FILE: &str = "metrics.json";
pub const IMPORTANCE_FILE: &str = "importance.json";
pub const IMPORTANCE_PLOT_FILE: &str = "importance.svg";

/// Everything a training run produced
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// Test-split metrics of the model trained on every column
    pub full_report: EvaluationReport,
    /// Test-split metrics after feature reduction (None when disabled)
    pub reduced_report: Option<EvaluationReport>,
    /// Normalised input-column importance of the full model, descending
    pub importance: Vec<(String, f64)>,
    /// Input columns of the persisted pipeline
    pub selected_columns: Vec<String>,
    pub artifact_dir: PathBuf,
    pub manifest: ArtifactManifest,
}

/// Preprocessor and model fitted together on one column set
#[derive(Clone)]
struct FittedStage {
    transformer: ColumnTransformer,
    model: Model,
    report: EvaluationReport,
}

#[derive(Serialize)]
struct MetricsFile<'a> {
    created_at: String,
    dataset_fingerprint: String,
    train_rows: usize,
    test_rows: usize,
    target_encoding: &'a TargetEncoding,
    full: &'a EvaluationReport,
    reduced: Option<&'a EvaluationReport>,
    selected_columns: &'a [String],
}

#[derive(Serialize)]
struct ImportanceEntry<'a> {
    column: &'a str,
    importance: f64,
}

/// Run the whole training pipeline on a CSV file
#[instrument(skip(config), fields(input = %input.display()))]
pub fn run_training(config: &PipelineConfig, input: &Path) -> Result<TrainingOutcome> {
    config.validate()?;

    let dataset = LabeledDataset::from_csv(input, &config.data)?;
    info!(
        "Loaded {} rows, {} feature columns, positive rate {:.3}",
        dataset.len(),
        dataset.columns.len(),
        dataset.positive_rate()
    );
    for stats in dataset.feature_stats() {
        debug!(
            "  {:<28} {:?} missing={} distinct={} range={:?}",
            stats.name, stats.kind, stats.missing, stats.distinct, stats.range
        );
    }

    let (train, test) = train_test_split(&dataset, &config.split)?;

    let full = fit_stage(&train, &test, config)?;
    full.report.log("Full model (test split)");

    let importance = rank_columns(&full.model, &full.transformer, config.reduction.importance_type);
    info!("Column importance ({:?}):", config.reduction.importance_type);
    for (name, share) in &importance {
        info!("  {:<28} {:.4}", name, share);
    }

    let out_dir = &config.output.dir;
    fs::create_dir_all(out_dir)?;

    if config.output.plot {
        plot_importance(
            &out_dir.join(IMPORTANCE_PLOT_FILE),
            &importance,
            "Feature importance",
        )?;
    }

    let (persisted, reduced_report) = if config.reduction.enabled {
        let selected = select_columns(&importance, &config.reduction);
        let reduced = fit_stage(
            &train.select_columns(&selected)?,
            &test.select_columns(&selected)?,
            config,
        )?;
        reduced.report.log("Reduced model (test split)");
        let report = reduced.report.clone();
        (reduced, Some(report))
    } else {
        (full.clone(), None)
    };

    let bundle = ArtifactBundle::new(persisted.transformer, persisted.model)?
        .with_threshold(config.output.threshold)?;
    let manifest = bundle.save(out_dir)?;

    let metrics = MetricsFile {
        created_at: manifest.created_at.clone(),
        dataset_fingerprint: train.fingerprint(),
        train_rows: train.len(),
        test_rows: test.len(),
        target_encoding: &dataset.target_encoding,
        full: &full.report,
        reduced: reduced_report.as_ref(),
        selected_columns: &bundle.columns,
    };
    fs::write(out_dir.join(METRICS_FILE), serde_json::to_string_pretty(&metrics)?)?;

    let entries: Vec<ImportanceEntry> = importance
        .iter()
        .map(|(column, importance)| ImportanceEntry {
            column,
            importance: *importance,
        })
        .collect();
    fs::write(out_dir.join(IMPORTANCE_FILE), serde_json::to_string_pretty(&entries)?)?;

    info!(
        "Persisted pipeline on {} columns to {}",
        bundle.columns.len(),
        out_dir.display()
    );

    Ok(TrainingOutcome {
        full_report: full.report,
        reduced_report,
        importance,
        selected_columns: bundle.columns,
        artifact_dir: out_dir.clone(),
        manifest,
    })
}

/// Fit preprocessing and model on `train`, then score `test`
fn fit_stage(train: &LabeledDataset, test: &LabeledDataset, config: &PipelineConfig) -> Result<FittedStage> {
    let transformer = ColumnTransformer::fit(train.columns.clone(), &train.rows)?
        .with_missing_tokens(config.data.missing_tokens.clone());
    let train_x = transformer.transform(&train.rows)?;

    let trainer = GbdtTrainer::new(TrainingParams::from(&config.model));
    let mut model = trainer.train(&train_x, &train.labels, transformer.output_feature_names())?;
    model.metadata.dataset_fingerprint = train.fingerprint();

    let test_x = transformer.transform(&test.rows)?;
    let probabilities = model.predict_proba_batch(&test_x);
    let report = EvaluationReport::compute(&probabilities, &test.labels, config.output.threshold)?;

    Ok(FittedStage {
        transformer,
        model,
        report,
    })
}
