//! Core library for patient survival classification
//!
//! Provides the pieces shared by training and inference: the column-wise
//! preprocessing transformer, the boosted-tree classifier, evaluation
//! metrics, artifact persistence and single-patient prediction.
//!
//! Modules:
//! - `preprocess`: Imputation, one-hot encoding and standard scaling
//! - `gbdt`: Boosted-tree model, trees and logistic link
//! - `metrics`: Accuracy, precision/recall, ROC AUC, log loss
//! - `artifacts`: Hash-verified save/load of the fitted pipeline
//! - `predictor`: Patient records and single-row scoring
//! - `config`: TOML pipeline configuration
//! - `serde_canon`: Canonical JSON and Blake3 hashing

pub mod artifacts;
pub mod config;
pub mod errors;
pub mod gbdt;
pub mod metrics;
pub mod predictor;
pub mod preprocess;
pub mod serde_canon;

pub use artifacts::{ArtifactBundle, ArtifactManifest};
pub use config::{
    DataConfig, ImportanceType, ModelConfig, OutputConfig, PipelineConfig, ReductionConfig,
    SplitConfig,
};
pub use errors::{CoreError, Result};
pub use gbdt::{Model, ModelMetadata, Node, Tree};
pub use metrics::{ConfusionMatrix, EvaluationReport};
pub use predictor::{PatientRecord, Prediction, Predictor};
pub use preprocess::{ColumnKind, ColumnSpec, ColumnTransformer};

/// Crate version string written into artifact manifests
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
