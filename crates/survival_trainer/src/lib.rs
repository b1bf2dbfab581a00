//! Patient survival trainer
//!
//! Loads a clinical CSV, fits the preprocessing pipeline and a boosted-tree
//! classifier, ranks and reduces input columns by importance, and writes the
//! artifacts the predictor loads.

pub mod cart;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod importance;
pub mod pipeline;
pub mod plot;
pub mod reduction;
pub mod trainer;

pub use dataset::{train_test_split, ColumnStats, LabeledDataset, Table, TargetEncoding};
pub use deterministic::{LcgRng, SplitTieBreaker};
pub use errors::{Result, TrainerError};
pub use importance::{aggregate_by_source, feature_importance, normalize, rank_columns};
pub use pipeline::{run_training, TrainingOutcome};
pub use reduction::select_columns;
pub use trainer::{GbdtTrainer, TrainingParams};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
