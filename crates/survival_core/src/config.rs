//! Pipeline configuration
//!
//! Every section is optional in the TOML file; missing fields take their
//! defaults. Environment variables prefixed `SURVIVAL_` override the file.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{CoreError, Result};

/// Full training pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub split: SplitConfig,
    pub model: ModelConfig,
    pub reduction: ReductionConfig,
    pub output: OutputConfig,
}

/// Dataset interpretation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    /// Binary outcome column
    pub target_column: String,
    /// Columns removed before training (identifiers, leakage)
    pub drop_columns: Vec<String>,
    /// Columns treated as categorical even when every value is numeric
    pub categorical_columns: Vec<String>,
    /// Cell values (after trimming) that mean "missing"
    pub missing_tokens: Vec<String>,
}

/// Train/test split
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SplitConfig {
    pub test_fraction: f64,
    pub seed: i64,
    pub stratify: bool,
}

/// Boosted-tree hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    /// Minimum hessian sum in a child
    pub min_child_weight: f64,
    pub min_samples_leaf: usize,
    /// L2 regularisation on leaf weights
    pub lambda: f64,
    /// Minimum loss reduction required to split
    pub gamma: f64,
    /// Fraction of rows sampled per tree
    pub subsample: f64,
    pub seed: i64,
}

/// How feature importance is measured
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ImportanceType {
    /// Average gain of the splits using the feature
    #[default]
    Gain,
    /// Total gain of the splits using the feature
    TotalGain,
    /// Number of splits using the feature
    Split,
}

impl FromStr for ImportanceType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gain" => Ok(Self::Gain),
            "total_gain" => Ok(Self::TotalGain),
            "split" => Ok(Self::Split),
            other => Err(CoreError::Config(format!(
                "expected 'gain', 'total_gain' or 'split', got '{}'",
                other
            ))),
        }
    }
}

/// Importance-driven feature reduction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReductionConfig {
    pub enabled: bool,
    /// Keep at most this many input columns
    pub top_k: Option<usize>,
    /// Minimum share of total importance a column needs to be kept
    pub min_importance: f64,
    pub importance_type: ImportanceType,
}

/// Artifact output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// Render the importance chart
    pub plot: bool,
    /// Probability at or above which a patient is labelled positive
    pub threshold: f64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            target_column: "DEATH_EVENT".to_string(),
            drop_columns: Vec::new(),
            categorical_columns: Vec::new(),
            missing_tokens: ["", "NA", "N/A", "na", "nan", "NaN", "null", "NULL", "?"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl DataConfig {
    pub fn is_missing(&self, cell: &str) -> bool {
        self.missing_tokens.iter().any(|t| t == cell)
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            stratify: true,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_child_weight: 1.0,
            min_samples_leaf: 1,
            lambda: 1.0,
            gamma: 0.0,
            subsample: 1.0,
            seed: 42,
        }
    }
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            top_k: None,
            min_importance: 0.01,
            importance_type: ImportanceType::Gain,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("artifacts"),
            plot: true,
            threshold: 0.5,
        }
    }
}

fn env_override<T: FromStr>(key: &str, target: &mut T) -> Result<()> {
    if let Ok(raw) = std::env::var(key) {
        *target = raw
            .parse()
            .map_err(|_| CoreError::Config(format!("{} has invalid value '{}'", key, raw)))?;
        info!("Configuration override from {}", key);
    }
    Ok(())
}

impl PipelineConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| CoreError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CoreError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Apply `SURVIVAL_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        env_override("SURVIVAL_TARGET_COLUMN", &mut self.data.target_column)?;
        env_override("SURVIVAL_SEED", &mut self.split.seed)?;
        env_override("SURVIVAL_TEST_FRACTION", &mut self.split.test_fraction)?;
        env_override("SURVIVAL_N_ESTIMATORS", &mut self.model.n_estimators)?;
        env_override("SURVIVAL_LEARNING_RATE", &mut self.model.learning_rate)?;
        env_override("SURVIVAL_MAX_DEPTH", &mut self.model.max_depth)?;
        env_override("SURVIVAL_OUTPUT_DIR", &mut self.output.dir)?;
        Ok(())
    }

    /// Reject out-of-range settings
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(CoreError::Config(msg.to_string()));

        if self.data.target_column.trim().is_empty() {
            return fail("data.target_column must not be empty");
        }
        if !(self.split.test_fraction > 0.0 && self.split.test_fraction < 1.0) {
            return fail("split.test_fraction must be in (0, 1)");
        }
        if self.model.n_estimators == 0 {
            return fail("model.n_estimators must be at least 1");
        }
        if !(self.model.learning_rate > 0.0) {
            return fail("model.learning_rate must be positive");
        }
        if self.model.max_depth == 0 {
            return fail("model.max_depth must be at least 1");
        }
        if !(self.model.subsample > 0.0 && self.model.subsample <= 1.0) {
            return fail("model.subsample must be in (0, 1]");
        }
        if !(self.model.lambda >= 0.0) {
            return fail("model.lambda must be non-negative");
        }
        if !(self.model.gamma >= 0.0) {
            return fail("model.gamma must be non-negative");
        }
        if !(self.model.min_child_weight >= 0.0) {
            return fail("model.min_child_weight must be non-negative");
        }
        if !(self.output.threshold > 0.0 && self.output.threshold < 1.0) {
            return fail("output.threshold must be in (0, 1)");
        }
        if !(self.reduction.min_importance >= 0.0 && self.reduction.min_importance < 1.0) {
            return fail("reduction.min_importance must be in [0, 1)");
        }
        if self.reduction.top_k == Some(0) {
            return fail("reduction.top_k must be at least 1");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.data.target_column, "DEATH_EVENT");
        assert!(config.data.is_missing("NA"));
        assert!(config.data.is_missing(""));
        assert!(!config.data.is_missing("0"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [model]
            n_estimators = 25
            max_depth = 4

            [reduction]
            top_k = 5
            importance_type = "split"
            "#,
        )
        .unwrap();

        assert_eq!(config.model.n_estimators, 25);
        assert_eq!(config.model.max_depth, 4);
        assert_eq!(config.model.learning_rate, 0.1);
        assert_eq!(config.reduction.top_k, Some(5));
        assert_eq!(config.reduction.importance_type, ImportanceType::Split);
        assert_eq!(config.split.test_fraction, 0.2);
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = PipelineConfig::default();
        config.reduction.top_k = Some(3);
        config.data.drop_columns = vec!["patient_id".to_string()];

        let text = config.to_toml_string().unwrap();
        let parsed = PipelineConfig::from_toml_str(&text).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("survival.toml");
        std::fs::write(&path, "[data]\ntarget_column = \"died\"\n").unwrap();

        let config = PipelineConfig::load_from_file(&path).unwrap();
        assert_eq!(config.data.target_column, "died");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = PipelineConfig::default();
        config.split.test_fraction = 1.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.model.learning_rate = 0.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.model.subsample = 0.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.reduction.top_k = Some(0);
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.data.target_column = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_importance_type() {
        assert!("gain".parse::<ImportanceType>().is_ok());
        assert!("weight".parse::<ImportanceType>().is_err());
        assert!(PipelineConfig::from_toml_str("[reduction]\nimportance_type = \"cover\"\n").is_err());
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("SURVIVAL_N_ESTIMATORS", "7");
        let mut config = PipelineConfig::default();
        config.apply_env_overrides().unwrap();
        std::env::remove_var("SURVIVAL_N_ESTIMATORS");

        assert_eq!(config.model.n_estimators, 7);
    }
}
