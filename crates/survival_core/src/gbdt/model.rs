//! Boosted-tree binary classifier
//!
//! The model stores the raw (log-odds) base score plus an ensemble of
//! regression trees whose leaves already include the learning-rate
//! shrinkage. The positive-class probability is the logistic sigmoid of the
//! summed raw score.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::tree::Tree;
use crate::errors::{CoreError, Result};
use crate::serde_canon::{hash_canonical_hex, to_canonical_json};

/// Current model format version
pub const MODEL_VERSION: i32 = 1;

/// Probabilities are kept away from exact 0 and 1 when converted to log-odds
const PROB_EPSILON: f64 = 1e-15;

/// Logistic sigmoid, numerically stable for large magnitudes
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Log-odds of a probability, clamped to a finite range
pub fn logit(p: f64) -> f64 {
    let p = p.clamp(PROB_EPSILON, 1.0 - PROB_EPSILON);
    (p / (1.0 - p)).ln()
}

/// Training provenance stored alongside the trees
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ModelMetadata {
    /// Unix timestamp (seconds) of training completion
    pub created_at: i64,
    pub feature_count: usize,
    pub tree_count: usize,
    pub max_depth: usize,
    pub training_rows: usize,
    /// Hex fingerprint of the training rows
    pub dataset_fingerprint: String,
    pub hyperparameters: BTreeMap<String, f64>,
}

/// Gradient-boosted binary classifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Model {
    /// Model format version
    pub version: i32,

    /// Raw score every prediction starts from (log-odds)
    pub base_score: f64,

    /// Decision trees in the ensemble
    pub trees: Vec<Tree>,

    /// Names of the transformed features the trees index into
    pub feature_names: Vec<String>,

    pub metadata: ModelMetadata,
}

impl Model {
    /// Create a new model with empty metadata
    pub fn new(trees: Vec<Tree>, base_score: f64, feature_names: Vec<String>) -> Self {
        let metadata = ModelMetadata {
            feature_count: feature_names.len(),
            tree_count: trees.len(),
            max_depth: trees.iter().map(Tree::depth).max().unwrap_or(0),
            ..ModelMetadata::default()
        };

        Self {
            version: MODEL_VERSION,
            base_score,
            trees,
            feature_names,
            metadata,
        }
    }

    /// Number of input features expected by `predict_proba`
    pub fn feature_count(&self) -> usize {
        self.feature_names.len()
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Validate model structure
    pub fn validate(&self) -> Result<()> {
        if self.version != MODEL_VERSION {
            return Err(CoreError::Validation(format!(
                "Unsupported model version: {}",
                self.version
            )));
        }

        if !self.base_score.is_finite() {
            return Err(CoreError::Validation(format!(
                "Invalid base score: {}",
                self.base_score
            )));
        }

        let feature_count = self.feature_count();
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(feature_count).map_err(|e| {
                CoreError::Validation(format!("Tree {} validation failed: {}", i, e))
            })?;
        }

        Ok(())
    }

    /// Raw ensemble output (log-odds)
    pub fn raw_score(&self, features: &[f64]) -> f64 {
        self.trees
            .iter()
            .fold(self.base_score, |acc, tree| acc + tree.evaluate(features))
    }

    /// Probability of the positive class
    pub fn predict_proba(&self, features: &[f64]) -> f64 {
        sigmoid(self.raw_score(features))
    }

    /// Probability of the positive class, checking the feature width first
    pub fn try_predict_proba(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.feature_count() {
            return Err(CoreError::InvalidInput(format!(
                "expected {} features, got {}",
                self.feature_count(),
                features.len()
            )));
        }
        Ok(self.predict_proba(features))
    }

    /// Hard class label at the given probability threshold
    pub fn predict(&self, features: &[f64], threshold: f64) -> u8 {
        u8::from(self.predict_proba(features) >= threshold)
    }

    /// Probabilities for a batch of rows
    pub fn predict_proba_batch(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|row| self.predict_proba(row)).collect()
    }

    /// Serialize model to canonical JSON
    pub fn to_canonical_json(&self) -> Result<String> {
        to_canonical_json(self)
    }

    /// Compute Blake3 hash of the canonical JSON representation
    pub fn hash_hex(&self) -> Result<String> {
        hash_canonical_hex(self)
    }

    /// Save model to JSON file with canonical serialization
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = self.to_canonical_json()?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load and validate a model from a JSON file
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let model: Model = serde_json::from_str(&json)?;
        model.validate()?;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gbdt::tree::Node;

    fn create_test_model() -> Model {
        let tree1 = Tree::new(vec![
            Node::internal(0, 0, 50.0, 1, 2),
            Node::leaf(1, -1.0),
            Node::leaf(2, 1.0),
        ]);
        let tree2 = Tree::new(vec![
            Node::internal(0, 1, 0.5, 1, 2),
            Node::leaf(1, -0.5),
            Node::leaf(2, 0.5),
        ]);

        Model::new(
            vec![tree1, tree2],
            0.25,
            vec!["age".to_string(), "smoking".to_string()],
        )
    }

    #[test]
    fn test_sigmoid_and_logit() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
        assert!(sigmoid(1000.0) <= 1.0);
        assert!(sigmoid(-1000.0) >= 0.0);
        assert!((sigmoid(logit(0.3)) - 0.3).abs() < 1e-12);
        assert!(logit(0.0).is_finite());
        assert!(logit(1.0).is_finite());
    }

    #[test]
    fn test_model_creation() {
        let model = create_test_model();
        assert_eq!(model.version, MODEL_VERSION);
        assert_eq!(model.num_trees(), 2);
        assert_eq!(model.metadata.feature_count, 2);
        assert_eq!(model.metadata.max_depth, 1);
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_raw_score_and_probability() {
        let model = create_test_model();

        // 0.25 + (-1.0) + 0.5
        let raw = model.raw_score(&[30.0, 1.0]);
        assert!((raw - (-0.25)).abs() < 1e-12);
        assert!((model.predict_proba(&[30.0, 1.0]) - sigmoid(-0.25)).abs() < 1e-12);

        assert_eq!(model.predict(&[30.0, 1.0], 0.5), 0);
        assert_eq!(model.predict(&[60.0, 1.0], 0.5), 1);
    }

    #[test]
    fn test_try_predict_checks_width() {
        let model = create_test_model();
        assert!(model.try_predict_proba(&[1.0]).is_err());
        assert!(model.try_predict_proba(&[1.0, 0.0]).is_ok());
    }

    #[test]
    fn test_hash_deterministic_and_sensitive() {
        let model1 = create_test_model();
        let model2 = create_test_model();
        assert_eq!(model1.hash_hex().unwrap(), model2.hash_hex().unwrap());

        let mut model3 = create_test_model();
        model3.base_score = 0.0;
        assert_ne!(model1.hash_hex().unwrap(), model3.hash_hex().unwrap());
    }

    #[test]
    fn test_save_load_json() {
        let model = create_test_model();
        let temp_file = tempfile::NamedTempFile::new().unwrap();

        model.save_json(temp_file.path()).unwrap();
        let loaded = Model::load_json(temp_file.path()).unwrap();

        assert_eq!(model, loaded);
        assert_eq!(model.hash_hex().unwrap(), loaded.hash_hex().unwrap());
    }

    #[test]
    fn test_model_validation() {
        let mut invalid = create_test_model();
        invalid.version = 999;
        assert!(invalid.validate().is_err());

        let mut invalid = create_test_model();
        invalid.feature_names.pop();
        assert!(invalid.validate().is_err());

        let mut invalid = create_test_model();
        invalid.base_score = f64::NAN;
        assert!(invalid.validate().is_err());
    }
}
