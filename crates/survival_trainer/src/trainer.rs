//! Gradient Boosted Decision Tree (GBDT) trainer
//!
//! Logistic-loss boosting with exact-greedy CART trees. Rounds are fully
//! deterministic: row subsampling draws from the seeded LCG, and split ties
//! resolve on (feature, threshold).

use std::collections::BTreeMap;

use survival_core::gbdt::{logit, sigmoid};
use survival_core::{Model, ModelConfig};
use tracing::{debug, info};

use crate::cart::{CartBuilder, TreeConfig};
use crate::deterministic::LcgRng;
use crate::errors::{Result, TrainerError};

/// GBDT training configuration
#[derive(Clone, Debug)]
pub struct TrainingParams {
    pub num_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub min_child_weight: f64,
    pub learning_rate: f64,
    pub lambda: f64,
    pub gamma: f64,
    pub subsample: f64,
    pub seed: i64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self::from(&ModelConfig::default())
    }
}

impl From<&ModelConfig> for TrainingParams {
    fn from(config: &ModelConfig) -> Self {
        Self {
            num_trees: config.n_estimators,
            max_depth: config.max_depth,
            min_samples_leaf: config.min_samples_leaf,
            min_child_weight: config.min_child_weight,
            learning_rate: config.learning_rate,
            lambda: config.lambda,
            gamma: config.gamma,
            subsample: config.subsample,
            seed: config.seed,
        }
    }
}

impl TrainingParams {
    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            max_depth: self.max_depth,
            min_samples_leaf: self.min_samples_leaf,
            min_child_weight: self.min_child_weight,
            lambda: self.lambda,
            gamma: self.gamma,
            learning_rate: self.learning_rate,
        }
    }

    fn as_map(&self) -> BTreeMap<String, f64> {
        [
            ("n_estimators", self.num_trees as f64),
            ("max_depth", self.max_depth as f64),
            ("min_samples_leaf", self.min_samples_leaf as f64),
            ("min_child_weight", self.min_child_weight),
            ("learning_rate", self.learning_rate),
            ("lambda", self.lambda),
            ("gamma", self.gamma),
            ("subsample", self.subsample),
            ("seed", self.seed as f64),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

/// GBDT trainer
pub struct GbdtTrainer {
    params: TrainingParams,
}

impl GbdtTrainer {
    pub fn new(params: TrainingParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &TrainingParams {
        &self.params
    }

    /// Train a binary classifier on already-transformed feature rows
    pub fn train(&self, features: &[Vec<f64>], labels: &[u8], feature_names: Vec<String>) -> Result<Model> {
        self.check_inputs(features, labels, &feature_names)?;

        let n_samples = labels.len();
        let positives = labels.iter().filter(|&&y| y == 1).count();
        let base_score = logit(positives as f64 / n_samples as f64);
        let mut raw_scores = vec![base_score; n_samples];

        let tree_config = self.params.tree_config();
        let mut rng = LcgRng::new(self.params.seed);
        let mut trees = Vec::with_capacity(self.params.num_trees);

        info!(
            "Training {} trees on {} rows x {} features (base score {:.4})",
            self.params.num_trees,
            n_samples,
            feature_names.len(),
            base_score
        );

        for tree_idx in 0..self.params.num_trees {
            let (gradients, hessians) = logistic_gradients(labels, &raw_scores);
            let builder = CartBuilder::new(features, &gradients, &hessians, tree_config.clone())?;

            let tree = if self.params.subsample < 1.0 {
                builder.build_on(&self.sample_rows(n_samples, &mut rng))
            } else {
                builder.build()
            };

            for (score, row) in raw_scores.iter_mut().zip(features) {
                *score += tree.evaluate(row);
            }

            debug!(
                "Tree {}/{}: {} nodes, train log loss {:.5}",
                tree_idx + 1,
                self.params.num_trees,
                tree.nodes.len(),
                mean_log_loss(labels, &raw_scores)
            );

            trees.push(tree);
        }

        let mut model = Model::new(trees, base_score, feature_names);
        model.metadata.created_at = chrono::Utc::now().timestamp();
        model.metadata.training_rows = n_samples;
        model.metadata.hyperparameters = self.params.as_map();
        model.validate()?;

        Ok(model)
    }

    fn check_inputs(&self, features: &[Vec<f64>], labels: &[u8], feature_names: &[String]) -> Result<()> {
        if features.is_empty() {
            return Err(TrainerError::Training("no training rows".to_string()));
        }
        if features.len() != labels.len() {
            return Err(TrainerError::Training(format!(
                "{} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }
        if let Some((i, row)) = features
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != feature_names.len())
        {
            return Err(TrainerError::Training(format!(
                "row {} has {} features, expected {}",
                i,
                row.len(),
                feature_names.len()
            )));
        }
        if let Some(bad) = labels.iter().find(|&&y| y > 1) {
            return Err(TrainerError::Training(format!("label {} is not 0 or 1", bad)));
        }

        let positives = labels.iter().filter(|&&y| y == 1).count();
        if positives == 0 || positives == labels.len() {
            return Err(TrainerError::Training(
                "training labels contain only one class".to_string(),
            ));
        }

        Ok(())
    }

    /// Draw `ceil(n * subsample)` distinct rows, returned in ascending order
    fn sample_rows(&self, n_samples: usize, rng: &mut LcgRng) -> Vec<usize> {
        let take = ((n_samples as f64 * self.params.subsample).ceil() as usize).clamp(1, n_samples);
        let mut indices: Vec<usize> = (0..n_samples).collect();
        rng.shuffle(&mut indices);
        indices.truncate(take);
        indices.sort_unstable();
        indices
    }
}

/// Gradients `p - y` and hessians `p(1 - p)` of the logistic loss
fn logistic_gradients(labels: &[u8], raw_scores: &[f64]) -> (Vec<f64>, Vec<f64>) {
    labels
        .iter()
        .zip(raw_scores)
        .map(|(&y, &raw)| {
            let p = sigmoid(raw);
            (p - f64::from(y), (p * (1.0 - p)).max(1e-16))
        })
        .unzip()
}

fn mean_log_loss(labels: &[u8], raw_scores: &[f64]) -> f64 {
    let total: f64 = labels
        .iter()
        .zip(raw_scores)
        .map(|(&y, &raw)| {
            let p = sigmoid(raw).clamp(1e-15, 1.0 - 1e-15);
            if y == 1 {
                -p.ln()
            } else {
                -(1.0 - p).ln()
            }
        })
        .sum();
    total / labels.len() as f64
}
