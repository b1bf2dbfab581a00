//! CART (Classification and Regression Tree) builder
//!
//! Exact-greedy regression tree over per-row gradient/hessian pairs, using
//! the second-order boosting objective:
//!
//! - leaf weight  `w = -G / (H + λ)`
//! - split gain   `½ [G_L²/(H_L+λ) + G_R²/(H_R+λ) − G²/(H+λ)] − γ`

use survival_core::{Node, Tree};

use crate::deterministic::SplitTieBreaker;
use crate::errors::{Result, TrainerError};

/// Gains at or below this are treated as no improvement
const MIN_SPLIT_GAIN: f64 = 1e-10;

/// Training parameters for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub min_child_weight: f64,
    pub lambda: f64,
    pub gamma: f64,
    /// Multiplier applied to every leaf weight
    pub learning_rate: f64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            min_samples_leaf: 1,
            min_child_weight: 1.0,
            lambda: 1.0,
            gamma: 0.0,
            learning_rate: 1.0,
        }
    }
}

/// Split candidate with gain and tie-breaker
#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
    tie_breaker: SplitTieBreaker,
}

impl SplitCandidate {
    fn new(feature_idx: usize, threshold: f64, gain: f64) -> Self {
        Self {
            feature_idx,
            threshold,
            gain,
            tie_breaker: SplitTieBreaker::new(feature_idx, threshold),
        }
    }

    fn beats(&self, other: &SplitCandidate) -> bool {
        self.gain > other.gain || (self.gain == other.gain && self.tie_breaker < other.tie_breaker)
    }
}

/// Build a regression tree using the exact-greedy CART algorithm
pub struct CartBuilder<'a> {
    config: TreeConfig,
    features: &'a [Vec<f64>],
    gradients: &'a [f64],
    hessians: &'a [f64],
    feature_count: usize,
}

impl<'a> CartBuilder<'a> {
    pub fn new(
        features: &'a [Vec<f64>],
        gradients: &'a [f64],
        hessians: &'a [f64],
        config: TreeConfig,
    ) -> Result<Self> {
        if features.len() != gradients.len() || features.len() != hessians.len() {
            return Err(TrainerError::Training(format!(
                "{} rows, {} gradients, {} hessians",
                features.len(),
                gradients.len(),
                hessians.len()
            )));
        }

        let feature_count = features.first().map_or(0, Vec::len);
        if features.iter().any(|row| row.len() != feature_count) {
            return Err(TrainerError::Training("rows have differing widths".to_string()));
        }

        Ok(Self {
            config,
            features,
            gradients,
            hessians,
            feature_count,
        })
    }

    /// Build a tree over all rows
    pub fn build(&self) -> Tree {
        let indices: Vec<usize> = (0..self.features.len()).collect();
        self.build_on(&indices)
    }

    /// Build a tree over the given row subset
    pub fn build_on(&self, indices: &[usize]) -> Tree {
        let mut nodes = Vec::new();
        self.build_node(indices, 0, &mut nodes);
        Tree { nodes }
    }

    /// Recursively build tree nodes, returning the index of the new node
    fn build_node(&self, indices: &[usize], depth: usize, nodes: &mut Vec<Node>) -> i32 {
        let current_idx = nodes.len() as i32;
        let (sum_g, sum_h) = self.sum_gradients_hessians(indices);

        let make_leaf = |nodes: &mut Vec<Node>| {
            let value = self.leaf_weight(sum_g, sum_h) * self.config.learning_rate;
            nodes.push(Node::leaf(current_idx, value).with_stats(0.0, sum_h));
            current_idx
        };

        // Check stopping conditions
        if depth >= self.config.max_depth
            || indices.len() < 2 * self.config.min_samples_leaf.max(1)
            || sum_h < 2.0 * self.config.min_child_weight
        {
            return make_leaf(nodes);
        }

        let Some(split) = self.find_best_split(indices, sum_g, sum_h) else {
            return make_leaf(nodes);
        };

        let (left_indices, right_indices) = self.split_samples(indices, split.feature_idx, split.threshold);

        // Reserve space for current node
        nodes.push(
            Node::internal(current_idx, split.feature_idx as i32, split.threshold, -1, -1)
                .with_stats(split.gain, sum_h),
        );

        let left_idx = self.build_node(&left_indices, depth + 1, nodes);
        let right_idx = self.build_node(&right_indices, depth + 1, nodes);

        // Update current node with child indices
        nodes[current_idx as usize].left = left_idx;
        nodes[current_idx as usize].right = right_idx;

        current_idx
    }

    /// Find best split using the exact-greedy scan over sorted values
    fn find_best_split(&self, indices: &[usize], sum_g: f64, sum_h: f64) -> Option<SplitCandidate> {
        let mut best: Option<SplitCandidate> = None;
        let parent_score = self.score(sum_g, sum_h);
        let min_leaf = self.config.min_samples_leaf.max(1);

        let mut sorted = indices.to_vec();
        for feature_idx in 0..self.feature_count {
            sorted.sort_by(|&a, &b| {
                self.features[a][feature_idx].total_cmp(&self.features[b][feature_idx])
            });

            let mut g_left = 0.0;
            let mut h_left = 0.0;

            for k in 0..sorted.len().saturating_sub(1) {
                let row = sorted[k];
                g_left += self.gradients[row];
                h_left += self.hessians[row];

                let value = self.features[row][feature_idx];
                let next_value = self.features[sorted[k + 1]][feature_idx];
                if value >= next_value {
                    continue;
                }

                let n_left = k + 1;
                let n_right = sorted.len() - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let g_right = sum_g - g_left;
                let h_right = sum_h - h_left;
                if h_left < self.config.min_child_weight || h_right < self.config.min_child_weight {
                    continue;
                }

                let gain = 0.5 * (self.score(g_left, h_left) + self.score(g_right, h_right) - parent_score)
                    - self.config.gamma;
                if gain <= MIN_SPLIT_GAIN {
                    continue;
                }

                let candidate = SplitCandidate::new(feature_idx, midpoint(value, next_value), gain);
                if best.as_ref().map_or(true, |current| candidate.beats(current)) {
                    best = Some(candidate);
                }
            }
        }

        best
    }

    /// Split samples based on threshold
    fn split_samples(&self, indices: &[usize], feature_idx: usize, threshold: f64) -> (Vec<usize>, Vec<usize>) {
        indices
            .iter()
            .partition(|&&idx| self.features[idx][feature_idx] <= threshold)
    }

    /// Structure score G²/(H+λ)
    fn score(&self, g: f64, h: f64) -> f64 {
        let denom = h + self.config.lambda;
        if denom <= 0.0 {
            0.0
        } else {
            g * g / denom
        }
    }

    /// Optimal leaf weight: -G/(H+λ)
    fn leaf_weight(&self, g: f64, h: f64) -> f64 {
        let denom = h + self.config.lambda;
        if denom <= 0.0 {
            0.0
        } else {
            -g / denom
        }
    }

    /// Sum gradients and hessians for a set of samples
    fn sum_gradients_hessians(&self, indices: &[usize]) -> (f64, f64) {
        indices.iter().fold((0.0, 0.0), |(g, h), &idx| {
            (g + self.gradients[idx], h + self.hessians[idx])
        })
    }
}

/// Threshold strictly between two distinct sorted values; `lo` itself when
/// the two are adjacent floats
fn midpoint(lo: f64, hi: f64) -> f64 {
    let mid = lo + (hi - lo) / 2.0;
    if mid < hi {
        mid
    } else {
        lo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_depth: usize) -> TreeConfig {
        TreeConfig {
            max_depth,
            min_samples_leaf: 1,
            min_child_weight: 0.0,
            lambda: 0.0,
            gamma: 0.0,
            learning_rate: 1.0,
        }
    }

    #[test]
    fn test_simple_split() {
        let features = vec![vec![1.0, 5.0], vec![2.0, 5.0], vec![3.0, 5.0], vec![4.0, 5.0]];
        let gradients = vec![-1.0, -1.0, 1.0, 1.0];
        let hessians = vec![1.0; 4];

        let builder = CartBuilder::new(&features, &gradients, &hessians, config(1)).unwrap();
        let tree = builder.build();

        assert_eq!(tree.nodes.len(), 3);
        let root = &tree.nodes[0];
        assert_eq!(root.feature_idx, 0);
        assert_eq!(root.threshold, 2.5);
        // G_L = -2, G_R = 2, H = 2 each: 0.5 * (2 + 2 - 0) = 2
        assert!((root.gain - 2.0).abs() < 1e-12);
        assert_eq!(root.cover, 4.0);

        assert_eq!(tree.evaluate(&[1.5, 5.0]), 1.0);
        assert_eq!(tree.evaluate(&[3.5, 5.0]), -1.0);
        assert!(tree.validate(2).is_ok());
    }

    #[test]
    fn test_leaf_only_tree() {
        let features = vec![vec![1.0]];
        let gradients = vec![-0.5];
        let hessians = vec![0.25];

        let builder = CartBuilder::new(&features, &gradients, &hessians, TreeConfig::default()).unwrap();
        let tree = builder.build();

        assert_eq!(tree.nodes.len(), 1);
        // -G/(H+λ) = 0.5 / 1.25
        assert!((tree.nodes[0].leaf.unwrap() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_constant_feature_never_splits() {
        let features = vec![vec![7.0]; 6];
        let gradients = vec![-1.0, 1.0, -1.0, 1.0, -1.0, 1.0];
        let hessians = vec![1.0; 6];

        let tree = CartBuilder::new(&features, &gradients, &hessians, config(3))
            .unwrap()
            .build();
        assert_eq!(tree.nodes.len(), 1);
    }

    #[test]
    fn test_learning_rate_shrinks_leaves() {
        let features = vec![vec![1.0], vec![2.0]];
        let gradients = vec![-1.0, -1.0];
        let hessians = vec![1.0, 1.0];
        let cfg = TreeConfig {
            learning_rate: 0.1,
            ..config(0)
        };

        let tree = CartBuilder::new(&features, &gradients, &hessians, cfg).unwrap().build();
        assert!((tree.nodes[0].leaf.unwrap() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_min_samples_leaf_respected() {
        let features: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64]).collect();
        let gradients = vec![-1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        let hessians = vec![1.0; 6];
        let cfg = TreeConfig {
            min_samples_leaf: 2,
            ..config(1)
        };

        let tree = CartBuilder::new(&features, &gradients, &hessians, cfg).unwrap().build();
        assert_eq!(tree.nodes.len(), 3);
        assert!(tree.nodes[0].threshold >= 1.0);
    }

    #[test]
    fn test_gamma_blocks_weak_splits() {
        let features = vec![vec![1.0], vec![2.0]];
        let gradients = vec![-0.1, 0.1];
        let hessians = vec![1.0, 1.0];
        let cfg = TreeConfig {
            gamma: 10.0,
            ..config(2)
        };

        let tree = CartBuilder::new(&features, &gradients, &hessians, cfg).unwrap().build();
        assert_eq!(tree.nodes.len(), 1);
    }

    #[test]
    fn test_tie_prefers_lower_feature() {
        // Both features separate the rows identically
        let features = vec![vec![0.0, 0.0], vec![1.0, 1.0]];
        let gradients = vec![-1.0, 1.0];
        let hessians = vec![1.0, 1.0];

        let tree = CartBuilder::new(&features, &gradients, &hessians, config(1)).unwrap().build();
        assert_eq!(tree.nodes[0].feature_idx, 0);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let features = vec![vec![1.0]];
        assert!(CartBuilder::new(&features, &[0.0, 1.0], &[1.0], TreeConfig::default()).is_err());
    }

    #[test]
    fn test_midpoint() {
        assert_eq!(midpoint(1.0, 2.0), 1.5);
        let next = f64::from_bits(1.0f64.to_bits() + 1);
        assert_eq!(midpoint(1.0, next), 1.0);
    }
}
