//! Decision tree structures for boosted-tree inference
//!
//! Nodes live in a flat vector with node 0 as the root. Internal nodes keep
//! the split gain and cover (hessian sum) seen during training so feature
//! importance can be recovered from a loaded model.

use serde::{Deserialize, Serialize};

/// A decision tree node (internal or leaf)
///
/// For internal nodes:
/// - `feature_idx >= 0`: index into the transformed feature vector
/// - `left` and `right` point to child node indices
/// - `leaf` is `None`
///
/// For leaf nodes:
/// - `feature_idx == -1`
/// - `leaf` contains the (already shrunk) output value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Node ID (for reference, not used in traversal)
    pub id: i32,

    /// Left child index (-1 for leaf nodes)
    pub left: i32,

    /// Right child index (-1 for leaf nodes)
    pub right: i32,

    /// Feature index to split on (-1 for leaf nodes)
    pub feature_idx: i32,

    /// Split threshold; rows with `x <= threshold` go left
    pub threshold: f64,

    /// Leaf value (Some for leaf nodes, None for internal nodes)
    pub leaf: Option<f64>,

    /// Loss reduction of the split (0 for leaves)
    #[serde(default)]
    pub gain: f64,

    /// Sum of hessians of the training rows reaching this node
    #[serde(default)]
    pub cover: f64,
}

impl Node {
    /// Create a new internal (split) node
    pub fn internal(id: i32, feature_idx: i32, threshold: f64, left: i32, right: i32) -> Self {
        Self {
            id,
            left,
            right,
            feature_idx,
            threshold,
            leaf: None,
            gain: 0.0,
            cover: 0.0,
        }
    }

    /// Create a new leaf node
    pub fn leaf(id: i32, value: f64) -> Self {
        Self {
            id,
            left: -1,
            right: -1,
            feature_idx: -1,
            threshold: 0.0,
            leaf: Some(value),
            gain: 0.0,
            cover: 0.0,
        }
    }

    /// Attach training statistics to the node
    pub fn with_stats(mut self, gain: f64, cover: f64) -> Self {
        self.gain = gain;
        self.cover = cover;
        self
    }

    /// Check if this node is a leaf
    pub fn is_leaf(&self) -> bool {
        self.feature_idx == -1 || self.leaf.is_some()
    }
}

/// A single regression tree in the ensemble
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Tree {
    /// Tree nodes (node 0 is the root)
    pub nodes: Vec<Node>,
}

impl Tree {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Evaluate this tree on a feature vector
    ///
    /// Missing values (NaN) follow the left branch. A malformed tree
    /// (including one whose child links form a cycle) or a short feature
    /// vector contributes 0.
    pub fn evaluate(&self, features: &[f64]) -> f64 {
        let mut idx = 0usize;

        // A root-to-leaf path visits each node at most once
        for _ in 0..self.nodes.len() {
            let Some(node) = self.nodes.get(idx) else {
                return 0.0;
            };

            if node.is_leaf() {
                return node.leaf.unwrap_or(0.0);
            }

            let Some(&value) = features.get(node.feature_idx as usize) else {
                return 0.0;
            };

            let next = if value.is_nan() || value <= node.threshold {
                node.left
            } else {
                node.right
            };

            if next < 0 {
                return 0.0;
            }
            idx = next as usize;
        }

        0.0
    }

    /// Number of edges on the longest root-to-leaf path
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize, guard: usize) -> usize {
            match nodes.get(idx) {
                Some(node) if !node.is_leaf() && guard < nodes.len() => {
                    let left = walk(nodes, node.left as usize, guard + 1);
                    let right = walk(nodes, node.right as usize, guard + 1);
                    1 + left.max(right)
                }
                _ => 0,
            }
        }

        walk(&self.nodes, 0, 0)
    }

    /// Validate tree structure against the expected feature width
    pub fn validate(&self, feature_count: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if node.is_leaf() {
                match node.leaf {
                    Some(value) if value.is_finite() => {}
                    Some(value) => return Err(format!("Leaf node {i} has non-finite value {value}")),
                    None => return Err(format!("Leaf node {i} has no leaf value")),
                }
                continue;
            }

            for (side, child) in [("left", node.left), ("right", node.right)] {
                // Children are appended after their parent, which rules out cycles
                if child <= i as i32 || child as usize >= self.nodes.len() {
                    return Err(format!("Node {i} has invalid {side} child: {child}"));
                }
            }

            if node.feature_idx < 0 || node.feature_idx as usize >= feature_count {
                return Err(format!(
                    "Internal node {} has invalid feature index: {}",
                    i, node.feature_idx
                ));
            }

            if !node.threshold.is_finite() {
                return Err(format!("Internal node {i} has non-finite threshold"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump() -> Tree {
        Tree::new(vec![
            Node::internal(0, 0, 50.0, 1, 2),
            Node::leaf(1, -0.5),
            Node::leaf(2, 0.75),
        ])
    }

    #[test]
    fn test_node_creation() {
        let internal = Node::internal(0, 3, 1.5, 1, 2);
        assert_eq!(internal.feature_idx, 3);
        assert!(!internal.is_leaf());

        let leaf = Node::leaf(1, -0.25);
        assert_eq!(leaf.feature_idx, -1);
        assert!(leaf.is_leaf());
        assert_eq!(leaf.leaf, Some(-0.25));
    }

    #[test]
    fn test_tree_evaluation() {
        let tree = stump();
        assert_eq!(tree.evaluate(&[30.0]), -0.5);
        assert_eq!(tree.evaluate(&[50.0]), -0.5); // Equal goes left
        assert_eq!(tree.evaluate(&[60.0]), 0.75);
        assert_eq!(tree.evaluate(&[f64::NAN]), -0.5);
    }

    #[test]
    fn test_short_feature_vector_scores_zero() {
        assert_eq!(stump().evaluate(&[]), 0.0);
    }

    #[test]
    fn test_cyclic_tree_scores_zero() {
        let cycle = Tree::new(vec![
            Node::internal(0, 0, 1.0, 1, 2),
            Node::internal(1, 0, 1.0, 0, 2),
            Node::leaf(2, 0.5),
        ]);
        assert_eq!(cycle.evaluate(&[0.0]), 0.0);
        assert_eq!(cycle.evaluate(&[5.0]), 0.5);

        let self_loop = Tree::new(vec![Node::internal(0, 0, 1.0, 0, 0)]);
        assert_eq!(self_loop.evaluate(&[0.0]), 0.0);
    }

    #[test]
    fn test_tree_validation() {
        assert!(stump().validate(1).is_ok());
        assert!(stump().validate(0).is_err());

        let bad_child = Tree::new(vec![
            Node::internal(0, 0, 50.0, 5, 2),
            Node::leaf(1, 1.0),
            Node::leaf(2, 2.0),
        ]);
        assert!(bad_child.validate(1).is_err());

        let self_loop = Tree::new(vec![Node::internal(0, 0, 1.0, 0, 0)]);
        assert!(self_loop.validate(1).is_err());

        assert!(Tree::default().validate(1).is_err());
    }

    #[test]
    fn test_depth() {
        assert_eq!(Tree::new(vec![Node::leaf(0, 0.1)]).depth(), 0);
        assert_eq!(stump().depth(), 1);

        let deeper = Tree::new(vec![
            Node::internal(0, 0, 1.0, 1, 2),
            Node::internal(1, 0, 0.0, 3, 4),
            Node::leaf(2, 0.3),
            Node::leaf(3, 0.1),
            Node::leaf(4, 0.2),
        ]);
        assert_eq!(deeper.depth(), 2);
    }
}
