//! Gradient-boosted decision tree classifier
//!
//! - Flat-vector trees, traversed with `x <= threshold` going left
//! - Logistic link: probability = sigmoid(base_score + Σ leaf values)
//! - Canonical JSON serialization and Blake3 hashing for artifacts
//!
//! # Usage
//!
//! ```rust
//! use survival_core::gbdt::{Model, Node, Tree};
//!
//! let tree = Tree::new(vec![
//!     Node::internal(0, 0, 0.5, 1, 2),
//!     Node::leaf(1, -0.4),
//!     Node::leaf(2, 0.6),
//! ]);
//! let model = Model::new(vec![tree], 0.0, vec!["ejection_fraction".to_string()]);
//!
//! let p = model.predict_proba(&[1.2]);
//! assert!(p > 0.5);
//! ```

pub mod model;
pub mod tree;

pub use model::{logit, sigmoid, Model, ModelMetadata, MODEL_VERSION};
pub use tree::{Node, Tree};
