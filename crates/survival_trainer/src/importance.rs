//! Feature importance from trained split statistics
//!
//! Importance is read off the gain recorded on every internal node, so it
//! works on a freshly trained model and on one loaded from disk alike.

use std::cmp::Ordering;

use survival_core::{ColumnTransformer, ImportanceType, Model};

/// Per-feature importance over the model's transformed features
pub fn feature_importance(model: &Model, kind: ImportanceType) -> Vec<f64> {
    let width = model.feature_count();
    let mut total_gain = vec![0.0; width];
    let mut splits = vec![0usize; width];

    for node in model.trees.iter().flat_map(|t| &t.nodes) {
        if node.is_leaf() || node.feature_idx < 0 {
            continue;
        }
        let idx = node.feature_idx as usize;
        if idx < width {
            total_gain[idx] += node.gain;
            splits[idx] += 1;
        }
    }

    match kind {
        ImportanceType::TotalGain => total_gain,
        ImportanceType::Split => splits.into_iter().map(|s| s as f64).collect(),
        ImportanceType::Gain => total_gain
            .iter()
            .zip(&splits)
            .map(|(&g, &n)| if n == 0 { 0.0 } else { g / n as f64 })
            .collect(),
    }
}

/// Scale values to sum to one; an all-zero vector is returned unchanged
pub fn normalize(values: &[f64]) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        values.iter().map(|v| v / total).collect()
    } else {
        values.to_vec()
    }
}

/// Fold transformed-feature importance back onto input columns
///
/// One-hot outputs are summed into their source column. Every input column
/// appears exactly once, sorted by descending importance and then by name.
pub fn aggregate_by_source(importance: &[f64], transformer: &ColumnTransformer) -> Vec<(String, f64)> {
    let mut by_column: Vec<(String, f64)> = transformer
        .input_columns()
        .into_iter()
        .map(|name| (name, 0.0))
        .collect();

    for (idx, value) in importance.iter().enumerate() {
        let Some(source) = transformer.source_column_of(idx) else {
            continue;
        };
        if let Some(entry) = by_column.iter_mut().find(|(name, _)| name == source) {
            entry.1 += value;
        }
    }

    sort_ranked(&mut by_column);
    by_column
}

/// Normalised input-column ranking for a model and its transformer
pub fn rank_columns(model: &Model, transformer: &ColumnTransformer, kind: ImportanceType) -> Vec<(String, f64)> {
    let aggregated = aggregate_by_source(&feature_importance(model, kind), transformer);
    let values: Vec<f64> = aggregated.iter().map(|(_, v)| *v).collect();
    aggregated
        .into_iter()
        .zip(normalize(&values))
        .map(|((name, _), share)| (name, share))
        .collect()
}

fn sort_ranked(ranked: &mut [(String, f64)]) {
    ranked.sort_by(|(a_name, a), (b_name, b)| {
        b.partial_cmp(a)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a_name.cmp(b_name))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use survival_core::{ColumnKind, ColumnSpec, Node, Tree};

    fn model() -> Model {
        let tree_a = Tree::new(vec![
            Node::internal(0, 0, 0.5, 1, 2).with_stats(4.0, 10.0),
            Node::leaf(1, -0.1),
            Node::internal(2, 2, 0.5, 3, 4).with_stats(2.0, 5.0),
            Node::leaf(3, 0.1),
            Node::leaf(4, 0.2),
        ]);
        let tree_b = Tree::new(vec![
            Node::internal(0, 0, 1.5, 1, 2).with_stats(2.0, 10.0),
            Node::leaf(1, -0.1),
            Node::leaf(2, 0.1),
        ]);
        Model::new(
            vec![tree_a, tree_b],
            0.0,
            vec!["age".into(), "sex=F".into(), "sex=M".into()],
        )
    }

    fn transformer() -> ColumnTransformer {
        let rows = vec![
            vec![Some("50".to_string()), Some("M".to_string())],
            vec![Some("60".to_string()), Some("F".to_string())],
        ];
        ColumnTransformer::fit(
            vec![
                ColumnSpec::new("age", ColumnKind::Numeric),
                ColumnSpec::new("sex", ColumnKind::Categorical),
            ],
            &rows,
        )
        .unwrap()
    }

    #[test]
    fn test_importance_types() {
        let m = model();
        assert_eq!(feature_importance(&m, ImportanceType::TotalGain), vec![6.0, 0.0, 2.0]);
        assert_eq!(feature_importance(&m, ImportanceType::Split), vec![2.0, 0.0, 1.0]);
        assert_eq!(feature_importance(&m, ImportanceType::Gain), vec![3.0, 0.0, 2.0]);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(&[1.0, 3.0]), vec![0.25, 0.75]);
        assert_eq!(normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_aggregate_by_source() {
        let t = transformer();
        assert_eq!(t.output_feature_names(), vec!["age", "sex=F", "sex=M"]);

        let ranked = aggregate_by_source(&[1.0, 2.0, 3.0], &t);
        assert_eq!(ranked, vec![("sex".to_string(), 5.0), ("age".to_string(), 1.0)]);
    }

    #[test]
    fn test_ties_sorted_by_name() {
        let ranked = aggregate_by_source(&[0.0, 0.0, 0.0], &transformer());
        assert_eq!(ranked[0].0, "age");
        assert_eq!(ranked[1].0, "sex");
    }

    #[test]
    fn test_rank_columns_normalised() {
        let ranked = rank_columns(&model(), &transformer(), ImportanceType::TotalGain);
        assert_eq!(ranked[0].0, "age");
        assert!((ranked[0].1 - 0.75).abs() < 1e-12);
        assert!((ranked[1].1 - 0.25).abs() < 1e-12);
    }
}
