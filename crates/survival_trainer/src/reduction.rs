//! Importance-driven feature reduction

use survival_core::ReductionConfig;
use tracing::{info, warn};

/// Pick the input columns to keep from a normalised, descending ranking
///
/// Columns below `min_importance` are dropped, then the list is cut to
/// `top_k`. The result is never empty: if nothing passes, the top-ranked
/// column is kept.
pub fn select_columns(ranked: &[(String, f64)], config: &ReductionConfig) -> Vec<String> {
    let mut selected: Vec<String> = ranked
        .iter()
        .filter(|(_, share)| *share >= config.min_importance)
        .map(|(name, _)| name.clone())
        .collect();

    if let Some(k) = config.top_k {
        selected.truncate(k.max(1));
    }

    if selected.is_empty() {
        if let Some((name, _)) = ranked.first() {
            warn!(
                "No column reaches importance {:.4}; keeping top column '{}'",
                config.min_importance, name
            );
            selected.push(name.clone());
        }
    }

    let dropped: Vec<&str> = ranked
        .iter()
        .map(|(name, _)| name.as_str())
        .filter(|name| !selected.iter().any(|s| s == name))
        .collect();
    info!(
        "Keeping {}/{} columns; dropped: {}",
        selected.len(),
        ranked.len(),
        if dropped.is_empty() {
            "none".to_string()
        } else {
            dropped.join(", ")
        }
    );

    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked() -> Vec<(String, f64)> {
        vec![
            ("ejection_fraction".to_string(), 0.5),
            ("serum_creatinine".to_string(), 0.3),
            ("age".to_string(), 0.195),
            ("smoking".to_string(), 0.005),
        ]
    }

    fn config(top_k: Option<usize>, min_importance: f64) -> ReductionConfig {
        ReductionConfig {
            top_k,
            min_importance,
            ..ReductionConfig::default()
        }
    }

    #[test]
    fn test_threshold_filter() {
        let kept = select_columns(&ranked(), &config(None, 0.01));
        assert_eq!(kept, vec!["ejection_fraction", "serum_creatinine", "age"]);
    }

    #[test]
    fn test_top_k() {
        let kept = select_columns(&ranked(), &config(Some(2), 0.0));
        assert_eq!(kept, vec!["ejection_fraction", "serum_creatinine"]);
    }

    #[test]
    fn test_never_empty() {
        let kept = select_columns(&ranked(), &config(None, 0.9));
        assert_eq!(kept, vec!["ejection_fraction"]);

        let kept = select_columns(&ranked(), &config(Some(0), 0.0));
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_all_zero_importance_keeps_first() {
        let zeros = vec![("a".to_string(), 0.0), ("b".to_string(), 0.0)];
        assert_eq!(select_columns(&zeros, &config(None, 0.01)), vec!["a"]);
    }

    #[test]
    fn test_empty_ranking() {
        assert!(select_columns(&[], &config(None, 0.01)).is_empty());
    }
}
