//! Missing-value imputation

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Fill value used for a categorical column with no observed values
pub const MISSING_CATEGORY: &str = "missing";

/// Replaces missing numeric cells with the training median
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedianImputer {
    pub fill: f64,
}

impl MedianImputer {
    /// Learn the median of the observed values
    ///
    /// A column with no observed values imputes 0.0.
    pub fn fit(column: &str, values: &[Option<f64>]) -> Self {
        let mut observed: Vec<f64> = values.iter().flatten().copied().collect();

        if observed.is_empty() {
            warn!("Column '{}' has no observed values; imputing 0.0", column);
            return Self { fill: 0.0 };
        }

        observed.sort_by(f64::total_cmp);
        let mid = observed.len() / 2;
        let fill = if observed.len() % 2 == 0 {
            (observed[mid - 1] + observed[mid]) / 2.0
        } else {
            observed[mid]
        };

        Self { fill }
    }

    pub fn apply(&self, value: Option<f64>) -> f64 {
        value.unwrap_or(self.fill)
    }
}

/// Replaces missing categorical cells with the most frequent training value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MostFrequentImputer {
    pub fill: String,
}

impl MostFrequentImputer {
    /// Learn the modal category; ties go to the lexicographically smallest
    pub fn fit(column: &str, values: &[Option<&str>]) -> Self {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for value in values.iter().flatten() {
            *counts.entry(value).or_default() += 1;
        }

        // BTreeMap iterates in key order, so the first maximum wins ties
        let mut best: Option<(&str, usize)> = None;
        for (value, count) in counts {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((value, count));
            }
        }

        match best {
            Some((value, _)) => Self {
                fill: value.to_string(),
            },
            None => {
                warn!(
                    "Column '{}' has no observed values; imputing '{}'",
                    column, MISSING_CATEGORY
                );
                Self {
                    fill: MISSING_CATEGORY.to_string(),
                }
            }
        }
    }

    pub fn apply<'a>(&'a self, value: Option<&'a str>) -> &'a str {
        value.unwrap_or(&self.fill)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_median_odd_and_even() {
        let odd = MedianImputer::fit("a", &[Some(3.0), None, Some(1.0), Some(2.0)]);
        assert_eq!(odd.fill, 2.0);

        let even = MedianImputer::fit("a", &[Some(4.0), Some(1.0), Some(2.0), Some(3.0)]);
        assert_eq!(even.fill, 2.5);

        assert_eq!(even.apply(None), 2.5);
        assert_eq!(even.apply(Some(9.0)), 9.0);
    }

    #[test]
    fn test_median_all_missing() {
        let imputer = MedianImputer::fit("a", &[None, None]);
        assert_eq!(imputer.fill, 0.0);
    }

    #[test]
    fn test_most_frequent_with_tie() {
        let imputer = MostFrequentImputer::fit("sex", &[Some("M"), Some("F"), None, Some("F"), Some("M")]);
        assert_eq!(imputer.fill, "F");
        assert_eq!(imputer.apply(None), "F");
        assert_eq!(imputer.apply(Some("M")), "M");
    }

    #[test]
    fn test_most_frequent_clear_winner() {
        let imputer = MostFrequentImputer::fit("smoker", &[Some("no"), Some("yes"), Some("no")]);
        assert_eq!(imputer.fill, "no");
    }

    #[test]
    fn test_most_frequent_all_missing() {
        let imputer = MostFrequentImputer::fit("x", &[None]);
        assert_eq!(imputer.fill, MISSING_CATEGORY);
    }

    proptest! {
        #[test]
        fn median_fill_lies_within_observed_range(
            values in prop::collection::vec(prop::option::of(-1e6f64..1e6), 1..64),
            x in -1e6f64..1e6,
        ) {
            let observed: Vec<f64> = values.iter().flatten().copied().collect();
            prop_assume!(!observed.is_empty());

            let imputer = MedianImputer::fit("a", &values);
            let min = observed.iter().copied().fold(f64::INFINITY, f64::min);
            let max = observed.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(imputer.fill >= min && imputer.fill <= max);
            prop_assert_eq!(imputer.apply(Some(x)), x);
            prop_assert_eq!(imputer.apply(None), imputer.fill);
        }

        #[test]
        fn most_frequent_fill_has_highest_count(
            values in prop::collection::vec(
                prop::option::of(prop::sample::select(vec!["a", "b", "c", "d"])),
                0..64,
            ),
        ) {
            let imputer = MostFrequentImputer::fit("c", &values);

            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for value in values.iter().flatten() {
                *counts.entry(*value).or_default() += 1;
            }

            match counts.values().copied().max() {
                None => {
                    prop_assert_eq!(imputer.fill.as_str(), MISSING_CATEGORY);
                }
                Some(top) => {
                    let smallest_top = counts
                        .iter()
                        .find(|(_, c)| **c == top)
                        .map(|(v, _)| *v);
                    prop_assert_eq!(Some(imputer.fill.as_str()), smallest_top);
                    prop_assert_eq!(counts.get(imputer.fill.as_str()).copied(), Some(top));
                }
            }
        }
    }
}
