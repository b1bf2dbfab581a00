//! One-hot encoding of categorical columns

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Indicator encoding over the categories seen in training, in sorted order.
/// Categories not seen during `fit` encode as all zeros.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OneHotEncoder {
    pub categories: Vec<String>,
}

impl OneHotEncoder {
    pub fn fit<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let categories: BTreeSet<&str> = values.into_iter().collect();
        Self {
            categories: categories.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn width(&self) -> usize {
        self.categories.len()
    }

    /// Position of `value` among the learnt categories
    pub fn index_of(&self, value: &str) -> Option<usize> {
        self.categories
            .binary_search_by(|c| c.as_str().cmp(value))
            .ok()
    }

    /// Append the indicator block for `value` to `out`
    pub fn encode_into(&self, value: &str, out: &mut Vec<f64>) {
        let hot = self.index_of(value);
        out.extend((0..self.width()).map(|i| if Some(i) == hot { 1.0 } else { 0.0 }));
    }
}
