//! Tabular preprocessing: imputation, one-hot encoding and scaling
//!
//! Raw cells arrive as `Option<String>` (None = missing). A fitted
//! [`ColumnTransformer`] turns a raw row into the dense `f64` feature vector
//! the boosted-tree model consumes.

pub mod encoder;
pub mod imputer;
pub mod scaler;
pub mod transformer;

use serde::{Deserialize, Serialize};

pub use encoder::OneHotEncoder;
pub use imputer::{MedianImputer, MostFrequentImputer, MISSING_CATEGORY};
pub use scaler::StandardScaler;
pub use transformer::ColumnTransformer;

/// How an input column is preprocessed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

/// An input column and its kind
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Parse a raw cell as a finite number
pub fn parse_numeric(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numeric() {
        assert_eq!(parse_numeric("1.5"), Some(1.5));
        assert_eq!(parse_numeric(" 42 "), Some(42.0));
        assert_eq!(parse_numeric("1e3"), Some(1000.0));
        assert_eq!(parse_numeric("inf"), None);
        assert_eq!(parse_numeric("NaN"), None);
        assert_eq!(parse_numeric("male"), None);
    }
}
