//! Column-wise preprocessing transformer
//!
//! Numeric columns: median imputation, then standard scaling.
//! Categorical columns: most-frequent imputation, then one-hot encoding.
//!
//! Output layout is the numeric block (in input order) followed by the
//! categorical block (in input order, each expanded to its indicators).
//!
//! Cells matching one of the stored missing tokens (`NA`, `?`, ...) are
//! treated exactly like absent cells.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::encoder::OneHotEncoder;
use super::imputer::{MedianImputer, MostFrequentImputer};
use super::scaler::StandardScaler;
use super::{parse_numeric, ColumnKind, ColumnSpec};
use crate::errors::{CoreError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct NumericStep {
    input_index: usize,
    name: String,
    imputer: MedianImputer,
    scaler: StandardScaler,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct CategoricalStep {
    input_index: usize,
    name: String,
    imputer: MostFrequentImputer,
    encoder: OneHotEncoder,
}

/// Fitted imputation + encoding + scaling over a fixed set of input columns
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnTransformer {
    columns: Vec<ColumnSpec>,
    numeric: Vec<NumericStep>,
    categorical: Vec<CategoricalStep>,
    #[serde(default)]
    missing_tokens: Vec<String>,
}

fn parse_cell(raw: Option<&str>, column: &str) -> Result<Option<f64>> {
    match raw {
        None => Ok(None),
        Some(text) => parse_numeric(text).map(Some).ok_or_else(|| {
            CoreError::InvalidInput(format!(
                "column '{}': '{}' is not a finite number",
                column, text
            ))
        }),
    }
}

fn at_row(row: usize) -> impl Fn(CoreError) -> CoreError {
    move |err| match err {
        CoreError::InvalidInput(msg) => CoreError::InvalidInput(format!("row {}: {}", row, msg)),
        other => other,
    }
}

impl ColumnTransformer {
    /// Fit every column step on raw training rows
    ///
    /// Each row must have one cell per entry of `columns`; `None` marks a
    /// missing cell.
    pub fn fit(columns: Vec<ColumnSpec>, rows: &[Vec<Option<String>>]) -> Result<Self> {
        if columns.is_empty() {
            return Err(CoreError::InvalidInput("no feature columns".to_string()));
        }
        if rows.is_empty() {
            return Err(CoreError::InvalidInput("no training rows".to_string()));
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(CoreError::InvalidInput(format!(
                    "row {} has {} cells, expected {}",
                    i,
                    row.len(),
                    columns.len()
                )));
            }
        }

        let mut numeric = Vec::new();
        let mut categorical = Vec::new();

        for (input_index, spec) in columns.iter().enumerate() {
            match spec.kind {
                ColumnKind::Numeric => {
                    let values = rows
                        .iter()
                        .enumerate()
                        .map(|(r, row)| parse_cell(row[input_index].as_deref(), &spec.name).map_err(at_row(r)))
                        .collect::<Result<Vec<_>>>()?;

                    let imputer = MedianImputer::fit(&spec.name, &values);
                    let imputed: Vec<f64> = values.iter().map(|v| imputer.apply(*v)).collect();
                    let scaler = StandardScaler::fit(&imputed);

                    debug!(
                        "numeric '{}': median={} mean={} std={}",
                        spec.name, imputer.fill, scaler.mean, scaler.std
                    );
                    numeric.push(NumericStep {
                        input_index,
                        name: spec.name.clone(),
                        imputer,
                        scaler,
                    });
                }
                ColumnKind::Categorical => {
                    let values: Vec<Option<&str>> =
                        rows.iter().map(|row| row[input_index].as_deref()).collect();

                    let imputer = MostFrequentImputer::fit(&spec.name, &values);
                    let encoder = OneHotEncoder::fit(values.iter().map(|v| imputer.apply(*v)));

                    debug!(
                        "categorical '{}': mode='{}' categories={:?}",
                        spec.name, imputer.fill, encoder.categories
                    );
                    categorical.push(CategoricalStep {
                        input_index,
                        name: spec.name.clone(),
                        imputer,
                        encoder,
                    });
                }
            }
        }

        Ok(Self {
            columns,
            numeric,
            categorical,
            missing_tokens: Vec::new(),
        })
    }

    /// Raw values that mean "not measured" when they appear in a cell
    pub fn with_missing_tokens(mut self, tokens: Vec<String>) -> Self {
        self.missing_tokens = tokens;
        self
    }

    pub fn missing_tokens(&self) -> &[String] {
        &self.missing_tokens
    }

    pub fn is_missing_token(&self, raw: &str) -> bool {
        let raw = raw.trim();
        self.missing_tokens.iter().any(|t| t == raw)
    }

    /// Input column specs in input order
    pub fn column_specs(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Input column names in input order
    pub fn input_columns(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Width of a transformed row
    pub fn output_width(&self) -> usize {
        self.numeric.len() + self.categorical.iter().map(|c| c.encoder.width()).sum::<usize>()
    }

    /// Names of the transformed features (`age`, `sex=M`, ...)
    pub fn output_feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.numeric.iter().map(|s| s.name.clone()).collect();
        for step in &self.categorical {
            names.extend(
                step.encoder
                    .categories
                    .iter()
                    .map(|c| format!("{}={}", step.name, c)),
            );
        }
        names
    }

    /// Input column that produced the given output feature
    pub fn source_column_of(&self, output_index: usize) -> Option<&str> {
        if let Some(step) = self.numeric.get(output_index) {
            return Some(&step.name);
        }

        let mut offset = self.numeric.len();
        for step in &self.categorical {
            let width = step.encoder.width();
            if output_index < offset + width {
                return Some(&step.name);
            }
            offset += width;
        }
        None
    }

    /// Transform one raw row (one cell per input column)
    pub fn transform_row(&self, row: &[Option<&str>]) -> Result<Vec<f64>> {
        if row.len() != self.columns.len() {
            return Err(CoreError::InvalidInput(format!(
                "row has {} cells, expected {}",
                row.len(),
                self.columns.len()
            )));
        }

        let cell = |i: usize| row[i].filter(|v| !self.is_missing_token(v));
        let mut out = Vec::with_capacity(self.output_width());

        for step in &self.numeric {
            let value = parse_cell(cell(step.input_index), &step.name)?;
            out.push(step.scaler.apply(step.imputer.apply(value)));
        }

        for step in &self.categorical {
            let value = step.imputer.apply(cell(step.input_index));
            step.encoder.encode_into(value, &mut out);
        }

        Ok(out)
    }

    /// Transform a batch of owned raw rows
    pub fn transform(&self, rows: &[Vec<Option<String>>]) -> Result<Vec<Vec<f64>>> {
        rows.iter()
            .enumerate()
            .map(|(i, row)| {
                let cells: Vec<Option<&str>> = row.iter().map(|c| c.as_deref()).collect();
                self.transform_row(&cells).map_err(at_row(i))
            })
            .collect()
    }

    /// Check the transformer's internal consistency after deserialization
    pub fn validate(&self) -> Result<()> {
        let expected = self.columns.len();
        let covered = self.numeric.len() + self.categorical.len();
        if covered != expected {
            return Err(CoreError::Validation(format!(
                "transformer covers {} columns but declares {}",
                covered, expected
            )));
        }

        let numeric_ok = self.numeric.iter().all(|s| {
            self.columns
                .get(s.input_index)
                .is_some_and(|c| c.name == s.name && c.kind == ColumnKind::Numeric)
        });
        let categorical_ok = self.categorical.iter().all(|s| {
            self.columns
                .get(s.input_index)
                .is_some_and(|c| c.name == s.name && c.kind == ColumnKind::Categorical)
        });
        if !numeric_ok || !categorical_ok {
            return Err(CoreError::Validation(
                "transformer steps do not match declared columns".to_string(),
            ));
        }

        if self.numeric.iter().any(|s| s.scaler.std.is_nan() || s.scaler.std <= 0.0 || !s.scaler.mean.is_finite()) {
            return Err(CoreError::Validation("invalid scaler parameters".to_string()));
        }

        Ok(())
    }
}
