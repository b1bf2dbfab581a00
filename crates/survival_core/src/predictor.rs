//! Single-patient inference over a loaded artifact bundle

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::artifacts::{check_threshold, ArtifactBundle};
use crate::errors::{CoreError, Result};

/// Raw clinical values for one patient, keyed by input column name
///
/// A `None` value (or an empty string) is a missing measurement and is
/// imputed by the preprocessor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRecord {
    values: BTreeMap<String, Option<String>>,
}

impl PatientRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column's raw value; blank text counts as missing
    pub fn set(&mut self, column: impl Into<String>, raw: Option<&str>) {
        let value = raw.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string);
        self.values.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).and_then(|v| v.as_deref())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Build a record from `column=value` strings; a column may appear once
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut record = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                CoreError::InvalidInput(format!("expected column=value, got '{}'", pair))
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(CoreError::InvalidInput(format!("empty column name in '{}'", pair)));
            }
            if record.values.contains_key(key) {
                return Err(CoreError::InvalidInput(format!("duplicate column '{}'", key)));
            }
            record.set(key, Some(value));
        }
        Ok(record)
    }

    /// Build a record from a flat JSON object
    ///
    /// Numbers and strings are taken as-is, booleans become `1`/`0`, null is
    /// missing. Nested values are rejected.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| CoreError::InvalidInput("patient record must be a JSON object".to_string()))?;

        let mut record = Self::new();
        for (key, v) in object {
            match v {
                Value::Null => record.set(key.as_str(), None),
                Value::Bool(b) => record.set(key.as_str(), Some(if *b { "1" } else { "0" })),
                Value::Number(n) => record.set(key.as_str(), Some(n.to_string().as_str())),
                Value::String(s) => record.set(key.as_str(), Some(s.as_str())),
                Value::Array(_) | Value::Object(_) => {
                    return Err(CoreError::InvalidInput(format!(
                        "field '{}' must be a scalar",
                        key
                    )))
                }
            }
        }
        Ok(record)
    }
}

/// Outcome of scoring one patient
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    /// Probability of the positive outcome
    pub probability: f64,
    /// 1 when `probability >= threshold`
    pub label: u8,
    pub threshold: f64,
    /// Columns that were imputed because no value (or a missing token) was supplied
    pub imputed: Vec<String>,
}

/// Loaded preprocessing + model pipeline
#[derive(Debug, Clone)]
pub struct Predictor {
    bundle: ArtifactBundle,
    threshold: f64,
}

impl Predictor {
    /// Serve with the threshold the bundle was trained with
    pub fn new(bundle: ArtifactBundle) -> Self {
        let threshold = bundle.threshold;
        Self { bundle, threshold }
    }

    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Ok(Self::new(ArtifactBundle::load(dir)?))
    }

    /// Override the persisted threshold
    pub fn with_threshold(mut self, threshold: f64) -> Result<Self> {
        check_threshold(threshold)?;
        self.threshold = threshold;
        Ok(self)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Input columns in the order the entry surface should present them
    pub fn columns(&self) -> &[String] {
        &self.bundle.columns
    }

    pub fn bundle(&self) -> &ArtifactBundle {
        &self.bundle
    }

    pub fn predict(&self, record: &PatientRecord) -> Result<Prediction> {
        if let Some(unknown) = record.columns().find(|c| !self.bundle.columns.iter().any(|k| k == *c)) {
            return Err(CoreError::UnknownColumn(unknown.to_string()));
        }

        let transformer = &self.bundle.transformer;
        let cells: Vec<Option<&str>> = self
            .bundle
            .columns
            .iter()
            .map(|c| record.get(c).filter(|v| !transformer.is_missing_token(v)))
            .collect();
        let imputed: Vec<String> = self
            .bundle
            .columns
            .iter()
            .zip(&cells)
            .filter(|(_, cell)| cell.is_none())
            .map(|(c, _)| c.clone())
            .collect();

        let features = transformer.transform_row(&cells)?;
        let probability = self.bundle.model.try_predict_proba(&features)?;
        debug!("Scored patient: p={:.4}, imputed={:?}", probability, imputed);

        Ok(Prediction {
            probability,
            label: u8::from(probability >= self.threshold),
            threshold: self.threshold,
            imputed,
        })
    }
}
