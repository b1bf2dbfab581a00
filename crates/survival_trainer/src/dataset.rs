//! CSV dataset loading, target encoding and train/test splitting
//!
//! Reads a headed CSV of clinical features plus one binary outcome column.
//! Cells matching a configured missing token become `None` and are left for
//! the preprocessor to impute.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use survival_core::preprocess::parse_numeric;
use survival_core::{ColumnKind, ColumnSpec, DataConfig, SplitConfig};
use tracing::{debug, info, warn};

use crate::deterministic::LcgRng;
use crate::errors::{Result, TrainerError};

/// Raw table as read from CSV
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Table {
    /// Load a table from a CSV file with a header row
    pub fn from_csv<P: AsRef<Path>>(path: P, config: &DataConfig) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|err| {
            TrainerError::Dataset(format!("failed to open {}: {}", path.display(), err))
        })?;
        Self::from_reader(file, config)
    }

    /// Load a table from any CSV source with a header row
    ///
    /// Every row must have as many fields as the header.
    pub fn from_reader<R: Read>(reader: R, config: &DataConfig) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .flexible(false)
            .from_reader(reader);

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if headers.is_empty() || headers.iter().all(String::is_empty) {
            return Err(TrainerError::Dataset("CSV has no header row".to_string()));
        }
        if let Some(blank) = headers.iter().position(String::is_empty) {
            return Err(TrainerError::Dataset(format!(
                "header column {} has no name",
                blank + 1
            )));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = headers.iter().find(|h| !seen.insert(h.as_str())) {
            return Err(TrainerError::Dataset(format!("duplicate column '{}'", dup)));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(
                record
                    .iter()
                    .map(|cell| (!config.is_missing(cell)).then(|| cell.to_string()))
                    .collect(),
            );
        }

        if rows.is_empty() {
            return Err(TrainerError::Dataset("Dataset is empty".to_string()));
        }

        Ok(Self { headers, rows })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// How raw outcome values were mapped onto 0/1
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetEncoding {
    pub negative: String,
    pub positive: String,
}

const TRUE_TOKENS: [&str; 3] = ["true", "yes", "y"];
const FALSE_TOKENS: [&str; 3] = ["false", "no", "n"];

impl TargetEncoding {
    /// Find a binary encoding for the observed outcome values
    ///
    /// Numeric 0/1 first, then boolean words, then any two labels in
    /// lexicographic order.
    pub fn infer(values: &[&str]) -> Result<Self> {
        let distinct: BTreeSet<&str> = values.iter().copied().collect();

        if distinct.len() < 2 {
            return Err(TrainerError::Dataset(format!(
                "target must contain two classes, found {:?}",
                distinct
            )));
        }

        let numeric: Option<BTreeMap<i8, &str>> = distinct
            .iter()
            .map(|v| match parse_numeric(v) {
                Some(x) if x == 0.0 => Some((0, *v)),
                Some(x) if x == 1.0 => Some((1, *v)),
                _ => None,
            })
            .collect();
        if let Some(by_class) = numeric {
            if by_class.len() == 2 {
                return Ok(Self {
                    negative: "0".to_string(),
                    positive: "1".to_string(),
                });
            }
        }

        let lowered: BTreeSet<String> = distinct.iter().map(|v| v.to_lowercase()).collect();
        let is_true = lowered.iter().any(|v| TRUE_TOKENS.contains(&v.as_str()));
        let is_false = lowered.iter().any(|v| FALSE_TOKENS.contains(&v.as_str()));
        if lowered.len() == 2 && is_true && is_false {
            let mut negative = String::new();
            let mut positive = String::new();
            for v in &distinct {
                if TRUE_TOKENS.contains(&v.to_lowercase().as_str()) {
                    positive = v.to_string();
                } else {
                    negative = v.to_string();
                }
            }
            return Ok(Self { negative, positive });
        }

        if distinct.len() == 2 {
            let mut it = distinct.iter().copied();
            if let (Some(negative), Some(positive)) = (it.next(), it.next()) {
                return Ok(Self {
                    negative: negative.to_string(),
                    positive: positive.to_string(),
                });
            }
        }

        Err(TrainerError::Dataset(format!(
            "target is not binary-encodable: {} distinct values",
            distinct.len()
        )))
    }

    /// Encode one raw outcome value
    pub fn encode(&self, raw: &str) -> Option<u8> {
        if raw == self.positive {
            return Some(1);
        }
        if raw == self.negative {
            return Some(0);
        }
        // Numeric encodings accept any spelling of 0 and 1
        if self.negative == "0" && self.positive == "1" {
            return match parse_numeric(raw) {
                Some(x) if x == 1.0 => Some(1),
                Some(x) if x == 0.0 => Some(0),
                _ => None,
            };
        }
        let lowered = raw.to_lowercase();
        if lowered == self.positive.to_lowercase() {
            Some(1)
        } else if lowered == self.negative.to_lowercase() {
            Some(0)
        } else {
            None
        }
    }
}

/// Per-column summary for logging
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnStats {
    pub name: String,
    pub kind: ColumnKind,
    pub missing: usize,
    /// Observed numeric range (numeric columns only)
    pub range: Option<(f64, f64)>,
    pub distinct: usize,
}

/// Feature table with an encoded binary outcome
#[derive(Clone, Debug, PartialEq)]
pub struct LabeledDataset {
    pub columns: Vec<ColumnSpec>,
    pub rows: Vec<Vec<Option<String>>>,
    pub labels: Vec<u8>,
    pub target_encoding: TargetEncoding,
}

impl LabeledDataset {
    /// Separate the outcome column from the features and type the features
    pub fn from_table(table: Table, config: &DataConfig) -> Result<Self> {
        let target_idx = table.column_index(&config.target_column).ok_or_else(|| {
            TrainerError::Dataset(format!(
                "target column '{}' not found",
                config.target_column
            ))
        })?;

        for name in &config.drop_columns {
            if table.column_index(name).is_none() {
                warn!("Column '{}' listed in drop_columns is not in the dataset", name);
            }
        }

        let feature_idx: Vec<usize> = (0..table.headers.len())
            .filter(|&i| i != target_idx && !config.drop_columns.contains(&table.headers[i]))
            .collect();
        if feature_idx.is_empty() {
            return Err(TrainerError::Dataset("no feature columns left".to_string()));
        }

        let total = table.rows.len();
        let kept: Vec<&Vec<Option<String>>> =
            table.rows.iter().filter(|row| row[target_idx].is_some()).collect();
        if kept.len() < total {
            warn!("Dropped {} rows with a missing target", total - kept.len());
        }

        let raw_targets: Vec<&str> = kept.iter().filter_map(|row| row[target_idx].as_deref()).collect();
        let target_encoding = TargetEncoding::infer(&raw_targets)?;
        let labels = raw_targets
            .iter()
            .map(|raw| {
                target_encoding.encode(raw).ok_or_else(|| {
                    TrainerError::Dataset(format!("cannot encode target value '{}'", raw))
                })
            })
            .collect::<Result<Vec<u8>>>()?;

        let rows: Vec<Vec<Option<String>>> = kept
            .iter()
            .map(|row| feature_idx.iter().map(|&i| row[i].clone()).collect())
            .collect();

        let columns = feature_idx
            .iter()
            .enumerate()
            .map(|(pos, &i)| {
                let name = &table.headers[i];
                let numeric = rows
                    .iter()
                    .filter_map(|row| row[pos].as_deref())
                    .all(|cell| parse_numeric(cell).is_some());
                let kind = if numeric && !config.categorical_columns.contains(name) {
                    ColumnKind::Numeric
                } else {
                    ColumnKind::Categorical
                };
                debug!("Column '{}' inferred as {:?}", name, kind);
                ColumnSpec::new(name.clone(), kind)
            })
            .collect();

        Ok(Self {
            columns,
            rows,
            labels,
            target_encoding,
        })
    }

    /// Load a labelled dataset from CSV
    pub fn from_csv<P: AsRef<Path>>(path: P, config: &DataConfig) -> Result<Self> {
        Self::from_table(Table::from_csv(path, config)?, config)
    }

    /// Get number of samples
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if dataset is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 1).count()
    }

    pub fn positive_rate(&self) -> f64 {
        if self.labels.is_empty() {
            0.0
        } else {
            self.positives() as f64 / self.labels.len() as f64
        }
    }

    /// Rows at the given indices, in the given order
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
            target_encoding: self.target_encoding.clone(),
        }
    }

    /// Keep only the named feature columns, preserving dataset order
    pub fn select_columns(&self, names: &[String]) -> Result<Self> {
        if let Some(unknown) = names.iter().find(|n| !self.columns.iter().any(|c| &c.name == *n)) {
            return Err(TrainerError::Dataset(format!("unknown column '{}'", unknown)));
        }

        let keep: Vec<usize> = (0..self.columns.len())
            .filter(|&i| names.contains(&self.columns[i].name))
            .collect();

        Ok(Self {
            columns: keep.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| keep.iter().map(|&i| row[i].clone()).collect())
                .collect(),
            labels: self.labels.clone(),
            target_encoding: self.target_encoding.clone(),
        })
    }

    /// Get feature statistics for validation
    pub fn feature_stats(&self) -> Vec<ColumnStats> {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let observed: Vec<&str> = self.rows.iter().filter_map(|r| r[i].as_deref()).collect();
                let range = match spec.kind {
                    ColumnKind::Numeric => observed
                        .iter()
                        .filter_map(|v| parse_numeric(v))
                        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                            None => Some((v, v)),
                            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
                        }),
                    ColumnKind::Categorical => None,
                };
                ColumnStats {
                    name: spec.name.clone(),
                    kind: spec.kind,
                    missing: self.rows.len() - observed.len(),
                    range,
                    distinct: observed.iter().collect::<BTreeSet<_>>().len(),
                }
            })
            .collect()
    }

    /// Blake3 fingerprint of the feature cells and labels
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for spec in &self.columns {
            hasher.update(spec.name.as_bytes());
            hasher.update(&[0x1f]);
        }
        for (row, label) in self.rows.iter().zip(&self.labels) {
            for cell in row {
                match cell {
                    Some(v) => hasher.update(v.as_bytes()),
                    None => hasher.update(&[0x00]),
                };
                hasher.update(&[0x1f]);
            }
            hasher.update(&[*label, 0x1e]);
        }
        hex::encode(hasher.finalize().as_bytes())
    }
}

fn test_count(n: usize, fraction: f64) -> usize {
    if n < 2 {
        return 0;
    }
    ((n as f64 * fraction).round() as usize).clamp(1, n - 1)
}

/// Deterministically split into (train, test)
///
/// With stratification each class is shuffled and split on its own, so
/// both halves keep the overall positive rate.
pub fn train_test_split(
    dataset: &LabeledDataset,
    config: &SplitConfig,
) -> Result<(LabeledDataset, LabeledDataset)> {
    if dataset.len() < 2 {
        return Err(TrainerError::Dataset(format!(
            "need at least 2 rows to split, got {}",
            dataset.len()
        )));
    }

    let mut rng = LcgRng::new(config.seed);
    let mut train_idx = Vec::new();
    let mut test_idx = Vec::new();

    let groups: Vec<Vec<usize>> = if config.stratify {
        [0u8, 1u8]
            .iter()
            .map(|&class| (0..dataset.len()).filter(|&i| dataset.labels[i] == class).collect())
            .collect()
    } else {
        vec![(0..dataset.len()).collect()]
    };

    for mut group in groups {
        rng.shuffle(&mut group);
        let n_test = test_count(group.len(), config.test_fraction);
        test_idx.extend_from_slice(&group[..n_test]);
        train_idx.extend_from_slice(&group[n_test..]);
    }

    if train_idx.is_empty() || test_idx.is_empty() {
        return Err(TrainerError::Dataset(
            "split left the train or test set empty".to_string(),
        ));
    }

    train_idx.sort_unstable();
    test_idx.sort_unstable();

    let train = dataset.subset(&train_idx);
    let test = dataset.subset(&test_idx);
    info!(
        "Split {} rows into {} train / {} test (positive rate {:.3} / {:.3})",
        dataset.len(),
        train.len(),
        test.len(),
        train.positive_rate(),
        test.positive_rate()
    );

    Ok((train, test))
}
