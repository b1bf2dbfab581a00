//! Persisted training artifacts
//!
//! A trained pipeline is stored as three canonical JSON files plus a
//! manifest of their Blake3 hashes:
//!
//! ```text
//! <dir>/preprocessor.json   fitted ColumnTransformer
//! <dir>/model.json          fitted boosted-tree Model
//! <dir>/columns.json        input column names, in entry order
//! <dir>/manifest.json       hashes, decision threshold, crate version, creation time
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{CoreError, Result};
use crate::gbdt::Model;
use crate::preprocess::ColumnTransformer;
use crate::serde_canon::{hash_bytes_hex, to_canonical_json};

pub const PREPROCESSOR_FILE: &str = "preprocessor.json";
pub const MODEL_FILE: &str = "model.json";
pub const COLUMNS_FILE: &str = "columns.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Probability at or above which a patient is labelled positive
pub const DEFAULT_THRESHOLD: f64 = 0.5;

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

pub(crate) fn check_threshold(threshold: f64) -> Result<()> {
    if threshold > 0.0 && threshold < 1.0 {
        Ok(())
    } else {
        Err(CoreError::InvalidInput(format!(
            "threshold {} must be in (0, 1)",
            threshold
        )))
    }
}

/// Hashes and provenance of a saved bundle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactManifest {
    /// Version of the crate that wrote the bundle
    pub version: String,
    /// RFC 3339 creation time
    pub created_at: String,
    /// Decision threshold chosen at training time
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// File name -> Blake3 hex digest
    pub files: BTreeMap<String, String>,
}

/// Fitted transformer, model and column list, loaded or saved together
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactBundle {
    pub transformer: ColumnTransformer,
    pub model: Model,
    pub columns: Vec<String>,
    pub threshold: f64,
}

impl ArtifactBundle {
    /// Assemble a bundle, checking the three parts agree
    pub fn new(transformer: ColumnTransformer, model: Model) -> Result<Self> {
        let columns = transformer.input_columns();
        let bundle = Self {
            transformer,
            model,
            columns,
            threshold: DEFAULT_THRESHOLD,
        };
        bundle.validate()?;
        Ok(bundle)
    }

    /// Replace the decision threshold stored with the bundle
    pub fn with_threshold(mut self, threshold: f64) -> Result<Self> {
        check_threshold(threshold)?;
        self.threshold = threshold;
        Ok(self)
    }

    /// Check that model, transformer and column list describe the same pipeline
    pub fn validate(&self) -> Result<()> {
        self.transformer.validate()?;
        self.model.validate()?;
        check_threshold(self.threshold)?;

        if self.columns != self.transformer.input_columns() {
            return Err(CoreError::ArtifactMismatch(
                "column list does not match the preprocessor's input columns".to_string(),
            ));
        }

        if self.model.feature_count() != self.transformer.output_width() {
            return Err(CoreError::ArtifactMismatch(format!(
                "model expects {} features but the preprocessor produces {}",
                self.model.feature_count(),
                self.transformer.output_width()
            )));
        }

        if self.model.feature_names != self.transformer.output_feature_names() {
            return Err(CoreError::ArtifactMismatch(
                "model feature names do not match the preprocessor output".to_string(),
            ));
        }

        Ok(())
    }

    /// Write the bundle and its manifest into `dir`, creating it if needed
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<ArtifactManifest> {
        let dir = dir.as_ref();
        self.validate()?;
        fs::create_dir_all(dir)?;

        let payloads = [
            (PREPROCESSOR_FILE, to_canonical_json(&self.transformer)?),
            (MODEL_FILE, to_canonical_json(&self.model)?),
            (COLUMNS_FILE, to_canonical_json(&self.columns)?),
        ];

        let mut files = BTreeMap::new();
        for (name, json) in &payloads {
            let path = dir.join(name);
            fs::write(&path, json)?;
            let digest = hash_bytes_hex(json.as_bytes());
            debug!("Wrote {} ({})", path.display(), digest);
            files.insert(name.to_string(), digest);
        }

        let manifest = ArtifactManifest {
            version: crate::VERSION.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            threshold: self.threshold,
            files,
        };
        fs::write(dir.join(MANIFEST_FILE), to_canonical_json(&manifest)?)?;

        info!("Saved artifacts to {}", dir.display());
        Ok(manifest)
    }

    /// Load a bundle from `dir`, verifying hashes and cross-consistency
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();

        let manifest: ArtifactManifest =
            serde_json::from_str(&fs::read_to_string(dir.join(MANIFEST_FILE))?)?;

        let read_verified = |name: &str| -> Result<String> {
            let content = fs::read_to_string(dir.join(name))?;
            let expected = manifest.files.get(name).ok_or_else(|| {
                CoreError::ArtifactMismatch(format!("manifest has no entry for {}", name))
            })?;
            let actual = hash_bytes_hex(content.as_bytes());
            if &actual != expected {
                return Err(CoreError::ArtifactMismatch(format!(
                    "{} hash {} does not match manifest {}",
                    name, actual, expected
                )));
            }
            Ok(content)
        };

        let transformer: ColumnTransformer = serde_json::from_str(&read_verified(PREPROCESSOR_FILE)?)?;
        let model: Model = serde_json::from_str(&read_verified(MODEL_FILE)?)?;
        let columns: Vec<String> = serde_json::from_str(&read_verified(COLUMNS_FILE)?)?;

        let bundle = Self {
            transformer,
            model,
            columns,
            threshold: manifest.threshold,
        };
        bundle.validate()?;

        info!(
            "Loaded artifacts from {} ({} columns, {} trees, threshold {})",
            dir.display(),
            bundle.columns.len(),
            bundle.model.num_trees(),
            bundle.threshold
        );
        Ok(bundle)
    }
}
