//! GBDT model artifact: loading, validation, scoring and fingerprinting

use super::tree::Tree;
use crate::schema::FeatureSchema;
use crate::serde_canon::{hash_canonical_hex, to_canonical_json, CanonicalError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Artifact format version understood by this loader
pub const FORMAT_VERSION: i32 = 1;

/// GBDT model errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Canonical serialization error: {0}")]
    CanonicalError(#[from] CanonicalError),

    #[error("Feature contract mismatch: {0}")]
    FeatureMismatch(String),
}

/// Gradient boosted tree ensemble producing a raw logit
///
/// ```json
/// {
///   "version": 1,
///   "bias": -0.12,
///   "feature_names": ["dri_score", "psych_disturb", "..."],
///   "trees": [
///     {
///       "weight": 0.1,
///       "nodes": [
///         {"id":0,"left":1,"right":2,"feature_idx":48,"threshold":60.5,"leaf":null},
///         {"id":1,"left":-1,"right":-1,"feature_idx":-1,"threshold":0.0,"leaf":0.41},
///         {"id":2,"left":-1,"right":-1,"feature_idx":-1,"threshold":0.0,"leaf":-0.37}
///       ]
///     }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Model {
    /// Artifact format version
    pub version: i32,

    /// Decision trees in the ensemble
    pub trees: Vec<Tree>,

    /// Constant added to the tree sum
    #[serde(default)]
    pub bias: f64,

    /// Column names the trees were trained on, in order. Empty when the
    /// exporter did not record them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feature_names: Vec<String>,
}

impl Model {
    pub fn new(trees: Vec<Tree>, bias: f64) -> Self {
        Self {
            version: FORMAT_VERSION,
            trees,
            bias,
            feature_names: Vec::new(),
        }
    }

    /// Attach the training column order
    pub fn with_feature_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feature_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Validate model structure
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.version != FORMAT_VERSION {
            return Err(ModelError::ValidationFailed(format!(
                "Unsupported model version: {}",
                self.version
            )));
        }

        if !self.bias.is_finite() {
            return Err(ModelError::ValidationFailed(format!(
                "Bias is not finite: {}",
                self.bias
            )));
        }

        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate().map_err(|e| {
                ModelError::ValidationFailed(format!("Tree {} validation failed: {}", i, e))
            })?;
        }

        if let Some(declared) = self.declared_features() {
            if self.required_features() > declared {
                return Err(ModelError::ValidationFailed(format!(
                    "Trees reference feature {} but only {} feature names are declared",
                    self.required_features() - 1,
                    declared
                )));
            }
        }

        Ok(())
    }

    /// Minimum row length every split can be evaluated on
    pub fn required_features(&self) -> usize {
        self.trees
            .iter()
            .filter_map(Tree::max_feature_index)
            .max()
            .map_or(0, |idx| idx + 1)
    }

    /// Row length fixed by `feature_names`, if recorded
    pub fn declared_features(&self) -> Option<usize> {
        (!self.feature_names.is_empty()).then_some(self.feature_names.len())
    }

    /// Check that the model was trained on `schema`'s columns.
    ///
    /// With recorded names they must match the schema order exactly; without
    /// them every split must at least address a schema column.
    pub fn verify_feature_contract(&self, schema: &FeatureSchema) -> Result<(), ModelError> {
        if self.feature_names.is_empty() {
            if self.required_features() > schema.len() {
                return Err(ModelError::FeatureMismatch(format!(
                    "model splits on column {} but the schema has {} columns",
                    self.required_features() - 1,
                    schema.len()
                )));
            }
            return Ok(());
        }

        if self.feature_names.len() != schema.len() {
            return Err(ModelError::FeatureMismatch(format!(
                "model declares {} features, schema has {}",
                self.feature_names.len(),
                schema.len()
            )));
        }

        for (idx, (declared, expected)) in self.feature_names.iter().zip(schema.names()).enumerate()
        {
            if declared != expected {
                return Err(ModelError::FeatureMismatch(format!(
                    "column {idx} is '{declared}' in the model but '{expected}' in the schema"
                )));
            }
        }
        Ok(())
    }

    /// Raw ensemble output: `bias + Σ weight·leaf`.
    ///
    /// Returns `None` if any tree cannot be evaluated on `features`.
    pub fn score(&self, features: &[f64]) -> Option<f64> {
        self.trees.iter().try_fold(self.bias, |sum, tree| {
            tree.evaluate(features).map(|leaf| sum + tree.weight * leaf)
        })
    }

    /// Serialize model to canonical JSON (sorted keys, no whitespace)
    pub fn to_canonical_json(&self) -> Result<String, ModelError> {
        Ok(to_canonical_json(self)?)
    }

    /// Blake3 hash of the canonical JSON, as hex
    pub fn hash_hex(&self) -> Result<String, ModelError> {
        Ok(hash_canonical_hex(self)?)
    }

    /// Save model to JSON file with canonical serialization
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
        fs::write(path, self.to_canonical_json()?)?;
        Ok(())
    }

    /// Load and validate a model from a JSON file
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Parse and validate a model from JSON text
    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        let model: Model = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}
