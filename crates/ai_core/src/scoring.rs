//! Scoring backend seam
//!
//! The prediction service only needs "feature vector in, one raw score out".
//! Anything that can do that and be shared across request workers can sit
//! behind [`ScoringBackend`].

use crate::features::FeatureVector;
use crate::gbdt::Model;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    #[error("expected {expected} features, got {actual}")]
    FeatureCount { expected: usize, actual: usize },

    #[error("backend produced a non-finite score: {0}")]
    NonFinite(f64),

    #[error("backend failure: {0}")]
    Backend(String),
}

/// A trained classifier that maps a feature vector to one raw score
pub trait ScoringBackend: Send + Sync {
    /// Human-readable model family, reported by `/health`
    fn model_type(&self) -> String;

    /// Stable fingerprint of the loaded artifact, if the backend has one
    fn model_hash(&self) -> Option<String> {
        None
    }

    /// Raw score: a probability in [0,1] or an unbounded logit
    fn score(&self, features: &FeatureVector) -> Result<f64, ScoringError>;
}

impl ScoringBackend for Model {
    fn model_type(&self) -> String {
        "GBDTModel".to_string()
    }

    fn model_hash(&self) -> Option<String> {
        self.hash_hex().ok()
    }

    fn score(&self, features: &FeatureVector) -> Result<f64, ScoringError> {
        let row = features.to_f64_row();
        let expected = self
            .declared_features()
            .unwrap_or_else(|| self.required_features());
        let mismatched = match self.declared_features() {
            Some(declared) => row.len() != declared,
            None => row.len() < expected,
        };
        if mismatched {
            return Err(ScoringError::FeatureCount {
                expected,
                actual: row.len(),
            });
        }

        let raw = Model::score(self, &row).ok_or_else(|| {
            ScoringError::Backend("tree traversal did not reach a leaf".to_string())
        })?;
        if raw.is_finite() {
            Ok(raw)
        } else {
            Err(ScoringError::NonFinite(raw))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::assemble;
    use crate::gbdt::{Node, Tree};
    use crate::schema::{FeatureSchema, FeatureValue, PartialFeatureMap};

    fn age_split_model() -> Model {
        let schema = FeatureSchema::standard();
        let age = schema.position("age_at_hct").unwrap() as i32;
        Model::new(
            vec![Tree::new(
                vec![
                    Node::internal(0, age, 60.0, 1, 2),
                    Node::leaf(1, 1.2),
                    Node::leaf(2, -0.8),
                ],
                1.0,
            )],
            0.0,
        )
    }

    #[test]
    fn gbdt_backend_scores_assembled_vectors() {
        let model = age_split_model();
        let mut partial = PartialFeatureMap::new();

        partial.insert("age_at_hct", FeatureValue::Float(45.0));
        assert_eq!(ScoringBackend::score(&model, &assemble(&partial)), Ok(1.2));

        partial.insert("age_at_hct", FeatureValue::Float(70.0));
        assert_eq!(ScoringBackend::score(&model, &assemble(&partial)), Ok(-0.8));
    }

    #[test]
    fn short_vectors_are_rejected() {
        let model = age_split_model();
        let vector = FeatureVector::from(vec![FeatureValue::Int(0); 3]);
        let err = ScoringBackend::score(&model, &vector).unwrap_err();
        assert!(matches!(err, ScoringError::FeatureCount { actual: 3, .. }));
    }

    #[test]
    fn declared_width_must_match_exactly() {
        let schema = FeatureSchema::standard();
        let model = Model::new(vec![], 0.3).with_feature_names(schema.names());

        let vector = FeatureVector::from(vec![FeatureValue::Float(0.0); 58]);
        assert_eq!(
            ScoringBackend::score(&model, &vector),
            Err(ScoringError::FeatureCount {
                expected: 57,
                actual: 58
            })
        );
        assert_eq!(
            ScoringBackend::score(&model, &assemble(&PartialFeatureMap::new())),
            Ok(0.3)
        );
    }

    #[test]
    fn reports_type_and_hash() {
        let model = age_split_model();
        assert_eq!(model.model_type(), "GBDTModel");
        assert_eq!(model.model_hash(), model.hash_hex().ok());
    }
}
