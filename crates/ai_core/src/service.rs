//! Prediction service: the full intake → recommendation pipeline
//!
//! Built once at startup and shared read-only by every request worker.

use crate::codebook::CategoricalCodebook;
use crate::errors::{PredictionError, Result};
use crate::features::assemble_with;
use crate::intake::IntakeForm;
use crate::normalize::normalize_with;
use crate::postprocess::{confidence_interval, postprocess};
use crate::risk::{classify, recommend, RiskTier};
use crate::schema::FeatureSchema;
use crate::scoring::ScoringBackend;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Successful prediction, serialized as the `/predict` response body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub survival_probability: f64,
    pub risk_category: RiskTier,
    pub confidence_interval: [f64; 2],
    pub recommendations: Vec<String>,
}

/// Holds the loaded backend and the immutable encoding tables
#[derive(Clone)]
pub struct PredictionService {
    backend: Option<Arc<dyn ScoringBackend>>,
    schema: &'static FeatureSchema,
    codebook: &'static CategoricalCodebook,
}

impl fmt::Debug for PredictionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredictionService")
            .field("model_type", &self.model_type())
            .field("features", &self.schema.len())
            .finish()
    }
}

impl PredictionService {
    /// Service backed by `backend`, using the standard schema and codebook
    pub fn new(backend: Arc<dyn ScoringBackend>) -> Self {
        Self::from_option(Some(backend))
    }

    /// Service with no model; every prediction fails with `ModelUnavailable`
    pub fn unavailable() -> Self {
        Self::from_option(None)
    }

    pub fn from_option(backend: Option<Arc<dyn ScoringBackend>>) -> Self {
        Self {
            backend,
            schema: FeatureSchema::standard(),
            codebook: CategoricalCodebook::standard(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.backend.is_some()
    }

    pub fn model_type(&self) -> Option<String> {
        self.backend.as_ref().map(|backend| backend.model_type())
    }

    pub fn model_hash(&self) -> Option<String> {
        self.backend.as_ref().and_then(|backend| backend.model_hash())
    }

    /// Run the whole pipeline for one intake form.
    ///
    /// Checks happen in a fixed order: model availability, missing fields,
    /// numeric validation, then scoring.
    pub fn predict(&self, form: &IntakeForm) -> Result<PredictionResult> {
        let backend = self
            .backend
            .as_ref()
            .ok_or(PredictionError::ModelUnavailable)?;

        let missing = form.missing_fields();
        if !missing.is_empty() {
            return Err(PredictionError::MissingFields(
                missing.into_iter().map(String::from).collect(),
            ));
        }

        let partial = normalize_with(form, self.schema, self.codebook)?;
        let vector = assemble_with(&partial, self.schema);
        debug!(features = vector.len(), "assembled feature vector");

        let raw = backend.score(&vector).map_err(|err| {
            error!(error = %err, model_type = %backend.model_type(), "scoring backend failed");
            PredictionError::Inference(err.to_string())
        })?;
        if raw.is_nan() {
            error!("scoring backend returned NaN");
            return Err(PredictionError::Inference("score is NaN".to_string()));
        }
        debug!(raw, "raw score");

        let probability = postprocess(raw);
        let tier = classify(probability);
        let recommendations = recommend(probability, tier, form);

        info!(
            probability = format_args!("{probability:.3}"),
            risk = %tier,
            "prediction successful"
        );

        Ok(PredictionResult {
            survival_probability: probability,
            risk_category: tier,
            confidence_interval: confidence_interval(probability),
            recommendations,
        })
    }
}
