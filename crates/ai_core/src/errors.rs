//! Error types for the prediction pipeline

use thiserror::Error;

/// Errors surfaced by [`crate::service::PredictionService::predict`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictionError {
    /// Request lacks one or more mandatory fields
    #[error("Missing required fields: {0:?}")]
    MissingFields(Vec<String>),

    /// A mandatory numeric field could not be parsed
    #[error("Invalid input data: {0}")]
    InvalidInput(String),

    /// No scoring backend was loaded at startup
    #[error("Model not loaded")]
    ModelUnavailable,

    /// The scoring backend failed or produced an unusable score
    #[error("Inference failed: {0}")]
    Inference(String),
}

impl PredictionError {
    /// Short machine-readable label, used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            PredictionError::MissingFields(_) => "missing_fields",
            PredictionError::InvalidInput(_) => "invalid_input",
            PredictionError::ModelUnavailable => "model_unavailable",
            PredictionError::Inference(_) => "inference",
        }
    }

    /// Whether the caller is at fault (maps to a 4xx at the HTTP boundary)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PredictionError::MissingFields(_) | PredictionError::InvalidInput(_)
        )
    }
}

/// Result type for prediction operations
pub type Result<T> = std::result::Result<T, PredictionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_message_lists_names() {
        let err = PredictionError::MissingFields(vec!["donor_age".into(), "year_hct".into()]);
        let message = err.to_string();
        assert!(message.starts_with("Missing required fields: "));
        assert!(message.contains("donor_age"));
        assert!(message.contains("year_hct"));
    }

    #[test]
    fn client_errors_are_classified() {
        assert!(PredictionError::InvalidInput("x".into()).is_client_error());
        assert!(PredictionError::MissingFields(vec![]).is_client_error());
        assert!(!PredictionError::ModelUnavailable.is_client_error());
        assert!(!PredictionError::Inference("boom".into()).is_client_error());
        assert_eq!(PredictionError::ModelUnavailable.to_string(), "Model not loaded");
    }
}
