//! HCT survival prediction core
//!
//! Turns a clinician's intake form into a survival probability, a risk tier
//! and a list of recommendations.
//!
//! Modules:
//! - `schema`: Ordered feature registry matching the trained model
//! - `codebook`: Categorical label → integer code tables
//! - `intake`: Typed intake form parsed at the request boundary
//! - `normalize`: Intake form → schema-keyed feature values
//! - `features`: Fixed-order feature vector assembly
//! - `gbdt`: Gradient boosted tree ensemble used as the default backend
//! - `scoring`: The `ScoringBackend` seam between pipeline and model
//! - `postprocess`: Raw score → probability and confidence band
//! - `risk`: Risk tiers and recommendation rules
//! - `service`: `PredictionService`, the end-to-end pipeline

pub mod codebook;
pub mod errors;
pub mod features;
pub mod gbdt;
pub mod intake;
pub mod normalize;
pub mod postprocess;
pub mod risk;
pub mod schema;
pub mod scoring;
pub mod serde_canon;
pub mod service;

pub use codebook::CategoricalCodebook;
pub use errors::PredictionError;
pub use features::{assemble, FeatureVector};
pub use gbdt::{Model, ModelError};
pub use intake::{FieldValue, IntakeForm, REQUIRED_FIELDS};
pub use normalize::normalize;
pub use postprocess::{confidence_interval, postprocess};
pub use risk::{classify, recommend, RiskTier};
pub use schema::{FeatureKind, FeatureSchema, FeatureValue, PartialFeatureMap};
pub use scoring::{ScoringBackend, ScoringError};
pub use service::{PredictionResult, PredictionService};

/// Crate version string, reported by the service metadata endpoint
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
