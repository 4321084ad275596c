//! Feature schema registry
//!
//! The column order below is the order the classifier was trained on:
//! the categorical block first, then the numerical block. A vector built in
//! any other order still scores, just against the wrong columns, so this
//! table is the single place where features are added or reordered.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

/// Categorical features and their integer defaults, in training order
const CATEGORICAL_FEATURES: &[(&str, i32)] = &[
    ("dri_score", 0),
    ("psych_disturb", 0),
    ("cyto_score", 0),
    ("diabetes", 0),
    ("tbi_status", 0),
    ("arrhythmia", 0),
    ("graft_type", 0),
    ("vent_hist", 0),
    ("renal_issue", 0),
    ("pulm_severe", 0),
    ("prim_disease_hct", 0),
    ("cmv_status", 0),
    ("tce_imm_match", 0),
    ("rituximab", 0),
    ("prod_type", 0),
    ("cyto_score_detail", 0),
    ("conditioning_intensity", 0),
    ("ethnicity", 0),
    ("obesity", 0),
    ("mrd_hct", 0),
    ("in_vivo_tcd", 0),
    ("tce_match", 0),
    ("hepatic_severe", 0),
    ("prior_tumor", 0),
    ("peptic_ulcer", 0),
    ("gvhd_proph", 0),
    ("rheum_issue", 0),
    ("sex_match", 0),
    ("race_group", 0),
    ("hepatic_mild", 0),
    ("tce_div_match", 0),
    ("donor_related", 0),
    ("melphalan_dose", 0),
    ("cardiac", 0),
    ("pulm_moderate", 0),
];

/// Numerical features and their float defaults, in training order
const NUMERICAL_FEATURES: &[(&str, f32)] = &[
    ("hla_match_c_high", 1.0),
    ("hla_high_res_8", 7.0),
    ("hla_low_res_6", 6.0),
    ("hla_high_res_6", 6.0),
    ("hla_high_res_10", 9.0),
    ("hla_match_dqb1_high", 1.0),
    ("hla_nmdp_6", 6.0),
    ("hla_match_c_low", 2.0),
    ("hla_match_drb1_low", 2.0),
    ("hla_match_dqb1_low", 1.0),
    ("hla_match_a_high", 2.0),
    ("donor_age", 0.0),
    ("hla_match_b_low", 2.0),
    ("age_at_hct", 0.0),
    ("hla_match_a_low", 2.0),
    ("hla_match_b_high", 2.0),
    ("comorbidity_score", 0.0),
    ("karnofsky_score", 80.0),
    ("hla_low_res_8", 7.0),
    ("hla_match_drb1_high", 1.0),
    ("hla_low_res_10", 9.0),
    ("year_hct", 0.0),
];

static STANDARD_SCHEMA: Lazy<FeatureSchema> = Lazy::new(|| {
    FeatureSchema::from_blocks(CATEGORICAL_FEATURES, NUMERICAL_FEATURES)
        .unwrap_or_else(|err| panic!("built-in feature schema is invalid: {err}"))
});

/// Schema construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("feature '{0}' is declared more than once")]
    DuplicateFeature(String),

    #[error("feature name must not be empty")]
    EmptyName,
}

/// Declared storage kind of a feature column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    /// Encoded as a 32-bit integer code
    Categorical,
    /// Encoded as a 32-bit float
    Numerical,
}

/// A single typed feature value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue {
    Int(i32),
    Float(f32),
}

impl FeatureValue {
    /// Cast to the storage type of `kind` (int32 for categorical, float32 for numerical)
    pub fn cast(self, kind: FeatureKind) -> Self {
        match (self, kind) {
            (FeatureValue::Int(v), FeatureKind::Numerical) => FeatureValue::Float(v as f32),
            // `as` truncates toward zero and saturates, matching an int32 column cast
            (FeatureValue::Float(v), FeatureKind::Categorical) => FeatureValue::Int(v as i32),
            (value, _) => value,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            FeatureValue::Int(v) => f64::from(v),
            FeatureValue::Float(v) => f64::from(v),
        }
    }

    pub fn is_int(self) -> bool {
        matches!(self, FeatureValue::Int(_))
    }
}

/// One registry entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureSpec {
    pub name: &'static str,
    pub kind: FeatureKind,
    pub default: FeatureValue,
}

/// Partially populated feature values keyed by schema name
pub type PartialFeatureMap = HashMap<&'static str, FeatureValue>;

/// Immutable, ordered registry of every feature the model consumes
#[derive(Debug, Clone)]
pub struct FeatureSchema {
    features: Vec<FeatureSpec>,
    positions: HashMap<&'static str, usize>,
    categorical_len: usize,
}

impl FeatureSchema {
    /// The process-wide schema matching the deployed model
    pub fn standard() -> &'static FeatureSchema {
        &STANDARD_SCHEMA
    }

    /// Build a schema from a categorical block followed by a numerical block
    pub fn from_blocks(
        categorical: &[(&'static str, i32)],
        numerical: &[(&'static str, f32)],
    ) -> Result<Self, SchemaError> {
        let categorical_specs = categorical.iter().map(|&(name, default)| FeatureSpec {
            name,
            kind: FeatureKind::Categorical,
            default: FeatureValue::Int(default),
        });
        let numerical_specs = numerical.iter().map(|&(name, default)| FeatureSpec {
            name,
            kind: FeatureKind::Numerical,
            default: FeatureValue::Float(default),
        });

        let features: Vec<FeatureSpec> = categorical_specs.chain(numerical_specs).collect();
        let mut positions = HashMap::with_capacity(features.len());
        for (idx, spec) in features.iter().enumerate() {
            if spec.name.is_empty() {
                return Err(SchemaError::EmptyName);
            }
            if positions.insert(spec.name, idx).is_some() {
                return Err(SchemaError::DuplicateFeature(spec.name.to_string()));
            }
        }

        Ok(Self {
            features,
            positions,
            categorical_len: categorical.len(),
        })
    }

    /// Total number of columns
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// All features in canonical order
    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    /// The categorical block
    pub fn categorical(&self) -> &[FeatureSpec] {
        &self.features[..self.categorical_len]
    }

    /// The numerical block
    pub fn numerical(&self) -> &[FeatureSpec] {
        &self.features[self.categorical_len..]
    }

    /// Feature names in canonical order
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.features.iter().map(|spec| spec.name)
    }

    pub fn get(&self, name: &str) -> Option<&FeatureSpec> {
        self.positions.get(name).map(|&idx| &self.features[idx])
    }

    /// Column index of `name` in every vector built from this schema
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// Every known feature mapped to its default value
    pub fn default_map(&self) -> PartialFeatureMap {
        self.features
            .iter()
            .map(|spec| (spec.name, spec.default))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn standard_schema_has_expected_blocks() {
        let schema = FeatureSchema::standard();
        assert_eq!(schema.categorical().len(), 35);
        assert_eq!(schema.numerical().len(), 22);
        assert_eq!(schema.len(), 57);
        assert!(schema
            .categorical()
            .iter()
            .all(|spec| spec.kind == FeatureKind::Categorical));
        assert!(schema
            .numerical()
            .iter()
            .all(|spec| spec.kind == FeatureKind::Numerical));
    }

    #[test]
    fn names_are_unique() {
        let schema = FeatureSchema::standard();
        let unique: HashSet<&str> = schema.names().collect();
        assert_eq!(unique.len(), schema.len());
    }

    #[test]
    fn canonical_order_is_stable() {
        let schema = FeatureSchema::standard();
        assert_eq!(schema.position("dri_score"), Some(0));
        assert_eq!(schema.position("pulm_moderate"), Some(34));
        assert_eq!(schema.position("hla_match_c_high"), Some(35));
        assert_eq!(schema.position("year_hct"), Some(56));
        assert_eq!(schema.position("not_a_feature"), None);
    }

    #[test]
    fn defaults_follow_declared_kind() {
        let schema = FeatureSchema::standard();
        let hla = schema.get("hla_high_res_10").unwrap();
        assert_eq!(hla.default, FeatureValue::Float(9.0));
        let karnofsky = schema.get("karnofsky_score").unwrap();
        assert_eq!(karnofsky.default, FeatureValue::Float(80.0));
        let tbi = schema.get("tbi_status").unwrap();
        assert_eq!(tbi.default, FeatureValue::Int(0));

        let defaults = schema.default_map();
        assert_eq!(defaults.len(), schema.len());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = FeatureSchema::from_blocks(&[("a", 0)], &[("a", 1.0)]).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateFeature("a".to_string()));

        let err = FeatureSchema::from_blocks(&[("", 0)], &[]).unwrap_err();
        assert_eq!(err, SchemaError::EmptyName);
    }

    #[test]
    fn value_casts_follow_column_kind() {
        assert_eq!(
            FeatureValue::Int(2019).cast(FeatureKind::Numerical),
            FeatureValue::Float(2019.0)
        );
        assert_eq!(
            FeatureValue::Float(2.9).cast(FeatureKind::Categorical),
            FeatureValue::Int(2)
        );
        assert_eq!(
            FeatureValue::Float(-1.5).cast(FeatureKind::Numerical),
            FeatureValue::Float(-1.5)
        );
    }
}
