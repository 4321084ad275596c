//! Categorical label encodings
//!
//! Free-text labels from the intake form are mapped to the integer codes the
//! model was trained with. Lookups are total: an unknown label encodes as
//! [`FALLBACK_CODE`] instead of failing, so the service keeps working while
//! the upstream label set evolves.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// Code used for any label the codebook does not know
pub const FALLBACK_CODE: i32 = 0;

/// Karnofsky score used when the bucket label is not recognised
pub const KARNOFSKY_FALLBACK: f32 = 80.0;

const PRIM_DISEASE_HCT: &[(&str, i32)] = &[
    ("aml", 0),
    ("all", 1),
    ("mds", 2),
    ("cml", 3),
    ("lymphoma", 4),
    ("multiple_myeloma", 5),
    ("other", 6),
];

const DRI_SCORE: &[(&str, i32)] = &[
    ("low", 0),
    ("intermediate", 1),
    ("high", 2),
    ("very_high", 3),
];

const GVHD_PROPH: &[(&str, i32)] = &[
    ("tacrolimus_mtx", 0),
    ("cyclosporine_mtx", 1),
    ("other", 2),
];

const RACE_GROUP: &[(&str, i32)] = &[
    ("more_than_one", 0),
    ("asian", 1),
    ("white", 2),
    ("american_indian", 3),
    ("native_hawaiian", 4),
    ("black", 5),
];

const CYTO_SCORE: &[(&str, i32)] = &[
    ("favorable", 0),
    ("intermediate", 1),
    ("poor", 2),
    ("very_poor", 3),
];

/// Performance-status buckets and their representative scores
const KARNOFSKY_BUCKETS: &[(&str, f32)] = &[
    ("90-100", 95.0),
    ("80", 80.0),
    ("70", 70.0),
    ("60", 60.0),
    ("<60", 50.0),
];

static STANDARD_CODEBOOK: Lazy<CategoricalCodebook> = Lazy::new(|| {
    CategoricalCodebook::from_tables(&[
        ("prim_disease_hct", PRIM_DISEASE_HCT),
        ("dri_score", DRI_SCORE),
        ("gvhd_proph", GVHD_PROPH),
        ("race_group", RACE_GROUP),
        ("cyto_score", CYTO_SCORE),
    ])
});

/// Immutable label → code tables, one per categorical intake field
#[derive(Debug, Clone, Default)]
pub struct CategoricalCodebook {
    tables: BTreeMap<&'static str, BTreeMap<&'static str, i32>>,
}

impl CategoricalCodebook {
    /// The process-wide codebook matching the deployed model
    pub fn standard() -> &'static CategoricalCodebook {
        &STANDARD_CODEBOOK
    }

    pub fn from_tables(tables: &[(&'static str, &[(&'static str, i32)])]) -> Self {
        let tables = tables
            .iter()
            .map(|&(field, entries)| (field, entries.iter().copied().collect()))
            .collect();
        Self { tables }
    }

    /// Fields that accept free-text labels
    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tables.keys().copied()
    }

    /// Encode `label` for `field`.
    ///
    /// Unknown fields and unknown labels both yield [`FALLBACK_CODE`]; this is
    /// the intended contract, not an error path.
    pub fn code_for(&self, field: &str, label: &str) -> i32 {
        self.tables
            .get(field)
            .and_then(|table| table.get(label))
            .copied()
            .unwrap_or(FALLBACK_CODE)
    }
}

/// Representative numeric score for a Karnofsky bucket label.
///
/// Unknown labels map to [`KARNOFSKY_FALLBACK`].
pub fn karnofsky_score(label: &str) -> f32 {
    KARNOFSKY_BUCKETS
        .iter()
        .find(|(bucket, _)| *bucket == label)
        .map(|&(_, score)| score)
        .unwrap_or(KARNOFSKY_FALLBACK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FeatureKind, FeatureSchema};

    #[test]
    fn known_labels_encode() {
        let codebook = CategoricalCodebook::standard();
        assert_eq!(codebook.code_for("prim_disease_hct", "multiple_myeloma"), 5);
        assert_eq!(codebook.code_for("dri_score", "very_high"), 3);
        assert_eq!(codebook.code_for("gvhd_proph", "cyclosporine_mtx"), 1);
        assert_eq!(codebook.code_for("race_group", "black"), 5);
        assert_eq!(codebook.code_for("cyto_score", "poor"), 2);
    }

    #[test]
    fn unknown_labels_fall_back() {
        let codebook = CategoricalCodebook::standard();
        assert_eq!(codebook.code_for("dri_score", "unknown_value"), FALLBACK_CODE);
        assert_eq!(codebook.code_for("dri_score", "HIGH"), FALLBACK_CODE);
        assert_eq!(codebook.code_for("dri_score", ""), FALLBACK_CODE);
        assert_eq!(codebook.code_for("no_such_field", "low"), FALLBACK_CODE);
    }

    #[test]
    fn every_field_is_a_categorical_schema_column() {
        let schema = FeatureSchema::standard();
        let codebook = CategoricalCodebook::standard();
        for field in codebook.fields() {
            let spec = schema
                .get(field)
                .unwrap_or_else(|| panic!("{field} missing from schema"));
            assert_eq!(spec.kind, FeatureKind::Categorical, "{field}");
        }
        assert_eq!(codebook.fields().count(), 5);
    }

    #[test]
    fn karnofsky_buckets() {
        assert_eq!(karnofsky_score("90-100"), 95.0);
        assert_eq!(karnofsky_score("80"), 80.0);
        assert_eq!(karnofsky_score("70"), 70.0);
        assert_eq!(karnofsky_score("60"), 60.0);
        assert_eq!(karnofsky_score("<60"), 50.0);
        assert_eq!(karnofsky_score("100"), KARNOFSKY_FALLBACK);
        assert_eq!(karnofsky_score(""), KARNOFSKY_FALLBACK);
    }
}
