//! Input normalization: intake form → schema-keyed feature values
//!
//! Mandatory numeric fields must parse; a failure there means the request is
//! corrupt. Categorical and Karnofsky labels never fail and fall back to
//! their default codes instead.

use crate::codebook::{karnofsky_score, CategoricalCodebook, KARNOFSKY_FALLBACK};
use crate::errors::{PredictionError, Result};
use crate::intake::IntakeForm;
use crate::schema::{FeatureSchema, FeatureValue, PartialFeatureMap};

/// Mandatory numeric fields parsed as 32-bit floats
pub const REQUIRED_FLOAT_FIELDS: [&str; 3] = ["donor_age", "age_at_hct", "comorbidity_score"];

/// Mandatory numeric fields parsed as 32-bit integers
pub const REQUIRED_INT_FIELDS: [&str; 1] = ["year_hct"];

const KARNOFSKY_FIELD: &str = "karnofsky_score";

/// Normalize against the standard schema and codebook
pub fn normalize(form: &IntakeForm) -> Result<PartialFeatureMap> {
    normalize_with(form, FeatureSchema::standard(), CategoricalCodebook::standard())
}

/// Normalize an intake form into a fully populated feature map.
///
/// The map starts from every schema default, so absent optional fields keep
/// their defaults without further handling.
///
/// Categorical fields and the Karnofsky bucket are looked up by their display
/// label. A JSON number is accepted in place of its text form, so `70` and
/// `"70"` both resolve to the 70 bucket instead of the fallback.
pub fn normalize_with(
    form: &IntakeForm,
    schema: &FeatureSchema,
    codebook: &CategoricalCodebook,
) -> Result<PartialFeatureMap> {
    let mut features = schema.default_map();

    for field in REQUIRED_FLOAT_FIELDS {
        let value = required_f32(form, field)?;
        set(&mut features, schema, field, FeatureValue::Float(value));
    }

    for field in REQUIRED_INT_FIELDS {
        let value = required_i32(form, field)?;
        set(&mut features, schema, field, FeatureValue::Int(value));
    }

    for field in codebook.fields() {
        if let Some(label) = form.label(field) {
            let code = codebook.code_for(field, &label);
            set(&mut features, schema, field, FeatureValue::Int(code));
        }
    }

    let karnofsky = form
        .label(KARNOFSKY_FIELD)
        .map(|label| karnofsky_score(&label))
        .unwrap_or(KARNOFSKY_FALLBACK);
    set(
        &mut features,
        schema,
        KARNOFSKY_FIELD,
        FeatureValue::Float(karnofsky),
    );

    Ok(features)
}

fn set(features: &mut PartialFeatureMap, schema: &FeatureSchema, field: &str, value: FeatureValue) {
    // Keys are borrowed from the schema so the map never holds unknown names.
    if let Some(spec) = schema.get(field) {
        features.insert(spec.name, value);
    }
}

fn required_f32(form: &IntakeForm, field: &str) -> Result<f32> {
    let raw = form
        .get(field)
        .ok_or_else(|| PredictionError::InvalidInput(format!("{field} is required")))?;
    raw.as_f32()
        .filter(|value| value.is_finite())
        .ok_or_else(|| {
            PredictionError::InvalidInput(format!("{field} must be a finite number, got {raw}"))
        })
}

fn required_i32(form: &IntakeForm, field: &str) -> Result<i32> {
    let raw = form
        .get(field)
        .ok_or_else(|| PredictionError::InvalidInput(format!("{field} is required")))?;
    raw.as_i32().ok_or_else(|| {
        PredictionError::InvalidInput(format!("{field} must be an integer, got {raw}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codebook::FALLBACK_CODE;
    use crate::intake::FieldValue;
    use serde_json::json;

    fn form(value: serde_json::Value) -> IntakeForm {
        serde_json::from_value(value).unwrap()
    }

    fn complete_form() -> IntakeForm {
        form(json!({
            "donor_age": "30",
            "age_at_hct": "45.5",
            "prim_disease_hct": "mds",
            "year_hct": "2019",
            "dri_score": "intermediate",
            "comorbidity_score": "2",
            "gvhd_proph": "cyclosporine_mtx",
            "karnofsky_score": "70",
            "race_group": "asian",
            "cyto_score": "poor"
        }))
    }

    #[test]
    fn encodes_complete_form() {
        let features = normalize(&complete_form()).unwrap();

        assert_eq!(features["donor_age"], FeatureValue::Float(30.0));
        assert_eq!(features["age_at_hct"], FeatureValue::Float(45.5));
        assert_eq!(features["comorbidity_score"], FeatureValue::Float(2.0));
        assert_eq!(features["year_hct"], FeatureValue::Int(2019));
        assert_eq!(features["prim_disease_hct"], FeatureValue::Int(2));
        assert_eq!(features["dri_score"], FeatureValue::Int(1));
        assert_eq!(features["gvhd_proph"], FeatureValue::Int(1));
        assert_eq!(features["race_group"], FeatureValue::Int(1));
        assert_eq!(features["cyto_score"], FeatureValue::Int(2));
        assert_eq!(features["karnofsky_score"], FeatureValue::Float(70.0));
    }

    #[test]
    fn untouched_features_keep_defaults() {
        let features = normalize(&complete_form()).unwrap();
        let schema = FeatureSchema::standard();

        assert_eq!(features.len(), schema.len());
        assert_eq!(features["hla_high_res_8"], FeatureValue::Float(7.0));
        assert_eq!(features["tbi_status"], FeatureValue::Int(0));
    }

    #[test]
    fn unknown_category_falls_back_silently() {
        let mut form = complete_form();
        form.dri_score = Some("unknown_value".into());
        form.race_group = Some("martian".into());

        let features = normalize(&form).unwrap();
        assert_eq!(features["dri_score"], FeatureValue::Int(FALLBACK_CODE));
        assert_eq!(features["race_group"], FeatureValue::Int(FALLBACK_CODE));
    }

    #[test]
    fn absent_categorical_keeps_default() {
        let mut form = complete_form();
        form.cyto_score = None;
        form.karnofsky_score = None;

        let features = normalize(&form).unwrap();
        assert_eq!(features["cyto_score"], FeatureValue::Int(0));
        assert_eq!(features["karnofsky_score"], FeatureValue::Float(80.0));
    }

    #[test]
    fn unknown_karnofsky_bucket_defaults_to_80() {
        let mut form = complete_form();
        form.karnofsky_score = Some("100".into());
        let features = normalize(&form).unwrap();
        assert_eq!(features["karnofsky_score"], FeatureValue::Float(80.0));

        form.karnofsky_score = Some("90-100".into());
        let features = normalize(&form).unwrap();
        assert_eq!(features["karnofsky_score"], FeatureValue::Float(95.0));
    }

    #[test]
    fn numeric_karnofsky_resolves_like_its_label() {
        let mut form = complete_form();
        form.karnofsky_score = Some(FieldValue::Number(70.0));
        let features = normalize(&form).unwrap();
        assert_eq!(features["karnofsky_score"], FeatureValue::Float(70.0));
    }

    #[test]
    fn non_numeric_mandatory_field_is_invalid() {
        let mut form = complete_form();
        form.donor_age = Some("thirty".into());

        let err = normalize(&form).unwrap_err();
        assert!(matches!(err, PredictionError::InvalidInput(_)));
        assert!(err.to_string().contains("donor_age"));
    }

    #[test]
    fn non_finite_mandatory_field_is_invalid() {
        let mut form = complete_form();
        form.age_at_hct = Some("NaN".into());
        assert!(matches!(
            normalize(&form),
            Err(PredictionError::InvalidInput(_))
        ));
    }

    #[test]
    fn fractional_year_text_is_invalid() {
        let mut form = complete_form();
        form.year_hct = Some("2019.5".into());
        let err = normalize(&form).unwrap_err();
        assert!(err.to_string().contains("year_hct"));
    }

    #[test]
    fn absent_mandatory_field_is_invalid() {
        let mut form = complete_form();
        form.comorbidity_score = None;
        let err = normalize(&form).unwrap_err();
        assert_eq!(
            err,
            PredictionError::InvalidInput("comorbidity_score is required".to_string())
        );
    }

    #[test]
    fn numbers_are_accepted_for_numeric_fields() {
        let form = form(json!({
            "donor_age": 28,
            "age_at_hct": 61,
            "year_hct": 2020,
            "comorbidity_score": 4,
            "karnofsky_score": 60
        }));

        let features = normalize(&form).unwrap();
        assert_eq!(features["age_at_hct"], FeatureValue::Float(61.0));
        assert_eq!(features["year_hct"], FeatureValue::Int(2020));
        assert_eq!(features["karnofsky_score"], FeatureValue::Float(60.0));
    }
}
