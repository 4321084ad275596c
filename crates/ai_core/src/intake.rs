//! Typed intake form parsed at the request boundary

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Fields every prediction request must carry, in reporting order
pub const REQUIRED_FIELDS: [&str; 10] = [
    "donor_age",
    "age_at_hct",
    "prim_disease_hct",
    "year_hct",
    "dri_score",
    "comorbidity_score",
    "gvhd_proph",
    "karnofsky_score",
    "race_group",
    "cyto_score",
];

/// A single user-supplied value: forms send text, API clients often send numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Blank text counts as "not provided"
    pub fn is_blank(&self) -> bool {
        matches!(self, FieldValue::Text(text) if text.trim().is_empty())
    }

    /// Label used for codebook lookups. Whole numbers render without a
    /// fractional part so `80` and `"80"` look up the same bucket.
    pub fn label(&self) -> Cow<'_, str> {
        match self {
            FieldValue::Text(text) => Cow::Borrowed(text.as_str()),
            FieldValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                Cow::Owned(format!("{}", *n as i64))
            }
            FieldValue::Number(n) => Cow::Owned(n.to_string()),
            FieldValue::Bool(b) => Cow::Owned(b.to_string()),
        }
    }

    /// Parse as a 64-bit float; `None` for booleans and non-numeric text
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(text) => text.trim().parse::<f64>().ok(),
            FieldValue::Bool(_) => None,
        }
    }

    /// Parse as a 32-bit float; `None` for booleans and non-numeric text
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            FieldValue::Number(n) => Some(*n as f32),
            FieldValue::Text(text) => text.trim().parse::<f32>().ok(),
            FieldValue::Bool(_) => None,
        }
    }

    /// Parse as a 32-bit integer. Text must be an integer literal; JSON
    /// numbers are truncated toward zero when they fit.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            FieldValue::Number(n)
                if n.is_finite() && *n >= f64::from(i32::MIN) && *n <= f64::from(i32::MAX) =>
            {
                Some(n.trunc() as i32)
            }
            FieldValue::Number(_) => None,
            FieldValue::Text(text) => text.trim().parse::<i32>().ok(),
            FieldValue::Bool(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => write!(f, "'{text}'"),
            other => f.write_str(&other.label()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

/// Clinical intake form. Any field may be absent; keys outside this set are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntakeForm {
    pub donor_age: Option<FieldValue>,
    pub age_at_hct: Option<FieldValue>,
    pub prim_disease_hct: Option<FieldValue>,
    pub year_hct: Option<FieldValue>,
    pub dri_score: Option<FieldValue>,
    pub comorbidity_score: Option<FieldValue>,
    pub gvhd_proph: Option<FieldValue>,
    pub karnofsky_score: Option<FieldValue>,
    pub race_group: Option<FieldValue>,
    pub cyto_score: Option<FieldValue>,
}

impl IntakeForm {
    /// Look up a field by its wire name
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        let slot = match field {
            "donor_age" => &self.donor_age,
            "age_at_hct" => &self.age_at_hct,
            "prim_disease_hct" => &self.prim_disease_hct,
            "year_hct" => &self.year_hct,
            "dri_score" => &self.dri_score,
            "comorbidity_score" => &self.comorbidity_score,
            "gvhd_proph" => &self.gvhd_proph,
            "karnofsky_score" => &self.karnofsky_score,
            "race_group" => &self.race_group,
            "cyto_score" => &self.cyto_score,
            _ => return None,
        };
        slot.as_ref()
    }

    /// Required fields that are absent, null or blank, in [`REQUIRED_FIELDS`] order
    pub fn missing_fields(&self) -> Vec<&'static str> {
        REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| self.get(field).map_or(true, FieldValue::is_blank))
            .collect()
    }

    /// Full-precision numeric view of a field, `None` when absent or unparsable
    pub fn numeric(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(FieldValue::as_f64)
    }

    /// Label view of a field, `None` when absent
    pub fn label(&self, field: &str) -> Option<Cow<'_, str>> {
        self.get(field).map(FieldValue::label)
    }
}
