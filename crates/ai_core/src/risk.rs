//! Risk tiers and clinical recommendations

use crate::intake::IntakeForm;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Probability at or above which a patient is low risk
pub const LOW_RISK_THRESHOLD: f64 = 0.7;

/// Probability at or above which a patient is at most moderate risk
pub const MODERATE_RISK_THRESHOLD: f64 = 0.4;

pub const INTENSIVE_MONITORING: &str =
    "Consider intensive monitoring in the first 100 days post-HCT";
pub const CLINICAL_TRIALS: &str = "Evaluate for clinical trials with novel approaches";
pub const AGGRESSIVE_SUPPORTIVE_CARE: &str = "Implement aggressive supportive care measures";
pub const GVHD_MONITORING: &str = "Close monitoring for GVHD and infections";
pub const PROPHYLACTIC_INTERVENTIONS: &str = "Consider prophylactic interventions";
pub const AGE_ADJUSTED_CONDITIONING: &str = "Age-adjusted conditioning regimen may be beneficial";
pub const COMORBIDITY_OPTIMIZATION: &str = "Pre-HCT optimization of comorbidities recommended";
pub const ALTERNATIVE_DONOR: &str = "Consider alternative donor or conditioning approaches";
pub const STANDARD_MONITORING: &str = "Standard post-HCT monitoring protocol";
pub const REGULAR_FOLLOW_UP: &str = "Regular follow-up appointments as scheduled";

/// Age above which an age-adjusted conditioning regimen is suggested
const ADVANCED_AGE: f64 = 60.0;

/// Comorbidity score above which pre-HCT optimization is suggested
const HIGH_COMORBIDITY: f64 = 3.0;

/// Disease-risk labels that trigger the donor advisory
const HIGH_RISK_DRI: [&str; 2] = ["high", "very_high"];

/// Coarse survival-risk bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Moderate,
    High,
}

impl RiskTier {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Moderate => "moderate",
            RiskTier::High => "high",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bucket a survival probability. Thresholds are inclusive on the lower bound.
pub fn classify(probability: f64) -> RiskTier {
    if probability >= LOW_RISK_THRESHOLD {
        RiskTier::Low
    } else if probability >= MODERATE_RISK_THRESHOLD {
        RiskTier::Moderate
    } else {
        RiskTier::High
    }
}

/// Build the recommendation list for a classified patient.
///
/// Advisories are appended in a fixed order: tier-driven first, then the
/// age, comorbidity and disease-risk checks against the raw form. Fields
/// that are absent or unparsable simply do not trigger their advisory.
pub fn recommend(probability: f64, tier: RiskTier, form: &IntakeForm) -> Vec<String> {
    let mut recommendations: Vec<&str> = Vec::new();

    if tier == RiskTier::High {
        recommendations.extend([
            INTENSIVE_MONITORING,
            CLINICAL_TRIALS,
            AGGRESSIVE_SUPPORTIVE_CARE,
        ]);
    }

    if matches!(tier, RiskTier::High | RiskTier::Moderate) {
        recommendations.extend([GVHD_MONITORING, PROPHYLACTIC_INTERVENTIONS]);
    }

    if form
        .numeric("age_at_hct")
        .is_some_and(|age| age > ADVANCED_AGE)
    {
        recommendations.push(AGE_ADJUSTED_CONDITIONING);
    }

    if form
        .numeric("comorbidity_score")
        .is_some_and(|score| score > HIGH_COMORBIDITY)
    {
        recommendations.push(COMORBIDITY_OPTIMIZATION);
    }

    if form
        .label("dri_score")
        .is_some_and(|label| HIGH_RISK_DRI.iter().any(|dri| label == *dri))
    {
        recommendations.push(ALTERNATIVE_DONOR);
    }

    if recommendations.is_empty() {
        recommendations.extend([STANDARD_MONITORING, REGULAR_FOLLOW_UP]);
    }

    debug!(
        probability,
        tier = %tier,
        count = recommendations.len(),
        "built recommendations"
    );

    recommendations.into_iter().map(String::from).collect()
}
