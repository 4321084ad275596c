//! Raw score → survival probability

/// Logits are clipped to this magnitude before the sigmoid so `exp` stays finite
pub const LOGIT_CLAMP: f64 = 500.0;

/// Half width of the reported confidence band
pub const CONFIDENCE_HALF_WIDTH: f64 = 0.1;

/// Convert a backend score into a probability in [0,1].
///
/// Scores already inside [0,1] are treated as probabilities and pass through;
/// anything else is treated as a logit. The result is clamped either way.
pub fn postprocess(raw: f64) -> f64 {
    let probability = if (0.0..=1.0).contains(&raw) {
        raw
    } else {
        sigmoid(raw)
    };
    probability.clamp(0.0, 1.0)
}

/// Logistic function over a clipped logit
pub fn sigmoid(logit: f64) -> f64 {
    let z = logit.clamp(-LOGIT_CLAMP, LOGIT_CLAMP);
    1.0 / (1.0 + (-z).exp())
}

/// `[p - 0.1, p + 0.1]` clamped to [0,1]
pub fn confidence_interval(probability: f64) -> [f64; 2] {
    [
        (probability - CONFIDENCE_HALF_WIDTH).max(0.0),
        (probability + CONFIDENCE_HALF_WIDTH).min(1.0),
    ]
}
