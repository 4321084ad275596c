//! Feature vector assembly
//!
//! Turns a normalized feature map into the ordered, typed row the model
//! consumes. The output always has one slot per schema feature, in schema
//! order, regardless of what the map contains.

use crate::schema::{FeatureKind, FeatureSchema, FeatureValue, PartialFeatureMap};

/// Ordered, fixed-length model input
///
/// Categorical slots hold `Int`, numerical slots hold `Float`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<FeatureValue>,
}

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[FeatureValue] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<FeatureValue> {
        self.values.get(index).copied()
    }

    /// Dense float row, as handed to tree traversal
    pub fn to_f64_row(&self) -> Vec<f64> {
        self.values.iter().map(|value| value.as_f64()).collect()
    }

    /// Check every slot's type against the schema's declared kind
    pub fn matches_schema(&self, schema: &FeatureSchema) -> bool {
        self.values.len() == schema.len()
            && self
                .values
                .iter()
                .zip(schema.features())
                .all(|(value, spec)| match spec.kind {
                    FeatureKind::Categorical => value.is_int(),
                    FeatureKind::Numerical => !value.is_int(),
                })
    }
}

impl From<Vec<FeatureValue>> for FeatureVector {
    fn from(values: Vec<FeatureValue>) -> Self {
        Self { values }
    }
}

/// Assemble against the standard schema
pub fn assemble(partial: &PartialFeatureMap) -> FeatureVector {
    assemble_with(partial, FeatureSchema::standard())
}

/// Emit one value per schema feature, cast to its declared kind.
///
/// Names absent from `partial` take the schema default, so this is total.
pub fn assemble_with(partial: &PartialFeatureMap, schema: &FeatureSchema) -> FeatureVector {
    let values = schema
        .features()
        .iter()
        .map(|spec| {
            partial
                .get(spec.name)
                .copied()
                .unwrap_or(spec.default)
                .cast(spec.kind)
        })
        .collect();
    FeatureVector { values }
}
