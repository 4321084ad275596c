//! Decision tree structures for GBDT inference
//!
//! Nodes are stored flat; node 0 is the root. Splits compare a single
//! feature against a threshold and go left on `value <= threshold`.

use serde::{Deserialize, Serialize};

/// A decision tree node (internal or leaf)
///
/// For internal nodes:
/// - `feature_idx >= 0`: column in the feature row
/// - `left` and `right` point to child node indices
/// - `leaf` is `None`
///
/// For leaf nodes:
/// - `feature_idx == -1`
/// - `leaf` contains the raw contribution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Node ID (for reference, not used in traversal)
    pub id: i32,

    /// Left child index (-1 for leaf nodes)
    pub left: i32,

    /// Right child index (-1 for leaf nodes)
    pub right: i32,

    /// Feature index to split on (-1 for leaf nodes)
    #[serde(rename = "feature_idx", alias = "feature")]
    pub feature_idx: i32,

    /// Split threshold
    #[serde(default)]
    pub threshold: f64,

    /// Leaf value (Some for leaf nodes, None for internal nodes)
    #[serde(default)]
    pub leaf: Option<f64>,
}

impl Node {
    /// Create a new internal (split) node
    pub fn internal(id: i32, feature_idx: i32, threshold: f64, left: i32, right: i32) -> Self {
        Self {
            id,
            left,
            right,
            feature_idx,
            threshold,
            leaf: None,
        }
    }

    /// Create a new leaf node
    pub fn leaf(id: i32, value: f64) -> Self {
        Self {
            id,
            left: -1,
            right: -1,
            feature_idx: -1,
            threshold: 0.0,
            leaf: Some(value),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.feature_idx == -1 || self.leaf.is_some()
    }

    pub fn leaf_value(&self) -> Option<f64> {
        self.leaf
    }
}

/// A single regression tree of the ensemble
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    /// Tree nodes (node 0 is the root)
    pub nodes: Vec<Node>,

    /// Multiplier applied to this tree's leaf output (shrinkage)
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl Tree {
    pub fn new(nodes: Vec<Node>, weight: f64) -> Self {
        Self { nodes, weight }
    }

    /// Evaluate this tree on a feature row.
    ///
    /// Returns `None` when traversal leaves the tree or references a column
    /// outside `features`; a validated tree scored on a full row never does.
    pub fn evaluate(&self, features: &[f64]) -> Option<f64> {
        let mut idx = 0usize;
        // A well-formed tree reaches a leaf in at most `nodes.len()` steps.
        for _ in 0..=self.nodes.len() {
            let node = self.nodes.get(idx)?;
            if node.is_leaf() {
                return node.leaf_value();
            }

            let value = *features.get(usize::try_from(node.feature_idx).ok()?)?;
            let next = if value <= node.threshold {
                node.left
            } else {
                node.right
            };
            idx = usize::try_from(next).ok()?;
        }
        None
    }

    /// Highest feature column referenced by any split
    pub fn max_feature_index(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter(|node| !node.is_leaf())
            .filter_map(|node| usize::try_from(node.feature_idx).ok())
            .max()
    }

    /// Validate tree structure
    pub fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }
        if !self.weight.is_finite() {
            return Err(format!("Tree weight is not finite: {}", self.weight));
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if !node.is_leaf() {
                if node.left <= i as i32 || node.left as usize >= self.nodes.len() {
                    return Err(format!("Node {} has invalid left child: {}", i, node.left));
                }
                if node.right <= i as i32 || node.right as usize >= self.nodes.len() {
                    return Err(format!(
                        "Node {} has invalid right child: {}",
                        i, node.right
                    ));
                }
                if node.feature_idx < 0 {
                    return Err(format!(
                        "Internal node {} has invalid feature index: {}",
                        i, node.feature_idx
                    ));
                }
                if node.threshold.is_nan() {
                    return Err(format!("Internal node {i} has a NaN threshold"));
                }
            } else {
                match node.leaf {
                    Some(value) if value.is_finite() => {}
                    Some(value) => {
                        return Err(format!("Leaf node {i} has non-finite value {value}"))
                    }
                    None => return Err(format!("Leaf node {i} has no leaf value")),
                }
            }
        }

        Ok(())
    }
}
