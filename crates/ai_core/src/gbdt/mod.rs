//! Gradient boosted decision tree inference
//!
//! The default scoring backend. A model is a JSON artifact holding a list of
//! weighted regression trees plus a bias; its raw output is a logit that the
//! post-processor turns into a probability.
//!
//! ```rust,no_run
//! use hct_ai_core::gbdt::{Model, Node, Tree};
//!
//! let tree = Tree::new(
//!     vec![
//!         Node::internal(0, 0, 50.0, 1, 2),
//!         Node::leaf(1, 0.8),
//!         Node::leaf(2, -0.3),
//!     ],
//!     1.0,
//! );
//! let model = Model::new(vec![tree], 0.1);
//!
//! let score = model.score(&[30.0]);
//! let hash = model.hash_hex().unwrap();
//! ```

pub mod model;
pub mod tree;

pub use model::{Model, ModelError, FORMAT_VERSION};
pub use tree::{Node, Tree};
