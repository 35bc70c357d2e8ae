//! Decision tree and forest representations.

mod forest;
mod tree;

pub use forest::{Forest, ForestValidationError};
pub use tree::{tree_len, DecisionTree, NodeCell, NodeId, TreeValidationError};
