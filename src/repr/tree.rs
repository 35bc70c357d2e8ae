//! Flat breadth-first decision tree storage.
//!
//! Nodes live in a dense array of length `2^depth - 1` where the children
//! of node `i` sit at `2i + 1` and `2i + 2`; no parent pointers exist and
//! no cycles are possible. Leaf nodes index rows of a shared probability
//! table instead of storing their distribution inline.

use crate::data::DepthPixel;
use crate::feature::{sample_feature, UvPair};
use ndarray::{Array2, ArrayView1, ArrayView2};

/// Index of a node in the flat BFS array.
pub type NodeId = usize;

/// Number of nodes in a full binary tree of the given depth.
#[inline]
pub const fn tree_len(depth: usize) -> usize {
    (1usize << depth) - 1
}

/// One cell of the flat node array.
///
/// `Untrained` marks nodes a partial (checkpointed) tree has not resolved
/// yet; a fully trained tree contains only splits and leaves on its
/// reachable paths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeCell {
    /// Internal node: descend left when `feature < t`.
    Split { uv: UvPair, t: f32 },
    /// Terminal node holding a row of the probability table (base-zero).
    Leaf { table_row: u32 },
    /// Not yet trained; only present in checkpoints.
    Untrained,
}

/// Structural validation errors for [`DecisionTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeValidationError {
    /// Node array length is not `2^depth - 1`.
    NodeCountMismatch { expected: usize, actual: usize },
    /// A split node sits on the last level, where children cannot exist.
    SplitAtMaxDepth { node: NodeId },
    /// A leaf references a row beyond the probability table.
    LeafRowOutOfBounds { node: NodeId, row: u32, n_rows: usize },
    /// Leaf rows are not assigned in BFS discovery order.
    LeafRowOrder { node: NodeId, row: u32, expected: u32 },
    /// Probability table width differs from the label count.
    TableWidthMismatch { expected: usize, actual: usize },
}

/// A trained (or partially trained) decision tree.
///
/// Immutable once built; training works on raw parts and assembles the
/// tree at the end, mirroring how checkpoint restore tears one apart.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTree {
    depth: u8,
    fov: f32,
    n_labels: u8,
    bg_label: u8,
    nodes: Vec<NodeCell>,
    /// `(n_leaves, n_labels)`; each row sums to 1 or is all-zero.
    leaf_table: Array2<f32>,
}

impl DecisionTree {
    /// Assemble a tree from its parts.
    ///
    /// `nodes.len()` must equal `tree_len(depth)` and the table width must
    /// equal `n_labels`; row histograms are taken as-is.
    pub fn from_parts(
        depth: u8,
        fov: f32,
        n_labels: u8,
        bg_label: u8,
        nodes: Vec<NodeCell>,
        leaf_table: Array2<f32>,
    ) -> Self {
        debug_assert_eq!(nodes.len(), tree_len(depth as usize));
        debug_assert_eq!(leaf_table.ncols(), n_labels as usize);
        Self {
            depth,
            fov,
            n_labels,
            bg_label,
            nodes,
            leaf_table,
        }
    }

    /// Depth bound the tree was trained with.
    #[inline]
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Camera vertical field of view the training corpus used, radians.
    #[inline]
    pub fn fov(&self) -> f32 {
        self.fov
    }

    /// Number of labels per probability row.
    #[inline]
    pub fn n_labels(&self) -> u8 {
        self.n_labels
    }

    /// Label value reserved for the background.
    #[inline]
    pub fn bg_label(&self) -> u8 {
        self.bg_label
    }

    /// Full node array, BFS order.
    #[inline]
    pub fn nodes(&self) -> &[NodeCell] {
        &self.nodes
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> NodeCell {
        self.nodes[id]
    }

    /// Number of rows in the leaf probability table.
    #[inline]
    pub fn n_leaf_rows(&self) -> usize {
        self.leaf_table.nrows()
    }

    /// The whole leaf probability table, `(n_leaves, n_labels)`.
    #[inline]
    pub fn leaf_table(&self) -> &Array2<f32> {
        &self.leaf_table
    }

    /// One probability row.
    #[inline]
    pub fn leaf_row(&self, row: u32) -> ArrayView1<'_, f32> {
        self.leaf_table.row(row as usize)
    }

    /// True when no node is left untrained.
    pub fn is_fully_trained(&self) -> bool {
        self.reachable_untrained().is_empty()
    }

    /// BFS ids of reachable nodes still marked untrained.
    pub fn reachable_untrained(&self) -> Vec<NodeId> {
        let mut pending = Vec::new();
        let mut stack = vec![0usize];
        while let Some(id) = stack.pop() {
            match self.nodes[id] {
                NodeCell::Split { .. } => {
                    stack.push(2 * id + 2);
                    stack.push(2 * id + 1);
                }
                NodeCell::Leaf { .. } => {}
                NodeCell::Untrained => pending.push(id),
            }
        }
        pending.sort_unstable();
        pending
    }

    /// Walk from the root to a leaf for the pixel at `(x, y)`.
    ///
    /// `flip` mirrors every split feature about the vertical axis; callers
    /// that use it remap the returned row through their flip map.
    ///
    /// Returns `None` if descent reaches an untrained cell, which only
    /// happens on partial trees.
    pub fn descend<P: DepthPixel>(
        &self,
        depth_image: &ArrayView2<'_, P>,
        x: u32,
        y: u32,
        d: f32,
        bg_depth: f32,
        flip: bool,
    ) -> Option<u32> {
        let mut id = 0usize;
        loop {
            match self.nodes[id] {
                NodeCell::Split { uv, t } => {
                    let uv = if flip { uv.flipped() } else { uv };
                    let feature = sample_feature(depth_image, x, y, d, uv, bg_depth);
                    id = if feature < t { 2 * id + 1 } else { 2 * id + 2 };
                }
                NodeCell::Leaf { table_row } => return Some(table_row),
                NodeCell::Untrained => return None,
            }
        }
    }

    /// Check structural invariants.
    ///
    /// Intended for tests and checkpoint debugging: verifies the node
    /// count, that splits never sit on the last level, and that leaf rows
    /// are in-bounds and assigned in BFS discovery order.
    pub fn validate(&self) -> Result<(), TreeValidationError> {
        let expected = tree_len(self.depth as usize);
        if self.nodes.len() != expected {
            return Err(TreeValidationError::NodeCountMismatch {
                expected,
                actual: self.nodes.len(),
            });
        }
        if self.leaf_table.ncols() != self.n_labels as usize {
            return Err(TreeValidationError::TableWidthMismatch {
                expected: self.n_labels as usize,
                actual: self.leaf_table.ncols(),
            });
        }

        let n_rows = self.leaf_table.nrows();
        let last_level_start = tree_len(self.depth as usize - 1);
        let mut next_row = 0u32;
        let mut queue = std::collections::VecDeque::from([0usize]);
        while let Some(id) = queue.pop_front() {
            match self.nodes[id] {
                NodeCell::Split { .. } => {
                    if id >= last_level_start {
                        return Err(TreeValidationError::SplitAtMaxDepth { node: id });
                    }
                    queue.push_back(2 * id + 1);
                    queue.push_back(2 * id + 2);
                }
                NodeCell::Leaf { table_row } => {
                    if table_row as usize >= n_rows {
                        return Err(TreeValidationError::LeafRowOutOfBounds {
                            node: id,
                            row: table_row,
                            n_rows,
                        });
                    }
                    if table_row != next_row {
                        return Err(TreeValidationError::LeafRowOrder {
                            node: id,
                            row: table_row,
                            expected: next_row,
                        });
                    }
                    next_row += 1;
                }
                NodeCell::Untrained => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn two_leaf_tree() -> DecisionTree {
        let nodes = vec![
            NodeCell::Split {
                uv: UvPair::new([0.0, 0.0], [1.0, 0.0]),
                t: 0.0,
            },
            NodeCell::Leaf { table_row: 0 },
            NodeCell::Leaf { table_row: 1 },
        ];
        let table = arr2(&[[1.0f32, 0.0], [0.0, 1.0]]);
        DecisionTree::from_parts(2, 1.0, 2, 0, nodes, table)
    }

    #[test]
    fn descend_branches_on_threshold() {
        let tree = two_leaf_tree();
        // Pixel (1, 0): probe at (2, 0) is out of bounds, feature is
        // strongly negative, goes left.
        let depth = arr2(&[[1.0f32, 1.0]]);
        let row = tree
            .descend(&depth.view(), 1, 0, 1.0, 1000.0, false)
            .unwrap();
        assert_eq!(row, 0);
        // Pixel (0, 0): both probes in bounds and equal, goes right.
        let row = tree
            .descend(&depth.view(), 0, 0, 1.0, 1000.0, false)
            .unwrap();
        assert_eq!(row, 1);
    }

    #[test]
    fn validate_accepts_well_formed_tree() {
        assert_eq!(two_leaf_tree().validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_out_of_order_leaf_rows() {
        let nodes = vec![
            NodeCell::Split {
                uv: UvPair::default(),
                t: 0.0,
            },
            NodeCell::Leaf { table_row: 1 },
            NodeCell::Leaf { table_row: 0 },
        ];
        let table = arr2(&[[1.0f32, 0.0], [0.0, 1.0]]);
        let tree = DecisionTree::from_parts(2, 1.0, 2, 0, nodes, table);
        assert!(matches!(
            tree.validate(),
            Err(TreeValidationError::LeafRowOrder { .. })
        ));
    }

    #[test]
    fn untrained_nodes_are_reported() {
        let nodes = vec![
            NodeCell::Split {
                uv: UvPair::default(),
                t: 0.0,
            },
            NodeCell::Leaf { table_row: 0 },
            NodeCell::Untrained,
        ];
        let table = arr2(&[[1.0f32, 0.0]]);
        let tree = DecisionTree::from_parts(2, 1.0, 2, 0, nodes, table);
        assert!(!tree.is_fully_trained());
        assert_eq!(tree.reachable_untrained(), vec![2]);
    }
}
