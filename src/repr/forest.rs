//! A forest is a set of trees trained over the same label space.

use super::tree::{DecisionTree, TreeValidationError};

/// Structural validation errors for [`Forest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForestValidationError {
    EmptyForest,
    /// Trees disagree on label metadata.
    LabelMismatch { tree_idx: usize },
    InvalidTree {
        tree_idx: usize,
        error: TreeValidationError,
    },
}

impl std::fmt::Display for ForestValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyForest => write!(f, "forest has no trees"),
            Self::LabelMismatch { tree_idx } => {
                write!(f, "tree {tree_idx} disagrees on label metadata")
            }
            Self::InvalidTree { tree_idx, error } => {
                write!(f, "tree {tree_idx} is invalid: {error:?}")
            }
        }
    }
}

impl std::error::Error for ForestValidationError {}

/// An ordered collection of decision trees sharing one label space.
#[derive(Debug, Clone)]
pub struct Forest {
    trees: Vec<DecisionTree>,
}

impl Forest {
    /// Build a forest, checking that all trees agree on labels.
    pub fn from_trees(trees: Vec<DecisionTree>) -> Result<Self, ForestValidationError> {
        let first = trees.first().ok_or(ForestValidationError::EmptyForest)?;
        let (n_labels, bg_label) = (first.n_labels(), first.bg_label());
        for (tree_idx, tree) in trees.iter().enumerate() {
            if tree.n_labels() != n_labels || tree.bg_label() != bg_label {
                return Err(ForestValidationError::LabelMismatch { tree_idx });
            }
        }
        Ok(Self { trees })
    }

    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    #[inline]
    pub fn n_labels(&self) -> u8 {
        self.trees[0].n_labels()
    }

    #[inline]
    pub fn bg_label(&self) -> u8 {
        self.trees[0].bg_label()
    }

    #[inline]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Validate every tree plus cross-tree consistency.
    pub fn validate(&self) -> Result<(), ForestValidationError> {
        for (tree_idx, tree) in self.trees.iter().enumerate() {
            tree.validate()
                .map_err(|error| ForestValidationError::InvalidTree { tree_idx, error })?;
        }
        Ok(())
    }
}

impl From<DecisionTree> for Forest {
    fn from(tree: DecisionTree) -> Self {
        Self { trees: vec![tree] }
    }
}
