//! Tree persistence: JSON documents and the binary `.rdt` codec.
//!
//! The output format is picked from the file extension; anything that is
//! not `.rdt` is written as JSON, which is also what the reference
//! tooling expects by default.

pub mod json;
pub mod rdt;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

pub use json::{read_json, write_json, JsonTreeError};
pub use rdt::{read_rdt, write_rdt, RdtError};

use crate::repr::DecisionTree;

/// Version stamp carried by both persisted formats.
pub const TREE_FORMAT_VERSION: u32 = 1;

/// Errors from the extension-dispatching entry points.
#[derive(Debug, thiserror::Error)]
pub enum TreeIoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] JsonTreeError),

    #[error(transparent)]
    Rdt(#[from] RdtError),
}

fn is_rdt(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("rdt"))
        .unwrap_or(false)
}

/// Persist a tree, binary for `.rdt` paths and JSON otherwise.
pub fn save_tree(tree: &DecisionTree, path: &Path) -> Result<(), TreeIoError> {
    let file = BufWriter::new(File::create(path)?);
    if is_rdt(path) {
        write_rdt(tree, file)?;
    } else {
        write_json(tree, file)?;
    }
    Ok(())
}

/// Load a tree persisted by [`save_tree`].
pub fn load_tree(path: &Path) -> Result<DecisionTree, TreeIoError> {
    let file = BufReader::new(File::open(path)?);
    let tree = if is_rdt(path) {
        read_rdt(file)?
    } else {
        read_json(file)?
    };
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::UvPair;
    use crate::repr::NodeCell;
    use ndarray::arr2;

    fn sample_tree() -> DecisionTree {
        let nodes = vec![
            NodeCell::Split {
                uv: UvPair::new([1.0, 0.0], [0.0, 1.0]),
                t: 0.5,
            },
            NodeCell::Leaf { table_row: 0 },
            NodeCell::Leaf { table_row: 1 },
        ];
        let table = arr2(&[[1.0f32, 0.0], [0.0, 1.0]]);
        DecisionTree::from_parts(2, 1.0, 2, 0, nodes, table)
    }

    #[test]
    fn extension_selects_format() {
        let dir = tempfile::tempdir().unwrap();
        let tree = sample_tree();

        let json_path = dir.path().join("tree.json");
        save_tree(&tree, &json_path).unwrap();
        let head = std::fs::read(&json_path).unwrap();
        assert_eq!(head[0], b'{');
        assert_eq!(load_tree(&json_path).unwrap(), tree);

        let rdt_path = dir.path().join("tree.rdt");
        save_tree(&tree, &rdt_path).unwrap();
        let head = std::fs::read(&rdt_path).unwrap();
        assert_eq!(&head[0..3], b"RDT");
        assert_eq!(load_tree(&rdt_path).unwrap(), tree);
    }
}
