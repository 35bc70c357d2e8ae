//! The JSON tree document.
//!
//! ```text
//! { "_rdt_version_was": int, "depth": int, "vertical_fov": float,
//!   "n_labels": int, "bg_label": int,
//!   "root": <node> }
//! <node> := internal:  { "t": float, "u": [f,f], "v": [f,f],
//!                        "l": <node>, "r": <node> }
//!        := leaf:      { "p": [float, ... n_labels] }
//!        := untrained: { }
//! ```
//!
//! A node is internal iff the `t` key is present. Untrained nodes occur
//! only in partially trained (checkpoint) documents.

use std::collections::VecDeque;
use std::io::{Read, Write};

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::feature::UvPair;
use crate::repr::{tree_len, DecisionTree, NodeCell};

use super::TREE_FORMAT_VERSION;

/// Errors specific to reading a JSON tree document.
#[derive(Debug, thiserror::Error)]
pub enum JsonTreeError {
    #[error("JSON error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("declared depth {depth} is out of range")]
    BadDepth { depth: u8 },

    #[error("node nested deeper than the declared depth {depth}")]
    DeeperThanDepth { depth: u8 },

    #[error("leaf row has {found} probabilities, expected {expected}")]
    RowWidthMismatch { found: usize, expected: usize },
}

#[derive(Debug, Serialize, Deserialize)]
struct TreeDoc {
    #[serde(rename = "_rdt_version_was")]
    version: u32,
    depth: u8,
    vertical_fov: f32,
    n_labels: u8,
    bg_label: u8,
    root: JsonNode,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum JsonNode {
    Internal {
        t: f32,
        u: [f32; 2],
        v: [f32; 2],
        l: Box<JsonNode>,
        r: Box<JsonNode>,
    },
    Leaf {
        p: Vec<f32>,
    },
    Untrained {},
}

fn build_node(tree: &DecisionTree, id: usize) -> JsonNode {
    match tree.node(id) {
        NodeCell::Split { uv, t } => JsonNode::Internal {
            t,
            u: uv.u,
            v: uv.v,
            l: Box::new(build_node(tree, 2 * id + 1)),
            r: Box::new(build_node(tree, 2 * id + 2)),
        },
        NodeCell::Leaf { table_row } => JsonNode::Leaf {
            p: tree.leaf_row(table_row).to_vec(),
        },
        NodeCell::Untrained => JsonNode::Untrained {},
    }
}

/// Serialize a tree as a pretty-printed JSON document.
pub fn write_json<W: Write>(tree: &DecisionTree, writer: W) -> Result<(), JsonTreeError> {
    let doc = TreeDoc {
        version: TREE_FORMAT_VERSION,
        depth: tree.depth(),
        vertical_fov: tree.fov(),
        n_labels: tree.n_labels(),
        bg_label: tree.bg_label(),
        root: build_node(tree, 0),
    };
    serde_json::to_writer_pretty(writer, &doc)?;
    Ok(())
}

/// Parse a JSON tree document.
///
/// Leaf rows are assigned in BFS discovery order, which is also the order
/// they were written in, so a write/read cycle is the identity.
pub fn read_json<R: Read>(reader: R) -> Result<DecisionTree, JsonTreeError> {
    let doc: TreeDoc = serde_json::from_reader(reader)?;
    if doc.depth == 0 || doc.depth as usize > crate::training::MAX_SUPPORTED_DEPTH {
        return Err(JsonTreeError::BadDepth { depth: doc.depth });
    }

    let n_nodes = tree_len(doc.depth as usize);
    let n_labels = doc.n_labels as usize;
    let mut nodes = vec![NodeCell::Untrained; n_nodes];
    let mut rows: Vec<f32> = Vec::new();
    let mut n_rows = 0usize;

    let mut queue: VecDeque<(&JsonNode, usize)> = VecDeque::from([(&doc.root, 0usize)]);
    while let Some((node, id)) = queue.pop_front() {
        if id >= n_nodes {
            return Err(JsonTreeError::DeeperThanDepth { depth: doc.depth });
        }
        match node {
            JsonNode::Internal { t, u, v, l, r } => {
                nodes[id] = NodeCell::Split {
                    uv: UvPair::new(*u, *v),
                    t: *t,
                };
                queue.push_back((l, 2 * id + 1));
                queue.push_back((r, 2 * id + 2));
            }
            JsonNode::Leaf { p } => {
                if p.len() != n_labels {
                    return Err(JsonTreeError::RowWidthMismatch {
                        found: p.len(),
                        expected: n_labels,
                    });
                }
                nodes[id] = NodeCell::Leaf {
                    table_row: n_rows as u32,
                };
                rows.extend_from_slice(p);
                n_rows += 1;
            }
            JsonNode::Untrained {} => {}
        }
    }

    let leaf_table = Array2::from_shape_vec((n_rows, n_labels), rows)
        .expect("row count and width are tracked together");

    Ok(DecisionTree::from_parts(
        doc.depth,
        doc.vertical_fov,
        doc.n_labels,
        doc.bg_label,
        nodes,
        leaf_table,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn sample_tree() -> DecisionTree {
        let nodes = vec![
            NodeCell::Split {
                uv: UvPair::new([1.5, -2.0], [0.25, 4.0]),
                t: 0.125,
            },
            NodeCell::Leaf { table_row: 0 },
            NodeCell::Leaf { table_row: 1 },
        ];
        let table = arr2(&[[0.0f32, 0.25, 0.75], [0.0, 1.0, 0.0]]);
        DecisionTree::from_parts(2, 0.925, 3, 0, nodes, table)
    }

    #[test]
    fn json_roundtrip_is_identity() {
        let tree = sample_tree();
        let mut buf = Vec::new();
        write_json(&tree, &mut buf).unwrap();
        let reloaded = read_json(buf.as_slice()).unwrap();
        assert_eq!(reloaded, tree);
    }

    #[test]
    fn internal_nodes_carry_t_and_leaves_carry_p() {
        let tree = sample_tree();
        let mut buf = Vec::new();
        write_json(&tree, &mut buf).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(value["_rdt_version_was"], TREE_FORMAT_VERSION);
        assert_eq!(value["depth"], 2);
        assert_eq!(value["n_labels"], 3);
        let root = &value["root"];
        assert!(root.get("t").is_some());
        assert!(root["l"].get("p").is_some());
        assert!(root["l"].get("t").is_none());
    }

    #[test]
    fn untrained_nodes_roundtrip_as_empty_objects() {
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

        let mut buf = Vec::new();
        write_json(&tree, &mut buf).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["root"]["r"], serde_json::json!({}));

        let reloaded = read_json(buf.as_slice()).unwrap();
        assert_eq!(reloaded, tree);
    }

    #[test]
    fn wrong_row_width_is_rejected() {
        let doc = serde_json::json!({
            "_rdt_version_was": TREE_FORMAT_VERSION,
            "depth": 1,
            "vertical_fov": 1.0,
            "n_labels": 3,
            "bg_label": 0,
            "root": { "p": [0.5, 0.5] }
        });
        let err = read_json(doc.to_string().as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            JsonTreeError::RowWidthMismatch { found: 2, expected: 3 }
        ));
    }
}
