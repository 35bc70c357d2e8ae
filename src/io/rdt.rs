//! The binary `.rdt` tree format.
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       3     Magic ("RDT")
//! 3       4     Format version (u32, little-endian)
//! 7       1     Tree depth
//! 8       1     Number of labels
//! 9       1     Background label
//! 10      4     Vertical field of view (f32, little-endian)
//! ```
//!
//! The 14-byte header is followed by `2^depth - 1` fixed-width node
//! records in flat BFS order, then a `u32` row count and that many
//! probability rows of `n_labels` f32 values each.
//!
//! A node record is `label_pr_idx:u32 | t:f32 | uv:[f32;4]` (24 bytes).
//! `label_pr_idx` is overloaded: `0` marks an internal node whose `t` and
//! `uv` are valid, `k >= 1` a leaf backed by table row `k - 1`, and
//! `u32::MAX` a node a checkpoint has not trained yet.

use std::io::{Read, Write};

use ndarray::Array2;

use crate::feature::UvPair;
use crate::repr::{tree_len, DecisionTree, NodeCell};
use crate::training::MAX_SUPPORTED_DEPTH;

use super::TREE_FORMAT_VERSION;

/// Magic bytes identifying an `.rdt` tree file.
pub const MAGIC: &[u8; 3] = b"RDT";

const HEADER_SIZE: usize = 14;
const NODE_SIZE: usize = 24;
const UNTRAINED_SENTINEL: u32 = u32::MAX;

/// Errors raised while reading or writing the binary format.
#[derive(Debug, thiserror::Error)]
pub enum RdtError {
    #[error("not an RDT tree file")]
    NotATree,

    #[error("tree requires format version {found}, this build reads {TREE_FORMAT_VERSION}")]
    UnsupportedVersion { found: u32 },

    #[error("declared depth {depth} is out of range")]
    BadDepth { depth: u8 },

    #[error("file truncated")]
    Truncated,

    #[error("node {node} references probability row {row} of {n_rows}")]
    LeafRowOutOfRange { node: usize, row: u32, n_rows: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn encode_header(tree: &DecisionTree) -> [u8; HEADER_SIZE] {
    let mut buf = [0u8; HEADER_SIZE];
    buf[0..3].copy_from_slice(MAGIC);
    buf[3..7].copy_from_slice(&TREE_FORMAT_VERSION.to_le_bytes());
    buf[7] = tree.depth();
    buf[8] = tree.n_labels();
    buf[9] = tree.bg_label();
    buf[10..14].copy_from_slice(&tree.fov().to_le_bytes());
    buf
}

fn encode_node(cell: NodeCell, buf: &mut [u8]) {
    debug_assert_eq!(buf.len(), NODE_SIZE);
    let (label_pr_idx, t, uv) = match cell {
        NodeCell::Split { uv, t } => (0u32, t, uv),
        NodeCell::Leaf { table_row } => (table_row + 1, 0.0, UvPair::default()),
        NodeCell::Untrained => (UNTRAINED_SENTINEL, 0.0, UvPair::default()),
    };
    buf[0..4].copy_from_slice(&label_pr_idx.to_le_bytes());
    buf[4..8].copy_from_slice(&t.to_le_bytes());
    for (i, c) in uv.u.iter().chain(uv.v.iter()).enumerate() {
        buf[8 + 4 * i..12 + 4 * i].copy_from_slice(&c.to_le_bytes());
    }
}

/// Write a tree (complete or partial) in binary form.
pub fn write_rdt<W: Write>(tree: &DecisionTree, mut writer: W) -> Result<(), RdtError> {
    writer.write_all(&encode_header(tree))?;

    let mut record = [0u8; NODE_SIZE];
    for &cell in tree.nodes() {
        encode_node(cell, &mut record);
        writer.write_all(&record)?;
    }

    let table = tree.leaf_table();
    writer.write_all(&(table.nrows() as u32).to_le_bytes())?;
    for &value in table.iter() {
        writer.write_all(&value.to_le_bytes())?;
    }

    Ok(())
}

fn read_exact_or_truncated<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), RdtError> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            RdtError::Truncated
        } else {
            RdtError::Io(e)
        }
    })
}

fn f32_at(buf: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

fn u32_at(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

/// Read a binary tree back, validating structure as it decodes.
pub fn read_rdt<R: Read>(mut reader: R) -> Result<DecisionTree, RdtError> {
    let mut header = [0u8; HEADER_SIZE];
    read_exact_or_truncated(&mut reader, &mut header)?;

    if &header[0..3] != MAGIC {
        return Err(RdtError::NotATree);
    }
    let version = u32_at(&header, 3);
    if version != TREE_FORMAT_VERSION {
        return Err(RdtError::UnsupportedVersion { found: version });
    }
    let depth = header[7];
    if depth == 0 || depth as usize > MAX_SUPPORTED_DEPTH {
        return Err(RdtError::BadDepth { depth });
    }
    let n_labels = header[8];
    let bg_label = header[9];
    let fov = f32_at(&header, 10);

    let n_nodes = tree_len(depth as usize);
    let mut raw_nodes = Vec::with_capacity(n_nodes);
    let mut record = [0u8; NODE_SIZE];
    for _ in 0..n_nodes {
        read_exact_or_truncated(&mut reader, &mut record)?;
        let label_pr_idx = u32_at(&record, 0);
        let t = f32_at(&record, 4);
        let uv = UvPair::new(
            [f32_at(&record, 8), f32_at(&record, 12)],
            [f32_at(&record, 16), f32_at(&record, 20)],
        );
        raw_nodes.push((label_pr_idx, t, uv));
    }

    let mut count = [0u8; 4];
    read_exact_or_truncated(&mut reader, &mut count)?;
    let n_rows = u32::from_le_bytes(count) as usize;

    let mut rows = vec![0.0f32; n_rows * n_labels as usize];
    let mut value = [0u8; 4];
    for slot in rows.iter_mut() {
        read_exact_or_truncated(&mut reader, &mut value)?;
        *slot = f32::from_le_bytes(value);
    }

    let mut nodes = Vec::with_capacity(n_nodes);
    for (node, &(label_pr_idx, t, uv)) in raw_nodes.iter().enumerate() {
        nodes.push(match label_pr_idx {
            0 => NodeCell::Split { uv, t },
            UNTRAINED_SENTINEL => NodeCell::Untrained,
            row => {
                if row as usize > n_rows {
                    return Err(RdtError::LeafRowOutOfRange {
                        node,
                        row: row - 1,
                        n_rows,
                    });
                }
                NodeCell::Leaf { table_row: row - 1 }
            }
        });
    }

    let leaf_table = Array2::from_shape_vec((n_rows, n_labels as usize), rows)
        .expect("row buffer sized from header fields");

    Ok(DecisionTree::from_parts(
        depth, fov, n_labels, bg_label, nodes, leaf_table,
    ))
}
