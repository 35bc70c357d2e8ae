//! Breadth-first tree growth.
//!
//! The controller owns the pending-node queue, the flat node array, and
//! the leaf-histogram list; workers own only their scratch. Nodes are
//! processed strictly in FIFO order, so node ids are discovered level by
//! level and leaf rows come out in BFS discovery order.

use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;

use crate::data::Corpus;
use crate::repr::NodeCell;
use crate::training::candidates::CandidateBank;
use crate::training::logger::TrainingLogger;
use crate::training::partition::partition_pixels;
use crate::training::worker::{
    run_worker, uv_slices, NodeTrainData, SharedState, StartGate, WorkerCtx,
};
use crate::training::TrainError;

/// Structural training parameters the grower needs.
#[derive(Debug, Clone)]
pub struct GrowerParams {
    pub max_depth: usize,
    pub n_threads: usize,
}

/// Everything a (possibly partial) grow pass produces.
#[derive(Debug)]
pub struct GrowthResult {
    /// Flat BFS node array; unresolved nodes stay [`NodeCell::Untrained`].
    pub nodes: Vec<NodeCell>,
    /// Leaf histograms in assignment order; row `i` backs `Leaf { table_row: i }`.
    pub histograms: Vec<Vec<f32>>,
    /// True when growth stopped on the interrupt flag.
    pub interrupted: bool,
}

/// Grow the tree from the given pending queue until it drains or an
/// interrupt stops dispatch.
///
/// `nodes` and `histograms` may carry restored checkpoint state; a fresh
/// run passes an all-`Untrained` array and an empty list. The worker pool
/// lives exactly as long as this call.
pub fn grow_tree(
    corpus: &Corpus,
    bank: &CandidateBank,
    params: &GrowerParams,
    interrupt: Arc<AtomicBool>,
    mut queue: VecDeque<NodeTrainData>,
    mut nodes: Vec<NodeCell>,
    mut histograms: Vec<Vec<f32>>,
    logger: &mut TrainingLogger,
) -> Result<GrowthResult, TrainError> {
    let n_threads = params.n_threads.max(1);
    logger.starting_threads(n_threads);

    let shared = SharedState::new(n_threads, interrupt);
    let slices = uv_slices(bank.n_uv(), n_threads);
    let gate = StartGate::new();

    let interrupted = thread::scope(|scope| -> Result<bool, TrainError> {
        for (slot, &(uv_start, uv_end)) in slices.iter().enumerate() {
            let ctx = WorkerCtx {
                corpus,
                bank,
                shared: &shared,
                uv_start,
                uv_end,
                slot,
                max_depth: params.max_depth,
            };
            let gate = &gate;
            let spawned = thread::Builder::new()
                .name(format!("train-worker-{slot}"))
                .spawn_scoped(scope, move || {
                    if gate.wait() {
                        run_worker(ctx);
                    }
                });
            if let Err(e) = spawned {
                gate.abort();
                return Err(TrainError::ThreadSpawn(e));
            }
        }
        gate.release();

        logger.begin_training();
        let mut last_depth = usize::MAX;
        let mut interrupted = false;

        while let Some(node) = queue.pop_front() {
            if node.depth != last_depth {
                logger.depth_transition(node.depth, queue.len() + 1);
                last_depth = node.depth;
            }

            let node = Arc::new(node);
            shared.dispatch(Some(Arc::clone(&node)));
            shared.join_cycle();

            if shared.interrupted() {
                logger.interrupted();
                interrupted = true;
                break;
            }

            let best = shared.best_split();
            if best.gain > 0.0 && node.depth + 1 < params.max_depth {
                let uv = bank.uv(best.uv);
                let t = bank.threshold(best.threshold);
                logger.split_node(node.id, best.gain, uv, t);

                let (left, right) = partition_pixels(corpus, &node.pixels, uv, t);
                debug_assert_eq!(left.len(), best.n_left as usize);
                debug_assert_eq!(right.len(), best.n_right as usize);

                nodes[node.id] = NodeCell::Split { uv, t };

                let id = 2 * node.id + 1;
                let depth = node.depth + 1;
                queue.push_back(NodeTrainData {
                    id,
                    depth,
                    pixels: left,
                });
                queue.push_back(NodeTrainData {
                    id: id + 1,
                    depth,
                    pixels: right,
                });
            } else {
                let parent = shared.parent_stats();
                logger.leaf_node(node.id, &parent.nhistogram);
                nodes[node.id] = NodeCell::Leaf {
                    table_row: histograms.len() as u32,
                };
                histograms.push(parent.nhistogram);
            }
            // Dropping the Arc here frees the parent's pixel buffer; the
            // children own their partitions outright.
        }

        shared.dispatch(None);
        Ok(interrupted)
    })?;

    Ok(GrowthResult {
        nodes,
        histograms,
        interrupted,
    })
}
