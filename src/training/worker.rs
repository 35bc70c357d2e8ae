//! The per-node split-search worker pool.
//!
//! Workers are long-lived threads, each permanently assigned a contiguous
//! slice of the uv candidate axis. A node is processed in one two-barrier
//! cycle: the controller publishes the node descriptor and enters `ready`;
//! every worker accumulates label histograms for its (uv, threshold) slab
//! and records its local best split; workers enter `finished`; the
//! controller reduces the per-worker bests. The barriers are the only
//! synchronization points, so workers touch nothing but their private
//! scratch and the read-only inputs between them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, Condvar, Mutex};

use crate::data::{Corpus, SamplePixel};
use crate::feature::sample_feature;
use crate::training::candidates::CandidateBank;
use crate::training::histogram::{
    information_gain, normalize_histogram, shannon_entropy, HistogramSums,
};

/// Training descriptor of one pending node.
///
/// Owns its pixel buffer; on a split the pixels are repartitioned into the
/// two child descriptors and this one is dropped.
#[derive(Debug)]
pub struct NodeTrainData {
    /// BFS index of the node.
    pub id: usize,
    /// Tree depth the node sits at (root = 0).
    pub depth: usize,
    pub pixels: Vec<SamplePixel>,
}

/// Best split found by one worker over its candidate slice.
///
/// `uv` is a global candidate index. A gain of zero means no viable split
/// was found; ties are broken by first occurrence in scan order
/// (uv ascending, then threshold ascending).
#[derive(Debug, Clone, Copy)]
pub struct SplitOutcome {
    pub gain: f32,
    pub uv: usize,
    pub threshold: usize,
    pub n_left: u32,
    pub n_right: u32,
}

impl SplitOutcome {
    pub(crate) fn none() -> Self {
        Self {
            gain: 0.0,
            uv: 0,
            threshold: 0,
            n_left: 0,
            n_right: 0,
        }
    }
}

/// Normalized parent histogram of the node just processed.
///
/// Produced by worker 0 as part of its result; the controller reads it to
/// write leaf rows, which keeps the buffer ownership inside the protocol
/// instead of aliasing a designated worker's scratch.
#[derive(Debug, Clone)]
pub struct ParentStats {
    pub sums: HistogramSums,
    pub nhistogram: Vec<f32>,
}

/// One worker's per-node result slot.
#[derive(Debug)]
pub struct WorkerSlot {
    pub best: SplitOutcome,
    pub parent: Option<ParentStats>,
}

impl WorkerSlot {
    fn empty() -> Self {
        Self {
            best: SplitOutcome::none(),
            parent: None,
        }
    }
}

/// State shared between the controller and all workers.
pub struct SharedState {
    /// The node being processed; written only by the controller between
    /// `finished` and `ready`. `None` tells workers to exit.
    job: Mutex<Option<Arc<NodeTrainData>>>,
    /// Entry barrier, width `n_threads + 1`.
    ready: Barrier,
    /// Exit barrier, width `n_threads + 1`.
    finished: Barrier,
    interrupt: Arc<AtomicBool>,
    slots: Vec<Mutex<WorkerSlot>>,
}

impl SharedState {
    pub fn new(n_threads: usize, interrupt: Arc<AtomicBool>) -> Self {
        Self {
            job: Mutex::new(None),
            ready: Barrier::new(n_threads + 1),
            finished: Barrier::new(n_threads + 1),
            interrupt,
            slots: (0..n_threads).map(|_| Mutex::new(WorkerSlot::empty())).collect(),
        }
    }

    #[inline]
    pub fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Relaxed)
    }

    /// Publish the next node (or `None` to shut the pool down) and release
    /// the workers. Must only be called by the controller, outside a cycle.
    pub fn dispatch(&self, node: Option<Arc<NodeTrainData>>) {
        *self.job.lock().expect("job slot poisoned") = node;
        self.ready.wait();
    }

    /// Wait for all workers to finish the current node.
    pub fn join_cycle(&self) {
        self.finished.wait();
    }

    /// Reduce the per-worker bests in worker order.
    ///
    /// Strictly-greater replacement preserves the global scan-order
    /// tie-break: each worker already kept the first best of its slice and
    /// slices are assigned in ascending uv order.
    pub fn best_split(&self) -> SplitOutcome {
        let mut best = SplitOutcome::none();
        for slot in &self.slots {
            let slot = slot.lock().expect("worker slot poisoned");
            if slot.best.gain > best.gain {
                best = slot.best;
            }
        }
        best
    }

    /// Parent statistics computed for the node just processed.
    pub fn parent_stats(&self) -> ParentStats {
        self.slots[0]
            .lock()
            .expect("worker slot poisoned")
            .parent
            .clone()
            .expect("worker 0 publishes parent stats every cycle")
    }
}

/// Startup latch for the pool.
///
/// Workers park here before touching the barriers, so a thread-spawn
/// failure can still abort cleanly: barriers are sized for the full pool
/// and a partially spawned pool waiting on them could never be released.
pub struct StartGate {
    state: Mutex<GateState>,
    cv: Condvar,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum GateState {
    Waiting,
    Run,
    Abort,
}

impl StartGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Waiting),
            cv: Condvar::new(),
        }
    }

    /// Block until released; returns `false` when the pool was aborted.
    pub fn wait(&self) -> bool {
        let mut state = self.state.lock().expect("start gate poisoned");
        while *state == GateState::Waiting {
            state = self.cv.wait(state).expect("start gate poisoned");
        }
        *state == GateState::Run
    }

    pub fn release(&self) {
        *self.state.lock().expect("start gate poisoned") = GateState::Run;
        self.cv.notify_all();
    }

    pub fn abort(&self) {
        *self.state.lock().expect("start gate poisoned") = GateState::Abort;
        self.cv.notify_all();
    }
}

impl Default for StartGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Split the candidate axis into one contiguous slice per worker.
///
/// The last worker absorbs the remainder so every candidate is covered
/// exactly once.
pub fn uv_slices(n_uv: usize, n_threads: usize) -> Vec<(usize, usize)> {
    let per_thread = n_uv / n_threads;
    (0..n_threads)
        .map(|i| {
            let start = i * per_thread;
            let end = if i == n_threads - 1 {
                n_uv
            } else {
                (i + 1) * per_thread
            };
            (start, end)
        })
        .collect()
}

/// Everything one worker needs, borrowed for the lifetime of the pool.
pub struct WorkerCtx<'a> {
    pub corpus: &'a Corpus,
    pub bank: &'a CandidateBank,
    pub shared: &'a SharedState,
    pub uv_start: usize,
    pub uv_end: usize,
    pub slot: usize,
    pub max_depth: usize,
}

/// Worker thread body.
///
/// Loops over barrier cycles until a null descriptor is published. The
/// interrupt flag short-circuits the in-flight pixel and candidate loops
/// but never skips the `finished` barrier; skipping it would strand the
/// controller mid-cycle.
pub fn run_worker(ctx: WorkerCtx<'_>) {
    let n_labels = ctx.corpus.n_labels() as usize;
    let n_thresholds = ctx.bank.n_thresholds();
    let slice_len = ctx.uv_end - ctx.uv_start;

    let mut parent_histogram = vec![0u32; n_labels];
    let mut parent_nhistogram = vec![0.0f32; n_labels];
    let mut nhistogram = vec![0.0f32; n_labels];
    let mut lr_histograms = vec![0u32; slice_len * n_thresholds * 2 * n_labels];
    let mut samples = vec![0.0f32; slice_len];

    loop {
        ctx.shared.ready.wait();

        let job = ctx.shared.job.lock().expect("job slot poisoned").clone();
        let Some(node) = job else {
            break;
        };

        parent_histogram.fill(0);
        lr_histograms.fill(0);
        accumulate_histograms(
            &ctx,
            &node,
            &mut parent_histogram,
            &mut lr_histograms,
            &mut samples,
        );

        let parent_sums = normalize_histogram(&parent_histogram, &mut parent_nhistogram);

        let mut best = SplitOutcome::none();
        // A single-label node cannot be split, and nodes on the last level
        // never accumulated candidate histograms at all.
        if parent_sums.n_nonzero > 1 && node.depth < ctx.max_depth - 1 {
            best = scan_candidates(
                &ctx,
                parent_sums,
                shannon_entropy(&parent_nhistogram),
                &lr_histograms,
                &mut nhistogram,
            );
        }

        {
            let mut slot = ctx.shared.slots[ctx.slot].lock().expect("worker slot poisoned");
            slot.best = best;
            slot.parent = (ctx.slot == 0).then(|| ParentStats {
                sums: parent_sums,
                nhistogram: parent_nhistogram.clone(),
            });
        }

        ctx.shared.finished.wait();
    }
}

/// Accumulate the parent histogram and, below the last level, the
/// left/right histogram slab for every (uv, threshold) pair of the slice.
///
/// Slab layout: `[uv][threshold][side][label]`, sides 0 = left, 1 = right.
fn accumulate_histograms(
    ctx: &WorkerCtx<'_>,
    node: &NodeTrainData,
    parent_histogram: &mut [u32],
    lr_histograms: &mut [u32],
    samples: &mut [f32],
) {
    let n_labels = ctx.corpus.n_labels() as usize;
    let n_thresholds = ctx.bank.n_thresholds();
    let bg_depth = ctx.corpus.bg_depth();
    let last_level = node.depth >= ctx.max_depth - 1;

    for &pixel in &node.pixels {
        if ctx.shared.interrupted() {
            break;
        }

        let depth_image = ctx.corpus.depth_image(pixel.image as usize);
        let label = ctx.corpus.label_at(pixel) as usize;
        let d = corpus_depth(&depth_image, pixel);
        debug_assert!(label < n_labels);

        parent_histogram[label] += 1;

        if last_level {
            continue;
        }

        for (i, sample) in samples.iter_mut().enumerate() {
            let uv = ctx.bank.uv(ctx.uv_start + i);
            *sample = sample_feature(&depth_image, pixel.x, pixel.y, d, uv, bg_depth);
        }

        let mut lr_base = 0usize;
        for &sample in samples.iter() {
            for t in 0..n_thresholds {
                let side = if sample < ctx.bank.threshold(t) { 0 } else { 1 };
                lr_histograms[lr_base + side * n_labels + label] += 1;
                lr_base += n_labels * 2;
            }
        }
    }
}

#[inline]
fn corpus_depth(depth_image: &ndarray::ArrayView2<'_, half::f16>, pixel: SamplePixel) -> f32 {
    f32::from(depth_image[(pixel.y as usize, pixel.x as usize)])
}

/// Scan the slab for the best-gain split of this worker's slice.
fn scan_candidates(
    ctx: &WorkerCtx<'_>,
    parent_sums: HistogramSums,
    parent_entropy: f32,
    lr_histograms: &[u32],
    nhistogram: &mut [f32],
) -> SplitOutcome {
    let n_labels = ctx.corpus.n_labels() as usize;
    let n_thresholds = ctx.bank.n_thresholds();
    let mut best = SplitOutcome::none();

    let mut lr_base = 0usize;
    'uv: for uv in ctx.uv_start..ctx.uv_end {
        for threshold in 0..n_thresholds {
            if ctx.shared.interrupted() {
                break 'uv;
            }
            let base = lr_base;
            lr_base += n_labels * 2;

            let left = &lr_histograms[base..base + n_labels];
            let l_sums = normalize_histogram(left, nhistogram);
            // Degenerate splits leave one side empty; skip them.
            if l_sums.total == 0 || l_sums.total == parent_sums.total {
                continue;
            }
            let l_entropy = shannon_entropy(nhistogram);

            let right = &lr_histograms[base + n_labels..base + 2 * n_labels];
            let r_sums = normalize_histogram(right, nhistogram);
            let r_entropy = shannon_entropy(nhistogram);

            let gain = information_gain(
                parent_entropy,
                parent_sums.total,
                l_entropy,
                l_sums.total,
                r_entropy,
                r_sums.total,
            );

            if gain > best.gain {
                best = SplitOutcome {
                    gain,
                    uv,
                    threshold,
                    n_left: l_sums.total,
                    n_right: r_sums.total,
                };
            }
        }
    }

    best
}
