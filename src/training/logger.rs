//! Plain-text training progress output.

use std::path::Path;
use std::time::Instant;

use crate::feature::UvPair;

/// How chatty training is on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// No output at all.
    Silent,
    /// Per-depth progress, checkpoint and output notices.
    #[default]
    Info,
    /// Additionally log every split and leaf decision.
    Verbose,
}

/// Formats a duration as `HH:MM:SS`.
struct Elapsed {
    hours: u64,
    minutes: u64,
    seconds: u64,
}

impl Elapsed {
    fn since(instant: Instant) -> Self {
        let total = instant.elapsed().as_secs();
        Self {
            hours: total / 3600,
            minutes: (total % 3600) / 60,
            seconds: total % 60,
        }
    }
}

impl std::fmt::Display for Elapsed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

/// Progress logger with two clocks: time since training began and time
/// since the previous logged milestone.
pub struct TrainingLogger {
    verbosity: Verbosity,
    begin: Instant,
    last: Instant,
}

impl TrainingLogger {
    pub fn new(verbosity: Verbosity) -> Self {
        let now = Instant::now();
        Self {
            verbosity,
            begin: now,
            last: now,
        }
    }

    #[inline]
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    fn stamp(&mut self) -> (Elapsed, Elapsed) {
        let stamps = (Elapsed::since(self.begin), Elapsed::since(self.last));
        self.last = Instant::now();
        stamps
    }

    pub fn preparing_metadata(&self) {
        if self.verbosity >= Verbosity::Info {
            eprintln!("Preparing training metadata...");
        }
    }

    pub fn starting_threads(&self, n_threads: usize) {
        if self.verbosity >= Verbosity::Info {
            eprintln!("Initialising {n_threads} threads...");
        }
    }

    pub fn restoring_checkpoint(&self) {
        if self.verbosity >= Verbosity::Info {
            eprintln!("Restoring checkpoint...");
        }
    }

    pub fn begin_training(&mut self) {
        if self.verbosity >= Verbosity::Info {
            eprintln!("Beginning training...");
        }
        let now = Instant::now();
        self.begin = now;
        self.last = now;
    }

    /// Logged once per depth transition of the pending queue head.
    pub fn depth_transition(&mut self, depth: usize, n_nodes: usize) {
        if self.verbosity < Verbosity::Info {
            return;
        }
        let (since_begin, since_last) = self.stamp();
        eprintln!(
            "({since_begin} / {since_last}) Training depth {} ({n_nodes} nodes)",
            depth + 1
        );
    }

    pub fn split_node(&self, id: usize, gain: f32, uv: UvPair, t: f32) {
        if self.verbosity < Verbosity::Verbose {
            return;
        }
        eprintln!("  Node ({id})");
        eprintln!("    Gain: {gain}");
        eprintln!("    U: ({}, {})", uv.u[0], uv.u[1]);
        eprintln!("    V: ({}, {})", uv.v[0], uv.v[1]);
        eprintln!("    T: {t}");
    }

    pub fn leaf_node(&self, id: usize, nhistogram: &[f32]) {
        if self.verbosity < Verbosity::Verbose {
            return;
        }
        eprintln!("  Leaf node ({id})");
        for (label, &p) in nhistogram.iter().enumerate() {
            if p > 0.0 {
                eprintln!("    {label:02} - {p}");
            }
        }
    }

    pub fn interrupted(&self) {
        if self.verbosity >= Verbosity::Info {
            eprintln!("Stopping training due to user-triggered interrupt");
        }
    }

    pub fn writing_output(&mut self, path: &Path) {
        if self.verbosity < Verbosity::Info {
            return;
        }
        let (since_begin, since_last) = self.stamp();
        eprintln!(
            "({since_begin} / {since_last}) Writing output to '{}'...",
            path.display()
        );
    }

    pub fn finished(&mut self, interrupted: bool) {
        if self.verbosity < Verbosity::Info {
            return;
        }
        let (since_begin, since_last) = self.stamp();
        let outcome = if interrupted { "Interrupted!" } else { "Done!" };
        eprintln!("({since_begin} / {since_last}) {outcome}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_ordering() {
        assert!(Verbosity::Silent < Verbosity::Info);
        assert!(Verbosity::Info < Verbosity::Verbose);
        assert_eq!(Verbosity::default(), Verbosity::Info);
    }

    #[test]
    fn elapsed_formats_as_clock() {
        let e = Elapsed {
            hours: 1,
            minutes: 2,
            seconds: 3,
        };
        assert_eq!(e.to_string(), "01:02:03");
    }
}
