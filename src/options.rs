//! Options recognized by the public entry points (spec §6).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Clustering similarity cutoff used by Stage B refinement.
    pub threshold: f64,
    /// Max lines used for learning; `None` means all.
    pub sample_size: Option<usize>,
    pub use_mmap: bool,
    pub detect_types: bool,
    pub window_size: usize,
    pub change_threshold: f64,
    pub num_workers: usize,
    pub chunk_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            threshold: 0.7,
            sample_size: None,
            use_mmap: true,
            detect_types: true,
            window_size: 100,
            change_threshold: 0.5,
            num_workers: num_cpus_fallback(),
            chunk_size: 1000,
        }
    }
}

/// A dependency-free worker-count guess; the real core never needs to
/// be precise here, only non-zero.
fn num_cpus_fallback() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
