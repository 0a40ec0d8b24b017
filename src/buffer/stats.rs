//! Buffer access statistics.

use serde::Serialize;
use std::fmt;

/// Counters accumulated by the buffer pool.
///
/// Accounting rules:
/// - every `get` counts one logical read;
/// - a `get` that finds the page resident counts a hit (even when the page
///   is already fixed and the call fails), otherwise a miss plus one
///   physical read once the page comes off disk;
/// - `unfix(dirty = true)` counts one logical write;
/// - each dirty frame actually written during eviction or file release
///   counts one physical write.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct BufferStats {
    pub logical_reads: u64,
    pub logical_writes: u64,
    pub physical_reads: u64,
    pub physical_writes: u64,
    pub buffer_hits: u64,
    pub buffer_misses: u64,
}

impl BufferStats {
    /// Fraction of page requests satisfied from the pool, 0.0 when there
    /// have been no requests.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.buffer_hits + self.buffer_misses;
        if total == 0 {
            0.0
        } else {
            self.buffer_hits as f64 / total as f64
        }
    }
}

impl fmt::Display for BufferStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Logical Reads:   {:10}", self.logical_reads)?;
        writeln!(f, "Logical Writes:  {:10}", self.logical_writes)?;
        writeln!(f, "Physical Reads:  {:10}", self.physical_reads)?;
        writeln!(f, "Physical Writes: {:10}", self.physical_writes)?;
        writeln!(f, "Buffer Hits:     {:10}", self.buffer_hits)?;
        writeln!(f, "Buffer Misses:   {:10}", self.buffer_misses)?;
        write!(f, "Hit Ratio:       {:9.2}%", self.hit_ratio() * 100.0)
    }
}
