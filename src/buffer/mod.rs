//! Buffer pool: pinnable page cache with pluggable replacement.
//!
//! The pool caches a fixed number of 4 KiB page frames and is the only
//! component that performs disk I/O, through a caller-supplied [`PageIo`].
//! Frames are pinned by `get`/`alloc_page` and released by `unfix`; eviction
//! follows the configured [`ReplacementStrategy`] and every access is
//! tallied in [`BufferStats`].

mod pool;
mod replacement;
mod stats;

pub use pool::{BufferPool, PageIo};
pub use replacement::ReplacementStrategy;
pub use stats::BufferStats;
