//! B+ tree secondary index over fixed-width character keys.
//!
//! Three ways to populate an index share one on-disk format: online
//! insertion and scan-and-insert both go through [`Index::insert_entry`],
//! while [`Index::bulk_load`] constructs the tree bottom-up from the full
//! entry set without touching the insert path at all.

mod bulk;
pub mod node;
mod scan;
mod tree;

pub use scan::{IndexScan, ScanOp};
pub use tree::{index_path, Index, MAX_ATTR_LEN};
