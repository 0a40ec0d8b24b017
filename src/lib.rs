//! # Paged Storage Engine
//!
//! A small relational storage engine built from three layered services:
//!
//! - **Buffer Pool** (`buffer`): pinnable page cache with LRU/MRU
//!   replacement and instrumented hit/miss accounting
//! - **Storage Layer** (`storage`): paged files behind integer descriptors,
//!   all I/O routed through the shared pool
//! - **Page Layer** (`page`): slotted pages for variable-length records,
//!   with tombstoning and compaction
//! - **B+ Tree Layer** (`btree`): a secondary index buildable online or by
//!   sorted bottom-up bulk-load
//!
//! A thin record-file facade (`record`) ties the page layer to a concrete
//! record schema and drives file scans.
//!
//! The engine is single-threaded and assumes exclusive access; pages are
//! written back on eviction and at file close, nothing more.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use paged_storage::{Index, PagedFileManager, RecordFile, ScanOp};
//!
//! let mut mgr = PagedFileManager::new(20);
//!
//! RecordFile::create(&mut mgr, "students.rf")?;
//! let mut file = RecordFile::open(&mut mgr, "students.rf")?;
//! let rid = file.insert(&mut mgr, &record)?;
//!
//! Index::create(&mut mgr, "students", 0, 20)?;
//! let mut index = Index::open(&mut mgr, "students", 0)?;
//! index.insert_entry(&mut mgr, key, rid.pack())?;
//!
//! let mut scan = index.open_scan(&mut mgr, ScanOp::GreaterOrEqual, key)?;
//! while let Some((key, rec_id)) = scan.find_next(&index, &mut mgr)? {
//!     // ...
//! }
//! ```

pub mod btree;
pub mod buffer;
pub mod error;
pub mod page;
pub mod record;
pub mod storage;
pub mod types;

pub use error::{Result, StorageError};
pub use types::{FileId, PageId, RecordId, DEFAULT_BUF_CAPACITY, PAGE_SIZE};

// Re-export the main public API
pub use btree::{Index, IndexScan, ScanOp};
pub use buffer::{BufferPool, BufferStats, PageIo, ReplacementStrategy};
pub use page::{RecordScan, SlottedPage};
pub use record::{RecordFile, SpaceStats, StudentRecord};
pub use storage::{PageGuard, PagedFileManager};
