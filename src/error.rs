//! Error types for the storage engine.

use crate::types::{FileId, PageId};
use thiserror::Error;

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur in the storage engine
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error from the underlying file system
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Every frame in the buffer pool is fixed
    #[error("No buffer available: all frames are fixed")]
    NoBuf,

    /// The page is already fixed in the buffer
    #[error("Page {fd}:{page} is already fixed")]
    PageFixed { fd: FileId, page: PageId },

    /// The page to be unfixed is not fixed
    #[error("Page {fd}:{page} is already unfixed")]
    PageUnfixed { fd: FileId, page: PageId },

    /// A page to be allocated is already resident in the buffer
    #[error("Page {fd}:{page} is already in the buffer")]
    PageInBuf { fd: FileId, page: PageId },

    /// The page is not resident in the buffer
    #[error("Page {fd}:{page} is not in the buffer")]
    PageNotInBuf { fd: FileId, page: PageId },

    /// The page number is out of range for the file
    #[error("Invalid page number {page} (file has {page_count} pages)")]
    InvalidPage { page: PageId, page_count: i32 },

    /// The file descriptor does not refer to an open file
    #[error("Invalid file descriptor {0}")]
    InvalidFd(FileId),

    /// The file is already open
    #[error("File already open: {0}")]
    FileOpen(String),

    /// Not enough free space in the page for the record
    #[error("No space in page: need {needed} bytes but only {available} available")]
    NoSpace { needed: usize, available: usize },

    /// The slot index does not refer to a live record
    #[error("Invalid slot {slot} (page has {num_slots} slots)")]
    InvalidSlot { slot: i32, num_slots: i32 },

    /// Fewer bytes than a full page came back from a read
    #[error("Incomplete read of page {page}: got {got} of {PAGE_SIZE} bytes", PAGE_SIZE = crate::types::PAGE_SIZE)]
    IncompleteRead { page: PageId, got: usize },

    /// Fewer bytes than a full page went out on a write
    #[error("Incomplete write of page {page}: wrote {wrote} of {PAGE_SIZE} bytes", PAGE_SIZE = crate::types::PAGE_SIZE)]
    IncompleteWrite { page: PageId, wrote: usize },

    /// Failed to read the file header
    #[error("Failed to read file header: {0}")]
    HdrRead(String),

    /// Failed to write the file header
    #[error("Failed to write file header: {0}")]
    HdrWrite(String),

    /// Data corruption detected (e.g., checksum mismatch)
    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// File is not a valid paged file
    #[error("Invalid database file: {0}")]
    InvalidDatabaseFile(String),

    /// Key length does not match the index attribute length
    #[error("Invalid key length: {got} bytes (index attribute is {expected})")]
    InvalidKeyLength { got: usize, expected: usize },

    /// Index attribute length out of the supported range
    #[error("Invalid attribute length: {0}")]
    InvalidAttrLength(usize),

    /// Bulk-loading requires an index with no entries
    #[error("Index is not empty")]
    IndexNotEmpty,
}

impl StorageError {
    /// Create a corruption error with a message
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::Corruption(msg.into())
    }

    /// Create an invalid database file error
    pub fn invalid_db(msg: impl Into<String>) -> Self {
        Self::InvalidDatabaseFile(msg.into())
    }
}
