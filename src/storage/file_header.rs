//! Paged-file header.
//!
//! The first 4 KiB of every paged file hold metadata about the file itself;
//! data pages start right after it.

use crate::error::{Result, StorageError};
use crate::types::{PageId, PAGE_SIZE};

/// Magic bytes to identify a valid paged file
pub const MAGIC: &[u8; 16] = b"PagedStorageV01\0";

/// Paged-file header
///
/// Layout (little-endian):
/// ```text
/// Offset  Size  Description
/// 0       16    Magic string "PagedStorageV01\0"
/// 16      4     Page size (currently always 4096)
/// 20      4     Number of data pages
/// 24      4     First page in the free list (-1 if none)
/// 28      4     Free page count
/// 32      4     Checksum of header (CRC32)
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FileHeader {
    /// Page size in bytes
    pub page_size: u32,
    /// Number of data pages in the file (the header region not included)
    pub page_count: i32,
    /// Head of the disposed-page list, [`PageId::NONE`] when empty
    pub first_free_page: PageId,
    /// Number of disposed pages awaiting reuse
    pub free_page_count: u32,
}

impl FileHeader {
    /// Header for a freshly created, empty file
    pub fn new() -> Self {
        Self {
            page_size: PAGE_SIZE as u32,
            page_count: 0,
            first_free_page: PageId::NONE,
            free_page_count: 0,
        }
    }

    /// Read and validate a file header from bytes
    pub fn read(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 36 {
            return Err(StorageError::HdrRead("header too short".into()));
        }

        if &bytes[0..16] != MAGIC {
            return Err(StorageError::invalid_db("invalid magic bytes"));
        }

        let page_size = u32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
        let page_count = i32::from_le_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
        let first_free_page = i32::from_le_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]);
        let free_page_count = u32::from_le_bytes([bytes[28], bytes[29], bytes[30], bytes[31]]);

        let stored_checksum = u32::from_le_bytes([bytes[32], bytes[33], bytes[34], bytes[35]]);
        let computed_checksum = crc32fast::hash(&bytes[0..32]);
        if stored_checksum != computed_checksum {
            return Err(StorageError::corruption("header checksum mismatch"));
        }

        if page_size != PAGE_SIZE as u32 {
            return Err(StorageError::invalid_db(format!(
                "unsupported page size: {} (expected {})",
                page_size, PAGE_SIZE
            )));
        }

        Ok(Self {
            page_size,
            page_count,
            first_free_page: PageId::new(first_free_page),
            free_page_count,
        })
    }

    /// Write this header to the start of a header page
    pub fn write(&self, bytes: &mut [u8]) {
        bytes[..PAGE_SIZE].fill(0);

        bytes[0..16].copy_from_slice(MAGIC);
        bytes[16..20].copy_from_slice(&self.page_size.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.page_count.to_le_bytes());
        bytes[24..28].copy_from_slice(&self.first_free_page.value().to_le_bytes());
        bytes[28..32].copy_from_slice(&self.free_page_count.to_le_bytes());

        let checksum = crc32fast::hash(&bytes[0..32]);
        bytes[32..36].copy_from_slice(&checksum.to_le_bytes());
    }

    /// Hand out the next fresh page number
    pub fn allocate_page(&mut self) -> PageId {
        let page = PageId::new(self.page_count);
        self.page_count += 1;
        page
    }
}

impl Default for FileHeader {
    fn default() -> Self {
        Self::new()
    }
}
