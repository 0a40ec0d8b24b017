//! Sequential scan over every live record in a paged file.

use crate::error::Result;
use crate::page::{PageBuf, SlottedPage};
use crate::storage::PagedFileManager;
use crate::types::{FileId, PageId, RecordId};

/// Iterates `(page, slot)` positions across a whole file of slotted pages,
/// yielding each live record together with its [`RecordId`].
///
/// Pages are fetched through the buffer pool one at a time and copied out,
/// so no pin is held between calls to [`RecordScan::next`]. Dropping the
/// scan closes it.
pub struct RecordScan {
    fd: FileId,
    total_pages: i32,
    curr_page: i32,
    curr_slot: i32,
    page: Option<PageBuf>,
}

impl RecordScan {
    /// Open a scan over all data pages of `fd`.
    pub fn open(mgr: &mut PagedFileManager, fd: FileId) -> Result<Self> {
        Ok(Self {
            fd,
            total_pages: mgr.num_pages(fd)?,
            curr_page: 0,
            curr_slot: 0,
            page: None,
        })
    }

    /// Produce the next live record, or `None` at end of file.
    pub fn next(&mut self, mgr: &mut PagedFileManager) -> Result<Option<(Vec<u8>, RecordId)>> {
        loop {
            if self.curr_page >= self.total_pages {
                return Ok(None);
            }

            if self.page.is_none() {
                let guard = mgr.get_this_page(self.fd, PageId::new(self.curr_page))?;
                let copy = PageBuf::from_bytes(guard.bytes()?);
                guard.unfix()?;
                self.page = Some(copy);
            }
            let Some(buf) = self.page.as_mut() else {
                continue;
            };

            let page = SlottedPage::new(buf.as_bytes_mut());
            while self.curr_slot < page.num_slots() {
                let slot = self.curr_slot;
                self.curr_slot += 1;
                if let Ok(record) = page.get(slot) {
                    let rid = RecordId::new(self.curr_page, slot);
                    return Ok(Some((record.to_vec(), rid)));
                }
            }

            self.curr_page += 1;
            self.curr_slot = 0;
            self.page = None;
        }
    }
}
