//! Slotted page implementation.
//!
//! A slotted page uses the following layout:
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │              Page Header (32 bytes)                │
//! ├────────────────────────────────────────────────────┤
//! │                 Slot Directory                     │
//! │  [(off,len)][(off,len)]...      →                  │
//! ├────────────────────────────────────────────────────┤
//! │                                                    │
//! │                   Free Space                       │
//! │                                                    │
//! ├────────────────────────────────────────────────────┤
//! │                 Record Content                     │
//! │      ←  [rec2][rec1][rec0]                         │
//! └────────────────────────────────────────────────────┘
//! ```
//!
//! Slots keep the index they were assigned at insert time; deleting a record
//! zeroes its slot entry (a tombstone) and leaves the record bytes behind as
//! fragmentation until [`SlottedPage::compact`] runs.

use crate::error::{Result, StorageError};
use crate::types::{PageId, PAGE_SIZE};

/// Size of the fixed page header
pub const SP_HEADER_SIZE: usize = 32;

/// Size of one slot directory entry: `(offset: i16, length: i16)`
pub const SP_SLOT_SIZE: usize = 4;

// Header field offsets, all little-endian. Bytes 18..32 are reserved.
const OFF_PAGE_ID: usize = 0;
const OFF_NUM_SLOTS: usize = 4;
const OFF_FREE_OFFSET: usize = 6;
const OFF_FREE_SIZE: usize = 8;
const OFF_NEXT_PAGE: usize = 10;
const OFF_PREV_PAGE: usize = 14;

/// A view over one 4 KiB page buffer, interpreting it as a slotted page.
///
/// The buffer is supplied by the caller, typically a page pinned in the
/// buffer pool. The view does not own the bytes and writes through to them
/// directly.
pub struct SlottedPage<'a> {
    data: &'a mut [u8],
}

impl<'a> SlottedPage<'a> {
    /// Wrap a page buffer. The buffer must be at least [`PAGE_SIZE`] bytes.
    pub fn new(data: &'a mut [u8]) -> Self {
        debug_assert!(data.len() >= PAGE_SIZE);
        Self { data }
    }

    /// Initialize an empty slotted page with the given page number.
    pub fn init(&mut self, page_id: i32) {
        self.data[..SP_HEADER_SIZE].fill(0);
        self.put_i32(OFF_PAGE_ID, page_id);
        self.put_i16(OFF_NUM_SLOTS, 0);
        self.put_i16(OFF_FREE_OFFSET, PAGE_SIZE as i16);
        self.put_i16(OFF_FREE_SIZE, (PAGE_SIZE - SP_HEADER_SIZE) as i16);
        self.put_i32(OFF_NEXT_PAGE, PageId::NONE.value());
        self.put_i32(OFF_PREV_PAGE, PageId::NONE.value());
    }

    /// The page number recorded in the header
    pub fn page_id(&self) -> i32 {
        self.get_i32(OFF_PAGE_ID)
    }

    /// Number of slot directory entries, tombstones included
    pub fn num_slots(&self) -> i32 {
        self.get_i16(OFF_NUM_SLOTS) as i32
    }

    /// Free space in bytes as tracked by the header.
    ///
    /// Includes fragmented holes left by deletions, so a record of this size
    /// is not guaranteed to fit without compaction.
    pub fn free_space(&self) -> usize {
        self.get_i16(OFF_FREE_SIZE) as usize
    }

    /// Contiguous free bytes between the slot directory and the record
    /// area. Unlike [`SlottedPage::free_space`] this excludes fragmented
    /// holes, so it is what a record can actually be placed into.
    pub fn contiguous_free(&self) -> usize {
        let dir_end = SP_HEADER_SIZE + self.num_slots() as usize * SP_SLOT_SIZE;
        (self.get_i16(OFF_FREE_OFFSET) as usize).saturating_sub(dir_end)
    }

    /// Next page in the file's page chain
    pub fn next_page(&self) -> PageId {
        PageId(self.get_i32(OFF_NEXT_PAGE))
    }

    /// Link the next page in the file's page chain
    pub fn set_next_page(&mut self, page: PageId) {
        self.put_i32(OFF_NEXT_PAGE, page.value());
    }

    /// Previous page in the file's page chain
    pub fn prev_page(&self) -> PageId {
        PageId(self.get_i32(OFF_PREV_PAGE))
    }

    /// Link the previous page in the file's page chain
    pub fn set_prev_page(&mut self, page: PageId) {
        self.put_i32(OFF_PREV_PAGE, page.value());
    }

    /// Insert a record, returning the slot index it was assigned.
    ///
    /// The first tombstoned slot is reused if one exists; otherwise a new
    /// slot is appended. The slot-entry cost of 4 bytes is charged on every
    /// insert, including tombstone reuse, so the space accounting never
    /// double-counts a reused entry.
    pub fn insert(&mut self, record: &[u8]) -> Result<i32> {
        let needed = record.len() + SP_SLOT_SIZE;
        let available = self.free_space();
        if needed > available {
            return Err(StorageError::NoSpace { needed, available });
        }

        let num_slots = self.num_slots();
        let mut slot_idx = None;
        for i in 0..num_slots {
            if self.slot_entry(i) == (0, 0) {
                slot_idx = Some(i);
                break;
            }
        }
        let (slot_idx, num_slots) = match slot_idx {
            Some(i) => (i, num_slots),
            None => (num_slots, num_slots + 1),
        };

        // The header tally includes fragmented holes; the contiguous region
        // between directory and record area is what the record actually
        // needs to fit into.
        let free_offset = self.get_i16(OFF_FREE_OFFSET) as usize;
        let dir_end = SP_HEADER_SIZE + num_slots as usize * SP_SLOT_SIZE;
        if free_offset < dir_end + record.len() {
            return Err(StorageError::NoSpace {
                needed,
                available: free_offset.saturating_sub(dir_end),
            });
        }

        let new_offset = free_offset - record.len();
        self.data[new_offset..free_offset].copy_from_slice(record);
        self.put_i16(OFF_NUM_SLOTS, num_slots as i16);
        self.set_slot_entry(slot_idx, new_offset as i16, record.len() as i16);
        self.put_i16(OFF_FREE_OFFSET, new_offset as i16);
        self.put_i16(OFF_FREE_SIZE, (available - needed) as i16);

        Ok(slot_idx)
    }

    /// Tombstone the record in the given slot.
    ///
    /// Only the record length is refunded to the free-space tally; the slot
    /// entry stays allocated so the index can be reused.
    pub fn delete(&mut self, slot: i32) -> Result<()> {
        let num_slots = self.num_slots();
        if slot < 0 || slot >= num_slots {
            return Err(StorageError::InvalidSlot { slot, num_slots });
        }
        let (offset, length) = self.slot_entry(slot);
        if offset == 0 {
            return Err(StorageError::InvalidSlot { slot, num_slots });
        }

        self.set_slot_entry(slot, 0, 0);
        let free = self.get_i16(OFF_FREE_SIZE) + length;
        self.put_i16(OFF_FREE_SIZE, free);
        Ok(())
    }

    /// Get the record in the given slot as a borrowed byte slice.
    pub fn get(&self, slot: i32) -> Result<&[u8]> {
        let num_slots = self.num_slots();
        if slot < 0 || slot >= num_slots {
            return Err(StorageError::InvalidSlot { slot, num_slots });
        }
        let (offset, length) = self.slot_entry(slot);
        if offset == 0 {
            return Err(StorageError::InvalidSlot { slot, num_slots });
        }
        let start = offset as usize;
        Ok(&self.data[start..start + length as usize])
    }

    /// Rewrite the page with all live records packed at the end and slots
    /// renumbered densely from 0.
    ///
    /// This removes every tombstone and reclaims fragmented space, but it
    /// also invalidates any [`crate::types::RecordId`] held outside the page:
    /// record `k` of the surviving slots lands in slot `k` regardless of the
    /// index it occupied before. Callers that hand out record ids must not
    /// compact while those ids are live.
    pub fn compact(&mut self) {
        let snapshot = self.data[..PAGE_SIZE].to_vec();
        let page_id = self.page_id();
        let next = self.next_page();
        let prev = self.prev_page();

        self.init(page_id);
        self.set_next_page(next);
        self.set_prev_page(prev);

        let old = SnapshotView { data: &snapshot };
        let mut new_offset = PAGE_SIZE;
        let mut live = 0i32;
        for i in 0..old.num_slots() {
            let (offset, length) = old.slot_entry(i);
            if offset == 0 {
                continue;
            }
            let len = length as usize;
            new_offset -= len;
            self.data[new_offset..new_offset + len]
                .copy_from_slice(&snapshot[offset as usize..offset as usize + len]);
            self.set_slot_entry(live, new_offset as i16, length);
            live += 1;
        }

        self.put_i16(OFF_NUM_SLOTS, live as i16);
        self.put_i16(OFF_FREE_OFFSET, new_offset as i16);
        let free = new_offset - SP_HEADER_SIZE - live as usize * SP_SLOT_SIZE;
        self.put_i16(OFF_FREE_SIZE, free as i16);
    }

    /// Slot directory entry `(offset, length)` for the given index.
    pub(crate) fn slot_entry(&self, slot: i32) -> (i16, i16) {
        let base = SP_HEADER_SIZE + slot as usize * SP_SLOT_SIZE;
        let offset = i16::from_le_bytes([self.data[base], self.data[base + 1]]);
        let length = i16::from_le_bytes([self.data[base + 2], self.data[base + 3]]);
        (offset, length)
    }

    fn set_slot_entry(&mut self, slot: i32, offset: i16, length: i16) {
        let base = SP_HEADER_SIZE + slot as usize * SP_SLOT_SIZE;
        self.data[base..base + 2].copy_from_slice(&offset.to_le_bytes());
        self.data[base + 2..base + 4].copy_from_slice(&length.to_le_bytes());
    }

    fn get_i16(&self, at: usize) -> i16 {
        i16::from_le_bytes([self.data[at], self.data[at + 1]])
    }

    fn put_i16(&mut self, at: usize, v: i16) {
        self.data[at..at + 2].copy_from_slice(&v.to_le_bytes());
    }

    fn get_i32(&self, at: usize) -> i32 {
        i32::from_le_bytes([
            self.data[at],
            self.data[at + 1],
            self.data[at + 2],
            self.data[at + 3],
        ])
    }

    fn put_i32(&mut self, at: usize, v: i32) {
        self.data[at..at + 4].copy_from_slice(&v.to_le_bytes());
    }
}

// Read-only view of the pre-compaction snapshot.
struct SnapshotView<'a> {
    data: &'a [u8],
}

impl SnapshotView<'_> {
    fn num_slots(&self) -> i32 {
        i16::from_le_bytes([self.data[OFF_NUM_SLOTS], self.data[OFF_NUM_SLOTS + 1]]) as i32
    }

    fn slot_entry(&self, slot: i32) -> (i16, i16) {
        let base = SP_HEADER_SIZE + slot as usize * SP_SLOT_SIZE;
        let offset = i16::from_le_bytes([self.data[base], self.data[base + 1]]);
        let length = i16::from_le_bytes([self.data[base + 2], self.data[base + 3]]);
        (offset, length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageBuf;

    fn fresh_page(buf: &mut PageBuf) -> SlottedPage<'_> {
        let mut page = SlottedPage::new(buf.as_bytes_mut());
        page.init(0);
        page
    }

    #[test]
    fn test_init() {
        let mut buf = PageBuf::new();
        let page = fresh_page(&mut buf);
        assert_eq!(page.num_slots(), 0);
        assert_eq!(page.free_space(), PAGE_SIZE - SP_HEADER_SIZE);
        assert_eq!(page.next_page(), PageId::NONE);
        assert_eq!(page.prev_page(), PageId::NONE);
    }

    #[test]
    fn test_insert_and_get() {
        let mut buf = PageBuf::new();
        let mut page = fresh_page(&mut buf);

        assert_eq!(page.insert(b"a").unwrap(), 0);
        assert_eq!(page.insert(b"bb").unwrap(), 1);
        assert_eq!(page.insert(b"ccc").unwrap(), 2);

        assert_eq!(page.get(0).unwrap(), b"a");
        assert_eq!(page.get(1).unwrap(), b"bb");
        assert_eq!(page.get(2).unwrap(), b"ccc");

        // 4096 - 32 - 3 slots - 6 record bytes
        assert_eq!(page.free_space(), 4046);
    }

    #[test]
    fn test_delete_and_tombstone_reuse() {
        let mut buf = PageBuf::new();
        let mut page = fresh_page(&mut buf);

        page.insert(b"a").unwrap();
        page.insert(b"bb").unwrap();
        page.insert(b"ccc").unwrap();

        page.delete(1).unwrap();
        // Only the record length comes back; the slot entry stays paid for.
        assert_eq!(page.free_space(), 4048);
        assert!(matches!(
            page.get(1),
            Err(StorageError::InvalidSlot { slot: 1, .. })
        ));
        assert!(matches!(page.delete(1), Err(StorageError::InvalidSlot { .. })));

        // The tombstoned index is handed out again.
        assert_eq!(page.insert(b"dd").unwrap(), 1);
        assert_eq!(page.get(1).unwrap(), b"dd");
        assert_eq!(page.num_slots(), 3);
    }

    #[test]
    fn test_delete_out_of_range() {
        let mut buf = PageBuf::new();
        let mut page = fresh_page(&mut buf);
        page.insert(b"x").unwrap();
        assert!(matches!(page.delete(5), Err(StorageError::InvalidSlot { .. })));
        assert!(matches!(page.get(-1), Err(StorageError::InvalidSlot { .. })));
    }

    #[test]
    fn test_compact_renumbers_slots() {
        let mut buf = PageBuf::new();
        let mut page = fresh_page(&mut buf);

        page.insert(b"a").unwrap();
        page.insert(b"bb").unwrap();
        page.insert(b"ccc").unwrap();
        page.delete(1).unwrap();

        page.compact();

        assert_eq!(page.num_slots(), 2);
        assert_eq!(page.get(0).unwrap(), b"a");
        assert_eq!(page.get(1).unwrap(), b"ccc");
        // All fragmentation reclaimed: 4096 - 32 - 2 slots - 4 record bytes.
        assert_eq!(page.free_space(), 4052);
    }

    #[test]
    fn test_compact_preserves_chain_links() {
        let mut buf = PageBuf::new();
        let mut page = fresh_page(&mut buf);
        page.set_next_page(PageId::new(7));
        page.set_prev_page(PageId::new(5));
        page.insert(b"rec").unwrap();

        page.compact();

        assert_eq!(page.next_page(), PageId::new(7));
        assert_eq!(page.prev_page(), PageId::new(5));
        assert_eq!(page.get(0).unwrap(), b"rec");
    }

    #[test]
    fn test_insert_exactly_fills_page() {
        let mut buf = PageBuf::new();
        let mut page = fresh_page(&mut buf);

        let record = vec![0x5a; PAGE_SIZE - SP_HEADER_SIZE - SP_SLOT_SIZE];
        page.insert(&record).unwrap();
        assert_eq!(page.free_space(), 0);
        assert!(matches!(page.insert(b""), Err(StorageError::NoSpace { .. })));
    }

    #[test]
    fn test_insert_one_byte_too_large() {
        let mut buf = PageBuf::new();
        let mut page = fresh_page(&mut buf);

        let record = vec![0x5a; PAGE_SIZE - SP_HEADER_SIZE - SP_SLOT_SIZE + 1];
        assert!(matches!(
            page.insert(&record),
            Err(StorageError::NoSpace { .. })
        ));
    }

    #[test]
    fn test_space_invariants_across_mutations() {
        let mut buf = PageBuf::new();
        let mut page = fresh_page(&mut buf);

        for i in 0..40 {
            let rec = vec![i as u8; 1 + (i % 17)];
            page.insert(&rec).unwrap();
        }
        for slot in (0..40).step_by(3) {
            page.delete(slot).unwrap();
        }

        check_invariants(&page);
        page.compact();
        check_invariants(&page);
    }

    #[test]
    fn test_compact_preserves_record_multiset() {
        let mut buf = PageBuf::new();
        let mut page = fresh_page(&mut buf);

        for i in 0..20 {
            page.insert(format!("record-{i:02}").as_bytes()).unwrap();
        }
        for slot in [1, 4, 9, 16] {
            page.delete(slot).unwrap();
        }

        let mut before = live_records(&page);
        page.compact();
        let mut after = live_records(&page);

        before.sort();
        after.sort();
        assert_eq!(before, after);

        // No tombstones survive compaction.
        for slot in 0..page.num_slots() {
            assert_ne!(page.slot_entry(slot), (0, 0));
        }
    }

    fn live_records(page: &SlottedPage<'_>) -> Vec<Vec<u8>> {
        (0..page.num_slots())
            .filter_map(|s| page.get(s).ok().map(|r| r.to_vec()))
            .collect()
    }

    fn check_invariants(page: &SlottedPage<'_>) {
        let num_slots = page.num_slots() as usize;
        let dir_end = SP_HEADER_SIZE + num_slots * SP_SLOT_SIZE;
        let mut ranges: Vec<(usize, usize)> = Vec::new();

        for slot in 0..page.num_slots() {
            let (offset, length) = page.slot_entry(slot);
            if offset == 0 {
                continue;
            }
            let (start, end) = (offset as usize, offset as usize + length as usize);
            assert!(start >= dir_end);
            assert!(end <= PAGE_SIZE);
            ranges.push((start, end));
        }

        ranges.sort();
        for pair in ranges.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "live records overlap");
        }
    }
}
