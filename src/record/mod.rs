//! Record-file facade: a student-record store over the slotted-page layer.
//!
//! Thin by design. Records serialize to `;`-delimited bytes, land in slotted
//! pages through first-fit placement, and come back out by [`RecordId`] or
//! through a sequential scan. Everything below the serialization boundary is
//! the page and storage layers' business.

use crate::error::{Result, StorageError};
use crate::page::{RecordScan, SlottedPage};
use crate::storage::PagedFileManager;
use crate::types::{FileId, PageId, RecordId, PAGE_SIZE};
use serde::Serialize;
use std::path::Path;

/// One student record, the fixed schema this facade stores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentRecord {
    pub roll_no: String,
    pub name: String,
    pub batch: String,
    pub degree: String,
    pub dept: String,
    pub join_yr: i32,
    pub categ: String,
    pub sex: String,
    pub father_name: String,
    pub birthdate: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
}

impl StudentRecord {
    /// Serialize to the on-page `;`-delimited form.
    pub fn to_bytes(&self) -> Vec<u8> {
        format!(
            "{};{};{};{};{};{};{};{};{};{};{};{};{};{}",
            self.roll_no,
            self.name,
            self.batch,
            self.degree,
            self.dept,
            self.join_yr,
            self.categ,
            self.sex,
            self.father_name,
            self.birthdate,
            self.address,
            self.city,
            self.state,
            self.pincode
        )
        .into_bytes()
    }

    /// Parse the on-page form back into a record.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| StorageError::corruption("record is not valid UTF-8"))?;
        let mut fields = text.split(';');
        let mut next = || fields.next().unwrap_or("").to_string();

        let (roll_no, name, batch, degree, dept) = (next(), next(), next(), next(), next());
        let join_yr = next().parse::<i32>().unwrap_or(0);
        Ok(Self {
            roll_no,
            name,
            batch,
            degree,
            dept,
            join_yr,
            categ: next(),
            sex: next(),
            father_name: next(),
            birthdate: next(),
            address: next(),
            city: next(),
            state: next(),
            pincode: next(),
        })
    }
}

/// Per-file space accounting, gathered by walking every page.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SpaceStats {
    pub total_pages: i32,
    pub total_space: usize,
    pub used_space: usize,
    pub slot_overhead: usize,
    pub header_overhead: usize,
    pub free_space: usize,
    pub fragmented_space: usize,
    pub utilization_pct: f64,
    pub avg_records_per_page: f64,
}

/// A file of student records stored in chained slotted pages.
pub struct RecordFile {
    fd: FileId,
}

impl RecordFile {
    /// Create an empty record file.
    pub fn create(mgr: &mut PagedFileManager, path: impl AsRef<Path>) -> Result<()> {
        mgr.create_file(path)
    }

    /// Open a record file.
    pub fn open(mgr: &mut PagedFileManager, path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            fd: mgr.open_file(path)?,
        })
    }

    /// Close the file, flushing buffered pages.
    pub fn close(self, mgr: &mut PagedFileManager) -> Result<()> {
        mgr.close_file(self.fd)
    }

    /// The underlying file descriptor
    pub fn fd(&self) -> FileId {
        self.fd
    }

    /// Number of data pages
    pub fn num_pages(&self, mgr: &PagedFileManager) -> Result<i32> {
        mgr.num_pages(self.fd)
    }

    /// Insert a student record, returning where it landed.
    pub fn insert(&mut self, mgr: &mut PagedFileManager, record: &StudentRecord) -> Result<RecordId> {
        self.insert_bytes(mgr, &record.to_bytes())
    }

    /// Insert raw record bytes, first-fit across existing pages, allocating
    /// and chaining a fresh page when nothing has room.
    pub fn insert_bytes(&mut self, mgr: &mut PagedFileManager, record: &[u8]) -> Result<RecordId> {
        let num_pages = mgr.num_pages(self.fd)?;

        for page_num in 0..num_pages {
            let mut guard = mgr.get_this_page(self.fd, PageId::new(page_num))?;
            let mut page = SlottedPage::new(guard.bytes_mut()?);
            match page.insert(record) {
                Ok(slot) => {
                    guard.mark_dirty();
                    guard.unfix()?;
                    return Ok(RecordId::new(page_num, slot));
                }
                Err(StorageError::NoSpace { .. }) => {
                    guard.unfix()?;
                }
                Err(e) => return Err(e),
            }
        }

        // Every existing page is full.
        let (page_num, mut guard) = mgr.alloc_page(self.fd)?;
        let slot = {
            let mut page = SlottedPage::new(guard.bytes_mut()?);
            page.init(page_num.value());
            if num_pages > 0 {
                page.set_prev_page(PageId::new(num_pages - 1));
            }
            page.insert(record)?
        };
        guard.unfix()?;

        if num_pages > 0 {
            let mut prev = mgr.get_this_page(self.fd, PageId::new(num_pages - 1))?;
            SlottedPage::new(prev.bytes_mut()?).set_next_page(page_num);
            prev.mark_dirty();
            prev.unfix()?;
        }

        Ok(RecordId::new(page_num.value(), slot))
    }

    /// Fetch a record by id.
    pub fn get(&self, mgr: &mut PagedFileManager, rid: RecordId) -> Result<StudentRecord> {
        StudentRecord::from_bytes(&self.get_bytes(mgr, rid)?)
    }

    /// Fetch raw record bytes by id.
    pub fn get_bytes(&self, mgr: &mut PagedFileManager, rid: RecordId) -> Result<Vec<u8>> {
        let guard = mgr.get_this_page(self.fd, rid.page())?;
        let bytes = guard.bytes()?;
        let mut view = bytes.to_vec();
        let page = SlottedPage::new(&mut view);
        let record = page.get(rid.slot_num)?.to_vec();
        guard.unfix()?;
        Ok(record)
    }

    /// Delete a record by id, leaving a tombstone in its slot.
    pub fn delete(&mut self, mgr: &mut PagedFileManager, rid: RecordId) -> Result<()> {
        let mut guard = mgr.get_this_page(self.fd, rid.page())?;
        {
            let mut page = SlottedPage::new(guard.bytes_mut()?);
            page.delete(rid.slot_num)?;
        }
        guard.mark_dirty();
        guard.unfix()
    }

    /// Open a sequential scan over every live record.
    pub fn scan(&self, mgr: &mut PagedFileManager) -> Result<RecordFileScan> {
        Ok(RecordFileScan {
            inner: RecordScan::open(mgr, self.fd)?,
        })
    }

    /// Walk every page and total up where the bytes go.
    pub fn space_stats(&self, mgr: &mut PagedFileManager) -> Result<SpaceStats> {
        let total_pages = mgr.num_pages(self.fd)?;
        let mut stats = SpaceStats {
            total_pages,
            total_space: total_pages as usize * PAGE_SIZE,
            header_overhead: total_pages as usize * crate::page::SP_HEADER_SIZE,
            ..SpaceStats::default()
        };

        let mut num_records = 0usize;
        for page_num in 0..total_pages {
            let guard = mgr.get_this_page(self.fd, PageId::new(page_num))?;
            let mut view = guard.bytes()?.to_vec();
            guard.unfix()?;
            let page = SlottedPage::new(&mut view);

            let num_slots = page.num_slots();
            stats.slot_overhead += num_slots as usize * crate::page::SP_SLOT_SIZE;
            stats.free_space += page.free_space();
            stats.fragmented_space += page.free_space().saturating_sub(page.contiguous_free());
            for slot in 0..num_slots {
                if let Ok(record) = page.get(slot) {
                    stats.used_space += record.len();
                    num_records += 1;
                }
            }
        }

        if stats.total_space > 0 {
            stats.utilization_pct = 100.0 * stats.used_space as f64 / stats.total_space as f64;
        }
        if total_pages > 0 {
            stats.avg_records_per_page = num_records as f64 / total_pages as f64;
        }
        Ok(stats)
    }
}

/// Scan over a record file, yielding parsed records.
pub struct RecordFileScan {
    inner: RecordScan,
}

impl RecordFileScan {
    /// Produce the next record, or `None` at end of file.
    pub fn next(&mut self, mgr: &mut PagedFileManager) -> Result<Option<(StudentRecord, RecordId)>> {
        match self.inner.next(mgr)? {
            Some((bytes, rid)) => Ok(Some((StudentRecord::from_bytes(&bytes)?, rid))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn student(i: usize) -> StudentRecord {
        StudentRecord {
            roll_no: format!("CS{i:05}"),
            name: format!("Student {i}"),
            batch: "2024".into(),
            degree: "BTech".into(),
            dept: "CSE".into(),
            join_yr: 2024,
            categ: "GEN".into(),
            sex: "F".into(),
            father_name: format!("Parent {i}"),
            birthdate: "2006-01-01".into(),
            address: format!("{i} Hostel Road"),
            city: "Chennai".into(),
            state: "TN".into(),
            pincode: "600036".into(),
        }
    }

    #[test]
    fn test_record_serialization_roundtrip() {
        let rec = student(42);
        let restored = StudentRecord::from_bytes(&rec.to_bytes()).unwrap();
        assert_eq!(restored, rec);
    }

    #[test]
    fn test_insert_get_delete() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("students.rf");
        let mut mgr = PagedFileManager::new(8);
        RecordFile::create(&mut mgr, &path)?;
        let mut file = RecordFile::open(&mut mgr, &path)?;

        let rid = file.insert(&mut mgr, &student(1))?;
        assert_eq!(rid, RecordId::new(0, 0));
        assert_eq!(file.get(&mut mgr, rid)?, student(1));

        file.delete(&mut mgr, rid)?;
        assert!(matches!(
            file.get(&mut mgr, rid),
            Err(StorageError::InvalidSlot { .. })
        ));

        file.close(&mut mgr)?;
        Ok(())
    }

    #[test]
    fn test_inserts_spill_to_chained_pages() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("students.rf");
        let mut mgr = PagedFileManager::new(8);
        RecordFile::create(&mut mgr, &path)?;
        let mut file = RecordFile::open(&mut mgr, &path)?;

        let mut rids = Vec::new();
        for i in 0..120 {
            rids.push(file.insert(&mut mgr, &student(i))?);
        }
        let pages = file.num_pages(&mgr)?;
        assert!(pages > 1, "records should have spilled past one page");

        for (i, rid) in rids.iter().enumerate() {
            assert_eq!(file.get(&mut mgr, *rid)?.roll_no, student(i).roll_no);
        }

        // Pages are chained in order.
        for p in 0..pages {
            let guard = mgr.get_this_page(file.fd(), PageId::new(p))?;
            let mut view = guard.bytes()?.to_vec();
            guard.unfix()?;
            let page = SlottedPage::new(&mut view);
            let expect_next = if p + 1 < pages { p + 1 } else { -1 };
            let expect_prev = p - 1;
            assert_eq!(page.next_page().value(), expect_next);
            assert_eq!(page.prev_page().value(), expect_prev);
        }

        file.close(&mut mgr)?;
        Ok(())
    }

    #[test]
    fn test_first_fit_reuses_freed_space() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("students.rf");
        let mut mgr = PagedFileManager::new(8);
        RecordFile::create(&mut mgr, &path)?;
        let mut file = RecordFile::open(&mut mgr, &path)?;

        let mut rids = Vec::new();
        for i in 0..120 {
            rids.push(file.insert(&mut mgr, &student(i))?);
        }
        assert!(file.num_pages(&mgr)? > 1);

        // Free a record on page 0. A small record fits the reopened slot
        // and the remaining contiguous region, so first-fit lands it there.
        file.delete(&mut mgr, rids[0])?;
        let rid = file.insert_bytes(&mut mgr, b"tiny")?;
        assert_eq!(rid.page_num, 0);
        assert_eq!(rid.slot_num, rids[0].slot_num);

        file.close(&mut mgr)?;
        Ok(())
    }

    #[test]
    fn test_scan_returns_all_live_records() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("students.rf");
        let mut mgr = PagedFileManager::new(8);
        RecordFile::create(&mut mgr, &path)?;
        let mut file = RecordFile::open(&mut mgr, &path)?;

        let mut rids = Vec::new();
        for i in 0..60 {
            rids.push(file.insert(&mut mgr, &student(i))?);
        }
        for rid in rids.iter().step_by(4) {
            file.delete(&mut mgr, *rid)?;
        }

        let mut scan = file.scan(&mut mgr)?;
        let mut seen = 0;
        while let Some((record, _)) = scan.next(&mut mgr)? {
            assert!(record.roll_no.starts_with("CS"));
            seen += 1;
        }
        assert_eq!(seen, 60 - 15);

        file.close(&mut mgr)?;
        Ok(())
    }

    #[test]
    fn test_space_stats() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("students.rf");
        let mut mgr = PagedFileManager::new(8);
        RecordFile::create(&mut mgr, &path)?;
        let mut file = RecordFile::open(&mut mgr, &path)?;

        for i in 0..30 {
            file.insert(&mut mgr, &student(i))?;
        }
        let before = file.space_stats(&mut mgr)?;
        assert_eq!(before.total_pages, file.num_pages(&mgr)?);
        assert!(before.used_space > 0);
        assert!(before.utilization_pct > 0.0);
        assert_eq!(before.fragmented_space, 0);

        file.delete(&mut mgr, RecordId::new(0, 3))?;
        let after = file.space_stats(&mut mgr)?;
        assert!(after.used_space < before.used_space);
        assert!(after.fragmented_space > 0);
        assert!(after.free_space > before.free_space);

        file.close(&mut mgr)?;
        Ok(())
    }
}
