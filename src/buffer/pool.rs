//! Buffer pool implementation.
//!
//! The pool keeps its frames in an arena (`Vec<Frame>`) and threads two
//! intrusive lists through them with `Option<FrameId>` links: the used list,
//! ordered head = most-recently-touched to tail = least-recently-touched,
//! and a free list of recyclable frames. Frames are created lazily until the
//! configured capacity is reached, after that the replacement strategy picks
//! victims from the used list.
//!
//! Ordering rules, which materially affect MRU hit rates: a frame moves to
//! the head of the used list when it is first brought in, on `unfix`, and on
//! `mark_used` — never on a bare `get` hit.

use crate::buffer::{BufferStats, ReplacementStrategy};
use crate::error::{Result, StorageError};
use crate::page::PageBuf;
use crate::types::{FileId, PageId};
use log::debug;
use std::collections::HashMap;

/// Disk access seam supplied by the paged-file layer.
///
/// The pool itself never touches a file; every physical read and write goes
/// through this trait, which keeps the pool testable against an in-memory
/// backend.
pub trait PageIo {
    /// Read one page into `buf`
    fn read_page(&mut self, fd: FileId, page: PageId, buf: &mut PageBuf) -> Result<()>;

    /// Write one page from `buf`
    fn write_page(&mut self, fd: FileId, page: PageId, buf: &PageBuf) -> Result<()>;
}

type FrameId = usize;

/// A frame in the buffer pool
struct Frame {
    /// File whose page this frame holds
    fd: FileId,
    /// Page number within the file
    page: PageId,
    /// Whether a caller currently holds this page pinned
    fixed: bool,
    /// Whether the contents differ from the on-disk page
    dirty: bool,
    /// Toward the head (more recently touched) of the used list
    prev: Option<FrameId>,
    /// Toward the tail of the used list; doubles as the free-list link
    next: Option<FrameId>,
    /// The page data
    data: PageBuf,
}

impl Frame {
    fn new() -> Self {
        Self {
            fd: FileId(u32::MAX),
            page: PageId::NONE,
            fixed: false,
            dirty: false,
            prev: None,
            next: None,
            data: PageBuf::new(),
        }
    }
}

/// Fixed-capacity page cache with pin/unfix discipline and instrumented
/// hit/miss accounting.
pub struct BufferPool {
    frames: Vec<Frame>,
    map: HashMap<(FileId, PageId), FrameId>,
    used_head: Option<FrameId>,
    used_tail: Option<FrameId>,
    free_head: Option<FrameId>,
    capacity: usize,
    strategy: ReplacementStrategy,
    stats: BufferStats,
}

impl BufferPool {
    /// Create a pool that holds at most `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        Self {
            frames: Vec::with_capacity(capacity),
            map: HashMap::with_capacity(capacity),
            used_head: None,
            used_tail: None,
            free_head: None,
            capacity,
            strategy: ReplacementStrategy::default(),
            stats: BufferStats::default(),
        }
    }

    /// Switch the replacement strategy; takes effect at the next eviction.
    pub fn set_strategy(&mut self, strategy: ReplacementStrategy) {
        self.strategy = strategy;
    }

    /// The active replacement strategy
    pub fn strategy(&self) -> ReplacementStrategy {
        self.strategy
    }

    /// Snapshot of the access counters
    pub fn stats(&self) -> BufferStats {
        self.stats
    }

    /// Zero all access counters
    pub fn reset_stats(&mut self) {
        self.stats = BufferStats::default();
    }

    /// Print the counters and active strategy to stdout
    pub fn print_stats(&self) {
        println!("========== Buffer Statistics ==========");
        println!("{}", self.stats);
        println!("Strategy:              {}", self.strategy);
        println!("=======================================");
    }

    /// Number of frames created so far (never exceeds capacity)
    pub fn num_allocated(&self) -> usize {
        self.frames.len()
    }

    /// Maximum number of frames
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the page currently occupies a frame
    pub fn is_resident(&self, fd: FileId, page: PageId) -> bool {
        self.map.contains_key(&(fd, page))
    }

    /// Get a page, pinning its frame.
    ///
    /// A resident page counts a hit; if it is already fixed the call fails
    /// with `PageFixed` (nested pins are disallowed). A non-resident page
    /// counts a miss, claims a frame, and is read through `io`. On a read
    /// error the claimed frame goes back to the free list and the error
    /// propagates.
    pub fn get(
        &mut self,
        fd: FileId,
        page: PageId,
        io: &mut dyn PageIo,
    ) -> Result<&mut PageBuf> {
        self.stats.logical_reads += 1;

        if let Some(&fid) = self.map.get(&(fd, page)) {
            self.stats.buffer_hits += 1;
            if self.frames[fid].fixed {
                return Err(StorageError::PageFixed { fd, page });
            }
            // No promotion on a bare hit; that happens at unfix.
            self.frames[fid].fixed = true;
            return Ok(&mut self.frames[fid].data);
        }

        self.stats.buffer_misses += 1;
        let fid = self.acquire(io)?;

        if let Err(e) = io.read_page(fd, page, &mut self.frames[fid].data) {
            self.unlink_used(fid);
            self.push_free(fid);
            return Err(e);
        }
        self.stats.physical_reads += 1;

        let frame = &mut self.frames[fid];
        frame.fd = fd;
        frame.page = page;
        frame.fixed = true;
        frame.dirty = false;
        self.map.insert((fd, page), fid);

        Ok(&mut self.frames[fid].data)
    }

    /// Claim a frame for a page that does not yet exist on disk.
    ///
    /// The page must not be resident (`PageInBuf` otherwise). The frame
    /// comes back pinned and clean; the caller fills it in and persists it
    /// by unfixing dirty.
    pub fn alloc_page(
        &mut self,
        fd: FileId,
        page: PageId,
        io: &mut dyn PageIo,
    ) -> Result<&mut PageBuf> {
        if self.map.contains_key(&(fd, page)) {
            return Err(StorageError::PageInBuf { fd, page });
        }

        let fid = self.acquire(io)?;
        let frame = &mut self.frames[fid];
        frame.fd = fd;
        frame.page = page;
        frame.fixed = true;
        frame.dirty = false;
        self.map.insert((fd, page), fid);

        Ok(&mut self.frames[fid].data)
    }

    /// Release the pin on a page, optionally marking it dirty, and promote
    /// its frame to the head of the used list.
    pub fn unfix(&mut self, fd: FileId, page: PageId, dirty: bool) -> Result<()> {
        if dirty {
            self.stats.logical_writes += 1;
        }

        let fid = *self
            .map
            .get(&(fd, page))
            .ok_or(StorageError::PageNotInBuf { fd, page })?;
        if !self.frames[fid].fixed {
            return Err(StorageError::PageUnfixed { fd, page });
        }

        if dirty {
            self.frames[fid].dirty = true;
        }
        self.frames[fid].fixed = false;
        self.unlink_used(fid);
        self.link_head(fid);
        Ok(())
    }

    /// Mark a fixed page dirty and promote it to the head of the used list.
    ///
    /// For callers that mutate a page in place while already holding the pin.
    pub fn mark_used(&mut self, fd: FileId, page: PageId) -> Result<()> {
        let fid = *self
            .map
            .get(&(fd, page))
            .ok_or(StorageError::PageNotInBuf { fd, page })?;
        if !self.frames[fid].fixed {
            return Err(StorageError::PageUnfixed { fd, page });
        }

        self.frames[fid].dirty = true;
        self.unlink_used(fid);
        self.link_head(fid);
        Ok(())
    }

    /// Drop every frame belonging to `fd`, writing dirty ones through `io`.
    ///
    /// Fails with `PageFixed` if any frame of the file is still pinned;
    /// frames released before the fixed one is encountered stay released.
    pub fn release_file(&mut self, fd: FileId, io: &mut dyn PageIo) -> Result<()> {
        let mut cursor = self.used_head;
        while let Some(fid) = cursor {
            let next = self.frames[fid].next;
            if self.frames[fid].fd == fd {
                let page = self.frames[fid].page;
                if self.frames[fid].fixed {
                    return Err(StorageError::PageFixed { fd, page });
                }
                if self.frames[fid].dirty {
                    io.write_page(fd, page, &self.frames[fid].data)?;
                    self.stats.physical_writes += 1;
                    self.frames[fid].dirty = false;
                }
                self.map.remove(&(fd, page));
                self.unlink_used(fid);
                self.push_free(fid);
            }
            cursor = next;
        }
        Ok(())
    }

    /// Drop a page's frame without writing it back.
    ///
    /// Used when the page itself is being disposed of. No-op if the page is
    /// not resident; fails with `PageFixed` if it is pinned.
    pub fn discard(&mut self, fd: FileId, page: PageId) -> Result<()> {
        let Some(&fid) = self.map.get(&(fd, page)) else {
            return Ok(());
        };
        if self.frames[fid].fixed {
            return Err(StorageError::PageFixed { fd, page });
        }
        self.map.remove(&(fd, page));
        self.unlink_used(fid);
        self.push_free(fid);
        Ok(())
    }

    /// Borrow a fixed page's data.
    pub fn fixed_page(&self, fd: FileId, page: PageId) -> Result<&PageBuf> {
        let fid = *self
            .map
            .get(&(fd, page))
            .ok_or(StorageError::PageNotInBuf { fd, page })?;
        if !self.frames[fid].fixed {
            return Err(StorageError::PageUnfixed { fd, page });
        }
        Ok(&self.frames[fid].data)
    }

    /// Mutably borrow a fixed page's data.
    pub fn fixed_page_mut(&mut self, fd: FileId, page: PageId) -> Result<&mut PageBuf> {
        let fid = *self
            .map
            .get(&(fd, page))
            .ok_or(StorageError::PageNotInBuf { fd, page })?;
        if !self.frames[fid].fixed {
            return Err(StorageError::PageUnfixed { fd, page });
        }
        Ok(&mut self.frames[fid].data)
    }

    /// Produce an empty frame linked at the head of the used list.
    ///
    /// Free list first, then lazy allocation up to capacity, then victim
    /// selection. A dirty victim is written out through `io` before reuse;
    /// if every frame is fixed the pool is exhausted (`NoBuf`).
    fn acquire(&mut self, io: &mut dyn PageIo) -> Result<FrameId> {
        let fid = if let Some(fid) = self.pop_free() {
            fid
        } else if self.frames.len() < self.capacity {
            self.frames.push(Frame::new());
            self.frames.len() - 1
        } else {
            let step: fn(&Frame) -> Option<FrameId> = match self.strategy {
                ReplacementStrategy::Lru => |f| f.prev,
                ReplacementStrategy::Mru => |f| f.next,
            };
            let mut cursor = match self.strategy {
                ReplacementStrategy::Lru => self.used_tail,
                ReplacementStrategy::Mru => self.used_head,
            };

            let mut victim = None;
            while let Some(fid) = cursor {
                if !self.frames[fid].fixed {
                    victim = Some(fid);
                    break;
                }
                cursor = step(&self.frames[fid]);
            }
            let fid = victim.ok_or(StorageError::NoBuf)?;

            let (vfd, vpage) = (self.frames[fid].fd, self.frames[fid].page);
            debug!("evicting {vfd}:{vpage} ({})", self.strategy);
            if self.frames[fid].dirty {
                io.write_page(vfd, vpage, &self.frames[fid].data)?;
                self.stats.physical_writes += 1;
                self.frames[fid].dirty = false;
            }
            self.map.remove(&(vfd, vpage));
            self.unlink_used(fid);
            fid
        };

        self.link_head(fid);
        Ok(fid)
    }

    fn link_head(&mut self, fid: FrameId) {
        self.frames[fid].prev = None;
        self.frames[fid].next = self.used_head;
        if let Some(old_head) = self.used_head {
            self.frames[old_head].prev = Some(fid);
        }
        self.used_head = Some(fid);
        if self.used_tail.is_none() {
            self.used_tail = Some(fid);
        }
    }

    fn unlink_used(&mut self, fid: FrameId) {
        let (prev, next) = (self.frames[fid].prev, self.frames[fid].next);
        match prev {
            Some(p) => self.frames[p].next = next,
            None => self.used_head = next,
        }
        match next {
            Some(n) => self.frames[n].prev = prev,
            None => self.used_tail = prev,
        }
        self.frames[fid].prev = None;
        self.frames[fid].next = None;
    }

    fn push_free(&mut self, fid: FrameId) {
        self.frames[fid].prev = None;
        self.frames[fid].next = self.free_head;
        self.free_head = Some(fid);
    }

    fn pop_free(&mut self) -> Option<FrameId> {
        let fid = self.free_head?;
        self.free_head = self.frames[fid].next;
        self.frames[fid].next = None;
        Some(fid)
    }

    #[cfg(test)]
    fn census(&self) -> (usize, usize, usize) {
        let fixed = self.frames.iter().filter(|f| f.fixed).count();
        let mut free = 0;
        let mut cursor = self.free_head;
        while let Some(fid) = cursor {
            free += 1;
            cursor = self.frames[fid].next;
        }
        let unfixed = self.frames.len() - fixed - free;
        (fixed, unfixed, free)
    }
}
