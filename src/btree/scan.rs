//! Ordered index scans.
//!
//! A scan positions itself at the leftmost qualifying leaf and walks the
//! `next_leaf` chain, filtering entries through a comparison operator. Like
//! the record scan, it copies one leaf at a time and holds no pin between
//! calls.

use crate::btree::node::LeafNode;
use crate::btree::Index;
use crate::error::Result;
use crate::storage::PagedFileManager;

/// Comparison operator applied against the scan key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOp {
    /// Yield every entry in key order
    Every,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl ScanOp {
    fn matches(self, entry: &[u8], key: &[u8]) -> bool {
        match self {
            Self::Every => true,
            Self::Equal => entry == key,
            Self::NotEqual => entry != key,
            Self::Less => entry < key,
            Self::LessOrEqual => entry <= key,
            Self::Greater => entry > key,
            Self::GreaterOrEqual => entry >= key,
        }
    }

    /// Once an entry is past this point, nothing later in key order can
    /// match and the scan can stop.
    fn exhausted(self, entry: &[u8], key: &[u8]) -> bool {
        match self {
            Self::Equal => entry > key,
            Self::Less => entry >= key,
            Self::LessOrEqual => entry > key,
            _ => false,
        }
    }
}

/// An open scan over an index.
pub struct IndexScan {
    op: ScanOp,
    key: Vec<u8>,
    leaf: Option<LeafNode>,
    pos: usize,
    done: bool,
}

impl Index {
    /// Open a scan yielding `(key, rec_id)` pairs in ascending key order,
    /// restricted to entries for which `op` holds against `key`.
    ///
    /// `key` is ignored for [`ScanOp::Every`] and may be empty then.
    pub fn open_scan(
        &self,
        mgr: &mut PagedFileManager,
        op: ScanOp,
        key: &[u8],
    ) -> Result<IndexScan> {
        if op != ScanOp::Every {
            self.check_key(key)?;
        }

        let mut scan = IndexScan {
            op,
            key: key.to_vec(),
            leaf: None,
            pos: 0,
            done: self.is_empty(),
        };
        if scan.done {
            return Ok(scan);
        }

        // Operators with a lower bound start at the leaf that holds the
        // first possible match; the rest start at the leftmost leaf.
        let start = match op {
            ScanOp::Equal | ScanOp::Greater | ScanOp::GreaterOrEqual => {
                self.find_leaf(mgr, key)?
            }
            _ => self.first_leaf(mgr)?,
        };
        scan.leaf = Some(self.read_leaf(mgr, start)?);
        Ok(scan)
    }
}

impl IndexScan {
    /// Produce the next matching entry, or `None` once the scan is done.
    pub fn find_next(
        &mut self,
        index: &Index,
        mgr: &mut PagedFileManager,
    ) -> Result<Option<(Vec<u8>, i32)>> {
        while !self.done {
            let Some(leaf) = self.leaf.as_ref() else {
                self.done = true;
                break;
            };

            if self.pos >= leaf.entries.len() {
                if leaf.next_leaf.is_valid() {
                    let next = leaf.next_leaf;
                    self.leaf = Some(index.read_leaf(mgr, next)?);
                    self.pos = 0;
                    continue;
                }
                self.done = true;
                break;
            }

            let (entry_key, rec_id) = leaf.entries[self.pos].clone();
            self.pos += 1;

            if self.op.exhausted(&entry_key, &self.key) {
                self.done = true;
                break;
            }
            if self.op.matches(&entry_key, &self.key) {
                return Ok(Some((entry_key, rec_id)));
            }
        }
        Ok(None)
    }

    /// Close the scan. Dropping it has the same effect.
    pub fn close(self) {}
}
