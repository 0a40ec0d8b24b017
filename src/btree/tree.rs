//! B+ tree index core.
//!
//! An index is a paged file whose data page 0 is the index header (key
//! length, root page, tree height) and whose remaining pages are leaf or
//! internal nodes. Keys are fixed-width byte strings compared as unsigned
//! lexicographic; duplicate keys are tolerated. Each entry pairs a key with
//! an opaque `i32` record id.
//!
//! Nodes are read into owned [`Node`] values, modified, and written back —
//! one pinned page at a time, so tree operations never hold more than a
//! single pin.

use crate::btree::node::{InternalNode, LeafNode, Node, NODE_SPACE};
use crate::error::{Result, StorageError};
use crate::storage::PagedFileManager;
use crate::types::{FileId, PageId};
use log::debug;

// Index header page layout (little-endian): key type tag, key length,
// root page number, tree height.
const OFF_ATTR_TYPE: usize = 0;
const OFF_ATTR_LEN: usize = 1;
const OFF_ROOT_PAGE: usize = 3;
const OFF_HEIGHT: usize = 7;

const ATTR_TYPE_CHAR: u8 = b'c';

/// Longest supported key
pub const MAX_ATTR_LEN: usize = 255;

/// File name for index `idx_no` over `name`
pub fn index_path(name: &str, idx_no: u32) -> String {
    format!("{name}.{idx_no}")
}

/// An open B+ tree index over fixed-width character keys.
pub struct Index {
    fd: FileId,
    attr_len: usize,
    root_page: PageId,
    height: i32,
}

impl Index {
    /// Create an empty index file named `<name>.<idx_no>`.
    pub fn create(
        mgr: &mut PagedFileManager,
        name: &str,
        idx_no: u32,
        attr_len: usize,
    ) -> Result<()> {
        if attr_len == 0 || attr_len > MAX_ATTR_LEN {
            return Err(StorageError::InvalidAttrLength(attr_len));
        }

        let path = index_path(name, idx_no);
        mgr.create_file(&path)?;
        let fd = mgr.open_file(&path)?;

        let (page, mut guard) = mgr.alloc_page(fd)?;
        debug_assert_eq!(page, PageId::new(0));
        {
            let bytes = guard.bytes_mut()?;
            bytes[OFF_ATTR_TYPE] = ATTR_TYPE_CHAR;
            bytes[OFF_ATTR_LEN..OFF_ATTR_LEN + 2]
                .copy_from_slice(&(attr_len as i16).to_le_bytes());
            bytes[OFF_ROOT_PAGE..OFF_ROOT_PAGE + 4]
                .copy_from_slice(&PageId::NONE.value().to_le_bytes());
            bytes[OFF_HEIGHT..OFF_HEIGHT + 4].copy_from_slice(&0i32.to_le_bytes());
        }
        guard.unfix()?;

        mgr.close_file(fd)?;
        debug!("created index {path} (attr_len {attr_len})");
        Ok(())
    }

    /// Remove the index file `<name>.<idx_no>` from disk.
    pub fn destroy(mgr: &mut PagedFileManager, name: &str, idx_no: u32) -> Result<()> {
        mgr.destroy_file(index_path(name, idx_no))
    }

    /// Open an existing index.
    pub fn open(mgr: &mut PagedFileManager, name: &str, idx_no: u32) -> Result<Self> {
        let fd = mgr.open_file(index_path(name, idx_no))?;

        let guard = mgr.get_this_page(fd, PageId::new(0))?;
        let bytes = guard.bytes()?;
        if bytes[OFF_ATTR_TYPE] != ATTR_TYPE_CHAR {
            return Err(StorageError::corruption("unknown index key type"));
        }
        let attr_len =
            i16::from_le_bytes([bytes[OFF_ATTR_LEN], bytes[OFF_ATTR_LEN + 1]]) as usize;
        let root_page = PageId::new(i32::from_le_bytes([
            bytes[OFF_ROOT_PAGE],
            bytes[OFF_ROOT_PAGE + 1],
            bytes[OFF_ROOT_PAGE + 2],
            bytes[OFF_ROOT_PAGE + 3],
        ]));
        let height = i32::from_le_bytes([
            bytes[OFF_HEIGHT],
            bytes[OFF_HEIGHT + 1],
            bytes[OFF_HEIGHT + 2],
            bytes[OFF_HEIGHT + 3],
        ]);
        guard.unfix()?;

        if attr_len == 0 || attr_len > MAX_ATTR_LEN {
            return Err(StorageError::InvalidAttrLength(attr_len));
        }

        Ok(Self {
            fd,
            attr_len,
            root_page,
            height,
        })
    }

    /// Close the index, flushing everything through the paged-file layer.
    pub fn close(self, mgr: &mut PagedFileManager) -> Result<()> {
        mgr.close_file(self.fd)
    }

    /// The key length this index was created with
    pub fn attr_len(&self) -> usize {
        self.attr_len
    }

    /// Current root page, [`PageId::NONE`] while the index is empty
    pub fn root_page(&self) -> PageId {
        self.root_page
    }

    /// Current tree height (0 while empty, 1 for a lone leaf root)
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Whether any entry has been inserted or bulk-loaded
    pub fn is_empty(&self) -> bool {
        !self.root_page.is_valid()
    }

    pub(crate) fn fd(&self) -> FileId {
        self.fd
    }

    /// Insert one `(key, rec_id)` entry, splitting on overflow.
    ///
    /// This is the shared entry point for both online build strategies; a
    /// root split grows the tree by one level.
    pub fn insert_entry(&mut self, mgr: &mut PagedFileManager, key: &[u8], rec_id: i32) -> Result<()> {
        self.check_key(key)?;

        if !self.root_page.is_valid() {
            let mut leaf = LeafNode::new(self.attr_len);
            leaf.entries.push((key.to_vec(), rec_id));
            let page = self.alloc_node(mgr, &Node::Leaf(leaf))?;
            self.root_page = page;
            self.height = 1;
            return self.write_header(mgr);
        }

        if let Some((separator, right)) = self.insert_recursive(mgr, self.root_page, key, rec_id)? {
            let old_root = self.root_page;
            let root = InternalNode::new(self.attr_len, vec![separator], vec![old_root, right]);
            let page = self.alloc_node(mgr, &Node::Internal(root))?;
            self.root_page = page;
            self.height += 1;
            debug!("root split: new root {page}, height {}", self.height);
            self.write_header(mgr)?;
        }

        Ok(())
    }

    /// Collect the record ids of every entry matching `key`.
    ///
    /// Descends left of equal separators: an online split in the middle of
    /// a duplicate run puts the key itself in the parent, with matching
    /// entries still in the left sibling. Starting there and walking the
    /// leaf chain forward covers the whole run.
    pub fn search(&self, mgr: &mut PagedFileManager, key: &[u8]) -> Result<Vec<i32>> {
        self.check_key(key)?;
        if !self.root_page.is_valid() {
            return Ok(Vec::new());
        }

        let mut results = Vec::new();
        let mut page = self.find_leaf(mgr, key)?;
        loop {
            let leaf = self.read_leaf(mgr, page)?;
            let mut past = false;
            for (k, rec_id) in &leaf.entries {
                if k.as_slice() == key {
                    results.push(*rec_id);
                } else if k.as_slice() > key {
                    past = true;
                    break;
                }
            }
            if past || !leaf.next_leaf.is_valid() {
                break;
            }
            // Duplicates may continue on the next chained leaf.
            page = leaf.next_leaf;
        }
        Ok(results)
    }

    /// Descend to the first leaf that can hold `key`.
    ///
    /// Ties go left of an equal separator: a split in the middle of a
    /// duplicate run puts the key itself in the parent, and the left
    /// sibling still holds matches. Lookups start there and walk the leaf
    /// chain forward. (The insert path descends ties-right with its own
    /// `partition_point`, appending after existing duplicates.)
    pub(crate) fn find_leaf(&self, mgr: &mut PagedFileManager, key: &[u8]) -> Result<PageId> {
        let mut page = self.root_page;
        loop {
            match self.read_node(mgr, page)? {
                Node::Leaf(_) => return Ok(page),
                Node::Internal(node) => {
                    let idx = node.keys.partition_point(|k| k.as_slice() < key);
                    page = node.children[idx];
                }
            }
        }
    }

    /// Leftmost leaf of the tree
    pub(crate) fn first_leaf(&self, mgr: &mut PagedFileManager) -> Result<PageId> {
        let mut page = self.root_page;
        loop {
            match self.read_node(mgr, page)? {
                Node::Leaf(_) => return Ok(page),
                Node::Internal(node) => page = node.children[0],
            }
        }
    }

    fn insert_recursive(
        &mut self,
        mgr: &mut PagedFileManager,
        page: PageId,
        key: &[u8],
        rec_id: i32,
    ) -> Result<Option<(Vec<u8>, PageId)>> {
        match self.read_node(mgr, page)? {
            Node::Leaf(mut leaf) => {
                let idx = leaf.entries.partition_point(|(k, _)| k.as_slice() <= key);
                leaf.entries.insert(idx, (key.to_vec(), rec_id));

                if leaf.entries.len() <= leaf.max_keys {
                    self.write_node(mgr, page, &Node::Leaf(leaf))?;
                    return Ok(None);
                }

                // Leaf overflow: move the upper half to a new right sibling
                // and hand the parent its first key as separator.
                let mid = leaf.entries.len() / 2;
                let mut right = LeafNode::new(self.attr_len);
                right.entries = leaf.entries.split_off(mid);
                right.next_leaf = leaf.next_leaf;
                let separator = right.entries[0].0.clone();

                let right_page = self.alloc_node(mgr, &Node::Leaf(right))?;
                leaf.next_leaf = right_page;
                self.write_node(mgr, page, &Node::Leaf(leaf))?;
                Ok(Some((separator, right_page)))
            }
            Node::Internal(mut node) => {
                let idx = node.keys.partition_point(|k| k.as_slice() <= key);
                let child = node.children[idx];

                let Some((separator, new_child)) =
                    self.insert_recursive(mgr, child, key, rec_id)?
                else {
                    return Ok(None);
                };

                node.keys.insert(idx, separator);
                node.children.insert(idx + 1, new_child);

                if node.keys.len() <= node.max_keys {
                    self.write_node(mgr, page, &Node::Internal(node))?;
                    return Ok(None);
                }

                // Internal overflow: the middle separator moves up, it is
                // kept in neither half.
                let mid = node.keys.len() / 2;
                let up = node.keys[mid].clone();
                let right = InternalNode::new(
                    self.attr_len,
                    node.keys.split_off(mid + 1),
                    node.children.split_off(mid + 1),
                );
                node.keys.truncate(mid);

                let right_page = self.alloc_node(mgr, &Node::Internal(right))?;
                self.write_node(mgr, page, &Node::Internal(node))?;
                Ok(Some((up, right_page)))
            }
        }
    }

    pub(crate) fn read_node(&self, mgr: &mut PagedFileManager, page: PageId) -> Result<Node> {
        let guard = mgr.get_this_page(self.fd, page)?;
        let node = Node::read(&guard.bytes()?[..NODE_SPACE])?;
        guard.unfix()?;
        Ok(node)
    }

    pub(crate) fn read_leaf(&self, mgr: &mut PagedFileManager, page: PageId) -> Result<LeafNode> {
        match self.read_node(mgr, page)? {
            Node::Leaf(leaf) => Ok(leaf),
            Node::Internal(_) => Err(StorageError::corruption(format!(
                "expected leaf node at page {page}"
            ))),
        }
    }

    pub(crate) fn write_node(
        &self,
        mgr: &mut PagedFileManager,
        page: PageId,
        node: &Node,
    ) -> Result<()> {
        let mut guard = mgr.get_this_page(self.fd, page)?;
        node.write(&mut guard.bytes_mut()?[..NODE_SPACE]);
        guard.mark_dirty();
        guard.unfix()
    }

    pub(crate) fn alloc_node(&self, mgr: &mut PagedFileManager, node: &Node) -> Result<PageId> {
        let (page, mut guard) = mgr.alloc_page(self.fd)?;
        node.write(&mut guard.bytes_mut()?[..NODE_SPACE]);
        guard.unfix()?;
        Ok(page)
    }

    /// Record the current root page and height in the index header page.
    pub(crate) fn write_header(&self, mgr: &mut PagedFileManager) -> Result<()> {
        let mut guard = mgr.get_this_page(self.fd, PageId::new(0))?;
        {
            let bytes = guard.bytes_mut()?;
            bytes[OFF_ROOT_PAGE..OFF_ROOT_PAGE + 4]
                .copy_from_slice(&self.root_page.value().to_le_bytes());
            bytes[OFF_HEIGHT..OFF_HEIGHT + 4].copy_from_slice(&self.height.to_le_bytes());
        }
        guard.mark_dirty();
        guard.unfix()
    }

    pub(crate) fn set_root(&mut self, root: PageId, height: i32) {
        self.root_page = root;
        self.height = height;
    }

    pub(crate) fn check_key(&self, key: &[u8]) -> Result<()> {
        if key.len() != self.attr_len {
            return Err(StorageError::InvalidKeyLength {
                got: key.len(),
                expected: self.attr_len,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::node::{leaf_capacity, leaf_fill};
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use tempfile::tempdir;

    fn key(i: usize) -> Vec<u8> {
        format!("{i:08}").into_bytes()
    }

    fn open_fresh(mgr: &mut PagedFileManager, name: &str) -> Index {
        Index::create(mgr, name, 0, 8).unwrap();
        Index::open(mgr, name, 0).unwrap()
    }

    #[test]
    fn test_create_open_roundtrip() -> Result<()> {
        let dir = tempdir().unwrap();
        let name = dir.path().join("idx").display().to_string();
        let mut mgr = PagedFileManager::new(8);

        Index::create(&mut mgr, &name, 0, 20)?;
        let index = Index::open(&mut mgr, &name, 0)?;
        assert_eq!(index.attr_len(), 20);
        assert!(index.is_empty());
        assert_eq!(index.height(), 0);
        index.close(&mut mgr)?;

        Index::destroy(&mut mgr, &name, 0)?;
        Ok(())
    }

    #[test]
    fn test_invalid_attr_len() {
        let dir = tempdir().unwrap();
        let name = dir.path().join("idx").display().to_string();
        let mut mgr = PagedFileManager::new(8);
        assert!(matches!(
            Index::create(&mut mgr, &name, 0, 0),
            Err(StorageError::InvalidAttrLength(0))
        ));
    }

    #[test]
    fn test_single_insert_and_search() -> Result<()> {
        let dir = tempdir().unwrap();
        let name = dir.path().join("idx").display().to_string();
        let mut mgr = PagedFileManager::new(8);
        let mut index = open_fresh(&mut mgr, &name);

        index.insert_entry(&mut mgr, &key(7), 70)?;
        assert_eq!(index.search(&mut mgr, &key(7))?, vec![70]);
        assert!(index.search(&mut mgr, &key(8))?.is_empty());
        assert_eq!(index.height(), 1);
        index.close(&mut mgr)?;
        Ok(())
    }

    #[test]
    fn test_key_length_enforced() -> Result<()> {
        let dir = tempdir().unwrap();
        let name = dir.path().join("idx").display().to_string();
        let mut mgr = PagedFileManager::new(8);
        let mut index = open_fresh(&mut mgr, &name);

        assert!(matches!(
            index.insert_entry(&mut mgr, b"short", 1),
            Err(StorageError::InvalidKeyLength { got: 5, expected: 8 })
        ));
        index.close(&mut mgr)?;
        Ok(())
    }

    #[test]
    fn test_shuffled_inserts_split_and_stay_searchable() -> Result<()> {
        let dir = tempdir().unwrap();
        let name = dir.path().join("idx").display().to_string();
        let mut mgr = PagedFileManager::new(8);
        let mut index = open_fresh(&mut mgr, &name);

        let n = leaf_fill(8) * 12;
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut rand::rngs::StdRng::seed_from_u64(42));

        for &i in &order {
            index.insert_entry(&mut mgr, &key(i), i as i32)?;
        }

        assert!(index.height() >= 2, "tree should have split");
        for i in 0..n {
            assert_eq!(index.search(&mut mgr, &key(i))?, vec![i as i32]);
        }
        index.close(&mut mgr)?;
        Ok(())
    }

    #[test]
    fn test_root_and_height_persist_across_reopen() -> Result<()> {
        let dir = tempdir().unwrap();
        let name = dir.path().join("idx").display().to_string();
        let mut mgr = PagedFileManager::new(8);
        let mut index = open_fresh(&mut mgr, &name);

        for i in 0..200 {
            index.insert_entry(&mut mgr, &key(i), i as i32)?;
        }
        let (root, height) = (index.root_page(), index.height());
        index.close(&mut mgr)?;

        let index = Index::open(&mut mgr, &name, 0)?;
        assert_eq!(index.root_page(), root);
        assert_eq!(index.height(), height);
        assert_eq!(index.search(&mut mgr, &key(123))?, vec![123]);
        index.close(&mut mgr)?;
        Ok(())
    }

    #[test]
    fn test_duplicate_keys() -> Result<()> {
        let dir = tempdir().unwrap();
        let name = dir.path().join("idx").display().to_string();
        let mut mgr = PagedFileManager::new(8);
        let mut index = open_fresh(&mut mgr, &name);

        for rec in 0..5 {
            index.insert_entry(&mut mgr, &key(1), rec)?;
        }
        index.insert_entry(&mut mgr, &key(0), 100)?;
        index.insert_entry(&mut mgr, &key(2), 200)?;

        let mut found = index.search(&mut mgr, &key(1))?;
        found.sort();
        assert_eq!(found, vec![0, 1, 2, 3, 4]);
        index.close(&mut mgr)?;
        Ok(())
    }

    #[test]
    fn test_search_finds_duplicates_split_across_leaves() -> Result<()> {
        let dir = tempdir().unwrap();
        let name = dir.path().join("idx").display().to_string();
        let mut mgr = PagedFileManager::new(8);
        let mut index = open_fresh(&mut mgr, &name);

        // Overflow a leaf with nothing but one key: the split lands in the
        // middle of the run and the separator equals the key itself, so the
        // left sibling still holds matches the descent must not skip.
        let n = leaf_capacity(8) + 1;
        for rec in 0..n {
            index.insert_entry(&mut mgr, &key(7), rec as i32)?;
        }
        assert!(index.height() >= 2, "duplicate run should have split");

        let mut found = index.search(&mut mgr, &key(7))?;
        found.sort();
        assert_eq!(found, (0..n as i32).collect::<Vec<_>>());

        // Neighbouring keys are unaffected.
        index.insert_entry(&mut mgr, &key(6), -1)?;
        index.insert_entry(&mut mgr, &key(8), -2)?;
        assert_eq!(index.search(&mut mgr, &key(6))?, vec![-1]);
        assert_eq!(index.search(&mut mgr, &key(8))?, vec![-2]);
        assert_eq!(index.search(&mut mgr, &key(7))?.len(), n);

        index.close(&mut mgr)?;
        Ok(())
    }

    #[test]
    fn test_leaf_chain_stays_sorted_under_online_inserts() -> Result<()> {
        let dir = tempdir().unwrap();
        let name = dir.path().join("idx").display().to_string();
        let mut mgr = PagedFileManager::new(8);
        let mut index = open_fresh(&mut mgr, &name);

        let n = leaf_fill(8) * 6;
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut rand::rngs::StdRng::seed_from_u64(7));
        for &i in &order {
            index.insert_entry(&mut mgr, &key(i), i as i32)?;
        }

        // Walk the chain from the leftmost leaf and collect all keys.
        let mut keys = Vec::new();
        let mut page = index.first_leaf(&mut mgr)?;
        loop {
            let leaf = index.read_leaf(&mut mgr, page)?;
            keys.extend(leaf.entries.iter().map(|(k, _)| k.clone()));
            if !leaf.next_leaf.is_valid() {
                break;
            }
            page = leaf.next_leaf;
        }

        let expected: Vec<Vec<u8>> = (0..n).map(key).collect();
        assert_eq!(keys, expected);
        index.close(&mut mgr)?;
        Ok(())
    }
}
