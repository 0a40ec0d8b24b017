//! Bottom-up bulk loading.
//!
//! Instead of driving entries through the insert path, the bulk loader
//! materializes the tree directly: sorted entries are packed into a chained
//! run of leaves at 90% fill, then each internal level is built from the
//! level below until a single node remains. No splits happen and every page
//! is written exactly once.

use crate::btree::node::{internal_capacity, leaf_fill, InternalNode, LeafNode, Node};
use crate::btree::Index;
use crate::error::{Result, StorageError};
use crate::storage::PagedFileManager;
use crate::types::PageId;
use log::debug;

impl Index {
    /// Build the tree from the full entry set in one pass.
    ///
    /// The index must be empty. Entries need not be sorted; they are sorted
    /// here by key (stable, so equal keys keep their given order). Finishes
    /// by recording the root page and height in the index header page.
    pub fn bulk_load(
        &mut self,
        mgr: &mut PagedFileManager,
        mut entries: Vec<(Vec<u8>, i32)>,
    ) -> Result<()> {
        if !self.is_empty() {
            return Err(StorageError::IndexNotEmpty);
        }
        for (key, _) in &entries {
            self.check_key(key)?;
        }

        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let fill = leaf_fill(self.attr_len());
        let n = entries.len();
        let num_leaves = if n == 0 { 1 } else { n.div_ceil(fill) };
        debug!("bulk-load: {n} entries, {num_leaves} leaves at fill {fill}");

        // Allocate the whole leaf run first so each leaf can name its
        // successor while being written once.
        let mut leaf_pages = Vec::with_capacity(num_leaves);
        for _ in 0..num_leaves {
            let (page, guard) = mgr.alloc_page(self.fd())?;
            guard.unfix()?;
            leaf_pages.push(page);
        }

        if n == 0 {
            let leaf = LeafNode::new(self.attr_len());
            self.write_node(mgr, leaf_pages[0], &Node::Leaf(leaf))?;
            self.set_root(leaf_pages[0], 1);
            return self.write_header(mgr);
        }

        // Leaf level: dense left-to-right packing, `fill` entries per page,
        // the last page takes the remainder.
        let mut first_keys: Vec<Vec<u8>> = Vec::with_capacity(num_leaves);
        for (i, chunk) in entries.chunks(fill).enumerate() {
            let mut leaf = LeafNode::new(self.attr_len());
            leaf.entries = chunk.to_vec();
            leaf.next_leaf = if i + 1 < num_leaves {
                leaf_pages[i + 1]
            } else {
                PageId::NONE
            };
            first_keys.push(chunk[0].0.clone());
            self.write_node(mgr, leaf_pages[i], &Node::Leaf(leaf))?;
        }

        // Internal levels, bottom-up. Alongside each level's page numbers we
        // carry the first key of the leftmost leaf under every node: that is
        // the separator a parent must store for its non-first children, at
        // any height.
        let group = internal_capacity(self.attr_len()) + 1;
        let mut children = leaf_pages;
        let mut child_first = first_keys;
        let mut height = 1;

        while children.len() > 1 {
            let mut parents = Vec::with_capacity(children.len().div_ceil(group));
            let mut parent_first = Vec::with_capacity(children.len().div_ceil(group));

            let mut at = 0;
            while at < children.len() {
                let end = (at + group).min(children.len());
                let node = InternalNode::new(
                    self.attr_len(),
                    child_first[at + 1..end].to_vec(),
                    children[at..end].to_vec(),
                );
                let page = self.alloc_node(mgr, &Node::Internal(node))?;
                parents.push(page);
                parent_first.push(child_first[at].clone());
                at = end;
            }

            debug!("bulk-load level above {height}: {} nodes", parents.len());
            children = parents;
            child_first = parent_first;
            height += 1;
        }

        self.set_root(children[0], height);
        self.write_header(mgr)
    }
}
