use std::sync::Arc;

use crate::common::value::Value;
use crate::index::btree::page::BTPage;
use crate::index::Result;
use crate::record::layout::Layout;
use crate::storage::file::BlockId;
use crate::transaction::Transaction;

/// A (key, child block) pair promoted out of a page split, to be inserted
/// into the parent directory level.
#[derive(Debug, Clone, PartialEq)]
pub struct DirEntry {
    dataval: Value,
    blknum: i32,
}

impl DirEntry {
    pub fn new(dataval: Value, blknum: i32) -> Self {
        Self { dataval, blknum }
    }

    pub fn data_val(&self) -> &Value {
        &self.dataval
    }

    pub fn block_number(&self) -> i32 {
        self.blknum
    }
}

/// A directory (non-leaf) node of the B-tree.
///
/// Directory entries pair a key with the block number of the subtree
/// covering keys at or above it; the page flag holds the node's level, with
/// level 0 pointing directly at leaf blocks. The root always lives in block
/// 0 of the directory file.
pub struct BTreeDir {
    layout: Arc<Layout>,
    contents: BTPage,
    filename: String,
}

impl BTreeDir {
    pub fn new(tx: &mut Transaction, block: BlockId, layout: Arc<Layout>) -> Result<Self> {
        let filename = block.file_name().to_string();
        let contents = BTPage::new(tx, block, layout.clone())?;
        Ok(Self {
            layout,
            contents,
            filename,
        })
    }

    /// Unpins the directory page, consuming the node.
    pub fn close(self, tx: &mut Transaction) -> Result<()> {
        self.contents.close(tx)
    }

    /// Descends from this node to the leaf level and returns the block
    /// number of the leaf that covers the search key.
    pub fn search(&mut self, tx: &mut Transaction, search_key: &Value) -> Result<i32> {
        let mut child_block = self.find_child_block(tx, search_key)?;
        while self.contents.get_flag(tx)? > 0 {
            let next = BTPage::new(tx, child_block.clone(), self.layout.clone())?;
            let old = std::mem::replace(&mut self.contents, next);
            old.close(tx)?;
            child_block = self.find_child_block(tx, search_key)?;
        }
        Ok(child_block.number())
    }

    /// Grows the tree by one level after the root split. The root must stay
    /// in block 0, so its records move to a new block and the emptied root
    /// is repopulated with its two children: the old contents and the
    /// promoted entry.
    pub fn make_new_root(&mut self, tx: &mut Transaction, e: DirEntry) -> Result<()> {
        let first_val = self.contents.get_data_val(tx, 0)?;
        let level = self.contents.get_flag(tx)?;
        let new_block = self.contents.split(tx, 0, level)?;
        let old_root = DirEntry::new(first_val, new_block.number());
        let _ = self.insert_entry(tx, &old_root)?;
        let _ = self.insert_entry(tx, &e)?;
        self.contents.set_flag(tx, level + 1)
    }

    /// Inserts a promoted entry at the right level beneath this node,
    /// recursing toward level 0. A `Some` return means this node itself
    /// split and the caller must insert the returned entry one level up.
    pub fn insert(&mut self, tx: &mut Transaction, e: &DirEntry) -> Result<Option<DirEntry>> {
        if self.contents.get_flag(tx)? == 0 {
            return self.insert_entry(tx, e);
        }
        let child_block = self.find_child_block(tx, e.data_val())?;
        let mut child = BTreeDir::new(tx, child_block, self.layout.clone())?;
        let my_entry = child.insert(tx, e)?;
        child.close(tx)?;
        match my_entry {
            Some(entry) => self.insert_entry(tx, &entry),
            None => Ok(None),
        }
    }

    fn insert_entry(&mut self, tx: &mut Transaction, e: &DirEntry) -> Result<Option<DirEntry>> {
        let new_slot = 1 + self.contents.find_slot_before(tx, e.data_val())?;
        self.contents
            .insert_dir(tx, new_slot, e.data_val(), e.block_number())?;
        if !self.contents.is_full(tx)? {
            return Ok(None);
        }

        // The page is full: split at the median and promote its key.
        let level = self.contents.get_flag(tx)?;
        let split_pos = self.contents.get_num_recs(tx)? / 2;
        let split_val = self.contents.get_data_val(tx, split_pos)?;
        let new_block = self.contents.split(tx, split_pos, level)?;
        Ok(Some(DirEntry::new(split_val, new_block.number())))
    }

    /// The child to follow for a search key: the subtree of the greatest
    /// entry at or below the key, stepping right when the next entry equals
    /// the key so duplicate runs are entered at their first block.
    fn find_child_block(&self, tx: &mut Transaction, search_key: &Value) -> Result<BlockId> {
        let mut slot = self.contents.find_slot_before(tx, search_key)?;
        if slot + 1 < self.contents.get_num_recs(tx)?
            && self.contents.get_data_val(tx, slot + 1)? == *search_key
        {
            slot += 1;
        }
        let blknum = self.contents.get_child_num(tx, slot)?;
        Ok(BlockId::new(self.filename.clone(), blknum))
    }
}
