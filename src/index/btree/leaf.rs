use std::sync::Arc;

use crate::common::value::Value;
use crate::index::btree::dir::DirEntry;
use crate::index::btree::page::BTPage;
use crate::index::Result;
use crate::record::layout::Layout;
use crate::record::rid::Rid;
use crate::storage::file::BlockId;
use crate::transaction::Transaction;

/// A leaf block of the B-tree, positioned for one search key.
///
/// The cursor starts just before the first entry with the key; `next` walks
/// matching entries, following the overflow chain when a key's duplicates
/// spill across blocks. `insert` handles leaf splits and overflow creation,
/// reporting a directory entry to promote when a new sibling appears.
pub struct BTreeLeaf {
    layout: Arc<Layout>,
    search_key: Value,
    contents: BTPage,
    current_slot: i32,
    filename: String,
}

impl BTreeLeaf {
    pub fn new(
        tx: &mut Transaction,
        block: BlockId,
        layout: Arc<Layout>,
        search_key: Value,
    ) -> Result<Self> {
        let filename = block.file_name().to_string();
        let contents = BTPage::new(tx, block, layout.clone())?;
        let current_slot = contents.find_slot_before(tx, &search_key)?;
        Ok(Self {
            layout,
            search_key,
            contents,
            current_slot,
            filename,
        })
    }

    /// Unpins the leaf block, consuming the cursor.
    pub fn close(self, tx: &mut Transaction) -> Result<()> {
        self.contents.close(tx)
    }

    /// Moves to the next entry with the search key, crossing into the
    /// overflow chain when the current block is exhausted.
    pub fn next(&mut self, tx: &mut Transaction) -> Result<bool> {
        self.current_slot += 1;
        if self.current_slot >= self.contents.get_num_recs(tx)? {
            self.try_overflow(tx)
        } else if self.contents.get_data_val(tx, self.current_slot)? == self.search_key {
            Ok(true)
        } else {
            self.try_overflow(tx)
        }
    }

    /// The RID of the current entry.
    pub fn get_data_rid(&self, tx: &mut Transaction) -> Result<Rid> {
        self.contents.get_data_rid(tx, self.current_slot)
    }

    /// Removes the entry pointing at the given data record, if present
    /// among the entries with the search key.
    pub fn delete(&mut self, tx: &mut Transaction, datarid: Rid) -> Result<()> {
        while self.next(tx)? {
            if self.get_data_rid(tx)? == datarid {
                self.contents.delete(tx, self.current_slot)?;
                return Ok(());
            }
        }
        Ok(())
    }

    /// Adds an entry for the search key. Returns the directory entry to
    /// promote when the insertion created a new leaf block.
    pub fn insert(&mut self, tx: &mut Transaction, datarid: Rid) -> Result<Option<DirEntry>> {
        // An overflow chain head whose first key exceeds the new key cannot
        // absorb it in place: push the whole page into a new block and
        // restart this one with the new entry alone.
        if self.contents.get_flag(tx)? >= 0
            && self.contents.get_data_val(tx, 0)? > self.search_key
        {
            let first_val = self.contents.get_data_val(tx, 0)?;
            let flag = self.contents.get_flag(tx)?;
            let new_block = self.contents.split(tx, 0, flag)?;
            self.current_slot = 0;
            self.contents.set_flag(tx, -1)?;
            self.contents
                .insert_leaf(tx, self.current_slot, &self.search_key, datarid)?;
            return Ok(Some(DirEntry::new(first_val, new_block.number())));
        }

        self.current_slot += 1;
        self.contents
            .insert_leaf(tx, self.current_slot, &self.search_key, datarid)?;
        if !self.contents.is_full(tx)? {
            return Ok(None);
        }

        // The page is full and must split.
        let first_key = self.contents.get_data_val(tx, 0)?;
        let num_recs = self.contents.get_num_recs(tx)?;
        let last_key = self.contents.get_data_val(tx, num_recs - 1)?;

        if last_key == first_key {
            // Every key is the same: move all but the first entry into an
            // overflow block chained from this one.
            let flag = self.contents.get_flag(tx)?;
            let new_block = self.contents.split(tx, 1, flag)?;
            self.contents.set_flag(tx, new_block.number())?;
            return Ok(None);
        }

        // Split near the middle, but never inside a run of equal keys.
        let mut split_pos = num_recs / 2;
        let mut split_key = self.contents.get_data_val(tx, split_pos)?;
        if split_key == first_key {
            while split_pos < num_recs && self.contents.get_data_val(tx, split_pos)? == split_key
            {
                split_pos += 1;
            }
            split_key = self.contents.get_data_val(tx, split_pos)?;
        } else {
            while split_pos > 0 && self.contents.get_data_val(tx, split_pos - 1)? == split_key {
                split_pos -= 1;
            }
        }
        let new_block = self.contents.split(tx, split_pos, -1)?;
        Ok(Some(DirEntry::new(split_key, new_block.number())))
    }

    /// Follows the overflow chain when the search key fills whole blocks.
    /// Possible only when the key matches the block's first entry and the
    /// flag holds an overflow block number.
    fn try_overflow(&mut self, tx: &mut Transaction) -> Result<bool> {
        let first_key = self.contents.get_data_val(tx, 0)?;
        let flag = self.contents.get_flag(tx)?;
        if self.search_key != first_key || flag < 0 {
            return Ok(false);
        }

        let next_block = BlockId::new(self.filename.clone(), flag);
        let next_page = BTPage::new(tx, next_block, self.layout.clone())?;
        let old = std::mem::replace(&mut self.contents, next_page);
        old.close(tx)?;
        self.current_slot = 0;
        Ok(true)
    }
}
