use std::sync::Arc;

use crate::common::value::Value;
use crate::index::{IndexError, Result};
use crate::record::layout::Layout;
use crate::record::rid::Rid;
use crate::record::schema::FieldType;
use crate::storage::file::BlockId;
use crate::transaction::Transaction;

/// Byte position of the page flag.
const FLAG_POS: usize = 0;
/// Byte position of the record count.
const NUM_RECS_POS: usize = 4;
/// Byte position of the first record slot.
const RECORDS_POS: usize = 8;

/// One page of a B-tree file, shared by directory and leaf nodes.
///
/// The header is two integers: a flag (level for directory pages; -1 or an
/// overflow block number for leaves) and the record count. Records are kept
/// sorted and packed from slot 0. Every read and write goes through the
/// operating transaction. The block is pinned from construction to `close`.
pub struct BTPage {
    block: BlockId,
    layout: Arc<Layout>,
}

impl BTPage {
    pub fn new(tx: &mut Transaction, block: BlockId, layout: Arc<Layout>) -> Result<Self> {
        tx.pin(&block)?;
        Ok(Self { block, layout })
    }

    pub fn block(&self) -> &BlockId {
        &self.block
    }

    /// Unpins the page, consuming it.
    pub fn close(self, tx: &mut Transaction) -> Result<()> {
        tx.unpin(&self.block)?;
        Ok(())
    }

    /// The position just before where the first record with the search key
    /// belongs: the last slot whose value sorts strictly below the key, or
    /// -1 when even slot 0 is not below it.
    pub fn find_slot_before(&self, tx: &mut Transaction, search_key: &Value) -> Result<i32> {
        let mut slot = 0;
        while slot < self.get_num_recs(tx)? && self.get_data_val(tx, slot)? < *search_key {
            slot += 1;
        }
        Ok(slot - 1)
    }

    /// Whether one more record would overflow the block.
    pub fn is_full(&self, tx: &mut Transaction) -> Result<bool> {
        Ok(Self::slot_pos(&self.layout, self.get_num_recs(tx)? + 1) >= tx.block_size())
    }

    /// Moves the records from `split_pos` onward into a freshly appended
    /// block carrying the given flag, and returns that block.
    pub fn split(&self, tx: &mut Transaction, split_pos: i32, flag: i32) -> Result<BlockId> {
        let new_block = self.append_new(tx, flag)?;
        let new_page = BTPage::new(tx, new_block.clone(), self.layout.clone())?;
        self.transfer_recs(tx, split_pos, &new_page)?;
        new_page.set_flag(tx, flag)?;
        new_page.close(tx)?;
        Ok(new_block)
    }

    pub fn get_data_val(&self, tx: &mut Transaction, slot: i32) -> Result<Value> {
        self.get_val(tx, slot, "dataval")
    }

    pub fn get_flag(&self, tx: &mut Transaction) -> Result<i32> {
        Ok(tx.get_int(&self.block, FLAG_POS)?)
    }

    pub fn set_flag(&self, tx: &mut Transaction, val: i32) -> Result<()> {
        Ok(tx.set_int(&self.block, FLAG_POS, val, true)?)
    }

    /// Appends a formatted empty block with the given flag to this page's
    /// file. The block is left unpinned.
    pub fn append_new(&self, tx: &mut Transaction, flag: i32) -> Result<BlockId> {
        let block = tx.append(self.block.file_name())?;
        tx.pin(&block)?;
        Self::format_block(tx, &block, &self.layout, flag)?;
        tx.unpin(&block)?;
        Ok(block)
    }

    /// Formats this page: flag and record count set, every slot cleared to
    /// default values. Not logged, since a formatted block has no prior
    /// contents worth restoring.
    pub fn format(&self, tx: &mut Transaction, flag: i32) -> Result<()> {
        Self::format_block(tx, &self.block, &self.layout, flag)
    }

    fn format_block(
        tx: &mut Transaction,
        block: &BlockId,
        layout: &Layout,
        flag: i32,
    ) -> Result<()> {
        tx.set_int(block, FLAG_POS, flag, false)?;
        tx.set_int(block, NUM_RECS_POS, 0, false)?;
        let rec_size = layout.slot_size();
        let mut pos = RECORDS_POS;
        while pos + rec_size <= tx.block_size() {
            Self::make_default_record(tx, block, layout, pos)?;
            pos += rec_size;
        }
        Ok(())
    }

    fn make_default_record(
        tx: &mut Transaction,
        block: &BlockId,
        layout: &Layout,
        pos: usize,
    ) -> Result<()> {
        let schema = layout.schema();
        for field in schema.fields() {
            let offset = layout
                .offset(field)
                .ok_or_else(|| IndexError::UnknownField(field.clone()))?;
            match schema.field_type(field) {
                Some(FieldType::Integer) => tx.set_int(block, pos + offset, 0, false)?,
                Some(FieldType::Varchar) => tx.set_string(block, pos + offset, "", false)?,
                None => {}
            }
        }
        Ok(())
    }

    /// Block number of the child referenced by a directory entry.
    pub fn get_child_num(&self, tx: &mut Transaction, slot: i32) -> Result<i32> {
        self.get_int(tx, slot, "block")
    }

    /// Inserts a directory entry at the slot: a search key and the block
    /// number of the subtree covering it.
    pub fn insert_dir(
        &self,
        tx: &mut Transaction,
        slot: i32,
        val: &Value,
        blknum: i32,
    ) -> Result<()> {
        self.insert(tx, slot)?;
        self.set_val(tx, slot, "dataval", val)?;
        self.set_int(tx, slot, "block", blknum)
    }

    /// The RID stored in a leaf entry.
    pub fn get_data_rid(&self, tx: &mut Transaction, slot: i32) -> Result<Rid> {
        let blknum = self.get_int(tx, slot, "block")?;
        let id = self.get_int(tx, slot, "id")?;
        Ok(Rid::new(blknum, id))
    }

    /// Inserts a leaf entry at the slot: a key value and the RID of the
    /// data record holding it.
    pub fn insert_leaf(
        &self,
        tx: &mut Transaction,
        slot: i32,
        val: &Value,
        rid: Rid,
    ) -> Result<()> {
        self.insert(tx, slot)?;
        self.set_val(tx, slot, "dataval", val)?;
        self.set_int(tx, slot, "block", rid.block_number())?;
        self.set_int(tx, slot, "id", rid.slot())
    }

    /// Removes the record at the slot, shifting later records down.
    pub fn delete(&self, tx: &mut Transaction, slot: i32) -> Result<()> {
        let num_recs = self.get_num_recs(tx)?;
        for i in slot + 1..num_recs {
            self.copy_record(tx, i, i - 1)?;
        }
        self.set_num_recs(tx, num_recs - 1)
    }

    pub fn get_num_recs(&self, tx: &mut Transaction) -> Result<i32> {
        Ok(tx.get_int(&self.block, NUM_RECS_POS)?)
    }

    fn get_int(&self, tx: &mut Transaction, slot: i32, field: &str) -> Result<i32> {
        let pos = self.field_pos(slot, field)?;
        Ok(tx.get_int(&self.block, pos)?)
    }

    fn get_string(&self, tx: &mut Transaction, slot: i32, field: &str) -> Result<String> {
        let pos = self.field_pos(slot, field)?;
        Ok(tx.get_string(&self.block, pos)?)
    }

    fn get_val(&self, tx: &mut Transaction, slot: i32, field: &str) -> Result<Value> {
        match self.layout.schema().field_type(field) {
            Some(FieldType::Integer) => Ok(Value::Int(self.get_int(tx, slot, field)?)),
            Some(FieldType::Varchar) => Ok(Value::Varchar(self.get_string(tx, slot, field)?)),
            None => Err(IndexError::UnknownField(field.to_string())),
        }
    }

    fn set_int(&self, tx: &mut Transaction, slot: i32, field: &str, val: i32) -> Result<()> {
        let pos = self.field_pos(slot, field)?;
        Ok(tx.set_int(&self.block, pos, val, true)?)
    }

    fn set_string(&self, tx: &mut Transaction, slot: i32, field: &str, val: &str) -> Result<()> {
        let pos = self.field_pos(slot, field)?;
        Ok(tx.set_string(&self.block, pos, val, true)?)
    }

    fn set_val(&self, tx: &mut Transaction, slot: i32, field: &str, val: &Value) -> Result<()> {
        match val {
            Value::Int(n) => self.set_int(tx, slot, field, *n),
            Value::Varchar(s) => self.set_string(tx, slot, field, s),
        }
    }

    fn set_num_recs(&self, tx: &mut Transaction, n: i32) -> Result<()> {
        Ok(tx.set_int(&self.block, NUM_RECS_POS, n, true)?)
    }

    /// Opens a gap at the slot by shifting records up, and bumps the count.
    fn insert(&self, tx: &mut Transaction, slot: i32) -> Result<()> {
        let num_recs = self.get_num_recs(tx)?;
        let mut i = num_recs;
        while i > slot {
            self.copy_record(tx, i - 1, i)?;
            i -= 1;
        }
        self.set_num_recs(tx, num_recs + 1)
    }

    fn copy_record(&self, tx: &mut Transaction, from: i32, to: i32) -> Result<()> {
        let schema = self.layout.schema();
        for field in schema.fields() {
            let val = self.get_val(tx, from, field)?;
            self.set_val(tx, to, field, &val)?;
        }
        Ok(())
    }

    /// Moves the records from `slot` onward to the destination page.
    /// The source slot stays put because each delete shifts the rest down.
    fn transfer_recs(&self, tx: &mut Transaction, slot: i32, dest: &BTPage) -> Result<()> {
        let mut dest_slot = 0;
        while slot < self.get_num_recs(tx)? {
            dest.insert(tx, dest_slot)?;
            let schema = self.layout.schema();
            for field in schema.fields() {
                let val = self.get_val(tx, slot, field)?;
                dest.set_val(tx, dest_slot, field, &val)?;
            }
            self.delete(tx, slot)?;
            dest_slot += 1;
        }
        Ok(())
    }

    fn field_pos(&self, slot: i32, field: &str) -> Result<usize> {
        let offset = self
            .layout
            .offset(field)
            .ok_or_else(|| IndexError::UnknownField(field.to_string()))?;
        Ok(Self::slot_pos(&self.layout, slot) + offset)
    }

    fn slot_pos(layout: &Layout, slot: i32) -> usize {
        RECORDS_POS + slot as usize * layout.slot_size()
    }
}
