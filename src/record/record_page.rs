use std::sync::Arc;

use crate::common::value::Value;
use crate::record::layout::Layout;
use crate::record::schema::FieldType;
use crate::record::{RecordError, Result};
use crate::storage::file::BlockId;
use crate::transaction::Transaction;

/// Slot flag: unused or deleted.
pub const EMPTY: i32 = 0;
/// Slot flag: holds a live record.
pub const USED: i32 = 1;

/// A page of fixed-width record slots within one block.
///
/// Slot `s` begins at byte `s * slot_size`; its first word is the usage flag
/// and its fields follow at the layout's offsets. All access goes through
/// the owning transaction, which supplies locking and logging. The block
/// stays pinned from construction until the caller unpins it.
pub struct RecordPage {
    block: BlockId,
    layout: Arc<Layout>,
}

impl RecordPage {
    pub fn new(tx: &mut Transaction, block: BlockId, layout: Arc<Layout>) -> Result<Self> {
        tx.pin(&block)?;
        Ok(Self { block, layout })
    }

    pub fn block(&self) -> &BlockId {
        &self.block
    }

    pub fn get_int(&self, tx: &mut Transaction, slot: i32, field: &str) -> Result<i32> {
        let pos = self.field_pos(slot, field)?;
        Ok(tx.get_int(&self.block, pos)?)
    }

    pub fn get_string(&self, tx: &mut Transaction, slot: i32, field: &str) -> Result<String> {
        let pos = self.field_pos(slot, field)?;
        Ok(tx.get_string(&self.block, pos)?)
    }

    /// Reads a field as a typed value, according to the schema.
    pub fn get_val(&self, tx: &mut Transaction, slot: i32, field: &str) -> Result<Value> {
        match self.layout.schema().field_type(field) {
            Some(FieldType::Integer) => Ok(Value::Int(self.get_int(tx, slot, field)?)),
            Some(FieldType::Varchar) => Ok(Value::Varchar(self.get_string(tx, slot, field)?)),
            None => Err(RecordError::UnknownField(field.to_string())),
        }
    }

    pub fn set_int(&self, tx: &mut Transaction, slot: i32, field: &str, val: i32) -> Result<()> {
        let pos = self.field_pos(slot, field)?;
        Ok(tx.set_int(&self.block, pos, val, true)?)
    }

    pub fn set_string(
        &self,
        tx: &mut Transaction,
        slot: i32,
        field: &str,
        val: &str,
    ) -> Result<()> {
        let pos = self.field_pos(slot, field)?;
        Ok(tx.set_string(&self.block, pos, val, true)?)
    }

    /// Writes a typed value into a field, according to the schema.
    pub fn set_val(&self, tx: &mut Transaction, slot: i32, field: &str, val: &Value) -> Result<()> {
        match val {
            Value::Int(n) => self.set_int(tx, slot, field, *n),
            Value::Varchar(s) => self.set_string(tx, slot, field, s),
        }
    }

    /// Marks the slot as deleted.
    pub fn delete(&self, tx: &mut Transaction, slot: i32) -> Result<()> {
        self.set_flag(tx, slot, EMPTY)
    }

    /// Initializes every slot of the block: flags cleared, integer fields
    /// zeroed, string fields emptied. Not logged, since it runs on freshly
    /// appended blocks whose prior contents are logically nonexistent.
    pub fn format(&self, tx: &mut Transaction) -> Result<()> {
        let mut slot = 0;
        while self.is_valid_slot(tx, slot) {
            tx.set_int(&self.block, self.slot_offset(slot), EMPTY, false)?;
            let schema = self.layout.schema();
            for field in schema.fields() {
                let pos = self.field_pos(slot, field)?;
                match schema.field_type(field) {
                    Some(FieldType::Integer) => tx.set_int(&self.block, pos, 0, false)?,
                    Some(FieldType::Varchar) => tx.set_string(&self.block, pos, "", false)?,
                    None => {}
                }
            }
            slot += 1;
        }
        Ok(())
    }

    /// The next used slot after `slot`, or -1 when there is none.
    pub fn next_after(&self, tx: &mut Transaction, slot: i32) -> Result<i32> {
        self.search_after(tx, slot, USED)
    }

    /// Claims the next empty slot after `slot`, marking it used. Returns -1
    /// when the block is full.
    pub fn insert_after(&self, tx: &mut Transaction, slot: i32) -> Result<i32> {
        let new_slot = self.search_after(tx, slot, EMPTY)?;
        if new_slot >= 0 {
            self.set_flag(tx, new_slot, USED)?;
        }
        Ok(new_slot)
    }

    fn search_after(&self, tx: &mut Transaction, mut slot: i32, flag: i32) -> Result<i32> {
        slot += 1;
        while self.is_valid_slot(tx, slot) {
            if tx.get_int(&self.block, self.slot_offset(slot))? == flag {
                return Ok(slot);
            }
            slot += 1;
        }
        Ok(-1)
    }

    fn set_flag(&self, tx: &mut Transaction, slot: i32, flag: i32) -> Result<()> {
        Ok(tx.set_int(&self.block, self.slot_offset(slot), flag, true)?)
    }

    fn is_valid_slot(&self, tx: &Transaction, slot: i32) -> bool {
        self.slot_offset(slot + 1) <= tx.block_size()
    }

    fn slot_offset(&self, slot: i32) -> usize {
        slot as usize * self.layout.slot_size()
    }

    fn field_pos(&self, slot: i32, field: &str) -> Result<usize> {
        let offset = self
            .layout
            .offset(field)
            .ok_or_else(|| RecordError::UnknownField(field.to_string()))?;
        Ok(self.slot_offset(slot) + offset)
    }
}
