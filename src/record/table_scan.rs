use std::sync::Arc;

use crate::common::value::Value;
use crate::record::layout::Layout;
use crate::record::record_page::RecordPage;
use crate::record::rid::Rid;
use crate::record::{RecordError, Result};
use crate::storage::file::BlockId;
use crate::transaction::Transaction;

/// A cursor over the records of a heap table file.
///
/// The scan walks the `.tbl` file block by block, visiting used slots in
/// order. `insert` finds the next free slot, chaining into later blocks and
/// appending a freshly formatted block at the end of the file when the
/// table is full. Every operation threads the owning transaction, so reads
/// and writes inherit its locking and logging.
pub struct TableScan {
    filename: String,
    layout: Arc<Layout>,
    rp: Option<RecordPage>,
    current_slot: i32,
}

impl TableScan {
    pub fn new(tx: &mut Transaction, table_name: &str, layout: Arc<Layout>) -> Result<Self> {
        let mut ts = Self {
            filename: format!("{}.tbl", table_name),
            layout,
            rp: None,
            current_slot: -1,
        };
        if tx.size(&ts.filename)? == 0 {
            ts.move_to_new_block(tx)?;
        } else {
            ts.move_to_block(tx, 0)?;
        }
        Ok(ts)
    }

    /// Repositions the scan before the first record of the table.
    pub fn before_first(&mut self, tx: &mut Transaction) -> Result<()> {
        self.move_to_block(tx, 0)
    }

    /// Advances to the next record. Returns false at the end of the table.
    pub fn next(&mut self, tx: &mut Transaction) -> Result<bool> {
        loop {
            self.current_slot = self.record_page()?.next_after(tx, self.current_slot)?;
            if self.current_slot >= 0 {
                return Ok(true);
            }
            if self.at_last_block(tx)? {
                return Ok(false);
            }
            let next_block = self.record_page()?.block().number() + 1;
            self.move_to_block(tx, next_block)?;
        }
    }

    pub fn get_int(&self, tx: &mut Transaction, field: &str) -> Result<i32> {
        self.record_page()?.get_int(tx, self.current_slot, field)
    }

    pub fn get_string(&self, tx: &mut Transaction, field: &str) -> Result<String> {
        self.record_page()?.get_string(tx, self.current_slot, field)
    }

    pub fn get_val(&self, tx: &mut Transaction, field: &str) -> Result<Value> {
        self.record_page()?.get_val(tx, self.current_slot, field)
    }

    pub fn set_int(&self, tx: &mut Transaction, field: &str, val: i32) -> Result<()> {
        self.record_page()?
            .set_int(tx, self.current_slot, field, val)
    }

    pub fn set_string(&self, tx: &mut Transaction, field: &str, val: &str) -> Result<()> {
        self.record_page()?
            .set_string(tx, self.current_slot, field, val)
    }

    pub fn set_val(&self, tx: &mut Transaction, field: &str, val: &Value) -> Result<()> {
        self.record_page()?
            .set_val(tx, self.current_slot, field, val)
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.layout.schema().has_field(field)
    }

    /// Claims a free slot for a new record, extending the table if needed.
    pub fn insert(&mut self, tx: &mut Transaction) -> Result<()> {
        self.current_slot = self.record_page()?.insert_after(tx, self.current_slot)?;
        while self.current_slot < 0 {
            if self.at_last_block(tx)? {
                self.move_to_new_block(tx)?;
            } else {
                let next_block = self.record_page()?.block().number() + 1;
                self.move_to_block(tx, next_block)?;
            }
            self.current_slot = self.record_page()?.insert_after(tx, self.current_slot)?;
        }
        Ok(())
    }

    /// Deletes the current record.
    pub fn delete(&self, tx: &mut Transaction) -> Result<()> {
        self.record_page()?.delete(tx, self.current_slot)
    }

    /// The identity of the current record.
    pub fn rid(&self) -> Result<Rid> {
        Ok(Rid::new(
            self.record_page()?.block().number(),
            self.current_slot,
        ))
    }

    /// Positions the scan on the given record.
    pub fn move_to_rid(&mut self, tx: &mut Transaction, rid: Rid) -> Result<()> {
        self.close(tx)?;
        let block = BlockId::new(self.filename.clone(), rid.block_number());
        self.rp = Some(RecordPage::new(tx, block, self.layout.clone())?);
        self.current_slot = rid.slot();
        Ok(())
    }

    /// Unpins the current block; call when done with the scan.
    pub fn close(&mut self, tx: &mut Transaction) -> Result<()> {
        if let Some(rp) = self.rp.take() {
            tx.unpin(rp.block())?;
        }
        Ok(())
    }

    fn move_to_block(&mut self, tx: &mut Transaction, blknum: i32) -> Result<()> {
        self.close(tx)?;
        let block = BlockId::new(self.filename.clone(), blknum);
        self.rp = Some(RecordPage::new(tx, block, self.layout.clone())?);
        self.current_slot = -1;
        Ok(())
    }

    fn move_to_new_block(&mut self, tx: &mut Transaction) -> Result<()> {
        self.close(tx)?;
        let block = tx.append(&self.filename)?;
        let rp = RecordPage::new(tx, block, self.layout.clone())?;
        rp.format(tx)?;
        self.rp = Some(rp);
        self.current_slot = -1;
        Ok(())
    }

    fn at_last_block(&self, tx: &mut Transaction) -> Result<bool> {
        Ok(self.record_page()?.block().number() == tx.size(&self.filename)? - 1)
    }

    fn record_page(&self) -> Result<&RecordPage> {
        self.rp.as_ref().ok_or(RecordError::ScanClosed)
    }
}
