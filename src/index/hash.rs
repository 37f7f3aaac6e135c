use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::common::value::Value;
use crate::index::{Index, Result};
use crate::record::layout::Layout;
use crate::record::rid::Rid;
use crate::record::table_scan::TableScan;
use crate::transaction::Transaction;

/// Number of bucket tables the index is spread over.
pub const NUM_BUCKETS: u64 = 100;

/// A static hash index.
///
/// Entries are distributed over a fixed number of bucket tables by the hash
/// of their key; each bucket is an ordinary record table scanned with
/// `TableScan`. Entry records have the fields `block`, `id` and `dataval`.
pub struct HashIndex {
    idx_name: String,
    layout: Arc<Layout>,
    search_key: Option<Value>,
    ts: Option<TableScan>,
}

impl HashIndex {
    pub fn new(idx_name: &str, layout: Arc<Layout>) -> Self {
        Self {
            idx_name: idx_name.to_string(),
            layout,
            search_key: None,
            ts: None,
        }
    }

    /// Estimated block accesses to search an index of the given size.
    pub fn search_cost(num_blocks: usize, _rpb: usize) -> usize {
        num_blocks / NUM_BUCKETS as usize
    }

    fn bucket_of(key: &Value) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish() % NUM_BUCKETS
    }
}

impl Index for HashIndex {
    /// Opens a scan on the bucket the search key hashes to.
    fn before_first(&mut self, tx: &mut Transaction, search_key: &Value) -> Result<()> {
        self.close(tx)?;
        self.search_key = Some(search_key.clone());
        let bucket = Self::bucket_of(search_key);
        let table_name = format!("{}{}", self.idx_name, bucket);
        self.ts = Some(TableScan::new(tx, &table_name, self.layout.clone())?);
        Ok(())
    }

    /// Scans forward within the bucket for the next entry whose key matches.
    fn next(&mut self, tx: &mut Transaction) -> Result<bool> {
        let (Some(ts), Some(key)) = (self.ts.as_mut(), self.search_key.as_ref()) else {
            return Ok(false);
        };
        while ts.next(tx)? {
            if ts.get_val(tx, "dataval")? == *key {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn data_rid(&self, tx: &mut Transaction) -> Result<Rid> {
        let Some(ts) = self.ts.as_ref() else {
            return Err(crate::record::RecordError::ScanClosed.into());
        };
        let blknum = ts.get_int(tx, "block")?;
        let id = ts.get_int(tx, "id")?;
        Ok(Rid::new(blknum, id))
    }

    fn insert(&mut self, tx: &mut Transaction, key: &Value, rid: Rid) -> Result<()> {
        self.before_first(tx, key)?;
        let Some(ts) = self.ts.as_mut() else {
            return Err(crate::record::RecordError::ScanClosed.into());
        };
        ts.insert(tx)?;
        ts.set_int(tx, "block", rid.block_number())?;
        ts.set_int(tx, "id", rid.slot())?;
        ts.set_val(tx, "dataval", key)?;
        Ok(())
    }

    fn delete(&mut self, tx: &mut Transaction, key: &Value, rid: Rid) -> Result<()> {
        self.before_first(tx, key)?;
        while self.next(tx)? {
            if self.data_rid(tx)? == rid {
                if let Some(ts) = self.ts.as_ref() {
                    ts.delete(tx)?;
                }
                return Ok(());
            }
        }
        Ok(())
    }

    fn close(&mut self, tx: &mut Transaction) -> Result<()> {
        if let Some(mut ts) = self.ts.take() {
            ts.close(tx)?;
        }
        Ok(())
    }
}
