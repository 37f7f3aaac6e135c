use std::collections::HashSet;
use std::sync::Arc;

use crate::storage::buffer::{Buffer, BufferManager};
use crate::storage::log::LogManager;
use crate::transaction::recovery::log_record::LogRecord;
use crate::transaction::{Result, Transaction, TransactionError};

/// Drives undo-only recovery for one transaction.
///
/// Construction writes the START record; data changes go through `set_int`
/// and `set_string`, which capture the pre-image into an undo record before
/// the page is touched. Commit and rollback flush this transaction's pages
/// and append the terminal record; `recover` runs the quiescent startup
/// scan. The manager holds no back-reference to its transaction; the undo
/// passes receive it as a parameter.
#[derive(Clone)]
pub struct RecoveryManager {
    lm: Arc<LogManager>,
    bm: Arc<BufferManager>,
    txnum: i32,
}

impl RecoveryManager {
    /// Creates the manager and logs the transaction's START record.
    pub fn new(lm: Arc<LogManager>, bm: Arc<BufferManager>, txnum: i32) -> Result<Self> {
        LogRecord::Start { txnum }.write_to_log(&lm)?;
        Ok(Self { lm, bm, txnum })
    }

    /// Makes the transaction durable: flush its dirty pages, then append
    /// and force the COMMIT record.
    pub fn commit(&self) -> Result<()> {
        self.bm.flush_all(self.txnum)?;
        let lsn = LogRecord::Commit { txnum: self.txnum }.write_to_log(&self.lm)?;
        self.lm.flush(lsn)?;
        Ok(())
    }

    /// Undoes every change this transaction logged, newest first, then
    /// appends and forces the ROLLBACK record.
    pub fn rollback(&self, tx: &mut Transaction) -> Result<()> {
        self.do_rollback(tx)?;
        self.bm.flush_all(self.txnum)?;
        let lsn = LogRecord::Rollback { txnum: self.txnum }.write_to_log(&self.lm)?;
        self.lm.flush(lsn)?;
        Ok(())
    }

    /// Quiescent startup recovery: undo every update belonging to a
    /// transaction without a terminal record, stopping at the last
    /// checkpoint, then checkpoint the now-consistent log.
    pub fn recover(&self, tx: &mut Transaction) -> Result<()> {
        self.do_recover(tx)?;
        self.bm.flush_all(self.txnum)?;
        let lsn = LogRecord::Checkpoint.write_to_log(&self.lm)?;
        self.lm.flush(lsn)?;
        Ok(())
    }

    /// Logs the undo record for an integer update. Reads the old value out
    /// of the pinned buffer, so it must run before the page is modified.
    pub fn set_int(&self, buff: &mut Buffer, offset: usize) -> Result<i32> {
        let old_val = buff.contents().get_int(offset);
        let block = buff
            .block()
            .cloned()
            .ok_or(TransactionError::UnassignedBuffer)?;
        Ok(LogRecord::SetInt {
            txnum: self.txnum,
            block,
            offset: offset as i32,
            val: old_val,
        }
        .write_to_log(&self.lm)?)
    }

    /// Logs the undo record for a string update.
    pub fn set_string(&self, buff: &mut Buffer, offset: usize) -> Result<i32> {
        let old_val = buff.contents().get_string(offset);
        let block = buff
            .block()
            .cloned()
            .ok_or(TransactionError::UnassignedBuffer)?;
        Ok(LogRecord::SetString {
            txnum: self.txnum,
            block,
            offset: offset as i32,
            val: old_val,
        }
        .write_to_log(&self.lm)?)
    }

    fn do_rollback(&self, tx: &mut Transaction) -> Result<()> {
        let iter = self.lm.iterator()?;
        for bytes in iter {
            let record = LogRecord::from_bytes(&bytes?)?;
            if record.tx_number() == self.txnum {
                if matches!(record, LogRecord::Start { .. }) {
                    return Ok(());
                }
                record.undo(tx)?;
            }
        }
        Ok(())
    }

    fn do_recover(&self, tx: &mut Transaction) -> Result<()> {
        let mut finished: HashSet<i32> = HashSet::new();
        let iter = self.lm.iterator()?;
        for bytes in iter {
            let record = LogRecord::from_bytes(&bytes?)?;
            match &record {
                LogRecord::Checkpoint => return Ok(()),
                LogRecord::Commit { txnum } | LogRecord::Rollback { txnum } => {
                    finished.insert(*txnum);
                }
                _ => {
                    if !finished.contains(&record.tx_number()) {
                        record.undo(tx)?;
                    }
                }
            }
        }
        Ok(())
    }
}
