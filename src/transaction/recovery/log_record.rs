use thiserror::Error;

use crate::storage::file::{max_length, BlockId, Page};
use crate::storage::log::{LogError, LogManager};
use crate::transaction::Transaction;

/// Record type tags, the first word of every log record.
pub const CHECKPOINT: i32 = 0;
pub const START: i32 = 1;
pub const COMMIT: i32 = 2;
pub const ROLLBACK: i32 = 3;
pub const SETINT: i32 = 4;
pub const SETSTRING: i32 = 5;

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("unrecognized log record type {0}")]
    UnknownRecordType(i32),
}

/// One record of the write-ahead log, dispatched on its leading type tag.
///
/// The update records carry the *old* value of the modified location, so
/// applying `undo` restores the pre-image. Every field is written through
/// the page codec: 4-byte big-endian integers, length-prefixed strings.
///
/// Wire layouts:
/// - `Checkpoint`: tag
/// - `Start` / `Commit` / `Rollback`: tag, txnum
/// - `SetInt`: tag, txnum, filename, blknum, offset, old value
/// - `SetString`: tag, txnum, filename, blknum, offset, old value
#[derive(Debug, Clone, PartialEq)]
pub enum LogRecord {
    Checkpoint,
    Start {
        txnum: i32,
    },
    Commit {
        txnum: i32,
    },
    Rollback {
        txnum: i32,
    },
    SetInt {
        txnum: i32,
        block: BlockId,
        offset: i32,
        val: i32,
    },
    SetString {
        txnum: i32,
        block: BlockId,
        offset: i32,
        val: String,
    },
}

impl LogRecord {
    /// Decodes a record from the bytes returned by the log iterator.
    pub fn from_bytes(bytes: &[u8]) -> Result<LogRecord, RecoveryError> {
        let p = Page::from_bytes(bytes.to_vec());
        let tag = p.get_int(0);
        match tag {
            CHECKPOINT => Ok(LogRecord::Checkpoint),
            START => Ok(LogRecord::Start { txnum: p.get_int(4) }),
            COMMIT => Ok(LogRecord::Commit { txnum: p.get_int(4) }),
            ROLLBACK => Ok(LogRecord::Rollback { txnum: p.get_int(4) }),
            SETINT => {
                let (txnum, block, offset, vpos) = Self::decode_update_header(&p);
                Ok(LogRecord::SetInt {
                    txnum,
                    block,
                    offset,
                    val: p.get_int(vpos),
                })
            }
            SETSTRING => {
                let (txnum, block, offset, vpos) = Self::decode_update_header(&p);
                Ok(LogRecord::SetString {
                    txnum,
                    block,
                    offset,
                    val: p.get_string(vpos),
                })
            }
            other => Err(RecoveryError::UnknownRecordType(other)),
        }
    }

    /// Encodes the record into its on-disk representation.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            LogRecord::Checkpoint => {
                let mut p = Page::from_bytes(vec![0; 4]);
                p.set_int(0, CHECKPOINT);
                p.into_contents()
            }
            LogRecord::Start { txnum } => Self::encode_tx_only(START, *txnum),
            LogRecord::Commit { txnum } => Self::encode_tx_only(COMMIT, *txnum),
            LogRecord::Rollback { txnum } => Self::encode_tx_only(ROLLBACK, *txnum),
            LogRecord::SetInt {
                txnum,
                block,
                offset,
                val,
            } => {
                let vpos = Self::value_pos(block);
                let mut p = Page::from_bytes(vec![0; vpos + 4]);
                Self::encode_update_header(&mut p, SETINT, *txnum, block, *offset);
                p.set_int(vpos, *val);
                p.into_contents()
            }
            LogRecord::SetString {
                txnum,
                block,
                offset,
                val,
            } => {
                let vpos = Self::value_pos(block);
                let mut p = Page::from_bytes(vec![0; vpos + max_length(val.len())]);
                Self::encode_update_header(&mut p, SETSTRING, *txnum, block, *offset);
                p.set_string(vpos, val);
                p.into_contents()
            }
        }
    }

    /// Appends the record to the log and returns its LSN.
    pub fn write_to_log(&self, lm: &LogManager) -> Result<i32, LogError> {
        lm.append(&self.to_bytes())
    }

    /// The transaction the record belongs to; checkpoints belong to none.
    pub fn tx_number(&self) -> i32 {
        match self {
            LogRecord::Checkpoint => -1,
            LogRecord::Start { txnum }
            | LogRecord::Commit { txnum }
            | LogRecord::Rollback { txnum } => *txnum,
            LogRecord::SetInt { txnum, .. } | LogRecord::SetString { txnum, .. } => *txnum,
        }
    }

    /// Reverts the change described by this record, writing the stored old
    /// value back without logging. Non-update records have nothing to undo.
    pub fn undo(&self, tx: &mut Transaction) -> crate::transaction::Result<()> {
        match self {
            LogRecord::SetInt {
                block, offset, val, ..
            } => {
                tx.pin(block)?;
                tx.set_int(block, *offset as usize, *val, false)?;
                tx.unpin(block)?;
                Ok(())
            }
            LogRecord::SetString {
                block, offset, val, ..
            } => {
                tx.pin(block)?;
                tx.set_string(block, *offset as usize, val, false)?;
                tx.unpin(block)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn encode_tx_only(tag: i32, txnum: i32) -> Vec<u8> {
        let mut p = Page::from_bytes(vec![0; 8]);
        p.set_int(0, tag);
        p.set_int(4, txnum);
        p.into_contents()
    }

    fn value_pos(block: &BlockId) -> usize {
        // tag, txnum, filename, blknum, offset
        4 + 4 + max_length(block.file_name().len()) + 4 + 4
    }

    fn encode_update_header(p: &mut Page, tag: i32, txnum: i32, block: &BlockId, offset: i32) {
        let fpos = 8;
        let bpos = fpos + max_length(block.file_name().len());
        let opos = bpos + 4;
        p.set_int(0, tag);
        p.set_int(4, txnum);
        p.set_string(fpos, block.file_name());
        p.set_int(bpos, block.number());
        p.set_int(opos, offset);
    }

    fn decode_update_header(p: &Page) -> (i32, BlockId, i32, usize) {
        let txnum = p.get_int(4);
        let fpos = 8;
        let filename = p.get_string(fpos);
        let bpos = fpos + max_length(filename.len());
        let blknum = p.get_int(bpos);
        let opos = bpos + 4;
        let offset = p.get_int(opos);
        (txnum, BlockId::new(filename, blknum), offset, opos + 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_only_records_round_trip() {
        for record in [
            LogRecord::Checkpoint,
            LogRecord::Start { txnum: 7 },
            LogRecord::Commit { txnum: 8 },
            LogRecord::Rollback { txnum: 9 },
        ] {
            let decoded = LogRecord::from_bytes(&record.to_bytes()).unwrap();
            assert_eq!(decoded, record);
        }
    }

    #[test]
    fn test_set_int_round_trip() {
        let record = LogRecord::SetInt {
            txnum: 3,
            block: BlockId::new("t.tbl", 12),
            offset: 80,
            val: -12345,
        };
        let decoded = LogRecord::from_bytes(&record.to_bytes()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_set_string_round_trip() {
        let record = LogRecord::SetString {
            txnum: 3,
            block: BlockId::new("names.tbl", 0),
            offset: 44,
            val: "old value".to_string(),
        };
        let decoded = LogRecord::from_bytes(&record.to_bytes()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_tag_is_big_endian() {
        let bytes = LogRecord::Start { txnum: 1 }.to_bytes();
        assert_eq!(&bytes[0..4], &[0, 0, 0, 1]);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 1]);
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let mut p = Page::from_bytes(vec![0; 8]);
        p.set_int(0, 99);
        assert!(matches!(
            LogRecord::from_bytes(p.contents()),
            Err(RecoveryError::UnknownRecordType(99))
        ));
    }
}
