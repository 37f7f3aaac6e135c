use std::sync::Arc;

use parking_lot::Mutex;

use crate::storage::buffer::BufferError;
use crate::storage::file::{BlockId, FileManager, Page};
use crate::storage::log::LogManager;

/// Shared handle to a buffer frame. The frame mutex guards the page contents
/// and the frame metadata; pin accounting is coordinated by the buffer
/// manager, which locks frames in a fixed manager-then-frame order.
pub type BufferPtr = Arc<Mutex<Buffer>>;

/// One frame of the buffer pool: a page plus the identity of the block it
/// currently holds, its pin count, and, when dirty, the modifying
/// transaction and the LSN of its most recent log record.
#[derive(Debug)]
pub struct Buffer {
    fm: Arc<FileManager>,
    lm: Arc<LogManager>,
    contents: Page,
    block: Option<BlockId>,
    pins: i32,
    txnum: i32,
    lsn: i32,
}

impl Buffer {
    pub(crate) fn new(fm: Arc<FileManager>, lm: Arc<LogManager>) -> Self {
        let contents = Page::new(fm.block_size());
        Self {
            fm,
            lm,
            contents,
            block: None,
            pins: 0,
            txnum: -1,
            lsn: -1,
        }
    }

    pub fn contents(&self) -> &Page {
        &self.contents
    }

    pub fn contents_mut(&mut self) -> &mut Page {
        &mut self.contents
    }

    pub fn block(&self) -> Option<&BlockId> {
        self.block.as_ref()
    }

    /// Marks the buffer as modified by the given transaction. A negative LSN
    /// means the change was not logged and leaves the recorded LSN alone.
    pub fn set_modified(&mut self, txnum: i32, lsn: i32) {
        self.txnum = txnum;
        if lsn >= 0 {
            self.lsn = lsn;
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.pins > 0
    }

    pub fn modifying_tx(&self) -> i32 {
        self.txnum
    }

    /// Reads the given block into this frame, first flushing any dirty
    /// contents it held for a previous block.
    pub(crate) fn assign_to_block(&mut self, block: BlockId) -> Result<(), BufferError> {
        self.flush()?;
        self.fm.read(&block, &mut self.contents)?;
        self.block = Some(block);
        self.pins = 0;
        Ok(())
    }

    /// Writes the frame to disk if dirty. The log is flushed through the
    /// frame's LSN first, which is what enforces the write-ahead rule.
    pub(crate) fn flush(&mut self) -> Result<(), BufferError> {
        if self.txnum >= 0 {
            self.lm.flush(self.lsn)?;
            if let Some(block) = &self.block {
                self.fm.write(block, &self.contents)?;
            }
            self.txnum = -1;
        }
        Ok(())
    }

    pub(crate) fn pin(&mut self) {
        self.pins += 1;
    }

    pub(crate) fn unpin(&mut self) {
        self.pins -= 1;
    }
}
