use std::sync::Arc;

use crate::storage::file::{BlockId, FileError, FileManager, Page};

/// Iterates over log records in reverse insertion order, newest first.
///
/// Within a block, records are visited by walking forward from the boundary
/// (the block is laid out right-to-left, so forward order is newest-to-oldest).
/// When a block is exhausted, iteration continues with the previous block of
/// the log file, down to block 0.
pub struct LogIterator {
    fm: Arc<FileManager>,
    block: BlockId,
    page: Page,
    current_pos: usize,
}

impl LogIterator {
    pub(crate) fn new(fm: Arc<FileManager>, block: BlockId) -> Result<Self, FileError> {
        let mut page = Page::new(fm.block_size());
        fm.read(&block, &mut page)?;
        let boundary = page.get_int(0) as usize;
        Ok(Self {
            fm,
            block,
            page,
            current_pos: boundary,
        })
    }

    fn has_next(&self) -> bool {
        self.current_pos < self.fm.block_size() || self.block.number() > 0
    }

    fn move_to_block(&mut self, block: BlockId) -> Result<(), FileError> {
        self.fm.read(&block, &mut self.page)?;
        self.current_pos = self.page.get_int(0) as usize;
        self.block = block;
        Ok(())
    }
}

impl Iterator for LogIterator {
    type Item = Result<Vec<u8>, FileError>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_next() {
            return None;
        }

        if self.current_pos == self.fm.block_size() {
            let prev = BlockId::new(self.block.file_name(), self.block.number() - 1);
            if let Err(e) = self.move_to_block(prev) {
                return Some(Err(e));
            }
        }

        let record = self.page.get_bytes(self.current_pos);
        self.current_pos += 4 + record.len();
        Some(Ok(record))
    }
}
