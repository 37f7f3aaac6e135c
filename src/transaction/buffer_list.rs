use std::collections::HashMap;
use std::sync::Arc;

use crate::storage::buffer::{BufferError, BufferManager, BufferPtr};
use crate::storage::file::BlockId;

/// The buffers pinned by one transaction.
///
/// A block may be pinned more than once; the pin stack records every pin so
/// `unpin_all` can return the pool to its prior state, while the map keeps
/// one handle per distinct block for lookups.
pub struct BufferList {
    buffers: HashMap<BlockId, BufferPtr>,
    pins: Vec<BlockId>,
    bm: Arc<BufferManager>,
}

impl BufferList {
    pub fn new(bm: Arc<BufferManager>) -> Self {
        Self {
            buffers: HashMap::new(),
            pins: Vec::new(),
            bm,
        }
    }

    /// The buffer holding the given block, if this transaction has it pinned.
    pub fn buffer(&self, block: &BlockId) -> Option<BufferPtr> {
        self.buffers.get(block).cloned()
    }

    pub fn pin(&mut self, block: &BlockId) -> Result<(), BufferError> {
        let buff = self.bm.pin(block)?;
        self.buffers.insert(block.clone(), buff);
        self.pins.push(block.clone());
        Ok(())
    }

    /// Releases one pin on the block. Returns false when the block is not
    /// pinned by this transaction.
    pub fn unpin(&mut self, block: &BlockId) -> bool {
        let Some(buff) = self.buffers.get(block).cloned() else {
            return false;
        };
        self.bm.unpin(&buff);

        if let Some(pos) = self.pins.iter().position(|b| b == block) {
            self.pins.swap_remove(pos);
        }
        if !self.pins.contains(block) {
            self.buffers.remove(block);
        }
        true
    }

    /// Releases every pin this transaction has taken.
    pub fn unpin_all(&mut self) {
        for block in self.pins.drain(..) {
            if let Some(buff) = self.buffers.get(&block) {
                self.bm.unpin(buff);
            }
        }
        self.buffers.clear();
    }
}
