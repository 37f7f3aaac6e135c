use std::sync::Arc;

use crate::common::value::Value;
use crate::index::btree::dir::BTreeDir;
use crate::index::btree::leaf::BTreeLeaf;
use crate::index::btree::page::BTPage;
use crate::index::{Index, Result};
use crate::record::layout::Layout;
use crate::record::rid::Rid;
use crate::record::schema::{FieldType, Schema};
use crate::storage::file::BlockId;
use crate::transaction::Transaction;

/// A B-tree index over two files.
///
/// `<name>.dir` holds the directory pages, with the root fixed at block 0;
/// `<name>.leaf` holds the leaf pages and their overflow chains. Leaf
/// entries are `(block, id, dataval)`, the RID plus the indexed key;
/// directory entries are `(block, dataval)`. Duplicate keys beyond one
/// block's capacity spill into overflow blocks linked through the leaf
/// flag. Every page access runs through the operating transaction, so index
/// updates are locked and logged like table updates.
pub struct BTreeIndex {
    dir_layout: Arc<Layout>,
    leaf_layout: Arc<Layout>,
    leaf_file: String,
    root_block: BlockId,
    leaf: Option<BTreeLeaf>,
}

impl BTreeIndex {
    /// Opens the index, creating and formatting its two files on first use:
    /// one empty leaf block, and a root with a single entry routing every
    /// key to it via the minimum value of the key's domain.
    pub fn new(tx: &mut Transaction, idx_name: &str, leaf_layout: Arc<Layout>) -> Result<Self> {
        let leaf_file = format!("{}.leaf", idx_name);
        if tx.size(&leaf_file)? == 0 {
            let block = tx.append(&leaf_file)?;
            let node = BTPage::new(tx, block, leaf_layout.clone())?;
            node.format(tx, -1)?;
            node.close(tx)?;
        }

        let mut dir_schema = Schema::new();
        dir_schema.add("block", leaf_layout.schema());
        dir_schema.add("dataval", leaf_layout.schema());
        let dir_file = format!("{}.dir", idx_name);
        let dir_layout = Arc::new(Layout::new(dir_schema));
        let root_block = BlockId::new(dir_file.clone(), 0);

        if tx.size(&dir_file)? == 0 {
            tx.append(&dir_file)?;
            let node = BTPage::new(tx, root_block.clone(), dir_layout.clone())?;
            node.format(tx, 0)?;
            let min_val = match dir_layout.schema().field_type("dataval") {
                Some(FieldType::Integer) => Value::Int(i32::MIN),
                _ => Value::Varchar(String::new()),
            };
            node.insert_dir(tx, 0, &min_val, 0)?;
            node.close(tx)?;
        }

        Ok(Self {
            dir_layout,
            leaf_layout,
            leaf_file,
            root_block,
            leaf: None,
        })
    }

    /// Estimated block accesses to find the matching entries: one leaf
    /// visit plus the height of the directory.
    pub fn search_cost(num_blocks: usize, rpb: usize) -> usize {
        if num_blocks <= 1 || rpb <= 1 {
            return 1;
        }
        1 + (num_blocks as f64).log(rpb as f64).ceil() as usize
    }
}

impl Index for BTreeIndex {
    /// Descends the directory to the leaf covering the key and positions a
    /// cursor just before its first occurrence.
    fn before_first(&mut self, tx: &mut Transaction, search_key: &Value) -> Result<()> {
        self.close(tx)?;
        let mut root = BTreeDir::new(tx, self.root_block.clone(), self.dir_layout.clone())?;
        let blknum = root.search(tx, search_key)?;
        root.close(tx)?;
        let leaf_block = BlockId::new(self.leaf_file.clone(), blknum);
        self.leaf = Some(BTreeLeaf::new(
            tx,
            leaf_block,
            self.leaf_layout.clone(),
            search_key.clone(),
        )?);
        Ok(())
    }

    fn next(&mut self, tx: &mut Transaction) -> Result<bool> {
        match self.leaf.as_mut() {
            Some(leaf) => leaf.next(tx),
            None => Ok(false),
        }
    }

    fn data_rid(&self, tx: &mut Transaction) -> Result<Rid> {
        match self.leaf.as_ref() {
            Some(leaf) => leaf.get_data_rid(tx),
            None => Err(crate::record::RecordError::ScanClosed.into()),
        }
    }

    /// Inserts an entry, splitting the leaf and updating the directory as
    /// needed; a split that propagates through the root grows the tree.
    fn insert(&mut self, tx: &mut Transaction, key: &Value, rid: Rid) -> Result<()> {
        self.before_first(tx, key)?;
        let entry = match self.leaf.as_mut() {
            Some(leaf) => leaf.insert(tx, rid)?,
            None => None,
        };
        self.close(tx)?;

        let Some(entry) = entry else {
            return Ok(());
        };
        let mut root = BTreeDir::new(tx, self.root_block.clone(), self.dir_layout.clone())?;
        let promoted = root.insert(tx, &entry)?;
        if let Some(promoted) = promoted {
            root.make_new_root(tx, promoted)?;
        }
        root.close(tx)?;
        Ok(())
    }

    /// Removes the entry with the given key and RID, if present.
    fn delete(&mut self, tx: &mut Transaction, key: &Value, rid: Rid) -> Result<()> {
        self.before_first(tx, key)?;
        if let Some(leaf) = self.leaf.as_mut() {
            leaf.delete(tx, rid)?;
        }
        self.close(tx)
    }

    fn close(&mut self, tx: &mut Transaction) -> Result<()> {
        if let Some(leaf) = self.leaf.take() {
            leaf.close(tx)?;
        }
        Ok(())
    }
}
