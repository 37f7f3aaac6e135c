pub mod btree;
pub mod hash;

use thiserror::Error;

use crate::common::value::Value;
use crate::record::rid::Rid;
use crate::record::RecordError;
use crate::transaction::{Transaction, TransactionError};

#[derive(Error, Debug)]
pub enum IndexError {
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("no field named {0} in the index layout")]
    UnknownField(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// Operations common to every index structure.
///
/// An index maps key values to the RIDs of the records holding them. The
/// cursor protocol is: `before_first` positions just before the entries
/// matching a search key, then each `next` advances to one matching entry
/// whose RID `data_rid` returns. Methods receive the operating transaction,
/// so index access is locked and logged like any other block access.
pub trait Index {
    /// Positions the cursor before the first entry with the search key.
    fn before_first(&mut self, tx: &mut Transaction, search_key: &Value) -> Result<()>;

    /// Advances to the next entry with the current search key.
    fn next(&mut self, tx: &mut Transaction) -> Result<bool>;

    /// The RID stored in the current entry.
    fn data_rid(&self, tx: &mut Transaction) -> Result<Rid>;

    /// Adds an entry for the given key and RID.
    fn insert(&mut self, tx: &mut Transaction, key: &Value, rid: Rid) -> Result<()>;

    /// Removes the entry with the given key and RID.
    fn delete(&mut self, tx: &mut Transaction, key: &Value, rid: Rid) -> Result<()>;

    /// Releases any blocks the index still holds pinned.
    fn close(&mut self, tx: &mut Transaction) -> Result<()>;
}

pub use btree::BTreeIndex;
pub use hash::HashIndex;
