// Export public modules
pub mod common;
pub mod index;
pub mod record;
pub mod server;
pub mod storage;
pub mod transaction;

// Re-export key items for convenient access
pub use common::value::Value;
pub use index::Index;
pub use server::CentauriDB;
pub use storage::buffer::BufferManager;
pub use storage::file::{BlockId, FileManager, Page};
pub use storage::log::LogManager;
pub use transaction::concurrency::LockTable;
pub use transaction::Transaction;
