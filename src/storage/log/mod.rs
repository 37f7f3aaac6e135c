pub mod iterator;
pub mod manager;

pub use iterator::LogIterator;
pub use manager::{LogError, LogManager};
