pub mod buffer;
pub mod manager;

pub use buffer::{Buffer, BufferPtr};
pub use manager::{BufferError, BufferManager};
