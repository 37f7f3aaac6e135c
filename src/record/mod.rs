pub mod layout;
pub mod record_page;
pub mod rid;
pub mod schema;
pub mod table_scan;

use thiserror::Error;

use crate::transaction::TransactionError;

pub use layout::Layout;
pub use record_page::{RecordPage, EMPTY, USED};
pub use rid::Rid;
pub use schema::{FieldType, Schema};
pub use table_scan::TableScan;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error("no field named {0} in the layout")]
    UnknownField(String),

    #[error("scan has been closed")]
    ScanClosed,
}

pub type Result<T> = std::result::Result<T, RecordError>;
