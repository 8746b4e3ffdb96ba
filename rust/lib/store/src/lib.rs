//! Table storage for JSON-document records.
//!
//! Each record is stored whole in a `data` column, with the fields it
//! declares in [`Record::COLUMNS`] copied into dedicated columns for
//! filtering, ordering and uniqueness. [`Table`] provides CRUD plus
//! filtered queries; every successful write is published to a
//! [`ChangeFeed`].

pub mod feed;
pub mod query;
pub mod record;
pub mod table;

pub use feed::{ChangeBatch, ChangeEvent, ChangeFeed, ChangeOp};
pub use query::{Filter, Query};
pub use record::{Column, ColumnKind, Record};
pub use table::Table;
