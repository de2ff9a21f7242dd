//! External row store.
//!
//! Documents may keep some of their columns (or their whole source) in a
//! row-oriented store keyed by primary key. The fetch phase compiles one
//! point lookup per document type and request, then runs it per hit.

mod config;
mod lookup;
mod record;
mod store;

pub use config::RowStoreConfig;
pub use lookup::{
    flatten_row, statement_id, ConsistencyLevel, DocPrimaryKey, PreparedLookup, Row, RowStore,
};
pub use record::RowRecord;
pub use store::{SledRowStore, TableDef};
