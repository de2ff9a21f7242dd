//! Field mappings of the searched index.
//!
//! Mappings answer the schema questions of a fetch: whether a requested name
//! is a leaf or an object, which objects are nested, which fields live in the
//! row store, and how sources are kept.

mod document;
mod field;
mod service;

pub use document::{DocumentMapping, SourceMapping};
pub use field::{FieldMapping, ObjectMapping};
pub use service::{
    MappingService, ID_FIELD, NODE_FIELD, ROUTING_FIELD, SOURCE_FIELD, UID_FIELD,
};
