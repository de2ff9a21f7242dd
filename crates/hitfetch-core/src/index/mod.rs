//! Segmented primary index.
//!
//! The fetch phase only needs read access: resolving global doc ids to
//! segments, visiting stored fields, and cached membership sets for the root
//! and nested predicates. [`MemoryIndex`] is the bundled implementation.

mod cache;
mod membership;
mod memory;
mod reader;

pub use cache::BitsetCache;
pub use membership::MembershipSet;
pub use memory::{IndexBuilder, MemoryIndex, SourceDocument, StoredDocument, StoredField};
pub use reader::{sub_index, IndexReader, Predicate, SegmentDoc, StoredFieldVisitor};
