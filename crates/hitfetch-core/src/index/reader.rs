//! Index reader contract consumed by the fetch phase.

use std::io;
use std::sync::Arc;

use bytes::Bytes;
use hitfetch_proto::{SourceFormat, Value};

use super::membership::MembershipSet;

/// A structural condition over the documents of a segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Predicate {
    /// Root (non-nested) documents.
    Root,
    /// Nested documents of the given object path.
    Nested(String),
}

/// A global doc id resolved to its segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentDoc {
    /// Segment ordinal.
    pub segment: usize,
    /// First global doc id of the segment.
    pub doc_base: u32,
    /// Segment-local doc id.
    pub local: u32,
}

impl SegmentDoc {
    /// The global doc id.
    pub fn global(&self) -> u32 {
        self.doc_base + self.local
    }

    /// Another document of the same segment.
    pub fn sibling(&self, local: u32) -> Self {
        Self { local, ..*self }
    }
}

/// Receives the stored values of one document.
pub trait StoredFieldVisitor {
    /// Whether values of `name` should be delivered.
    fn needs_field(&self, name: &str) -> bool;

    /// Whether the stored source should be delivered.
    fn needs_source(&self) -> bool;

    /// One stored value, in stored order.
    fn visit_value(&mut self, name: &str, value: Value);

    /// The stored source payload.
    fn visit_source(&mut self, source: Bytes, format: SourceFormat);
}

/// Read access to a segmented primary index.
pub trait IndexReader: Send + Sync {
    /// Number of documents across all segments.
    fn max_doc(&self) -> u32;

    /// Resolve a global doc id to its segment and local id.
    fn resolve(&self, doc_id: u32) -> Option<SegmentDoc>;

    /// Deliver the stored values of one document to `visitor`.
    fn visit_document(
        &self,
        segment: usize,
        local_doc: u32,
        visitor: &mut dyn StoredFieldVisitor,
    ) -> io::Result<()>;

    /// Cached membership set of `predicate` in `segment`.
    ///
    /// Returns `None` when no document of the segment matches.
    fn membership(&self, segment: usize, predicate: &Predicate) -> Option<Arc<MembershipSet>>;
}

/// Index of the segment containing `doc_id`, given ascending doc bases.
pub fn sub_index(doc_bases: &[u32], doc_id: u32) -> usize {
    doc_bases
        .partition_point(|&base| base <= doc_id)
        .saturating_sub(1)
}
