//! Stored field loading.

use crate::error::Error;
use crate::index::{IndexReader, SegmentDoc};

use super::visitor::FieldsVisitor;

/// Reset `visitor` and fill it with the stored values of `doc`.
pub fn load_stored_fields(
    reader: &dyn IndexReader,
    doc: SegmentDoc,
    visitor: &mut FieldsVisitor,
) -> Result<(), Error> {
    visitor.reset();
    reader
        .visit_document(doc.segment, doc.local, visitor)
        .map_err(|source| Error::StoredRead {
            doc_id: doc.global(),
            source,
        })
}
