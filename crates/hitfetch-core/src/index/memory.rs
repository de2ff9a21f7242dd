//! In-memory segmented index with a block-join nested layout.
//!
//! Each indexed source document becomes one contiguous block: its nested
//! instances first, the root document last. Within a block the order is the
//! reverse of a pre-order walk, so every nested document precedes its parent
//! and later siblings precede earlier ones.

use std::io;
use std::mem;
use std::sync::Arc;

use bytes::Bytes;
use hitfetch_proto::{SourceFormat, Value};
use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use super::cache::BitsetCache;
use super::membership::MembershipSet;
use super::reader::{sub_index, IndexReader, Predicate, SegmentDoc, StoredFieldVisitor};
use crate::error::Error;
use crate::mapping::{DocumentMapping, MappingService, ROUTING_FIELD, UID_FIELD};

/// One stored field of a document.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct StoredField {
    pub name: String,
    pub values: Vec<Value>,
}

/// Stored representation of a single (root or nested) document.
#[derive(Debug, Clone, PartialEq, Default, Archive, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Stored fields in first-seen order.
    pub fields: Vec<StoredField>,
    /// Original source bytes, root documents only.
    pub source: Option<Vec<u8>>,
    /// Encoding of `source`.
    pub source_format: Option<SourceFormat>,
}

impl StoredDocument {
    /// Append a value to a field, creating the field on first use.
    pub fn push(&mut self, name: &str, value: Value) {
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(field) => field.values.push(value),
            None => self.fields.push(StoredField {
                name: name.to_string(),
                values: vec![value],
            }),
        }
    }

    /// Serialize the document using rkyv.
    pub fn to_bytes(&self) -> Result<AlignedVec, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a document using rkyv.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// A source document submitted for indexing.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub doc_type: String,
    pub id: String,
    pub routing: Option<String>,
    pub source: Bytes,
    pub format: SourceFormat,
}

impl SourceDocument {
    /// A JSON source document.
    pub fn new(doc_type: impl Into<String>, id: impl Into<String>, source: impl Into<Bytes>) -> Self {
        Self {
            doc_type: doc_type.into(),
            id: id.into(),
            routing: None,
            source: source.into(),
            format: SourceFormat::Json,
        }
    }

    /// Encode a tree as the document source.
    pub fn from_tree(
        doc_type: impl Into<String>,
        id: impl Into<String>,
        tree: &JsonValue,
        format: SourceFormat,
    ) -> Result<Self, Error> {
        let bytes = format.encode(tree)?;
        Ok(Self::new(doc_type, id, bytes).with_format(format))
    }

    pub fn with_format(mut self, format: SourceFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_routing(mut self, routing: impl Into<String>) -> Self {
        self.routing = Some(routing.into());
        self
    }
}

#[derive(Debug, Default)]
struct Segment {
    doc_base: u32,
    docs: Vec<AlignedVec>,
    /// Nested object path of each doc, `None` for roots.
    scopes: Vec<Option<String>>,
}

impl Segment {
    fn len(&self) -> u32 {
        self.docs.len() as u32
    }

    fn members(&self, predicate: &Predicate) -> MembershipSet {
        self.scopes
            .iter()
            .enumerate()
            .filter(|(_, scope)| match predicate {
                Predicate::Root => scope.is_none(),
                Predicate::Nested(path) => scope.as_deref() == Some(path.as_str()),
            })
            .map(|(local, _)| local as u32)
            .collect()
    }
}

struct PendingDoc {
    scope: Option<String>,
    doc: StoredDocument,
}

impl PendingDoc {
    fn new(scope: Option<String>) -> Self {
        Self {
            scope,
            doc: StoredDocument::default(),
        }
    }
}

/// Builds a [`MemoryIndex`] segment by segment.
pub struct IndexBuilder {
    mappings: MappingService,
    sealed: Vec<Segment>,
    current: Segment,
}

impl IndexBuilder {
    /// Create a builder for documents described by `mappings`.
    pub fn new(mappings: MappingService) -> Self {
        Self {
            mappings,
            sealed: Vec::new(),
            current: Segment::default(),
        }
    }

    /// Index one document and its nested instances.
    ///
    /// Returns the global doc id of the root document.
    pub fn add_document(&mut self, document: &SourceDocument) -> Result<u32, Error> {
        let mapping = self
            .mappings
            .document_mapping(&document.doc_type)
            .ok_or_else(|| {
                Error::InvalidData(format!("no mapping for type [{}]", document.doc_type))
            })?;

        let tree = document.format.decode(&document.source)?;
        let object = tree.as_object().ok_or_else(|| {
            Error::InvalidData(format!(
                "source of [{}#{}] is not an object",
                document.doc_type, document.id
            ))
        })?;

        let mut pending = vec![PendingDoc::new(None)];
        expand(mapping, object, "", 0, &mut pending)?;

        let root = &mut pending[0].doc;
        root.push(
            UID_FIELD,
            Value::String(format!("{}#{}", document.doc_type, document.id)),
        );
        if let Some(routing) = &document.routing {
            root.push(ROUTING_FIELD, Value::from(routing.as_str()));
        }
        if mapping.source.enabled && !mapping.source.external {
            root.source = Some(document.source.to_vec());
            root.source_format = Some(document.format);
        }

        pending.reverse();
        let encoded = pending
            .iter()
            .map(|p| p.doc.to_bytes())
            .collect::<Result<Vec<_>, _>>()?;
        let nested = encoded.len() - 1;
        for (bytes, p) in encoded.into_iter().zip(pending) {
            self.current.docs.push(bytes);
            self.current.scopes.push(p.scope);
        }

        let root_id = self.current.doc_base + self.current.len() - 1;
        debug!(
            doc_type = %document.doc_type,
            id = %document.id,
            doc_id = root_id,
            nested,
            "Indexed document"
        );
        Ok(root_id)
    }

    /// Seal the current segment. Empty segments are never sealed.
    pub fn flush_segment(&mut self) {
        if self.current.docs.is_empty() {
            return;
        }
        let next_base = self.current.doc_base + self.current.len();
        self.sealed.push(mem::take(&mut self.current));
        self.current.doc_base = next_base;
    }

    /// Finish indexing.
    pub fn build(mut self) -> MemoryIndex {
        self.flush_segment();
        MemoryIndex::new(self.sealed)
    }
}

fn expand(
    mapping: &DocumentMapping,
    object: &Map<String, JsonValue>,
    prefix: &str,
    target: usize,
    pending: &mut Vec<PendingDoc>,
) -> Result<(), Error> {
    for (key, value) in object {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match mapping.object(&path) {
            Some(nested) if nested.nested => {
                let instances: Vec<&JsonValue> = match value {
                    JsonValue::Array(items) => items.iter().collect(),
                    JsonValue::Null => Vec::new(),
                    other => vec![other],
                };
                for instance in instances {
                    let fields = instance.as_object().ok_or_else(|| {
                        Error::InvalidData(format!("nested field [{path}] holds a non-object value"))
                    })?;
                    pending.push(PendingDoc::new(Some(path.clone())));
                    let index = pending.len() - 1;
                    expand(mapping, fields, &path, index, pending)?;
                }
            }
            _ => index_value(mapping, &path, value, target, pending)?,
        }
    }
    Ok(())
}

fn index_value(
    mapping: &DocumentMapping,
    path: &str,
    value: &JsonValue,
    target: usize,
    pending: &mut Vec<PendingDoc>,
) -> Result<(), Error> {
    match value {
        JsonValue::Object(fields) => expand(mapping, fields, path, target, pending),
        JsonValue::Array(items) => items
            .iter()
            .try_for_each(|item| index_value(mapping, path, item, target, pending)),
        scalar => {
            if mapping.field(path).is_some_and(|f| f.stored) {
                pending[target].doc.push(path, Value::from_json(scalar));
            }
            Ok(())
        }
    }
}

/// A read-only segmented index held in memory.
#[derive(Debug)]
pub struct MemoryIndex {
    segments: Vec<Segment>,
    doc_bases: Vec<u32>,
    bitsets: BitsetCache,
}

impl MemoryIndex {
    fn new(segments: Vec<Segment>) -> Self {
        let doc_bases = segments.iter().map(|s| s.doc_base).collect();
        Self {
            segments,
            doc_bases,
            bitsets: BitsetCache::new(),
        }
    }

    /// Number of sealed segments.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Global ids of all documents matching `predicate`, ascending.
    pub fn matching(&self, predicate: &Predicate) -> Vec<u32> {
        self.segments
            .iter()
            .enumerate()
            .filter_map(|(segment, seg)| {
                self.membership(segment, predicate)
                    .map(|set| set.iter().map(|local| seg.doc_base + local).collect::<Vec<_>>())
            })
            .flatten()
            .collect()
    }

    /// The membership set cache.
    pub fn bitset_cache(&self) -> &BitsetCache {
        &self.bitsets
    }
}

impl IndexReader for MemoryIndex {
    fn max_doc(&self) -> u32 {
        self.segments
            .last()
            .map(|s| s.doc_base + s.len())
            .unwrap_or(0)
    }

    fn resolve(&self, doc_id: u32) -> Option<SegmentDoc> {
        if doc_id >= self.max_doc() {
            return None;
        }
        let segment = sub_index(&self.doc_bases, doc_id);
        let doc_base = self.segments.get(segment)?.doc_base;
        Some(SegmentDoc {
            segment,
            doc_base,
            local: doc_id - doc_base,
        })
    }

    fn visit_document(
        &self,
        segment: usize,
        local_doc: u32,
        visitor: &mut dyn StoredFieldVisitor,
    ) -> io::Result<()> {
        let bytes = self
            .segments
            .get(segment)
            .and_then(|s| s.docs.get(local_doc as usize))
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no document [{local_doc}] in segment [{segment}]"),
                )
            })?;
        let doc = StoredDocument::from_bytes(bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

        for field in doc.fields {
            if visitor.needs_field(&field.name) {
                for value in field.values {
                    visitor.visit_value(&field.name, value);
                }
            }
        }
        if let Some(source) = doc.source {
            if visitor.needs_source() {
                visitor.visit_source(Bytes::from(source), doc.source_format.unwrap_or_default());
            }
        }
        Ok(())
    }

    fn membership(&self, segment: usize, predicate: &Predicate) -> Option<Arc<MembershipSet>> {
        let seg = self.segments.get(segment)?;
        let set = self
            .bitsets
            .get_or_build(segment, predicate, || seg.members(predicate));
        if set.is_empty() {
            None
        } else {
            Some(set)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{FieldMapping, ObjectMapping};
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Collect {
        fields: HashMap<String, Vec<Value>>,
        source: Option<Bytes>,
    }

    impl StoredFieldVisitor for Collect {
        fn needs_field(&self, _name: &str) -> bool {
            true
        }

        fn needs_source(&self) -> bool {
            true
        }

        fn visit_value(&mut self, name: &str, value: Value) {
            self.fields.entry(name.to_string()).or_default().push(value);
        }

        fn visit_source(&mut self, source: Bytes, _format: SourceFormat) {
            self.source = Some(source);
        }
    }

    fn mappings() -> MappingService {
        MappingService::new().with_mapping(
            DocumentMapping::new("post")
                .with_field(FieldMapping::stored("title"))
                .with_field(FieldMapping::stored("comments.text"))
                .with_object(ObjectMapping::nested("comments")),
        )
    }

    fn post(id: &str, comments: usize) -> SourceDocument {
        let comments: Vec<_> = (0..comments).map(|i| json!({"text": format!("c{i}")})).collect();
        let tree = json!({"title": format!("post {id}"), "comments": comments});
        SourceDocument::from_tree("post", id, &tree, SourceFormat::Json).unwrap()
    }

    fn read(index: &MemoryIndex, doc_id: u32) -> Collect {
        let doc = index.resolve(doc_id).unwrap();
        let mut visitor = Collect::default();
        index
            .visit_document(doc.segment, doc.local, &mut visitor)
            .unwrap();
        visitor
    }

    #[test]
    fn test_block_join_layout() {
        let mut builder = IndexBuilder::new(mappings());
        let root = builder.add_document(&post("1", 3)).unwrap();
        let index = builder.build();

        assert_eq!(root, 3);
        assert_eq!(index.max_doc(), 4);
        assert_eq!(index.matching(&Predicate::Root), vec![3]);
        assert_eq!(
            index.matching(&Predicate::Nested("comments".into())),
            vec![0, 1, 2]
        );

        assert_eq!(read(&index, 0).fields["comments.text"], vec![Value::from("c2")]);
        assert_eq!(read(&index, 2).fields["comments.text"], vec![Value::from("c0")]);
    }

    #[test]
    fn test_root_keeps_source_bytes_and_uid() {
        let document = SourceDocument::new("post", "7", &b"{ \"title\" : \"spaced\" }"[..])
            .with_routing("r1");
        let mut builder = IndexBuilder::new(mappings());
        let root = builder.add_document(&document).unwrap();
        let index = builder.build();

        let stored = read(&index, root);
        assert_eq!(stored.source.unwrap(), document.source);
        assert_eq!(stored.fields[UID_FIELD], vec![Value::from("post#7")]);
        assert_eq!(stored.fields[ROUTING_FIELD], vec![Value::from("r1")]);
        assert_eq!(stored.fields["title"], vec![Value::from("spaced")]);
    }

    #[test]
    fn test_segments() {
        let mut builder = IndexBuilder::new(mappings());
        builder.add_document(&post("1", 1)).unwrap();
        builder.flush_segment();
        builder.flush_segment();
        let second = builder.add_document(&post("2", 2)).unwrap();
        let index = builder.build();

        assert_eq!(index.segment_count(), 2);
        assert_eq!(second, 4);
        assert_eq!(
            index.resolve(3),
            Some(SegmentDoc {
                segment: 1,
                doc_base: 2,
                local: 1
            })
        );
        assert_eq!(index.resolve(5), None);
        assert_eq!(index.matching(&Predicate::Root), vec![1, 4]);
    }

    #[test]
    fn test_membership_absent_when_empty() {
        let mut builder = IndexBuilder::new(mappings());
        builder.add_document(&post("1", 0)).unwrap();
        let index = builder.build();

        assert!(index.membership(0, &Predicate::Root).is_some());
        assert!(index
            .membership(0, &Predicate::Nested("comments".into()))
            .is_none());
        assert!(index.membership(9, &Predicate::Root).is_none());
        assert_eq!(index.bitset_cache().len(), 2);
    }

    #[test]
    fn test_rejects_unknown_type_and_bad_nested_values() {
        let mut builder = IndexBuilder::new(mappings());
        let err = builder
            .add_document(&SourceDocument::new("user", "1", &b"{}"[..]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));

        let err = builder
            .add_document(&SourceDocument::new("post", "1", &b"{\"comments\":[1]}"[..]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[test]
    fn test_missing_document_is_io_error() {
        let index = IndexBuilder::new(mappings()).build();
        let err = index
            .visit_document(0, 0, &mut Collect::default())
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
