//! Nested document resolution.
//!
//! Nested documents live in the same segment as their root, laid out in
//! block-join order: every nested document precedes its parent, and the root
//! closes the block. Membership sets per nesting level turn "which parent,
//! which position" into rank/select queries over a bounded range.

use hitfetch_proto::{NestedIdentity, NestedLink};

use crate::error::Error;
use crate::index::{IndexReader, Predicate, SegmentDoc};
use crate::mapping::{DocumentMapping, MappingService, ObjectMapping};

pub struct NestedResolver<'a> {
    reader: &'a dyn IndexReader,
    mappings: &'a MappingService,
}

impl<'a> NestedResolver<'a> {
    pub fn new(reader: &'a dyn IndexReader, mappings: &'a MappingService) -> Self {
        Self { reader, mappings }
    }

    /// The local id of the root document of `doc`, or `None` when `doc` is a
    /// root document itself.
    pub fn find_root(&self, doc: SegmentDoc) -> Result<Option<u32>, Error> {
        if !self.mappings.has_nested() {
            return Ok(None);
        }
        let roots = self
            .reader
            .membership(doc.segment, &Predicate::Root)
            .ok_or_else(|| {
                Error::StructuralConsistency(format!(
                    "segment [{}] has no root documents",
                    doc.segment
                ))
            })?;
        if roots.contains(doc.local) {
            return Ok(None);
        }
        roots.next_at_or_after(doc.local).map(Some).ok_or_else(|| {
            Error::StructuralConsistency(format!(
                "nested doc id [{}] has no following root document",
                doc.global()
            ))
        })
    }

    /// The deepest nested object whose membership contains `doc`.
    pub fn find_nested_object<'m>(
        &self,
        mapping: &'m DocumentMapping,
        doc: SegmentDoc,
    ) -> Option<&'m ObjectMapping> {
        mapping
            .nested_objects()
            .filter(|object| {
                self.reader
                    .membership(doc.segment, &Predicate::Nested(object.path.clone()))
                    .is_some_and(|set| set.contains(doc.local))
            })
            .max_by_key(|object| object.path.len())
    }

    /// Walk from `nested` up to the root, emitting one link per nested level.
    ///
    /// Non-nested objects on the way are skipped: they never emit a link and
    /// their path stays part of the next emitted field name. A level whose
    /// child set is empty emits nothing either.
    pub fn identity(
        &self,
        mapping: &DocumentMapping,
        nested: &ObjectMapping,
        doc: SegmentDoc,
    ) -> Result<Option<NestedIdentity>, Error> {
        let mut position = doc.local;
        let mut current = Some(nested);
        let mut child = Some(nested);
        let mut level_path = nested.path.clone();
        let mut links = Vec::new();

        while let Some(level) = current {
            let parent = mapping.find_parent_object(level);
            let parent_filter = match parent {
                Some(object) if !object.nested => {
                    current = Some(object);
                    continue;
                }
                Some(object) => Predicate::Nested(object.path.clone()),
                None => Predicate::Root,
            };

            let child_set = child
                .and_then(ObjectMapping::nested_filter)
                .and_then(|filter| self.reader.membership(doc.segment, &filter));
            let Some(child_set) = child_set else {
                current = parent;
                continue;
            };

            let parent_set = self
                .reader
                .membership(doc.segment, &parent_filter)
                .ok_or_else(|| {
                    Error::StructuralConsistency(format!(
                        "no parent documents for nested path [{level_path}]"
                    ))
                })?;
            let next_parent = parent_set.next_at_or_after(position).ok_or_else(|| {
                Error::StructuralConsistency(format!(
                    "nested doc id [{}] has no parent at [{level_path}]",
                    doc.sibling(position).global()
                ))
            })?;
            let offset = child_set.count_between(position, next_parent) as usize;

            position = next_parent;
            current = parent;
            child = parent;
            let prefix = parent.map(|p| p.path.len() + 1).unwrap_or(0);
            let field = level_path.get(prefix..).unwrap_or(&level_path);
            links.push(NestedLink::new(field, offset));
            if let Some(parent) = parent {
                level_path = parent.path.clone();
            }
        }

        Ok(NestedIdentity::from_leaf_first(links))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexBuilder, MemoryIndex, SourceDocument};
    use crate::mapping::FieldMapping;
    use hitfetch_proto::SourceFormat;
    use serde_json::json;

    fn mappings() -> MappingService {
        MappingService::new().with_mapping(
            DocumentMapping::new("post")
                .with_field(FieldMapping::stored("comments.text"))
                .with_object(ObjectMapping::nested("comments"))
                .with_object(ObjectMapping::object("comments.meta"))
                .with_object(ObjectMapping::nested("comments.meta.replies")),
        )
    }

    fn build(tree: serde_json::Value) -> MemoryIndex {
        let mut builder = IndexBuilder::new(mappings());
        builder
            .add_document(&SourceDocument::from_tree("post", "1", &tree, SourceFormat::Json).unwrap())
            .unwrap();
        builder.build()
    }

    fn identity_of(index: &MemoryIndex, local: u32) -> String {
        let mappings = mappings();
        let mapping = mappings.document_mapping("post").unwrap();
        let resolver = NestedResolver::new(index, &mappings);
        let doc = index.resolve(local).unwrap();
        let nested = resolver.find_nested_object(mapping, doc).unwrap();
        resolver
            .identity(mapping, nested, doc)
            .unwrap()
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_sibling_offsets() {
        // n2 = 0, n1 = 1, n0 = 2, root = 3
        let index = build(json!({"comments": [{"text": "a"}, {"text": "b"}, {"text": "c"}]}));
        let mappings = mappings();
        let resolver = NestedResolver::new(&index, &mappings);

        assert_eq!(resolver.find_root(index.resolve(3).unwrap()).unwrap(), None);
        assert_eq!(resolver.find_root(index.resolve(1).unwrap()).unwrap(), Some(3));

        assert_eq!(identity_of(&index, 2), "comments[0]");
        assert_eq!(identity_of(&index, 1), "comments[1]");
        assert_eq!(identity_of(&index, 0), "comments[2]");
    }

    #[test]
    fn test_nested_object_nested() {
        let index = build(json!({
            "comments": [
                {"text": "a", "meta": {"replies": [{"by": "x"}, {"by": "y"}]}},
                {"text": "b", "meta": {"replies": [{"by": "z"}]}}
            ]
        }));
        // pre-order: root, c0, r00, r01, c1, r10; reversed below
        // r10 = 0, c1 = 1, r01 = 2, r00 = 3, c0 = 4, root = 5
        assert_eq!(identity_of(&index, 3), "comments[0] > meta.replies[0]");
        assert_eq!(identity_of(&index, 2), "comments[0] > meta.replies[1]");
        assert_eq!(identity_of(&index, 0), "comments[1] > meta.replies[0]");
        assert_eq!(identity_of(&index, 1), "comments[1]");
    }

    #[test]
    fn test_find_nested_object_prefers_deepest() {
        let index = build(json!({"comments": [{"meta": {"replies": [{"by": "x"}]}}]}));
        let mappings = mappings();
        let mapping = mappings.document_mapping("post").unwrap();
        let resolver = NestedResolver::new(&index, &mappings);

        let reply = resolver
            .find_nested_object(mapping, index.resolve(0).unwrap())
            .unwrap();
        assert_eq!(reply.path, "comments.meta.replies");
        assert!(resolver
            .find_nested_object(mapping, index.resolve(2).unwrap())
            .is_none());
    }

    #[test]
    fn test_no_nested_mappings_short_circuits() {
        let mappings = MappingService::new().with_mapping(DocumentMapping::new("user"));
        let mut builder = IndexBuilder::new(mappings.clone());
        builder
            .add_document(&SourceDocument::new("user", "1", &b"{}"[..]))
            .unwrap();
        let index = builder.build();

        let resolver = NestedResolver::new(&index, &mappings);
        assert_eq!(resolver.find_root(index.resolve(0).unwrap()).unwrap(), None);
        assert!(index.bitset_cache().is_empty());
    }
}
