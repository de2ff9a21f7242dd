//! Schema lookups shared by every document of a request.

use std::collections::BTreeMap;

use super::document::DocumentMapping;
use super::field::{FieldMapping, ObjectMapping};

/// Uid of a document: `"{type}#{id}"`.
pub const UID_FIELD: &str = "_uid";
/// Primary-key string of a document.
pub const ID_FIELD: &str = "_id";
/// Routing value of a document.
pub const ROUTING_FIELD: &str = "_routing";
/// Serialized source of a document.
pub const SOURCE_FIELD: &str = "_source";
/// Origin node pseudo-field.
pub const NODE_FIELD: &str = "_node";

const META_FIELDS: &[&str] = &[UID_FIELD, ID_FIELD, ROUTING_FIELD, SOURCE_FIELD, NODE_FIELD];

/// Immutable set of document mappings of one index.
#[derive(Debug, Clone, Default)]
pub struct MappingService {
    mappings: BTreeMap<String, DocumentMapping>,
}

impl MappingService {
    /// Create an empty mapping service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document mapping.
    pub fn with_mapping(mut self, mapping: DocumentMapping) -> Self {
        self.mappings.insert(mapping.doc_type.clone(), mapping);
        self
    }

    /// Get the mapping of a document type.
    pub fn document_mapping(&self, doc_type: &str) -> Option<&DocumentMapping> {
        self.mappings.get(doc_type)
    }

    /// Iterate all document mappings.
    pub fn mappings(&self) -> impl Iterator<Item = &DocumentMapping> {
        self.mappings.values()
    }

    /// Whether any type declares nested objects.
    pub fn has_nested(&self) -> bool {
        self.mappings.values().any(DocumentMapping::has_nested)
    }

    /// Whether `name` is a reserved meta field.
    pub fn is_meta_field(name: &str) -> bool {
        META_FIELDS.contains(&name)
    }

    /// Whether `name` resolves to a leaf field of any type.
    pub fn is_leaf_field(&self, name: &str) -> bool {
        Self::is_meta_field(name) || self.smart_field(name).is_some()
    }

    /// Resolve a leaf field by full path across all types.
    pub fn smart_field(&self, name: &str) -> Option<&FieldMapping> {
        self.mappings.values().find_map(|m| m.field(name))
    }

    /// Resolve an object path across all types.
    pub fn object_mapping(&self, name: &str) -> Option<&ObjectMapping> {
        self.mappings.values().find_map(|m| m.object(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> MappingService {
        MappingService::new()
            .with_mapping(
                DocumentMapping::new("post")
                    .with_field(FieldMapping::stored("title"))
                    .with_object(ObjectMapping::nested("comments")),
            )
            .with_mapping(DocumentMapping::new("user").with_field(FieldMapping::stored("name")))
    }

    #[test]
    fn test_lookups_span_types() {
        let service = service();
        assert!(service.is_leaf_field("title"));
        assert!(service.is_leaf_field("name"));
        assert!(service.is_leaf_field(ROUTING_FIELD));
        assert!(!service.is_leaf_field("comments"));
        assert!(service.object_mapping("comments").is_some());
        assert!(service.has_nested());
    }

    #[test]
    fn test_unknown_type() {
        assert!(service().document_mapping("order").is_none());
    }
}
