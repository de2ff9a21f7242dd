//! Document type mappings.

use super::field::{FieldMapping, ObjectMapping};

/// How the `_source` of a document type is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceMapping {
    /// Whether sources are kept at all.
    pub enabled: bool,
    /// Whether the source is rebuilt from the row store instead of being
    /// read from the primary index.
    pub external: bool,
}

impl Default for SourceMapping {
    fn default() -> Self {
        Self {
            enabled: true,
            external: false,
        }
    }
}

impl SourceMapping {
    /// Sources rebuilt from the row store.
    pub fn external() -> Self {
        Self {
            enabled: true,
            external: true,
        }
    }

    /// Sources not kept.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            external: false,
        }
    }
}

/// The mapping of one document type.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMapping {
    /// Type name as stored in document uids.
    pub doc_type: String,
    /// Label reported on hits.
    pub type_text: String,
    /// Leaf fields.
    pub fields: Vec<FieldMapping>,
    /// Object and nested paths.
    pub objects: Vec<ObjectMapping>,
    /// Source handling.
    pub source: SourceMapping,
}

impl DocumentMapping {
    /// Create a mapping with no fields.
    pub fn new(doc_type: impl Into<String>) -> Self {
        let doc_type = doc_type.into();
        Self {
            type_text: doc_type.clone(),
            doc_type,
            fields: Vec::new(),
            objects: Vec::new(),
            source: SourceMapping::default(),
        }
    }

    /// Add a leaf field.
    pub fn with_field(mut self, field: FieldMapping) -> Self {
        self.fields.push(field);
        self
    }

    /// Add an object or nested path.
    pub fn with_object(mut self, object: ObjectMapping) -> Self {
        self.objects.push(object);
        self
    }

    /// Set the source handling.
    pub fn with_source(mut self, source: SourceMapping) -> Self {
        self.source = source;
        self
    }

    /// Set the label reported on hits.
    pub fn with_type_text(mut self, text: impl Into<String>) -> Self {
        self.type_text = text.into();
        self
    }

    /// Get a leaf field by full path.
    pub fn field(&self, path: &str) -> Option<&FieldMapping> {
        self.fields.iter().find(|f| f.path == path)
    }

    /// Get an object mapping by full path.
    pub fn object(&self, path: &str) -> Option<&ObjectMapping> {
        self.objects.iter().find(|o| o.path == path)
    }

    /// Nested object mappings.
    pub fn nested_objects(&self) -> impl Iterator<Item = &ObjectMapping> {
        self.objects.iter().filter(|o| o.nested)
    }

    /// Whether any object of this type is nested.
    pub fn has_nested(&self) -> bool {
        self.objects.iter().any(|o| o.nested)
    }

    /// Fields backed by row store columns.
    pub fn external_fields(&self) -> impl Iterator<Item = &FieldMapping> {
        self.fields.iter().filter(|f| f.external)
    }

    /// The closest declared ancestor object of `object`, nested or not.
    pub fn find_parent_object(&self, object: &ObjectMapping) -> Option<&ObjectMapping> {
        let mut candidate = object.parent_path();
        while let Some(path) = candidate {
            if let Some(parent) = self.object(path) {
                return Some(parent);
            }
            candidate = path.rfind('.').map(|idx| &path[..idx]);
        }
        None
    }
}
