//! Field and object mappings.

use crate::index::Predicate;

/// A leaf field of a document type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    /// Full dotted path of the field.
    pub path: String,
    /// Whether the primary index stores the field's values.
    pub stored: bool,
    /// Whether the field's values live in the external row store.
    pub external: bool,
}

impl FieldMapping {
    /// Create an unstored, index-local field.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            stored: false,
            external: false,
        }
    }

    /// Create a field whose values are stored in the primary index.
    pub fn stored(path: impl Into<String>) -> Self {
        Self {
            stored: true,
            ..Self::new(path)
        }
    }

    /// Mark the field as backed by a row store column.
    pub fn external(mut self) -> Self {
        self.external = true;
        self
    }
}

/// An object (container) path, optionally indexed as nested documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMapping {
    /// Full dotted path of the object.
    pub path: String,
    /// Whether each instance is indexed as its own nested document.
    pub nested: bool,
}

impl ObjectMapping {
    /// A plain object whose leaves are flattened into the enclosing document.
    pub fn object(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            nested: false,
        }
    }

    /// A nested object.
    pub fn nested(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            nested: true,
        }
    }

    /// Membership predicate selecting this object's nested documents.
    ///
    /// Plain objects have no documents of their own and return `None`.
    pub fn nested_filter(&self) -> Option<Predicate> {
        if self.nested {
            Some(Predicate::Nested(self.path.clone()))
        } else {
            None
        }
    }

    /// Parent path, if this object is not at the top level.
    pub fn parent_path(&self) -> Option<&str> {
        self.path.rfind('.').map(|idx| &self.path[..idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_builders() {
        let field = FieldMapping::stored("comments.author").external();
        assert!(field.stored);
        assert!(field.external);
        assert!(!FieldMapping::new("title").stored);
    }

    #[test]
    fn test_object_filters() {
        assert_eq!(
            ObjectMapping::nested("comments").nested_filter(),
            Some(Predicate::Nested("comments".into()))
        );
        assert_eq!(ObjectMapping::object("meta").nested_filter(), None);
    }

    #[test]
    fn test_parent_path() {
        assert_eq!(ObjectMapping::nested("a.b.c").parent_path(), Some("a.b"));
        assert_eq!(ObjectMapping::nested("a").parent_path(), None);
    }
}
