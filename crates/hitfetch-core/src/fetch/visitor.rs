//! Stored field visitor used by the fetch phase.

use std::collections::{BTreeSet, HashMap};

use bytes::Bytes;
use hitfetch_proto::{HitField, SourceFormat, Value};

use crate::index::StoredFieldVisitor;
use crate::mapping::{ROUTING_FIELD, UID_FIELD};

use super::selection::simple_match;

/// Type and id of a root document, stored as `type#id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uid {
    pub doc_type: String,
    pub id: String,
}

impl Uid {
    pub fn new(doc_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            doc_type: doc_type.into(),
            id: id.into(),
        }
    }

    /// Parse a stored uid. Ids may contain `#`, types may not.
    pub fn parse(uid: &str) -> Option<Self> {
        let (doc_type, id) = uid.split_once('#')?;
        Some(Self::new(doc_type, id))
    }
}

/// Collects the uid, routing, requested fields and source of one document.
///
/// Reused across documents of a request; [`reset`](Self::reset) must be
/// called between documents.
#[derive(Debug, Clone, Default)]
pub struct FieldsVisitor {
    load_source: bool,
    requested: Option<BTreeSet<String>>,
    patterns: Vec<String>,
    uid: Option<Uid>,
    fields: HashMap<String, Vec<Value>>,
    source: Option<(Bytes, SourceFormat)>,
}

impl FieldsVisitor {
    /// Load only metadata and, optionally, the source.
    pub fn new(load_source: bool) -> Self {
        Self {
            load_source,
            ..Default::default()
        }
    }

    /// Additionally load the named fields and fields matching `patterns`.
    pub fn custom(fields: BTreeSet<String>, patterns: Vec<String>, load_source: bool) -> Self {
        Self {
            load_source,
            requested: Some(fields),
            patterns,
            ..Default::default()
        }
    }

    pub fn reset(&mut self) {
        self.uid = None;
        self.fields.clear();
        self.source = None;
    }

    pub fn load_source(&self) -> bool {
        self.load_source
    }

    pub fn uid(&self) -> Option<&Uid> {
        self.uid.as_ref()
    }

    /// Explicitly requested field names, if this is a custom visitor.
    pub fn requested_fields(&self) -> Option<&BTreeSet<String>> {
        self.requested.as_ref()
    }

    /// Whether a field was asked for by name or pattern.
    pub fn is_requested(&self, name: &str) -> bool {
        self.requested.as_ref().is_some_and(|r| r.contains(name))
            || self.patterns.iter().any(|p| simple_match(p, name))
    }

    pub fn fields(&self) -> &HashMap<String, Vec<Value>> {
        &self.fields
    }

    /// Replace the values of a field.
    pub fn set_values(&mut self, name: impl Into<String>, values: Vec<Value>) {
        self.fields.insert(name.into(), values);
    }

    pub fn source(&self) -> Option<(&Bytes, SourceFormat)> {
        self.source.as_ref().map(|(bytes, format)| (bytes, *format))
    }

    pub fn set_source(&mut self, source: Bytes, format: SourceFormat) {
        self.source = Some((source, format));
    }

    /// Drain the loaded fields into hit fields.
    pub fn take_hit_fields(&mut self) -> HashMap<String, HitField> {
        self.fields
            .drain()
            .map(|(name, values)| {
                let field = HitField::new(name.clone(), values);
                (name, field)
            })
            .collect()
    }
}

impl StoredFieldVisitor for FieldsVisitor {
    fn needs_field(&self, name: &str) -> bool {
        name == UID_FIELD || name == ROUTING_FIELD || self.is_requested(name)
    }

    fn needs_source(&self) -> bool {
        self.load_source
    }

    fn visit_value(&mut self, name: &str, value: Value) {
        if name == UID_FIELD {
            self.uid = value.as_str().and_then(Uid::parse);
            return;
        }
        self.fields.entry(name.to_string()).or_default().push(value);
    }

    fn visit_source(&mut self, source: Bytes, format: SourceFormat) {
        self.source = Some((source, format));
    }
}
