//! Hit types returned by the fetch phase.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::source::SourceFormat;
use crate::value::Value;

/// One field of a hit with its ordered values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitField {
    /// Field name (full dotted path).
    pub name: String,
    /// Values in stored order.
    pub values: Vec<Value>,
}

impl HitField {
    /// Create a new hit field.
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// First value, if any.
    pub fn value(&self) -> Option<&Value> {
        self.values.first()
    }
}

/// A single link of a nested identity: the nested field relative to its
/// parent and the position of the matched instance among its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NestedLink {
    /// Field path relative to the enclosing nested scope.
    pub field: String,
    /// Zero-based offset among sibling instances in the same parent.
    pub offset: usize,
}

impl NestedLink {
    /// Create a new link.
    pub fn new(field: impl Into<String>, offset: usize) -> Self {
        Self {
            field: field.into(),
            offset,
        }
    }
}

/// Structural address of a nested hit inside its root document.
///
/// Links are kept root-first: `links[0]` is the outermost nested field and
/// the last link is the matched instance itself. The chain is never empty,
/// also when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "IdentityLinks")]
pub struct NestedIdentity {
    links: Vec<NestedLink>,
}

#[derive(Deserialize)]
struct IdentityLinks {
    links: Vec<NestedLink>,
}

impl TryFrom<IdentityLinks> for NestedIdentity {
    type Error = &'static str;

    fn try_from(raw: IdentityLinks) -> Result<Self, Self::Error> {
        Self::new(raw.links).ok_or("nested identity needs at least one link")
    }
}

impl NestedIdentity {
    /// Build an identity from links ordered outermost first.
    ///
    /// Returns `None` for an empty chain, which means "root document".
    pub fn new(links: Vec<NestedLink>) -> Option<Self> {
        if links.is_empty() {
            None
        } else {
            Some(Self { links })
        }
    }

    /// Build an identity from links collected while walking up from the
    /// matched instance (innermost first).
    pub fn from_leaf_first(mut links: Vec<NestedLink>) -> Option<Self> {
        links.reverse();
        Self::new(links)
    }

    /// The outermost link.
    pub fn root(&self) -> &NestedLink {
        &self.links[0]
    }

    /// The innermost link (the matched instance).
    pub fn leaf(&self) -> &NestedLink {
        &self.links[self.links.len() - 1]
    }

    /// Number of nesting levels.
    pub fn depth(&self) -> usize {
        self.links.len()
    }

    /// Links in root-to-leaf order.
    pub fn links(&self) -> &[NestedLink] {
        &self.links
    }

    /// Iterate links in root-to-leaf order.
    pub fn iter(&self) -> impl Iterator<Item = &NestedLink> {
        self.links.iter()
    }

    /// Full dotted path of the matched nested field.
    pub fn path(&self) -> String {
        self.links
            .iter()
            .map(|link| link.field.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for NestedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, link) in self.links.iter().enumerate() {
            if i > 0 {
                f.write_str(" > ")?;
            }
            write!(f, "{}[{}]", link.field, link.offset)?;
        }
        Ok(())
    }
}

/// A fully reconstructed result document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Hit {
    /// Global document id within the searched index.
    pub doc_id: u32,
    /// Primary-key string of the (root) document.
    pub id: Option<String>,
    /// Document type label.
    pub doc_type: Option<String>,
    /// Present when this hit is a nested sub-document.
    pub nested: Option<NestedIdentity>,
    /// Loaded fields by name.
    pub fields: HashMap<String, HitField>,
    /// Serialized source payload.
    pub source: Option<Bytes>,
    /// Encoding of `source`.
    pub source_format: Option<SourceFormat>,
    /// Expanded inner hits by definition name.
    pub inner_hits: Option<BTreeMap<String, SearchHits>>,
}

impl Hit {
    /// A hit that only carries its doc id (stored fields disabled).
    pub fn bare(doc_id: u32) -> Self {
        Self {
            doc_id,
            ..Default::default()
        }
    }

    /// Create a root-level hit.
    pub fn new(
        doc_id: u32,
        id: impl Into<String>,
        doc_type: impl Into<String>,
        fields: HashMap<String, HitField>,
    ) -> Self {
        Self {
            doc_id,
            id: Some(id.into()),
            doc_type: Some(doc_type.into()),
            fields,
            ..Default::default()
        }
    }

    /// Create a nested hit.
    pub fn nested(
        doc_id: u32,
        id: impl Into<String>,
        doc_type: impl Into<String>,
        identity: NestedIdentity,
        fields: HashMap<String, HitField>,
    ) -> Self {
        Self {
            nested: Some(identity),
            ..Self::new(doc_id, id, doc_type, fields)
        }
    }

    /// Attach a serialized source payload.
    pub fn with_source(mut self, source: Bytes, format: SourceFormat) -> Self {
        self.source = Some(source);
        self.source_format = Some(format);
        self
    }

    /// Get a field by name.
    pub fn field(&self, name: &str) -> Option<&HitField> {
        self.fields.get(name)
    }

    /// Replace (or insert) a field.
    pub fn set_field(&mut self, name: impl Into<String>, values: Vec<Value>) {
        let name = name.into();
        self.fields
            .insert(name.clone(), HitField::new(name, values));
    }

    /// Whether this hit is a nested sub-document.
    pub fn is_nested(&self) -> bool {
        self.nested.is_some()
    }

    /// Decode the source payload into a generic tree.
    pub fn source_as_json(&self) -> Result<Option<serde_json::Value>, crate::Error> {
        match (&self.source, self.source_format) {
            (Some(bytes), Some(format)) => format.decode(bytes).map(Some),
            (Some(bytes), None) => SourceFormat::Json.decode(bytes).map(Some),
            _ => Ok(None),
        }
    }
}

/// The hit collection of one fetch, with the query phase's totals.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchHits {
    /// Hits in request order.
    pub hits: Vec<Hit>,
    /// Total number of matches reported by the query phase.
    pub total_hits: u64,
    /// Best score reported by the query phase.
    pub max_score: Option<f32>,
}

impl SearchHits {
    /// Create a hit collection.
    pub fn new(hits: Vec<Hit>, total_hits: u64, max_score: Option<f32>) -> Self {
        Self {
            hits,
            total_hits,
            max_score,
        }
    }

    /// An empty collection.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of hits in this collection.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Check if there are no hits.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Iterate hits in order.
    pub fn iter(&self) -> impl Iterator<Item = &Hit> {
        self.hits.iter()
    }
}
