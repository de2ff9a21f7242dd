//! Row store contract used by the fetch phase.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use bytes::Bytes;
use hitfetch_proto::Value;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::Error;

/// One row of the external store, column name to value.
pub type Row = serde_json::Map<String, JsonValue>;

/// Replica agreement required by a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConsistencyLevel {
    /// A single replica.
    #[default]
    One,
    /// A single replica in the local datacenter.
    LocalOne,
    /// A majority of replicas.
    Quorum,
    /// A majority of replicas in the local datacenter.
    LocalQuorum,
    /// Every replica.
    All,
}

impl ConsistencyLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ConsistencyLevel::One => "ONE",
            ConsistencyLevel::LocalOne => "LOCAL_ONE",
            ConsistencyLevel::Quorum => "QUORUM",
            ConsistencyLevel::LocalQuorum => "LOCAL_QUORUM",
            ConsistencyLevel::All => "ALL",
        }
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primary key parsed from a document id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPrimaryKey {
    /// Key components in declaration order.
    pub components: Vec<String>,
    /// Addresses the partition's static row rather than a regular row.
    pub is_static: bool,
}

impl DocPrimaryKey {
    /// A regular row key.
    pub fn new(components: Vec<String>) -> Self {
        Self {
            components,
            is_static: false,
        }
    }

    /// A static row key (partition key components only).
    pub fn static_row(components: Vec<String>) -> Self {
        Self {
            components,
            is_static: true,
        }
    }

    /// Suffix-qualified cache key for lookups of this key's variant.
    pub fn type_key(&self, doc_type: &str) -> String {
        if self.is_static {
            format!("{doc_type}_static")
        } else {
            doc_type.to_string()
        }
    }

    /// Storage encoding: components separated by a null byte.
    pub fn encode(&self) -> Vec<u8> {
        let mut key = Vec::new();
        for (i, component) in self.components.iter().enumerate() {
            if i > 0 {
                key.push(0);
            }
            key.extend_from_slice(component.as_bytes());
        }
        key
    }
}

/// A compiled point lookup for one document type variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedLookup {
    /// Stable statement id.
    pub id: String,
    /// Rendered statement text.
    pub statement: String,
    /// Document type (table) the lookup reads.
    pub doc_type: String,
    /// The required column set this lookup was compiled for.
    pub columns: BTreeSet<String>,
    /// Projected columns, empty for all columns.
    pub selected: Vec<String>,
    /// Whether this is the static row variant.
    pub is_static: bool,
}

impl PreparedLookup {
    pub fn new(
        doc_type: impl Into<String>,
        columns: BTreeSet<String>,
        selected: Vec<String>,
        statement: impl Into<String>,
        is_static: bool,
    ) -> Self {
        let statement = statement.into();
        Self {
            id: statement_id(&statement),
            statement,
            doc_type: doc_type.into(),
            columns,
            selected,
            is_static,
        }
    }

    /// Whether every column of the row is returned.
    pub fn selects_all(&self) -> bool {
        self.selected.is_empty()
    }
}

/// Statement id: the first 8 bytes of the blake3 digest, hex-encoded.
pub fn statement_id(statement: &str) -> String {
    let digest = blake3::hash(statement.as_bytes());
    hex::encode(&digest.as_bytes()[..8])
}

/// Flatten a row into dotted field paths with ordered values.
///
/// Nested objects contribute `parent.child` paths; arrays contribute one
/// value per element, and arrays of objects are flattened element by element.
pub fn flatten_row(row: &Row) -> BTreeMap<String, Vec<Value>> {
    let mut fields = BTreeMap::new();
    for (column, value) in row {
        flatten_value(column, value, &mut fields);
    }
    fields
}

fn flatten_value(path: &str, value: &JsonValue, fields: &mut BTreeMap<String, Vec<Value>>) {
    match value {
        JsonValue::Object(map) => {
            for (key, child) in map {
                flatten_value(&format!("{path}.{key}"), child, fields);
            }
        }
        JsonValue::Array(items) => {
            for item in items {
                flatten_value(path, item, fields);
            }
        }
        JsonValue::Null => {}
        scalar => fields
            .entry(path.to_string())
            .or_default()
            .push(Value::from_json(scalar)),
    }
}

/// A secondary, row-keyed store consulted to supply field values beyond
/// what the primary index holds.
pub trait RowStore: Send + Sync {
    /// Parse a document id into the primary key of `doc_type`'s table.
    fn parse_primary_key(&self, doc_type: &str, id: &str) -> Result<DocPrimaryKey, Error>;

    /// Compile a point lookup of `columns` for `doc_type`.
    fn prepare(
        &self,
        doc_type: &str,
        columns: &BTreeSet<String>,
        is_static: bool,
    ) -> Result<PreparedLookup, Error>;

    /// Run a compiled lookup. Returns at most one row.
    fn execute(
        &self,
        lookup: &PreparedLookup,
        key: &DocPrimaryKey,
        consistency: ConsistencyLevel,
    ) -> Result<Option<Row>, Error>;

    /// Flatten a row into field paths.
    fn row_fields(&self, row: &Row) -> BTreeMap<String, Vec<Value>> {
        flatten_row(row)
    }

    /// Canonical source of a document rebuilt from its row.
    fn source(&self, doc_type: &str, row: &Row) -> Result<Bytes, Error> {
        let _ = doc_type;
        serde_json::to_vec(row)
            .map(Bytes::from)
            .map_err(|e| Error::Serialization(e.to_string()))
    }
}
