//! Merging row store columns into loaded documents.

use std::collections::BTreeSet;

use hitfetch_proto::{SourceFormat, Value};
use serde_json::Value as JsonValue;
use tracing::error;

use crate::config::{FetchConfig, IndexSettings};
use crate::error::Error;
use crate::mapping::{DocumentMapping, MappingService, ID_FIELD, NODE_FIELD, SOURCE_FIELD};
use crate::rowstore::{Row, RowStore};

use super::cache::LookupCache;
use super::visitor::{FieldsVisitor, Uid};

/// Augments loaded documents with their row store columns.
pub struct RowAugmenter<'a> {
    store: Option<&'a dyn RowStore>,
    config: &'a FetchConfig,
    settings: &'a IndexSettings,
    mappings: &'a MappingService,
    cache: &'a LookupCache,
}

impl<'a> RowAugmenter<'a> {
    pub fn new(
        store: Option<&'a dyn RowStore>,
        config: &'a FetchConfig,
        settings: &'a IndexSettings,
        mappings: &'a MappingService,
        cache: &'a LookupCache,
    ) -> Self {
        Self {
            store,
            config,
            settings,
            mappings,
            cache,
        }
    }

    /// Merge the row of the document loaded into `visitor`.
    ///
    /// Documents without a uid (nested documents) are left untouched. A
    /// missing row is not an error.
    pub fn augment(&self, visitor: &mut FieldsVisitor) -> Result<(), Error> {
        let Some(uid) = visitor.uid().cloned() else {
            return Ok(());
        };
        self.try_augment(&uid, visitor).map_err(|source| {
            error!(id = %uid.id, doc_type = %uid.doc_type, error = %source, "Fetch failed");
            Error::Augmentation {
                id: uid.id.clone(),
                source: Box::new(source),
            }
        })
    }

    fn try_augment(&self, uid: &Uid, visitor: &mut FieldsVisitor) -> Result<(), Error> {
        let mapping = self.mappings.document_mapping(&uid.doc_type);
        let mut required = required_columns(visitor, mapping);
        if required.remove(NODE_FIELD) {
            self.cache
                .set_include_node(self.settings.include_node_id(self.config));
        }

        let store = match self.store {
            Some(store) if !required.is_empty() => store,
            _ => {
                if self.cache.include_node() {
                    visitor.set_values(NODE_FIELD, vec![self.node_value()]);
                }
                return Ok(());
            }
        };

        let key = store.parse_primary_key(&uid.doc_type, &uid.id)?;
        let type_key = key.type_key(&uid.doc_type);
        let lookup = self.cache.get_or_prepare(&type_key, &required, || {
            store.prepare(&uid.doc_type, &required, key.is_static)
        })?;

        let row = store.execute(&lookup, &key, self.config.lookup_consistency)?;
        self.cache.stats().record_row(row.is_some());
        if let Some(row) = row {
            let source_external = mapping.is_some_and(|m| m.source.external);
            self.merge(store, uid, visitor, row, source_external)?;
        }
        Ok(())
    }

    fn merge(
        &self,
        store: &dyn RowStore,
        uid: &Uid,
        visitor: &mut FieldsVisitor,
        mut row: Row,
        source_external: bool,
    ) -> Result<(), Error> {
        if visitor.load_source() && source_external {
            let source = store.source(&uid.doc_type, &row)?;
            visitor.set_source(source, SourceFormat::Json);
        }

        if self.cache.include_node() {
            row.insert(
                NODE_FIELD.to_string(),
                JsonValue::String(self.config.local_node_id.clone()),
            );
        }

        for (field, values) in store.row_fields(&row) {
            if field != ID_FIELD && visitor.is_requested(&field) {
                visitor.set_values(field, values);
            }
        }
        Ok(())
    }

    fn node_value(&self) -> Value {
        Value::String(self.config.local_node_id.clone())
    }
}

/// Columns the row store must return for the document in `visitor`.
fn required_columns(
    visitor: &FieldsVisitor,
    mapping: Option<&DocumentMapping>,
) -> BTreeSet<String> {
    let mut required = BTreeSet::new();
    if let Some(mapping) = mapping {
        for field in mapping.external_fields() {
            if visitor.is_requested(&field.path) {
                required.insert(field.path.clone());
            }
        }
        if visitor.load_source() && mapping.source.enabled && mapping.source.external {
            required.insert(SOURCE_FIELD.to_string());
        }
    }
    if visitor
        .requested_fields()
        .is_some_and(|fields| fields.contains(NODE_FIELD))
    {
        required.insert(NODE_FIELD.to_string());
    }
    required
}
