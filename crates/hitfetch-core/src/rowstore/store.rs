//! sled-backed row store.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sled::{Db, Tree};
use tracing::{debug, trace};

use super::config::RowStoreConfig;
use super::lookup::{ConsistencyLevel, DocPrimaryKey, PreparedLookup, Row, RowStore};
use super::record::RowRecord;
use crate::error::Error;
use crate::mapping::SOURCE_FIELD;

/// Tree holding table definitions.
const TABLES_TREE: &str = "meta:tables";

/// Prefix of per-table regular row trees.
const ROWS_PREFIX: &str = "rows:";

/// Prefix of per-table static row trees.
const STATIC_PREFIX: &str = "static:";

/// Column layout of one table. A table is named after the document type it
/// backs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub partition_key: Vec<String>,
    pub clustering_key: Vec<String>,
    pub static_columns: Vec<String>,
    pub columns: Vec<String>,
}

impl TableDef {
    /// A table keyed by a single `id` column.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partition_key: vec!["id".to_string()],
            clustering_key: Vec::new(),
            static_columns: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub fn with_partition_key(mut self, columns: &[&str]) -> Self {
        self.partition_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_clustering_key(mut self, columns: &[&str]) -> Self {
        self.clustering_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_static_column(mut self, column: impl Into<String>) -> Self {
        self.static_columns.push(column.into());
        self
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    /// Primary key columns, partition key first.
    pub fn primary_key(&self) -> impl Iterator<Item = &String> {
        self.partition_key.iter().chain(&self.clustering_key)
    }

    /// Check if a column exists. Top-level name only.
    pub fn has_column(&self, column: &str) -> bool {
        let top = column.split('.').next().unwrap_or(column);
        self.primary_key()
            .chain(&self.static_columns)
            .chain(&self.columns)
            .any(|c| c == top)
    }

    fn is_static_column(&self, column: &str) -> bool {
        self.static_columns.iter().any(|c| c == column)
    }
}

struct Table {
    def: TableDef,
    rows: Tree,
    statics: Tree,
}

/// Row store over sled trees, one regular and one static tree per table.
pub struct SledRowStore {
    db: Db,
    keyspace: String,
    tables: RwLock<HashMap<String, Arc<Table>>>,
}

impl SledRowStore {
    /// Open or create a row store and load its table definitions.
    pub fn open(config: RowStoreConfig) -> Result<Self, Error> {
        let db = config.to_sled_config().open()?;
        let store = Self {
            db,
            keyspace: config.keyspace,
            tables: RwLock::new(HashMap::new()),
        };

        let defs = store.db.open_tree(TABLES_TREE)?;
        for entry in defs.iter() {
            let (_, bytes) = entry?;
            let def: TableDef = serde_json::from_slice(&bytes)
                .map_err(|e| Error::Deserialization(e.to_string()))?;
            store.register(def)?;
        }
        Ok(store)
    }

    /// Create (or redefine) a table.
    pub fn create_table(&self, def: TableDef) -> Result<(), Error> {
        if def.partition_key.is_empty() {
            return Err(Error::InvalidData(format!(
                "table [{}] has no partition key",
                def.name
            )));
        }
        let bytes = serde_json::to_vec(&def).map_err(|e| Error::Serialization(e.to_string()))?;
        self.db.open_tree(TABLES_TREE)?.insert(def.name.as_bytes(), bytes)?;
        debug!(table = %def.name, "Created table");
        self.register(def)
    }

    /// Write a row. Static columns go to the partition's static row.
    pub fn put_row(&self, table: &str, row: &Row) -> Result<DocPrimaryKey, Error> {
        let table = self.table(table)?;
        let components = table
            .def
            .primary_key()
            .map(|column| {
                row.get(column).map(key_component).ok_or_else(|| {
                    Error::InvalidData(format!(
                        "row of [{}] lacks key column [{column}]",
                        table.def.name
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let key = DocPrimaryKey::new(components);
        let partition = DocPrimaryKey::static_row(key.components[..table.def.partition_key.len()].to_vec());

        let (statics, regular): (Row, Row) = row
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .partition(|(column, _)| table.def.is_static_column(column));

        if !statics.is_empty() {
            let mut merged = match table.statics.get(partition.encode())? {
                Some(bytes) => RowRecord::from_bytes(&bytes)?.row()?,
                None => Row::new(),
            };
            merged.extend(statics);
            table
                .statics
                .insert(partition.encode(), RowRecord::new(&merged)?.to_bytes()?)?;
        }
        table
            .rows
            .insert(key.encode(), RowRecord::new(&regular)?.to_bytes()?)?;
        Ok(key)
    }

    /// Delete a row by writing a tombstone.
    pub fn delete_row(&self, table: &str, key: &DocPrimaryKey) -> Result<(), Error> {
        let table = self.table(table)?;
        let tree = if key.is_static {
            &table.statics
        } else {
            &table.rows
        };
        tree.insert(key.encode(), RowRecord::tombstone().to_bytes()?)?;
        Ok(())
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }

    fn register(&self, def: TableDef) -> Result<(), Error> {
        let rows = self.db.open_tree(format!("{ROWS_PREFIX}{}", def.name))?;
        let statics = self.db.open_tree(format!("{STATIC_PREFIX}{}", def.name))?;
        self.tables
            .write()
            .insert(def.name.clone(), Arc::new(Table { def, rows, statics }));
        Ok(())
    }

    fn table(&self, name: &str) -> Result<Arc<Table>, Error> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::InvalidData(format!("unknown table [{name}]")))
    }

    fn read(tree: &Tree, key: &[u8]) -> Result<Option<Row>, Error> {
        match tree.get(key)? {
            Some(bytes) => {
                let record = RowRecord::from_bytes(&bytes)?;
                if record.deleted {
                    Ok(None)
                } else {
                    record.row().map(Some)
                }
            }
            None => Ok(None),
        }
    }
}

impl RowStore for SledRowStore {
    fn parse_primary_key(&self, doc_type: &str, id: &str) -> Result<DocPrimaryKey, Error> {
        let table = self.table(doc_type)?;
        let partition_len = table.def.partition_key.len();
        let key_len = partition_len + table.def.clustering_key.len();

        // A single-column key may itself start with `[`.
        let components = if id.starts_with('[') {
            match serde_json::from_str::<Vec<JsonValue>>(id) {
                Ok(parts) => parts.iter().map(key_component).collect(),
                Err(_) if key_len == 1 => vec![id.to_string()],
                Err(e) => return Err(Error::InvalidData(format!("malformed id [{id}]: {e}"))),
            }
        } else {
            vec![id.to_string()]
        };

        if components.len() == key_len {
            Ok(DocPrimaryKey::new(components))
        } else if components.len() == partition_len && !table.def.clustering_key.is_empty() {
            Ok(DocPrimaryKey::static_row(components))
        } else {
            Err(Error::InvalidData(format!(
                "id [{id}] has {} key components, table [{doc_type}] expects {key_len}",
                components.len()
            )))
        }
    }

    fn prepare(
        &self,
        doc_type: &str,
        columns: &BTreeSet<String>,
        is_static: bool,
    ) -> Result<PreparedLookup, Error> {
        let table = self.table(doc_type)?;
        let def = &table.def;

        let key_columns: Vec<&String> = if is_static {
            def.partition_key.iter().collect()
        } else {
            def.primary_key().collect()
        };

        let selected: Vec<String> = if columns.contains(SOURCE_FIELD) {
            Vec::new()
        } else {
            let mut selected: Vec<String> = key_columns.iter().map(|c| c.to_string()).collect();
            for column in columns {
                let top = column.split('.').next().unwrap_or(column);
                let allowed = def.has_column(top) && (!is_static || def.is_static_column(top));
                if allowed && !selected.iter().any(|c| c == top) {
                    selected.push(top.to_string());
                }
            }
            selected
        };

        let projection = if selected.is_empty() {
            "*".to_string()
        } else {
            selected
                .iter()
                .map(|c| format!("\"{c}\""))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let predicate = key_columns
            .iter()
            .map(|c| format!("\"{c}\" = ?"))
            .collect::<Vec<_>>()
            .join(" AND ");
        let statement = format!(
            "SELECT {}{projection} FROM \"{}\".\"{}\" WHERE {predicate}",
            if is_static { "DISTINCT " } else { "" },
            self.keyspace,
            def.name
        );

        trace!(doc_type, is_static, statement = %statement, "Compiled lookup");
        Ok(PreparedLookup::new(
            doc_type,
            columns.clone(),
            selected,
            statement,
            is_static,
        ))
    }

    fn execute(
        &self,
        lookup: &PreparedLookup,
        key: &DocPrimaryKey,
        consistency: ConsistencyLevel,
    ) -> Result<Option<Row>, Error> {
        let table = self.table(&lookup.doc_type)?;
        let partition_len = table.def.partition_key.len();
        if key.components.len() < partition_len {
            return Err(Error::InvalidData(format!(
                "key {:?} is shorter than the partition key of [{}]",
                key.components, lookup.doc_type
            )));
        }
        let partition = DocPrimaryKey::static_row(key.components[..partition_len].to_vec());
        let statics = Self::read(&table.statics, &partition.encode())?;

        let row = if lookup.is_static {
            statics.map(|mut row| {
                for (column, value) in table.def.partition_key.iter().zip(&key.components) {
                    row.insert(column.clone(), JsonValue::String(value.clone()));
                }
                row
            })
        } else {
            Self::read(&table.rows, &key.encode())?.map(|mut row| {
                if let Some(statics) = statics {
                    row.extend(statics);
                }
                row
            })
        };

        trace!(
            statement_id = %lookup.id,
            consistency = %consistency,
            found = row.is_some(),
            "Executed lookup"
        );
        Ok(row.map(|row| project(row, &lookup.selected)))
    }
}

fn project(row: Row, selected: &[String]) -> Row {
    if selected.is_empty() {
        return row;
    }
    row.into_iter()
        .filter(|(column, _)| selected.iter().any(|c| c == column))
        .collect()
}

fn key_component(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct TestStore {
        store: SledRowStore,
        _dir: tempfile::TempDir,
    }

    impl std::ops::Deref for TestStore {
        type Target = SledRowStore;
        fn deref(&self) -> &Self::Target {
            &self.store
        }
    }

    fn test_store() -> TestStore {
        let dir = tempfile::tempdir().unwrap();
        let store = SledRowStore::open(RowStoreConfig::new(dir.path())).unwrap();
        store
            .create_table(
                TableDef::new("event")
                    .with_partition_key(&["tenant"])
                    .with_clustering_key(&["seq"])
                    .with_static_column("plan")
                    .with_column("kind"),
            )
            .unwrap();
        TestStore { store, _dir: dir }
    }

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn columns(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_parse_primary_key() {
        let store = test_store();
        let key = store.parse_primary_key("event", "[\"acme\", 3]").unwrap();
        assert_eq!(key, DocPrimaryKey::new(vec!["acme".into(), "3".into()]));

        let key = store.parse_primary_key("event", "acme").unwrap();
        assert!(key.is_static);

        assert!(store.parse_primary_key("event", "[1, 2, 3]").is_err());
        assert!(store.parse_primary_key("event", "[acme").is_err());
        assert!(store.parse_primary_key("order", "1").is_err());
    }

    #[test]
    fn test_single_column_key_starting_with_bracket() {
        let store = test_store();
        store
            .create_table(TableDef::new("tag").with_partition_key(&["name"]).with_column("count"))
            .unwrap();
        let stored = store
            .put_row("tag", &row(json!({"name": "[abc", "count": 4})))
            .unwrap();

        let key = store.parse_primary_key("tag", "[abc").unwrap();
        assert_eq!(key, stored);
        assert_eq!(key, DocPrimaryKey::new(vec!["[abc".into()]));

        let lookup = store.prepare("tag", &columns(&["count"]), false).unwrap();
        let found = store.execute(&lookup, &key, ConsistencyLevel::One).unwrap().unwrap();
        assert_eq!(found["count"], json!(4));
    }

    #[test]
    fn test_put_and_lookup() {
        let store = test_store();
        store
            .put_row("event", &row(json!({"tenant": "acme", "seq": 1, "kind": "click", "plan": "pro"})))
            .unwrap();

        let key = store.parse_primary_key("event", "[\"acme\", 1]").unwrap();
        let lookup = store.prepare("event", &columns(&["kind"]), false).unwrap();
        assert_eq!(
            lookup.statement,
            "SELECT \"tenant\", \"seq\", \"kind\" FROM \"hitfetch\".\"event\" WHERE \"tenant\" = ? AND \"seq\" = ?"
        );

        let found = store.execute(&lookup, &key, ConsistencyLevel::One).unwrap().unwrap();
        assert_eq!(found["kind"], json!("click"));
        assert!(!found.contains_key("plan"));

        let all = store
            .prepare("event", &columns(&[SOURCE_FIELD]), false)
            .unwrap();
        assert!(all.selects_all());
        let found = store.execute(&all, &key, ConsistencyLevel::One).unwrap().unwrap();
        assert_eq!(found["plan"], json!("pro"));
    }

    #[test]
    fn test_static_lookup() {
        let store = test_store();
        store
            .put_row("event", &row(json!({"tenant": "acme", "seq": 1, "plan": "pro"})))
            .unwrap();

        let key = store.parse_primary_key("event", "acme").unwrap();
        let lookup = store.prepare("event", &columns(&["plan", "kind"]), true).unwrap();
        assert!(lookup.statement.starts_with("SELECT DISTINCT \"tenant\", \"plan\""));

        let found = store.execute(&lookup, &key, ConsistencyLevel::One).unwrap().unwrap();
        assert_eq!(found["tenant"], json!("acme"));
        assert_eq!(found["plan"], json!("pro"));
    }

    #[test]
    fn test_missing_and_deleted_rows() {
        let store = test_store();
        let key = store
            .put_row("event", &row(json!({"tenant": "acme", "seq": 2, "kind": "view"})))
            .unwrap();
        let lookup = store.prepare("event", &columns(&["kind"]), false).unwrap();
        assert!(store.execute(&lookup, &key, ConsistencyLevel::One).unwrap().is_some());

        store.delete_row("event", &key).unwrap();
        assert!(store.execute(&lookup, &key, ConsistencyLevel::One).unwrap().is_none());

        let other = DocPrimaryKey::new(vec!["acme".into(), "9".into()]);
        assert!(store.execute(&lookup, &other, ConsistencyLevel::One).unwrap().is_none());
    }

    #[test]
    fn test_tables_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SledRowStore::open(RowStoreConfig::new(dir.path())).unwrap();
            store.create_table(TableDef::new("user").with_column("name")).unwrap();
            store.put_row("user", &row(json!({"id": "u1", "name": "kim"}))).unwrap();
            store.flush().unwrap();
        }
        let store = SledRowStore::open(RowStoreConfig::new(dir.path())).unwrap();
        let key = store.parse_primary_key("user", "u1").unwrap();
        let lookup = store.prepare("user", &columns(&["name"]), false).unwrap();
        let found = store.execute(&lookup, &key, ConsistencyLevel::One).unwrap().unwrap();
        assert_eq!(found["name"], json!("kim"));
    }

    #[test]
    fn test_source_from_row() {
        let store = test_store();
        let bytes = store
            .source("event", &row(json!({"tenant": "acme", "seq": 1})))
            .unwrap();
        let tree: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(tree, json!({"seq": 1, "tenant": "acme"}));
    }
}
