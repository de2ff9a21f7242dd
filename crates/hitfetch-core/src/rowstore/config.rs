//! Row store configuration.

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_KEYSPACE: &str = "hitfetch";

/// Where and how the sled-backed row store keeps its trees.
#[derive(Debug, Clone)]
pub struct RowStoreConfig {
    /// Database directory. Ignored for temporary stores.
    pub path: PathBuf,
    /// Keyspace rendered into compiled lookup statements.
    pub keyspace: String,
    /// sled page cache size in bytes.
    pub cache_capacity: u64,
    /// Background flush period; `None` leaves flushing to [`SledRowStore::flush`](super::SledRowStore::flush).
    pub flush_interval: Option<Duration>,
    pub compression: bool,
    /// Remove the database when the store is dropped.
    pub temporary: bool,
}

impl Default for RowStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./hitfetch_rows"),
            keyspace: DEFAULT_KEYSPACE.to_string(),
            cache_capacity: 64 * 1024 * 1024,
            flush_interval: Some(Duration::from_millis(500)),
            compression: true,
            temporary: false,
        }
    }
}

impl RowStoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// A throwaway store, for tests.
    pub fn temporary() -> Self {
        Self {
            temporary: true,
            flush_interval: None,
            ..Default::default()
        }
    }

    pub fn with_keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.keyspace = keyspace.into();
        self
    }

    pub(crate) fn to_sled_config(&self) -> sled::Config {
        let config = sled::Config::new()
            .cache_capacity(self.cache_capacity)
            .use_compression(self.compression)
            .flush_every_ms(self.flush_interval.map(|d| d.as_millis() as u64));

        if self.temporary {
            config.temporary(true)
        } else {
            config.path(&self.path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporary_config() {
        let config = RowStoreConfig::temporary().with_keyspace("blog");
        assert!(config.temporary);
        assert!(config.flush_interval.is_none());
        assert_eq!(config.keyspace, "blog");
        assert!(config.to_sled_config().open().is_ok());
    }
}
