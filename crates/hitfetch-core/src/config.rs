//! Fetch phase configuration.

use crate::rowstore::ConsistencyLevel;

/// Default identifier reported in the `_node` pseudo-field.
pub const DEFAULT_LOCAL_NODE_ID: &str = "local";

/// Node-wide configuration of the fetch phase.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Consistency level of row store point lookups.
    pub lookup_consistency: ConsistencyLevel,

    /// Cluster default for reporting the origin node in `_node`.
    /// Indices may override it through [`IndexSettings`].
    pub include_node_id: bool,

    /// Identifier written into `_node`.
    pub local_node_id: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            lookup_consistency: ConsistencyLevel::One,
            include_node_id: false,
            local_node_id: DEFAULT_LOCAL_NODE_ID.to_string(),
        }
    }
}

impl FetchConfig {
    /// Create a configuration with the given node id.
    pub fn new(local_node_id: impl Into<String>) -> Self {
        Self {
            local_node_id: local_node_id.into(),
            ..Default::default()
        }
    }

    /// Set the lookup consistency level.
    pub fn with_lookup_consistency(mut self, level: ConsistencyLevel) -> Self {
        self.lookup_consistency = level;
        self
    }

    /// Set the cluster default for `_node` reporting.
    pub fn with_include_node_id(mut self, include: bool) -> Self {
        self.include_node_id = include;
        self
    }
}

/// Per-index settings supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct IndexSettings {
    /// Overrides [`FetchConfig::include_node_id`] when set.
    pub include_node_id: Option<bool>,
}

impl IndexSettings {
    /// Set the `_node` override.
    pub fn with_include_node_id(mut self, include: bool) -> Self {
        self.include_node_id = Some(include);
        self
    }

    /// Resolve the effective `_node` flag against the cluster default.
    pub fn include_node_id(&self, config: &FetchConfig) -> bool {
        self.include_node_id.unwrap_or(config.include_node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FetchConfig::default();
        assert_eq!(config.lookup_consistency, ConsistencyLevel::One);
        assert!(!config.include_node_id);
        assert_eq!(config.local_node_id, DEFAULT_LOCAL_NODE_ID);
    }

    #[test]
    fn test_index_setting_overrides_cluster_default() {
        let config = FetchConfig::new("node-1").with_include_node_id(true);
        assert!(IndexSettings::default().include_node_id(&config));
        assert!(!IndexSettings::default()
            .with_include_node_id(false)
            .include_node_id(&config));
    }
}
