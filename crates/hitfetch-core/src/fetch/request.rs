//! Fetch request options.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::IndexSettings;
use crate::error::Error;

use super::inner_hits::InnerHitsDefinition;

/// Pseudo field name that disables stored fields entirely.
pub const NO_STORED_FIELDS: &str = "_none_";

/// Which stored fields to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFieldsOptions {
    /// False disables stored field loading (`_none_`).
    pub fetch_fields: bool,
    /// Requested names and `*` patterns. Empty means "no stored fields".
    pub field_names: Vec<String>,
}

impl StoredFieldsOptions {
    /// Load the given fields.
    pub fn fields<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let field_names: Vec<String> = names.into_iter().map(Into::into).collect();
        if field_names.len() == 1 && field_names[0] == NO_STORED_FIELDS {
            return Self::none();
        }
        Self {
            fetch_fields: true,
            field_names,
        }
    }

    /// Disable stored fields entirely.
    pub fn none() -> Self {
        Self {
            fetch_fields: false,
            field_names: Vec::new(),
        }
    }
}

/// Source directive of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSourceOptions {
    pub fetch: bool,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
}

impl FetchSourceOptions {
    /// Fetch the full source.
    pub fn fetch() -> Self {
        Self {
            fetch: true,
            ..Default::default()
        }
    }

    /// Explicitly skip the source.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_includes(mut self, patterns: &[&str]) -> Self {
        self.includes = patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_excludes(mut self, patterns: &[&str]) -> Self {
        self.excludes = patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Whether includes or excludes narrow the returned source.
    pub fn is_filtered(&self) -> bool {
        !self.includes.is_empty() || !self.excludes.is_empty()
    }
}

/// One fetch invocation: the ids produced by the query phase and how to
/// render them.
#[derive(Debug, Clone, Default)]
pub struct FetchRequest {
    /// Global doc ids in rank order.
    pub doc_ids: Vec<u32>,
    /// First position of the load window.
    pub from: usize,
    /// Length of the load window.
    pub size: usize,
    pub stored_fields: Option<StoredFieldsOptions>,
    pub fetch_source: Option<FetchSourceOptions>,
    pub script_fields: bool,
    pub highlight: bool,
    /// Total match count reported by the query phase.
    pub total_hits: u64,
    /// Best score reported by the query phase.
    pub max_score: Option<f32>,
    pub index_settings: IndexSettings,
    pub inner_hits: Vec<InnerHitsDefinition>,
}

impl FetchRequest {
    /// Load every id in `doc_ids`.
    pub fn new(doc_ids: Vec<u32>) -> Self {
        Self {
            size: doc_ids.len(),
            total_hits: doc_ids.len() as u64,
            doc_ids,
            ..Default::default()
        }
    }

    pub fn with_window(mut self, from: usize, size: usize) -> Self {
        self.from = from;
        self.size = size;
        self
    }

    pub fn with_stored_fields(mut self, options: StoredFieldsOptions) -> Self {
        self.stored_fields = Some(options);
        self
    }

    pub fn with_fetch_source(mut self, options: FetchSourceOptions) -> Self {
        self.fetch_source = Some(options);
        self
    }

    pub fn with_script_fields(mut self) -> Self {
        self.script_fields = true;
        self
    }

    pub fn with_highlight(mut self) -> Self {
        self.highlight = true;
        self
    }

    pub fn with_totals(mut self, total_hits: u64, max_score: Option<f32>) -> Self {
        self.total_hits = total_hits;
        self.max_score = max_score;
        self
    }

    pub fn with_index_settings(mut self, settings: IndexSettings) -> Self {
        self.index_settings = settings;
        self
    }

    pub fn with_inner_hits(mut self, definition: InnerHitsDefinition) -> Self {
        self.inner_hits.push(definition);
        self
    }

    /// The ids to load, `doc_ids[from..from + size]`.
    pub fn window(&self) -> Result<&[u32], Error> {
        self.from
            .checked_add(self.size)
            .and_then(|end| self.doc_ids.get(self.from..end))
            .ok_or_else(|| {
                Error::InvalidData(format!(
                    "load window [{}..{}+{}] exceeds {} doc ids",
                    self.from,
                    self.from,
                    self.size,
                    self.doc_ids.len()
                ))
            })
    }
}

/// Cooperative cancellation flag shared with the caller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Observed before the next document.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
