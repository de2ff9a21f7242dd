//! Request-scoped state shared by every stage of one fetch.

use crate::index::IndexReader;
use crate::mapping::MappingService;

use super::augment::RowAugmenter;
use super::cache::LookupCache;
use super::phase::FetchPhase;
use super::request::{CancellationToken, FetchRequest};
use super::selection::FieldSelectionPlan;

/// Everything a fetch stage or enricher may consult. Lives for one request.
pub struct SearchContext<'a> {
    phase: &'a FetchPhase,
    reader: &'a dyn IndexReader,
    mappings: &'a MappingService,
    request: &'a FetchRequest,
    plan: FieldSelectionPlan,
    cancel: &'a CancellationToken,
    lookups: LookupCache,
}

impl<'a> SearchContext<'a> {
    pub(crate) fn new(
        phase: &'a FetchPhase,
        reader: &'a dyn IndexReader,
        mappings: &'a MappingService,
        request: &'a FetchRequest,
        plan: FieldSelectionPlan,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            phase,
            reader,
            mappings,
            request,
            plan,
            cancel,
            lookups: LookupCache::new(),
        }
    }

    pub fn phase(&self) -> &'a FetchPhase {
        self.phase
    }

    pub fn reader(&self) -> &'a dyn IndexReader {
        self.reader
    }

    pub fn mappings(&self) -> &'a MappingService {
        self.mappings
    }

    pub fn request(&self) -> &'a FetchRequest {
        self.request
    }

    pub fn plan(&self) -> &FieldSelectionPlan {
        &self.plan
    }

    pub fn cancel(&self) -> &'a CancellationToken {
        self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The per-request lookup cache.
    pub fn lookups(&self) -> &LookupCache {
        &self.lookups
    }

    pub(crate) fn augmenter(&self) -> RowAugmenter<'_> {
        RowAugmenter::new(
            self.phase.row_store(),
            self.phase.config(),
            &self.request.index_settings,
            self.mappings,
            &self.lookups,
        )
    }
}
