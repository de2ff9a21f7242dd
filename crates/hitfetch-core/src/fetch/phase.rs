//! The fetch phase orchestrator.

use std::sync::Arc;

use hitfetch_proto::{Hit, SearchHits};
use tracing::{debug, instrument};

use crate::config::FetchConfig;
use crate::error::Error;
use crate::index::{IndexReader, SegmentDoc};
use crate::mapping::MappingService;
use crate::rowstore::RowStore;

use super::context::SearchContext;
use super::enrich::{EnrichmentPipeline, HitContext, SourceLookup};
use super::nested::NestedResolver;
use super::request::{CancellationToken, FetchRequest};
use super::selection::FieldSelector;
use super::source::{filter_encoded, reconstruct};
use super::stored::load_stored_fields;
use super::visitor::{FieldsVisitor, Uid};

/// Turns ranked doc ids into client-facing hits.
pub struct FetchPhase {
    config: FetchConfig,
    row_store: Option<Arc<dyn RowStore>>,
    pipeline: EnrichmentPipeline,
}

impl FetchPhase {
    /// A fetch phase without a row store and with an empty pipeline.
    pub fn new(config: FetchConfig) -> Self {
        Self {
            config,
            row_store: None,
            pipeline: EnrichmentPipeline::default(),
        }
    }

    pub fn with_row_store(mut self, store: Arc<dyn RowStore>) -> Self {
        self.row_store = Some(store);
        self
    }

    pub fn with_pipeline(mut self, pipeline: EnrichmentPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn row_store(&self) -> Option<&dyn RowStore> {
        self.row_store.as_deref()
    }

    pub fn pipeline(&self) -> &EnrichmentPipeline {
        &self.pipeline
    }

    /// Load the request window in order.
    ///
    /// Cancellation is checked before each document; once observed the whole
    /// request fails with [`Error::Cancelled`] and no hits are returned.
    #[instrument(skip_all, fields(from = request.from, size = request.size))]
    pub fn execute(
        &self,
        reader: &dyn IndexReader,
        mappings: &MappingService,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<SearchHits, Error> {
        let doc_ids = request.window()?;
        let plan = FieldSelector::new(mappings).plan(request)?;
        let mut visitor = plan.visitor();
        let ctx = SearchContext::new(self, reader, mappings, request, plan, cancel);
        let resolver = NestedResolver::new(reader, mappings);

        let mut hits = Vec::with_capacity(doc_ids.len());
        let mut nested_hits = 0usize;
        for &doc_id in doc_ids {
            if cancel.is_cancelled() {
                debug!(loaded = hits.len(), "Fetch cancelled");
                return Err(Error::Cancelled);
            }

            let doc = reader.resolve(doc_id).ok_or_else(|| {
                Error::InvalidData(format!(
                    "doc id [{doc_id}] is out of range, max doc is [{}]",
                    reader.max_doc()
                ))
            })?;

            let (mut hit, source) = match resolver.find_root(doc)? {
                Some(root) => {
                    nested_hits += 1;
                    self.nested_hit(&ctx, &resolver, doc, doc.sibling(root))?
                }
                None => self.root_hit(&ctx, visitor.as_mut(), doc)?,
            };

            let mut hit_ctx = HitContext::new(&mut hit, doc, source);
            self.pipeline.on_hit(&ctx, &mut hit_ctx)?;
            hits.push(hit);
        }

        self.pipeline.on_batch(&ctx, &mut hits)?;

        let stats = ctx.lookups().stats();
        debug!(
            docs = hits.len(),
            nested = nested_hits,
            lookups_compiled = stats.compilations(),
            lookup_cache_hits = stats.hits(),
            lookup_hit_rate = stats.hit_rate(),
            rows_found = stats.rows_found(),
            rows_missing = stats.rows_missing(),
            "Fetch complete"
        );

        Ok(SearchHits::new(hits, request.total_hits, request.max_score))
    }

    fn root_hit(
        &self,
        ctx: &SearchContext<'_>,
        visitor: Option<&mut FieldsVisitor>,
        doc: SegmentDoc,
    ) -> Result<(Hit, SourceLookup), Error> {
        let Some(visitor) = visitor else {
            return Ok((Hit::bare(doc.global()), SourceLookup::empty()));
        };

        load_stored_fields(ctx.reader(), doc, visitor)?;
        ctx.augmenter().augment(visitor)?;

        let uid = require_uid(visitor, doc)?;
        let doc_type = type_label(ctx.mappings(), &uid);
        let mut hit = Hit::new(doc.global(), uid.id, doc_type, visitor.take_hit_fields());

        let source = SourceLookup::root(visitor.source());
        if ctx.plan().load_source {
            if let Some((bytes, format)) = visitor.source() {
                let bytes = match ctx.plan().source.as_ref().filter(|s| s.is_filtered()) {
                    Some(options) => filter_encoded(&format.decode(bytes)?, "", options, format)?,
                    None => bytes.clone(),
                };
                hit = hit.with_source(bytes, format);
            }
        }
        Ok((hit, source))
    }

    fn nested_hit(
        &self,
        ctx: &SearchContext<'_>,
        resolver: &NestedResolver<'_>,
        doc: SegmentDoc,
        root: SegmentDoc,
    ) -> Result<(Hit, SourceLookup), Error> {
        let plan = ctx.plan();

        // The full source lives only on the root document.
        let mut root_visitor = FieldsVisitor::new(plan.load_source || ctx.request().highlight);
        load_stored_fields(ctx.reader(), root, &mut root_visitor)?;
        ctx.augmenter().augment(&mut root_visitor)?;
        let uid = require_uid(&root_visitor, root)?;

        let mapping = ctx.mappings().document_mapping(&uid.doc_type).ok_or_else(|| {
            Error::StructuralConsistency(format!(
                "nested doc id [{}] belongs to unmapped type [{}]",
                doc.global(),
                uid.doc_type
            ))
        })?;

        let fields = if plan.explicit {
            let mut nested_visitor = plan.nested_visitor();
            load_stored_fields(ctx.reader(), doc, &mut nested_visitor)?;
            nested_visitor.take_hit_fields()
        } else {
            Default::default()
        };

        let nested_object = resolver.find_nested_object(mapping, doc).ok_or_else(|| {
            Error::StructuralConsistency(format!(
                "doc id [{}] matches no nested object of [{}]",
                doc.global(),
                mapping.doc_type
            ))
        })?;
        let identity = resolver
            .identity(mapping, nested_object, doc)?
            .ok_or_else(|| {
                Error::StructuralConsistency(format!(
                    "no nested identity for doc id [{}] at [{}]",
                    doc.global(),
                    nested_object.path
                ))
            })?;

        let mut hit = Hit::nested(
            doc.global(),
            uid.id,
            mapping.type_text.clone(),
            identity.clone(),
            fields,
        );
        let source = match root_visitor.source() {
            Some((bytes, format)) => {
                let nested = reconstruct(&identity, bytes, format)?;
                if plan.load_source {
                    let bytes = match plan.source.as_ref().filter(|s| s.is_filtered()) {
                        Some(options) => {
                            filter_encoded(&nested.parsed, &identity.path(), options, nested.format)?
                        }
                        None => nested.source.clone(),
                    };
                    hit = hit.with_source(bytes, nested.format);
                }
                SourceLookup::nested(nested)
            }
            None => SourceLookup::empty(),
        };
        Ok((hit, source))
    }
}

fn require_uid(visitor: &FieldsVisitor, doc: SegmentDoc) -> Result<Uid, Error> {
    visitor.uid().cloned().ok_or_else(|| {
        Error::StructuralConsistency(format!("doc id [{}] has no stored uid", doc.global()))
    })
}

/// The mapping's type label, or the raw type when the type is unmapped.
fn type_label(mappings: &MappingService, uid: &Uid) -> String {
    mappings
        .document_mapping(&uid.doc_type)
        .map(|mapping| mapping.type_text.clone())
        .unwrap_or_else(|| uid.doc_type.clone())
}
