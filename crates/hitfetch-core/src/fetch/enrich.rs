//! Enrichment pipeline run over every constructed hit.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use hitfetch_proto::{Hit, SourceFormat};
use serde_json::Value as JsonValue;

use crate::error::Error;
use crate::index::SegmentDoc;

use super::context::SearchContext;
use super::inner_hits::InnerHitsEnricher;
use super::source::NestedSource;

/// The source an enricher sees for the current hit.
///
/// For nested hits this is the re-sliced nested instance, not the root
/// document.
#[derive(Debug, Clone, Default)]
pub struct SourceLookup {
    source: Option<(Bytes, SourceFormat)>,
    parsed: Option<JsonValue>,
    wrapped: Option<JsonValue>,
}

impl SourceLookup {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Source of a root document.
    pub fn root(source: Option<(&Bytes, SourceFormat)>) -> Self {
        Self {
            source: source.map(|(bytes, format)| (bytes.clone(), format)),
            ..Default::default()
        }
    }

    /// Source of a nested document.
    pub fn nested(nested: NestedSource) -> Self {
        Self {
            source: Some((nested.source, nested.format)),
            parsed: Some(nested.parsed),
            wrapped: Some(nested.wrapped),
        }
    }

    pub fn bytes(&self) -> Option<&Bytes> {
        self.source.as_ref().map(|(bytes, _)| bytes)
    }

    pub fn format(&self) -> Option<SourceFormat> {
        self.source.as_ref().map(|(_, format)| *format)
    }

    /// The nested instance wrapped in its path, nested hits only.
    pub fn wrapped(&self) -> Option<&JsonValue> {
        self.wrapped.as_ref()
    }

    /// The source as a tree, parsing it if needed.
    pub fn tree(&self) -> Result<Option<JsonValue>, Error> {
        if let Some(parsed) = &self.parsed {
            return Ok(Some(parsed.clone()));
        }
        match &self.source {
            Some((bytes, format)) => Ok(Some(format.decode(bytes)?)),
            None => Ok(None),
        }
    }
}

/// Per-hit view handed to [`Enricher::on_hit`].
pub struct HitContext<'h> {
    hit: &'h mut Hit,
    doc: SegmentDoc,
    source: SourceLookup,
}

impl<'h> HitContext<'h> {
    pub fn new(hit: &'h mut Hit, doc: SegmentDoc, source: SourceLookup) -> Self {
        Self { hit, doc, source }
    }

    pub fn hit(&self) -> &Hit {
        &*self.hit
    }

    pub fn hit_mut(&mut self) -> &mut Hit {
        &mut *self.hit
    }

    pub fn doc(&self) -> SegmentDoc {
        self.doc
    }

    pub fn segment(&self) -> usize {
        self.doc.segment
    }

    pub fn local_doc(&self) -> u32 {
        self.doc.local
    }

    pub fn source(&self) -> &SourceLookup {
        &self.source
    }
}

/// A unit that augments hits after base reconstruction.
///
/// `on_hit` runs once per hit before the next document is processed;
/// `on_batch` runs once after every hit is built.
pub trait Enricher: Send + Sync {
    fn name(&self) -> &str;

    fn on_hit(&self, ctx: &SearchContext<'_>, hit: &mut HitContext<'_>) -> Result<(), Error> {
        let _ = (ctx, hit);
        Ok(())
    }

    fn on_batch(&self, ctx: &SearchContext<'_>, hits: &mut [Hit]) -> Result<(), Error> {
        let _ = (ctx, hits);
        Ok(())
    }
}

/// Ordered enrichers, always ending with inner hits expansion.
#[derive(Clone)]
pub struct EnrichmentPipeline {
    enrichers: Vec<Arc<dyn Enricher>>,
}

impl EnrichmentPipeline {
    pub fn new(mut enrichers: Vec<Arc<dyn Enricher>>) -> Self {
        enrichers.push(Arc::new(InnerHitsEnricher));
        Self { enrichers }
    }

    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Enricher names in run order.
    pub fn names(&self) -> Vec<&str> {
        self.enrichers.iter().map(|e| e.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.enrichers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enrichers.is_empty()
    }

    pub fn on_hit(&self, ctx: &SearchContext<'_>, hit: &mut HitContext<'_>) -> Result<(), Error> {
        for enricher in &self.enrichers {
            enricher.on_hit(ctx, hit)?;
        }
        Ok(())
    }

    pub fn on_batch(&self, ctx: &SearchContext<'_>, hits: &mut [Hit]) -> Result<(), Error> {
        for enricher in &self.enrichers {
            enricher.on_batch(ctx, hits)?;
        }
        Ok(())
    }
}

impl Default for EnrichmentPipeline {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl fmt::Debug for EnrichmentPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Builder for [`EnrichmentPipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    enrichers: Vec<Arc<dyn Enricher>>,
}

impl PipelineBuilder {
    pub fn with(mut self, enricher: impl Enricher + 'static) -> Self {
        self.enrichers.push(Arc::new(enricher));
        self
    }

    pub fn build(self) -> EnrichmentPipeline {
        EnrichmentPipeline::new(self.enrichers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl Enricher for Named {
        fn name(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn test_inner_hits_always_last() {
        let pipeline = EnrichmentPipeline::builder()
            .with(Named("highlight"))
            .with(Named("script_fields"))
            .build();
        assert_eq!(pipeline.names(), vec!["highlight", "script_fields", "inner_hits"]);
        assert_eq!(EnrichmentPipeline::default().names(), vec!["inner_hits"]);
    }

    #[test]
    fn test_source_lookup_tree() {
        let lookup = SourceLookup::root(Some((&Bytes::from_static(b"{\"a\":1}"), SourceFormat::Json)));
        assert_eq!(lookup.tree().unwrap(), Some(serde_json::json!({"a": 1})));
        assert!(lookup.wrapped().is_none());
        assert!(SourceLookup::empty().tree().unwrap().is_none());
    }
}
