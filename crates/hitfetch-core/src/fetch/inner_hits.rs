//! Inner hits expansion, the last stage of every pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use hitfetch_proto::{Hit, SearchHits};

use crate::error::Error;
use crate::index::Predicate;

use super::context::SearchContext;
use super::enrich::{Enricher, HitContext};
use super::request::{FetchRequest, FetchSourceOptions, StoredFieldsOptions};

/// Doc ids selected for an inner hits section, with their totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopDocs {
    pub doc_ids: Vec<u32>,
    pub total_hits: u64,
    pub max_score: Option<f32>,
}

impl TopDocs {
    pub fn new(doc_ids: Vec<u32>) -> Self {
        Self {
            total_hits: doc_ids.len() as u64,
            doc_ids,
            max_score: None,
        }
    }
}

/// Selects the documents of an inner hits section for one hit.
pub trait InnerHitsResolver: Send + Sync {
    fn resolve(&self, ctx: &SearchContext<'_>, hit: &Hit) -> Result<TopDocs, Error>;
}

/// A named inner hits section of a request.
#[derive(Clone)]
pub struct InnerHitsDefinition {
    pub name: String,
    pub stored_fields: Option<StoredFieldsOptions>,
    pub fetch_source: Option<FetchSourceOptions>,
    pub resolver: Arc<dyn InnerHitsResolver>,
}

impl InnerHitsDefinition {
    pub fn new(name: impl Into<String>, resolver: impl InnerHitsResolver + 'static) -> Self {
        Self {
            name: name.into(),
            stored_fields: None,
            fetch_source: None,
            resolver: Arc::new(resolver),
        }
    }

    pub fn with_stored_fields(mut self, options: StoredFieldsOptions) -> Self {
        self.stored_fields = Some(options);
        self
    }

    pub fn with_fetch_source(mut self, options: FetchSourceOptions) -> Self {
        self.fetch_source = Some(options);
        self
    }
}

impl fmt::Debug for InnerHitsDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InnerHitsDefinition")
            .field("name", &self.name)
            .field("stored_fields", &self.stored_fields)
            .field("fetch_source", &self.fetch_source)
            .finish_non_exhaustive()
    }
}

/// Resolves the nested instances of `path` inside a root hit, in source order.
#[derive(Debug, Clone)]
pub struct NestedChildren {
    path: String,
}

impl NestedChildren {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl InnerHitsResolver for NestedChildren {
    fn resolve(&self, ctx: &SearchContext<'_>, hit: &Hit) -> Result<TopDocs, Error> {
        if hit.is_nested() {
            return Ok(TopDocs::default());
        }
        let reader = ctx.reader();
        let doc = reader.resolve(hit.doc_id).ok_or_else(|| {
            Error::InvalidData(format!("doc id [{}] is out of range", hit.doc_id))
        })?;
        let Some(children) = reader.membership(doc.segment, &Predicate::Nested(self.path.clone()))
        else {
            return Ok(TopDocs::default());
        };

        let block_start = reader
            .membership(doc.segment, &Predicate::Root)
            .and_then(|roots| roots.prev_before(doc.local));
        let mut locals = match block_start {
            Some(previous_root) => children.members_between(previous_root, doc.local),
            None => children.iter().take_while(|&m| m < doc.local).collect(),
        };
        locals.reverse();

        Ok(TopDocs::new(
            locals.into_iter().map(|local| doc.sibling(local).global()).collect(),
        ))
    }
}

/// Runs a sub-fetch per inner hits definition and stores the result on the
/// hit under the definition's name.
#[derive(Debug, Default)]
pub struct InnerHitsEnricher;

impl Enricher for InnerHitsEnricher {
    fn name(&self) -> &str {
        "inner_hits"
    }

    fn on_hit(&self, ctx: &SearchContext<'_>, hit: &mut HitContext<'_>) -> Result<(), Error> {
        let definitions = &ctx.request().inner_hits;
        if definitions.is_empty() {
            return Ok(());
        }

        let mut sections = BTreeMap::new();
        for definition in definitions {
            let top = definition.resolver.resolve(ctx, hit.hit())?;
            if top.doc_ids.is_empty() {
                sections.insert(
                    definition.name.clone(),
                    SearchHits {
                        total_hits: top.total_hits,
                        max_score: top.max_score,
                        ..SearchHits::empty()
                    },
                );
                continue;
            }

            let mut request = FetchRequest::new(top.doc_ids)
                .with_totals(top.total_hits, top.max_score)
                .with_index_settings(ctx.request().index_settings.clone());
            request.stored_fields = definition.stored_fields.clone();
            request.fetch_source = definition.fetch_source.clone();

            let hits = ctx
                .phase()
                .execute(ctx.reader(), ctx.mappings(), &request, ctx.cancel())?;
            sections.insert(definition.name.clone(), hits);
        }
        hit.hit_mut().inner_hits = Some(sections);
        Ok(())
    }
}
