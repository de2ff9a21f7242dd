//! The fetch phase.
//!
//! Given ranked doc ids from the query phase, [`FetchPhase::execute`] loads
//! each document's stored fields, resolves nested identities, re-slices
//! nested sources, merges row store columns, and runs the enrichment
//! pipeline.

mod augment;
mod cache;
mod context;
mod enrich;
mod inner_hits;
mod nested;
mod phase;
mod request;
mod selection;
mod source;
mod stored;
mod visitor;

pub use augment::RowAugmenter;
pub use cache::{LookupCache, LookupStats};
pub use context::SearchContext;
pub use enrich::{Enricher, EnrichmentPipeline, HitContext, PipelineBuilder, SourceLookup};
pub use inner_hits::{
    InnerHitsDefinition, InnerHitsEnricher, InnerHitsResolver, NestedChildren, TopDocs,
};
pub use nested::NestedResolver;
pub use phase::FetchPhase;
pub use request::{
    CancellationToken, FetchRequest, FetchSourceOptions, StoredFieldsOptions, NO_STORED_FIELDS,
};
pub use selection::{is_simple_match_pattern, simple_match, FieldSelectionPlan, FieldSelector};
pub use source::{filter_source, reconstruct, NestedSource};
pub use stored::load_stored_fields;
pub use visitor::{FieldsVisitor, Uid};
