//! Hitfetch Core - the fetch phase of a block-join search index.
//!
//! Given the ranked doc ids produced by a query phase, this crate loads
//! stored fields, resolves nested identities, re-slices nested sources,
//! merges columns from an external row store and runs an enrichment
//! pipeline over the resulting hits.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod config;
pub mod error;
pub mod fetch;
pub mod index;
pub mod mapping;
pub mod rowstore;

pub use config::{FetchConfig, IndexSettings};
pub use error::Error;
pub use fetch::{
    CancellationToken, Enricher, EnrichmentPipeline, FetchPhase, FetchRequest,
    FetchSourceOptions, HitContext, InnerHitsDefinition, SearchContext, StoredFieldsOptions,
};
pub use index::{IndexBuilder, IndexReader, MemoryIndex, Predicate, SourceDocument};
pub use mapping::{DocumentMapping, FieldMapping, MappingService, ObjectMapping, SourceMapping};
pub use rowstore::{ConsistencyLevel, RowStore, RowStoreConfig, SledRowStore, TableDef};

/// Re-export protocol types.
pub use hitfetch_proto as proto;
