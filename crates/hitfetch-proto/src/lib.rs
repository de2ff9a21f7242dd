//! Result types for the hitfetch fetch phase.
//!
//! This crate defines the client-facing shapes produced by the fetch phase:
//! hits, their fields and nested identities, and the source encodings they
//! carry.
//!
//! # Modules
//!
//! - [`value`] - Runtime values of stored and fetched fields
//! - [`hit`] - Hits, hit fields, nested identities and hit collections
//! - [`source`] - Source payload encodings
//! - [`error`] - Protocol error types
//!
//! # Serialization
//!
//! [`Value`] and [`SourceFormat`] derive `rkyv::Archive` so storage layers can
//! persist them without copying. Result types derive serde so callers can
//! render them as JSON:
//!
//! ```ignore
//! use hitfetch_proto::{Hit, SearchHits};
//!
//! let hits = SearchHits::new(vec![Hit::bare(0)], 1, None);
//! let json = serde_json::to_string(&hits).unwrap();
//! ```

pub mod error;
pub mod hit;
pub mod source;
pub mod value;

pub use error::Error;

// Re-export commonly used types at crate root
pub use hit::{Hit, HitField, NestedIdentity, NestedLink, SearchHits};
pub use source::SourceFormat;
pub use value::Value;
