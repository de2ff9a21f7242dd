//! Protocol error types.

use thiserror::Error;

/// Errors raised while encoding or decoding source payloads.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot encode source as {format}: {reason}")]
    Encode { format: &'static str, reason: String },

    #[error("cannot decode {format} source: {reason}")]
    Decode { format: &'static str, reason: String },
}
