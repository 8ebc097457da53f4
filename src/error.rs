//! Typed errors at the library seams. The binary wraps them in `anyhow`.

use thiserror::Error;

/// A change record that cannot reach a registry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("namespace change without a name")]
    MissingNamespaceName,

    #[error("service change without an id (name {name:?})")]
    MissingServiceId { name: String },

    #[error("link change without both endpoints ({source_id:?} -> {destination_id:?})")]
    MissingLinkEndpoint {
        source_id: String,
        destination_id: String,
    },

    #[error("flow batch had no flow with both endpoint ids ({dropped} dropped)")]
    NoValidFlows { dropped: usize },

    #[error("cannot decode change record: {0}")]
    Decode(String),
}

/// What an event source can fail with.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The record is skipped; the stream keeps going.
    #[error(transparent)]
    Malformed(#[from] IngestError),

    /// The stream is over.
    #[error("transport failure: {0}")]
    Transport(#[from] std::io::Error),
}

/// Bad filter, verdict or HTTP status syntax.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterParseError {
    #[error("unknown verdict: {0}")]
    Verdict(String),

    #[error("bad http status filter: {0} (expected e.g. 404 or 4+)")]
    HttpStatus(String),

    #[error("empty filter query in {0:?}")]
    EmptyQuery(String),

    #[error("unknown visual toggle: {0}")]
    Toggle(String),
}

/// The engine task has shut down.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("frame engine is no longer running")]
pub struct EngineClosed;
