//! Error taxonomy for the resolution core.
//!
//! Most of these are non-fatal: the pipeline inspects them to decide whether
//! to fall through to the next stage. Only queue operations surface errors
//! to the caller.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised while resolving, committing or reviewing a track.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A single extraction stage failed; the pipeline moves on.
    #[error("extraction stage '{stage}' failed: {reason}")]
    ExtractionStageFailure { stage: &'static str, reason: String },

    /// Every query group came back empty.
    #[error("catalog search returned no results for '{0}'")]
    CatalogSearchEmpty(String),

    /// An AI provider is out of quota for the current window.
    #[error("provider '{0}' quota exceeded")]
    ProviderQuotaExceeded(String),

    #[error("playlist mutation failed for '{playlist_ref}': {reason}")]
    PlaylistMutationFailure {
        playlist_ref: String,
        reason: String,
    },

    /// The entry was already confirmed or skipped.
    #[error("pending entry {0} no longer exists")]
    StaleEntry(Uuid),

    #[error("track '{track_id}' is not a candidate of entry {entry_id}")]
    UnknownCandidate { track_id: String, entry_id: Uuid },

    #[error("user '{actor}' may not access the queue of '{owner}'")]
    Forbidden { actor: String, owner: String },

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for ResolveError {
    fn from(err: rusqlite::Error) -> Self {
        ResolveError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ResolveError {
    fn from(err: serde_json::Error) -> Self {
        ResolveError::Storage(format!("serialization: {err}"))
    }
}

/// Errors from a searchable catalog backend.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog query failed: {0}")]
    Query(String),

    #[error("catalog storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// Errors from an AI extraction provider.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("quota exceeded")]
    QuotaExceeded,

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}
