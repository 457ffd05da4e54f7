//! Core data models for track resolution.
//!
//! This module contains the descriptor, candidate, match and queue types
//! passed between the pipeline stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Source Models
// ============================================================================

/// Song identity already disambiguated by the source platform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LicensedMetadata {
    pub song: String,
    pub artist: Option<String>,
    pub album: Option<String>,
}

/// Raw, unresolved track reference from a source platform.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub raw_title: String,
    #[serde(default)]
    pub channel_hint: Option<String>,
    pub source_platform: String,
    pub external_id: String,
    /// Free-text description, forwarded to AI extraction when present
    #[serde(default)]
    pub description: Option<String>,
    /// Platform-supplied licensing metadata (rare)
    #[serde(default)]
    pub licensed: Option<LicensedMetadata>,
}

impl SourceDescriptor {
    pub fn new(raw_title: &str, channel_hint: Option<&str>) -> Self {
        Self {
            raw_title: raw_title.to_string(),
            channel_hint: channel_hint.map(str::to_string),
            source_platform: "youtube".to_string(),
            external_id: String::new(),
            description: None,
            licensed: None,
        }
    }
}

// ============================================================================
// Extraction Models
// ============================================================================

/// Which pipeline stage produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Licensed,
    CatalogProbe,
    RuleBased,
    AiPrimary,
    AiSecondary,
    Fallback,
}

impl ExtractionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractionMethod::Licensed => "licensed",
            ExtractionMethod::CatalogProbe => "catalog_probe",
            ExtractionMethod::RuleBased => "rule_based",
            ExtractionMethod::AiPrimary => "ai_primary",
            ExtractionMethod::AiSecondary => "ai_secondary",
            ExtractionMethod::Fallback => "fallback",
        }
    }
}

/// A stage's best guess at the canonical song identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractionCandidate {
    pub song_title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub method: ExtractionMethod,
    pub confidence: f64, // always within [0, 1]
}

impl ExtractionCandidate {
    pub fn new(song_title: &str, method: ExtractionMethod, confidence: f64) -> Self {
        Self {
            song_title: song_title.to_string(),
            artist: None,
            album: None,
            method,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn with_artist(mut self, artist: Option<String>) -> Self {
        self.artist = artist.filter(|a| !a.trim().is_empty());
        self
    }

    pub fn with_album(mut self, album: Option<String>) -> Self {
        self.album = album.filter(|a| !a.trim().is_empty());
        self
    }
}

// ============================================================================
// Catalog Models
// ============================================================================

/// Raw, unscored item returned by a catalog search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogResult {
    pub target_track_id: String,
    pub title: String,
    pub artist: String, // credited artists joined with ", "
    #[serde(default)]
    pub album: Option<String>,
    /// Publisher / distributor, when the catalog exposes it
    #[serde(default)]
    pub label: Option<String>,
}

/// Query group that produced a result set, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    ArtistQualified,
    AlbumQualified,
    TitleOnly,
}

impl SearchStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchStrategy::ArtistQualified => "artist",
            SearchStrategy::AlbumQualified => "album",
            SearchStrategy::TitleOnly => "title_only",
        }
    }
}

/// A catalog result scored against an extraction candidate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub result: CatalogResult,
    pub strategy: SearchStrategy,
    pub title_similarity: f64,
    pub artist_similarity: f64,
    /// Diagnostic only
    pub title_token_set: f64,
    /// Diagnostic only
    pub title_partial: f64,
    pub title_contains: bool,
    pub artist_contains: bool,
    pub trusted_source_bonus: f64,
    pub composite_score: f64,
    pub overall_confidence: f64,
}

impl MatchCandidate {
    pub fn track_id(&self) -> &str {
        &self.result.target_track_id
    }
}

// ============================================================================
// Resolution Models
// ============================================================================

/// Auto-commit tier, kept distinct for telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitTier {
    High,
    Medium,
    /// Lowered threshold granted by the feedback tracker
    TrustedExact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// Every query group came back empty
    NoResults,
    /// Results existed but the best one scored below the low threshold
    LowConfidence,
}

/// Outcome of one descriptor in one sync attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    AutoCommit {
        best: MatchCandidate,
        tier: CommitTier,
    },
    PendingReview {
        candidates: Vec<MatchCandidate>,
        descriptor: SourceDescriptor,
    },
    Unresolved {
        descriptor: SourceDescriptor,
        reason: UnresolvedReason,
        candidates: Vec<MatchCandidate>,
    },
}

impl Resolution {
    pub fn label(&self) -> &'static str {
        match self {
            Resolution::AutoCommit { .. } => "auto_commit",
            Resolution::PendingReview { .. } => "pending_review",
            Resolution::Unresolved { .. } => "unresolved",
        }
    }
}

// ============================================================================
// Queue Models
// ============================================================================

/// Distinguishes "pick one of these" from "no match found" in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingKind {
    Review,
    NoMatch,
}

impl PendingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PendingKind::Review => "review",
            PendingKind::NoMatch => "no_match",
        }
    }
}

/// A match awaiting human confirmation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingEntry {
    pub entry_id: Uuid,
    pub owner_user_id: String,
    pub descriptor: SourceDescriptor,
    pub candidates: Vec<MatchCandidate>,
    pub target_playlist_ref: String,
    pub kind: PendingKind,
    pub created_at: DateTime<Utc>,
}

impl PendingEntry {
    pub fn new(
        owner_user_id: &str,
        descriptor: SourceDescriptor,
        candidates: Vec<MatchCandidate>,
        target_playlist_ref: &str,
        kind: PendingKind,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            owner_user_id: owner_user_id.to_string(),
            descriptor,
            candidates,
            target_playlist_ref: target_playlist_ref.to_string(),
            kind,
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// Feedback Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Confirmation,
    /// User supplied a track outside the candidate list
    Correction,
    Rejection,
}

impl FeedbackKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackKind::Confirmation => "confirmation",
            FeedbackKind::Correction => "correction",
            FeedbackKind::Rejection => "rejection",
        }
    }
}

/// Append-only record of a user decision on a pending entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub user_id: String,
    pub descriptor: SourceDescriptor,
    pub chosen_candidate: Option<CatalogResult>,
    pub confidence: f64,
    pub kind: FeedbackKind,
    /// Chosen candidate's title matched exactly
    pub exact_match: bool,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Access Control
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

/// Caller identity, resolved once at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub role: Role,
}

impl Principal {
    pub fn user(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            role: Role::User,
        }
    }

    pub fn admin(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            role: Role::Admin,
        }
    }

    pub fn can_access(&self, owner_user_id: &str) -> bool {
        match self.role {
            Role::Admin => true,
            Role::User => self.user_id == owner_user_id,
        }
    }
}
