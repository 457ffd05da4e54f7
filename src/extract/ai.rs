//! Stage 4: AI-assisted extraction.
//!
//! Each configured provider is its own pipeline stage (primary, then
//! secondary) with its own quota gate. A provider that reports quota
//! exhaustion is skipped without a call until its window has passed; the
//! gate clears lazily on the next check.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::warn;

use crate::error::{AiError, ResolveError};
use crate::models::{ExtractionCandidate, ExtractionMethod, SourceDescriptor};

use super::ExtractionStrategy;

/// Confidence used when a provider omits one.
const DEFAULT_AI_CONFIDENCE: f64 = 0.6;

/// Answers that mean "I could not tell".
const UNKNOWN_SONGS: &[&str] = &["unknown", "unknown title", "unknown song", "n/a", "none", "null"];

#[derive(Debug, Clone, PartialEq)]
pub struct AiRequest {
    pub title: String,
    pub channel_hint: Option<String>,
    pub description: Option<String>,
}

impl AiRequest {
    pub fn from_descriptor(descriptor: &SourceDescriptor) -> Self {
        Self {
            title: descriptor.raw_title.clone(),
            channel_hint: descriptor.channel_hint.clone(),
            description: descriptor.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AiExtraction {
    pub song: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub confidence: f64,
}

pub trait AiExtractor: Send + Sync {
    fn name(&self) -> &str;

    fn extract(&self, request: &AiRequest) -> Result<AiExtraction, AiError>;
}

// ============================================================================
// Prompt and response handling
// ============================================================================

pub const SYSTEM_PROMPT: &str =
    "You are a music metadata engine. Follow the instructions and output only JSON.";

pub fn build_prompt(request: &AiRequest) -> String {
    let mut prompt = String::new();
    prompt.push_str("Identify the song in this video upload.\n\n");
    prompt.push_str(&format!("Video title: \"{}\"\n", request.title));
    prompt.push_str(&format!(
        "Channel: \"{}\"\n",
        request.channel_hint.as_deref().unwrap_or("Unknown")
    ));
    if let Some(description) = request.description.as_deref().filter(|d| !d.trim().is_empty()) {
        let short: String = description.chars().take(500).collect();
        prompt.push_str(&format!("Description: \"{}\"\n", short));
    }
    prompt.push_str(
        "\nRules:\n\
         - song is the clean song name only, never the album or movie name\n\
         - drop tags like Official Video, Lyrics, 4K, HD, Full Song, Video Song\n\
         - artist is the singer, not the music director, actor or channel\n\
         - album is the album or movie name when known\n\
         - confidence is a number between 0 and 1\n\
         - use null for anything you do not know\n\n\
         Respond with exactly one JSON object:\n\
         {\"song\": \"...\", \"artist\": \"...\", \"album\": \"...\", \"confidence\": 0.0}\n",
    );
    prompt
}

#[derive(Deserialize)]
struct RawExtraction {
    #[serde(default)]
    song: Option<String>,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    album: Option<String>,
    #[serde(default)]
    confidence: Option<serde_json::Value>,
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line ("```json")
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn confidence_value(value: Option<&serde_json::Value>) -> f64 {
    let raw = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
        _ => None,
    };
    match raw {
        // Percent scale
        Some(v) if v > 1.0 && v <= 100.0 => v / 100.0,
        Some(v) => v.clamp(0.0, 1.0),
        None => DEFAULT_AI_CONFIDENCE,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !UNKNOWN_SONGS.contains(&v.to_lowercase().as_str()))
}

/// Parse a provider reply, tolerating code fences and surrounding prose.
pub fn parse_extraction(content: &str) -> Result<AiExtraction, AiError> {
    let body = strip_code_fence(content);
    let json = match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => return Err(AiError::InvalidResponse(format!("no JSON object in '{body}'"))),
    };
    let raw: RawExtraction =
        serde_json::from_str(json).map_err(|e| AiError::InvalidResponse(e.to_string()))?;

    let song = non_empty(raw.song)
        .ok_or_else(|| AiError::InvalidResponse("empty or unknown song".into()))?;
    Ok(AiExtraction {
        song,
        artist: non_empty(raw.artist),
        album: non_empty(raw.album),
        confidence: confidence_value(raw.confidence.as_ref()),
    })
}

// ============================================================================
// Quota gate
// ============================================================================

/// Time-boxed "out of quota" flag for one provider.
pub struct QuotaGate {
    tripped_at: Mutex<Option<Instant>>,
    window: Duration,
}

impl QuotaGate {
    pub fn new(window: Duration) -> Self {
        Self {
            tripped_at: Mutex::new(None),
            window,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.is_exhausted_at(Instant::now())
    }

    /// Clears the flag once the window has elapsed.
    pub fn is_exhausted_at(&self, now: Instant) -> bool {
        let Ok(mut tripped) = self.tripped_at.lock() else {
            return false;
        };
        match *tripped {
            Some(at) if now.saturating_duration_since(at) < self.window => true,
            Some(_) => {
                *tripped = None;
                false
            }
            None => false,
        }
    }

    pub fn trip(&self) {
        self.trip_at(Instant::now());
    }

    pub fn trip_at(&self, now: Instant) {
        if let Ok(mut tripped) = self.tripped_at.lock() {
            *tripped = Some(now);
        }
    }
}

// ============================================================================
// Strategy
// ============================================================================

pub struct AiStrategy {
    extractor: Box<dyn AiExtractor>,
    method: ExtractionMethod,
    gate: QuotaGate,
}

impl AiStrategy {
    pub fn primary(extractor: Box<dyn AiExtractor>, window: Duration) -> Self {
        Self::new(extractor, ExtractionMethod::AiPrimary, window)
    }

    pub fn secondary(extractor: Box<dyn AiExtractor>, window: Duration) -> Self {
        Self::new(extractor, ExtractionMethod::AiSecondary, window)
    }

    fn new(extractor: Box<dyn AiExtractor>, method: ExtractionMethod, window: Duration) -> Self {
        Self {
            extractor,
            method,
            gate: QuotaGate::new(window),
        }
    }
}

impl ExtractionStrategy for AiStrategy {
    fn name(&self) -> &'static str {
        self.method.as_str()
    }

    fn extract(
        &self,
        descriptor: &SourceDescriptor,
    ) -> Result<Option<ExtractionCandidate>, ResolveError> {
        let provider = self.extractor.name().to_string();
        if self.gate.is_exhausted() {
            return Err(ResolveError::ProviderQuotaExceeded(provider));
        }

        match self.extractor.extract(&AiRequest::from_descriptor(descriptor)) {
            Ok(extraction) => Ok(Some(
                ExtractionCandidate::new(&extraction.song, self.method, extraction.confidence)
                    .with_artist(extraction.artist)
                    .with_album(extraction.album),
            )),
            Err(AiError::QuotaExceeded) => {
                warn!(provider = %provider, "quota exceeded, provider paused");
                self.gate.trip();
                Err(ResolveError::ProviderQuotaExceeded(provider))
            }
            Err(err) => Err(ResolveError::ExtractionStageFailure {
                stage: self.method.as_str(),
                reason: format!("{provider}: {err}"),
            }),
        }
    }
}
