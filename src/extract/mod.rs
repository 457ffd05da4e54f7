//! Extraction pipeline: raw descriptor → song identity candidate.
//!
//! Stages run in order and the first one that produces a candidate wins.
//! A stage that has nothing to say returns `Ok(None)`; a stage that breaks
//! returns `Err`, which is logged and treated the same way. The fallback
//! stage sits outside the list and always produces something.

pub mod ai;
pub mod catalog_probe;
pub mod fallback;
pub mod licensed;
pub mod rules;

use tracing::{debug, info, warn};

use crate::error::ResolveError;
use crate::models::{ExtractionCandidate, SourceDescriptor};

pub use ai::{AiExtraction, AiExtractor, AiRequest, AiStrategy, QuotaGate};
pub use catalog_probe::CatalogProbe;
pub use fallback::FallbackExtractor;
pub use licensed::LicensedMetadataStrategy;
pub use rules::RuleBasedParser;

/// One pluggable extraction stage.
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(
        &self,
        descriptor: &SourceDescriptor,
    ) -> Result<Option<ExtractionCandidate>, ResolveError>;
}

pub struct ExtractionPipeline {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    fallback: FallbackExtractor,
}

impl ExtractionPipeline {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>, fallback: FallbackExtractor) -> Self {
        Self {
            strategies,
            fallback,
        }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.strategies
            .iter()
            .map(|s| s.name())
            .chain(std::iter::once(self.fallback.name()))
            .collect()
    }

    /// Run every stage in order. Never fails.
    pub fn run(&self, descriptor: &SourceDescriptor) -> ExtractionCandidate {
        for strategy in &self.strategies {
            match strategy.extract(descriptor) {
                Ok(Some(mut candidate)) => {
                    let song = candidate.song_title.trim();
                    if song.is_empty() {
                        debug!(stage = strategy.name(), "stage returned an empty song, skipping");
                        continue;
                    }
                    candidate.song_title = song.to_string();
                    candidate.confidence = candidate.confidence.clamp(0.0, 1.0);
                    info!(
                        stage = strategy.name(),
                        song = %candidate.song_title,
                        artist = candidate.artist.as_deref().unwrap_or(""),
                        confidence = candidate.confidence,
                        "extracted"
                    );
                    return candidate;
                }
                Ok(None) => {
                    debug!(stage = strategy.name(), title = %descriptor.raw_title, "no candidate");
                }
                Err(err) => {
                    warn!(stage = strategy.name(), title = %descriptor.raw_title, "{err}");
                }
            }
        }

        let candidate = self.fallback.extract_always(descriptor);
        info!(
            stage = self.fallback.name(),
            song = %candidate.song_title,
            confidence = candidate.confidence,
            "extracted"
        );
        candidate
    }
}
