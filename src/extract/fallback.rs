//! Last-resort extraction. Always yields a candidate.

use crate::models::{ExtractionCandidate, ExtractionMethod, SourceDescriptor};
use crate::normalize::{clean_channel, strip_common_junk};

pub struct FallbackExtractor {
    confidence: f64,
}

impl FallbackExtractor {
    pub fn new(confidence: f64) -> Self {
        Self { confidence }
    }

    pub fn name(&self) -> &'static str {
        ExtractionMethod::Fallback.as_str()
    }

    pub fn extract_always(&self, descriptor: &SourceDescriptor) -> ExtractionCandidate {
        let stripped = strip_common_junk(&descriptor.raw_title);
        let song = if stripped.is_empty() {
            descriptor.raw_title.trim()
        } else {
            stripped.as_str()
        };
        let artist = descriptor
            .channel_hint
            .as_deref()
            .map(clean_channel)
            .filter(|c| !c.is_empty());
        ExtractionCandidate::new(song, ExtractionMethod::Fallback, self.confidence).with_artist(artist)
    }
}
