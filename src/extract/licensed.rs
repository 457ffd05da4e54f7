//! Stage 1: platform-supplied licensing metadata, taken verbatim.

use crate::error::ResolveError;
use crate::models::{ExtractionCandidate, ExtractionMethod, SourceDescriptor};

use super::ExtractionStrategy;

pub struct LicensedMetadataStrategy;

impl ExtractionStrategy for LicensedMetadataStrategy {
    fn name(&self) -> &'static str {
        ExtractionMethod::Licensed.as_str()
    }

    fn extract(
        &self,
        descriptor: &SourceDescriptor,
    ) -> Result<Option<ExtractionCandidate>, ResolveError> {
        let Some(licensed) = &descriptor.licensed else {
            return Ok(None);
        };
        if licensed.song.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(
            ExtractionCandidate::new(licensed.song.trim(), ExtractionMethod::Licensed, 1.0)
                .with_artist(licensed.artist.clone())
                .with_album(licensed.album.clone()),
        ))
    }
}
