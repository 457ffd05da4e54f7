//! Stage 2: ask the catalog directly with the cleaned title.
//!
//! Many uploads are titled "Artist - Song" or "Song - Artist" verbatim, so the
//! catalog's own top hit, when it reads back close to the upload title, is a
//! better identity than anything a parser could produce.

use std::sync::Arc;

use tracing::debug;

use crate::catalog::CatalogSearch;
use crate::error::ResolveError;
use crate::models::{CatalogResult, ExtractionCandidate, ExtractionMethod, SourceDescriptor};
use crate::normalize::strip_junk;
use crate::similarity::simple_ratio;

use super::ExtractionStrategy;

pub struct CatalogProbe {
    catalog: Arc<dyn CatalogSearch>,
    min_similarity: f64,
}

impl CatalogProbe {
    pub fn new(catalog: Arc<dyn CatalogSearch>, min_similarity: f64) -> Self {
        Self {
            catalog,
            min_similarity,
        }
    }
}

/// Best similarity between the upload title and the ways a result can be spelled.
pub fn probe_similarity(title: &str, hit: &CatalogResult) -> f64 {
    [
        hit.title.clone(),
        format!("{} - {}", hit.artist, hit.title),
        format!("{} - {}", hit.title, hit.artist),
    ]
    .iter()
    .map(|form| simple_ratio(title, form))
    .fold(0.0, f64::max)
}

impl ExtractionStrategy for CatalogProbe {
    fn name(&self) -> &'static str {
        ExtractionMethod::CatalogProbe.as_str()
    }

    fn extract(
        &self,
        descriptor: &SourceDescriptor,
    ) -> Result<Option<ExtractionCandidate>, ResolveError> {
        let query = strip_junk(&descriptor.raw_title);
        if query.is_empty() {
            return Ok(None);
        }

        let results = self
            .catalog
            .search(&query, 1)
            .map_err(|e| ResolveError::ExtractionStageFailure {
                stage: ExtractionMethod::CatalogProbe.as_str(),
                reason: e.to_string(),
            })?;
        let Some(top) = results.into_iter().next() else {
            return Ok(None);
        };

        let similarity = probe_similarity(&query, &top);
        debug!(query = %query, hit = %top.title, similarity, "catalog probe");
        if similarity < self.min_similarity {
            return Ok(None);
        }

        Ok(Some(
            ExtractionCandidate::new(&top.title, ExtractionMethod::CatalogProbe, similarity)
                .with_artist(Some(top.artist.clone()))
                .with_album(top.album.clone()),
        ))
    }
}
