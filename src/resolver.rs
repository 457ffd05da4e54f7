//! Descriptor → resolution, end to end.
//!
//! Extraction, search, scoring and triage for one song. Always produces a
//! resolution; every failure along the way degrades to a later stage or to
//! `Unresolved`.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::CatalogSearch;
use crate::chat::ChatExtractor;
use crate::config::{ProviderConfig, ResolverConfig};
use crate::extract::{
    AiExtractor, AiStrategy, CatalogProbe, ExtractionPipeline, ExtractionStrategy, FallbackExtractor,
    LicensedMetadataStrategy, RuleBasedParser,
};
use crate::feedback::TrustState;
use crate::models::{CatalogResult, ExtractionCandidate, Resolution, SearchStrategy, SourceDescriptor};
use crate::scoring::Scorer;
use crate::search::SearchAdapter;
use crate::triage::triage;

/// Everything decided for one descriptor, for logging and auditing.
#[derive(Debug, Clone)]
pub struct ResolutionReport {
    pub descriptor: SourceDescriptor,
    pub extraction: ExtractionCandidate,
    pub search: Option<SearchTrace>,
    pub resolution: Resolution,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchTrace {
    pub strategy: SearchStrategy,
    pub query: String,
    pub hits: usize,
}

/// Pure scoring + triage over already-fetched results.
pub fn resolve_from_results(
    descriptor: &SourceDescriptor,
    candidate: &ExtractionCandidate,
    results: &[CatalogResult],
    strategy: SearchStrategy,
    trust: TrustState,
    config: &ResolverConfig,
) -> Resolution {
    let scorer = Scorer::new(&config.scoring);
    let ranked = scorer.score(descriptor, candidate, results, strategy);
    let exact = ranked.first().is_some_and(|best| scorer.is_exact(best));
    triage(descriptor, ranked, exact, trust, &config.triage)
}

/// Standard stage order: licensed, catalog probe, rules, AI primary/secondary, fallback.
pub fn default_pipeline(
    config: &ResolverConfig,
    catalog: Arc<dyn CatalogSearch>,
    primary: Option<Box<dyn AiExtractor>>,
    secondary: Option<Box<dyn AiExtractor>>,
) -> ExtractionPipeline {
    let window = Duration::from_secs(config.ai.quota_window_hours * 3600);
    let mut stages: Vec<Box<dyn ExtractionStrategy>> = vec![
        Box::new(LicensedMetadataStrategy),
        Box::new(CatalogProbe::new(catalog, config.extraction.probe_min_similarity)),
        Box::new(RuleBasedParser::new(
            config.extraction.rule_confidence,
            &config.extraction.non_name_words,
        )),
    ];
    if let Some(extractor) = primary {
        stages.push(Box::new(AiStrategy::primary(extractor, window)));
    }
    if let Some(extractor) = secondary {
        stages.push(Box::new(AiStrategy::secondary(extractor, window)));
    }
    ExtractionPipeline::new(stages, FallbackExtractor::new(config.extraction.fallback_confidence))
}

fn chat_provider(provider: Option<&ProviderConfig>) -> Option<Box<dyn AiExtractor>> {
    let provider = provider?;
    match ChatExtractor::from_config(provider) {
        Ok(extractor) => Some(Box::new(extractor)),
        Err(err) => {
            warn!(provider = %provider.name, "AI provider disabled: {err}");
            None
        }
    }
}

pub struct Resolver {
    config: ResolverConfig,
    catalog: Arc<dyn CatalogSearch>,
    pipeline: ExtractionPipeline,
}

impl Resolver {
    pub fn new(config: ResolverConfig, catalog: Arc<dyn CatalogSearch>, pipeline: ExtractionPipeline) -> Self {
        Self {
            config,
            catalog,
            pipeline,
        }
    }

    /// Default pipeline with chat providers built from the `ai` config section.
    pub fn from_config(config: ResolverConfig, catalog: Arc<dyn CatalogSearch>) -> Self {
        let primary = chat_provider(config.ai.primary.as_ref());
        let secondary = chat_provider(config.ai.secondary.as_ref());
        let pipeline = default_pipeline(&config, Arc::clone(&catalog), primary, secondary);
        Self::new(config, catalog, pipeline)
    }

    pub fn pipeline(&self) -> &ExtractionPipeline {
        &self.pipeline
    }

    pub fn resolve(&self, descriptor: &SourceDescriptor, trust: TrustState) -> ResolutionReport {
        let extraction = self.pipeline.run(descriptor);
        let adapter = SearchAdapter::new(self.catalog.as_ref(), &self.config.search);

        let (search, resolution) = match adapter.search(&extraction) {
            Ok(outcome) => {
                let resolution = resolve_from_results(
                    descriptor,
                    &extraction,
                    &outcome.results,
                    outcome.strategy,
                    trust,
                    &self.config,
                );
                let trace = SearchTrace {
                    strategy: outcome.strategy,
                    query: outcome.query,
                    hits: outcome.results.len(),
                };
                (Some(trace), resolution)
            }
            Err(err) => {
                info!(title = %descriptor.raw_title, "{err}");
                let resolution = triage(descriptor, Vec::new(), false, trust, &self.config.triage);
                (None, resolution)
            }
        };

        info!(
            title = %descriptor.raw_title,
            song = %extraction.song_title,
            method = extraction.method.as_str(),
            outcome = resolution.label(),
            "resolved"
        );

        ResolutionReport {
            descriptor: descriptor.clone(),
            extraction,
            search,
            resolution,
        }
    }
}
