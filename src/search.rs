//! Catalog search adapter: candidate → query groups → raw results.
//!
//! Groups run in priority order (artist-qualified, album-qualified,
//! title-only) and the first group with any result wins. Inside a group the
//! first query variant with results wins.

use tracing::{debug, warn};

use crate::catalog::CatalogSearch;
use crate::config::SearchConfig;
use crate::error::ResolveError;
use crate::models::{CatalogResult, ExtractionCandidate, SearchStrategy};

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub strategy: SearchStrategy,
    pub query: String,
    pub results: Vec<CatalogResult>,
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', ""))
}

/// Query variants for one candidate, grouped by strategy, in order.
pub fn query_groups(candidate: &ExtractionCandidate, config: &SearchConfig) -> Vec<(SearchStrategy, Vec<String>)> {
    let t = candidate.song_title.trim();
    let mut groups = Vec::new();

    if let Some(a) = candidate.artist.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
        groups.push((
            SearchStrategy::ArtistQualified,
            vec![
                format!("track:{} artist:{}", quote(t), quote(a)),
                format!("track:{t} artist:{a}"),
                format!("{} {}", quote(t), quote(a)),
                format!("{t} {a}"),
            ],
        ));
    }

    if let Some(al) = candidate.album.as_deref().map(str::trim).filter(|al| !al.is_empty()) {
        groups.push((
            SearchStrategy::AlbumQualified,
            vec![
                format!("track:{} album:{}", quote(t), quote(al)),
                format!("track:{t} album:{al}"),
                format!("{} {}", quote(t), quote(al)),
                format!("{t} {al}"),
                format!("{} {}", quote(al), quote(t)),
                format!("{al} {t}"),
            ],
        ));
    }

    let mut title_only = vec![
        format!("track:{}", quote(t)),
        format!("track:{t}"),
        quote(t),
        t.to_string(),
    ];
    for hint in config.title_hints.iter().chain(&config.locale_hints) {
        title_only.push(format!("{t} {hint}"));
    }
    groups.push((SearchStrategy::TitleOnly, title_only));

    groups
}

pub struct SearchAdapter<'a> {
    catalog: &'a dyn CatalogSearch,
    config: &'a SearchConfig,
}

impl<'a> SearchAdapter<'a> {
    pub fn new(catalog: &'a dyn CatalogSearch, config: &'a SearchConfig) -> Self {
        Self { catalog, config }
    }

    pub fn search(&self, candidate: &ExtractionCandidate) -> Result<SearchOutcome, ResolveError> {
        for (strategy, queries) in query_groups(candidate, self.config) {
            for query in queries {
                let results = match self.catalog.search(&query, self.config.top_n) {
                    Ok(results) => results,
                    Err(err) => {
                        warn!(query = %query, "catalog search failed: {err}");
                        continue;
                    }
                };
                debug!(strategy = strategy.as_str(), query = %query, hits = results.len(), "query");
                if !results.is_empty() {
                    let mut results = results;
                    results.truncate(self.config.top_n);
                    return Ok(SearchOutcome {
                        strategy,
                        query,
                        results,
                    });
                }
            }
        }
        Err(ResolveError::CatalogSearchEmpty(candidate.song_title.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use crate::models::ExtractionMethod;
    use std::sync::Mutex;

    /// Answers only the queries it was told about and records every call.
    struct Recording {
        answers: Vec<(&'static str, CatalogResult)>,
        fail_on: Option<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    impl Recording {
        fn new(answers: Vec<(&'static str, CatalogResult)>) -> Self {
            Self {
                answers,
                fail_on: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CatalogSearch for Recording {
        fn search(&self, query: &str, limit: usize) -> Result<Vec<CatalogResult>, CatalogError> {
            self.calls.lock().unwrap().push(query.to_string());
            if self.fail_on == Some(query) {
                return Err(CatalogError::Query("boom".into()));
            }
            Ok(self
                .answers
                .iter()
                .filter(|(q, _)| *q == query)
                .map(|(_, r)| r.clone())
                .take(limit)
                .collect())
        }
    }

    fn result(id: &str, title: &str) -> CatalogResult {
        CatalogResult {
            target_track_id: id.into(),
            title: title.into(),
            artist: "Someone".into(),
            album: None,
            label: None,
        }
    }

    fn candidate(song: &str, artist: Option<&str>, album: Option<&str>) -> ExtractionCandidate {
        ExtractionCandidate::new(song, ExtractionMethod::RuleBased, 0.5)
            .with_artist(artist.map(str::to_string))
            .with_album(album.map(str::to_string))
    }

    #[test]
    fn test_query_groups_order() {
        let groups = query_groups(
            &candidate("Shape of You", Some("Ed Sheeran"), Some("Divide")),
            &SearchConfig::default(),
        );
        let strategies: Vec<_> = groups.iter().map(|(s, _)| *s).collect();
        assert_eq!(
            strategies,
            vec![
                SearchStrategy::ArtistQualified,
                SearchStrategy::AlbumQualified,
                SearchStrategy::TitleOnly
            ]
        );
        assert_eq!(groups[0].1[0], r#"track:"Shape of You" artist:"Ed Sheeran""#);
        assert_eq!(groups[1].1.len(), 6);
        assert_eq!(groups[2].1.last().unwrap(), "Shape of You audio");
    }

    #[test]
    fn test_title_only_when_no_artist() {
        let groups = query_groups(&candidate("Bhaga Bhaga", None, None), &SearchConfig::default());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].0, SearchStrategy::TitleOnly);
        assert_eq!(groups[0].1.len(), 7);
    }

    #[test]
    fn test_first_group_with_results_wins() {
        let catalog = Recording::new(vec![
            ("Bhaga Bhaga", result("sp:1", "Bhaga Bhaga (From Saripodhaa Sanivaaram)")),
            ("Bhaga Bhaga song", result("sp:2", "Other")),
        ]);
        let config = SearchConfig::default();
        let adapter = SearchAdapter::new(&catalog, &config);
        let outcome = adapter.search(&candidate("Bhaga Bhaga", Some("Nobody"), None)).unwrap();

        assert_eq!(outcome.strategy, SearchStrategy::TitleOnly);
        assert_eq!(outcome.query, "Bhaga Bhaga");
        assert_eq!(outcome.results[0].target_track_id, "sp:1");
        // 4 artist variants, then 4 title-only variants up to the hit
        assert_eq!(catalog.calls().len(), 8);
    }

    #[test]
    fn test_catalog_errors_are_skipped() {
        let mut catalog = Recording::new(vec![(r#"track:"Halo""#, result("sp:9", "Halo"))]);
        catalog.fail_on = Some(r#"track:"Halo" artist:"Beyonce""#);
        let config = SearchConfig::default();
        let adapter = SearchAdapter::new(&catalog, &config);
        let outcome = adapter.search(&candidate("Halo", Some("Beyonce"), None)).unwrap();
        assert_eq!(outcome.results[0].target_track_id, "sp:9");
    }

    #[test]
    fn test_all_groups_empty() {
        let catalog = Recording::new(Vec::new());
        let config = SearchConfig::default();
        let adapter = SearchAdapter::new(&catalog, &config);
        let err = adapter.search(&candidate("Nothing", Some("Nobody"), Some("Nowhere"))).unwrap_err();
        assert!(matches!(err, ResolveError::CatalogSearchEmpty(_)));
        assert_eq!(catalog.calls().len(), 4 + 6 + 7);
    }
}
