//! Scoring of catalog results against an extraction candidate.
//!
//! This module contains:
//! - The title penalty curve
//! - Composite score (title, artist, containment, trusted source)
//! - Overall confidence (extraction, composite, search strategy, channel)
//! - `Scorer`, which ranks a result set

use rustc_hash::FxHashSet;

use crate::config::ScoringConfig;
use crate::models::{CatalogResult, ExtractionCandidate, MatchCandidate, SearchStrategy, SourceDescriptor};
use crate::normalize::{clean_channel, comparable, split_credits};
use crate::similarity::{contains_either, partial_ratio, simple_ratio, token_set_ratio};

// ============================================================================
// Weights
// ============================================================================

/// Artist score when the candidate names no artist
pub const UNKNOWN_ARTIST_SCORE: f64 = 0.5;

const TITLE_WEIGHT: f64 = 0.6;
const ARTIST_WEIGHT: f64 = 0.3;
const CONTAINS_WEIGHT: f64 = 0.05;

const EXTRACTION_WEIGHT: f64 = 0.4;
const COMPOSITE_WEIGHT: f64 = 0.4;
const LIFTED_WEIGHT: f64 = 0.2;
const LIFT: f64 = 0.2;

// ============================================================================
// Formulas
// ============================================================================

/// Title ratio after the stacked low-similarity penalties.
/// 0.275 → 0.275 × 0.5 × 0.2 = 0.0275
pub fn penalized_title_score(ratio: f64) -> f64 {
    let mut t = ratio.clamp(0.0, 1.0);
    if ratio < 0.60 {
        t *= 0.5;
    }
    if ratio < 0.40 {
        t *= 0.2;
    }
    if ratio < 0.20 {
        t *= 0.05;
    }
    t
}

pub fn composite_score(
    title_score: f64,
    artist_score: f64,
    title_contains: bool,
    artist_contains: bool,
    trusted_source_bonus: f64,
) -> f64 {
    let mut score = TITLE_WEIGHT * title_score + ARTIST_WEIGHT * artist_score + trusted_source_bonus;
    if title_contains {
        score += CONTAINS_WEIGHT;
    }
    if artist_contains {
        score += CONTAINS_WEIGHT;
    }
    score.clamp(0.0, 1.0)
}

pub fn overall_confidence(extraction: f64, composite: f64, multiplier: f64, channel_bonus: f64) -> f64 {
    let extraction = extraction.clamp(0.0, 1.0);
    let composite = composite.clamp(0.0, 1.0);
    let lifted = (composite + LIFT).min(1.0);
    let blended = EXTRACTION_WEIGHT * extraction + COMPOSITE_WEIGHT * composite + LIFTED_WEIGHT * lifted;
    (blended * multiplier + channel_bonus).clamp(0.0, 1.0)
}

// ============================================================================
// Scorer
// ============================================================================

pub struct Scorer<'a> {
    config: &'a ScoringConfig,
    trusted_distributors: FxHashSet<String>,
    trusted_channels: FxHashSet<String>,
}

impl<'a> Scorer<'a> {
    pub fn new(config: &'a ScoringConfig) -> Self {
        let comparable_set = |names: &[String]| -> FxHashSet<String> {
            names
                .iter()
                .map(|n| comparable(n))
                .filter(|n| !n.is_empty())
                .collect()
        };
        Self {
            config,
            trusted_distributors: comparable_set(&config.trusted_distributors),
            trusted_channels: comparable_set(&config.trusted_channels),
        }
    }

    pub fn multiplier(&self, strategy: SearchStrategy) -> f64 {
        match strategy {
            SearchStrategy::ArtistQualified => self.config.artist_multiplier,
            SearchStrategy::AlbumQualified => self.config.album_multiplier,
            SearchStrategy::TitleOnly => self.config.title_only_multiplier,
        }
    }

    fn is_trusted(set: &FxHashSet<String>, value: &str) -> bool {
        let value = comparable(value);
        !value.is_empty() && set.iter().any(|trusted| value.contains(trusted.as_str()))
    }

    pub fn trusted_source_bonus(&self, result: &CatalogResult) -> f64 {
        let trusted = [result.label.as_deref(), result.album.as_deref()]
            .into_iter()
            .flatten()
            .any(|v| Self::is_trusted(&self.trusted_distributors, v));
        if trusted {
            self.config.trusted_source_bonus
        } else {
            0.0
        }
    }

    pub fn trusted_channel_bonus(&self, descriptor: &SourceDescriptor) -> f64 {
        let trusted = descriptor.channel_hint.as_deref().is_some_and(|channel| {
            Self::is_trusted(&self.trusted_channels, channel)
                || Self::is_trusted(&self.trusted_channels, &clean_channel(channel))
        });
        if trusted {
            self.config.trusted_channel_bonus
        } else {
            0.0
        }
    }

    /// Best ratio over the result's credited artists (and the full credit).
    fn artist_similarity(candidate_artist: &str, result_artist: &str) -> f64 {
        split_credits(result_artist)
            .iter()
            .map(|credit| simple_ratio(candidate_artist, credit))
            .chain(std::iter::once(simple_ratio(candidate_artist, result_artist)))
            .fold(0.0, f64::max)
    }

    pub fn score_one(
        &self,
        candidate: &ExtractionCandidate,
        result: &CatalogResult,
        strategy: SearchStrategy,
        channel_bonus: f64,
    ) -> MatchCandidate {
        let title_similarity = simple_ratio(&candidate.song_title, &result.title);
        let title_contains = contains_either(&candidate.song_title, &result.title);

        let (artist_similarity, artist_score, artist_contains) = match candidate.artist.as_deref() {
            Some(artist) => {
                let sim = Self::artist_similarity(artist, &result.artist);
                (sim, sim, contains_either(artist, &result.artist))
            }
            None => (0.0, UNKNOWN_ARTIST_SCORE, false),
        };

        let trusted_source_bonus = self.trusted_source_bonus(result);
        let composite = composite_score(
            penalized_title_score(title_similarity),
            artist_score,
            title_contains,
            artist_contains,
            trusted_source_bonus,
        );
        let overall = overall_confidence(candidate.confidence, composite, self.multiplier(strategy), channel_bonus);

        MatchCandidate {
            result: result.clone(),
            strategy,
            title_similarity,
            artist_similarity,
            title_token_set: token_set_ratio(&candidate.song_title, &result.title),
            title_partial: partial_ratio(&candidate.song_title, &result.title),
            title_contains,
            artist_contains,
            trusted_source_bonus,
            composite_score: composite,
            overall_confidence: overall,
        }
    }

    /// Score every result, best first. Ties keep catalog order.
    pub fn score(
        &self,
        descriptor: &SourceDescriptor,
        candidate: &ExtractionCandidate,
        results: &[CatalogResult],
        strategy: SearchStrategy,
    ) -> Vec<MatchCandidate> {
        let channel_bonus = self.trusted_channel_bonus(descriptor);
        let mut scored: Vec<MatchCandidate> = results
            .iter()
            .map(|r| self.score_one(candidate, r, strategy, channel_bonus))
            .collect();
        scored.sort_by(|a, b| b.overall_confidence.total_cmp(&a.overall_confidence));
        scored
    }

    pub fn is_exact(&self, candidate: &MatchCandidate) -> bool {
        candidate.title_similarity >= self.config.exact_ratio
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExtractionMethod;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-3
    }

    fn result(id: &str, title: &str, artist: &str) -> CatalogResult {
        CatalogResult {
            target_track_id: id.into(),
            title: title.into(),
            artist: artist.into(),
            album: None,
            label: None,
        }
    }

    #[test]
    fn test_penalty_curve() {
        assert_eq!(penalized_title_score(1.0), 1.0);
        assert_eq!(penalized_title_score(0.6), 0.6);
        assert!(approx(penalized_title_score(0.5), 0.25));
        assert!(approx(penalized_title_score(0.275), 0.0275));
        assert!(approx(penalized_title_score(0.1), 0.0005));
    }

    #[test]
    fn test_composite_is_capped() {
        assert_eq!(composite_score(1.0, 1.0, true, true, 0.1), 1.0);
        assert!(approx(composite_score(0.0275, 0.5, true, false, 0.0), 0.2165));
    }

    #[test]
    fn test_overall_bounds() {
        for extraction in [0.0, 0.3, 0.5, 1.0, 7.0] {
            for composite in [-1.0, 0.0, 0.2165, 1.0, 3.0] {
                for multiplier in [0.9, 1.0, 1.1] {
                    let o = overall_confidence(extraction, composite, multiplier, 0.05);
                    assert!((0.0..=1.0).contains(&o), "{o}");
                }
            }
        }
        assert!(approx(overall_confidence(0.5, 1.0, 1.1, 0.0), 0.88));
    }

    #[test]
    fn test_exact_match_scores_high() {
        let config = ScoringConfig::default();
        let scorer = Scorer::new(&config);
        let candidate = ExtractionCandidate::new("Shape of You", ExtractionMethod::RuleBased, 0.5)
            .with_artist(Some("Ed Sheeran".into()));
        let scored = scorer.score(
            &SourceDescriptor::new("Ed Sheeran - Shape of You", None),
            &candidate,
            &[result("sp:1", "Shape of You", "Ed Sheeran")],
            SearchStrategy::ArtistQualified,
        );
        assert_eq!(scored[0].title_similarity, 1.0);
        assert_eq!(scored[0].composite_score, 1.0);
        assert!(approx(scored[0].overall_confidence, 0.88));
        assert!(scorer.is_exact(&scored[0]));
    }

    #[test]
    fn test_unknown_artist_and_suffixed_title() {
        let config = ScoringConfig::default();
        let scorer = Scorer::new(&config);
        let candidate = ExtractionCandidate::new("Bhaga Bhaga", ExtractionMethod::RuleBased, 0.5);
        let scored = scorer.score(
            &SourceDescriptor::new("Bhaga Bhaga", None),
            &candidate,
            &[result("sp:3", "Bhaga Bhaga (From Saripodhaa Sanivaaram)", "Jakes Bejoy")],
            SearchStrategy::TitleOnly,
        );
        let best = &scored[0];
        assert!(approx(best.title_similarity, 0.275));
        assert!(best.title_contains);
        assert_eq!(best.title_partial, 1.0);
        assert!(approx(best.composite_score, 0.2165));
        assert!(best.overall_confidence >= 0.30 && best.overall_confidence < 0.80);
    }

    #[test]
    fn test_artist_best_credit() {
        let config = ScoringConfig::default();
        let scorer = Scorer::new(&config);
        let candidate = ExtractionCandidate::new("Baarish Ki Jaaye", ExtractionMethod::RuleBased, 0.5)
            .with_artist(Some("B Praak".into()));
        let scored = scorer.score_one(
            &candidate,
            &result("sp:5", "Baarish Ki Jaaye", "Jaani, B Praak"),
            SearchStrategy::ArtistQualified,
            0.0,
        );
        assert_eq!(scored.artist_similarity, 1.0);
        assert!(scored.artist_contains);
    }

    #[test]
    fn test_trusted_bonuses() {
        let config = ScoringConfig::default();
        let scorer = Scorer::new(&config);
        let mut labelled = result("sp:6", "Kesariya", "Arijit Singh");
        labelled.label = Some("Sony Music Entertainment India Pvt. Ltd.".into());
        assert_eq!(scorer.trusted_source_bonus(&labelled), 0.1);
        assert_eq!(scorer.trusted_source_bonus(&result("sp:7", "Kesariya", "Arijit Singh")), 0.0);

        assert_eq!(scorer.trusted_channel_bonus(&SourceDescriptor::new("x", Some("T-Series"))), 0.05);
        assert_eq!(scorer.trusted_channel_bonus(&SourceDescriptor::new("x", Some("Random Uploads"))), 0.0);
        assert_eq!(scorer.trusted_channel_bonus(&SourceDescriptor::new("x", None)), 0.0);
    }

    #[test]
    fn test_ranking_is_stable_for_ties() {
        let config = ScoringConfig::default();
        let scorer = Scorer::new(&config);
        let candidate = ExtractionCandidate::new("Halo", ExtractionMethod::Fallback, 0.3);
        let scored = scorer.score(
            &SourceDescriptor::new("Halo", None),
            &candidate,
            &[
                result("a", "Something Else", "X"),
                result("b", "Halo", "Beyonce"),
                result("c", "Halo", "Beyonce"),
            ],
            SearchStrategy::TitleOnly,
        );
        let ids: Vec<_> = scored.iter().map(|m| m.track_id()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }
}
