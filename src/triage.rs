//! Confidence triage: auto-commit, review, or unresolved.

use crate::config::TriageConfig;
use crate::feedback::TrustState;
use crate::models::{CommitTier, MatchCandidate, Resolution, SourceDescriptor, UnresolvedReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    AutoCommit(CommitTier),
    Review,
    Unresolved,
}

/// Classify the best candidate's confidence.
pub fn classify(confidence: f64, exact: bool, trust: TrustState, config: &TriageConfig) -> Verdict {
    if confidence >= config.high {
        return Verdict::AutoCommit(CommitTier::High);
    }
    if config.auto_commit_medium && confidence >= config.medium {
        return Verdict::AutoCommit(CommitTier::Medium);
    }
    if trust.trust_exact_matches && exact && confidence >= config.trusted_exact {
        return Verdict::AutoCommit(CommitTier::TrustedExact);
    }
    if confidence >= config.low {
        return Verdict::Review;
    }
    Verdict::Unresolved
}

/// Turn a ranked candidate list (best first) into a resolution.
pub fn triage(
    descriptor: &SourceDescriptor,
    mut ranked: Vec<MatchCandidate>,
    exact: bool,
    trust: TrustState,
    config: &TriageConfig,
) -> Resolution {
    let Some(best) = ranked.first() else {
        return Resolution::Unresolved {
            descriptor: descriptor.clone(),
            reason: UnresolvedReason::NoResults,
            candidates: Vec::new(),
        };
    };

    match classify(best.overall_confidence, exact, trust, config) {
        Verdict::AutoCommit(tier) => Resolution::AutoCommit {
            best: ranked.swap_remove(0),
            tier,
        },
        Verdict::Review => {
            ranked.truncate(config.review_limit);
            Resolution::PendingReview {
                candidates: ranked,
                descriptor: descriptor.clone(),
            }
        }
        Verdict::Unresolved => {
            ranked.truncate(1);
            Resolution::Unresolved {
                descriptor: descriptor.clone(),
                reason: UnresolvedReason::LowConfidence,
                candidates: ranked,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CatalogResult, SearchStrategy};

    fn trusted() -> TrustState {
        TrustState {
            exact_streak: 5,
            trust_exact_matches: true,
        }
    }

    fn candidate(id: &str, overall: f64) -> MatchCandidate {
        MatchCandidate {
            result: CatalogResult {
                target_track_id: id.into(),
                title: id.into(),
                artist: "A".into(),
                album: None,
                label: None,
            },
            strategy: SearchStrategy::TitleOnly,
            title_similarity: 1.0,
            artist_similarity: 1.0,
            title_token_set: 1.0,
            title_partial: 1.0,
            title_contains: true,
            artist_contains: true,
            trusted_source_bonus: 0.0,
            composite_score: overall,
            overall_confidence: overall,
        }
    }

    #[test]
    fn test_thresholds() {
        let config = TriageConfig::default();
        let none = TrustState::default();
        assert_eq!(classify(0.95, false, none, &config), Verdict::AutoCommit(CommitTier::High));
        assert_eq!(classify(0.90, false, none, &config), Verdict::AutoCommit(CommitTier::High));
        assert_eq!(classify(0.85, false, none, &config), Verdict::AutoCommit(CommitTier::Medium));
        assert_eq!(classify(0.79, false, none, &config), Verdict::Review);
        assert_eq!(classify(0.30, false, none, &config), Verdict::Review);
        assert_eq!(classify(0.29, false, none, &config), Verdict::Unresolved);
    }

    #[test]
    fn test_medium_tier_can_be_disabled() {
        let config = TriageConfig {
            auto_commit_medium: false,
            ..TriageConfig::default()
        };
        assert_eq!(classify(0.85, false, TrustState::default(), &config), Verdict::Review);
    }

    #[test]
    fn test_trusted_exact_lowers_the_bar() {
        let config = TriageConfig::default();
        assert_eq!(
            classify(0.65, true, trusted(), &config),
            Verdict::AutoCommit(CommitTier::TrustedExact)
        );
        assert_eq!(classify(0.65, false, trusted(), &config), Verdict::Review);
        assert_eq!(classify(0.65, true, TrustState::default(), &config), Verdict::Review);
        assert_eq!(classify(0.55, true, trusted(), &config), Verdict::Review);
    }

    #[test]
    fn test_review_keeps_top_three() {
        let descriptor = SourceDescriptor::new("x", None);
        let ranked = vec![
            candidate("a", 0.7),
            candidate("b", 0.6),
            candidate("c", 0.5),
            candidate("d", 0.4),
        ];
        match triage(&descriptor, ranked, false, TrustState::default(), &TriageConfig::default()) {
            Resolution::PendingReview { candidates, .. } => {
                let ids: Vec<_> = candidates.iter().map(|c| c.track_id()).collect();
                assert_eq!(ids, vec!["a", "b", "c"]);
            }
            other => panic!("expected review, got {}", other.label()),
        }
    }

    #[test]
    fn test_unresolved_variants() {
        let descriptor = SourceDescriptor::new("x", None);
        let config = TriageConfig::default();
        match triage(&descriptor, Vec::new(), false, TrustState::default(), &config) {
            Resolution::Unresolved { reason, candidates, .. } => {
                assert_eq!(reason, UnresolvedReason::NoResults);
                assert!(candidates.is_empty());
            }
            other => panic!("expected unresolved, got {}", other.label()),
        }
        let ranked = vec![candidate("a", 0.2), candidate("b", 0.1)];
        match triage(&descriptor, ranked, false, TrustState::default(), &config) {
            Resolution::Unresolved { reason, candidates, .. } => {
                assert_eq!(reason, UnresolvedReason::LowConfidence);
                assert_eq!(candidates.len(), 1);
            }
            other => panic!("expected unresolved, got {}", other.label()),
        }
    }

    #[test]
    fn test_auto_commit_takes_best() {
        let descriptor = SourceDescriptor::new("x", None);
        let ranked = vec![candidate("a", 0.95), candidate("b", 0.5)];
        match triage(&descriptor, ranked, false, TrustState::default(), &TriageConfig::default()) {
            Resolution::AutoCommit { best, tier } => {
                assert_eq!(best.track_id(), "a");
                assert_eq!(tier, CommitTier::High);
            }
            other => panic!("expected auto-commit, got {}", other.label()),
        }
    }
}
