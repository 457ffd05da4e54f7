//! Resolver configuration, loaded from TOML.
//!
//! Every section defaults sensibly so a missing file or a partial file both
//! work. Thresholds that earlier revisions of the matcher disagreed on live
//! here rather than in code.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("config validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub triage: TriageConfig,
    pub scoring: ScoringConfig,
    pub search: SearchConfig,
    pub extraction: ExtractionConfig,
    pub ai: AiConfig,
    pub feedback: FeedbackConfig,
}

impl ResolverConfig {
    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        let config: ResolverConfig = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.triage;
        for (name, value) in [
            ("triage.high", t.high),
            ("triage.medium", t.medium),
            ("triage.low", t.low),
            ("triage.trusted_exact", t.trusted_exact),
            ("extraction.probe_min_similarity", self.extraction.probe_min_similarity),
            ("scoring.exact_ratio", self.scoring.exact_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Validation(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if !(t.low <= t.medium && t.medium <= t.high) {
            return Err(ConfigError::Validation(format!(
                "thresholds must satisfy low <= medium <= high, got {} / {} / {}",
                t.low, t.medium, t.high
            )));
        }
        if t.review_limit == 0 {
            return Err(ConfigError::Validation("triage.review_limit must be > 0".into()));
        }
        if self.search.top_n == 0 {
            return Err(ConfigError::Validation("search.top_n must be > 0".into()));
        }
        Ok(())
    }
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// HIGH_T: auto-commit, high tier
    pub high: f64,
    /// MED_T: auto-commit, medium tier (when `auto_commit_medium`)
    pub medium: f64,
    /// LOW_T: below this the song is unresolved
    pub low: f64,
    /// Auto-commit threshold for exact titles once the user trusts them
    pub trusted_exact: f64,
    pub auto_commit_medium: bool,
    /// Candidates kept on a review entry
    pub review_limit: usize,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            high: 0.90,
            medium: 0.80,
            low: 0.30,
            trusted_exact: 0.60,
            auto_commit_medium: true,
            review_limit: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Labels/albums whose catalog entries earn `trusted_source_bonus`
    pub trusted_distributors: Vec<String>,
    /// Source channels whose uploads earn `trusted_channel_bonus`
    pub trusted_channels: Vec<String>,
    pub trusted_source_bonus: f64,
    pub trusted_channel_bonus: f64,
    pub artist_multiplier: f64,
    pub album_multiplier: f64,
    pub title_only_multiplier: f64,
    /// Title ratio at or above which a match counts as exact
    pub exact_ratio: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let labels = [
            "T-Series",
            "Sony Music",
            "Universal Music",
            "Warner Music",
            "Zee Music Company",
            "Saregama",
            "Aditya Music",
            "Lahari Music",
            "Tips Music",
            "Sun Music",
            "Think Music",
            "Mango Music",
        ];
        Self {
            trusted_distributors: labels.iter().map(|s| s.to_string()).collect(),
            trusted_channels: labels.iter().map(|s| s.to_string()).collect(),
            trusted_source_bonus: 0.1,
            trusted_channel_bonus: 0.05,
            artist_multiplier: 1.1,
            album_multiplier: 1.0,
            title_only_multiplier: 0.9,
            exact_ratio: 0.99,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Results kept for scoring
    pub top_n: usize,
    /// Words appended to title-only queries, in order
    pub title_hints: Vec<String>,
    /// Genre/locale words for catalogs with language-ambiguous titles
    pub locale_hints: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_n: 5,
            title_hints: vec!["song".into(), "music".into(), "audio".into()],
            locale_hints: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub probe_min_similarity: f64,
    pub rule_confidence: f64,
    pub fallback_confidence: f64,
    /// Words that never name an artist in a "Song | X" segment
    pub non_name_words: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        let words = [
            "official", "video", "audio", "lyrics", "lyrical", "song", "songs", "full", "hd",
            "4k", "new", "latest", "movie", "film", "album", "remix", "cover", "live", "trailer",
            "telugu", "tamil", "hindi", "punjabi", "kannada", "malayalam", "english",
        ];
        Self {
            probe_min_similarity: 0.7,
            rule_confidence: 0.5,
            fallback_confidence: 0.3,
            non_name_words: words.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// One OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub primary: Option<ProviderConfig>,
    pub secondary: Option<ProviderConfig>,
    pub quota_window_hours: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            primary: None,
            secondary: None,
            quota_window_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// Consecutive exact confirmations before exact matches are trusted
    pub exact_streak_threshold: u32,
    /// A skip clears both the streak and the trust flag
    pub reset_on_skip: bool,
    /// A non-exact confirmation clears the streak (the flag stays)
    pub reset_on_inexact_confirmation: bool,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            exact_streak_threshold: 5,
            reset_on_skip: true,
            reset_on_inexact_confirmation: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(ResolverConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ResolverConfig = toml::from_str(
            r#"
            [triage]
            high = 0.85
            "#,
        )
        .unwrap();
        assert_eq!(config.triage.high, 0.85);
        assert_eq!(config.triage.medium, 0.80);
        assert_eq!(config.search.top_n, 5);
        assert_eq!(config.feedback.exact_streak_threshold, 5);
    }

    #[test]
    fn test_unordered_thresholds_rejected() {
        let mut config = ResolverConfig::default();
        config.triage.low = 0.95;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("low <= medium <= high"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ResolverConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.triage.low, 0.30);
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resolver.toml");
        let mut config = ResolverConfig::default();
        config.ai.primary = Some(ProviderConfig {
            name: "gemini".into(),
            base_url: "https://example.invalid/v1".into(),
            model: "gemini-1.5-flash".into(),
            api_key_env: "GEMINI_API_KEY".into(),
        });
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();
        let loaded = ResolverConfig::load(&path).unwrap();
        assert_eq!(loaded.ai.primary.unwrap().model, "gemini-1.5-flash");
    }
}
