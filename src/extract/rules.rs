//! Stage 3: delimiter-based title parsing.
//!
//! Delimiters are tried in priority order: dash, pipe, then "by".
//! - "Artist - Song" (flipped when the channel hint names the right side;
//!   junk-only segments such as "UNPLUGGED Full Audio Song" are dropped first)
//! - "Song | Movie | Artist" (first short, name-like later segment is the artist)
//! - "Song by Artist"

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashSet;

use crate::error::ResolveError;
use crate::models::{ExtractionCandidate, ExtractionMethod, SourceDescriptor};
use crate::normalize::{
    clean_artist, clean_channel, comparable, is_fenced_only_word, is_junk_segment, strip_junk,
    DASH_SEPARATOR,
};
use crate::similarity::{contains_either, simple_ratio};

use super::ExtractionStrategy;

static PIPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\|\|?\s*").unwrap());
static BY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s+by\s+").unwrap());

/// Channel-to-segment similarity needed to read "Song - Artist".
const CHANNEL_MATCH_RATIO: f64 = 0.8;
/// Longest pipe segment still considered a name.
const MAX_NAME_WORDS: usize = 3;
/// "Stand By Me", "Stand by Your Man": a pronoun after "by" is lyric, not credit.
const PRONOUNS: &[&str] = &[
    "me", "you", "us", "him", "her", "them", "it", "my", "your", "our", "his", "their", "myself",
    "yourself",
];

pub struct RuleBasedParser {
    confidence: f64,
    non_name_words: FxHashSet<String>,
}

impl RuleBasedParser {
    pub fn new(confidence: f64, non_name_words: &[String]) -> Self {
        Self {
            confidence,
            non_name_words: non_name_words.iter().map(|w| comparable(w)).collect(),
        }
    }

    /// Returns (song, artist) when a delimiter applies.
    pub fn parse(&self, raw_title: &str, channel_hint: Option<&str>) -> Option<(String, Option<String>)> {
        let cleaned = strip_junk(raw_title);
        if cleaned.is_empty() {
            return None;
        }

        let dashed: Vec<&str> = DASH_SEPARATOR
            .split(&cleaned)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if dashed.len() > 1 {
            return self.parse_dashed(&dashed, channel_hint);
        }

        let segments: Vec<&str> = PIPE
            .split(&cleaned)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if segments.len() > 1 {
            let artist = segments[1..].iter().copied().find(|s| self.looks_like_name(s));
            return finish(segments[0], artist);
        }

        let (song, artist) = self.split_by(&cleaned, channel_hint)?;
        finish(song, Some(artist))
    }

    fn parse_dashed(&self, segments: &[&str], channel_hint: Option<&str>) -> Option<(String, Option<String>)> {
        let kept = drop_junk_segments(segments);
        let (first, rest) = kept.split_first()?;

        // "Song by Artist - Other" reads left to right
        if let Some((song, credit)) = self.split_by(first, channel_hint) {
            let artist = std::iter::once(credit)
                .chain(rest.iter().copied())
                .collect::<Vec<_>>()
                .join(" - ");
            return finish(song, Some(artist.as_str()));
        }
        if rest.is_empty() {
            return finish(first, None);
        }

        let joined = rest.join(" - ");
        let right = first_pipe_segment(&joined);
        let (song, artist) = if channel_names(channel_hint, right) {
            (*first, right)
        } else {
            (right, *first)
        };
        let song = self.split_by(song, channel_hint).map_or(song, |(title, _)| title);
        finish(song, Some(artist))
    }

    /// Split at the last " by " when what follows reads as a credit.
    fn split_by<'a>(&self, text: &'a str, channel_hint: Option<&str>) -> Option<(&'a str, &'a str)> {
        let found = BY.find_iter(text).last()?;
        let (song, credit) = (text[..found.start()].trim(), text[found.end()..].trim());
        if song.is_empty() || credit.is_empty() {
            return None;
        }
        let named = channel_names(channel_hint, credit)
            || (self.looks_like_name(credit) && !starts_with_pronoun(credit));
        named.then_some((song, credit))
    }

    fn looks_like_name(&self, segment: &str) -> bool {
        let words: Vec<String> = segment.split_whitespace().map(comparable).collect();
        !words.is_empty()
            && words.len() <= MAX_NAME_WORDS
            && !words.iter().any(|w| self.non_name_words.contains(w))
    }
}

impl ExtractionStrategy for RuleBasedParser {
    fn name(&self) -> &'static str {
        ExtractionMethod::RuleBased.as_str()
    }

    fn extract(
        &self,
        descriptor: &SourceDescriptor,
    ) -> Result<Option<ExtractionCandidate>, ResolveError> {
        Ok(self
            .parse(&descriptor.raw_title, descriptor.channel_hint.as_deref())
            .map(|(song, artist)| {
                ExtractionCandidate::new(&song, ExtractionMethod::RuleBased, self.confidence)
                    .with_artist(artist)
            }))
    }
}

/// Drop dash segments that are pure junk. A lone fenced-only word survives
/// unless two real segments remain without it ("India.Arie - Video").
fn drop_junk_segments<'a>(segments: &[&'a str]) -> Vec<&'a str> {
    let strong: Vec<&str> = segments.iter().copied().filter(|s| !is_junk_segment(s)).collect();
    if strong.len() >= 2 {
        return strong;
    }
    segments
        .iter()
        .copied()
        .filter(|s| !is_junk_segment(s) || is_fenced_only_word(s))
        .collect()
}

fn starts_with_pronoun(credit: &str) -> bool {
    credit
        .split_whitespace()
        .next()
        .is_some_and(|word| PRONOUNS.contains(&comparable(word).as_str()))
}

fn first_pipe_segment(s: &str) -> &str {
    PIPE.split(s).map(str::trim).find(|seg| !seg.is_empty()).unwrap_or(s)
}

fn channel_names(channel_hint: Option<&str>, segment: &str) -> bool {
    let Some(channel) = channel_hint.map(clean_channel).filter(|c| !c.is_empty()) else {
        return false;
    };
    simple_ratio(&channel, segment) >= CHANNEL_MATCH_RATIO || contains_either(&channel, segment)
}

fn finish(song: &str, artist: Option<&str>) -> Option<(String, Option<String>)> {
    let song = trim_quotes(song);
    if song.is_empty() {
        return None;
    }
    let artist = artist
        .map(|a| clean_artist(trim_quotes(a)))
        .filter(|a| !a.is_empty());
    Some((song.to_string(), artist))
}

fn trim_quotes(s: &str) -> &str {
    s.trim().trim_matches(|c| matches!(c, '"' | '\'' | '“' | '”' | '‘' | '’')).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionConfig;

    fn parser() -> RuleBasedParser {
        let config = ExtractionConfig::default();
        RuleBasedParser::new(config.rule_confidence, &config.non_name_words)
    }

    #[test]
    fn test_artist_dash_song() {
        let parsed = parser().parse("Ed Sheeran - Shape of You (Official Music Video)", None);
        assert_eq!(
            parsed,
            Some(("Shape of You".to_string(), Some("Ed Sheeran".to_string())))
        );
    }

    #[test]
    fn test_dash_flipped_by_channel() {
        let parsed = parser().parse("Shape of You - Ed Sheeran", Some("Ed Sheeran"));
        assert_eq!(
            parsed,
            Some(("Shape of You".to_string(), Some("Ed Sheeran".to_string())))
        );
    }

    #[test]
    fn test_dash_strips_featured_and_pipe_tail() {
        let parsed = parser().parse("The PropheC ft. Jasmine Sandlas - To The Stars | Official Video", None);
        assert_eq!(
            parsed,
            Some(("To The Stars".to_string(), Some("The PropheC".to_string())))
        );
    }

    #[test]
    fn test_pipe_picks_name_segment() {
        let parsed = parser().parse(
            "Jeena Jeena | Badlapur Movie Songs | Atif Aslam | Full Video Song",
            None,
        );
        assert_eq!(
            parsed,
            Some(("Jeena Jeena".to_string(), Some("Atif Aslam".to_string())))
        );
    }

    #[test]
    fn test_pipe_skips_non_name_segments() {
        let parsed = parser().parse("Kesariya | Brahmastra Hindi Movie Song | Arijit Singh", None);
        assert_eq!(
            parsed,
            Some(("Kesariya".to_string(), Some("Arijit Singh".to_string())))
        );
    }

    #[test]
    fn test_song_by_artist() {
        let parsed = parser().parse("Halo by Beyoncé (Lyrics)", None);
        assert_eq!(
            parsed,
            Some(("Halo".to_string(), Some("Beyoncé".to_string())))
        );
    }

    #[test]
    fn test_leading_junk_segment_and_by_credit() {
        let parsed = parser().parse("UNPLUGGED Full Audio Song – Jeena Jeena by Sachin - Jigar", None);
        assert_eq!(
            parsed,
            Some(("Jeena Jeena".to_string(), Some("Sachin - Jigar".to_string())))
        );
    }

    #[test]
    fn test_by_in_chosen_song_segment() {
        let parsed = parser().parse("Ed Sheeran - Perfect by Ed Sheeran", None);
        assert_eq!(
            parsed,
            Some(("Perfect".to_string(), Some("Ed Sheeran".to_string())))
        );
    }

    #[test]
    fn test_by_followed_by_pronoun_is_a_title() {
        assert_eq!(parser().parse("Stand By Me", None), None);
        assert_eq!(parser().parse("Stand by Your Man", None), None);
        assert_eq!(parser().parse("Stand By Me (Official Audio)", None), None);
    }

    #[test]
    fn test_by_credit_named_by_channel() {
        let parsed = parser().parse("Lost by Me Myself and I", Some("Me Myself and I"));
        assert_eq!(
            parsed,
            Some(("Lost".to_string(), Some("Me Myself and I".to_string())))
        );
    }

    #[test]
    fn test_lone_fenced_word_after_dash_is_kept() {
        let parsed = parser().parse("India.Arie - Video", Some("India.Arie"));
        assert_eq!(
            parsed,
            Some(("Video".to_string(), Some("India.Arie".to_string())))
        );
    }

    #[test]
    fn test_no_delimiter_yields_nothing() {
        assert_eq!(parser().parse("Bhaga Bhaga", None), None);
        let candidate = parser()
            .extract(&SourceDescriptor::new("Bhaga Bhaga (Lyrical)", None))
            .unwrap();
        assert!(candidate.is_none());
    }

    #[test]
    fn test_candidate_confidence() {
        let candidate = parser()
            .extract(&SourceDescriptor::new("Ed Sheeran - Perfect", None))
            .unwrap()
            .unwrap();
        assert_eq!(candidate.method, ExtractionMethod::RuleBased);
        assert_eq!(candidate.confidence, 0.5);
    }
}
