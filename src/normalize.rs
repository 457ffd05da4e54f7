//! Shared normalization functions for descriptor parsing and match scoring.
//!
//! Two families live here: junk stripping (used by the extraction stages to
//! turn a video title into a song title) and comparable forms (used by the
//! scorer so that casing, diacritics and curly quotes never cost similarity).

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// JUNK VOCABULARY
// ============================================================================

/// Video descriptors stripped by the rule-based parser wherever they appear
/// as a suffix, a dash/pipe segment, or a bracketed tag.
pub const JUNK_PHRASES: &[&str] = &[
    "official music video",
    "official lyrical video",
    "official lyric video",
    "official video song",
    "official video",
    "official audio",
    "full video songs",
    "full video song",
    "full audio song",
    "song with lyrics",
    "lyrical video",
    "lyrics video",
    "lyric video",
    "video songs",
    "video song",
    "full video",
    "full audio",
    "full song",
    "complete song",
    "music video",
    "audio song",
    "title track",
    "with lyrics",
    "visualizer",
    "visualiser",
    "lyrical",
    "lyrics",
    "1080p",
    "720p",
    "4k",
    "hd",
    "hq",
];

/// Words that are only junk when fenced off by brackets or a separator.
/// "Video" at the end of a bare title may well be part of the song name.
pub const FENCED_ONLY_JUNK: &[&str] = &[
    "official", "audio", "video", "mv", "new", "latest", "unplugged",
];

/// Minimal vocabulary used by the fallback stage.
pub const COMMON_JUNK: &[&str] = &[
    "official music video",
    "official video",
    "official audio",
    "lyric video",
    "lyrics",
    "audio",
    "4k",
    "hd",
];

fn alternation(words: &[&str]) -> String {
    let mut sorted: Vec<&str> = words.to_vec();
    // Longest first so the leftmost-first alternation prefers full phrases
    sorted.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    sorted
        .iter()
        .map(|w| regex::escape(w).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|")
}

fn all_junk() -> Vec<&'static str> {
    JUNK_PHRASES.iter().chain(FENCED_ONLY_JUNK).copied().collect()
}

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// "(Official Video)", "[4K HD]", "(Lyrics 2023)"
pub static BRACKETED_JUNK: Lazy<Regex> = Lazy::new(|| {
    let alt = alternation(&all_junk());
    Regex::new(&format!(
        r"(?i)\s*[\(\[]\s*(?:{alt})(?:\s+(?:{alt}))*(?:\s+\d{{4}})?\s*[\)\]]"
    ))
    .unwrap()
});

/// "- Official Video", "| Full Song HD", ": Lyrics" at the end
pub static SEPARATED_JUNK: Lazy<Regex> = Lazy::new(|| {
    let alt = alternation(&all_junk());
    Regex::new(&format!(r"(?i)\s*[-–—|:]+\s*(?:{alt})(?:\s+(?:{alt}))*\s*$")).unwrap()
});

/// A whole dash segment made of junk: "UNPLUGGED Full Audio Song"
pub static JUNK_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    let alt = alternation(&all_junk());
    Regex::new(&format!(r"(?i)^\s*(?:{alt})(?:\s+(?:{alt}))*\s*$")).unwrap()
});

/// Spaced dash between title segments; "T-Series" and "AC/DC" are not split.
pub static DASH_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+[-–—]\s+").unwrap());

/// "Shape of You Lyrics", "Jeena Jeena Full Video Song"
pub static TRAILING_JUNK: Lazy<Regex> = Lazy::new(|| {
    let alt = alternation(JUNK_PHRASES);
    Regex::new(&format!(r"(?i)\s+(?:{alt})(?:\s+(?:{alt}))*\s*$")).unwrap()
});

pub static COMMON_BRACKETED_JUNK: Lazy<Regex> = Lazy::new(|| {
    let alt = alternation(COMMON_JUNK);
    Regex::new(&format!(r"(?i)\s*[\(\[]\s*(?:{alt})\s*[\)\]]")).unwrap()
});

pub static COMMON_SEPARATED_JUNK: Lazy<Regex> = Lazy::new(|| {
    let alt = alternation(COMMON_JUNK);
    Regex::new(&format!(r"(?i)\s*[-–—|]\s*(?:{alt})\s*$")).unwrap()
});

/// Separator debris left after stripping: "Song -", "| Song"
pub static DANGLING_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[-–—|:]+\s*|\s*[-–—|:]+\s*$").unwrap());

/// Featured/collaborating artists: "Artist feat. Other", "A & B", "A, B"
pub static ARTIST_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)\s+(?:feat\.?|ft\.?|featuring|with)\s+.*$").unwrap(),
        Regex::new(r"\s*[&,;]\s*.*$").unwrap(),
    ]
});

/// YouTube auto-generated and label channel suffixes
pub static CHANNEL_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*(?:-\s*topic|vevo|official(?:\s+channel)?|music)\s*$").unwrap()
});

/// Regex to collapse multiple whitespace into single space
pub static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0xFE20..=0xFE2F)
}

/// Fold Unicode text to ASCII by applying NFKD decomposition and removing combining marks.
/// e.g., "Beyoncé" → "beyonce", "naïve" → "naive"
pub fn fold_to_ascii(s: &str) -> String {
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    // Transliterate whatever is left (Cyrillic, Devanagari, Telugu, CJK, ...)
    any_ascii(&stripped).to_lowercase()
}

/// Normalize punctuation: curly quotes to straight quotes, " & " to " and ",
/// collapsed whitespace.
pub fn normalize_punctuation(s: &str) -> String {
    let result = s
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{00B4}', '\u{0060}'], "'")
        .replace(" & ", " and ");
    MULTI_SPACE.replace_all(&result, " ").to_string()
}

fn tidy(s: &str) -> String {
    let collapsed = MULTI_SPACE.replace_all(s, " ");
    DANGLING_SEPARATOR.replace_all(collapsed.trim(), "").trim().to_string()
}

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Form used for every similarity comparison.
/// e.g., "Beyoncé  –  Halo" → "beyonce - halo"
pub fn comparable(s: &str) -> String {
    let folded = fold_to_ascii(&normalize_punctuation(s));
    MULTI_SPACE.replace_all(folded.trim(), " ").to_string()
}

/// Strip the full junk vocabulary from a video title.
/// Repeats until stable so stacked tags ("Lyrics (Official Video) HD") all go.
pub fn strip_junk(title: &str) -> String {
    let mut result = MULTI_SPACE.replace_all(title.trim(), " ").to_string();
    loop {
        let before = result.clone();
        result = BRACKETED_JUNK.replace_all(&result, "").to_string();
        result = strip_separated_junk(&result);
        result = TRAILING_JUNK.replace(&result, "").to_string();
        result = tidy(&result);
        if result == before {
            break;
        }
    }
    result
}

/// Drop a separated junk tail, unless it is a single fenced-only word that
/// would leave one bare segment behind ("India.Arie - Video").
fn strip_separated_junk(s: &str) -> String {
    let Some(found) = SEPARATED_JUNK.find(s) else {
        return s.to_string();
    };
    let head = &s[..found.start()];
    let tail = found
        .as_str()
        .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '-' | '–' | '—' | '|' | ':'));
    if is_fenced_only_word(tail) && !DASH_SEPARATOR.is_match(head) {
        return s.to_string();
    }
    head.to_string()
}

/// True when the whole segment is junk vocabulary.
pub fn is_junk_segment(segment: &str) -> bool {
    JUNK_SEGMENT.is_match(segment)
}

/// A single word that is junk only when fenced ("Video", "New").
pub fn is_fenced_only_word(segment: &str) -> bool {
    let word = comparable(segment);
    FENCED_ONLY_JUNK.contains(&word.as_str())
}

/// Strip only the most common bracketed and dash-suffixed junk tags.
pub fn strip_common_junk(title: &str) -> String {
    let mut result = COMMON_BRACKETED_JUNK.replace_all(title.trim(), "").to_string();
    result = COMMON_SEPARATED_JUNK.replace(&result, "").to_string();
    tidy(&result)
}

/// Reduce an artist credit to its primary artist.
/// e.g., "B Praak Ft Nawazuddin Siddiqui & Sunanda Sharma" → "B Praak"
pub fn clean_artist(artist: &str) -> String {
    let mut result = artist.trim().to_string();
    for pattern in ARTIST_PATTERNS.iter() {
        result = pattern.replace(&result, "").to_string();
    }
    tidy(&result)
}

/// Clean an uploader/channel name into something usable as an artist.
/// e.g., "Ed Sheeran - Topic" → "Ed Sheeran", "EdSheeranVEVO" → "EdSheeran"
pub fn clean_channel(channel: &str) -> String {
    let stripped = CHANNEL_SUFFIX.replace(channel.trim(), "").to_string();
    let cleaned = tidy(&stripped);
    if cleaned.is_empty() {
        channel.trim().to_string()
    } else {
        cleaned
    }
}

/// Split a joined artist credit ("A, B & C") into individual names.
pub fn split_credits(artist: &str) -> Vec<String> {
    artist
        .split([',', '&', ';'])
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
