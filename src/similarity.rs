//! String similarity metrics used by the scorer.
//!
//! All metrics compare the `comparable` forms of their inputs and return a
//! value in [0, 1]. The character-level ratio is a normalized Levenshtein
//! similarity; the token-set and partial variants follow the usual fuzzy
//! matching definitions built on top of it.

use std::collections::BTreeSet;

use strsim::normalized_levenshtein;

use crate::normalize::comparable;

fn ratio_of_comparables(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    normalized_levenshtein(a, b).clamp(0.0, 1.0)
}

/// Exact character-level similarity.
pub fn simple_ratio(a: &str, b: &str) -> f64 {
    ratio_of_comparables(&comparable(a), &comparable(b))
}

/// Best similarity of the shorter string against every equally long window
/// of the longer one. "bhaga bhaga" vs "bhaga bhaga (from ...)" → 1.0
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let (a, b) = (comparable(a), comparable(b));
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    let short_len = short.chars().count();
    let long_chars: Vec<char> = long.chars().collect();
    if short_len == 0 {
        return 0.0;
    }
    if short_len == long_chars.len() {
        return ratio_of_comparables(&short, &long);
    }

    let mut best: f64 = 0.0;
    for start in 0..=(long_chars.len() - short_len) {
        let window: String = long_chars[start..start + short_len].iter().collect();
        let score = ratio_of_comparables(&short, &window);
        if score > best {
            best = score;
            if best >= 1.0 {
                break;
            }
        }
    }
    best
}

/// Order- and duplicate-insensitive token overlap.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let (a, b) = (comparable(a), comparable(b));
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersection: Vec<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let only_a: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let only_b: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();

    let base = intersection.join(" ");
    let with_a = format!("{} {}", base, only_a.join(" ")).trim().to_string();
    let with_b = format!("{} {}", base, only_b.join(" ")).trim().to_string();

    [
        ratio_of_comparables(&base, &with_a),
        ratio_of_comparables(&base, &with_b),
        ratio_of_comparables(&with_a, &with_b),
    ]
    .into_iter()
    .fold(0.0, f64::max)
}

/// True if either string contains the other (both non-empty).
pub fn contains_either(a: &str, b: &str) -> bool {
    let (a, b) = (comparable(a), comparable(b));
    !a.is_empty() && !b.is_empty() && (a.contains(&b) || b.contains(&a))
}
