use std::cmp;

/// Minimum similarity for a station name to count as a match.
pub(crate) const MATCH_THRESHOLD: f64 = 0.6;

/// Edit distance between two strings, counted in chars.
pub(crate) fn distance(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return cmp::max(a.len(), b.len());
    }

    // Two rolling rows are enough, only the previous row is ever read.
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];
    for (i, ac) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, bc) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ac != bc);
            let insertion = current[j] + 1;
            let deletion = previous[j + 1] + 1;
            current[j + 1] = cmp::min(substitution, cmp::min(insertion, deletion));
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// Lowercases and collapses whitespace so names compare cheaply.
pub(crate) fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .map(|token| token.to_lowercase().replace('ё', "е"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Scores how well `needle` matches `hay`, both already normalized.
///
/// Every needle token is matched against its best hay token. A hay token that
/// starts with the needle token is a perfect match so partially typed names
/// still rank first. The result is the mean over the needle tokens in `0..=1`.
pub(crate) fn score(needle: &str, hay: &str) -> f64 {
    let hay_tokens: Vec<_> = hay.split_whitespace().collect();
    if hay_tokens.is_empty() {
        return 0.0;
    }

    let mut total = 0.0;
    let mut tokens = 0usize;
    for token in needle.split_whitespace() {
        tokens += 1;
        total += hay_tokens
            .iter()
            .map(|hay_token| token_similarity(token, hay_token))
            .fold(0.0, f64::max);
    }

    if tokens == 0 { 0.0 } else { total / tokens as f64 }
}

fn token_similarity(needle: &str, hay: &str) -> f64 {
    if hay.starts_with(needle) {
        return 1.0;
    }
    let longest = cmp::max(needle.chars().count(), hay.chars().count());
    1.0 - distance(needle, hay) as f64 / longest as f64
}

#[test]
fn fuzzy_empty_vs_nonempty() {
    assert_eq!(distance("", "abc"), 3);
    assert_eq!(distance("abc", ""), 3);
}

#[test]
fn fuzzy_edits() {
    assert_eq!(distance("kitten", "sitting"), 3);
    assert_eq!(distance("intention", "execution"), 5);
    assert_eq!(distance("café", "cafe"), 1);
}

#[test]
fn fuzzy_cyrillic() {
    assert_eq!(distance("курская", "курская"), 0);
    assert_eq!(distance("курская", "курскя"), 1);
}

#[test]
fn fuzzy_prefix_scores_full() {
    assert_eq!(score("кур", "курская"), 1.0);
    assert_eq!(score("park", "park kultury"), 1.0);
}

#[test]
fn fuzzy_typo_passes_threshold() {
    assert!(score("kurskya", "kurskaya") >= MATCH_THRESHOLD);
    assert!(score("arbat", "kurskaya") < MATCH_THRESHOLD);
}

#[test]
fn fuzzy_normalize() {
    assert_eq!(normalize("  Савёловская   Парк "), "савеловская парк");
}
