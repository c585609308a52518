// 📐 Similarity - 0-100 string scores for fuzzy matching
//
// All scores sit on one primitive: the indel ratio 2·LCS / (len_a + len_b),
// scaled to 100 and rounded half-to-even.
//
// Preprocessing (`full_process`): non-ASCII characters are dropped, anything
// that is not [A-Za-z0-9_] becomes a space, lowercase, trim.
//
//   token_sort_ratio  - ratio of the sorted-token forms
//   token_set_ratio   - ratio over shared tokens + the sorted leftovers
//   partial_ratio     - best ratio of the shorter string against every
//                       same-length window of the longer one
//   weighted_ratio    - best of the above, partial scores discounted when the
//                       lengths differ by 1.5x or more

use std::collections::BTreeSet;

/// Discount applied to token-based scores inside `weighted_ratio`
const UNBASE_SCALE: f64 = 0.95;

/// Length ratio from which `weighted_ratio` considers partial alignments
const PARTIAL_LENGTH_RATIO: f64 = 1.5;

/// Length ratio beyond which partial alignments are discounted harder
const LONG_PARTIAL_LENGTH_RATIO: f64 = 8.0;

// ============================================================================
// PREPROCESSING
// ============================================================================

/// ASCII-only, word characters kept, everything else a space, lowercased
pub fn full_process(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii())
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();

    cleaned.trim().to_string()
}

/// Processed string with its tokens sorted and single-space joined
pub fn scoring_form(s: &str) -> String {
    let processed = full_process(s);
    let mut tokens: Vec<&str> = processed.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

// ============================================================================
// PRIMITIVES
// ============================================================================

fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut row = vec![0usize; b.len() + 1];
    for &ca in a {
        let mut diagonal = 0;
        for (j, &cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == cb {
                diagonal + 1
            } else {
                above.max(row[j])
            };
            diagonal = above;
        }
    }
    row[b.len()]
}

/// Indel similarity in 0.0..=1.0
fn indel_similarity(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    (2 * lcs_len(a, b)) as f64 / total as f64
}

/// Round to nearest, ties to even
fn round_half_even(x: f64) -> f64 {
    let rounded = x.round();
    if (x - x.trunc()).abs() == 0.5 {
        2.0 * (x / 2.0).round()
    } else {
        rounded
    }
}

fn to_score(x: f64) -> u8 {
    round_half_even(x).clamp(0.0, 100.0) as u8
}

// ============================================================================
// SCORERS
// ============================================================================

/// Indel ratio of two strings taken as they are; an empty side scores 0
pub fn ratio(a: &str, b: &str) -> u8 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    to_score(100.0 * indel_similarity(&a, &b))
}

/// Best ratio of the shorter string against each window of the longer one
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (shorter, longer) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };

    let mut best = 0.0f64;
    for window in longer.windows(shorter.len()) {
        let similarity = indel_similarity(shorter, window);
        if similarity > 0.995 {
            return 100;
        }
        best = best.max(similarity);
    }
    to_score(100.0 * best)
}

/// Order-independent token comparison
pub fn token_sort_ratio(a: &str, b: &str) -> u8 {
    ratio(&scoring_form(a), &scoring_form(b))
}

pub fn partial_token_sort_ratio(a: &str, b: &str) -> u8 {
    partial_ratio(&scoring_form(a), &scoring_form(b))
}

pub fn token_set_ratio(a: &str, b: &str) -> u8 {
    token_set(a, b, ratio)
}

pub fn partial_token_set_ratio(a: &str, b: &str) -> u8 {
    token_set(a, b, partial_ratio)
}

fn token_set(a: &str, b: &str, scorer: fn(&str, &str) -> u8) -> u8 {
    let pa = full_process(a);
    let pb = full_process(b);
    if pa.is_empty() || pb.is_empty() {
        return 0;
    }

    let tokens_a: BTreeSet<&str> = pa.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = pb.split_whitespace().collect();

    let join = |tokens: Vec<&str>| tokens.join(" ");
    let intersection = join(tokens_a.intersection(&tokens_b).copied().collect());
    let only_a = join(tokens_a.difference(&tokens_b).copied().collect());
    let only_b = join(tokens_b.difference(&tokens_a).copied().collect());

    let combined_a = format!("{} {}", intersection, only_a).trim().to_string();
    let combined_b = format!("{} {}", intersection, only_b).trim().to_string();

    scorer(&intersection, &combined_a)
        .max(scorer(&intersection, &combined_b))
        .max(scorer(&combined_a, &combined_b))
}

/// Best of plain, token and (for unequal lengths) partial scores
///
/// Partial scores are scaled by 0.9, or 0.6 when one string is more than 8x
/// longer; token scores are further scaled by 0.95.
pub fn weighted_ratio(a: &str, b: &str) -> u8 {
    let pa = full_process(a);
    let pb = full_process(b);
    if pa.is_empty() || pb.is_empty() {
        return 0;
    }

    let base = ratio(&pa, &pb) as f64;
    let (len_a, len_b) = (pa.chars().count() as f64, pb.chars().count() as f64);
    let length_ratio = len_a.max(len_b) / len_a.min(len_b);

    if length_ratio < PARTIAL_LENGTH_RATIO {
        let sorted = token_sort_ratio(&pa, &pb) as f64 * UNBASE_SCALE;
        let set = token_set_ratio(&pa, &pb) as f64 * UNBASE_SCALE;
        return to_score(base.max(sorted).max(set));
    }

    let partial_scale = if length_ratio > LONG_PARTIAL_LENGTH_RATIO {
        0.6
    } else {
        0.9
    };
    let partial = partial_ratio(&pa, &pb) as f64 * partial_scale;
    let sorted = partial_token_sort_ratio(&pa, &pb) as f64 * UNBASE_SCALE * partial_scale;
    let set = partial_token_set_ratio(&pa, &pb) as f64 * UNBASE_SCALE * partial_scale;

    to_score(base.max(partial).max(sorted).max(set))
}

// ============================================================================
// TESTS
// ============================================================================
