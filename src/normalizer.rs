// 🧹 Name Normalizer - Raw social identifiers → comparable token strings
//
// "giorgiameloni_ufficiale" → {"giorgiameloni", "giorgiameloniufficiale"}
// "Giorgia Meloni 🇮🇹"      → {"giorgia meloni"}

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// Words that social accounts append to a real name
pub const NOISE_WORDS: [&str; 9] = [
    "ufficiale",
    "ufficiali",
    "official",
    "officiel",
    "oficial",
    "real",
    "page",
    "pagina",
    "account",
];

/// Username segments this short carry no name information
const MIN_SEGMENT_CHARS: usize = 3;

static SOCIAL_MARKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[_@#\d]").expect("social marker pattern"));

static SYMBOLS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("symbol pattern"));

static NOISE: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(r"(?i)\b(?:{})\b", NOISE_WORDS.join("|"));
    Regex::new(&pattern).expect("noise word pattern")
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

static SEGMENT_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[._\d]+").expect("segment separator pattern"));

/// Clean a raw identifier for comparison
///
/// Empty or blank input yields an empty string.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let without_markers = SOCIAL_MARKERS.replace_all(trimmed, "");
    let without_symbols = SYMBOLS.replace_all(&without_markers, "");
    let without_noise = NOISE.replace_all(&without_symbols, "");
    let collapsed = WHITESPACE.replace_all(&without_noise, " ");

    collapsed.trim().to_lowercase()
}

/// All normalized name candidates for one social identity
///
/// The set is sorted, which fixes the enumeration order the matcher relies on
/// for tie-breaking.
pub fn candidate_names(username: &str, display_name: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();

    if !display_name.trim().is_empty() {
        insert_non_empty(&mut names, normalize(display_name));
    }

    if !username.trim().is_empty() {
        insert_non_empty(&mut names, normalize(username));

        for segment in SEGMENT_SEPARATORS.split(username) {
            if segment.chars().count() >= MIN_SEGMENT_CHARS {
                insert_non_empty(&mut names, normalize(segment));
            }
        }
    }

    names
}

fn insert_non_empty(names: &mut BTreeSet<String>, name: String) {
    if !name.is_empty() {
        names.insert(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_digits_and_symbols() {
        assert_eq!(normalize("  Matteo_Salvini#2022! "), "matteosalvini");
        assert_eq!(normalize("@carlo.calenda"), "carlocalenda");
    }

    #[test]
    fn test_normalize_removes_noise_words() {
        assert_eq!(normalize("Giorgia Meloni Ufficiale"), "giorgia meloni");
        assert_eq!(normalize("Official Page   Enrico Letta"), "enrico letta");
        // Glued noise is not a separate word
        assert_eq!(normalize("realmadrid"), "realmadrid");
    }

    #[test]
    fn test_normalize_keeps_accented_letters() {
        assert_eq!(normalize("Niccolò Fabi"), "niccolò fabi");
    }

    #[test]
    fn test_normalize_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("1234_!!"), "");
    }

    #[test]
    fn test_candidate_names_from_username_segments() {
        let names = candidate_names("giorgiameloni_ufficiale", "");
        let expected: BTreeSet<String> = ["giorgiameloni", "giorgiameloniufficiale"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_candidate_names_includes_display_name() {
        let names = candidate_names("luca.carabetta", "Luca Carabetta");
        assert!(names.contains("luca carabetta"));
        assert!(names.contains("lucacarabetta"));
        assert!(names.contains("luca"));
        assert!(names.contains("carabetta"));
    }

    #[test]
    fn test_candidate_names_skips_short_segments() {
        let names = candidate_names("ab_cd_m5s", "");
        assert!(!names.contains("ab"));
        assert!(!names.contains("cd"));
        // "m" survives only inside the full username
        assert_eq!(names.len(), 1);
        assert!(names.contains("abcdms"));
    }

    #[test]
    fn test_candidate_names_empty_identity() {
        assert!(candidate_names("", "").is_empty());
        assert!(candidate_names("  ", "123").is_empty());
    }
}
