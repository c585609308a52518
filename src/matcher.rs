// 🔍 Fuzzy Matcher - Social identities → roster entities
//
// Score: token-sort ratio (see similarity.rs). Both strings are reduced to
// ASCII lowercase tokens, tokens are sorted, and the rejoined strings are
// compared by indel similarity (0-100).
//
// Each identity (username|display_name) is scored against the roster at most
// once per run; the MatchCache holds the write-once result.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};

use crate::entities::{ReferenceEntity, Roster};
use crate::normalizer::candidate_names;
use crate::similarity::{ratio, scoring_form};

/// Minimum score (0-100) for a candidate to count as a match
pub const DEFAULT_MATCH_THRESHOLD: u8 = 70;

// ============================================================================
// RAW IDENTITY & MATCH RESULT
// ============================================================================

/// Author identity as observed in social data
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawIdentity {
    pub username: String,
    pub display_name: String,
}

impl RawIdentity {
    pub fn new(username: &str, display_name: &str) -> Self {
        RawIdentity {
            username: username.to_string(),
            display_name: display_name.to_string(),
        }
    }

    pub fn identity_key(&self) -> String {
        format!("{}|{}", self.username, self.display_name)
    }
}

/// Outcome of matching one identity against the roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub identity_key: String,
    pub matched: bool,
    pub canonical_name: Option<String>,
    pub handle: Option<String>,
    pub party_label: Option<String>,
    pub gender: Option<String>,
    pub score: u8,
}

impl MatchResult {
    pub fn unmatched(identity_key: String) -> Self {
        MatchResult {
            identity_key,
            matched: false,
            canonical_name: None,
            handle: None,
            party_label: None,
            gender: None,
            score: 0,
        }
    }

    pub fn matched(identity_key: String, entity: &ReferenceEntity, score: u8) -> Self {
        MatchResult {
            identity_key,
            matched: true,
            canonical_name: Some(entity.name.clone()),
            handle: Some(entity.handle.clone()),
            party_label: Some(entity.party.clone()),
            gender: Some(entity.gender.clone()),
            score,
        }
    }
}

// ============================================================================
// FUZZY MATCHER
// ============================================================================

pub struct FuzzyMatcher<'a> {
    roster: &'a Roster,
    pub threshold: u8,
}

impl<'a> FuzzyMatcher<'a> {
    pub fn new(roster: &'a Roster) -> Self {
        FuzzyMatcher {
            roster,
            threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }

    pub fn with_threshold(roster: &'a Roster, threshold: u8) -> Self {
        FuzzyMatcher { roster, threshold }
    }

    /// Best roster entity for a set of candidate names
    ///
    /// Candidates are visited in set order and roster entries in roster order.
    /// Only a strictly higher score replaces the current best, so the first
    /// pair reaching the top score wins.
    pub fn best_match(&self, candidates: &BTreeSet<String>) -> Option<(&'a ReferenceEntity, u8)> {
        let mut best: Option<(&'a ReferenceEntity, u8)> = None;
        let mut best_score = 0u8;

        for candidate in candidates {
            let candidate_form = scoring_form(candidate);
            if candidate_form.is_empty() {
                continue;
            }

            for (entity, name_form) in self.roster.iter_scoring() {
                let score = ratio(&candidate_form, name_form);
                if score > best_score && score >= self.threshold {
                    best_score = score;
                    best = Some((entity, score));
                }
            }
        }

        best
    }

    /// Match one identity, without caching
    pub fn match_identity(&self, identity: &RawIdentity) -> MatchResult {
        let key = identity.identity_key();
        let candidates = candidate_names(&identity.username, &identity.display_name);

        match self.best_match(&candidates) {
            Some((entity, score)) => {
                debug!("✓ Match: {} → {} ({}%)", key, entity.name, score);
                MatchResult::matched(key, entity, score)
            }
            None => {
                debug!("✗ No match: {}", key);
                MatchResult::unmatched(key)
            }
        }
    }
}

// ============================================================================
// MATCH CACHE
// ============================================================================

/// Per-run memo of identity → match result
///
/// Constructed once per run and passed explicitly. A key is written once and
/// never overwritten.
#[derive(Debug, Default)]
pub struct MatchCache {
    results: HashMap<String, MatchResult>,
    hits: usize,
}

impl MatchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached result for the identity, computing it on first encounter
    pub fn resolve(&mut self, identity: &RawIdentity, matcher: &FuzzyMatcher) -> &MatchResult {
        match self.results.entry(identity.identity_key()) {
            Entry::Occupied(entry) => {
                self.hits += 1;
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(matcher.match_identity(identity)),
        }
    }

    pub fn get(&self, identity_key: &str) -> Option<&MatchResult> {
        self.results.get(identity_key)
    }

    /// Number of identities scored against the roster
    pub fn computed(&self) -> usize {
        self.results.len()
    }

    /// Number of lookups answered from the cache
    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn matched_count(&self) -> usize {
        self.results.values().filter(|r| r.matched).count()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::token_sort_ratio;

    fn create_test_roster() -> Roster {
        Roster::new(vec![
            ReferenceEntity::new("Giorgia Meloni", "@GiorgiaMeloni", "FRATELLI D'ITALIA", "F"),
            ReferenceEntity::new("Matteo Salvini", "@matteosalvinimi", "LEGA", "M"),
            ReferenceEntity::new("Giuseppe Conte", "@GiuseppeConteIT", "MOVIMENTO 5 STELLE", "M"),
        ])
    }

    fn set_of(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_token_sort_ratio_is_order_independent() {
        assert_eq!(token_sort_ratio("Meloni Giorgia", "giorgia meloni"), 100);
        assert_eq!(token_sort_ratio("Giorgia, Meloni!", "MELONI GIORGIA"), 100);
    }

    #[test]
    fn test_token_sort_ratio_empty_side_is_zero() {
        assert_eq!(token_sort_ratio("", "giorgia meloni"), 0);
        assert_eq!(token_sort_ratio("!!!", "giorgia meloni"), 0);
    }

    #[test]
    fn test_scoring_form_drops_non_ascii() {
        assert_eq!(scoring_form("Niccolò Fabi"), "fabi niccol");
    }

    #[test]
    fn test_meloni_username_resolves() {
        let roster = create_test_roster();
        let matcher = FuzzyMatcher::new(&roster);

        let result = matcher.match_identity(&RawIdentity::new("giorgiameloni_ufficiale", ""));
        assert!(result.matched);
        assert!(result.score >= 70);
        assert_eq!(result.canonical_name.as_deref(), Some("Giorgia Meloni"));
        assert_eq!(result.party_label.as_deref(), Some("FRATELLI D'ITALIA"));
        assert_eq!(result.identity_key, "giorgiameloni_ufficiale|");
    }

    #[test]
    fn test_display_name_resolves() {
        let roster = create_test_roster();
        let matcher = FuzzyMatcher::new(&roster);

        let result = matcher.match_identity(&RawIdentity::new("capitano_2022", "Matteo Salvini"));
        assert!(result.matched);
        assert_eq!(result.score, 100);
        assert_eq!(result.canonical_name.as_deref(), Some("Matteo Salvini"));
    }

    #[test]
    fn test_display_name_with_extra_word_resolves() {
        let roster = Roster::new(vec![ReferenceEntity::new("Matteo Salvini", "@matteosalvinimi", "LEGA", "M")]);
        let matcher = FuzzyMatcher::new(&roster);

        let result = matcher.match_identity(&RawIdentity::new("capitano", "Matteo Salvini Segretario"));
        assert!(result.matched);
        assert_eq!(result.score, 72);
        assert_eq!(result.canonical_name.as_deref(), Some("Matteo Salvini"));
    }

    #[test]
    fn test_underscore_stays_inside_roster_token() {
        let roster = Roster::new(vec![ReferenceEntity::new("mario_rossi", "", "LEGA", "M")]);
        let matcher = FuzzyMatcher::with_threshold(&roster, 0);

        let (_, score) = matcher.best_match(&set_of(&["rossi mario"])).unwrap();
        assert_eq!(score, 91);
    }

    #[test]
    fn test_below_threshold_is_unmatched() {
        let roster = create_test_roster();
        let matcher = FuzzyMatcher::new(&roster);

        let result = matcher.match_identity(&RawIdentity::new("cucina_di_nonna", "Ricette Facili"));
        assert!(!result.matched);
        assert_eq!(result.score, 0);
        assert!(result.canonical_name.is_none());
        assert!(result.party_label.is_none());
    }

    #[test]
    fn test_tie_keeps_first_roster_entry() {
        let roster = Roster::new(vec![
            ReferenceEntity::new("Mario Rossi", "@first", "LEGA", "M"),
            ReferenceEntity::new("Rossi Mario", "@second", "PD", "M"),
        ]);
        let matcher = FuzzyMatcher::new(&roster);

        let (entity, score) = matcher.best_match(&set_of(&["mario rossi"])).unwrap();
        assert_eq!(score, 100);
        assert_eq!(entity.handle, "@first");
    }

    #[test]
    fn test_tie_keeps_first_candidate_in_sorted_order() {
        let roster = Roster::new(vec![
            ReferenceEntity::new("Anna Bianchi", "@anna", "PD", "F"),
            ReferenceEntity::new("Bruno Bianchi", "@bruno", "LEGA", "M"),
        ]);
        let matcher = FuzzyMatcher::new(&roster);

        // Both candidates score 100 against a different entity
        let (entity, _) = matcher
            .best_match(&set_of(&["bruno bianchi", "anna bianchi"]))
            .unwrap();
        assert_eq!(entity.handle, "@anna");
    }

    #[test]
    fn test_higher_score_from_later_candidate_wins() {
        let roster = create_test_roster();
        let matcher = FuzzyMatcher::new(&roster);

        let (entity, score) = matcher
            .best_match(&set_of(&["conte giusepe", "giuseppe conte"]))
            .unwrap();
        assert_eq!(entity.name, "Giuseppe Conte");
        assert_eq!(score, 100);
    }

    #[test]
    fn test_custom_threshold() {
        let roster = create_test_roster();
        let strict = FuzzyMatcher::with_threshold(&roster, 100);

        assert!(strict.best_match(&set_of(&["giorgia melon"])).is_none());
        assert!(strict.best_match(&set_of(&["giorgia meloni"])).is_some());
    }

    #[test]
    fn test_cache_computes_each_identity_once() {
        let roster = create_test_roster();
        let matcher = FuzzyMatcher::new(&roster);
        let mut cache = MatchCache::new();

        let identity = RawIdentity::new("giorgiameloni_ufficiale", "Giorgia Meloni");
        let first = cache.resolve(&identity, &matcher).clone();
        let second = cache.resolve(&identity, &matcher).clone();

        assert_eq!(first, second);
        assert_eq!(cache.computed(), 1);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.matched_count(), 1);
    }

    #[test]
    fn test_cache_never_overwrites() {
        let roster = create_test_roster();
        let lenient = FuzzyMatcher::new(&roster);
        let impossible = FuzzyMatcher::with_threshold(&roster, 101);
        let mut cache = MatchCache::new();

        let identity = RawIdentity::new("matteosalvini", "Matteo Salvini");
        let first = cache.resolve(&identity, &lenient).clone();
        // A different matcher cannot replace the stored result
        let second = cache.resolve(&identity, &impossible).clone();

        assert!(first.matched);
        assert_eq!(first, second);
        assert_eq!(cache.get(&identity.identity_key()), Some(&first));
    }

    #[test]
    fn test_cache_distinguishes_display_names() {
        let roster = create_test_roster();
        let matcher = FuzzyMatcher::new(&roster);
        let mut cache = MatchCache::new();

        cache.resolve(&RawIdentity::new("user", "Giuseppe Conte"), &matcher);
        cache.resolve(&RawIdentity::new("user", "Matteo Salvini"), &matcher);

        assert_eq!(cache.computed(), 2);
        assert_eq!(cache.hits(), 0);
    }
}
