// 🗳️ Party Entity - Free-text party labels → canonical party ids
//
// Problem solved:
// - "PD", "PARTITO DEMOCRATICO", "PARTITO DEMOCRATICO - ITALIA DEMOCRATICA E
//   PROGRESSISTA" → all the same canonical party
// - Social data (roster parties) and electoral lists use different spellings;
//   the canonical id is the join key between them
//
// Resolution is tiered, first hit wins: exact → substring → keyword → passthrough.
// The dictionary is ORDERED. On ambiguous labels (a coalition name containing
// a member party's name) the first entry in insertion order wins.

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// RESOLUTION TIER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionTier {
    /// Label equals a dictionary key
    Exact,

    /// Label contains a key, or a key contains the label
    Substring,

    /// Label contains a keyword tied to one specific party
    Keyword,

    /// Nothing matched, label returned upper-trimmed
    Passthrough,
}

impl ResolutionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionTier::Exact => "exact",
            ResolutionTier::Substring => "substring",
            ResolutionTier::Keyword => "keyword",
            ResolutionTier::Passthrough => "passthrough",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub canonical: String,
    pub tier: ResolutionTier,
}

// ============================================================================
// PARTY DICTIONARY
// ============================================================================

/// One dictionary entry as stored in a JSON dictionary file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub label: String,
    pub canonical: String,
}

/// Keywords that identify one party when no dictionary entry matched
#[derive(Debug, Clone)]
pub struct KeywordHeuristic {
    pub keywords: Vec<String>,
    pub canonical: String,
}

/// Insertion-ordered label → canonical party table
#[derive(Debug, Clone)]
pub struct PartyDictionary {
    entries: Vec<(String, String)>,
    heuristic: Option<KeywordHeuristic>,
}

impl PartyDictionary {
    /// Create empty dictionary (every label passes through)
    pub fn new() -> Self {
        PartyDictionary {
            entries: Vec::new(),
            heuristic: None,
        }
    }

    /// Italian 2022 general election parties and their common spellings
    pub fn with_defaults() -> Self {
        let mut dictionary = PartyDictionary::new();

        let defaults = [
            ("FRATELLI D'ITALIA", "FRATELLI D'ITALIA"),
            ("FRATELLI D'ITALIA CON GIORGIA MELONI", "FRATELLI D'ITALIA"),
            ("LEGA", "LEGA"),
            ("LEGA PER SALVINI PREMIER", "LEGA"),
            ("LEGA - SALVINI PREMIER", "LEGA"),
            ("FORZA ITALIA", "FORZA ITALIA"),
            ("PARTITO DEMOCRATICO", "PARTITO DEMOCRATICO"),
            ("PD", "PARTITO DEMOCRATICO"),
            ("MOVIMENTO 5 STELLE", "MOVIMENTO 5 STELLE"),
            ("M5S", "MOVIMENTO 5 STELLE"),
            ("AZIONE - ITALIA VIVA", "AZIONE"),
            ("AZIONE", "AZIONE"),
            ("ITALIA VIVA", "AZIONE"),
            ("ALLEANZA VERDI E SINISTRA", "ALLEANZA VERDI E SINISTRA"),
            ("VERDI", "ALLEANZA VERDI E SINISTRA"),
            ("SINISTRA ITALIANA", "ALLEANZA VERDI E SINISTRA"),
            ("+EUROPA", "+EUROPA"),
            ("PIU' EUROPA", "+EUROPA"),
            ("IMPEGNO CIVICO", "IMPEGNO CIVICO"),
            ("NOI MODERATI", "NOI MODERATI"),
            ("ITALEXIT", "ITALEXIT"),
            ("UNIONE POPOLARE", "UNIONE POPOLARE"),
            ("VITA", "VITA"),
        ];
        for (label, canonical) in defaults {
            dictionary.insert(label, canonical);
        }

        dictionary.heuristic = Some(KeywordHeuristic {
            keywords: ["5 STELLE", "5STELLE", "CINQUE STELLE", "CINQUESTELLE", "GRILLINI"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
            canonical: "MOVIMENTO 5 STELLE".to_string(),
        });

        dictionary
    }

    /// Load dictionary from a JSON array of {label, canonical}, keeping file order
    ///
    /// The default keyword heuristic is kept.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read party dictionary: {:?}", path.as_ref()))?;

        let entries: Vec<DictionaryEntry> =
            serde_json::from_str(&content).context("Failed to parse party dictionary JSON")?;

        let mut dictionary = PartyDictionary::from_entries(entries);
        dictionary.heuristic = PartyDictionary::with_defaults().heuristic;
        Ok(dictionary)
    }

    pub fn from_entries(entries: Vec<DictionaryEntry>) -> Self {
        let mut dictionary = PartyDictionary::new();
        for entry in entries {
            dictionary.insert(&entry.label, &entry.canonical);
        }
        dictionary
    }

    /// Append an entry. An existing key keeps its position and first value.
    pub fn insert(&mut self, label: &str, canonical: &str) {
        let key = clean_label(label);
        if key.is_empty() || self.entries.iter().any(|(k, _)| *k == key) {
            return;
        }
        self.entries.push((key, clean_label(canonical)));
    }

    pub fn set_heuristic(&mut self, heuristic: Option<KeywordHeuristic>) {
        self.heuristic = heuristic;
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PartyDictionary {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ============================================================================
// PARTY CANONICALIZER
// ============================================================================

pub struct PartyCanonicalizer<'a> {
    dictionary: &'a PartyDictionary,
}

impl<'a> PartyCanonicalizer<'a> {
    pub fn new(dictionary: &'a PartyDictionary) -> Self {
        PartyCanonicalizer { dictionary }
    }

    /// Map a free-text label to its canonical party id
    pub fn canonicalize(&self, label: &str) -> String {
        self.resolve(label).canonical
    }

    /// Canonicalize and report which tier produced the answer
    pub fn resolve(&self, label: &str) -> Resolution {
        let cleaned = clean_label(label);

        // An empty label is contained in every key
        if cleaned.is_empty() {
            return Resolution {
                canonical: cleaned,
                tier: ResolutionTier::Passthrough,
            };
        }

        let resolution = self
            .exact(&cleaned)
            .or_else(|| self.substring(&cleaned))
            .or_else(|| self.keyword(&cleaned))
            .unwrap_or_else(|| Resolution {
                canonical: cleaned.clone(),
                tier: ResolutionTier::Passthrough,
            });

        debug!(
            "Party '{}' → '{}' ({})",
            label,
            resolution.canonical,
            resolution.tier.as_str()
        );
        resolution
    }

    fn exact(&self, cleaned: &str) -> Option<Resolution> {
        self.dictionary
            .entries
            .iter()
            .find(|(key, _)| key == cleaned)
            .map(|(_, canonical)| Resolution {
                canonical: canonical.clone(),
                tier: ResolutionTier::Exact,
            })
    }

    fn substring(&self, cleaned: &str) -> Option<Resolution> {
        self.dictionary
            .entries
            .iter()
            .find(|(key, _)| cleaned.contains(key.as_str()) || key.contains(cleaned))
            .map(|(_, canonical)| Resolution {
                canonical: canonical.clone(),
                tier: ResolutionTier::Substring,
            })
    }

    fn keyword(&self, cleaned: &str) -> Option<Resolution> {
        let heuristic = self.dictionary.heuristic.as_ref()?;
        heuristic
            .keywords
            .iter()
            .any(|keyword| cleaned.contains(keyword.as_str()))
            .then(|| Resolution {
                canonical: heuristic.canonical.clone(),
                tier: ResolutionTier::Keyword,
            })
    }
}

fn clean_label(label: &str) -> String {
    label.trim().to_uppercase()
}

// ============================================================================
// TESTS
// ============================================================================
