// 🔗 Party Mapping - Politician → official electoral list
//
// Roster parties are short names ("Fratelli d'Italia"), electoral lists are
// the official ballot labels ("FRATELLI D'ITALIA CON GIORGIA MELONI"). Each
// matched politician's party is fuzzy-matched once against the distinct list
// labels; the result is kept as a mapping table that later runs can reuse
// instead of matching again.

use log::{debug, info};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{HashMap, HashSet};

use crate::matcher::MatchResult;
use crate::similarity::weighted_ratio;

/// Default minimum score for a party label to map onto an electoral list
pub const DEFAULT_PARTY_MATCH_THRESHOLD: u8 = 70;

// ============================================================================
// MAPPING ROW
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyMappingRow {
    #[serde(rename = "NOME_POLITICO")]
    pub politician: String,

    #[serde(rename = "PARTITO_ORIGINALE", default)]
    pub original_party: String,

    #[serde(rename = "PARTITO_UFFICIALE")]
    pub official_party: String,

    #[serde(rename = "MATCH_SCORE_PARTITO", default, deserialize_with = "deserialize_score")]
    pub score: u8,
}

/// Accepts "90", "90.0" or an empty cell (→ 0)
fn deserialize_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value
        .filter(|v| v.is_finite())
        .map(|v| v.round().clamp(0.0, 100.0) as u8)
        .unwrap_or(0))
}

// ============================================================================
// PARTY MAPPING (lookup)
// ============================================================================

/// Politician name → official party label
#[derive(Debug, Clone, Default)]
pub struct PartyMapping {
    by_politician: HashMap<String, PartyMappingRow>,
}

impl PartyMapping {
    /// Build lookup; for a politician listed twice the higher score wins
    pub fn from_rows(rows: Vec<PartyMappingRow>) -> Self {
        let mut by_politician: HashMap<String, PartyMappingRow> = HashMap::new();
        for row in rows {
            if row.official_party.trim().is_empty() {
                continue;
            }
            match by_politician.get(&row.politician) {
                Some(existing) if existing.score >= row.score => {}
                _ => {
                    by_politician.insert(row.politician.clone(), row);
                }
            }
        }
        PartyMapping { by_politician }
    }

    pub fn official_party(&self, politician: &str) -> Option<&str> {
        self.by_politician
            .get(politician)
            .map(|row| row.official_party.as_str())
    }

    pub fn len(&self) -> usize {
        self.by_politician.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_politician.is_empty()
    }
}

// ============================================================================
// MAPPING BUILDER
// ============================================================================

/// Fuzzy-matches party labels against the distinct electoral list labels
///
/// Scored with `weighted_ratio`, so a short party name inside a long list
/// label ("Lega" / "LEGA PER SALVINI PREMIER") still matches.
pub struct PartyMappingBuilder {
    /// Original labels, first-appearance order
    lists: Vec<String>,
    pub threshold: u8,
}

impl PartyMappingBuilder {
    pub fn new<'a, I>(list_labels: I, threshold: u8) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen = HashSet::new();
        let mut lists = Vec::new();
        for label in list_labels {
            let key = label.trim().to_lowercase();
            if key.is_empty() || !seen.insert(key) {
                continue;
            }
            lists.push(label.to_string());
        }
        PartyMappingBuilder { lists, threshold }
    }

    /// Best electoral list for a party label, first best in list order
    pub fn best_list(&self, party_label: &str) -> Option<(&str, u8)> {
        let mut best: Option<(&str, u8)> = None;
        for list in &self.lists {
            let score = weighted_ratio(party_label, list);
            if score > 0 && score >= self.threshold && best.map_or(true, |(_, s)| score > s) {
                best = Some((list.as_str(), score));
            }
        }
        best
    }

    /// One mapping row per matched politician, highest score retained
    ///
    /// Politicians whose party reaches no list are omitted. Rows are sorted by
    /// score descending, then politician name.
    pub fn build<'m, I>(&self, matches: I) -> Vec<PartyMappingRow>
    where
        I: IntoIterator<Item = &'m MatchResult>,
    {
        let mut by_politician: HashMap<String, PartyMappingRow> = HashMap::new();

        for result in matches.into_iter().filter(|r| r.matched) {
            let (Some(politician), Some(party)) = (&result.canonical_name, &result.party_label)
            else {
                continue;
            };
            if politician.is_empty() {
                continue;
            }

            let Some((official, score)) = self.best_list(party) else {
                debug!("No electoral list for {} ({})", politician, party);
                continue;
            };

            let candidate = PartyMappingRow {
                politician: politician.clone(),
                original_party: party.clone(),
                official_party: official.to_string(),
                score,
            };
            match by_politician.get(politician) {
                Some(existing) if existing.score >= score => {}
                _ => {
                    by_politician.insert(politician.clone(), candidate);
                }
            }
        }

        let mut rows: Vec<PartyMappingRow> = by_politician.into_values().collect();
        rows.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.politician.cmp(&b.politician)));

        info!(
            "✓ Mapped {} politicians onto {} electoral lists",
            rows.len(),
            rows.iter().map(|r| &r.official_party).collect::<HashSet<_>>().len()
        );
        rows
    }
}

// ============================================================================
// TESTS
// ============================================================================
