// 🏛️ Politician Entity - Reference roster of known political actors
//
// The roster is the match target for noisy social identities. It is loaded
// once and never changes during a run, so the scoring form of every name is
// computed up front.

use serde::{Deserialize, Serialize};

use crate::similarity::scoring_form;

// ============================================================================
// REFERENCE ENTITY
// ============================================================================

/// One row of the representatives roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntity {
    #[serde(rename = "Name", default)]
    pub name: String,

    #[serde(rename = "Twitter-Handle", default)]
    pub handle: String,

    #[serde(rename = "Party", default)]
    pub party: String,

    #[serde(rename = "Gender", default)]
    pub gender: String,
}

impl ReferenceEntity {
    pub fn new(name: &str, handle: &str, party: &str, gender: &str) -> Self {
        ReferenceEntity {
            name: name.to_string(),
            handle: handle.to_string(),
            party: party.to_string(),
            gender: gender.to_string(),
        }
    }
}

// ============================================================================
// ROSTER
// ============================================================================

/// Ordered, read-only list of reference entities
///
/// Order matters: when two entries score the same against a candidate, the
/// earlier one wins.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    entities: Vec<ReferenceEntity>,
    scoring_names: Vec<String>,
}

impl Roster {
    pub fn new(entities: Vec<ReferenceEntity>) -> Self {
        let scoring_names = entities.iter().map(|e| scoring_form(&e.name)).collect();
        Roster {
            entities,
            scoring_names,
        }
    }

    /// Entities paired with their precomputed scoring form, in roster order
    pub fn iter_scoring(&self) -> impl Iterator<Item = (&ReferenceEntity, &str)> {
        self.entities
            .iter()
            .zip(self.scoring_names.iter().map(String::as_str))
    }

    pub fn entities(&self) -> &[ReferenceEntity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
