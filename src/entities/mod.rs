// Entity Models
//
// - Politicians: the reference roster social identities resolve against
// - Parties: ordered label dictionary and the tiered canonicalizer

pub mod politician;
pub mod party;

pub use politician::{ReferenceEntity, Roster};
pub use party::{
    DictionaryEntry, KeywordHeuristic, PartyCanonicalizer, PartyDictionary, Resolution,
    ResolutionTier,
};
