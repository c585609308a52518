// Party Resolution - Core Library
// Social accounts → roster politicians → canonical parties → election join

pub mod error;
pub mod normalizer;   // Raw identifiers → comparable names
pub mod similarity;   // 0-100 fuzzy string scores
pub mod entities;     // Roster politicians, party dictionary
pub mod matcher;      // Fuzzy matching + per-run cache
pub mod aggregation;  // Per-party metric reduction
pub mod party_mapping;
pub mod tables;       // CSV sources and outputs
pub mod pipeline;
pub mod config;

// Re-export commonly used types
pub use error::PipelineError;
pub use normalizer::{candidate_names, normalize};
pub use entities::{
    DictionaryEntry, KeywordHeuristic, PartyCanonicalizer, PartyDictionary,
    ReferenceEntity, Resolution, ResolutionTier, Roster,
};
pub use similarity::{token_sort_ratio, weighted_ratio};
pub use matcher::{
    FuzzyMatcher, MatchCache, MatchResult, RawIdentity, DEFAULT_MATCH_THRESHOLD,
};
pub use aggregation::{
    AggregatedPartyMetrics, AggregationEngine, DerivedMetric, MetricRow, MetricSpec, Reducer,
};
pub use party_mapping::{PartyMapping, PartyMappingBuilder, PartyMappingRow};
pub use tables::{
    load_election_results, load_party_mapping, load_roster, load_social_records,
    write_merged, write_party_mapping, write_resolved_identities, write_social_aggregate,
    ElectionDataset, ElectionResult, LoadStats, SocialDataset, SocialRecord,
};
pub use pipeline::{
    DiscardReason, IdentityState, MergePipeline, MergedPartyRow, PipelineOutput,
    ResolvedRecord, RunReport, SocialPartyRow,
};
pub use config::PipelineConfig;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
