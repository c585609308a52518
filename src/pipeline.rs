// 🔄 Merge Pipeline - Social identities + electoral results → per-party table
//
// Stages, strictly ordered:
//   1. resolve every unique identity against the roster (unmatched discarded)
//   2. canonicalize each resolved party label (empty labels discarded)
//   3. aggregate social metrics per canonical party
//   4. canonicalize + aggregate votes per party (non-positive totals discarded)
//   5. inner join on canonical party
//   6. vote share = votes / total votes of surviving parties * 100
//   7. sort by votes, descending
//
// Per identity: Unresolved → Resolved → CanonicalParty → AggregatedInto,
// or Discarded at the first stage whose filter it fails.

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use uuid::Uuid;

use crate::aggregation::{
    safe_ratio, AggregatedPartyMetrics, AggregationEngine, DerivedMetric, MetricRow, MetricSpec,
};
use crate::entities::{PartyCanonicalizer, PartyDictionary, ResolutionTier, Roster};
use crate::error::PipelineError;
use crate::matcher::{FuzzyMatcher, MatchCache, MatchResult, RawIdentity, DEFAULT_MATCH_THRESHOLD};
use crate::party_mapping::PartyMapping;
use crate::tables::{
    ElectionResult, SocialRecord, COL_COMMENTCOUNT, COL_DIGGCOUNT, COL_PLAYCOUNT, COL_SHARECOUNT,
};

// Aggregate metric names (also the output column names)
pub const POSTS: &str = "NUMERO_POST_TIKTOK";
pub const VIEWS: &str = "TOTALE_VIEWS_TIKTOK";
pub const LIKES: &str = "TOTALE_LIKES";
pub const SHARES: &str = "TOTALE_SHARES";
pub const COMMENTS: &str = "TOTALE_COMMENTS";
pub const ENGAGEMENT: &str = "ENGAGEMENT_TOTALE";
pub const POLITICIANS: &str = "NUMERO_POLITICI_MAPPATI";
pub const ENGAGEMENT_PER_POST: &str = "ENGAGEMENT_PER_POST";
pub const VIEWS_PER_POST: &str = "VIEWS_PER_POST";
pub const VOTES: &str = "TOTALE_VOTI_LISTA";

const ROW_ENGAGEMENT: &str = "engagement";
const ROW_VOTES: &str = "votes";
const TAG_POLITICIAN: &str = "politician";

// ============================================================================
// IDENTITY STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscardReason {
    /// No roster entity reached the match threshold
    NoMatch,

    /// Matched politician has no party label
    NoParty,

    /// Canonical party absent from the electoral aggregate
    PartyNotInElection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityState {
    Unresolved,
    Resolved,
    CanonicalParty(String),
    AggregatedInto(String),
    Discarded(DiscardReason),
}

// ============================================================================
// OUTPUT ROWS
// ============================================================================

/// One social record's identity and its match
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRecord {
    pub identity_key: String,
    pub result: MatchResult,
}

/// Per-party social aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialPartyRow {
    #[serde(rename = "PARTITO")]
    pub party: String,
    #[serde(rename = "NUMERO_POST_TIKTOK")]
    pub posts: u64,
    #[serde(rename = "TOTALE_VIEWS_TIKTOK")]
    pub views: i64,
    #[serde(rename = "TOTALE_LIKES")]
    pub likes: i64,
    #[serde(rename = "TOTALE_SHARES")]
    pub shares: i64,
    #[serde(rename = "TOTALE_COMMENTS")]
    pub comments: i64,
    #[serde(rename = "ENGAGEMENT_TOTALE")]
    pub engagement: i64,
    #[serde(rename = "NUMERO_POLITICI_MAPPATI")]
    pub politicians: u64,
    #[serde(rename = "ENGAGEMENT_PER_POST")]
    pub engagement_per_post: f64,
    #[serde(rename = "VIEWS_PER_POST")]
    pub views_per_post: f64,
}

impl From<&AggregatedPartyMetrics> for SocialPartyRow {
    fn from(metrics: &AggregatedPartyMetrics) -> Self {
        SocialPartyRow {
            party: metrics.party.clone(),
            posts: metrics.value(POSTS).round() as u64,
            views: metrics.value(VIEWS).round() as i64,
            likes: metrics.value(LIKES).round() as i64,
            shares: metrics.value(SHARES).round() as i64,
            comments: metrics.value(COMMENTS).round() as i64,
            engagement: metrics.value(ENGAGEMENT).round() as i64,
            politicians: metrics.value(POLITICIANS).round() as u64,
            engagement_per_post: metrics.value(ENGAGEMENT_PER_POST),
            views_per_post: metrics.value(VIEWS_PER_POST),
        }
    }
}

/// Final comparison table row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedPartyRow {
    #[serde(rename = "PARTITO")]
    pub party: String,
    #[serde(rename = "NUMERO_POST_TIKTOK")]
    pub posts: u64,
    #[serde(rename = "TOTALE_VIEWS_TIKTOK")]
    pub views: i64,
    #[serde(rename = "TOTALE_LIKES")]
    pub likes: i64,
    #[serde(rename = "TOTALE_SHARES")]
    pub shares: i64,
    #[serde(rename = "TOTALE_COMMENTS")]
    pub comments: i64,
    #[serde(rename = "ENGAGEMENT_TOTALE")]
    pub engagement: i64,
    #[serde(rename = "TOTALE_VOTI_LISTA")]
    pub votes: i64,
    #[serde(rename = "PERCENTUALE_VOTI")]
    pub vote_share: f64,
}

// ============================================================================
// RUN REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub records: usize,
    pub unique_identities: usize,
    pub matched_identities: usize,
    pub cache_hits: usize,
    pub malformed_cells: usize,
    pub discarded_no_match: usize,
    pub discarded_no_party: usize,
    pub discarded_not_in_election: usize,
    pub social_parties: usize,
    pub electoral_parties: usize,
    pub joined_parties: usize,
    pub total_posts: u64,
    pub total_votes: i64,
}

impl RunReport {
    fn new() -> Self {
        RunReport {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            records: 0,
            unique_identities: 0,
            matched_identities: 0,
            cache_hits: 0,
            malformed_cells: 0,
            discarded_no_match: 0,
            discarded_no_party: 0,
            discarded_not_in_election: 0,
            social_parties: 0,
            electoral_parties: 0,
            joined_parties: 0,
            total_posts: 0,
            total_votes: 0,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Run {}: {} records, {}/{} identities matched, {} parties joined, {} posts, {} votes",
            self.run_id,
            self.records,
            self.matched_identities,
            self.unique_identities,
            self.joined_parties,
            self.total_posts,
            self.total_votes
        )
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub resolved: Vec<ResolvedRecord>,
    pub social: Vec<SocialPartyRow>,
    pub merged: Vec<MergedPartyRow>,
    pub states: BTreeMap<String, IdentityState>,
    pub report: RunReport,
}

// ============================================================================
// AGGREGATION SETUP
// ============================================================================

/// Per-party social metrics, sorted by total engagement
pub fn social_engine() -> AggregationEngine {
    AggregationEngine::new(vec![
        MetricSpec::count(POSTS),
        MetricSpec::sum(VIEWS, COL_PLAYCOUNT),
        MetricSpec::sum(LIKES, COL_DIGGCOUNT),
        MetricSpec::sum(SHARES, COL_SHARECOUNT),
        MetricSpec::sum(COMMENTS, COL_COMMENTCOUNT),
        MetricSpec::sum(ENGAGEMENT, ROW_ENGAGEMENT),
        MetricSpec::count_distinct(POLITICIANS, TAG_POLITICIAN),
    ])
    .with_derived(vec![
        DerivedMetric::ratio(ENGAGEMENT_PER_POST, ENGAGEMENT, POSTS),
        DerivedMetric::ratio(VIEWS_PER_POST, VIEWS, POSTS),
    ])
    .sort_by(ENGAGEMENT)
}

/// Per-party vote totals, sorted by votes
pub fn election_engine() -> AggregationEngine {
    AggregationEngine::new(vec![MetricSpec::sum(VOTES, ROW_VOTES)]).sort_by(VOTES)
}

fn social_metric_row(party: &str, politician: &str, record: &SocialRecord) -> MetricRow {
    let engagement = record.diggcount.unwrap_or(0.0)
        + record.sharecount.unwrap_or(0.0)
        + record.commentcount.unwrap_or(0.0);

    MetricRow::new(party)
        .with_metric(COL_PLAYCOUNT, record.playcount)
        .with_metric(COL_DIGGCOUNT, record.diggcount)
        .with_metric(COL_SHARECOUNT, record.sharecount)
        .with_metric(COL_COMMENTCOUNT, record.commentcount)
        .with_metric(ROW_ENGAGEMENT, Some(engagement))
        .with_tag(TAG_POLITICIAN, politician)
}

// ============================================================================
// MERGE PIPELINE
// ============================================================================

pub struct MergePipeline<'a> {
    roster: &'a Roster,
    dictionary: &'a PartyDictionary,
    pub match_threshold: u8,
}

impl<'a> MergePipeline<'a> {
    pub fn new(roster: &'a Roster, dictionary: &'a PartyDictionary) -> Self {
        MergePipeline {
            roster,
            dictionary,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.match_threshold = threshold;
        self
    }

    /// Stage 1: match every record's identity, scoring each identity once
    pub fn resolve_identities(
        &self,
        records: &[SocialRecord],
        cache: &mut MatchCache,
    ) -> Vec<ResolvedRecord> {
        let matcher = FuzzyMatcher::with_threshold(self.roster, self.match_threshold);

        records
            .iter()
            .map(|record| {
                let identity = RawIdentity::new(&record.username, &record.display_name);
                let result = cache.resolve(&identity, &matcher).clone();
                ResolvedRecord {
                    identity_key: result.identity_key.clone(),
                    result,
                }
            })
            .collect()
    }

    /// Run all stages
    ///
    /// `mapping`, when present, supplies the party label for politicians it
    /// lists; everyone else keeps the roster party.
    pub fn run(
        &self,
        records: &[SocialRecord],
        elections: &[ElectionResult],
        mapping: Option<&PartyMapping>,
        cache: &mut MatchCache,
    ) -> Result<PipelineOutput, PipelineError> {
        let mut report = RunReport::new();
        report.records = records.len();
        let hits_before = cache.hits();

        // 1. Resolve identities
        let resolved = self.resolve_identities(records, cache);
        report.cache_hits = cache.hits() - hits_before;

        let mut states: BTreeMap<String, IdentityState> = BTreeMap::new();
        for record in &resolved {
            states.entry(record.identity_key.clone()).or_insert_with(|| {
                if record.result.matched {
                    IdentityState::Resolved
                } else {
                    IdentityState::Discarded(DiscardReason::NoMatch)
                }
            });
        }
        report.unique_identities = states.len();
        report.matched_identities = states
            .values()
            .filter(|s| **s == IdentityState::Resolved)
            .count();
        info!(
            "🔍 Stage 1: {}/{} identities matched",
            report.matched_identities, report.unique_identities
        );

        // 2. Canonicalize party labels
        let canonicalizer = PartyCanonicalizer::new(self.dictionary);
        let mut social_rows = Vec::new();
        let mut party_cache: HashMap<String, String> = HashMap::new();

        for (record, resolved) in records.iter().zip(&resolved) {
            let result = &resolved.result;
            if !result.matched {
                continue;
            }
            let politician = result.canonical_name.as_deref().unwrap_or("");
            let label = mapping
                .and_then(|m| m.official_party(politician))
                .or(result.party_label.as_deref())
                .unwrap_or("");

            let party = party_cache
                .entry(label.to_string())
                .or_insert_with(|| {
                    let resolution = canonicalizer.resolve(label);
                    if resolution.tier == ResolutionTier::Passthrough && !label.trim().is_empty() {
                        warn!("⚠️  Party label not in dictionary: '{}'", label);
                    }
                    resolution.canonical
                })
                .clone();

            if party.is_empty() {
                states.insert(
                    resolved.identity_key.clone(),
                    IdentityState::Discarded(DiscardReason::NoParty),
                );
                continue;
            }

            states.insert(
                resolved.identity_key.clone(),
                IdentityState::CanonicalParty(party.clone()),
            );
            social_rows.push(social_metric_row(&party, politician, record));
        }
        info!(
            "🏷️  Stage 2: {} records carry a canonical party",
            social_rows.len()
        );

        // 3. Social aggregate
        let social = social_engine().aggregate(&social_rows);
        report.social_parties = social.len();
        info!("📱 Stage 3: {} parties with social activity", social.len());

        // 4. Electoral aggregate
        let election_rows: Vec<MetricRow> = elections
            .iter()
            .map(|result| {
                MetricRow::new(&canonicalizer.canonicalize(&result.party_label))
                    .with_metric(ROW_VOTES, Some(result.votes))
            })
            .collect();
        let electoral: Vec<AggregatedPartyMetrics> = election_engine()
            .aggregate(&election_rows)
            .into_iter()
            .filter(|party| party.value(VOTES) > 0.0)
            .collect();
        report.electoral_parties = electoral.len();
        info!("🗳️  Stage 4: {} parties with votes", electoral.len());

        // 5. Inner join
        let votes_by_party: HashMap<&str, f64> = electoral
            .iter()
            .map(|party| (party.party.as_str(), party.value(VOTES)))
            .collect();

        let joined: Vec<(&AggregatedPartyMetrics, f64)> = social
            .iter()
            .filter_map(|party| {
                votes_by_party
                    .get(party.party.as_str())
                    .map(|votes| (party, *votes))
            })
            .collect();

        if joined.is_empty() {
            let social_parties: Vec<String> = social.iter().map(|p| p.party.clone()).collect();
            let electoral_parties: Vec<String> =
                electoral.iter().map(|p| p.party.clone()).collect();
            warn!("❌ Social parties: {:?}", social_parties);
            warn!("❌ Electoral parties: {:?}", electoral_parties);
            return Err(PipelineError::EmptyJoinResult {
                social_parties,
                electoral_parties,
            });
        }

        // 6. Vote shares over surviving parties
        let total_votes: f64 = joined.iter().map(|(_, votes)| votes).sum();
        let mut merged: Vec<MergedPartyRow> = joined
            .iter()
            .map(|(metrics, votes)| {
                let social_row = SocialPartyRow::from(*metrics);
                MergedPartyRow {
                    party: social_row.party,
                    posts: social_row.posts,
                    views: social_row.views,
                    likes: social_row.likes,
                    shares: social_row.shares,
                    comments: social_row.comments,
                    engagement: social_row.engagement,
                    votes: votes.round() as i64,
                    vote_share: safe_ratio(*votes, total_votes) * 100.0,
                }
            })
            .collect();

        // 7. Sort by votes
        merged.sort_by(|a, b| b.votes.cmp(&a.votes).then_with(|| a.party.cmp(&b.party)));

        let joined_parties: BTreeSet<&str> = merged.iter().map(|row| row.party.as_str()).collect();
        for state in states.values_mut() {
            let next = match state {
                IdentityState::CanonicalParty(party) if joined_parties.contains(party.as_str()) => {
                    IdentityState::AggregatedInto(party.clone())
                }
                IdentityState::CanonicalParty(_) => {
                    IdentityState::Discarded(DiscardReason::PartyNotInElection)
                }
                _ => continue,
            };
            *state = next;
        }

        for state in states.values() {
            match state {
                IdentityState::Discarded(DiscardReason::NoMatch) => report.discarded_no_match += 1,
                IdentityState::Discarded(DiscardReason::NoParty) => report.discarded_no_party += 1,
                IdentityState::Discarded(DiscardReason::PartyNotInElection) => {
                    report.discarded_not_in_election += 1
                }
                _ => {}
            }
        }

        report.joined_parties = merged.len();
        report.total_posts = merged.iter().map(|row| row.posts).sum();
        report.total_votes = merged.iter().map(|row| row.votes).sum();
        info!("🔗 Stage 5-7: {}", report.summary());

        Ok(PipelineOutput {
            resolved,
            social: social.iter().map(SocialPartyRow::from).collect(),
            merged,
            states,
            report,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
