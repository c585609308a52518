use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::{debug, info};
use std::fs;

use party_resolution::config::{
    PipelineConfig, MERGED_FILE, PARTY_MAPPING_FILE, RESOLVED_IDENTITIES_FILE,
    SOCIAL_AGGREGATE_FILE,
};
use party_resolution::{
    load_election_results, load_party_mapping, load_roster, load_social_records,
    write_merged, write_party_mapping, write_resolved_identities, write_social_aggregate,
    ElectionDataset, MatchCache, MergePipeline, PartyDictionary, PartyMapping,
    PartyMappingBuilder, ResolvedRecord, Roster, SocialDataset,
};

#[derive(Parser)]
#[command(author, version, about = "Resolve social accounts to parties and join with election results", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: PipelineConfig,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Match social identities against the roster and write the resolved table
    Resolve,
    /// Resolve, then map each politician's party onto an electoral list
    MapParties,
    /// Aggregate and join with election results, using the mapping file if present
    Merge,
    /// All steps in one run, sharing one match cache (default)
    Run,
}

struct Inputs {
    social: SocialDataset,
    roster: Roster,
    dictionary: PartyDictionary,
}

fn main() -> Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli.config;
    config.validate()?;

    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", config.output_dir))?;

    let inputs = load_inputs(&config)?;
    let mut cache = MatchCache::new();

    match cli.command.unwrap_or(Command::Run) {
        Command::Resolve => {
            resolve(&config, &inputs, &mut cache)?;
        }
        Command::MapParties => {
            let resolved = resolve(&config, &inputs, &mut cache)?;
            let elections = load_elections(&config)?;
            map_parties(&config, &resolved, &elections)?;
        }
        Command::Merge => {
            let elections = load_elections(&config)?;
            let mapping = load_party_mapping(&config.mapping_path())?;
            merge(&config, &inputs, &elections, mapping.as_ref(), &mut cache)?;
        }
        Command::Run => {
            let resolved = resolve(&config, &inputs, &mut cache)?;
            let elections = load_elections(&config)?;
            let mapping = map_parties(&config, &resolved, &elections)?;
            merge(&config, &inputs, &elections, Some(&mapping), &mut cache)?;
        }
    }

    info!(
        "✅ Done: {} identities scored, {} cache hits",
        cache.computed(),
        cache.hits()
    );
    Ok(())
}

fn load_inputs(config: &PipelineConfig) -> Result<Inputs> {
    info!("📂 Loading sources...");
    let social = load_social_records(&config.social)?;
    let roster = load_roster(&config.roster)?;
    let dictionary = config.load_dictionary()?;
    info!(
        "✓ {} social records, {} roster entries, {} dictionary entries",
        social.records.len(),
        roster.len(),
        dictionary.len()
    );

    Ok(Inputs {
        social,
        roster,
        dictionary,
    })
}

fn load_elections(config: &PipelineConfig) -> Result<ElectionDataset> {
    Ok(load_election_results(
        &config.elections,
        config.election_delimiter_byte(),
    )?)
}

fn resolve(
    config: &PipelineConfig,
    inputs: &Inputs,
    cache: &mut MatchCache,
) -> Result<Vec<ResolvedRecord>> {
    info!("🔍 Resolving social identities...");
    let pipeline = MergePipeline::new(&inputs.roster, &inputs.dictionary)
        .with_threshold(config.match_threshold);
    let resolved = pipeline.resolve_identities(&inputs.social.records, cache);

    let matched = resolved.iter().filter(|r| r.result.matched).count();
    info!(
        "✓ {}/{} records matched ({} unique identities)",
        matched,
        resolved.len(),
        cache.computed()
    );

    let path = config.output_path(RESOLVED_IDENTITIES_FILE);
    write_resolved_identities(&path, &inputs.social, &resolved)?;
    info!("💾 Wrote {:?}", path);

    Ok(resolved)
}

fn map_parties(
    config: &PipelineConfig,
    resolved: &[ResolvedRecord],
    elections: &ElectionDataset,
) -> Result<PartyMapping> {
    info!("🔗 Mapping politicians onto electoral lists...");
    let builder = PartyMappingBuilder::new(
        elections.results.iter().map(|r| r.party_label.as_str()),
        config.party_match_threshold,
    );
    let rows = builder.build(resolved.iter().map(|r| &r.result));

    let path = config.output_path(PARTY_MAPPING_FILE);
    write_party_mapping(&path, &rows)?;
    info!("💾 Wrote {:?}", path);

    Ok(PartyMapping::from_rows(rows))
}

fn merge(
    config: &PipelineConfig,
    inputs: &Inputs,
    elections: &ElectionDataset,
    mapping: Option<&PartyMapping>,
    cache: &mut MatchCache,
) -> Result<()> {
    info!("📊 Merging social activity with election results...");
    let pipeline = MergePipeline::new(&inputs.roster, &inputs.dictionary)
        .with_threshold(config.match_threshold);

    let mut output = pipeline.run(&inputs.social.records, &elections.results, mapping, cache)?;
    output.report.malformed_cells =
        inputs.social.stats.malformed_numeric + elections.stats.malformed_numeric;

    let social_path = config.output_path(SOCIAL_AGGREGATE_FILE);
    write_social_aggregate(&social_path, &output.social)?;
    info!("💾 Wrote {:?}", social_path);

    let merged_path = config.output_path(MERGED_FILE);
    write_merged(&merged_path, &output.merged)?;
    info!("💾 Wrote {:?}", merged_path);

    for row in &output.merged {
        info!(
            "   {:<28} {:>6} posts {:>12} engagement {:>10} votes {:>6.2}%",
            row.party, row.posts, row.engagement, row.votes, row.vote_share
        );
    }
    info!("{}", output.report.summary());
    debug!("{}", serde_json::to_string_pretty(&output.report)?);

    Ok(())
}
