// ⚙️ Pipeline Configuration - paths, thresholds, delimiters
//
// Every option can come from the command line or the environment (a `.env`
// file is loaded by the binary before parsing).

use anyhow::{bail, Result};
use clap::Args;
use std::path::PathBuf;

use crate::entities::PartyDictionary;
use crate::matcher::DEFAULT_MATCH_THRESHOLD;
use crate::party_mapping::DEFAULT_PARTY_MATCH_THRESHOLD;

// Output file names, written inside the output directory
pub const RESOLVED_IDENTITIES_FILE: &str = "social_data_con_nomi_reali.csv";
pub const PARTY_MAPPING_FILE: &str = "mapping_politici_partiti_finale.csv";
pub const SOCIAL_AGGREGATE_FILE: &str = "social_metrics_aggregated.csv";
pub const MERGED_FILE: &str = "merged_data.csv";

#[derive(Debug, Clone, Args)]
pub struct PipelineConfig {
    /// Social records CSV
    #[arg(long, env = "SOCIAL_RECORDS", default_value = "data/tiktok_posts.csv")]
    pub social: PathBuf,

    /// Representatives roster CSV (Name, Twitter-Handle, Party, Gender)
    #[arg(long, env = "ROSTER", default_value = "data/politici.csv")]
    pub roster: PathBuf,

    /// Electoral results CSV (LISTA, VOTI LISTE)
    #[arg(long, env = "ELECTION_RESULTS", default_value = "data/risultati_camera.csv")]
    pub elections: PathBuf,

    /// Politician → official party mapping; defaults to the mapping file in the output directory
    #[arg(long, env = "PARTY_MAPPING")]
    pub mapping: Option<PathBuf>,

    /// Party dictionary JSON ([{"label": .., "canonical": ..}]); built-in table when absent
    #[arg(long, env = "PARTY_DICTIONARY")]
    pub dictionary: Option<PathBuf>,

    #[arg(long, env = "OUTPUT_DIR", default_value = "output")]
    pub output_dir: PathBuf,

    /// Minimum score (0-100) for a social identity to match a roster entity
    #[arg(long, env = "MATCH_THRESHOLD", default_value_t = DEFAULT_MATCH_THRESHOLD)]
    pub match_threshold: u8,

    /// Minimum score (0-100) for a party label to map onto an electoral list
    #[arg(long, env = "PARTY_MATCH_THRESHOLD", default_value_t = DEFAULT_PARTY_MATCH_THRESHOLD)]
    pub party_match_threshold: u8,

    /// Field delimiter of the electoral results CSV
    #[arg(long, env = "ELECTION_DELIMITER", default_value_t = ',')]
    pub election_delimiter: char,
}

impl PipelineConfig {
    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.match_threshold > 100 {
            bail!("Match threshold must be 0-100, got {}", self.match_threshold);
        }
        if self.party_match_threshold > 100 {
            bail!(
                "Party match threshold must be 0-100, got {}",
                self.party_match_threshold
            );
        }
        if !self.election_delimiter.is_ascii() {
            bail!(
                "Election delimiter must be a single ASCII character, got {:?}",
                self.election_delimiter
            );
        }
        Ok(())
    }

    pub fn election_delimiter_byte(&self) -> u8 {
        self.election_delimiter as u8
    }

    pub fn mapping_path(&self) -> PathBuf {
        self.mapping
            .clone()
            .unwrap_or_else(|| self.output_dir.join(PARTY_MAPPING_FILE))
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }

    /// Party dictionary from the configured file, or the built-in table
    pub fn load_dictionary(&self) -> Result<PartyDictionary> {
        match &self.dictionary {
            Some(path) => PartyDictionary::from_file(path),
            None => Ok(PartyDictionary::with_defaults()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> PipelineConfig {
        PipelineConfig {
            social: PathBuf::from("social.csv"),
            roster: PathBuf::from("roster.csv"),
            elections: PathBuf::from("elections.csv"),
            mapping: None,
            dictionary: None,
            output_dir: PathBuf::from("out"),
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            party_match_threshold: DEFAULT_PARTY_MATCH_THRESHOLD,
            election_delimiter: ';',
        }
    }

    #[test]
    fn test_mapping_path_defaults_to_output_dir() {
        let mut config = create_test_config();
        assert_eq!(config.mapping_path(), PathBuf::from("out").join(PARTY_MAPPING_FILE));

        config.mapping = Some(PathBuf::from("custom.csv"));
        assert_eq!(config.mapping_path(), PathBuf::from("custom.csv"));
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let mut config = create_test_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.election_delimiter_byte(), b';');

        config.match_threshold = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_ascii_delimiter() {
        let mut config = create_test_config();
        config.election_delimiter = '§';
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_dictionary_defaults() {
        let dictionary = create_test_config().load_dictionary().unwrap();
        assert!(!dictionary.is_empty());
    }
}
