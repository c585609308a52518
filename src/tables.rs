// 📂 Tables - CSV sources and output products
//
// Thin I/O layer around the in-memory pipeline. Loaders map "file missing or
// unreadable" to named PipelineError variants, except the optional party
// mapping, which degrades to None; malformed numeric cells are coerced to 0
// and logged. Writers return anyhow errors with context.

use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, Writer};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::entities::{ReferenceEntity, Roster};
use crate::error::PipelineError;
use crate::party_mapping::{PartyMapping, PartyMappingRow};
use crate::pipeline::{MergedPartyRow, ResolvedRecord, SocialPartyRow};

// Social record columns
pub const COL_USERNAME: &str = "author_username";
pub const COL_DISPLAY_NAME: &str = "author_name";
pub const COL_VIDEO_ID: &str = "video_id";
pub const COL_PLAYCOUNT: &str = "video_playcount";
pub const COL_DIGGCOUNT: &str = "video_diggcount";
pub const COL_SHARECOUNT: &str = "video_sharecount";
pub const COL_COMMENTCOUNT: &str = "video_commentcount";

// Electoral columns
pub const COL_LIST: &str = "LISTA";
pub const COL_VOTES: &str = "VOTI LISTE";

/// Columns appended to the social records in the resolved-identity table
pub const RESOLVED_COLUMNS: [&str; 6] = [
    "NOME_POLITICO_REALE",
    "TWITTER_HANDLE_REALE",
    "PARTITO_REALE",
    "GENERE",
    "MATCH_SCORE",
    "MATCHED",
];

// ============================================================================
// SOURCE ROWS
// ============================================================================

/// One social post with the fields the pipeline reads
///
/// `original` keeps every cell of the source row, in source column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SocialRecord {
    pub username: String,
    pub display_name: String,
    pub video_id: String,
    pub playcount: Option<f64>,
    pub diggcount: Option<f64>,
    pub sharecount: Option<f64>,
    pub commentcount: Option<f64>,
    pub original: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SocialDataset {
    pub headers: Vec<String>,
    pub records: Vec<SocialRecord>,
    pub stats: LoadStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionResult {
    pub party_label: String,
    pub votes: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ElectionDataset {
    pub results: Vec<ElectionResult>,
    pub stats: LoadStats,
}

/// Recoverable issues seen while loading a source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub rows: usize,
    pub malformed_numeric: usize,
}

// ============================================================================
// NUMERIC CELLS
// ============================================================================

/// Parse a nullable numeric cell
///
/// Empty / "nan" → None. Anything else that fails to parse is coerced to 0.
pub fn parse_metric(raw: &str, column: &str, line: u64, stats: &mut LoadStats) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return None;
    }

    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value),
        _ => {
            let issue = PipelineError::MalformedNumericField {
                column: column.to_string(),
                line,
                value: trimmed.to_string(),
            };
            warn!("⚠️  {}", issue);
            stats.malformed_numeric += 1;
            Some(0.0)
        }
    }
}

fn column_index(headers: &StringRecord, column: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == column)
}

fn required_column(
    headers: &StringRecord,
    source_name: &'static str,
    column: &'static str,
) -> Result<usize, PipelineError> {
    column_index(headers, column).ok_or(PipelineError::MissingColumn {
        source_name,
        column,
    })
}

fn unreadable(source_name: &'static str, path: &Path, err: impl ToString) -> PipelineError {
    PipelineError::MissingRequiredSource {
        source_name,
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

// ============================================================================
// LOADERS
// ============================================================================

/// Load social posts; numeric columns may be absent or empty
pub fn load_social_records(path: &Path) -> Result<SocialDataset, PipelineError> {
    const SOURCE: &str = "social records";

    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| unreadable(SOURCE, path, e))?;
    let headers = rdr.headers().map_err(|e| unreadable(SOURCE, path, e))?.clone();

    let username_idx = required_column(&headers, SOURCE, COL_USERNAME)?;
    let display_idx = required_column(&headers, SOURCE, COL_DISPLAY_NAME)?;
    let video_idx = column_index(&headers, COL_VIDEO_ID);
    let numeric_idx = [COL_PLAYCOUNT, COL_DIGGCOUNT, COL_SHARECOUNT, COL_COMMENTCOUNT]
        .map(|column| (column, column_index(&headers, column)));

    let mut stats = LoadStats::default();
    let mut records = Vec::new();

    for result in rdr.records() {
        let row = result.map_err(|e| unreadable(SOURCE, path, e))?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        let cell = |idx: Option<usize>| idx.and_then(|i| row.get(i)).unwrap_or("").to_string();

        let [play, digg, share, comment] = numeric_idx.map(|(column, idx)| {
            parse_metric(&cell(idx), column, line, &mut stats)
        });

        records.push(SocialRecord {
            username: cell(Some(username_idx)),
            display_name: cell(Some(display_idx)),
            video_id: cell(video_idx),
            playcount: play,
            diggcount: digg,
            sharecount: share,
            commentcount: comment,
            original: row.iter().map(str::to_string).collect(),
        });
    }

    stats.rows = records.len();
    info!("✓ Loaded {} social records from {:?}", records.len(), path);

    Ok(SocialDataset {
        headers: headers.iter().map(str::to_string).collect(),
        records,
        stats,
    })
}

/// Load the representatives roster, keeping file order
pub fn load_roster(path: &Path) -> Result<Roster, PipelineError> {
    const SOURCE: &str = "roster";

    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| unreadable(SOURCE, path, e))?;
    let headers = rdr.headers().map_err(|e| unreadable(SOURCE, path, e))?.clone();
    required_column(&headers, SOURCE, "Name")?;
    required_column(&headers, SOURCE, "Party")?;

    let mut entities = Vec::new();
    for result in rdr.deserialize() {
        let entity: ReferenceEntity = result.map_err(|e| unreadable(SOURCE, path, e))?;
        entities.push(entity);
    }

    info!("✓ Loaded {} roster entries from {:?}", entities.len(), path);
    Ok(Roster::new(entities))
}

/// Load electoral list results
pub fn load_election_results(path: &Path, delimiter: u8) -> Result<ElectionDataset, PipelineError> {
    const SOURCE: &str = "electoral results";

    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)
        .map_err(|e| unreadable(SOURCE, path, e))?;
    let headers = rdr.headers().map_err(|e| unreadable(SOURCE, path, e))?.clone();
    let list_idx = required_column(&headers, SOURCE, COL_LIST)?;
    let votes_idx = required_column(&headers, SOURCE, COL_VOTES)?;

    let mut stats = LoadStats::default();
    let mut results = Vec::new();

    for result in rdr.records() {
        let row = result.map_err(|e| unreadable(SOURCE, path, e))?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        let votes = parse_metric(row.get(votes_idx).unwrap_or(""), COL_VOTES, line, &mut stats);

        results.push(ElectionResult {
            party_label: row.get(list_idx).unwrap_or("").to_string(),
            votes: votes.unwrap_or(0.0),
        });
    }

    stats.rows = results.len();
    info!("✓ Loaded {} electoral rows from {:?}", results.len(), path);

    Ok(ElectionDataset { results, stats })
}

/// Load the politician → official party mapping, if present
///
/// The mapping is optional: a missing or unreadable file yields `None` and
/// rows that fail to parse are skipped, each with a warning.
pub fn load_party_mapping(path: &Path) -> Result<Option<PartyMapping>, PipelineError> {
    if !path.exists() {
        let issue = PipelineError::MissingOptionalSource {
            path: path.to_path_buf(),
        };
        warn!("⚠️  {}", issue);
        return Ok(None);
    }

    let mut rdr = match ReaderBuilder::new().flexible(true).from_path(path) {
        Ok(rdr) => rdr,
        Err(e) => {
            warn!("⚠️  Party mapping {:?} unreadable, continuing without it: {}", path, e);
            return Ok(None);
        }
    };

    let mut rows = Vec::new();
    for result in rdr.deserialize::<PartyMappingRow>() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => warn!("⚠️  Skipping party mapping row in {:?}: {}", path, e),
        }
    }

    info!("✓ Loaded party mapping for {} politicians from {:?}", rows.len(), path);
    Ok(Some(PartyMapping::from_rows(rows)))
}

// ============================================================================
// WRITERS
// ============================================================================

/// Social records with the match columns appended
pub fn write_resolved_identities(
    path: &Path,
    dataset: &SocialDataset,
    resolved: &[ResolvedRecord],
) -> Result<()> {
    let mut wtr = Writer::from_path(path)
        .with_context(|| format!("Failed to create resolved-identity table: {:?}", path))?;

    let mut header: Vec<&str> = dataset.headers.iter().map(String::as_str).collect();
    header.extend(RESOLVED_COLUMNS);
    wtr.write_record(&header)?;

    for (record, resolved) in dataset.records.iter().zip(resolved) {
        let mut row: Vec<String> = record.original.clone();
        row.resize(dataset.headers.len(), String::new());

        let result = &resolved.result;
        if result.matched {
            row.push(result.canonical_name.clone().unwrap_or_default());
            row.push(result.handle.clone().unwrap_or_default());
            row.push(result.party_label.clone().unwrap_or_default());
            row.push(result.gender.clone().unwrap_or_default());
            row.push(result.score.to_string());
            row.push("True".to_string());
        } else {
            row.extend(["", "", "", ""].map(String::from));
            row.push("0".to_string());
            row.push("False".to_string());
        }
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write any serializable rows as CSV with a header line
pub fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr =
        Writer::from_path(path).with_context(|| format!("Failed to create output file: {:?}", path))?;
    for row in rows {
        wtr.serialize(row)
            .with_context(|| format!("Failed to write row to {:?}", path))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_party_mapping(path: &Path, rows: &[PartyMappingRow]) -> Result<()> {
    write_rows(path, rows)
}

pub fn write_social_aggregate(path: &Path, rows: &[SocialPartyRow]) -> Result<()> {
    write_rows(path, rows)
}

pub fn write_merged(path: &Path, rows: &[MergedPartyRow]) -> Result<()> {
    write_rows(path, rows)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_file(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_parse_metric_policy() {
        let mut stats = LoadStats::default();

        assert_eq!(parse_metric("12", "c", 1, &mut stats), Some(12.0));
        assert_eq!(parse_metric(" 3.5 ", "c", 1, &mut stats), Some(3.5));
        assert_eq!(parse_metric("", "c", 1, &mut stats), None);
        assert_eq!(parse_metric("NaN", "c", 1, &mut stats), None);
        assert_eq!(stats.malformed_numeric, 0);

        assert_eq!(parse_metric("12k", "c", 1, &mut stats), Some(0.0));
        assert_eq!(stats.malformed_numeric, 1);
    }

    #[test]
    fn test_load_social_records_missing_sharecount() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "social.csv",
            "author_username,author_name,video_id,video_playcount,video_diggcount,video_sharecount,video_commentcount,extra\n\
             giorgiameloni_ufficiale,Giorgia Meloni,v1,100,10,,2,a\n\
             matteosalvini,Matteo Salvini,v2,50,abc,3,1,b\n",
        );

        let dataset = load_social_records(&path).unwrap();
        assert_eq!(dataset.records.len(), 2);
        assert_eq!(dataset.headers.len(), 8);

        let first = &dataset.records[0];
        assert_eq!(first.username, "giorgiameloni_ufficiale");
        assert_eq!(first.sharecount, None);
        assert_eq!(first.playcount, Some(100.0));
        assert_eq!(first.original[7], "a");

        let second = &dataset.records[1];
        assert_eq!(second.diggcount, Some(0.0));
        assert_eq!(dataset.stats.malformed_numeric, 1);
    }

    #[test]
    fn test_load_social_records_without_numeric_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "social.csv", "author_username,author_name\nuser,Name\n");

        let dataset = load_social_records(&path).unwrap();
        assert_eq!(dataset.records[0].playcount, None);
        assert_eq!(dataset.records[0].video_id, "");
    }

    #[test]
    fn test_missing_required_source() {
        let err = load_social_records(Path::new("/nonexistent/social.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::MissingRequiredSource { .. }));
        assert!(err.is_fatal());

        let err = load_roster(Path::new("/nonexistent/roster.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::MissingRequiredSource { source_name: "roster", .. }));
    }

    #[test]
    fn test_missing_required_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "social.csv", "author_username,video_id\nuser,v1\n");

        let err = load_social_records(&path).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MissingColumn {
                column: "author_name",
                ..
            }
        ));
    }

    #[test]
    fn test_load_roster() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "roster.csv",
            "Name,Twitter-Handle,Party,Gender\nGiorgia Meloni,@GiorgiaMeloni,FRATELLI D'ITALIA,F\nMatteo Salvini,,LEGA,M\n",
        );

        let roster = load_roster(&path).unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.entities()[0].party, "FRATELLI D'ITALIA");
        assert_eq!(roster.entities()[1].handle, "");
    }

    #[test]
    fn test_load_election_results_with_semicolons() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "elections.csv",
            "CIRCOSCRIZIONE;LISTA;VOTI LISTE\nLAZIO 1;LEGA PER SALVINI PREMIER;1200\nLAZIO 1;PARTITO DEMOCRATICO;n/a\n",
        );

        let dataset = load_election_results(&path, b';').unwrap();
        assert_eq!(dataset.results.len(), 2);
        assert_eq!(dataset.results[0].party_label, "LEGA PER SALVINI PREMIER");
        assert_eq!(dataset.results[0].votes, 1200.0);
        assert_eq!(dataset.results[1].votes, 0.0);
        assert_eq!(dataset.stats.malformed_numeric, 1);
    }

    #[test]
    fn test_missing_optional_mapping_is_none() {
        let mapping = load_party_mapping(Path::new("/nonexistent/mapping.csv")).unwrap();
        assert!(mapping.is_none());
    }

    #[test]
    fn test_party_mapping_with_float_and_empty_scores() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "mapping.csv",
            "NOME_POLITICO,PARTITO_ORIGINALE,PARTITO_UFFICIALE,MATCH_SCORE_PARTITO\n\
             Giorgia Meloni,fratelli d'italia,fratelli d'italia con giorgia meloni,90.0\n\
             Matteo Salvini,lega,lega per salvini premier,\n\
             Mario Senzapartito,,,\n",
        );

        let mapping = load_party_mapping(&path).unwrap().unwrap();
        assert_eq!(
            mapping.official_party("Giorgia Meloni"),
            Some("fratelli d'italia con giorgia meloni")
        );
        assert_eq!(mapping.official_party("Matteo Salvini"), Some("lega per salvini premier"));
        assert_eq!(mapping.official_party("Mario Senzapartito"), None);
        assert_eq!(mapping.len(), 2);
    }

    #[test]
    fn test_party_mapping_bad_row_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "mapping.csv",
            "NOME_POLITICO,PARTITO_ORIGINALE,PARTITO_UFFICIALE,MATCH_SCORE_PARTITO\n\
             Giorgia Meloni,fdi,FRATELLI D'ITALIA,alto\n\
             Matteo Salvini,lega,LEGA PER SALVINI PREMIER,95\n",
        );

        let mapping = load_party_mapping(&path).unwrap().unwrap();
        assert_eq!(mapping.official_party("Giorgia Meloni"), None);
        assert_eq!(mapping.official_party("Matteo Salvini"), Some("LEGA PER SALVINI PREMIER"));
    }

    #[test]
    fn test_party_mapping_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.csv");
        let rows = vec![PartyMappingRow {
            politician: "Giorgia Meloni".to_string(),
            original_party: "FRATELLI D'ITALIA".to_string(),
            official_party: "FRATELLI D'ITALIA CON GIORGIA MELONI".to_string(),
            score: 96,
        }];

        write_party_mapping(&path, &rows).unwrap();
        let header = fs::read_to_string(&path).unwrap();
        assert!(header.starts_with("NOME_POLITICO,PARTITO_ORIGINALE,PARTITO_UFFICIALE,MATCH_SCORE_PARTITO"));

        let mapping = load_party_mapping(&path).unwrap().unwrap();
        assert_eq!(
            mapping.official_party("Giorgia Meloni"),
            Some("FRATELLI D'ITALIA CON GIORGIA MELONI")
        );
    }
}
