// 🚨 Pipeline Errors - Named failure states
//
// Two classes:
// - Fatal: a mandatory source is missing, or the join produced nothing.
//   These propagate to the caller and no partial output is written.
// - Recoverable: a missing optional source or a malformed numeric cell.
//   These are logged and absorbed with a documented default.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A mandatory input is absent or unreadable
    #[error("required source '{source_name}' is missing or unreadable ({path:?}): {reason}")]
    MissingRequiredSource {
        source_name: &'static str,
        path: PathBuf,
        reason: String,
    },

    /// A mandatory input is readable but lacks a column the pipeline needs
    #[error("required source '{source_name}' has no '{column}' column")]
    MissingColumn {
        source_name: &'static str,
        column: &'static str,
    },

    /// Optional mapping file absent: the pipeline falls back to roster parties
    #[error("optional source not found at {path:?}, continuing without it")]
    MissingOptionalSource { path: PathBuf },

    /// Social and electoral aggregates share no canonical party
    #[error(
        "no canonical party is present in both sources ({} social, {} electoral)",
        social_parties.len(),
        electoral_parties.len()
    )]
    EmptyJoinResult {
        social_parties: Vec<String>,
        electoral_parties: Vec<String>,
    },

    /// Non-numeric metric value, coerced to zero
    #[error("malformed numeric value '{value}' in column '{column}' at line {line}, using 0")]
    MalformedNumericField {
        column: String,
        line: u64,
        value: String,
    },
}

impl PipelineError {
    /// Fatal errors abort the run; the others are absorbed with a default
    pub fn is_fatal(&self) -> bool {
        match self {
            PipelineError::MissingRequiredSource { .. }
            | PipelineError::MissingColumn { .. }
            | PipelineError::EmptyJoinResult { .. } => true,
            PipelineError::MissingOptionalSource { .. }
            | PipelineError::MalformedNumericField { .. } => false,
        }
    }
}
