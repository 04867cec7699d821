//! Error taxonomy of the import pipeline
//!
//! Call-level errors abort the whole import, document-level errors end one
//! document's run, and candidate-level errors only drop a single match.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that abort an entire import call before any document is processed
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("user '{0}' not found")]
    UnknownUser(String),

    #[error("user '{0}' is inactive")]
    InactiveUser(String),

    #[error("user lookup failed")]
    UserLookup(#[source] anyhow::Error),
}

/// Failure while enumerating candidate documents
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to walk {path}: {message}")]
    Walk { path: PathBuf, message: String },

    #[error("rejected upload '{file_name}': {reason}")]
    InvalidUpload { file_name: String, reason: String },

    #[error("failed to stage upload '{file_name}': {source}")]
    Staging {
        file_name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Fatal failure for one document; the remaining documents still run
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("rasterization failed: {0}")]
    Rasterization(String),

    #[error("text extraction failed: {0}")]
    Extraction(String),

    #[error("transaction matching failed: {0}")]
    Matching(String),

    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("document processing timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// A candidate whose date or amount phrase could not be normalized
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed date phrase '{0}'")]
    MalformedDate(String),

    #[error("unknown month token '{0}'")]
    UnknownMonth(String),

    #[error("invalid calendar date '{0}'")]
    InvalidDate(String),

    #[error("unparsable amount '{0}'")]
    InvalidAmount(String),
}

/// A normalized candidate that violates an expense invariant
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(f64),

    #[error("user id is empty")]
    MissingUserId,

    #[error("category id is empty")]
    MissingCategoryId,

    #[error("notes exceed {max} characters ({len})")]
    NotesTooLong { len: usize, max: usize },
}

/// Failure to remove a document's scratch directory
#[derive(Debug, Error)]
#[error("failed to remove scratch directory {path}: {source}")]
pub struct CleanupError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Why a candidate was dropped, keyed for the summary counters
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DropReason {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl DropReason {
    /// Stable counter key used in import summaries
    pub fn key(&self) -> &'static str {
        match self {
            Self::Parse(ParseError::MalformedDate(_)) => "malformed_date",
            Self::Parse(ParseError::UnknownMonth(_)) => "unknown_month",
            Self::Parse(ParseError::InvalidDate(_)) => "invalid_date",
            Self::Parse(ParseError::InvalidAmount(_)) => "invalid_amount",
            Self::Validation(ValidationError::NonPositiveAmount(_)) => "non_positive_amount",
            Self::Validation(ValidationError::MissingUserId) => "missing_user_id",
            Self::Validation(ValidationError::MissingCategoryId) => "missing_category_id",
            Self::Validation(ValidationError::NotesTooLong { .. }) => "notes_too_long",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_reason_keys() {
        let reason: DropReason = ParseError::UnknownMonth("xyz.".into()).into();
        assert_eq!(reason.key(), "unknown_month");

        let reason: DropReason = ValidationError::NotesTooLong { len: 201, max: 200 }.into();
        assert_eq!(reason.key(), "notes_too_long");
        assert_eq!(reason.to_string(), "notes exceed 200 characters (201)");
    }

    #[test]
    fn test_timeout_message() {
        let err = DocumentError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "document processing timed out after 30s");
    }
}
