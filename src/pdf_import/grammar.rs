//! Transaction line grammar
//!
//! Finds `(date, description, amount)` candidates in OCR text of pt-BR
//! statements, e.g. `5 de mar. 2024 UBER *TRIP SAO PAULO R$ 1.234,56`.

use super::error::DocumentError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default pattern for narrative statement lines.
///
/// The amount group is loose on purpose: malformed amounts still become
/// candidates so the normalizer can count them as dropped.
pub const PT_BR_LINE_PATTERN: &str = r"\b(?P<date>\d{1,2} de \p{Ll}{3}\. \d{4})[ \t]+(?P<description>[\p{L}\d \t*().\-]+?)[ \t]+(?P<amount>-?[ \t]?R\$[ \t]?-?[\d.,]+)";

const GROUPS: [&str; 3] = ["date", "description", "amount"];

/// Raw substrings of one grammar match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateMatch {
    pub date_phrase: String,
    pub description: String,
    pub amount_phrase: String,
}

#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("invalid transaction pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("transaction pattern is missing the '{0}' capture group")]
    MissingGroup(&'static str),
}

/// Immutable compiled grammar, injected into the pipeline
#[derive(Debug, Clone)]
pub struct TransactionGrammar {
    line_re: Regex,
}

impl TransactionGrammar {
    /// Compile a custom pattern; it must define `date`, `description` and
    /// `amount` named groups.
    pub fn new(pattern: &str) -> Result<Self, GrammarError> {
        let line_re = Regex::new(pattern)?;
        let names: Vec<&str> = line_re.capture_names().flatten().collect();
        for group in GROUPS {
            if !names.contains(&group) {
                return Err(GrammarError::MissingGroup(group));
            }
        }
        Ok(Self { line_re })
    }

    /// Grammar for Brazilian narrative transaction lines
    pub fn pt_br() -> Result<Self, GrammarError> {
        Self::new(PT_BR_LINE_PATTERN)
    }

    pub fn pattern(&self) -> &str {
        self.line_re.as_str()
    }

    /// Scan text for candidates in order of first occurrence.
    ///
    /// Text that does not match is ignored. A match lacking one of the
    /// groups means the engine misbehaved and fails the document.
    pub fn find_candidates(&self, text: &str) -> Result<Vec<CandidateMatch>, DocumentError> {
        self.line_re
            .captures_iter(text)
            .map(|caps| -> Result<CandidateMatch, DocumentError> {
                let group = |name: &str| {
                    caps.name(name)
                        .map(|m| m.as_str().to_string())
                        .ok_or_else(|| {
                            DocumentError::Matching(format!(
                                "match at byte {} has no '{}' group",
                                caps.get(0).map(|m| m.start()).unwrap_or_default(),
                                name
                            ))
                        })
                };

                Ok(CandidateMatch {
                    date_phrase: group("date")?,
                    description: group("description")?,
                    amount_phrase: group("amount")?,
                })
            })
            .collect()
    }
}
