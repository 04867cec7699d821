use crate::pdf_import::error::ValidationError;
use crate::pdf_import::normalize::NormalizedTransaction;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length of expense notes, in characters
pub const MAX_NOTES_LEN: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub active: bool,
}

/// What to do with a description longer than [`MAX_NOTES_LEN`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotesOverflow {
    /// Drop the candidate, like the rest of the expense domain does
    #[default]
    Reject,
    /// Keep the first [`MAX_NOTES_LEN`] characters
    Truncate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseRecord {
    pub id: String,
    pub user_id: String,
    pub amount: f64,
    pub category_id: String,
    pub notes: String,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub active: bool,
}

impl ExpenseRecord {
    /// Build an expense from a normalized statement line.
    ///
    /// This is the only place import records are created, so every
    /// invariant is checked here.
    pub fn new(
        tx: NormalizedTransaction,
        user_id: &str,
        category_id: &str,
        overflow: NotesOverflow,
    ) -> Result<Self, ValidationError> {
        if tx.amount.is_nan() || tx.amount <= 0.0 {
            return Err(ValidationError::NonPositiveAmount(tx.amount));
        }
        if user_id.trim().is_empty() {
            return Err(ValidationError::MissingUserId);
        }
        if category_id.trim().is_empty() {
            return Err(ValidationError::MissingCategoryId);
        }

        let notes = tx.description.trim();
        let len = notes.chars().count();
        let notes = if len <= MAX_NOTES_LEN {
            notes.to_string()
        } else {
            match overflow {
                NotesOverflow::Reject => {
                    return Err(ValidationError::NotesTooLong {
                        len,
                        max: MAX_NOTES_LEN,
                    })
                }
                NotesOverflow::Truncate => notes.chars().take(MAX_NOTES_LEN).collect(),
            }
        };

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            amount: tx.amount,
            category_id: category_id.to_string(),
            notes,
            date: tx.date,
            created_at: Utc::now(),
            active: true,
        })
    }
}

/// Expenses derived from one statement document, persisted as a unit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBatch {
    pub user_id: String,
    pub source_file: String,
    pub records: Vec<ExpenseRecord>,
}
