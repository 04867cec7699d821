//! Locale normalization of candidate phrases
//!
//! Turns `5 de mar. 2024` into a calendar date and `R$ 1.234,56` into a
//! decimal amount.

use super::error::ParseError;
use super::grammar::CandidateMatch;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A candidate whose date and amount both parsed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedTransaction {
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
}

/// Month abbreviation table (`"mar."` -> `"03"`)
#[derive(Debug, Clone)]
pub struct MonthTable {
    months: HashMap<String, String>,
}

impl MonthTable {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            months: entries
                .into_iter()
                .map(|(k, v)| (k.into().to_lowercase(), v.into()))
                .collect(),
        }
    }

    /// Portuguese three-letter abbreviations with trailing period
    pub fn pt_br() -> Self {
        Self::new([
            ("jan.", "01"),
            ("fev.", "02"),
            ("mar.", "03"),
            ("abr.", "04"),
            ("mai.", "05"),
            ("jun.", "06"),
            ("jul.", "07"),
            ("ago.", "08"),
            ("set.", "09"),
            ("out.", "10"),
            ("nov.", "11"),
            ("dez.", "12"),
        ])
    }

    pub fn month(&self, token: &str) -> Option<&str> {
        self.months.get(&token.to_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }
}

/// Normalizer configured with an injected month table
#[derive(Debug, Clone)]
pub struct LocaleNormalizer {
    months: MonthTable,
}

impl LocaleNormalizer {
    pub fn new(months: MonthTable) -> Self {
        Self { months }
    }

    pub fn pt_br() -> Self {
        Self::new(MonthTable::pt_br())
    }

    /// Normalize one candidate; either phrase failing drops it
    pub fn normalize(&self, candidate: &CandidateMatch) -> Result<NormalizedTransaction, ParseError> {
        let date = self.parse_date_phrase(&candidate.date_phrase)?;
        let amount = parse_brl_amount(&candidate.amount_phrase)?;

        Ok(NormalizedTransaction {
            date,
            description: candidate.description.trim().to_string(),
            amount,
        })
    }

    /// Parse `D[D] de MMM. YYYY` using the month table
    pub fn parse_date_phrase(&self, phrase: &str) -> Result<NaiveDate, ParseError> {
        let tokens: Vec<&str> = phrase.split_whitespace().collect();
        let [day, de, month, year] = tokens.as_slice() else {
            return Err(ParseError::MalformedDate(phrase.to_string()));
        };
        if !de.eq_ignore_ascii_case("de") {
            return Err(ParseError::MalformedDate(phrase.to_string()));
        }

        let month = self
            .months
            .month(month)
            .ok_or_else(|| ParseError::UnknownMonth(month.to_string()))?;

        let reassembled = format!("{}-{}-{}", day, month, year);
        NaiveDate::parse_from_str(&reassembled, "%d-%m-%Y")
            .map_err(|_| ParseError::InvalidDate(phrase.to_string()))
    }
}

/// Parse a Brazilian currency amount (`R$ 1.234,56` -> 1234.56)
pub fn parse_brl_amount(phrase: &str) -> Result<f64, ParseError> {
    let cleaned: String = phrase
        .replace("R$", "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let cleaned = cleaned
        .replace('.', "") // Remove thousand separators
        .replace(',', "."); // Convert decimal separator

    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ParseError::InvalidAmount(phrase.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(date: &str, description: &str, amount: &str) -> CandidateMatch {
        CandidateMatch {
            date_phrase: date.to_string(),
            description: description.to_string(),
            amount_phrase: amount.to_string(),
        }
    }

    #[test]
    fn test_parse_date_phrase() {
        let normalizer = LocaleNormalizer::pt_br();
        assert_eq!(
            normalizer.parse_date_phrase("5 de mar. 2024"),
            Ok(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap())
        );
        assert_eq!(
            normalizer.parse_date_phrase("31 de dez. 2023"),
            Ok(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap())
        );
    }

    #[test]
    fn test_every_month_in_table() {
        let normalizer = LocaleNormalizer::pt_br();
        let tokens = [
            "jan.", "fev.", "mar.", "abr.", "mai.", "jun.", "jul.", "ago.", "set.", "out.", "nov.",
            "dez.",
        ];
        for (i, token) in tokens.iter().enumerate() {
            let date = normalizer
                .parse_date_phrase(&format!("15 de {} 2024", token))
                .unwrap();
            assert_eq!(date, NaiveDate::from_ymd_opt(2024, i as u32 + 1, 15).unwrap());
        }
    }

    #[test]
    fn test_parse_date_phrase_errors() {
        let normalizer = LocaleNormalizer::pt_br();
        assert_eq!(
            normalizer.parse_date_phrase("5 de xyz. 2024"),
            Err(ParseError::UnknownMonth("xyz.".to_string()))
        );
        assert_eq!(
            normalizer.parse_date_phrase("31 de fev. 2024"),
            Err(ParseError::InvalidDate("31 de fev. 2024".to_string()))
        );
        assert_eq!(
            normalizer.parse_date_phrase("5 mar. 2024"),
            Err(ParseError::MalformedDate("5 mar. 2024".to_string()))
        );
        assert_eq!(
            normalizer.parse_date_phrase("5 em mar. 2024"),
            Err(ParseError::MalformedDate("5 em mar. 2024".to_string()))
        );
    }

    #[test]
    fn test_custom_month_table() {
        let normalizer = LocaleNormalizer::new(MonthTable::new([("mär.", "03")]));
        assert_eq!(
            normalizer.parse_date_phrase("1 de MÄR. 2022"),
            Ok(NaiveDate::from_ymd_opt(2022, 3, 1).unwrap())
        );
        assert!(normalizer.parse_date_phrase("1 de mar. 2022").is_err());
    }

    #[test]
    fn test_parse_brl_amount() {
        assert_eq!(parse_brl_amount("R$ 1.234,56"), Ok(1234.56));
        assert_eq!(parse_brl_amount("R$ 1.234.567,89"), Ok(1234567.89));
        assert_eq!(parse_brl_amount("R$ 23,90"), Ok(23.90));
        assert_eq!(parse_brl_amount("-R$ 10,00"), Ok(-10.0));
        assert_eq!(parse_brl_amount("R$0,01"), Ok(0.01));
    }

    #[test]
    fn test_parse_brl_amount_errors() {
        assert!(parse_brl_amount("R$ 1,2,3").is_err());
        assert!(parse_brl_amount("R$ ").is_err());
        assert!(parse_brl_amount("R$ ,").is_err());
    }

    #[test]
    fn test_normalize_candidate() {
        let normalizer = LocaleNormalizer::pt_br();
        let tx = normalizer
            .normalize(&candidate("5 de mar. 2024", "  UBER *TRIP ", "R$ 1.234,56"))
            .unwrap();

        assert_eq!(tx.date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert_eq!(tx.description, "UBER *TRIP");
        assert_eq!(tx.amount, 1234.56);

        assert_eq!(
            normalizer.normalize(&candidate("5 de mar. 2024", "LOJA", "R$ 1,2,3")),
            Err(ParseError::InvalidAmount("R$ 1,2,3".to_string()))
        );
    }
}
