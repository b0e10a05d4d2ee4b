use crate::error::ExtractError;
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

/// The structured record extracted from a transfer-slip image.
///
/// Every field is independently nullable: the extractor never guesses, it
/// reports what it could read. The record is ephemeral; it is produced once
/// per image, consumed by reconciliation, then discarded.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
#[serde(default)]
pub struct SlipRecord {
    pub bank_name: Option<String>,
    #[serde(deserialize_with = "lenient_amount")]
    pub amount: Option<Decimal>,
    #[serde(deserialize_with = "lenient_date")]
    pub transaction_date: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient_time")]
    pub transaction_time: Option<NaiveTime>,
    pub sender: Option<String>,
    pub receiver: Option<String>,
    pub reference_id: Option<String>,
    pub channel: Option<String>,
}

impl SlipRecord {
    /// Parses raw inference output into a record.
    ///
    /// The backend is instructed to return a single JSON object, but vision
    /// models routinely wrap it in markdown code fences; those are stripped
    /// before parsing. Anything that still isn't a single object of the
    /// expected shape is a [`ExtractError::Malformed`], never a guess.
    pub fn parse(raw: &str) -> Result<Self, ExtractError> {
        let cleaned = strip_code_fences(raw);
        serde_json::from_str(cleaned).map_err(|e| ExtractError::Malformed(e.to_string()))
    }
}

/// Removes a surrounding markdown code fence (``` or ```json) if present.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag on the opening fence line.
    let rest = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Coerces the amount to a number. Accepts a JSON number or a numeric
/// string; anything else (including garbled OCR text) means the amount is
/// unknown, not that the record is invalid.
fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(coerce_amount))
}

fn coerce_amount(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        serde_json::Value::String(s) => Decimal::from_str(s.trim().replace(',', "").as_str()).ok(),
        _ => None,
    }
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()))
}

fn lenient_time<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|s| {
            let s = s.trim();
            NaiveTime::parse_from_str(s, "%H:%M")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
                .ok()
        }))
}
