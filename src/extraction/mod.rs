//! Field extraction
//!
//! Turns a free-text utterance into a typed candidate value for one slot.
//! Pure and deterministic: the same text always yields the same result.
//!
//! Numeric slots take the FIRST integer in the text that falls inside the
//! slot's range. "between 500000 and 600000" therefore yields 500000. This is
//! a known ambiguity awaiting a product decision; keep the first-match rule
//! until then.

use crate::models::{FieldValue, Slot};
use lazy_static::lazy_static;
use regex::Regex;
use std::ops::RangeInclusive;

pub const LOAN_AMOUNT_RANGE: RangeInclusive<u64> = 10_000..=4_000_000;
pub const MONTHLY_INCOME_RANGE: RangeInclusive<u64> = 10_000..=1_000_000;
pub const TENURE_RANGE: RangeInclusive<u64> = 6..=60;

lazy_static! {
    static ref PHONE_PATTERN: Regex =
        Regex::new(r"\b[0-9]{10}\b").expect("phone pattern is valid");
    static ref INTEGER_PATTERN: Regex =
        Regex::new(r"[0-9]+").expect("integer pattern is valid");
}

/// Stateless slot extractor
pub struct FieldExtractor;

impl FieldExtractor {
    /// Extract a candidate value for `slot` from `text`; `None` on a miss.
    pub fn extract(slot: Slot, text: &str) -> Option<FieldValue> {
        match slot {
            Slot::Name => extract_name(text).map(FieldValue::Text),
            Slot::Phone => extract_phone(text).map(FieldValue::Text),
            Slot::LoanAmount => first_integer_in(text, &LOAN_AMOUNT_RANGE).map(FieldValue::Number),
            Slot::TenureMonths => first_integer_in(text, &TENURE_RANGE).map(FieldValue::Number),
            Slot::MonthlyIncome => {
                first_integer_in(text, &MONTHLY_INCOME_RANGE).map(FieldValue::Number)
            }
            Slot::EmploymentType => extract_free_text(text).map(FieldValue::Text),
        }
    }
}

/// Capitalised tokens, in order, joined by a single space.
pub fn extract_name(text: &str) -> Option<String> {
    let tokens: Vec<&str> = text
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| c.is_ascii_punctuation()))
        .filter(|word| {
            word.chars().count() > 1
                && word.chars().next().map(char::is_uppercase).unwrap_or(false)
        })
        .collect();

    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" "))
    }
}

/// First standalone run of exactly ten digits.
pub fn extract_phone(text: &str) -> Option<String> {
    PHONE_PATTERN
        .find(text)
        .map(|m| m.as_str().to_string())
}

/// First integer substring, scanning left to right, that lies in `range`.
pub fn first_integer_in(text: &str, range: &RangeInclusive<u64>) -> Option<u64> {
    INTEGER_PATTERN
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<u64>().ok())
        .find(|value| range.contains(value))
}

fn extract_free_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
