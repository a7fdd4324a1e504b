//! Turns raw query-service rows into clean pick-list candidates.
//!
//! Everything here is total: rows missing the requested column, or holding a
//! non-string or blank value, are dropped rather than reported.

use std::{cmp::Ordering, collections::HashSet};

use serde_json::Value;
use shared::domain::{Row, ALL_BRANDS};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

pub fn field(name: &str) -> impl Fn(&Row) -> Option<&Value> + '_ {
    move |row| row.get(name)
}

fn usable_text(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
}

fn distinct_in_order<F>(rows: &[Row], extract: F) -> Vec<String>
where
    F: Fn(&Row) -> Option<&Value>,
{
    let mut seen = HashSet::new();
    rows.iter()
        .filter_map(|row| usable_text(extract(row)))
        .filter(|text| seen.insert(*text))
        .map(str::to_string)
        .collect()
}

pub fn normalize<F>(rows: &[Row], extract: F) -> Vec<String>
where
    F: Fn(&Row) -> Option<&Value>,
{
    let mut values = distinct_in_order(rows, extract);
    values.sort_by_cached_key(|value| CollationKey::new(value));
    values
}

/// The `"all"` sentinel followed by the gateway's brands in the order it
/// returned them.
pub fn brand_candidates(rows: &[Row]) -> Vec<String> {
    let mut brands = vec![ALL_BRANDS.to_string()];
    brands.extend(
        distinct_in_order(rows, field("make"))
            .into_iter()
            .filter(|brand| brand != ALL_BRANDS),
    );
    brands
}

/// Multi-level sort key in the manner of the Unicode collation algorithm:
/// base letters first, then accents, then case (lower before upper), with the
/// raw string as the last tie break.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct CollationKey {
    base: String,
    accents: String,
    case: Vec<bool>,
    raw: String,
}

impl CollationKey {
    fn new(value: &str) -> Self {
        let decomposed: Vec<char> = value.nfd().collect();
        let letters = || decomposed.iter().copied().filter(|c| !is_combining_mark(*c));
        Self {
            base: letters().flat_map(char::to_lowercase).collect(),
            accents: decomposed.iter().copied().flat_map(char::to_lowercase).collect(),
            case: letters().map(char::is_uppercase).collect(),
            raw: value.to_string(),
        }
    }
}

pub fn collate(a: &str, b: &str) -> Ordering {
    CollationKey::new(a).cmp(&CollationKey::new(b))
}

#[cfg(test)]
#[path = "tests/normalize_tests.rs"]
mod tests;
