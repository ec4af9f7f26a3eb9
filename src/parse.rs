//! Tolerant extraction of `"rates"` objects from provider payloads.
//!
//! Provider responses are not schema-guaranteed and come in two shapes: a
//! flat `{code: rate}` map for latest/single-date queries and a nested
//! `{date: {code: rate}}` map for time series. The engine only ever needs
//! that one object, so extraction scans for it textually instead of pulling
//! in full JSON validation. A malformed numeric token skips that entry
//! alone; structurally broken payloads fail the whole parse.

use crate::rates::{DayRates, RateSeries};
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::debug;

/// Returns the interior of the brace-delimited object following the
/// `"rates"` key, or `None` when the key is missing or braces never
/// balance.
fn rates_object(body: &str) -> Option<&str> {
    let key = body.find("\"rates\"")?;
    let open = key + body[key..].find('{')?;

    let mut depth = 0usize;
    for (i, ch) in body[open..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&body[open + 1..open + i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits on commas at brace depth 0, keeping nested per-date objects whole.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut last = 0usize;
    for (i, ch) in s.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&s[last..i]);
                last = i + 1;
            }
            _ => {}
        }
    }
    if last < s.len() {
        parts.push(&s[last..]);
    }
    parts
}

fn strip_key(raw: &str) -> &str {
    raw.trim().trim_matches('"').trim()
}

/// Parses the flat members of an object interior into `{code: rate}`.
fn parse_members(object: &str) -> DayRates {
    let mut map = HashMap::new();
    for pair in object.split(',') {
        let Some((key, value)) = pair.split_once(':') else {
            continue;
        };
        match value.trim().parse::<f64>() {
            Ok(rate) => {
                map.insert(strip_key(key).to_string(), rate);
            }
            Err(_) => debug!("Skipping malformed rate entry: {}", pair.trim()),
        }
    }
    map
}

/// Extracts a flat `{code: rate}` mapping from a provider body.
pub fn parse_flat(body: &str) -> Option<DayRates> {
    let object = rates_object(body)?;
    let map = parse_members(object);
    if map.is_empty() { None } else { Some(map) }
}

/// Extracts a nested `{date: {code: rate}}` time series from a provider
/// body. Members whose key is not a calendar date are skipped.
pub fn parse_series(body: &str) -> Option<RateSeries> {
    let object = rates_object(body)?;

    let mut series = RateSeries::new();
    for member in split_top_level(object) {
        let Some((key, value)) = member.split_once(':') else {
            continue;
        };
        let Ok(date) = NaiveDate::parse_from_str(strip_key(key), "%Y-%m-%d") else {
            debug!("Skipping non-date series key: {}", strip_key(key));
            continue;
        };
        let Some(open) = value.find('{') else { continue };
        let Some(close) = value[open..].find('}') else { continue };
        series.insert(date, parse_members(&value[open + 1..open + close]));
    }
    if series.is_empty() { None } else { Some(series) }
}
